//! 進捗表示

use isl_client_common::types::ProgressKind;
use std::io::Write;

/// 進捗レコードの受け口
pub trait ProgressSink: Send + Sync {
    /// 計測フェーズの進捗 (0.0-1.0)
    fn on_progress(&self, kind: ProgressKind, fraction: f64);

    /// 結果レコードを受信した
    fn on_finished(&self) {}
}

/// 何もしない（デーモン用）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _kind: ProgressKind, _fraction: f64) {}
}

/// 標準出力に1行で進捗を上書き表示する
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    /// 表示用の1行を生成する
    pub fn render(kind: ProgressKind, fraction: f64) -> String {
        let percentage = (fraction * 100.0).clamp(0.0, 100.0);
        format!("{}: {:5.1}%", kind.label(), percentage)
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&self, kind: ProgressKind, fraction: f64) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r{}   ", Self::render(kind, fraction));
        let _ = stdout.flush();
    }

    fn on_finished(&self) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "\rSpeedtest cmd done.   ");
        let _ = stdout.flush();
    }
}
