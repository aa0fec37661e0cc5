//! 計測ツール出力の解析
//!
//! 1行を1レコードとして解釈する。解釈できない行は黙って捨てる
//! （ツールはJSON以外の診断メッセージも出力するため）。

use crate::progress::{NoProgress, ProgressSink};
use isl_client_common::types::{MeasurementRecord, ProgressKind, SpeedtestResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const MAX_LOGGED_LINE: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawRecord {
    Ping { ping: RawProgress },
    Download { download: RawProgress },
    Upload { upload: RawProgress },
    Result(SpeedtestResult),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawProgress {
    progress: f64,
}

/// 1行をレコードとして解釈する
///
/// 純粋関数。不正なJSON、未知の `type`、必須フィールド欠落はすべて `None`。
pub fn parse_line(line: &str) -> Option<MeasurementRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let raw = match serde_json::from_str::<RawRecord>(trimmed) {
        Ok(raw) => raw,
        Err(err) => {
            debug!("Skipping undecodable line ({}): {}", err, preview(trimmed));
            return None;
        }
    };

    let progress = |kind, raw: RawProgress| MeasurementRecord::Progress {
        kind,
        fraction: raw.progress,
    };

    match raw {
        RawRecord::Ping { ping } => Some(progress(ProgressKind::Ping, ping)),
        RawRecord::Download { download } => Some(progress(ProgressKind::Download, download)),
        RawRecord::Upload { upload } => Some(progress(ProgressKind::Upload, upload)),
        RawRecord::Result(result) => Some(MeasurementRecord::Result(result)),
        RawRecord::Other => {
            debug!("Skipping unrecognized record: {}", preview(trimmed));
            None
        }
    }
}

fn preview(line: &str) -> String {
    match line.char_indices().nth(MAX_LOGGED_LINE) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}

/// 行を解析し、種別ごとに振り分ける
#[derive(Clone)]
pub struct OutputParser {
    progress: Arc<dyn ProgressSink>,
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new(Arc::new(NoProgress))
    }
}

impl OutputParser {
    /// 進捗の受け口を指定して作成
    pub fn new(progress: Arc<dyn ProgressSink>) -> Self {
        Self { progress }
    }

    /// 1行を処理する
    ///
    /// 進捗は受け口へ渡し、結果レコードは送信用に返す。
    pub fn dispatch(&self, line: &str) -> Option<SpeedtestResult> {
        match parse_line(line)? {
            MeasurementRecord::Progress { kind, fraction } => {
                self.progress.on_progress(kind, fraction);
                None
            }
            MeasurementRecord::Result(result) => {
                self.progress.on_finished();
                debug!(
                    timestamp = %result.timestamp,
                    download = result.download.bandwidth,
                    upload = result.upload.bandwidth,
                    latency = result.ping.latency,
                    jitter = result.ping.jitter,
                    "Result record received"
                );
                Some(result)
            }
        }
    }
}
