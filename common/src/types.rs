//! 共通型定義
//!
//! 計測レコード、クライアント識別情報、サイクル結果などのコアデータ型

use serde::{Deserialize, Serialize};
use std::fmt;

/// 進捗レコードの種別
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// レイテンシ計測
    Ping,
    /// ダウンロード計測
    Download,
    /// アップロード計測
    Upload,
}

impl ProgressKind {
    /// 表示用ラベル
    pub fn label(&self) -> &'static str {
        match self {
            ProgressKind::Ping => "Ping",
            ProgressKind::Download => "Download",
            ProgressKind::Upload => "Upload",
        }
    }
}

/// 帯域計測値
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BandwidthSample {
    /// 帯域 (bytes/sec)
    pub bandwidth: f64,
}

/// レイテンシ計測値
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PingSample {
    /// レイテンシ (ms)
    pub latency: f64,
    /// ジッター (ms)
    pub jitter: f64,
}

/// 計測ツールが出力する完了結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeedtestResult {
    /// 計測時刻（ISO-8601、オフセット付き）
    pub timestamp: String,
    /// ダウンロード結果
    pub download: BandwidthSample,
    /// アップロード結果
    pub upload: BandwidthSample,
    /// Ping結果
    pub ping: PingSample,
}

/// 出力ストリームから復号した1レコード
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementRecord {
    /// 途中経過
    Progress {
        /// 計測フェーズ
        kind: ProgressKind,
        /// 完了率 (0.0-1.0)
        fraction: f64,
    },
    /// 完了結果
    Result(SpeedtestResult),
}

/// クライアント識別情報（プロセス生存中は不変）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClientIdentity {
    /// 拠点
    pub station: String,
    /// 支店
    pub branch: String,
    /// 緯度
    pub latitude: String,
    /// 経度
    pub longitude: String,
    /// 回線種別
    pub connection_type: String,
    /// 回線ログイン
    pub login: String,
    /// VLAN
    pub vlan: String,
    /// IPアドレス
    pub ip: String,
    /// 回線事業者タグ
    pub tp: String,
}

/// 1サイクルの結果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CycleOutcome {
    /// 結果を送信できた
    Success,
    /// 送信がフォールバック含め失敗した
    SubmissionFailed,
    /// 計測ツールの起動失敗、または結果なしで終了した
    ProcessFailed,
}

impl CycleOutcome {
    /// 成功か
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success)
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CycleOutcome::Success => "success",
            CycleOutcome::SubmissionFailed => "submission-failed",
            CycleOutcome::ProcessFailed => "process-failed",
        };
        f.write_str(text)
    }
}
