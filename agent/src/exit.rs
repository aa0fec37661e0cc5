//! 終了コード

use isl_client_common::types::CycleOutcome;

/// 終了コード定数
pub mod codes {
    /// 正常終了（ワンショット成功、デーモン停止）
    pub const SUCCESS: u8 = 0;
    /// ワンショットのサイクル失敗
    pub const CYCLE_FAILED: u8 = 1;
    /// 設定エラー
    pub const CONFIG_ERROR: u8 = 2;
    /// ロギング初期化エラー
    pub const LOGGING_ERROR: u8 = 3;
    /// 3回目の割り込みによる即時終了 (128 + SIGINT)
    pub const INTERRUPTED: u8 = 130;
}

/// ワンショットの結果を終了コードに変換する
pub fn exit_code_for(outcome: CycleOutcome) -> u8 {
    match outcome {
        CycleOutcome::Success => codes::SUCCESS,
        CycleOutcome::SubmissionFailed | CycleOutcome::ProcessFailed => codes::CYCLE_FAILED,
    }
}
