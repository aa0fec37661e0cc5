//! 実行環境情報
//!
//! 送信ごとに取得する（キャッシュしない）

use sysinfo::System;

const UNKNOWN: &str = "unknown";

/// 実行環境の指紋
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerFingerprint {
    /// ホスト名
    pub host_name: String,
    /// OS名
    pub os_name: String,
    /// OSバージョン
    pub os_version: String,
    /// OSリリース（カーネルバージョン）
    pub os_release: String,
}

impl RunnerFingerprint {
    /// 現在のホストから取得する
    pub fn current() -> Self {
        Self {
            host_name: System::host_name().unwrap_or_else(|| UNKNOWN.to_string()),
            os_name: System::name().unwrap_or_else(|| UNKNOWN.to_string()),
            os_version: System::os_version().unwrap_or_else(|| UNKNOWN.to_string()),
            os_release: System::kernel_version().unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    /// `runner` 引数の文字列
    pub fn describe(&self) -> String {
        format!(
            "{} {} {} {}",
            self.host_name, self.os_name, self.os_version, self.os_release
        )
    }
}
