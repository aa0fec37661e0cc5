//! 通信プロトコル定義
//!
//! クライアント→テレメトリサーバー間の GraphQL メッセージ

use crate::types::{ClientIdentity, SpeedtestResult};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// bytes/sec → Mbit/s の換算係数
pub const BYTES_TO_MBIT: f64 = 0.000008;

/// 送信用に整形した計測結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionPayload {
    /// 計測時刻
    pub date: String,
    /// ダウンロード (Mbit/s)
    pub download: f64,
    /// アップロード (Mbit/s)
    pub upload: f64,
    /// レイテンシ (ms)
    pub ping: f64,
    /// ジッター (ms)
    pub jitter: f64,
    /// 実行環境の指紋（ホスト名 OS バージョン リリース）
    pub runner: String,
    /// クライアント識別情報
    pub identity: ClientIdentity,
}

impl SubmissionPayload {
    /// 計測結果と識別情報から送信内容を組み立てる
    pub fn new(
        result: &SpeedtestResult,
        identity: &ClientIdentity,
        runner: String,
        offset: Option<FixedOffset>,
    ) -> Self {
        let date = match offset {
            Some(offset) => normalize_timestamp(&result.timestamp, offset),
            None => result.timestamp.clone(),
        };

        Self {
            date,
            download: bytes_to_mbit(result.download.bandwidth),
            upload: bytes_to_mbit(result.upload.bandwidth),
            ping: result.ping.latency,
            jitter: result.ping.jitter,
            runner,
            identity: identity.clone(),
        }
    }

    /// `AddSpeedTest` ミューテーション文字列を生成する
    pub fn to_mutation(&self) -> String {
        let id = &self.identity;
        let arguments = [
            ("date", self.date.clone()),
            ("download", format_number(self.download)),
            ("upload", format_number(self.upload)),
            ("ping", format_number(self.ping)),
            ("jitter", format_number(self.jitter)),
            ("station", id.station.clone()),
            ("branch", id.branch.clone()),
            ("vlan", id.vlan.clone()),
            ("runner", self.runner.clone()),
            ("latitude", id.latitude.clone()),
            ("longitude", id.longitude.clone()),
            ("type", id.connection_type.clone()),
            ("login", id.login.clone()),
            ("ip", id.ip.clone()),
            ("tp", id.tp.clone()),
        ];

        let rendered = arguments
            .iter()
            .map(|(name, value)| format!("{}: \"{}\"", name, escape_graphql(value)))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "mutation AddSpeedTest {{ addSpeedTest({}) {{ success }} }}",
            rendered
        )
    }

    /// POSTボディ
    pub fn to_request(&self) -> GraphqlRequest {
        GraphqlRequest {
            query: self.to_mutation(),
        }
    }
}

/// GraphQL リクエストボディ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphqlRequest {
    /// クエリ文字列
    pub query: String,
}

/// `AddSpeedTest` レスポンス
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddSpeedTestResponse {
    /// data フィールド
    #[serde(default)]
    pub data: Option<AddSpeedTestData>,
    /// GraphQL エラー
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

/// `data` 配下
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddSpeedTestData {
    /// ミューテーション結果
    #[serde(rename = "addSpeedTest", default)]
    pub add_speed_test: Option<MutationStatus>,
}

/// ミューテーション結果
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MutationStatus {
    /// 成功フラグ
    #[serde(default)]
    pub success: Value,
}

impl AddSpeedTestResponse {
    /// `data.addSpeedTest.success` を取り出す（欠落時は None）
    pub fn success_indicator(&self) -> Option<&Value> {
        self.data
            .as_ref()?
            .add_speed_test
            .as_ref()
            .map(|status| &status.success)
            .filter(|value| !value.is_null())
    }

    /// 成功が示されているか
    pub fn is_success(&self) -> bool {
        self.success_indicator().map(is_truthy).unwrap_or(false)
    }
}

/// bytes/sec を Mbit/s に換算する
pub fn bytes_to_mbit(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * BYTES_TO_MBIT
}

/// タイムスタンプを指定オフセットで表し直す（解釈できなければそのまま）
pub fn normalize_timestamp(timestamp: &str, offset: FixedOffset) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => parsed
            .with_timezone(&offset)
            .format("%Y-%m-%dT%H:%M:%S%z")
            .to_string(),
        Err(_) => timestamp.to_string(),
    }
}

/// JSON値の真偽判定
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// 数値引数の表記
///
/// 指数表記は使わず、整数値にも小数点を付ける（1000.0 → "1000.0", 8e-6 → "0.000008"）。
pub fn format_number(value: f64) -> String {
    let rendered = value.to_string();
    if value.is_finite() && !rendered.contains('.') {
        format!("{}.0", rendered)
    } else {
        rendered
    }
}

/// GraphQL 文字列リテラル用のエスケープ
///
/// 制御文字は `\n` `\r` `\t` 以外も `\uXXXX` にする。
pub fn escape_graphql(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04X}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}
