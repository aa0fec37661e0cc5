//! 設定管理
//!
//! 設定ファイル（YAML / JSON）のスキーマと、そこから導出される値

use crate::error::{CommonError, CommonResult};
use crate::types::ClientIdentity;
use chrono::FixedOffset;
use serde::{
    de::{self, Deserializer},
    Deserialize, Serialize,
};
use std::path::Path;
use std::time::Duration;

/// 計測間隔の下限（秒）
pub const MINIMUM_INTERVAL_SECS: u64 = 900;

/// クライアント設定（起動時に一度だけ構築）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// 識別情報
    pub global: GlobalConfig,
    /// 計測ツール設定
    pub speedtest: SpeedtestConfig,
    /// 送信先設定
    pub graphql: GraphqlConfig,
}

/// 識別情報セクション
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 拠点情報
    pub client: ClientSection,
    /// 回線情報
    pub connection: ConnectionSection,
}

/// 拠点情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// 拠点
    #[serde(deserialize_with = "string_or_number")]
    pub station: String,
    /// 支店
    #[serde(deserialize_with = "string_or_number")]
    pub branch: String,
    /// 位置
    pub location: LocationSection,
}

/// 位置情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationSection {
    /// 緯度
    #[serde(deserialize_with = "string_or_number")]
    pub latitude: String,
    /// 経度
    #[serde(deserialize_with = "string_or_number")]
    pub longitude: String,
}

/// 回線情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    /// 回線種別
    #[serde(rename = "type", deserialize_with = "string_or_number")]
    pub kind: String,
    /// ログイン
    #[serde(deserialize_with = "string_or_number")]
    pub login: String,
    /// VLAN
    #[serde(deserialize_with = "string_or_number")]
    pub vlan: String,
    /// IPアドレス
    #[serde(deserialize_with = "string_or_number")]
    pub ip: String,
    /// 回線事業者タグ
    #[serde(deserialize_with = "string_or_number")]
    pub tp: String,
}

/// 計測ツール設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeedtestConfig {
    /// 計測間隔（秒）(デフォルト: 900、下限 900)
    #[serde(default = "default_interval_sec")]
    pub interval_sec: u64,
    /// 計測コマンド
    pub command_string: String,
    /// Windows用計測コマンド（`bin/` 配下の実行ファイル）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_string_win: Option<String>,
    /// 送信前にタイムスタンプを揃えるUTCオフセット (例: "+06:00")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_offset: Option<String>,
}

/// GraphQLエンドポイント設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphqlConfig {
    /// スキーム (デフォルト: "http")
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// ホスト
    pub url: String,
    /// ポート番号
    #[serde(default, deserialize_with = "optional_port")]
    pub port: Option<u16>,
    /// パス (デフォルト: "/graphql")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// 計測コマンドを選ぶ対象OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    /// Windows
    Windows,
    /// それ以外（Linux, macOS, ...）
    Unix,
}

impl TargetOs {
    /// 実行中のOS
    pub fn current() -> Self {
        if cfg!(windows) {
            TargetOs::Windows
        } else {
            TargetOs::Unix
        }
    }
}

fn default_interval_sec() -> u64 {
    MINIMUM_INTERVAL_SECS
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_endpoint() -> String {
    "/graphql".to_string()
}

/// 設定された間隔に下限を適用する
pub fn effective_interval_secs(configured: u64) -> u64 {
    configured.max(MINIMUM_INTERVAL_SECS)
}

impl ClientConfig {
    /// 必須項目を検証する
    pub fn validate(&self) -> CommonResult<()> {
        if self.speedtest.command_string.trim().is_empty() {
            return Err(CommonError::Config(
                "speedtest.commandString must not be empty".to_string(),
            ));
        }
        if self.graphql.url.trim().is_empty() {
            return Err(CommonError::Config(
                "graphql.url must not be empty".to_string(),
            ));
        }
        match self.graphql.protocol.as_str() {
            "http" | "https" => {}
            other => {
                return Err(CommonError::Config(format!(
                    "graphql.protocol must be http or https, got '{}'",
                    other
                )))
            }
        }
        self.speedtest.normalization_offset()?;
        Ok(())
    }

    /// 送信に使う識別情報
    pub fn identity(&self) -> ClientIdentity {
        let client = &self.global.client;
        let connection = &self.global.connection;
        ClientIdentity {
            station: client.station.clone(),
            branch: client.branch.clone(),
            latitude: client.location.latitude.clone(),
            longitude: client.location.longitude.clone(),
            connection_type: connection.kind.clone(),
            login: connection.login.clone(),
            vlan: connection.vlan.clone(),
            ip: connection.ip.clone(),
            tp: connection.tp.clone(),
        }
    }
}

impl SpeedtestConfig {
    /// 下限適用後の計測間隔
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(effective_interval_secs(self.interval_sec))
    }

    /// OSに応じた計測コマンドを返す
    ///
    /// Windowsでは `bin_dir` 配下の実行ファイルを指す。
    pub fn command_for(&self, os: TargetOs, bin_dir: &Path) -> String {
        match (os, self.command_string_win.as_deref()) {
            (TargetOs::Windows, Some(win)) if !win.trim().is_empty() => {
                format!("{}/{}", bin_dir.display(), win.trim())
            }
            _ => self.command_string.clone(),
        }
    }

    /// タイムスタンプ正規化に使うオフセット
    pub fn normalization_offset(&self) -> CommonResult<Option<FixedOffset>> {
        match self.timestamp_offset.as_deref() {
            None => Ok(None),
            Some(raw) => parse_utc_offset(raw).map(Some).ok_or_else(|| {
                CommonError::Config(format!(
                    "speedtest.timestampOffset must look like +06:00, got '{}'",
                    raw
                ))
            }),
        }
    }
}

impl GraphqlConfig {
    /// 設定どおりのエンドポイントURL
    pub fn endpoint_url(&self) -> String {
        self.url_with_scheme(&self.protocol)
    }

    /// HTTPSを強制したフォールバックURL
    pub fn secure_endpoint_url(&self) -> String {
        self.url_with_scheme("https")
    }

    fn url_with_scheme(&self, scheme: &str) -> String {
        let host = self.url.trim().trim_end_matches('/');
        let path = if self.endpoint.starts_with('/') {
            self.endpoint.clone()
        } else {
            format!("/{}", self.endpoint)
        };
        match self.port {
            Some(port) => format!("{}://{}:{}{}", scheme, host, port, path),
            None => format!("{}://{}{}", scheme, host, path),
        }
    }
}

/// "+06:00" / "-0330" / "Z" 形式のオフセットを解釈する
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match trimmed.chars().next()? {
        '+' => (1, &trimmed[1..]),
        '-' => (-1, &trimmed[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Integer(value) => value.to_string(),
        StringOrNumber::Float(value) => value.to_string(),
        StringOrNumber::Bool(value) => value.to_string(),
    })
}

fn optional_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Integer(value)) => u16::try_from(value)
            .map(Some)
            .map_err(|_| de::Error::custom(format!("port out of range: {}", value))),
        Some(StringOrNumber::String(value)) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<u16>()
                    .map(Some)
                    .map_err(|err| de::Error::custom(err.to_string()))
            }
        }
        Some(_) => Err(de::Error::custom("port must be an integer")),
    }
}
