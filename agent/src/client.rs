//! テレメトリ送信クライアント
//!
//! 計測結果を GraphQL ミューテーションとして送信する。
//! 失敗時はHTTPSを強制したURLへ1回だけ再送する。

use crate::system::RunnerFingerprint;
use chrono::FixedOffset;
use isl_client_common::{
    config::{ClientConfig, GraphqlConfig},
    error::{AgentError, AgentResult},
    protocol::{AddSpeedTestResponse, GraphqlRequest, SubmissionPayload},
    types::{ClientIdentity, SpeedtestResult},
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 1リクエストあたりのタイムアウト
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 送信先URL（通常 / HTTPSフォールバック）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEndpoint {
    /// 設定どおりのURL
    pub primary: String,
    /// HTTPSを強制したURL
    pub fallback: String,
}

impl SubmissionEndpoint {
    /// 設定から組み立てる
    pub fn from_config(graphql: &GraphqlConfig) -> Self {
        Self {
            primary: graphql.endpoint_url(),
            fallback: graphql.secure_endpoint_url(),
        }
    }
}

/// テレメトリクライアント
pub struct TelemetryClient {
    endpoint: SubmissionEndpoint,
    identity: ClientIdentity,
    timestamp_offset: Option<FixedOffset>,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl TelemetryClient {
    /// 新しいクライアントを作成
    pub fn new(endpoint: SubmissionEndpoint, identity: ClientIdentity) -> Self {
        Self {
            endpoint,
            identity,
            timestamp_offset: None,
            timeout: REQUEST_TIMEOUT,
            http_client: reqwest::Client::new(),
        }
    }

    /// 設定から作成
    pub fn from_config(config: &ClientConfig) -> AgentResult<Self> {
        let offset = config.speedtest.normalization_offset()?;
        Ok(Self::new(
            SubmissionEndpoint::from_config(&config.graphql),
            config.identity(),
        )
        .with_timestamp_offset(offset))
    }

    /// リクエストタイムアウトを変更する
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 送信前のタイムスタンプ正規化を設定する
    pub fn with_timestamp_offset(mut self, offset: Option<FixedOffset>) -> Self {
        self.timestamp_offset = offset;
        self
    }

    /// 送信先
    pub fn endpoint(&self) -> &SubmissionEndpoint {
        &self.endpoint
    }

    /// 送信内容を組み立てる（実行環境情報はその都度取得）
    pub fn build_payload(&self, result: &SpeedtestResult) -> SubmissionPayload {
        SubmissionPayload::new(
            result,
            &self.identity,
            RunnerFingerprint::current().describe(),
            self.timestamp_offset,
        )
    }

    /// 計測結果を送信する
    ///
    /// 通常URLへ1回、失敗したらHTTPS URLへ1回。それ以上は再送しない。
    pub async fn submit(&self, result: &SpeedtestResult) -> AgentResult<()> {
        let payload = self.build_payload(result);
        debug!(
            date = %payload.date,
            download_mbit = payload.download,
            upload_mbit = payload.upload,
            ping = payload.ping,
            jitter = payload.jitter,
            runner = %payload.runner,
            "Submission payload built"
        );
        let request = payload.to_request();

        info!("Sending GraphQL request to {}", self.endpoint.primary);
        let primary_error = match self.post(&self.endpoint.primary, &request).await {
            Ok(()) => {
                info!("Speedtest result added");
                return Ok(());
            }
            Err(err) => err,
        };

        warn!(
            "Submission to {} failed: {}. Retrying via {}",
            self.endpoint.primary, primary_error, self.endpoint.fallback
        );

        match self.post(&self.endpoint.fallback, &request).await {
            Ok(()) => {
                info!("Speedtest result added via HTTPS fallback");
                Ok(())
            }
            Err(fallback_error) => {
                error!(
                    "Failed to send GraphQL request: primary: {}; fallback: {}",
                    primary_error, fallback_error
                );
                Err(AgentError::Submission(format!(
                    "primary: {}; fallback: {}",
                    primary_error, fallback_error
                )))
            }
        }
    }

    async fn post(&self, url: &str, request: &GraphqlRequest) -> AgentResult<()> {
        let response = self
            .http_client
            .post(url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Transport(format!(
                "{} responded with status {}",
                url, status
            )));
        }

        let body = response
            .json::<AddSpeedTestResponse>()
            .await
            .map_err(|e| AgentError::Transport(format!("Failed to decode JSON response: {}", e)))?;

        match body.success_indicator() {
            None => Err(AgentError::Transport(
                "response is missing data.addSpeedTest.success".to_string(),
            )),
            Some(_) if body.is_success() => {
                debug!("Server accepted result: {:?}", body.success_indicator());
                Ok(())
            }
            Some(value) => Err(AgentError::Transport(format!(
                "server reported success = {}",
                value
            ))),
        }
    }
}
