//! 計測スケジューラ
//!
//! 1サイクル = 計測ツール起動 → 出力解析 → 結果送信。
//! ワンショットは1サイクルで終了、デーモンは間隔をあけて繰り返す。
//! 同時に走るサイクルは常に1つだけ。

use crate::client::TelemetryClient;
use crate::parser::OutputParser;
use crate::process::{self, OutputLines, ProcessExit};
use crate::progress::ProgressSink;
use crate::shutdown::ShutdownSignal;
use chrono::{DateTime, Local};
use isl_client_common::{error::AgentResult, types::CycleOutcome};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{error, info, warn};

/// 結果受信後、計測ツールの終了を待つ猶予
pub const EXIT_GRACE: Duration = Duration::from_secs(10);

/// 実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 1サイクルで終了
    OneShot,
    /// 割り込みまで繰り返す
    Daemon,
}

/// デーモン実行中の状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonState {
    /// サイクル実行中か
    pub cycle_in_flight: bool,
    /// 次回実行予定時刻
    pub next_run_at: Option<DateTime<Local>>,
    /// 停止要求を受けたか
    pub shutdown_requested: bool,
    /// 完了したサイクル数
    pub cycles_completed: u64,
    /// 直近のサイクル結果
    pub last_outcome: Option<CycleOutcome>,
}

/// 1サイクル内の送信結果の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionTally {
    /// 受理された件数
    pub accepted: u32,
    /// 失敗した件数
    pub failed: u32,
}

impl SubmissionTally {
    /// サイクル結果を決める
    ///
    /// 失敗が1件でもあれば submission-failed、結果が1件もなければ process-failed。
    pub fn outcome(&self) -> CycleOutcome {
        if self.failed > 0 {
            CycleOutcome::SubmissionFailed
        } else if self.accepted > 0 {
            CycleOutcome::Success
        } else {
            CycleOutcome::ProcessFailed
        }
    }
}

/// スケジューラ
pub struct Scheduler {
    command: String,
    interval: Duration,
    client: TelemetryClient,
    parser: OutputParser,
    shutdown: ShutdownSignal,
    state: watch::Sender<DaemonState>,
}

impl Scheduler {
    /// 新しいスケジューラを作成
    ///
    /// `interval` は下限適用済みの値を渡す。
    pub fn new(
        command: String,
        interval: Duration,
        client: TelemetryClient,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            command,
            interval,
            client,
            parser: OutputParser::default(),
            shutdown,
            state: watch::channel(DaemonState::default()).0,
        }
    }

    /// 進捗の受け口を設定する
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.parser = OutputParser::new(progress);
        self
    }

    /// 計測間隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// デーモン状態の購読
    ///
    /// 状態が変わるたび（サイクル開始・終了、待機開始、停止）に更新される。
    pub fn watch_state(&self) -> watch::Receiver<DaemonState> {
        self.state.subscribe()
    }

    /// 1サイクルだけ実行する
    pub async fn run_once(&self) -> CycleOutcome {
        let outcome = self.run_cycle(true).await;
        match outcome {
            CycleOutcome::Success => info!("Speedtest finished: {}", outcome),
            _ => error!("Speedtest finished: {}", outcome),
        }
        outcome
    }

    /// 割り込みまでサイクルを繰り返す
    pub async fn run_daemon(&self) -> DaemonState {
        let mut state = DaemonState::default();
        self.state.send_replace(state.clone());
        info!(
            "Daemon started: interval={}s, command={}",
            self.interval.as_secs(),
            self.command
        );

        loop {
            if self.shutdown.is_requested() {
                state.shutdown_requested = true;
                break;
            }

            state.cycle_in_flight = true;
            state.next_run_at = None;
            self.state.send_replace(state.clone());
            let outcome = self.run_cycle(false).await;
            state.cycle_in_flight = false;
            state.cycles_completed += 1;
            state.last_outcome = Some(outcome);
            self.state.send_replace(state.clone());

            match outcome {
                CycleOutcome::Success => {
                    info!("Cycle {} finished: {}", state.cycles_completed, outcome)
                }
                _ => warn!("Cycle {} finished: {}", state.cycles_completed, outcome),
            }

            if self.shutdown.is_requested() {
                state.shutdown_requested = true;
                break;
            }

            let deadline = Instant::now() + self.interval;
            let next_run_at = Local::now()
                + chrono::Duration::from_std(self.interval)
                    .unwrap_or_else(|_| chrono::Duration::zero());
            state.next_run_at = Some(next_run_at);
            self.state.send_replace(state.clone());
            info!("Next speedtest at {}", next_run_at.format("%Y-%m-%d %H:%M:%S %z"));

            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = self.shutdown.requested() => {
                    state.shutdown_requested = true;
                    break;
                }
            }
        }

        state.next_run_at = None;
        self.state.send_replace(state.clone());
        info!(
            "Daemon stopped after {} cycle(s). Exiting gracefully...",
            state.cycles_completed
        );
        state
    }

    /// 1サイクルを実行する
    ///
    /// 出力の読み出しとプロセス終了待ちを並行して進め、両方の完了を待つ。
    /// `single_result` の場合、最初の結果を送信した時点で読み出しをやめる。
    pub async fn run_cycle(&self, single_result: bool) -> CycleOutcome {
        info!("Speedtest started");
        let handle = match process::start(&self.command) {
            Ok(handle) => handle,
            Err(err) => {
                error!("Error executing speedtest: {}", err);
                return CycleOutcome::ProcessFailed;
            }
        };
        let (exit, output) = handle.into_parts();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        let drain = self.drain_output(output, single_result, stopped_tx);
        let wait = self.wait_for_exit(exit, stopped_rx);
        let (tally, status) = tokio::join!(drain, wait);

        match &status {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("Speedtest command exited with {}", status),
            Err(err) => warn!("{}", err),
        }

        let outcome = tally.outcome();
        if tally.accepted == 0 && tally.failed == 0 {
            warn!("Speedtest produced no result record");
        }
        outcome
    }

    async fn drain_output(
        &self,
        mut output: OutputLines,
        single_result: bool,
        stopped: oneshot::Sender<()>,
    ) -> SubmissionTally {
        let mut tally = SubmissionTally::default();

        loop {
            // 子プロセスがパイプを握ったままでも強制停止では読み出しを打ち切る
            let next = tokio::select! {
                next = output.next_line() => next,
                _ = self.shutdown.forced() => break,
            };
            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!("Stopped reading speedtest output: {}", err);
                    break;
                }
            };

            let Some(result) = self.parser.dispatch(&line) else {
                continue;
            };

            info!("Speedtest cmd done.");
            let submitted = tokio::select! {
                submitted = self.client.submit(&result) => submitted,
                _ = self.shutdown.forced() => {
                    warn!("Forceful shutdown requested; abandoning in-flight submission");
                    break;
                }
            };
            match submitted {
                Ok(()) => tally.accepted += 1,
                Err(_) => tally.failed += 1,
            }

            if single_result {
                let _ = stopped.send(());
                break;
            }
        }

        tally
    }

    async fn wait_for_exit(
        &self,
        mut exit: ProcessExit,
        stopped: oneshot::Receiver<()>,
    ) -> AgentResult<ExitStatus> {
        tokio::select! {
            status = exit.wait() => status,
            _ = self.shutdown.forced() => {
                warn!("Forceful shutdown requested; terminating speedtest");
                exit.terminate().await
            }
            Ok(()) = stopped => {
                match timeout(EXIT_GRACE, exit.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(
                            "Speedtest did not exit within {}s after its result; terminating",
                            EXIT_GRACE.as_secs()
                        );
                        exit.terminate().await
                    }
                }
            }
        }
    }
}
