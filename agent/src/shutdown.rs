//! シャットダウン要求の管理
//!
//! 1回目の割り込み（Ctrl+C / SIGTERM）で穏当な停止、2回目で強制停止、
//! 3回目で即時終了。

use crate::exit::codes;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// シャットダウン要求の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownLevel {
    /// 要求なし
    Running,
    /// 実行中の計測を完了させてから停止
    Graceful,
    /// 実行中の計測プロセスも終了させる
    Forceful,
}

/// n回目の割り込みに対する動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// 実行中の計測を待ってから停止
    Graceful,
    /// 計測ツールを終了させて停止
    Forceful,
    /// その場でプロセスを終了
    Exit,
}

/// 受信した割り込み回数（1始まり）から動作を決める
pub fn interrupt_action(received: u32) -> InterruptAction {
    match received {
        0 | 1 => InterruptAction::Graceful,
        2 => InterruptAction::Forceful,
        _ => InterruptAction::Exit,
    }
}

/// シャットダウン要求フラグ（クローンは状態を共有する）
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<ShutdownLevel>>,
}

impl ShutdownSignal {
    /// シグナルハンドラを登録せずに作成（テストや埋め込み用）
    pub fn manual() -> Self {
        let (tx, _rx) = watch::channel(ShutdownLevel::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Ctrl+C（Unix では SIGTERM も）を監視するタスクを起動して作成
    ///
    /// tokio ランタイム内で呼ぶこと。
    pub fn install() -> Self {
        let signal = Self::manual();
        let listener = signal.clone();

        tokio::spawn(async move {
            let mut received = 0u32;
            loop {
                if let Err(err) = wait_for_interrupt().await {
                    warn!("Failed to listen for shutdown signals: {}", err);
                    return;
                }
                received = received.saturating_add(1);
                match interrupt_action(received) {
                    InterruptAction::Graceful => {
                        listener.request(ShutdownLevel::Graceful);
                        info!(
                            "Received interrupt. Finishing the current measurement and exiting gracefully (press Ctrl+C again to abort)..."
                        );
                    }
                    InterruptAction::Forceful => {
                        listener.request(ShutdownLevel::Forceful);
                        warn!(
                            "Received second interrupt. Aborting the running measurement (press Ctrl+C again to exit immediately)..."
                        );
                    }
                    InterruptAction::Exit => {
                        warn!("Received third interrupt. Exiting immediately");
                        std::process::exit(i32::from(codes::INTERRUPTED));
                    }
                }
            }
        });

        signal
    }

    /// 現在の段階
    pub fn level(&self) -> ShutdownLevel {
        *self.tx.borrow()
    }

    /// 停止が要求されているか
    pub fn is_requested(&self) -> bool {
        self.level() >= ShutdownLevel::Graceful
    }

    /// 段階を一つ上げ、新しい段階を返す
    pub fn escalate(&self) -> ShutdownLevel {
        let mut current = ShutdownLevel::Running;
        self.tx.send_modify(|level| {
            *level = match *level {
                ShutdownLevel::Running => ShutdownLevel::Graceful,
                _ => ShutdownLevel::Forceful,
            };
            current = *level;
        });
        current
    }

    /// 指定の段階まで引き上げる（下げることはない）
    pub fn request(&self, level: ShutdownLevel) {
        self.tx.send_if_modified(|current| {
            if level > *current {
                *current = level;
                true
            } else {
                false
            }
        });
    }

    /// 停止が要求されるまで待つ
    pub async fn requested(&self) {
        self.wait_for(ShutdownLevel::Graceful).await;
    }

    /// 強制停止が要求されるまで待つ
    pub async fn forced(&self) {
        self.wait_for(ShutdownLevel::Forceful).await;
    }

    async fn wait_for(&self, target: ShutdownLevel) {
        let mut rx = self.tx.subscribe();
        // 送信側は self が保持しているので閉じることはない
        let _ = rx.wait_for(|level| *level >= target).await;
    }
}

#[cfg(unix)]
async fn wait_for_interrupt() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
