//! 計測プロセス管理
//!
//! 計測ツールをシェル経由で起動し、標準出力を行単位で読み出す

use isl_client_common::error::{AgentError, AgentResult};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

/// SIGTERM 送信後、強制終了までに待つ時間
pub const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// 計測コマンドを起動する
///
/// サイクルごとに新しいハンドルを作る。出力の読み直しはできない。
/// Unix では独立したプロセスグループで起動し、端末の Ctrl+C が
/// 計測ツールに直接届かないようにする。
pub fn start(command: &str) -> AgentResult<ProcessHandle> {
    let mut child = shell_command(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AgentError::Launch(format!("{}: {}", command, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AgentError::Launch("stdout was not captured".to_string()))?;

    // stderrは解釈しないが、パイプが詰まらないよう読み捨てる
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("measurement stderr: {}", line);
            }
        });
    }

    info!(pid = child.id(), "Measurement process started: {}", command);

    Ok(ProcessHandle {
        exit: ProcessExit { child },
        output: OutputLines {
            reader: BufReader::new(stdout),
        },
    })
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).process_group(0);
    cmd
}

/// 起動済み計測プロセス
pub struct ProcessHandle {
    exit: ProcessExit,
    output: OutputLines,
}

impl ProcessHandle {
    /// 次の出力行（EOFで None）
    pub async fn next_line(&mut self) -> AgentResult<Option<String>> {
        self.output.next_line().await
    }

    /// 終了していれば終了状態を返す（ブロックしない）
    pub fn poll(&mut self) -> AgentResult<Option<ExitStatus>> {
        self.exit.poll()
    }

    /// 終了を待つ
    pub async fn wait(&mut self) -> AgentResult<ExitStatus> {
        self.exit.wait().await
    }

    /// 終了待ちと出力読み出しを別々に進めるために分割する
    pub fn into_parts(self) -> (ProcessExit, OutputLines) {
        (self.exit, self.output)
    }
}

/// プロセスの終了監視側
pub struct ProcessExit {
    child: Child,
}

impl ProcessExit {
    /// OSプロセスID（終了後は None）
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// 終了していれば終了状態を返す（ブロックしない）
    pub fn poll(&mut self) -> AgentResult<Option<ExitStatus>> {
        self.child
            .try_wait()
            .map_err(|e| AgentError::Process(format!("Failed to poll process: {}", e)))
    }

    /// 終了を待つ
    pub async fn wait(&mut self) -> AgentResult<ExitStatus> {
        self.child
            .wait()
            .await
            .map_err(|e| AgentError::Process(format!("Failed to wait for process: {}", e)))
    }

    /// 終了させて終了状態を返す
    ///
    /// Unix ではまずプロセスグループに SIGTERM を送り、`TERMINATE_GRACE`
    /// 以内に終わらなければ SIGKILL する。
    pub async fn terminate(&mut self) -> AgentResult<ExitStatus> {
        if let Some(status) = self.poll()? {
            return Ok(status);
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            debug!(pid, "Sending SIGTERM to measurement process group");
            signal_group(pid, libc::SIGTERM);
            if let Ok(status) = tokio::time::timeout(TERMINATE_GRACE, self.wait()).await {
                return status;
            }
        }

        warn!(pid = self.child.id(), "Killing measurement process");
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            signal_group(pid, libc::SIGKILL);
        }
        self.child
            .start_kill()
            .map_err(|e| AgentError::Process(format!("Failed to kill process: {}", e)))?;
        self.wait().await
    }
}

// 子は process_group(0) で起動しているので pgid == pid
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) はポインタを受け取らない。負の pid はグループ宛て。
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        debug!(
            pid,
            "kill({}) on process group failed: {}",
            signal,
            std::io::Error::last_os_error()
        );
    }
}

/// プロセスの標準出力（行単位）
pub struct OutputLines {
    reader: BufReader<ChildStdout>,
}

impl OutputLines {
    /// 次の1行を返す（EOFで None）
    ///
    /// UTF-8として不正なバイトは置換文字に変換する。
    pub async fn next_line(&mut self) -> AgentResult<Option<String>> {
        let mut buf = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| AgentError::Process(format!("Failed to read output: {}", e)))?;
        if read == 0 {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}
