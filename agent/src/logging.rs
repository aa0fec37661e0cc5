//! ロギング初期化ユーティリティ

use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, Error},
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_SUBDIR: &str = "logs";
const DIR_ENV: &str = "ISL_CLIENT_LOG_DIR";
const LEVEL_ENV: &str = "ISL_CLIENT_LOG_LEVEL";
const ALT_LEVEL_ENV: &str = "RUST_LOG";
const VERBOSE_FILTER: &str = "info,isl_client_agent=debug,isl_client_common=debug";

/// ログファイル名
pub const LOG_FILE_NAME: &str = "isl-client.log.jsonl";

static LOGGER_GUARD: OnceLock<Result<LoggerGuard, io::Error>> = OnceLock::new();

struct LoggerGuard {
    _file_guard: WorkerGuard,
}

/// ロギングの設定
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// 基準ディレクトリ（`logs/` をこの下に作る）
    pub base_dir: PathBuf,
    /// 標準出力にも人が読める形式で出す（デーモン時は false）
    pub console: bool,
    /// デバッグレベルまで出す
    pub verbose: bool,
}

/// 構造化ロギングを初期化する
///
/// 2回目以降の呼び出しは最初の結果を返す。
pub fn init(options: &LogOptions) -> io::Result<()> {
    match LOGGER_GUARD.get_or_init(|| configure_logger(options)) {
        Ok(_) => Ok(()),
        Err(err) => Err(io::Error::new(err.kind(), err.to_string())),
    }
}

/// ログディレクトリを返す
pub fn log_dir(base_dir: &Path) -> PathBuf {
    match env::var(DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => base_dir.join(LOG_SUBDIR),
    }
}

/// ログファイルパスを返す
pub fn log_file_path(base_dir: &Path) -> PathBuf {
    log_dir(base_dir).join(LOG_FILE_NAME)
}

fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_FILTER);
    }
    EnvFilter::try_from_env(LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_env(ALT_LEVEL_ENV))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn configure_logger(options: &LogOptions) -> io::Result<LoggerGuard> {
    let log_path = log_file_path(&options.base_dir);
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let (file_writer, file_guard) = non_blocking(file);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_current_span(false)
        .with_span_list(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let console_layer = options
        .console
        .then(|| fmt::layer().with_target(false).with_writer(io::stdout));

    tracing_subscriber::registry()
        .with(build_filter(options.verbose))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(Error::other)?;

    tracing::info!("Logs will be written to {}", log_path.display());

    Ok(LoggerGuard {
        _file_guard: file_guard,
    })
}
