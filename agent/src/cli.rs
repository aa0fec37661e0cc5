//! コマンドライン引数

use crate::scheduler::RunMode;
use clap::Parser;
use std::path::PathBuf;

/// ISL Client - periodic internet speed measurement reporter
#[derive(Parser, Debug)]
#[command(name = "isl-client")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    ISL_CLIENT_HOME           Configuration base directory (default: executable directory)
    ISL_CLIENT_LOG_DIR        Log directory (default: <base>/logs)
    ISL_CLIENT_LOG_LEVEL      Log level (default: info)
"#)]
pub struct Cli {
    /// Run continuously, measuring at the configured interval
    #[arg(short, long)]
    pub daemon: bool,

    /// Log intermediate values and skipped output lines
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory containing config.yaml or config/default.json
    #[arg(long, env = "ISL_CLIENT_HOME", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Cli {
    /// 実行モード
    pub fn mode(&self) -> RunMode {
        if self.daemon {
            RunMode::Daemon
        } else {
            RunMode::OneShot
        }
    }
}
