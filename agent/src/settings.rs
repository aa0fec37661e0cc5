//! 設定ファイルの探索と読み込み
//!
//! `<base>/config.yaml` を優先し、なければ `<base>/config/default.json` を使う。

use isl_client_common::{
    config::{ClientConfig, TargetOs},
    error::{AgentError, AgentResult},
};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// YAML設定ファイル名
pub const YAML_CONFIG_FILE: &str = "config.yaml";
/// JSON設定ファイル（`<base>` からの相対パス）
pub const JSON_CONFIG_FILE: &str = "config/default.json";
/// Windows用計測ツールの配置ディレクトリ
pub const BIN_DIR: &str = "bin";

/// 採用した設定ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// YAML
    Yaml(PathBuf),
    /// JSON
    Json(PathBuf),
}

impl ConfigSource {
    /// ファイルパス
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Yaml(path) | ConfigSource::Json(path) => path,
        }
    }
}

/// 読み込み済みの設定一式
#[derive(Debug, Clone)]
pub struct Settings {
    /// 検証済みの設定
    pub config: ClientConfig,
    /// 基準ディレクトリ
    pub base_dir: PathBuf,
    /// 読み込んだファイル
    pub source: ConfigSource,
}

impl Settings {
    /// 計測ツールの配置ディレクトリ
    pub fn bin_dir(&self) -> PathBuf {
        self.base_dir.join(BIN_DIR)
    }

    /// 実行中のOS向けの計測コマンド
    pub fn measurement_command(&self) -> String {
        self.config
            .speedtest
            .command_for(TargetOs::current(), &self.bin_dir())
    }
}

/// 基準ディレクトリを決める
///
/// 明示指定がなければ実行ファイルのあるディレクトリ。
pub fn resolve_base_dir(explicit: Option<&Path>) -> AgentResult<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }

    let exe = env::current_exe().map_err(|e| {
        AgentError::Config(format!("Failed to resolve executable path: {}", e))
    })?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        AgentError::Config(format!(
            "Executable path has no parent directory: {}",
            exe.display()
        ))
    })
}

/// 設定ファイルを探す
pub fn discover(base_dir: &Path) -> AgentResult<ConfigSource> {
    let yaml = base_dir.join(YAML_CONFIG_FILE);
    let json = base_dir.join(JSON_CONFIG_FILE);

    match (yaml.is_file(), json.is_file()) {
        (true, true) => {
            warn!(
                "Both {} and {} exist; using {}",
                yaml.display(),
                json.display(),
                yaml.display()
            );
            Ok(ConfigSource::Yaml(yaml))
        }
        (true, false) => Ok(ConfigSource::Yaml(yaml)),
        (false, true) => Ok(ConfigSource::Json(json)),
        (false, false) => Err(AgentError::Config(format!(
            "No configuration found: expected {} or {}",
            yaml.display(),
            json.display()
        ))),
    }
}

/// 指定のファイルを読み込んで検証する
pub fn load_from(source: &ConfigSource) -> AgentResult<ClientConfig> {
    let path = source.path();
    let content = fs::read_to_string(path)
        .map_err(|e| AgentError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let config: ClientConfig = match source {
        ConfigSource::Yaml(_) => serde_yml::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Invalid YAML in {}: {}", path.display(), e)))?,
        ConfigSource::Json(_) => serde_json::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Invalid JSON in {}: {}", path.display(), e)))?,
    };

    config.validate()?;
    Ok(config)
}

/// 基準ディレクトリから設定を読み込む
pub fn load(base_dir: &Path) -> AgentResult<Settings> {
    let source = discover(base_dir)?;
    let config = load_from(&source)?;
    info!("Configuration loaded from {}", source.path().display());

    Ok(Settings {
        config,
        base_dir: base_dir.to_path_buf(),
        source,
    })
}
