//! Integration Test: Configuration Loading
//!
//! 設定ファイルの探索順と値の解釈をテスト

use isl_client_agent::settings::{self, ConfigSource, JSON_CONFIG_FILE, YAML_CONFIG_FILE};
use isl_client_common::config::TargetOs;
use std::fs;
use std::path::Path;

const YAML: &str = r#"
global:
  client:
    station: "ALA-01"
    branch: Almaty
    location: { latitude: 43.25, longitude: 76.95 }
  connection:
    type: fiber
    login: user01
    vlan: 200
    ip: 10.0.0.5
    tp: TP-7
speedtest:
  intervalSec: 3600
  commandString: speedtest --format=jsonl --progress=yes
  commandStringWin: speedtest.exe --format=jsonl --progress=yes
graphql:
  protocol: http
  url: telemetry.example.org
  port: 4000
  endpoint: /graphql
"#;

const JSON: &str = r#"{
  "global": {
    "client": {
      "station": 7,
      "branch": "Shymkent",
      "location": { "latitude": "42.3", "longitude": "69.6" }
    },
    "connection": {
      "type": "dsl",
      "login": "user07",
      "vlan": "17",
      "ip": "10.0.7.1",
      "tp": 3
    }
  },
  "speedtest": {
    "intervalSec": 120,
    "commandString": "speedtest --format=jsonl"
  },
  "graphql": {
    "url": "telemetry.example.org",
    "port": "8443"
  }
}"#;

fn write(base: &Path, relative: &str, content: &str) {
    let path = base.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_yaml_is_preferred_over_json() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), YAML_CONFIG_FILE, YAML);
    write(dir.path(), JSON_CONFIG_FILE, JSON);

    let loaded = settings::load(dir.path()).unwrap();

    assert_eq!(
        loaded.source,
        ConfigSource::Yaml(dir.path().join(YAML_CONFIG_FILE))
    );
    assert_eq!(loaded.config.global.client.station, "ALA-01");
    assert_eq!(loaded.config.speedtest.effective_interval().as_secs(), 3600);
}

#[test]
fn test_json_used_when_yaml_missing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), JSON_CONFIG_FILE, JSON);

    let loaded = settings::load(dir.path()).unwrap();
    let identity = loaded.config.identity();

    assert!(matches!(loaded.source, ConfigSource::Json(_)));
    assert_eq!(identity.station, "7");
    assert_eq!(identity.tp, "3");
    assert_eq!(identity.connection_type, "dsl");
    assert_eq!(loaded.config.graphql.port, Some(8443));
    assert_eq!(loaded.config.graphql.protocol, "http");
    assert_eq!(
        loaded.config.graphql.endpoint_url(),
        "http://telemetry.example.org:8443/graphql"
    );
    // 120秒は下限の900秒に引き上げられる
    assert_eq!(loaded.config.speedtest.effective_interval().as_secs(), 900);
}

#[test]
fn test_missing_configuration_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = settings::load(dir.path()).unwrap_err();
    assert!(err.is_config(), "{:?}", err);
}

#[test]
fn test_missing_required_field_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        YAML_CONFIG_FILE,
        &YAML.replace("  url: telemetry.example.org\n", ""),
    );

    let err = settings::load(dir.path()).unwrap_err();
    assert!(err.is_config(), "{:?}", err);
}

#[test]
fn test_unsupported_protocol_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        YAML_CONFIG_FILE,
        &YAML.replace("protocol: http", "protocol: ftp"),
    );

    let err = settings::load(dir.path()).unwrap_err();
    assert!(err.is_config(), "{:?}", err);
}

#[test]
fn test_windows_command_resolves_under_bin() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), YAML_CONFIG_FILE, YAML);
    let loaded = settings::load(dir.path()).unwrap();

    let command = loaded
        .config
        .speedtest
        .command_for(TargetOs::Windows, &loaded.bin_dir());
    assert_eq!(
        command,
        format!(
            "{}/speedtest.exe --format=jsonl --progress=yes",
            dir.path().join("bin").display()
        )
    );

    let unix = loaded
        .config
        .speedtest
        .command_for(TargetOs::Unix, &loaded.bin_dir());
    assert_eq!(unix, "speedtest --format=jsonl --progress=yes");
}

#[cfg(unix)]
#[test]
fn test_measurement_command_on_unix() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), YAML_CONFIG_FILE, YAML);
    let loaded = settings::load(dir.path()).unwrap();
    assert_eq!(
        loaded.measurement_command(),
        "speedtest --format=jsonl --progress=yes"
    );
}
