//! ISL Client Agent
//!
//! 各拠点で計測ツールを実行し、結果をGraphQLで送信するエージェント

#![warn(missing_docs)]

/// テレメトリ送信クライアント（HTTPSフォールバック付き）
pub mod client;

/// コマンドライン引数
pub mod cli;

/// 終了コード
pub mod exit;

/// ロギング初期化
pub mod logging;

/// 計測ツール出力の解析
pub mod parser;

/// 計測プロセス管理
pub mod process;

/// 進捗表示
pub mod progress;

/// サイクル実行とデーモンループ
pub mod scheduler;

/// 設定ファイルの探索と読み込み
pub mod settings;

/// シャットダウン要求（Ctrl+C / SIGTERM）
pub mod shutdown;

/// 実行環境情報
pub mod system;
