//! Hozuki デバッグモニタのコア機能
//!
//! このクレートは、エミュレータのデバッグモニタの中核となるロジックを提供します。
//! レジスタやメモリを参照する式の評価と、値の変化を検出するウォッチポイントを扱います。

pub mod command;
pub mod config;
pub mod errors;
pub mod expr_eval;
pub mod lexer;
pub mod monitor;
pub mod parse;
pub mod watchpoint;

pub use command::Command;
pub use config::{IdScheme, LexerLimits, MonitorConfig};
pub use errors::{ExprError, LexError, WatchpointError};
pub use expr_eval::ExpressionEvaluator;
pub use lexer::{Lexer, Token, TokenKind};
pub use monitor::{ExecOutcome, Monitor};
pub use watchpoint::{ScanOutcome, WatchpointId, WatchpointInfo, WatchpointPool};

// 他のクレートから使用するために再エクスポート
pub use hozuki_target::{Engine, Machine, Register, StepState};

/// モニタの結果型
pub type Result<T> = anyhow::Result<T>;
