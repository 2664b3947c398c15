//! Hozuki ターゲット状態
//!
//! このクレートは、エミュレートされた32ビットx86マシンの状態を提供します。
//! レジスタファイル、ゲストメモリ、そして外部の命令実行エンジンとの接続点を定義します。

pub mod engine;
pub mod machine;
pub mod memory;
pub mod registers;

pub use engine::{Engine, StepState};
pub use machine::{Machine, Target};
pub use memory::{Memory, MemoryError, MemoryReadable, DEFAULT_MEMORY_SIZE};
pub use registers::{Register, Registers};

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;
