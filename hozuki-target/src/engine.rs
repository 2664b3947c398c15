//! 実行エンジンとの接続点
//!
//! 命令のデコード・実行はこのクレートの外にあります。
//! エンジンは1命令ずつマシン状態を進め、停止したかどうかを返します。

use crate::{Machine, Result};

/// 1ステップ実行後の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// 実行継続可能
    Running,
    /// ゲストが停止した（終了コード付き）
    Halted(u32),
}

/// 命令実行エンジン
pub trait Engine {
    /// 1命令だけ実行する
    fn step(&mut self, machine: &mut Machine) -> Result<StepState>;
}

/// クロージャをそのままエンジンとして使えるようにする
impl<F> Engine for F
where
    F: FnMut(&mut Machine) -> Result<StepState>,
{
    fn step(&mut self, machine: &mut Machine) -> Result<StepState> {
        self(machine)
    }
}
