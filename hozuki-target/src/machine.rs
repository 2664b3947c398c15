//! エミュレートされたマシン状態

use crate::memory::{self, Memory};
use crate::registers::Registers;

/// モニタから見たターゲットの読み取りインターフェース
///
/// 式評価器はこのトレイト経由でのみCPU状態とメモリを参照します。
pub trait Target {
    /// 現在のレジスタファイル
    fn registers(&self) -> &Registers;

    /// ゲストメモリを幅指定で読み取る（リトルエンディアン）
    fn read_memory(&self, addr: u32, width: usize) -> memory::Result<u32>;
}

/// レジスタとメモリをまとめたマシン状態
#[derive(Debug, Clone, Default)]
pub struct Machine {
    pub registers: Registers,
    pub memory: Memory,
}

impl Machine {
    /// 指定サイズのメモリでマシンを作成する
    pub fn with_memory_size(size: usize) -> Self {
        Self {
            registers: Registers::new(),
            memory: Memory::new(size),
        }
    }
}

impl Target for Machine {
    fn registers(&self) -> &Registers {
        &self.registers
    }

    fn read_memory(&self, addr: u32, width: usize) -> memory::Result<u32> {
        self.memory.read_width(addr, width)
    }
}
