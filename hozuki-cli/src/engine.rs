//! NOP と HLT だけを実行する最小のエンジン
//!
//! 命令デコーダはモニタの外にあるため、CLI 単体ではこのエンジンで
//! ゲストイメージを進める。

use anyhow::{bail, Result};
use hozuki_core::{Engine, Machine, Register, StepState};
use tracing::trace;

pub const NOP: u8 = 0x90;
pub const HLT: u8 = 0xf4;

/// NOP で EIP を1進め、HLT で EAX を終了コードとして停止する
#[derive(Debug, Default)]
pub struct NopEngine;

impl Engine for NopEngine {
    fn step(&mut self, machine: &mut Machine) -> Result<StepState> {
        let pc = machine.registers.get_pc();
        let opcode = machine.memory.read_u8(pc)?;
        trace!("0x{:08x}: {:02x}", pc, opcode);

        match opcode {
            NOP => {
                machine.registers.set_pc(pc.wrapping_add(1));
                Ok(StepState::Running)
            }
            // EIP は HLT に留まる
            HLT => Ok(StepState::Halted(machine.registers.get(Register::EAX))),
            other => bail!("Unsupported opcode 0x{:02x} at 0x{:08x}", other, pc),
        }
    }
}
