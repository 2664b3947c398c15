//! モニタのメインロジック
//!
//! 式評価器、ウォッチポイントプール、ターゲットのマシン状態を1つのセッションにまとめます。
//! プロセス全体の静的状態は持たず、すべての操作はこのオブジェクトを経由します。

use crate::config::MonitorConfig;
use crate::errors::WatchpointError;
use crate::expr_eval::{EvalResult, ExpressionEvaluator};
use crate::lexer::Lexer;
use crate::watchpoint::{ScanOutcome, WatchpointId, WatchpointInfo, WatchpointPool};
use crate::Result;
use hozuki_target::{Engine, Machine, MemoryError, StepState, Target};
use tracing::debug;

/// `execute` の停止理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// 指定されたステップ数を実行し終えた
    Completed { steps: u64 },
    /// ゲストが停止した
    Halted { steps: u64, code: u32 },
    /// ウォッチポイントの変化（または再評価の失敗）で停止した
    Watchpoint { steps: u64, outcome: ScanOutcome },
}

/// デバッグモニタ
pub struct Monitor {
    /// ターゲットのマシン状態
    machine: Machine,
    /// 字句解析器（ルール表はここで一度だけコンパイルされる）
    lexer: Lexer,
    /// ウォッチポイント管理
    watchpoints: WatchpointPool,
}

impl Monitor {
    /// デフォルト設定でモニタを作成する
    pub fn new(machine: Machine) -> Result<Self> {
        Self::with_config(machine, MonitorConfig::default())
    }

    /// 設定を指定してモニタを作成する
    pub fn with_config(machine: Machine, config: MonitorConfig) -> Result<Self> {
        Ok(Self {
            machine,
            lexer: Lexer::new(config.lexer)?,
            watchpoints: WatchpointPool::new(config.capacity, config.id_scheme),
        })
    }

    /// マシン状態を取得する
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// マシン状態を可変参照で取得する
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// ウォッチポイントプールを取得する
    pub fn watchpoint_pool(&self) -> &WatchpointPool {
        &self.watchpoints
    }

    /// 現在のマシン状態に対して式を評価する
    pub fn evaluate(&self, expr: &str) -> EvalResult<u32> {
        ExpressionEvaluator::new(&self.lexer, &self.machine).evaluate(expr)
    }

    /// ウォッチポイントを設定する
    pub fn set_watchpoint(
        &mut self,
        expr: &str,
    ) -> std::result::Result<WatchpointId, WatchpointError> {
        let evaluator = ExpressionEvaluator::new(&self.lexer, &self.machine);
        self.watchpoints.set(expr, |e| evaluator.evaluate(e))
    }

    /// ウォッチポイントを削除する
    pub fn delete_watchpoint(
        &mut self,
        id: WatchpointId,
    ) -> std::result::Result<(), WatchpointError> {
        self.watchpoints.delete(id)
    }

    /// すべてのウォッチポイントを削除する
    pub fn delete_all_watchpoints(&mut self) {
        self.watchpoints.delete_all()
    }

    /// すべてのウォッチポイントを登録順に取得する
    pub fn watchpoints(&self) -> Vec<WatchpointInfo> {
        self.watchpoints.list()
    }

    /// ウォッチポイントを走査して最初の変化を探す
    pub fn scan(&mut self) -> ScanOutcome {
        let evaluator = ExpressionEvaluator::new(&self.lexer, &self.machine);
        self.watchpoints.scan(|e| evaluator.evaluate(e))
    }

    /// 直前に報告された変化を確定する
    pub fn acknowledge(&mut self) -> Option<WatchpointId> {
        self.watchpoints.acknowledge()
    }

    /// 走査して、変化があればその場で確定する
    ///
    /// 1ステップ実行するたびに呼ぶことを想定している。
    pub fn check(&mut self) -> ScanOutcome {
        let outcome = self.scan();
        if outcome != ScanOutcome::NoChange {
            self.acknowledge();
        }
        outcome
    }

    /// 実行エンジンで最大 `steps` ステップ実行する
    ///
    /// 1ステップごとにウォッチポイントを検査し、変化があればそこで止まる。
    /// `u64::MAX` を渡すと停止するまで実行し続ける。
    pub fn execute<E>(&mut self, engine: &mut E, steps: u64) -> Result<ExecOutcome>
    where
        E: Engine + ?Sized,
    {
        for step in 1..=steps {
            let state = engine.step(&mut self.machine)?;

            let outcome = self.check();
            if outcome != ScanOutcome::NoChange {
                debug!("Stopped by watchpoint after {} step(s)", step);
                return Ok(ExecOutcome::Watchpoint {
                    steps: step,
                    outcome,
                });
            }

            if let StepState::Halted(code) = state {
                debug!("Guest halted with code {} after {} step(s)", code, step);
                return Ok(ExecOutcome::Halted { steps: step, code });
            }
        }

        Ok(ExecOutcome::Completed { steps })
    }

    /// 式で指定したアドレスから `words` 個の32ビット値を読む
    ///
    /// 戻り値は (アドレス, 値) の組。メモリ全体より長い範囲は読む前に拒否する。
    pub fn examine(&self, expr: &str, words: usize) -> EvalResult<Vec<(u32, u32)>> {
        let base = self.evaluate(expr)?;

        let len = words.saturating_mul(4);
        let count = u32::try_from(words)
            .ok()
            .filter(|_| len <= self.machine.memory.size())
            .ok_or(MemoryError::OutOfBounds { addr: base, len })?;

        (0..count)
            .map(|i| -> EvalResult<(u32, u32)> {
                let addr = base.wrapping_add(i.wrapping_mul(4));
                let value = self.machine.read_memory(addr, 4)?;
                Ok((addr, value))
            })
            .collect()
    }

    /// 32ビット汎用レジスタと EIP の一覧
    pub fn register_dump(&self) -> Vec<(&'static str, u32)> {
        self.machine.registers.dump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExprError;
    use hozuki_target::Register;

    fn monitor() -> Monitor {
        let mut machine = Machine::with_memory_size(0x1000);
        machine.registers.set(Register::EAX, 0x100);
        machine.memory.write_u32(0x100, 42).unwrap();
        Monitor::new(machine).unwrap()
    }

    #[test]
    fn test_evaluate_against_machine() {
        let monitor = monitor();
        assert_eq!(monitor.evaluate("*$eax").unwrap(), 42);
        assert_eq!(monitor.evaluate("3*$eax").unwrap(), 0x300);
    }

    #[test]
    fn test_set_uses_current_value_as_baseline() {
        let mut monitor = monitor();
        let id = monitor.set_watchpoint("*$eax + 1").unwrap();

        assert_eq!(
            monitor.watchpoints(),
            vec![WatchpointInfo {
                id,
                expr: "*$eax + 1".to_string(),
                value: 43,
            }]
        );
    }

    #[test]
    fn test_set_rejects_bad_expression() {
        let mut monitor = monitor();
        assert!(matches!(
            monitor.set_watchpoint("(1+2"),
            Err(WatchpointError::Expr(ExprError::MalformedRange { .. }))
        ));
        assert!(monitor.watchpoints().is_empty());
        assert_eq!(monitor.watchpoint_pool().free_count(), 32);
    }

    #[test]
    fn test_scan_sees_machine_mutation() {
        let mut monitor = monitor();
        let a = monitor.set_watchpoint("$eax").unwrap();
        let b = monitor.set_watchpoint("*0x100").unwrap();

        monitor.machine_mut().memory.write_u32(0x100, 7).unwrap();
        assert_eq!(
            monitor.check(),
            ScanOutcome::Hit {
                id: b,
                old_value: 42,
                new_value: 7,
            }
        );
        assert_eq!(monitor.check(), ScanOutcome::NoChange);
        assert_eq!(monitor.check(), ScanOutcome::NoChange);

        monitor.machine_mut().registers.set(Register::EAX, 0x200);
        assert!(matches!(
            monitor.check(),
            ScanOutcome::Hit { id, new_value: 0x200, .. } if id == a
        ));
    }

    #[test]
    fn test_scan_fault_on_bad_dereference() {
        let mut monitor = monitor();
        let id = monitor.set_watchpoint("*$eax").unwrap();

        monitor.machine_mut().registers.set(Register::EAX, 0xffff_0000);
        assert_eq!(
            monitor.scan(),
            ScanOutcome::Fault {
                id,
                error: ExprError::Memory(MemoryError::OutOfBounds {
                    addr: 0xffff_0000,
                    len: 4,
                }),
            }
        );
    }

    #[test]
    fn test_examine() {
        let mut monitor = monitor();
        monitor.machine_mut().memory.write_u32(0x104, 0xabcd).unwrap();

        assert_eq!(
            monitor.examine("$eax", 2).unwrap(),
            vec![(0x100, 42), (0x104, 0xabcd)]
        );
        assert!(monitor.examine("0xffc", 2).is_err());
        assert!(monitor.examine("0xffc", 1).is_ok());
    }

    #[test]
    fn test_examine_rejects_counts_larger_than_memory() {
        let monitor = monitor();

        // 0x1000 バイトのメモリには 0x400 語しかない
        assert_eq!(monitor.examine("0", 0x400).unwrap().len(), 0x400);
        assert_eq!(
            monitor.examine("0", 0x401),
            Err(ExprError::Memory(MemoryError::OutOfBounds {
                addr: 0,
                len: 0x1004,
            }))
        );

        // u32 に収まらない語数も切り詰めずに拒否する
        let huge = u32::MAX as usize + 2;
        assert!(matches!(
            monitor.examine("0", huge),
            Err(ExprError::Memory(MemoryError::OutOfBounds { addr: 0, .. }))
        ));
    }

    #[test]
    fn test_register_dump() {
        let monitor = monitor();
        let dump = monitor.register_dump();
        assert_eq!(dump[0], ("eax", 0x100));
        assert_eq!(dump.last(), Some(&("eip", 0)));
    }
}
