//! 実行エンジンと組み合わせたウォッチポイントのテスト

use hozuki_core::{
    ExecOutcome, IdScheme, Machine, Monitor, MonitorConfig, Register, ScanOutcome, StepState,
    WatchpointError, WatchpointId,
};

/// ecx をカウンタとして1ずつ増やし、[0x80] にも書き込むエンジン
///
/// ecx が `limit` に達したらゲストを停止させる。
fn counting_engine(limit: u32) -> impl FnMut(&mut Machine) -> anyhow::Result<StepState> {
    move |machine: &mut Machine| {
        let ecx = Register::ECX;
        let next = machine.registers.get(ecx) + 1;
        machine.registers.set(ecx, next);
        machine.memory.write_u32(0x80, next * 2)?;

        let pc = machine.registers.get_pc();
        machine.registers.set_pc(pc + 1);

        if next >= limit {
            Ok(StepState::Halted(0))
        } else {
            Ok(StepState::Running)
        }
    }
}

fn hit(id: WatchpointId, old_value: u32, new_value: u32) -> ScanOutcome {
    ScanOutcome::Hit {
        id,
        old_value,
        new_value,
    }
}

fn monitor() -> Monitor {
    Monitor::new(Machine::with_memory_size(0x1000)).expect("Failed to create monitor")
}

#[test]
fn test_run_to_completion_without_watchpoints() {
    let mut monitor = monitor();
    let mut engine = counting_engine(100);

    let outcome = monitor.execute(&mut engine, 10).unwrap();
    assert_eq!(outcome, ExecOutcome::Completed { steps: 10 });
    assert_eq!(monitor.evaluate("$ecx").unwrap(), 10);
    assert_eq!(monitor.evaluate("$eip").unwrap(), 10);
}

#[test]
fn test_halt_is_reported() {
    let mut monitor = monitor();
    let mut engine = counting_engine(3);

    let outcome = monitor.execute(&mut engine, u64::MAX).unwrap();
    assert_eq!(outcome, ExecOutcome::Halted { steps: 3, code: 0 });
}

#[test]
fn test_watchpoint_stops_execution() {
    let mut monitor = monitor();
    let mut engine = counting_engine(100);

    // ecx が 4 になった時点で条件式が 0 -> 1 に変わる
    let id = monitor.set_watchpoint("$ecx == 4").unwrap();
    let outcome = monitor.execute(&mut engine, u64::MAX).unwrap();

    assert_eq!(
        outcome,
        ExecOutcome::Watchpoint {
            steps: 4,
            outcome: hit(id, 0, 1),
        }
    );
    // 新しい値が基準値として確定している
    assert_eq!(monitor.watchpoints()[0].value, 1);

    // 次のステップで 1 -> 0 に戻る
    let outcome = monitor.execute(&mut engine, u64::MAX).unwrap();
    assert_eq!(
        outcome,
        ExecOutcome::Watchpoint {
            steps: 1,
            outcome: hit(id, 1, 0),
        }
    );
}

#[test]
fn test_memory_watchpoint_through_dereference() {
    let mut monitor = monitor();
    let mut engine = counting_engine(100);
    monitor.machine_mut().registers.set(Register::ESI, 0x80);

    let id = monitor.set_watchpoint("*$esi / 2").unwrap();
    let outcome = monitor.execute(&mut engine, 1).unwrap();

    assert_eq!(
        outcome,
        ExecOutcome::Watchpoint {
            steps: 1,
            outcome: hit(id, 0, 1),
        }
    );
}

#[test]
fn test_only_second_watchpoint_diverges() {
    let mut monitor = monitor();
    let _stable = monitor.set_watchpoint("$eax + 1").unwrap();
    let counter = monitor.set_watchpoint("$cl").unwrap();

    monitor.machine_mut().registers.set(Register::ECX, 0x1ff);

    assert_eq!(monitor.scan(), hit(counter, 0, 0xff));
    monitor.acknowledge();
    assert_eq!(monitor.scan(), ScanOutcome::NoChange);
    assert_eq!(monitor.scan(), ScanOutcome::NoChange);
}

#[test]
fn test_fault_stops_execution() {
    let mut monitor = monitor();
    // 1ステップごとに esi を大きく進めるエンジン
    let mut engine = |machine: &mut Machine| -> anyhow::Result<StepState> {
        let esi = Register::ESI;
        let next = machine.registers.get(esi) + 0x800;
        machine.registers.set(esi, next);
        Ok(StepState::Running)
    };

    let id = monitor.set_watchpoint("*$esi").unwrap();
    let outcome = monitor.execute(&mut engine, 10).unwrap();

    match outcome {
        ExecOutcome::Watchpoint {
            steps,
            outcome: ScanOutcome::Fault { id: fault_id, .. },
        } => {
            // 0x1000 はメモリの外
            assert_eq!(steps, 2);
            assert_eq!(fault_id, id);
        }
        other => panic!("Expected fault, got {:?}", other),
    }
}

#[test]
fn test_capacity_boundary() {
    let mut monitor = monitor();

    for i in 0..32 {
        monitor.set_watchpoint(&format!("$eax + {}", i)).unwrap();
    }
    assert_eq!(
        monitor.set_watchpoint("$eax"),
        Err(WatchpointError::PoolExhausted { capacity: 32 })
    );

    let pool = monitor.watchpoint_pool();
    assert_eq!(pool.count(), 32);
    assert_eq!(pool.free_count(), 0);
    assert!(pool.check_partition());

    monitor.delete_all_watchpoints();
    assert!(monitor.watchpoints().is_empty());
    assert_eq!(monitor.watchpoint_pool().free_count(), 32);
}

#[test]
fn test_delete_and_list() {
    let mut monitor = monitor();
    let a = monitor.set_watchpoint("$eax").unwrap();
    let b = monitor.set_watchpoint("$ebx").unwrap();
    let c = monitor.set_watchpoint("$ecx").unwrap();

    monitor.delete_watchpoint(b).unwrap();
    assert_eq!(monitor.delete_watchpoint(b), Err(WatchpointError::NotFound(b)));

    let ids: Vec<_> = monitor.watchpoints().iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![a, c]);
}

#[test]
fn test_custom_configuration() {
    let config = MonitorConfig::new()
        .with_capacity(2)
        .with_id_scheme(IdScheme::Recycled);
    let mut monitor = Monitor::with_config(Machine::with_memory_size(0x100), config).unwrap();

    assert_eq!(monitor.set_watchpoint("1").unwrap(), 0);
    assert_eq!(monitor.set_watchpoint("2").unwrap(), 1);
    assert_eq!(
        monitor.set_watchpoint("3"),
        Err(WatchpointError::PoolExhausted { capacity: 2 })
    );
}
