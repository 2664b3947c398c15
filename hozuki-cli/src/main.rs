//! Hozuki CLI - コマンドラインインターフェース
//!
//! エミュレータのデバッグモニタ hozuki のREPLインターフェース

mod engine;

use anyhow::{Context, Result};
use clap::Parser;
use engine::NopEngine;
use hozuki_core::command::COMMANDS;
use hozuki_core::config::DEFAULT_WATCHPOINT_CAPACITY;
use hozuki_core::parse::{parse_decimal, parse_hex};
use hozuki_core::{
    Command, Engine, ExecOutcome, ExprError, IdScheme, Machine, Monitor, MonitorConfig,
    ScanOutcome, WatchpointError, WatchpointId,
};
use hozuki_target::DEFAULT_MEMORY_SIZE;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Hozuki - x86 Debug Monitor
#[derive(Parser)]
#[command(name = "hozuki")]
#[command(version = "0.1.0")]
#[command(about = "Debug monitor for a 32-bit x86 emulator", long_about = None)]
struct Cli {
    /// Raw guest image to load into memory
    image: Option<PathBuf>,

    /// Address the image is loaded at; also the initial EIP
    #[arg(long, default_value = "0x100000", value_parser = parse_address)]
    load_addr: u32,

    /// Guest memory size in bytes
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    memory_size: usize,

    /// Maximum number of watchpoints
    #[arg(long, default_value_t = DEFAULT_WATCHPOINT_CAPACITY)]
    capacity: usize,

    /// Renumber freed watchpoint slots instead of issuing fresh numbers
    #[arg(long)]
    recycled_ids: bool,

    /// Run until the guest stops, then exit
    #[arg(short, long)]
    batch: bool,
}

/// 10進数または `0x` 付き16進数のアドレスをパースする
fn parse_address(s: &str) -> std::result::Result<u32, String> {
    let parsed = if s.starts_with("0x") || s.starts_with("0X") {
        parse_hex(s)
    } else {
        parse_decimal(s)
    };
    parsed.map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    // stdout はモニタの出力に使う
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut monitor = init_monitor(&cli)?;
    let mut engine = NopEngine;

    if cli.batch {
        return handle_execute(&mut monitor, &mut engine, u64::MAX);
    }

    println!("Hozuki - x86 Debug Monitor");
    println!("Version 0.1.0");
    println!();

    run_repl(&mut monitor, &mut engine)
}

/// マシンを用意してゲストイメージを読み込む
fn init_monitor(cli: &Cli) -> Result<Monitor> {
    let mut machine = Machine::with_memory_size(cli.memory_size);

    if let Some(path) = &cli.image {
        let image = std::fs::read(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        machine.memory.load(cli.load_addr, &image)?;
        info!(
            "Loaded {} bytes from {} at 0x{:08x}",
            image.len(),
            path.display(),
            cli.load_addr
        );
    }
    machine.registers.set_pc(cli.load_addr);

    let id_scheme = if cli.recycled_ids {
        IdScheme::Recycled
    } else {
        IdScheme::Monotonic
    };
    let config = MonitorConfig::new()
        .with_capacity(cli.capacity)
        .with_id_scheme(id_scheme);

    Monitor::with_config(machine, config)
}

/// REPLループを実行する
fn run_repl(monitor: &mut Monitor, engine: &mut dyn Engine) -> Result<()> {
    println!("Type 'help' for available commands, 'q' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(hozuki) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match Command::parse(line) {
                    Some(Command::Quit) => break,
                    Some(command) => {
                        if let Err(e) = handle_command(monitor, engine, command) {
                            eprintln!("Error: {:#}", e);
                        }
                    }
                    None => {
                        println!("Unknown command: {}", line);
                        println!("Type 'help' for available commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

fn handle_command(monitor: &mut Monitor, engine: &mut dyn Engine, command: Command) -> Result<()> {
    match command {
        Command::Help(name) => print_help(name.as_deref()),
        Command::Continue => handle_execute(monitor, engine, u64::MAX)?,
        Command::Step(steps) => handle_execute(monitor, engine, steps)?,
        Command::InfoRegisters => print_registers(monitor),
        Command::InfoWatchpoints => print_watchpoints(monitor),
        Command::Print(expr) => match monitor.evaluate(&expr) {
            Ok(value) => println!("0x{:08x}\t{}", value, value),
            Err(e) => report_expr_error(&expr, &e),
        },
        Command::Examine { count, expr } => handle_examine(monitor, count, &expr),
        Command::Watch(expr) => handle_watch(monitor, &expr),
        Command::Delete(id) => handle_delete(monitor, id),
        Command::Quit => {}
    }

    Ok(())
}

/// 実行してから停止理由を表示する
fn handle_execute(monitor: &mut Monitor, engine: &mut dyn Engine, steps: u64) -> Result<()> {
    match monitor.execute(engine, steps)? {
        ExecOutcome::Completed { .. } => {
            println!("0x{:08x}", monitor.machine().registers.get_pc());
        }
        ExecOutcome::Halted { steps, code } => {
            println!("Guest halted with code {} after {} instruction(s)", code, steps);
        }
        ExecOutcome::Watchpoint { outcome, .. } => {
            print_scan_outcome(monitor, &outcome);
            println!("Stopped at 0x{:08x}", monitor.machine().registers.get_pc());
        }
    }
    Ok(())
}

fn print_scan_outcome(monitor: &Monitor, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Hit { id, old_value, new_value } => {
            println!();
            println!("Watchpoint {}: {}", id, watched_expr(monitor, *id));
            println!();
            println!("Old value = 0x{:08x} ({})", old_value, old_value);
            println!("New value = 0x{:08x} ({})", new_value, new_value);
        }
        ScanOutcome::Fault { id, error } => {
            println!();
            println!("Watchpoint {}: {}", id, watched_expr(monitor, *id));
            println!("Cannot evaluate: {}", error);
        }
        ScanOutcome::NoChange => {}
    }
}

fn watched_expr(monitor: &Monitor, id: WatchpointId) -> String {
    monitor
        .watchpoint_pool()
        .get(id)
        .map(|w| w.expr)
        .unwrap_or_default()
}

fn print_registers(monitor: &Monitor) {
    for (name, value) in monitor.register_dump() {
        println!("{}\t0x{:08x}\t{}", name, value, value);
    }
}

fn print_watchpoints(monitor: &Monitor) {
    let watchpoints = monitor.watchpoints();
    if watchpoints.is_empty() {
        println!("No watchpoints.");
        return;
    }

    println!("Num\tValue\t\tWhat");
    for w in watchpoints {
        println!("{}\t0x{:08x}\t{}", w.id, w.value, w.expr);
    }
}

fn handle_examine(monitor: &Monitor, count: usize, expr: &str) {
    match monitor.examine(expr, count) {
        Ok(words) => {
            for (addr, value) in words {
                let bytes: Vec<String> = value
                    .to_le_bytes()
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect();
                println!("0x{:08x}:\t0x{:08x}\t{}", addr, value, bytes.join(" "));
            }
        }
        Err(e) => report_expr_error(expr, &e),
    }
}

fn handle_watch(monitor: &mut Monitor, expr: &str) {
    match monitor.set_watchpoint(expr) {
        Ok(id) => println!("Watchpoint {}: {}", id, expr),
        Err(WatchpointError::Expr(e)) => report_expr_error(expr, &e),
        Err(e) => println!("Error: {}", e),
    }
}

fn handle_delete(monitor: &mut Monitor, id: Option<WatchpointId>) {
    match id {
        Some(id) => match monitor.delete_watchpoint(id) {
            Ok(()) => println!("Watchpoint {} deleted", id),
            Err(e) => println!("Error: {}", e),
        },
        None => {
            monitor.delete_all_watchpoints();
            println!("All watchpoints deleted");
        }
    }
}

/// 字句解析エラーなら入力のどこで失敗したかも表示する
fn report_expr_error(expr: &str, error: &ExprError) {
    match error {
        ExprError::Lex(e) => println!("Error: {}", e.diagnostic(expr)),
        e => println!("Error: {}", e),
    }
}

fn print_help(name: Option<&str>) {
    match name {
        None => {
            println!("Available commands:");
            println!();
            for (name, description) in COMMANDS {
                println!("  {:<6} - {}", name, description);
            }
            println!();
            println!("Examples:");
            println!("  p $eax + 4 * 2");
            println!("  x 4 $esp");
            println!("  w *0x100000");
            println!("  si 10");
        }
        Some(name) => match COMMANDS.iter().find(|(n, _)| *n == name) {
            Some((name, description)) => println!("{} - {}", name, description),
            None => println!("Unknown command '{}'", name),
        },
    }
}
