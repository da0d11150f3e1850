//! Maintenance console.
//!
//! A generated console program declares its [`StateTable`]s and BuildId and
//! calls [`main`]; everything else lives here.

pub mod automated;
pub mod cli;
pub mod runtime;
pub mod session;
pub mod tables;

use std::sync::Arc;

pub use automated::{AutomatedTest, ScriptTest, Step, TestConsole, TestRegistry};
pub use cli::{exit_code, ConsoleArgs};
pub use runtime::{run_console, spawn_reader, ReaderHandle, UpdatePrinter};
pub use session::{Commander, Reply, Session};
pub use tables::{push_table, tables_from_model, DeviceTable, StateTable};

/// Entry point of a generated console; returns the process exit code.
pub fn main(tables: Vec<StateTable>, build_id: u32) -> i32 {
    main_with_tests(tables, build_id, Vec::new())
}

/// Like [`main`], with tests registered ahead of the script tests.
pub fn main_with_tests(
    tables: Vec<StateTable>,
    build_id: u32,
    tests: Vec<Arc<dyn AutomatedTest>>,
) -> i32 {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init();
    cli::run_with_args(std::env::args_os(), tables, build_id, tests)
}
