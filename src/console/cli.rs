//! Console command line and exit codes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use super::automated::{load_script_tests, AutomatedTest, TestRegistry, TESTS_FILE};
use super::runtime::run_console;
use super::tables::StateTable;
use crate::deployment::{Deployment, HARDWARE_FILE};
use crate::error::StatewireError;
use crate::transport::{find_port_by_serial_number, Transport};

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG: i32 = 1;
pub const EXIT_COMMUNICATIONS: i32 = 2;
pub const EXIT_VERSION_MISMATCH: i32 = 3;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(about = "Maintenance console for a statewire deployment")]
pub struct ConsoleArgs {
    /// Serial device of the primary board; discovered from hardware.json when omitted
    pub port: Option<String>,

    /// Connect to host:port over TCP instead of a serial device
    #[arg(long, conflicts_with = "port")]
    pub tcp: Option<String>,

    /// Deployment config used for port discovery
    #[arg(long, default_value = HARDWARE_FILE)]
    pub hardware: PathBuf,

    /// Script tests file
    #[arg(long, default_value = TESTS_FILE)]
    pub tests: PathBuf,
}

/// Exit code for a fatal console error.
#[must_use]
pub const fn exit_code(e: &StatewireError) -> i32 {
    match e {
        StatewireError::VersionMismatch { .. } => EXIT_VERSION_MISMATCH,
        StatewireError::Communications(_)
        | StatewireError::Transport(_)
        | StatewireError::Protocol(_)
        | StatewireError::Io(_) => EXIT_COMMUNICATIONS,
        StatewireError::Description { .. }
        | StatewireError::Generation(_)
        | StatewireError::Command(_)
        | StatewireError::Config(_) => EXIT_CONFIG,
    }
}

/// Open the transport named by `args`, falling back to the primary unit
/// listed in the deployment config.
pub fn open_transport(args: &ConsoleArgs) -> Result<Transport, StatewireError> {
    if let Some(addr) = &args.tcp {
        return Transport::connect_tcp(addr);
    }
    if let Some(port) = &args.port {
        return Transport::open_serial(port);
    }
    let port = discover_primary(&args.hardware)?;
    Transport::open_serial(&port)
}

fn discover_primary(hardware: &Path) -> Result<String, StatewireError> {
    let deployment = Deployment::load(hardware)?;
    let (unit, config) = deployment.primary_unit()?;
    log::info!(
        "looking for unit{unit} of {} (serial {})",
        deployment.name,
        config.serial_number
    );
    find_port_by_serial_number(&config.serial_number)?.ok_or_else(|| {
        StatewireError::Transport(format!("primary unit{unit} is not connected"))
    })
}

/// Build the test registry from `extra` tests and the script file.
pub fn load_tests(
    path: &Path,
    extra: Vec<Arc<dyn AutomatedTest>>,
) -> Result<TestRegistry, StatewireError> {
    let mut registry = TestRegistry::new();
    for test in extra {
        registry.register(test)?;
    }
    for test in load_script_tests(path)? {
        registry.register(Arc::new(test))?;
    }
    Ok(registry)
}

/// Parse arguments and run the console; returns the process exit code.
pub fn run_with_args<I, T>(
    argv: I,
    tables: Vec<StateTable>,
    build_id: u32,
    extra_tests: Vec<Arc<dyn AutomatedTest>>,
) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = match ConsoleArgs::try_parse_from(argv) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { EXIT_CONFIG } else { EXIT_OK };
        }
    };
    match run(&args, tables, build_id, extra_tests) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("{e}, exiting...");
            exit_code(&e)
        }
    }
}

fn run(
    args: &ConsoleArgs,
    tables: Vec<StateTable>,
    build_id: u32,
    extra_tests: Vec<Arc<dyn AutomatedTest>>,
) -> Result<(), StatewireError> {
    let tests = load_tests(&args.tests, extra_tests)?;
    let transport = open_transport(args)?;
    run_console(transport, tables, build_id, tests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_failures() {
        assert_eq!(
            exit_code(&StatewireError::VersionMismatch {
                expected: 1,
                actual: 2
            }),
            3
        );
        assert_eq!(exit_code(&StatewireError::Communications("x".into())), 2);
        assert_eq!(exit_code(&StatewireError::Transport("x".into())), 2);
        assert_eq!(exit_code(&StatewireError::Config("x".into())), 1);
    }

    #[test]
    fn args_parse() {
        let a = ConsoleArgs::try_parse_from(["console", "/dev/ttyACM0"]).expect("parse");
        assert_eq!(a.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(a.hardware, PathBuf::from(HARDWARE_FILE));
        let a = ConsoleArgs::try_parse_from(["console", "--tcp", "127.0.0.1:5000"]).expect("parse");
        assert_eq!(a.tcp.as_deref(), Some("127.0.0.1:5000"));
        assert!(ConsoleArgs::try_parse_from(["console", "a", "b"]).is_err());
        assert!(ConsoleArgs::try_parse_from(["console", "a", "--tcp", "x:1"]).is_err());
    }

    #[test]
    fn usage_and_config_errors_exit_1() {
        assert_eq!(run_with_args(["console", "a", "b"], Vec::new(), 0, Vec::new()), EXIT_CONFIG);
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("hardware.json");
        let code = run_with_args(
            [
                "console".into(),
                "--hardware".into(),
                missing.into_os_string(),
                "--tests".into(),
                dir.path().join("none.toml").into_os_string(),
            ],
            Vec::new(),
            0,
            Vec::new(),
        );
        assert_eq!(code, EXIT_CONFIG);
    }

    #[test]
    fn refused_connection_exits_2() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        drop(listener);
        let dir = tempfile::tempdir().expect("tempdir");
        let code = run_with_args(
            [
                "console".to_string(),
                "--tcp".to_string(),
                addr,
                "--tests".to_string(),
                dir.path().join("none.toml").to_string_lossy().into_owned(),
            ],
            Vec::new(),
            0,
            Vec::new(),
        );
        assert_eq!(code, EXIT_COMMUNICATIONS);
    }
}
