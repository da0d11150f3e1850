//! Automated console tests.
//!
//! Tests are named, independently runnable checks driven through a
//! [`TestConsole`]. Script tests are loaded from `console_tests.toml`:
//!
//! ```toml
//! [[test]]
//! name = "lift"
//! steps = [
//!     { state = "MOTION" },
//!     { value = "stepperPosition", set = "$1" },
//!     { event = "runSteps" },
//!     { wait_ms = 500 },
//! ]
//! ```
//!
//! `$N` in `set` is replaced by the N-th argument given to `test name ...`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::StatewireError;
use crate::toml_helpers::toml_error;

pub const TESTS_FILE: &str = "console_tests.toml";

/// Name of the built-in test that runs every other test.
pub const ALL_TESTS: &str = "all";

/// Operations a test may perform on the console.
pub trait TestConsole {
    fn change_state(&mut self, name: &str) -> Result<(), StatewireError>;
    fn fire_event(&mut self, name: &str) -> Result<(), StatewireError>;
    fn set_value(&mut self, name: &str, text: &str) -> Result<(), StatewireError>;
    fn current_state(&self) -> &str;
}

pub trait AutomatedTest: Send + Sync {
    fn name(&self) -> &str;

    /// Run the test. Any error is reported as this test's failure.
    fn run(&self, console: &mut dyn TestConsole, args: &[String]) -> Result<(), StatewireError>;
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Step {
    State { state: String },
    Event { event: String },
    Value { value: String, set: String },
    Wait { wait_ms: u64 },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScriptTest {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct TestsFile {
    #[serde(rename = "test", default)]
    tests: Vec<ScriptTest>,
}

/// Replace `$1`, `$2`, ... with the matching argument.
fn substitute(text: &str, args: &[String]) -> Result<String, StatewireError> {
    let Some(index) = text.strip_prefix('$') else {
        return Ok(text.to_string());
    };
    let n: usize = index
        .parse()
        .map_err(|_| StatewireError::Command(format!("bad argument reference {text:?}")))?;
    n.checked_sub(1)
        .and_then(|i| args.get(i))
        .cloned()
        .ok_or_else(|| StatewireError::Command(format!("missing argument {text}")))
}

impl AutomatedTest for ScriptTest {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, console: &mut dyn TestConsole, args: &[String]) -> Result<(), StatewireError> {
        for step in &self.steps {
            match step {
                Step::State { state } => console.change_state(state)?,
                Step::Event { event } => console.fire_event(event)?,
                Step::Value { value, set } => console.set_value(value, &substitute(set, args)?)?,
                Step::Wait { wait_ms } => std::thread::sleep(Duration::from_millis(*wait_ms)),
            }
        }
        Ok(())
    }
}

/// Parse script tests from TOML text.
pub fn parse_script_tests(text: &str) -> Result<Vec<ScriptTest>, StatewireError> {
    let file: TestsFile = toml::from_str(text).map_err(|e| toml_error(TESTS_FILE, text, &e))?;
    Ok(file.tests)
}

/// Load script tests from `path`; a missing file means no tests.
pub fn load_script_tests(path: &Path) -> Result<Vec<ScriptTest>, StatewireError> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_script_tests(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StatewireError::Config(format!(
            "cannot read {}: {e}",
            path.display()
        ))),
    }
}

/// Registered tests in registration order.
#[derive(Default, Clone)]
pub struct TestRegistry {
    tests: Vec<Arc<dyn AutomatedTest>>,
}

impl TestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, test: Arc<dyn AutomatedTest>) -> Result<(), StatewireError> {
        let name = test.name();
        if name == ALL_TESTS || self.tests.iter().any(|t| t.name() == name) {
            return Err(StatewireError::Config(format!(
                "test name {name:?} already registered"
            )));
        }
        self.tests.push(test);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Test names, with the built-in `all` last when any test exists.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tests.iter().map(|t| t.name().to_string()).collect();
        if !names.is_empty() {
            names.push(ALL_TESTS.to_string());
        }
        names
    }

    /// Run test `name` and return its report lines, or `None` for an unknown name.
    pub fn run(
        &self,
        name: &str,
        console: &mut dyn TestConsole,
        args: &[String],
    ) -> Option<Vec<String>> {
        let mut report = Vec::new();
        if name == ALL_TESTS && !self.tests.is_empty() {
            let mut failed = None;
            for test in &self.tests {
                if !run_one(test.as_ref(), console, args, &mut report) {
                    failed = Some(test.name().to_string());
                    break;
                }
            }
            match failed {
                None => report.push(format!("{ALL_TESTS} finished")),
                Some(t) => report.push(format!("{ALL_TESTS} failed: {t} failed")),
            }
            return Some(report);
        }
        let test = self.tests.iter().find(|t| t.name() == name)?;
        run_one(test.as_ref(), console, args, &mut report);
        Some(report)
    }
}

/// Run one test, containing panics, and append its verdict to `report`.
fn run_one(
    test: &dyn AutomatedTest,
    console: &mut dyn TestConsole,
    args: &[String],
    report: &mut Vec<String>,
) -> bool {
    log::debug!("running test {}", test.name());
    match catch_unwind(AssertUnwindSafe(|| test.run(console, args))) {
        Ok(Ok(())) => {
            report.push(format!("{} finished", test.name()));
            true
        }
        Ok(Err(e)) => {
            report.push(format!("{} failed: {e}", test.name()));
            false
        }
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            report.push(format!("{} failed: panicked: {msg}", test.name()));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        state: String,
        calls: Vec<String>,
    }

    impl TestConsole for Recorder {
        fn change_state(&mut self, name: &str) -> Result<(), StatewireError> {
            if name == "NOPE" {
                return Err(StatewireError::Command(format!("no state named {name:?}")));
            }
            self.state = name.to_string();
            self.calls.push(format!("state {name}"));
            Ok(())
        }
        fn fire_event(&mut self, name: &str) -> Result<(), StatewireError> {
            self.calls.push(format!("event {name}"));
            Ok(())
        }
        fn set_value(&mut self, name: &str, text: &str) -> Result<(), StatewireError> {
            self.calls.push(format!("value {name} {text}"));
            Ok(())
        }
        fn current_state(&self) -> &str {
            &self.state
        }
    }

    struct Panics;

    impl AutomatedTest for Panics {
        fn name(&self) -> &str {
            "panics"
        }
        fn run(&self, _: &mut dyn TestConsole, _: &[String]) -> Result<(), StatewireError> {
            panic!("boom");
        }
    }

    const SCRIPT: &str = r#"
[[test]]
name = "spin"
steps = [
    { state = "RUN" },
    { value = "counter", set = "$1" },
    { event = "go" },
    { wait_ms = 0 },
]

[[test]]
name = "broken"
steps = [{ state = "NOPE" }]

[[test]]
name = "never"
steps = [{ event = "late" }]
"#;

    fn registry(tests: Vec<Arc<dyn AutomatedTest>>) -> TestRegistry {
        let mut r = TestRegistry::new();
        for t in tests {
            r.register(t).expect("register");
        }
        r
    }

    fn script_registry() -> TestRegistry {
        registry(
            parse_script_tests(SCRIPT)
                .expect("parse")
                .into_iter()
                .map(|t| Arc::new(t) as Arc<dyn AutomatedTest>)
                .collect(),
        )
    }

    #[test]
    fn script_steps_run_in_order_with_arguments() {
        let r = script_registry();
        let mut console = Recorder::default();
        let report = r
            .run("spin", &mut console, &["42".to_string()])
            .expect("known test");
        assert_eq!(report, vec!["spin finished"]);
        assert_eq!(console.calls, vec!["state RUN", "value counter 42", "event go"]);
        assert_eq!(console.current_state(), "RUN");
    }

    #[test]
    fn missing_argument_fails_the_test() {
        let r = script_registry();
        let report = r.run("spin", &mut Recorder::default(), &[]).expect("known test");
        assert_eq!(report, vec!["spin failed: missing argument $1"]);
    }

    #[test]
    fn all_stops_at_first_failure() {
        let r = script_registry();
        assert_eq!(r.names(), vec!["spin", "broken", "never", "all"]);
        let mut console = Recorder::default();
        let report = r
            .run(ALL_TESTS, &mut console, &["1".to_string()])
            .expect("all exists");
        assert_eq!(
            report,
            vec![
                "spin finished".to_string(),
                "broken failed: no state named \"NOPE\"".to_string(),
                "all failed: broken failed".to_string(),
            ]
        );
        assert!(!console.calls.contains(&"event late".to_string()));
    }

    #[test]
    fn panics_are_contained() {
        let r = registry(vec![Arc::new(Panics)]);
        let report = r.run("panics", &mut Recorder::default(), &[]).expect("known");
        assert_eq!(report, vec!["panics failed: panicked: boom"]);
    }

    #[test]
    fn unknown_and_empty() {
        let r = TestRegistry::new();
        assert!(r.names().is_empty());
        assert!(r.run(ALL_TESTS, &mut Recorder::default(), &[]).is_none());
        assert!(script_registry().run("nope", &mut Recorder::default(), &[]).is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut r = script_registry();
        let dup = ScriptTest {
            name: "spin".into(),
            steps: Vec::new(),
        };
        assert!(r.register(Arc::new(dup)).is_err());
    }

    #[test]
    fn toml_errors_carry_position() {
        let err = parse_script_tests("[[test]]\nname = \n").expect_err("bad toml");
        let msg = err.to_string();
        assert!(msg.contains("console_tests.toml parse error at "), "{msg}");
    }

    #[test]
    fn missing_file_means_no_tests() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_script_tests(&dir.path().join(TESTS_FILE))
            .expect("load")
            .is_empty());
        let path = dir.path().join(TESTS_FILE);
        std::fs::write(&path, SCRIPT).expect("write");
        assert_eq!(load_script_tests(&path).expect("load").len(), 3);
    }
}
