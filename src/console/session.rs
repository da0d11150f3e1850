//! Console session: command dispatch, the encoder side of the protocol and
//! tab completion.
//!
//! The session owns the current state. Only a successful `state NAME`
//! command (or a test doing the same) changes it; every command error is
//! local and leaves the session untouched.

use std::io::Write;

use super::automated::{TestConsole, TestRegistry};
use super::tables::StateTable;
use crate::config::maybe_log_frame;
use crate::error::StatewireError;
use crate::frame::Command;

pub const COMMANDS: [&str; 6] = ["event", "help", "state", "value", "test", "quit"];

pub const HELP_TEXT: [&str; 5] = [
    "state [name]: list or change states",
    "value [name] [value]: list values or change value",
    "event [name]: list events or send event",
    "test [name] [args]: run automated test",
    "quit: quit",
];

/// Encodes console commands against the current state and writes them.
pub struct Commander<W: Write> {
    tables: Vec<StateTable>,
    current: usize,
    writer: W,
}

impl<W: Write> Commander<W> {
    /// `initial_state` is the id the device reported in the handshake.
    pub fn new(tables: Vec<StateTable>, initial_state: u8, writer: W) -> Result<Self, StatewireError> {
        let current = tables
            .iter()
            .position(|t| t.id == initial_state)
            .ok_or_else(|| {
                StatewireError::Communications(format!(
                    "device reports unknown state id {initial_state}"
                ))
            })?;
        Ok(Self {
            tables,
            current,
            writer,
        })
    }

    #[must_use]
    pub fn tables(&self) -> &[StateTable] {
        &self.tables
    }

    #[must_use]
    pub fn current(&self) -> &StateTable {
        &self.tables[self.current]
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    fn send(&mut self, command: &Command) -> Result<(), StatewireError> {
        let bytes = command.encode();
        maybe_log_frame("send", &bytes);
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Switch the device (and this session) to state `name`.
    pub fn change_state(&mut self, name: &str) -> Result<(), StatewireError> {
        let index = self
            .tables
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| StatewireError::Command(format!("no state named {name:?}")))?;
        self.send(&Command::ChangeState {
            state: self.tables[index].id,
        })?;
        self.current = index;
        Ok(())
    }

    /// Fire primary event `name` of the current state.
    pub fn fire_event(&mut self, name: &str) -> Result<(), StatewireError> {
        let state = self.current();
        let event = state
            .primary
            .event(name)
            .ok_or_else(|| StatewireError::Command(format!("no such event {name:?}")))?;
        let command = Command::FireEvent {
            state: state.id,
            event,
        };
        self.send(&command)
    }

    /// Parse `text` for primary value `name` of the current state and send it.
    pub fn set_value(&mut self, name: &str, text: &str) -> Result<(), StatewireError> {
        let state = self.current();
        let (value, ty) = state
            .primary
            .value(name)
            .ok_or_else(|| StatewireError::Command(format!("no such value {name:?}")))?;
        let payload = ty.encode(ty.parse_text(text)?)?;
        let command = Command::SetValue {
            state: state.id,
            value,
            payload,
        };
        self.send(&command)
    }
}

impl<W: Write> TestConsole for Commander<W> {
    fn change_state(&mut self, name: &str) -> Result<(), StatewireError> {
        Self::change_state(self, name)
    }

    fn fire_event(&mut self, name: &str) -> Result<(), StatewireError> {
        Self::fire_event(self, name)
    }

    fn set_value(&mut self, name: &str, text: &str) -> Result<(), StatewireError> {
        Self::set_value(self, name, text)
    }

    fn current_state(&self) -> &str {
        &self.current().name
    }
}

/// Result of executing one input line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn lines<I: IntoIterator<Item = S>, S: Into<String>>(lines: I) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            quit: false,
        }
    }

    fn error(e: &StatewireError) -> Self {
        Self::lines([e.to_string()])
    }
}

pub struct Session<W: Write> {
    commander: Commander<W>,
    tests: TestRegistry,
}

impl<W: Write> Session<W> {
    #[must_use]
    pub fn new(commander: Commander<W>, tests: TestRegistry) -> Self {
        Self { commander, tests }
    }

    pub fn commander_mut(&mut self) -> &mut Commander<W> {
        &mut self.commander
    }

    #[must_use]
    pub fn prompt(&self) -> String {
        format!("{}> ", self.commander.current().name)
    }

    /// Execute one line of input.
    pub fn execute(&mut self, line: &str) -> Reply {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = words.split_first() else {
            return Reply::default();
        };
        match cmd {
            "help" => Reply::lines(HELP_TEXT),
            "q" | "quit" => Reply {
                lines: Vec::new(),
                quit: true,
            },
            "state" => self.state_command(args),
            "value" => self.value_command(args),
            "event" => self.event_command(args),
            "test" => self.test_command(args),
            other => Reply::lines([format!("no such command {other:?}")]),
        }
    }

    fn state_command(&mut self, args: &[&str]) -> Reply {
        match args {
            [] => Reply::lines(self.commander.tables().iter().map(|t| t.name.clone())),
            [name, ..] => match self.commander.change_state(name) {
                Ok(()) => Reply::default(),
                Err(e) => Reply::error(&e),
            },
        }
    }

    fn value_command(&mut self, args: &[&str]) -> Reply {
        match args {
            [] => Reply::lines(
                self.commander
                    .current()
                    .primary
                    .values
                    .iter()
                    .map(|(name, ty)| format!("{name}: {ty}")),
            ),
            [name, text] => match self.commander.set_value(name, text) {
                Ok(()) => Reply::default(),
                Err(e) => Reply::error(&e),
            },
            _ => Reply::lines(["usage: value [name value]"]),
        }
    }

    fn event_command(&mut self, args: &[&str]) -> Reply {
        match args {
            [] => Reply::lines(self.commander.current().primary.events.clone()),
            [name] => match self.commander.fire_event(name) {
                Ok(()) => Reply::default(),
                Err(e) => Reply::error(&e),
            },
            _ => Reply::lines(["usage: event [name]"]),
        }
    }

    fn test_command(&mut self, args: &[&str]) -> Reply {
        if self.tests.is_empty() {
            return Reply::lines(["no tests have been defined for this console"]);
        }
        if let Some((name, rest)) = args.split_first() {
            let rest: Vec<String> = rest.iter().map(ToString::to_string).collect();
            if let Some(report) = self.tests.run(name, &mut self.commander, &rest) {
                return Reply::lines(report);
            }
        }
        let mut lines = Vec::new();
        match args.first() {
            Some(name) => lines.push(format!("no test named {name:?}; options are:")),
            None => lines.push("options are:".to_string()),
        }
        lines.extend(self.tests.names().into_iter().map(|n| format!("  {n}")));
        Reply::lines(lines)
    }

    /// Completion candidates for `line` with the cursor at `pos`.
    ///
    /// Returns the byte offset where the completed word starts and the
    /// candidates that extend it.
    #[must_use]
    pub fn complete(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let before = line.get(..pos).unwrap_or(line);
        let start = before.rfind(' ').map_or(0, |i| i + 1);
        let partial = &before[start..];
        let words: Vec<&str> = before[..start].split_whitespace().collect();

        let candidates: Vec<String> = match words.as_slice() {
            [] => COMMANDS.iter().map(ToString::to_string).collect(),
            ["state"] => self.commander.tables().iter().map(|t| t.name.clone()).collect(),
            ["value"] => self
                .commander
                .current()
                .primary
                .values
                .iter()
                .map(|(name, _)| name.clone())
                .collect(),
            ["event"] => self.commander.current().primary.events.clone(),
            ["test"] => self.tests.names(),
            _ => Vec::new(),
        };
        let matches = candidates
            .into_iter()
            .filter(|c| c.starts_with(partial))
            .collect();
        (start, matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarType;

    fn tables() -> Vec<StateTable> {
        vec![
            StateTable::new("IDLE", 0),
            StateTable::new("RUN", 1)
                .primary_value("counter", ScalarType::Uint32)
                .primary_value("armed", ScalarType::Bool)
                .primary_value("count2", ScalarType::Int8)
                .primary_event("go")
                .primary_event("stop"),
        ]
    }

    fn session(initial: u8) -> Session<Vec<u8>> {
        let commander = Commander::new(tables(), initial, Vec::new()).expect("known state");
        Session::new(commander, TestRegistry::new())
    }

    fn take_written(s: &mut Session<Vec<u8>>) -> Vec<u8> {
        std::mem::take(s.commander_mut().writer_mut())
    }

    #[test]
    fn change_state_encodes_and_updates_prompt() {
        let mut s = session(0);
        assert_eq!(s.prompt(), "IDLE> ");
        assert_eq!(s.execute("state RUN"), Reply::default());
        assert_eq!(take_written(&mut s), vec![0x00, 0x01]);
        assert_eq!(s.prompt(), "RUN> ");
    }

    #[test]
    fn set_value_encodes_little_endian() {
        let mut s = session(1);
        s.execute("value counter 5");
        assert_eq!(take_written(&mut s), vec![0x02, 0x01, 0x00, 0x05, 0x00, 0x00, 0x00]);
        s.execute("value armed true");
        assert_eq!(take_written(&mut s), vec![0x02, 0x01, 0x01, 0x01]);
        s.execute("value armed False");
        assert_eq!(take_written(&mut s), vec![0x02, 0x01, 0x01, 0x00]);
        s.execute("value count2 -1");
        assert_eq!(take_written(&mut s), vec![0x02, 0x01, 0x02, 0xff]);
    }

    #[test]
    fn fire_event_encodes_ids() {
        let mut s = session(1);
        s.execute("event stop");
        assert_eq!(take_written(&mut s), vec![0x01, 0x01, 0x01]);
    }

    #[test]
    fn invalid_input_changes_nothing() {
        let mut s = session(1);
        let reply = s.execute("value counter notanumber");
        assert_eq!(reply.lines, vec!["\"notanumber\" is not an integer"]);
        let reply = s.execute("value armed TRUE");
        assert_eq!(reply.lines, vec!["\"TRUE\" is not a bool"]);
        let reply = s.execute("value counter -1");
        assert!(reply.lines[0].contains("out of range"), "{reply:?}");
        let reply = s.execute("state NOWHERE");
        assert_eq!(reply.lines, vec!["no state named \"NOWHERE\""]);
        let reply = s.execute("event fly");
        assert_eq!(reply.lines, vec!["no such event \"fly\""]);
        assert!(take_written(&mut s).is_empty());
        assert_eq!(s.prompt(), "RUN> ");
    }

    #[test]
    fn listings_and_misc_commands() {
        let mut s = session(1);
        assert_eq!(s.execute("state").lines, vec!["IDLE", "RUN"]);
        assert_eq!(
            s.execute("value").lines,
            vec!["counter: uint32", "armed: bool", "count2: int8"]
        );
        assert_eq!(s.execute("event").lines, vec!["go", "stop"]);
        assert_eq!(s.execute("help").lines.len(), HELP_TEXT.len());
        assert_eq!(s.execute("   "), Reply::default());
        assert_eq!(s.execute("fly").lines, vec!["no such command \"fly\""]);
        assert_eq!(
            s.execute("test").lines,
            vec!["no tests have been defined for this console"]
        );
        assert!(s.execute("q").quit);
        assert!(s.execute("quit").quit);
        assert!(take_written(&mut s).is_empty());
    }

    #[test]
    fn unknown_initial_state_is_rejected() {
        assert!(matches!(
            Commander::new(tables(), 7, Vec::new()),
            Err(StatewireError::Communications(_))
        ));
    }

    #[test]
    fn completion() {
        let s = session(1);
        assert_eq!(s.complete("st", 2), (0, vec!["state".to_string()]));
        assert_eq!(s.complete("", 0).1.len(), COMMANDS.len());
        assert_eq!(s.complete("state R", 7), (6, vec!["RUN".to_string()]));
        assert_eq!(
            s.complete("value co", 8),
            (6, vec!["counter".to_string(), "count2".to_string()])
        );
        assert!(s.complete("value counter 1", 15).1.is_empty());
        assert_eq!(s.complete("event ", 6).1, vec!["go", "stop"]);
        assert!(s.complete("test ", 5).1.is_empty());
        assert!(s.complete("bogus x", 7).1.is_empty());
    }
}
