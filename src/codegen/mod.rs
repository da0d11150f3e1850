//! Code generators.
//!
//! Each generator is a pure function of the model, its BuildId and (for the
//! primary board) its topology, returning source text. All of them iterate
//! states, roles, values and events in model order, so the wire ids they
//! emit are the declaration positions.

mod console;
mod primary;
mod secondary;
mod surface;

use std::collections::HashSet;

pub use console::{generate_console, generate_console_manifest};
pub use primary::generate_primary;
pub use secondary::generate_secondary;
pub use surface::generate_surface;

use crate::error::StatewireError;
use crate::model::{Device, DeviceRole, Model, State};
use crate::topology::TopologyAssignment;

/// Largest count that fits a one-byte wire id.
pub const MAX_WIRE_IDS: usize = 256;

/// Symbols every firmware state namespace defines itself.
const RESERVED_MEMBER_NAMES: [&str; 7] =
    ["setup", "enter", "loop", "exit", "event", "events", "manager"];

/// Global symbols of the generated sources that a state name must not shadow.
const RESERVED_STATE_NAMES: [&str; 9] = [
    "manager",
    "State",
    "STATES",
    "BUILD_ID",
    "UNIT_NUMBER",
    "SECONDARY_MASK",
    "state_infos",
    "wire_values",
    "Manager",
];

/// Types and macros of the firmware and surface runtimes that generated
/// code refers to.
const RUNTIME_NAMES: [&str; 17] = [
    "Value",
    "RemoteValue",
    "WireValue",
    "StateInfo",
    "PrimaryManager",
    "SecondaryManager",
    "SECONDARY_MANAGER",
    "SECONDARY_RECV",
    "HardwareValue",
    "LocalValue",
    "LocalEvent",
    "uint8_t",
    "int8_t",
    "uint16_t",
    "int16_t",
    "uint32_t",
    "int32_t",
];

/// Keywords of C++ and JavaScript; names become identifiers in both.
const KEYWORDS: [&str; 72] = [
    "alignas", "alignof", "and", "asm", "auto", "bool", "break", "case", "catch", "char",
    "class", "const", "constexpr", "continue", "debugger", "decltype", "default", "delete",
    "do", "double", "else", "enum", "explicit", "export", "extends", "extern", "false",
    "finally", "float", "for", "friend", "function", "goto", "if", "implements", "import",
    "in", "inline", "instanceof", "int", "interface", "let", "long", "mutable", "namespace",
    "new", "not", "null", "nullptr", "operator", "or", "private", "protected", "public",
    "register", "return", "short", "signed", "sizeof", "static", "struct", "super",
    "switch", "template", "this", "throw", "true", "try", "typeof", "var", "void", "while",
];

fn is_reserved_everywhere(name: &str) -> bool {
    RUNTIME_NAMES.contains(&name) || KEYWORDS.contains(&name)
}

pub(crate) const GENERATED_BANNER: &str = "Generated by statewire. Do not edit.";

/// Check every generator precondition on `model`.
///
/// # Errors
///
/// Returns `StatewireError::Generation` when the model has no states, more
/// than 256 states, more than 256 values or events on one device, or a name
/// that collides with a generated symbol.
pub fn check_preconditions(model: &Model) -> Result<(), StatewireError> {
    let states = model.states();
    if states.is_empty() {
        return Err(StatewireError::Generation(
            "description declares no states".into(),
        ));
    }
    if states.len() > MAX_WIRE_IDS {
        return Err(StatewireError::Generation(format!(
            "{} states declared; at most {MAX_WIRE_IDS} fit a one-byte state id",
            states.len()
        )));
    }
    let role_names: HashSet<String> = model.roles().iter().map(DeviceRole::block_name).collect();
    let state_names: HashSet<&str> = states.iter().map(|s| s.name.as_str()).collect();
    for state in states {
        let name = state.name.as_str();
        if RESERVED_STATE_NAMES.contains(&name)
            || is_reserved_everywhere(name)
            || role_names.contains(name)
        {
            return Err(StatewireError::Generation(format!(
                "state name {name} collides with a generated symbol"
            )));
        }
        // `STATE_<name>` is the enumerator and surface id of state `<name>`
        if let Some(other) = name.strip_prefix("STATE_").filter(|o| state_names.contains(o)) {
            return Err(StatewireError::Generation(format!(
                "state name {name} collides with the id of state {other}"
            )));
        }
        for (role, device) in state.devices() {
            check_device(state, role, device, &role_names)?;
        }
    }
    Ok(())
}

fn check_device(
    state: &State,
    role: DeviceRole,
    device: &Device,
    role_names: &HashSet<String>,
) -> Result<(), StatewireError> {
    if device.values.len() > MAX_WIRE_IDS || device.events.len() > MAX_WIRE_IDS {
        return Err(StatewireError::Generation(format!(
            "{role} in state {} declares more than {MAX_WIRE_IDS} values or events",
            state.name
        )));
    }
    let names = device
        .values
        .iter()
        .map(|v| v.name.as_str())
        .chain(device.events.iter().map(String::as_str));
    for name in names {
        if RESERVED_MEMBER_NAMES.contains(&name)
            || is_reserved_everywhere(name)
            || role_names.contains(name)
        {
            return Err(StatewireError::Generation(format!(
                "{name} in {role} of state {} collides with a generated symbol",
                state.name
            )));
        }
    }
    Ok(())
}

/// Which generated file an [`Artifact`] holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    FirmwareHeader(DeviceRole),
    FirmwareSource(DeviceRole),
    Surface,
    Console,
    ConsoleManifest,
}

impl ArtifactKind {
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::FirmwareHeader(_) => "states.h",
            Self::FirmwareSource(_) => "states.cpp",
            Self::Surface => "states.js",
            Self::Console => "main.rs",
            Self::ConsoleManifest => "Cargo.toml",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub contents: String,
}

/// Header and source text for one firmware target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirmwareSources {
    pub header: String,
    pub source: String,
}

/// Run every generator the model needs.
///
/// Preconditions are checked once up front; on error nothing is returned.
pub fn generate_all(
    model: &Model,
    build_id: u32,
    topology: &TopologyAssignment,
) -> Result<Vec<Artifact>, StatewireError> {
    check_preconditions(model)?;
    let mut artifacts = Vec::new();

    let primary = generate_primary(model, build_id, topology)?;
    artifacts.push(Artifact {
        kind: ArtifactKind::FirmwareHeader(DeviceRole::Primary),
        contents: primary.header,
    });
    artifacts.push(Artifact {
        kind: ArtifactKind::FirmwareSource(DeviceRole::Primary),
        contents: primary.source,
    });
    for role in model.secondary_roles() {
        let sources = generate_secondary(model, build_id, role)?;
        artifacts.push(Artifact {
            kind: ArtifactKind::FirmwareHeader(role),
            contents: sources.header,
        });
        artifacts.push(Artifact {
            kind: ArtifactKind::FirmwareSource(role),
            contents: sources.source,
        });
    }
    artifacts.push(Artifact {
        kind: ArtifactKind::Surface,
        contents: generate_surface(model, build_id)?,
    });
    artifacts.push(Artifact {
        kind: ArtifactKind::Console,
        contents: generate_console(model, build_id)?,
    });
    for artifact in &artifacts {
        tracing::info!(
            kind = ?artifact.kind,
            bytes = artifact.contents.len(),
            "generated artifact"
        );
    }
    Ok(artifacts)
}

/// Line-oriented source builder with two-space indentation.
#[derive(Default)]
pub(crate) struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
    }

    pub(crate) fn indent(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Emit `open`, run `body` one level deeper, then emit `close`.
    pub(crate) fn block(&mut self, open: impl AsRef<str>, close: &str, body: impl FnOnce(&mut Self)) {
        self.line(open);
        self.indent();
        body(self);
        self.dedent();
        self.line(close);
    }

    /// Emit items separated by `,` with no trailing comma.
    pub(crate) fn comma_lines<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<S> = items.into_iter().collect();
        let last = items.len().saturating_sub(1);
        for (i, item) in items.iter().enumerate() {
            if i == last {
                self.line(item.as_ref());
            } else {
                self.line(format!("{},", item.as_ref()));
            }
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

/// Wire id of a state; only valid after [`check_preconditions`].
pub(crate) fn state_id(state: &State) -> Result<u8, StatewireError> {
    u8::try_from(state.index).map_err(|_| {
        StatewireError::Generation(format!("state {} has no one-byte id", state.name))
    })
}

// Firmware pieces shared by the primary and secondary generators.

/// `enum State { STATE_A, ... };`
pub(crate) fn emit_state_enum(e: &mut Emitter, model: &Model) {
    e.block("enum State {", "};", |e| {
        e.comma_lines(model.states().iter().map(|s| format!("STATE_{}", s.name)));
    });
}

/// Lifecycle hooks, own value declarations and own event handlers of one state.
pub(crate) fn emit_own_declarations(e: &mut Emitter, device: &Device) {
    e.line("__attribute__((weak)) void setup();");
    e.line("__attribute__((weak)) void enter();");
    e.line("__attribute__((weak)) void loop();");
    e.line("void event(uint8_t);");
    e.line("__attribute__((weak)) void exit();");
    if !device.values.is_empty() {
        e.blank();
        for v in &device.values {
            e.line(format!("extern Value<{}> {};", v.ty.c_type(), v.name));
        }
    }
    e.blank();
    e.line("namespace events {");
    for ev in &device.events {
        e.line(format!("void {ev}();"));
    }
    e.line("}");
}

/// Declarations of a peer's values and events, addressed through `unit`.
pub(crate) fn emit_remote_declarations(e: &mut Emitter, name: &str, unit: u8, device: &Device) {
    e.line(format!("namespace {name} {{"));
    for v in &device.values {
        e.line(format!("extern RemoteValue<{unit}, {}> {};", v.ty.c_type(), v.name));
    }
    e.line("namespace events {");
    for ev in &device.events {
        e.line(format!("void {ev}();"));
    }
    e.line("}");
    e.line("}");
}

/// Definitions of a peer's proxies; `send` renders the call for event id `i`.
pub(crate) fn emit_remote_definitions(
    e: &mut Emitter,
    name: &str,
    unit: u8,
    device: &Device,
    send: impl Fn(usize) -> String,
) {
    e.line(format!("namespace {name} {{"));
    for (i, v) in device.values.iter().enumerate() {
        e.line(format!("RemoteValue<{unit}, {}> {}({i});", v.ty.c_type(), v.name));
    }
    e.line("namespace events {");
    for (i, ev) in device.events.iter().enumerate() {
        e.line(format!("void {ev}() {{ {}; }}", send(i)));
    }
    e.line("}");
    e.line("}");
}

/// Own value storage plus the event-id dispatch switch.
pub(crate) fn emit_own_definitions(e: &mut Emitter, device: &Device) {
    for v in &device.values {
        e.line(format!("Value<{}> {};", v.ty.c_type(), v.name));
    }
    if !device.values.is_empty() {
        e.blank();
    }
    e.block("void event(uint8_t ev) {", "}", |e| {
        e.block("switch (ev) {", "}", |e| {
            for (i, ev) in device.events.iter().enumerate() {
                e.line(format!("case {i}:"));
                e.indent();
                e.line(format!("events::{ev}();"));
                e.line("break;");
                e.dedent();
            }
            e.line("default:");
            e.indent();
            e.line("break;");
            e.dedent();
        });
    });
}

/// `StateInfo` table and the flattened `WireValue` table for `role`.
pub(crate) fn emit_dispatch_tables(e: &mut Emitter, model: &Model, role: DeviceRole) {
    let n_states = model.states().len();
    e.block(
        format!("static const StateInfo state_infos[{n_states}] = {{"),
        "};",
        |e| {
            e.comma_lines(model.states().iter().map(|s| {
                let n = &s.name;
                format!("{{{n}::setup, {n}::enter, {n}::exit, {n}::loop, {n}::event}}")
            }));
        },
    );
    e.blank();
    let wire = model.wire_values(role);
    if wire.is_empty() {
        e.line("static const WireValue* const wire_values = nullptr;");
    } else {
        e.block(
            format!("static const WireValue wire_values[{}] = {{", wire.len()),
            "};",
            |e| {
                e.comma_lines(wire.iter().map(|w| {
                    format!(
                        "{{{}, {}, sizeof({}), (Value<void*>*) &{}::{}}}",
                        w.state_id,
                        w.value_id,
                        w.ty.c_type(),
                        w.state,
                        w.name
                    )
                }));
            },
        );
    }
}
