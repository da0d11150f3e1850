//! Control-surface tables (`states.js`).
//!
//! Primary values become `HardwareValue`s keyed by (state id, value id) and
//! primary events become functions sending an event frame; surface values
//! and events stay local to the browser.

use super::{state_id, Emitter, GENERATED_BANNER};
use crate::error::StatewireError;
use crate::model::{DeviceRole, Model};

/// Generate `states.js` for the control surface.
pub fn generate_surface(model: &Model, build_id: u32) -> Result<String, StatewireError> {
    super::check_preconditions(model)?;
    let mut e = Emitter::new();
    e.line(format!("// {GENERATED_BANNER}"));
    for state in model.states() {
        let id = state_id(state)?;
        let primary = state.device(DeviceRole::Primary);
        let surface = state.device(DeviceRole::Surface);
        e.blank();
        e.block(format!("var {} = {{", state.name), "};", |e| {
            e.line(format!("id: {id},"));
            e.block("primary: {", "},", |e| {
                object(
                    e,
                    "values",
                    primary.values.iter().enumerate().map(|(i, v)| {
                        format!(
                            "{}: new HardwareValue({id}, {i}, {})",
                            v.name,
                            v.ty.js_type()
                        )
                    }),
                    ",",
                );
                object(
                    e,
                    "events",
                    primary.events.iter().enumerate().map(|(i, ev)| {
                        format!("{ev}: function {ev}() {{ manager.sendEvent({i}, {id}); }}")
                    }),
                    "",
                );
            });
            e.block("surface: {", "}", |e| {
                object(
                    e,
                    "values",
                    surface.values.iter().enumerate().map(|(i, v)| {
                        format!("{}: new LocalValue({i}, {})", v.name, v.ty.js_type())
                    }),
                    ",",
                );
                object(
                    e,
                    "events",
                    surface
                        .events
                        .iter()
                        .enumerate()
                        .map(|(i, ev)| format!("{ev}: new LocalEvent({id}, {i})")),
                    "",
                );
            });
        });
        e.line(format!("var STATE_{} = {id};", state.name));
    }
    e.blank();
    e.block("var STATES = {", "};", |e| {
        e.comma_lines(model.states().iter().map(|s| format!("{0}: {0}", s.name)));
    });
    e.line(format!("var BUILD_ID = {build_id:#010x};"));
    let names: Vec<&str> = model.states().iter().map(|s| s.name.as_str()).collect();
    e.line(format!(
        "var manager = new Manager([{}], BUILD_ID);",
        names.join(", ")
    ));
    Ok(e.finish())
}

/// `key: { a, b }` with `trailer` after the closing brace.
fn object<I>(e: &mut Emitter, key: &str, entries: I, trailer: &str)
where
    I: Iterator<Item = String>,
{
    let entries: Vec<String> = entries.collect();
    if entries.is_empty() {
        e.line(format!("{key}: {{}}{trailer}"));
    } else {
        e.block(format!("{key}: {{"), &format!("}}{trailer}"), |e| {
            e.comma_lines(entries);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_description;

    #[test]
    fn tables_follow_declaration_order() {
        let model = parse_description(
            "state IDLE { }
             state RUN {
                 primary { values { counter: uint32 armed: bool } events { go stop } }
                 surface { values { level: int8 } events { finished } }
             }",
        )
        .expect("parse");
        let js = generate_surface(&model, 0xdead_beef).expect("generate");
        assert!(js.contains("var IDLE = {\n  id: 0,\n  primary: {\n    values: {},\n    events: {}\n  },"));
        assert!(js.contains("counter: new HardwareValue(1, 0, Manager.TYPE_UINT32),"));
        assert!(js.contains("armed: new HardwareValue(1, 1, Manager.TYPE_BOOL)\n"));
        assert!(js.contains("stop: function stop() { manager.sendEvent(1, 1); }"));
        assert!(js.contains("level: new LocalValue(0, Manager.TYPE_INT8)"));
        assert!(js.contains("finished: new LocalEvent(1, 0)"));
        assert!(js.contains("var STATE_RUN = 1;"));
        assert!(js.contains("var STATES = {\n  IDLE: IDLE,\n  RUN: RUN\n};"));
        assert!(js.contains("var BUILD_ID = 0xdeadbeef;"));
        assert!(js.trim_end().ends_with("var manager = new Manager([IDLE, RUN], BUILD_ID);"));
    }
}
