//! Description parser and validator.
//!
//! The pest grammar accepts any nesting of blocks, `name: type` entries and
//! bare names; this module walks the parse tree and enforces the fixed
//! schema (state → device → values/events), producing a [`Model`] or the
//! first error with its line and column.

use std::collections::{BTreeMap, HashSet};

use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::StatewireError;
use crate::model::{Device, DeviceRole, Model, Value};
use crate::scalar::ScalarType;

#[derive(Parser)]
#[grammar = "description.pest"]
struct DescriptionParser;

/// Parse and validate description text into a [`Model`].
///
/// # Errors
///
/// Returns `StatewireError::Description` for syntax errors and for any
/// construct outside the schema; no partial model is returned.
pub fn parse_description(text: &str) -> Result<Model, StatewireError> {
    let root = DescriptionParser::parse(Rule::description, text)
        .map_err(syntax_error)?
        .next()
        .ok_or_else(|| StatewireError::description(1, 1, "empty parse tree"))?;

    let mut states: Vec<(String, BTreeMap<DeviceRole, Device>)> = Vec::new();
    let mut seen = HashSet::new();
    for item in root.into_inner() {
        if item.as_rule() == Rule::EOI {
            continue;
        }
        let (line, column) = item.as_span().start_pos().line_col();
        let (name, devices) = parse_state(item)?;
        if !seen.insert(name.clone()) {
            return Err(StatewireError::description(
                line,
                column,
                format!("state {name} already defined"),
            ));
        }
        states.push((name, devices));
    }
    Ok(Model::from_states(states))
}

fn syntax_error(e: pest::error::Error<Rule>) -> StatewireError {
    let (line, column) = match e.line_col {
        LineColLocation::Pos(pos) | LineColLocation::Span(pos, _) => pos,
    };
    StatewireError::description(line, column, format!("syntax error: {}", e.variant.message()))
}

fn error_at(pair: &Pair<'_, Rule>, message: impl Into<String>) -> StatewireError {
    let (line, column) = pair.as_span().start_pos().line_col();
    StatewireError::description(line, column, message)
}

/// Short rendering of an item for error messages.
fn describe(pair: &Pair<'_, Rule>) -> String {
    match pair.as_rule() {
        Rule::block => {
            let head = block_head(pair).join(" ");
            format!("block `{head}`")
        }
        Rule::assignment => format!("assignment `{}`", pair.as_str()),
        Rule::bare => format!("name `{}`", pair.as_str()),
        _ => format!("`{}`", pair.as_str()),
    }
}

fn block_head(pair: &Pair<'_, Rule>) -> Vec<String> {
    pair.clone()
        .into_inner()
        .next()
        .map(|head| head.into_inner().map(|id| id.as_str().to_string()).collect())
        .unwrap_or_default()
}

/// Items nested in a block, after its head.
fn block_items<'a>(pair: Pair<'a, Rule>) -> impl Iterator<Item = Pair<'a, Rule>> {
    pair.into_inner().skip(1)
}

fn parse_state(item: Pair<'_, Rule>) -> Result<(String, BTreeMap<DeviceRole, Device>), StatewireError> {
    if item.as_rule() != Rule::block {
        return Err(error_at(
            &item,
            format!("expected a state block, found {}", describe(&item)),
        ));
    }
    let head = block_head(&item);
    let name = match head.as_slice() {
        [kw, name] if kw == "state" => name.clone(),
        _ => {
            return Err(error_at(
                &item,
                format!("expected a state block, found {}", describe(&item)),
            ))
        }
    };

    let mut devices = BTreeMap::new();
    for inner in block_items(item) {
        let role = device_role(&inner, &name)?;
        if devices.contains_key(&role) {
            return Err(error_at(
                &inner,
                format!("values/events for {role} defined more than once in state {name}"),
            ));
        }
        devices.insert(role, parse_device(inner, role)?);
    }
    Ok((name, devices))
}

fn device_role(item: &Pair<'_, Rule>, state: &str) -> Result<DeviceRole, StatewireError> {
    let unexpected = || {
        error_at(
            item,
            format!(
                "unexpected {} in state {state}; expected a primary, surface or unitN block",
                describe(item)
            ),
        )
    };
    if item.as_rule() != Rule::block {
        return Err(unexpected());
    }
    match block_head(item).as_slice() {
        [name] => DeviceRole::from_block_name(name).ok_or_else(|| {
            error_at(
                item,
                format!(
                    "unknown device {name:?} in state {state}; expected primary, surface or unit{}..unit{}",
                    DeviceRole::MIN_SECONDARY,
                    DeviceRole::MAX_SECONDARY
                ),
            )
        }),
        _ => Err(unexpected()),
    }
}

fn parse_device(item: Pair<'_, Rule>, role: DeviceRole) -> Result<Device, StatewireError> {
    let mut device = Device::new();
    let mut have_values = false;
    let mut have_events = false;
    for inner in block_items(item) {
        let head = if inner.as_rule() == Rule::block {
            block_head(&inner)
        } else {
            Vec::new()
        };
        match head.as_slice() {
            [kw] if kw == "values" => {
                if have_values {
                    return Err(error_at(
                        &inner,
                        format!("values block defined more than once for {role}"),
                    ));
                }
                have_values = true;
                device.values = parse_values(inner)?;
            }
            [kw] if kw == "events" => {
                if have_events {
                    return Err(error_at(
                        &inner,
                        format!("events block defined more than once for {role}"),
                    ));
                }
                have_events = true;
                device.events = parse_events(inner)?;
            }
            _ => {
                return Err(error_at(
                    &inner,
                    format!(
                        "unexpected {} in {role}; only values and events blocks are allowed",
                        describe(&inner)
                    ),
                ))
            }
        }
    }
    Ok(device)
}

fn parse_values(block: Pair<'_, Rule>) -> Result<Vec<Value>, StatewireError> {
    let mut values: Vec<Value> = Vec::new();
    for entry in block_items(block) {
        if entry.as_rule() != Rule::assignment {
            return Err(error_at(
                &entry,
                format!(
                    "values entries must be `name: type`, found {}",
                    describe(&entry)
                ),
            ));
        }
        let mut parts = entry.clone().into_inner();
        let (Some(name), Some(ty)) = (parts.next(), parts.next()) else {
            return Err(error_at(&entry, "malformed value entry"));
        };
        if values.iter().any(|v| v.name == name.as_str()) {
            return Err(error_at(
                &name,
                format!("value name {} already used", name.as_str()),
            ));
        }
        let parsed: ScalarType = ty.as_str().parse().map_err(|e: String| error_at(&ty, e))?;
        values.push(Value {
            name: name.as_str().to_string(),
            ty: parsed,
        });
    }
    Ok(values)
}

fn parse_events(block: Pair<'_, Rule>) -> Result<Vec<String>, StatewireError> {
    let mut events: Vec<String> = Vec::new();
    for entry in block_items(block) {
        if entry.as_rule() != Rule::bare {
            return Err(error_at(
                &entry,
                format!("events entries must be bare names, found {}", describe(&entry)),
            ));
        }
        let name = entry.as_str();
        if events.iter().any(|e| e == name) {
            return Err(error_at(&entry, format!("event name {name} already used")));
        }
        events.push(name.to_string());
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
# two states, one secondary
state IDLE {
}
state RUN {
    primary {
        values {
            counter: uint32
            armed: bool
        }
        events {
            go
            stop
        }
    }
    surface {
        events { finished }
    }
    unit2 {
        values { speed: int16 }
    }
}
";

    fn err_message(text: &str) -> (usize, usize, String) {
        match parse_description(text) {
            Err(StatewireError::Description {
                line,
                column,
                message,
            }) => (line, column, message),
            other => panic!("expected description error, got {other:?}"),
        }
    }

    #[test]
    fn parses_sample_in_declaration_order() {
        let model = parse_description(SAMPLE).expect("parse sample");
        let names: Vec<_> = model.states().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["IDLE", "RUN"]);
        let run = model.state("RUN").expect("RUN");
        let primary = run.device(DeviceRole::Primary);
        assert_eq!(primary.value_id("counter"), Some(0));
        assert_eq!(primary.value_id("armed"), Some(1));
        assert_eq!(primary.values[0].ty, ScalarType::Uint32);
        assert_eq!(primary.events, vec!["go", "stop"]);
        assert_eq!(run.device(DeviceRole::Surface).events, vec!["finished"]);
        assert_eq!(
            run.device(DeviceRole::Secondary(2)).values[0].ty,
            ScalarType::Int16
        );
        assert!(model.roles().contains(&DeviceRole::Secondary(2)));
    }

    #[test]
    fn empty_description_is_an_empty_model() {
        let model = parse_description("  # nothing\n").expect("parse empty");
        assert!(model.states().is_empty());
    }

    #[test]
    fn rejects_top_level_non_state() {
        let (line, _, msg) = err_message("\nprimary { }\n");
        assert_eq!(line, 2);
        assert!(msg.contains("expected a state block"), "{msg}");
        let (_, _, msg) = err_message("counter: uint8\n");
        assert!(msg.contains("expected a state block"), "{msg}");
    }

    #[test]
    fn rejects_unknown_device_block() {
        let (line, column, msg) = err_message("state A {\n  tablet { }\n}\n");
        assert_eq!((line, column), (2, 3));
        assert!(msg.contains("unknown device \"tablet\""), "{msg}");
        let (_, _, msg) = err_message("state A {\n  unit1 { }\n}\n");
        assert!(msg.contains("unknown device"), "{msg}");
        let (_, _, msg) = err_message("state A {\n  go\n}\n");
        assert!(msg.contains("unexpected name `go` in state A"), "{msg}");
    }

    #[test]
    fn rejects_bad_values_entries() {
        let (_, _, msg) = err_message("state A { primary { values { counter } } }");
        assert!(msg.contains("values entries must be `name: type`"), "{msg}");
        let (_, _, msg) =
            err_message("state A { primary { values { x: uint8 x: bool } } }");
        assert!(msg.contains("value name x already used"), "{msg}");
        let (_, _, msg) = err_message("state A { primary { values { x: float } } }");
        assert!(msg.contains("unknown type \"float\""), "{msg}");
    }

    #[test]
    fn rejects_bad_events_entries() {
        let (_, _, msg) = err_message("state A { primary { events { go: bool } } }");
        assert!(msg.contains("events entries must be bare names"), "{msg}");
        let (_, _, msg) = err_message("state A { primary { events { go go } } }");
        assert!(msg.contains("event name go already used"), "{msg}");
    }

    #[test]
    fn rejects_repeated_blocks_and_states() {
        let (_, _, msg) = err_message("state A { primary { } primary { } }");
        assert!(msg.contains("defined more than once in state A"), "{msg}");
        let (_, _, msg) =
            err_message("state A { primary { events { a } events { b } } }");
        assert!(msg.contains("events block defined more than once"), "{msg}");
        let (line, _, msg) = err_message("state A { }\nstate A { }\n");
        assert_eq!(line, 2);
        assert!(msg.contains("state A already defined"), "{msg}");
    }

    #[test]
    fn syntax_errors_carry_position() {
        let (line, column, msg) = err_message("state A {\n  primary {\n");
        assert!(line >= 1 && column >= 1);
        assert!(msg.starts_with("syntax error"), "{msg}");
    }
}
