//! Secondary-board firmware. Same shape as the primary, scoped to one
//! `unitN` role, with proxies back to the primary only.

use super::{
    emit_dispatch_tables, emit_own_declarations, emit_own_definitions, emit_remote_declarations,
    emit_remote_definitions, emit_state_enum, Emitter, FirmwareSources, GENERATED_BANNER,
};
use crate::error::StatewireError;
use crate::model::{DeviceRole, Model};

/// The primary is always reached as unit 0 from a secondary.
const UPSTREAM_UNIT: u8 = 0;

/// Generate the firmware for secondary `role`.
///
/// # Errors
///
/// Fails on any precondition violation, or when `role` is not a secondary
/// role present in `model`.
pub fn generate_secondary(
    model: &Model,
    build_id: u32,
    role: DeviceRole,
) -> Result<FirmwareSources, StatewireError> {
    super::check_preconditions(model)?;
    let DeviceRole::Secondary(unit) = role else {
        return Err(StatewireError::Generation(format!(
            "{role} is not a secondary unit"
        )));
    };
    if !model.roles().contains(&role) {
        return Err(StatewireError::Generation(format!(
            "{role} does not appear in the description"
        )));
    }
    let manager = format!(
        "SecondaryManager<State, {}, {}>",
        model.states().len(),
        model.wire_values(role).len()
    );

    let mut h = Emitter::new();
    h.line(format!("// {GENERATED_BANNER}"));
    h.line("#pragma once");
    h.blank();
    h.line("#define SECONDARY_MANAGER");
    h.line("#include <Manager.h>");
    h.blank();
    for state in model.states() {
        h.line(format!("namespace {} {{", state.name));
        emit_own_declarations(&mut h, state.device(role));
        h.blank();
        emit_remote_declarations(&mut h, "primary", UPSTREAM_UNIT, state.device(DeviceRole::Primary));
        h.line("}");
        h.blank();
    }
    emit_state_enum(&mut h, model);
    h.blank();
    h.line(format!("extern {manager} manager;"));

    let mut s = Emitter::new();
    s.line(format!("// {GENERATED_BANNER}"));
    s.line("#include <SerialSecondary.h>");
    s.line("#include \"states.h\"");
    s.blank();
    s.line(format!("static const uint32_t BUILD_ID = {build_id:#010x};"));
    s.line(format!("static const uint8_t UNIT_NUMBER = {unit};"));
    s.blank();
    emit_dispatch_tables(&mut s, model, role);
    s.blank();
    s.line(format!(
        "{manager} manager(BUILD_ID, UNIT_NUMBER, state_infos, wire_values);"
    ));
    for state in model.states() {
        s.blank();
        s.line(format!("namespace {} {{", state.name));
        emit_own_definitions(&mut s, state.device(role));
        s.blank();
        emit_remote_definitions(
            &mut s,
            "primary",
            UPSTREAM_UNIT,
            state.device(DeviceRole::Primary),
            |id| format!("manager.sendEvent({id})"),
        );
        s.line("}");
    }
    s.blank();
    s.line("SECONDARY_RECV");

    Ok(FirmwareSources {
        header: h.finish(),
        source: s.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_description;

    const DESCRIPTION: &str = "
state IDLE { unit2 { values { speed: int16 } } }
state RUN {
    primary { values { counter: uint32 } events { go } }
    unit2 { values { speed: int16 target: uint16 } events { arrived } }
    unit4 { values { other: bool } }
}";

    #[test]
    fn scoped_to_own_role() {
        let model = parse_description(DESCRIPTION).expect("parse");
        let out = generate_secondary(&model, 0x1234, DeviceRole::Secondary(2)).expect("generate");
        assert!(out.header.contains("extern Value<int16_t> speed;"));
        assert!(out.header.contains("extern RemoteValue<0, uint32_t> counter;"));
        assert!(!out.header.contains("other"));
        assert!(!out.source.contains("SECONDARY_MASK"));
        assert!(out.source.contains("static const uint8_t UNIT_NUMBER = 2;"));
        assert!(out
            .source
            .contains("SecondaryManager<State, 2, 3> manager(BUILD_ID, UNIT_NUMBER, state_infos, wire_values);"));
        assert!(out.source.contains("{0, 0, sizeof(int16_t), (Value<void*>*) &IDLE::speed},"));
        assert!(out.source.contains("{1, 1, sizeof(uint16_t), (Value<void*>*) &RUN::target}\n"));
        assert!(out.source.contains("void go() { manager.sendEvent(0); }"));
        assert!(out.source.contains("RemoteValue<0, uint32_t> counter(0);"));
        assert!(out.source.trim_end().ends_with("SECONDARY_RECV"));
    }

    #[test]
    fn rejects_non_secondary_roles() {
        let model = parse_description(DESCRIPTION).expect("parse");
        assert!(generate_secondary(&model, 0, DeviceRole::Primary).is_err());
        assert!(generate_secondary(&model, 0, DeviceRole::Secondary(3)).is_err());
    }
}
