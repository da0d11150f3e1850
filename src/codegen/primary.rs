//! Primary-board firmware (`states.h` / `states.cpp`).

use super::{
    emit_dispatch_tables, emit_own_declarations, emit_own_definitions, emit_remote_declarations,
    emit_remote_definitions, emit_state_enum, Emitter, FirmwareSources, GENERATED_BANNER,
};
use crate::error::StatewireError;
use crate::model::{DeviceRole, Model};
use crate::topology::TopologyAssignment;

/// Wire unit the primary addresses a peer through: the surface is 0,
/// secondary `unitN` is N.
fn peer_unit(role: DeviceRole) -> u8 {
    match role {
        DeviceRole::Secondary(n) => n,
        DeviceRole::Primary | DeviceRole::Surface => 0,
    }
}

fn manager_type(model: &Model) -> String {
    format!(
        "PrimaryManager<State, {}, {}>",
        model.states().len(),
        model.wire_values(DeviceRole::Primary).len()
    )
}

/// Generate the primary board's header and source.
pub fn generate_primary(
    model: &Model,
    build_id: u32,
    topology: &TopologyAssignment,
) -> Result<FirmwareSources, StatewireError> {
    super::check_preconditions(model)?;
    Ok(FirmwareSources {
        header: header(model),
        source: source(model, build_id, topology),
    })
}

fn header(model: &Model) -> String {
    let mut e = Emitter::new();
    e.line(format!("// {GENERATED_BANNER}"));
    e.line("#pragma once");
    e.blank();
    e.line("#include <Manager.h>");
    e.blank();
    for state in model.states() {
        e.line(format!("namespace {} {{", state.name));
        emit_own_declarations(&mut e, state.device(DeviceRole::Primary));
        for (role, device) in state.devices() {
            if role == DeviceRole::Primary {
                continue;
            }
            e.blank();
            emit_remote_declarations(&mut e, &role.block_name(), peer_unit(role), device);
        }
        e.line("}");
        e.blank();
    }
    emit_state_enum(&mut e, model);
    e.blank();
    e.line(format!("extern {} manager;", manager_type(model)));
    e.finish()
}

fn source(model: &Model, build_id: u32, topology: &TopologyAssignment) -> String {
    let mut e = Emitter::new();
    e.line(format!("// {GENERATED_BANNER}"));
    e.line("#include \"states.h\"");
    e.blank();
    e.line(format!("static const uint32_t BUILD_ID = {build_id:#010x};"));
    e.line(format!(
        "static const uint8_t UNIT_NUMBER = {};",
        topology.primary_unit
    ));
    e.line(format!(
        "static const uint8_t SECONDARY_MASK = {:#04x};",
        topology.secondary_mask
    ));
    e.blank();
    emit_dispatch_tables(&mut e, model, DeviceRole::Primary);
    e.blank();
    e.line(format!(
        "{} manager(BUILD_ID, state_infos, wire_values, UNIT_NUMBER, SECONDARY_MASK);",
        manager_type(model)
    ));
    for state in model.states() {
        e.blank();
        e.line(format!("namespace {} {{", state.name));
        emit_own_definitions(&mut e, state.device(DeviceRole::Primary));
        for (role, device) in state.devices() {
            let unit = peer_unit(role);
            let send: Box<dyn Fn(usize) -> String> = match role {
                DeviceRole::Primary => continue,
                DeviceRole::Surface => Box::new(|id| format!("manager.sendSurfaceEvent({id})")),
                DeviceRole::Secondary(n) => {
                    Box::new(move |id| format!("manager.sendSecondaryEvent({n}, {id})"))
                }
            };
            e.blank();
            emit_remote_definitions(&mut e, &role.block_name(), unit, device, send);
        }
        e.line("}");
    }
    e.finish()
}
