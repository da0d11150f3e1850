//! Intermediate model built from a description.
//!
//! Declaration order is the wire id everywhere: a state's id is its position
//! in [`Model::states`], a value's id is its position in [`Device::values`]
//! and an event's id is its position in [`Device::events`]. The model is built
//! once by the parser and never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::scalar::ScalarType;

/// Which board (or the control surface) a device block describes.
///
/// The derived ordering is the canonical role order: primary, surface, then
/// secondary units by ascending index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceRole {
    Primary,
    Surface,
    Secondary(u8),
}

impl DeviceRole {
    pub const MIN_SECONDARY: u8 = 2;
    pub const MAX_SECONDARY: u8 = 9;

    /// Parse a device block name. Returns `None` for anything that is not
    /// `primary`, `surface` or `unitN` with N in the secondary range.
    #[must_use]
    pub fn from_block_name(name: &str) -> Option<Self> {
        match name {
            "primary" => Some(Self::Primary),
            "surface" => Some(Self::Surface),
            _ => {
                let digits = name.strip_prefix("unit")?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let n: u8 = digits.parse().ok()?;
                (Self::MIN_SECONDARY..=Self::MAX_SECONDARY)
                    .contains(&n)
                    .then_some(Self::Secondary(n))
            }
        }
    }

    /// Name used for the device block and for generated namespaces.
    #[must_use]
    pub fn block_name(&self) -> String {
        match self {
            Self::Primary => "primary".to_string(),
            Self::Surface => "surface".to_string(),
            Self::Secondary(n) => format!("unit{n}"),
        }
    }

    #[must_use]
    pub const fn is_secondary(&self) -> bool {
        matches!(self, Self::Secondary(_))
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.block_name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    pub name: String,
    pub ty: ScalarType,
}

/// Values and events one role owns in one state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Device {
    pub values: Vec<Value>,
    pub events: Vec<String>,
}

static EMPTY_DEVICE: Device = Device::new();

impl Device {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: Vec::new(),
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn value_id(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|v| v.name == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.events.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
    pub name: String,
    /// Zero-based declaration order; the wire id once checked to fit a byte.
    pub index: usize,
    devices: BTreeMap<DeviceRole, Device>,
}

impl State {
    /// The device for `role`; roles this state never declared are empty.
    #[must_use]
    pub fn device(&self, role: DeviceRole) -> &Device {
        self.devices.get(&role).unwrap_or(&EMPTY_DEVICE)
    }

    /// Devices in canonical role order.
    pub fn devices(&self) -> impl Iterator<Item = (DeviceRole, &Device)> {
        self.devices.iter().map(|(role, dev)| (*role, dev))
    }
}

/// One row of the flattened set-value dispatch table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireValueEntry {
    pub state_id: usize,
    pub value_id: usize,
    pub size: usize,
    pub state: String,
    pub name: String,
    pub ty: ScalarType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Model {
    states: Vec<State>,
    roles: BTreeSet<DeviceRole>,
}

impl Model {
    /// Build a model from states in declaration order.
    ///
    /// The role set always holds `primary` and `surface`, plus every role
    /// declared in any state; each state gets an (possibly empty) device
    /// for every role in the set.
    #[must_use]
    pub fn from_states(states: Vec<(String, BTreeMap<DeviceRole, Device>)>) -> Self {
        let mut roles: BTreeSet<DeviceRole> = [DeviceRole::Primary, DeviceRole::Surface]
            .into_iter()
            .collect();
        for (_, devices) in &states {
            roles.extend(devices.keys().copied());
        }
        let states = states
            .into_iter()
            .enumerate()
            .map(|(index, (name, mut devices))| {
                for role in &roles {
                    devices.entry(*role).or_default();
                }
                State {
                    name,
                    index,
                    devices,
                }
            })
            .collect();
        Self { states, roles }
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Every role observed in the model, in canonical order.
    #[must_use]
    pub const fn roles(&self) -> &BTreeSet<DeviceRole> {
        &self.roles
    }

    pub fn secondary_roles(&self) -> impl Iterator<Item = DeviceRole> + '_ {
        self.roles.iter().copied().filter(DeviceRole::is_secondary)
    }

    /// Flattened (state, value) table for `role` in declaration order.
    #[must_use]
    pub fn wire_values(&self, role: DeviceRole) -> Vec<WireValueEntry> {
        self.states
            .iter()
            .flat_map(|state| {
                state
                    .device(role)
                    .values
                    .iter()
                    .enumerate()
                    .map(move |(value_id, v)| WireValueEntry {
                        state_id: state.index,
                        value_id,
                        size: v.ty.width(),
                        state: state.name.clone(),
                        name: v.name.clone(),
                        ty: v.ty,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(values: &[(&str, ScalarType)], events: &[&str]) -> Device {
        Device {
            values: values
                .iter()
                .map(|(n, ty)| Value {
                    name: (*n).to_string(),
                    ty: *ty,
                })
                .collect(),
            events: events.iter().map(|e| (*e).to_string()).collect(),
        }
    }

    #[test]
    fn role_names_parse() {
        assert_eq!(DeviceRole::from_block_name("primary"), Some(DeviceRole::Primary));
        assert_eq!(DeviceRole::from_block_name("surface"), Some(DeviceRole::Surface));
        assert_eq!(DeviceRole::from_block_name("unit3"), Some(DeviceRole::Secondary(3)));
        assert_eq!(DeviceRole::from_block_name("unit1"), None);
        assert_eq!(DeviceRole::from_block_name("unit10"), None);
        assert_eq!(DeviceRole::from_block_name("unit"), None);
        assert_eq!(DeviceRole::from_block_name("unit+2"), None);
        assert_eq!(DeviceRole::from_block_name("tablet"), None);
    }

    #[test]
    fn canonical_role_order() {
        let mut roles = vec![
            DeviceRole::Secondary(4),
            DeviceRole::Surface,
            DeviceRole::Secondary(2),
            DeviceRole::Primary,
        ];
        roles.sort();
        assert_eq!(
            roles,
            vec![
                DeviceRole::Primary,
                DeviceRole::Surface,
                DeviceRole::Secondary(2),
                DeviceRole::Secondary(4)
            ]
        );
    }

    #[test]
    fn roles_are_implicit_in_every_state() {
        let mut run = BTreeMap::new();
        run.insert(DeviceRole::Secondary(2), device(&[("speed", ScalarType::Int16)], &[]));
        let model = Model::from_states(vec![
            ("IDLE".to_string(), BTreeMap::new()),
            ("RUN".to_string(), run),
        ]);
        assert_eq!(model.roles().len(), 3);
        let idle = model.state("IDLE").expect("IDLE");
        assert_eq!(idle.devices().count(), 3);
        assert!(idle.device(DeviceRole::Secondary(2)).is_empty());
        assert_eq!(model.state("RUN").expect("RUN").index, 1);
    }

    #[test]
    fn wire_values_flatten_in_declaration_order() {
        let mut a = BTreeMap::new();
        a.insert(
            DeviceRole::Primary,
            device(&[("x", ScalarType::Uint8), ("y", ScalarType::Int32)], &["go"]),
        );
        let mut b = BTreeMap::new();
        b.insert(DeviceRole::Primary, device(&[("z", ScalarType::Bool)], &[]));
        let model = Model::from_states(vec![("A".to_string(), a), ("B".to_string(), b)]);
        let table = model.wire_values(DeviceRole::Primary);
        let rows: Vec<_> = table
            .iter()
            .map(|e| (e.state_id, e.value_id, e.size, e.name.as_str()))
            .collect();
        assert_eq!(rows, vec![(0, 0, 1, "x"), (0, 1, 4, "y"), (1, 0, 1, "z")]);
    }
}
