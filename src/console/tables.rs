//! Per-state console tables.
//!
//! The generated console program declares these literally; `statewire
//! console` derives them from a description at runtime.

use crate::decoder::ValueTable;
use crate::error::StatewireError;
use crate::model::{DeviceRole, Model};
use crate::scalar::ScalarType;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceTable {
    pub values: Vec<(String, ScalarType)>,
    pub events: Vec<String>,
}

impl DeviceTable {
    /// Wire id and type of value `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<(u8, ScalarType)> {
        let id = self.values.iter().position(|(n, _)| n == name)?;
        Some((u8::try_from(id).ok()?, self.values[id].1))
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<u8> {
        let id = self.events.iter().position(|e| e == name)?;
        u8::try_from(id).ok()
    }
}

/// What the console knows about one state: its primary device, which it
/// commands, and its surface device, whose values the device pushes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTable {
    pub name: String,
    pub id: u8,
    pub primary: DeviceTable,
    pub surface: DeviceTable,
}

impl StateTable {
    #[must_use]
    pub fn new(name: &str, id: u8) -> Self {
        Self {
            name: name.to_string(),
            id,
            primary: DeviceTable::default(),
            surface: DeviceTable::default(),
        }
    }

    #[must_use]
    pub fn primary_value(mut self, name: &str, ty: ScalarType) -> Self {
        self.primary.values.push((name.to_string(), ty));
        self
    }

    #[must_use]
    pub fn primary_event(mut self, name: &str) -> Self {
        self.primary.events.push(name.to_string());
        self
    }

    #[must_use]
    pub fn surface_value(mut self, name: &str, ty: ScalarType) -> Self {
        self.surface.values.push((name.to_string(), ty));
        self
    }

    #[must_use]
    pub fn surface_event(mut self, name: &str) -> Self {
        self.surface.events.push(name.to_string());
        self
    }
}

/// Console tables for every state of `model`.
pub fn tables_from_model(model: &Model) -> Result<Vec<StateTable>, StatewireError> {
    let device = |state: &crate::model::State, role| {
        let d = state.device(role);
        DeviceTable {
            values: d.values.iter().map(|v| (v.name.clone(), v.ty)).collect(),
            events: d.events.clone(),
        }
    };
    model
        .states()
        .iter()
        .map(|state| {
            let id = u8::try_from(state.index).map_err(|_| {
                StatewireError::Generation(format!("state {} has no one-byte id", state.name))
            })?;
            Ok(StateTable {
                name: state.name.clone(),
                id,
                primary: device(state, DeviceRole::Primary),
                surface: device(state, DeviceRole::Surface),
            })
        })
        .collect()
}

/// Surface value table indexed by state id, for the push decoder.
#[must_use]
pub fn push_table(tables: &[StateTable]) -> ValueTable {
    let len = tables.iter().map(|t| usize::from(t.id) + 1).max().unwrap_or(0);
    let mut table: ValueTable = vec![Vec::new(); len];
    for t in tables {
        table[usize::from(t.id)].clone_from(&t.surface.values);
    }
    table
}
