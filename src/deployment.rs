//! Deployment config (`hardware.json`).
//!
//! ```json
//! { "name": "FirstProject",
//!   "units": { "unit1": { "serialNumber": "5573..." },
//!              "unit2": { "serialNumber": "8543..." } } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::StatewireError;

pub const HARDWARE_FILE: &str = "hardware.json";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UnitConfig {
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub name: String,
    #[serde(default)]
    pub units: BTreeMap<String, UnitConfig>,
}

impl Deployment {
    pub fn from_json(text: &str) -> Result<Self, StatewireError> {
        let deployment: Self = serde_json::from_str(text)
            .map_err(|e| StatewireError::Config(format!("invalid {HARDWARE_FILE}: {e}")))?;
        for name in deployment.units.keys() {
            unit_index(name)?;
        }
        Ok(deployment)
    }

    pub fn load(path: &Path) -> Result<Self, StatewireError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StatewireError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// The unit with the lowest index, which is wired as the primary.
    pub fn primary_unit(&self) -> Result<(u8, &UnitConfig), StatewireError> {
        self.units
            .iter()
            .filter_map(|(name, unit)| unit_index(name).ok().map(|n| (n, unit)))
            .min_by_key(|(n, _)| *n)
            .ok_or_else(|| StatewireError::Config(format!("{HARDWARE_FILE} lists no units")))
    }
}

fn unit_index(name: &str) -> Result<u8, StatewireError> {
    name.strip_prefix("unit")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| StatewireError::Config(format!("unit name {name:?} is not unitN")))
}
