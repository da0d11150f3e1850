//! Static board topology.
//!
//! Boards on the bus are interchangeable; which one acts as primary is
//! decided at build time from the secondary roles present in the model.

use std::collections::BTreeSet;

use crate::model::DeviceRole;

/// Physical identity of the primary board when no secondary nominates one.
pub const DEFAULT_PRIMARY_UNIT: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopologyAssignment {
    /// Physical unit number of the primary board.
    pub primary_unit: u8,
    /// Bit `n - 2` is set when secondary `unitN` is present.
    pub secondary_mask: u8,
    /// Secondary roles with their physical unit numbers, ascending.
    pub secondaries: Vec<(DeviceRole, u8)>,
}

impl TopologyAssignment {
    /// Physical unit number assigned to `role`, if it is a board.
    #[must_use]
    pub fn unit_of(&self, role: DeviceRole) -> Option<u8> {
        match role {
            DeviceRole::Primary => Some(self.primary_unit),
            DeviceRole::Surface => None,
            DeviceRole::Secondary(_) => self
                .secondaries
                .iter()
                .find(|(r, _)| *r == role)
                .map(|(_, unit)| *unit),
        }
    }
}

/// Resolve the topology for the roles observed in a model.
///
/// Each present `unitN` sets bit `N - 2`; the lowest present secondary
/// nominates unit `N - 1` for the primary. With no secondaries the primary
/// keeps [`DEFAULT_PRIMARY_UNIT`] and the mask is empty.
#[must_use]
pub fn resolve_topology(roles: &BTreeSet<DeviceRole>) -> TopologyAssignment {
    let mut primary_unit: Option<u8> = None;
    let mut secondary_mask = 0u8;
    let mut secondaries = Vec::new();
    // BTreeSet iteration is ascending, which is the nomination precedence
    for role in roles {
        if let DeviceRole::Secondary(n) = *role {
            secondary_mask |= 1 << (n - DeviceRole::MIN_SECONDARY);
            if primary_unit.is_none() {
                primary_unit = Some(n - 1);
            }
            secondaries.push((*role, n));
        }
    }
    let assignment = TopologyAssignment {
        primary_unit: primary_unit.unwrap_or(DEFAULT_PRIMARY_UNIT),
        secondary_mask,
        secondaries,
    };
    tracing::debug!(
        primary_unit = assignment.primary_unit,
        secondary_mask = assignment.secondary_mask,
        "resolved topology"
    );
    assignment
}
