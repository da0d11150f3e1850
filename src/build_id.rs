//! Build identifier: a 32-bit structural fingerprint of a [`Model`].
//!
//! The model is serialized canonically and hashed with CRC-32 (IEEE,
//! polynomial `0xEDB88320`, reflected, as computed by `crc32fast`):
//!
//! - per state in declaration order: `S` name NUL
//! - per role of the model's role set in canonical order: `D` role NUL
//! - per value in declaration order: `V` name NUL type NUL
//! - per event in declaration order: `E` name NUL
//!
//! Names are identifiers, so the NUL separators cannot be forged by content.

use crate::model::Model;

/// Canonical byte serialization hashed by [`build_id`].
#[must_use]
pub fn canonical_bytes(model: &Model) -> Vec<u8> {
    let mut out = Vec::new();
    let mut field = |tag: u8, parts: &[&str]| {
        out.push(tag);
        for part in parts {
            out.extend_from_slice(part.as_bytes());
            out.push(0);
        }
    };
    for state in model.states() {
        field(b'S', &[state.name.as_str()]);
        for role in model.roles() {
            let device = state.device(*role);
            field(b'D', &[role.block_name().as_str()]);
            for value in &device.values {
                field(b'V', &[value.name.as_str(), value.ty.keyword()]);
            }
            for event in &device.events {
                field(b'E', &[event.as_str()]);
            }
        }
    }
    out
}

/// Compute the BuildId exchanged during the console handshake.
#[must_use]
pub fn build_id(model: &Model) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&canonical_bytes(model));
    let id = hasher.finalize();
    tracing::debug!("computed build id {id:#010x}");
    id
}
