//! Wire frame layouts.
//!
//! Console to device:
//! - change state: `00 state`
//! - fire event:   `01 state event`
//! - set value:    `02 state value payload...`
//!
//! Device to console:
//! - value push:   `02 state value payload...`
//!
//! Payloads are little-endian with the width of the value's [`ScalarType`];
//! bool is one byte. The handshake uses `05` and `06` (see `handshake.rs`).
//!
//! [`ScalarType`]: crate::scalar::ScalarType

pub const CHANGE_STATE: u8 = 0x00;
pub const FIRE_EVENT: u8 = 0x01;
pub const SET_VALUE: u8 = 0x02;
/// Same byte as [`SET_VALUE`]; the direction of travel disambiguates.
pub const VALUE_PUSH: u8 = 0x02;
pub const HELLO: u8 = 0x05;
pub const ACK: u8 = 0x06;

/// An outbound console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ChangeState { state: u8 },
    FireEvent { state: u8, event: u8 },
    SetValue { state: u8, value: u8, payload: Vec<u8> },
}

impl Command {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::ChangeState { state } => vec![CHANGE_STATE, *state],
            Self::FireEvent { state, event } => vec![FIRE_EVENT, *state, *event],
            Self::SetValue {
                state,
                value,
                payload,
            } => {
                let mut out = Vec::with_capacity(3 + payload.len());
                out.extend_from_slice(&[SET_VALUE, *state, *value]);
                out.extend_from_slice(payload);
                out
            }
        }
    }
}

/// Encode a device-to-console value push.
#[must_use]
pub fn encode_value_push(state: u8, value: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + payload.len());
    out.extend_from_slice(&[VALUE_PUSH, state, value]);
    out.extend_from_slice(payload);
    out
}
