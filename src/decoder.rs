//! Resumable byte-at-a-time decoders.
//!
//! [`PushDecoder`] runs on the console and decodes value pushes from the
//! device. [`CommandDecoder`] is the device half: it decodes the console's
//! commands and handshake bytes, and backs the mock controller.
//!
//! Both share the framing rule that makes this awkward: the payload length is
//! not in the frame, it is the width of a type looked up from the state and
//! value ids two bytes earlier. Neither decoder ever needs more bytes than the
//! current frame declares, so chunk boundaries do not matter.

use crate::error::StatewireError;
use crate::frame::{Command, ACK, CHANGE_STATE, FIRE_EVENT, HELLO, SET_VALUE, VALUE_PUSH};
use crate::model::{DeviceRole, Model};
use crate::scalar::{ScalarType, ScalarValue};

/// Per-state ordered `(name, type)` lists, indexed by state id.
pub type ValueTable = Vec<Vec<(String, ScalarType)>>;

/// Build the value table of `role` from a model.
#[must_use]
pub fn value_table(model: &Model, role: DeviceRole) -> ValueTable {
    model
        .states()
        .iter()
        .map(|state| {
            state
                .device(role)
                .values
                .iter()
                .map(|v| (v.name.clone(), v.ty))
                .collect()
        })
        .collect()
}

fn resolve<'a>(
    table: &'a ValueTable,
    state: u8,
    value: u8,
) -> Result<&'a (String, ScalarType), StatewireError> {
    let values = table.get(usize::from(state)).ok_or_else(|| {
        StatewireError::Protocol(format!("state id {state} out of range ({} states)", table.len()))
    })?;
    values.get(usize::from(value)).ok_or_else(|| {
        StatewireError::Protocol(format!(
            "value id {value} out of range for state {state} ({} values)",
            values.len()
        ))
    })
}

/// One decoded value push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueUpdate {
    pub state: u8,
    pub name: String,
    pub value: ScalarValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushState {
    Idle,
    GotStateByte,
    GotValueByte,
    AccumulatingPayload,
}

/// Decoder for device-to-console value pushes.
///
/// Values are resolved against the surface-visible table of the frame's state.
#[derive(Debug, Clone)]
pub struct PushDecoder {
    table: ValueTable,
    state: PushState,
    frame_state: u8,
    pending: Option<(String, ScalarType)>,
    payload: Vec<u8>,
}

impl PushDecoder {
    #[must_use]
    pub fn new(table: ValueTable) -> Self {
        Self {
            table,
            state: PushState::Idle,
            frame_state: 0,
            pending: None,
            payload: Vec::with_capacity(4),
        }
    }

    pub fn reset(&mut self) {
        self.state = PushState::Idle;
        self.frame_state = 0;
        self.pending = None;
        self.payload.clear();
    }

    /// Feed a single byte.
    ///
    /// Returns `Ok(Some(update))` when a frame completes and `Ok(None)` while
    /// more bytes are needed. Bytes outside a frame are dropped silently.
    ///
    /// # Errors
    ///
    /// `StatewireError::Protocol` when the frame names a state or value the
    /// table does not have; the frame is dropped and the decoder is back in
    /// idle, ready for the next marker.
    pub fn feed(&mut self, byte: u8) -> Result<Option<ValueUpdate>, StatewireError> {
        match self.state {
            PushState::Idle => {
                if byte == VALUE_PUSH {
                    self.payload.clear();
                    self.state = PushState::GotStateByte;
                }
                Ok(None)
            }
            PushState::GotStateByte => {
                self.frame_state = byte;
                self.state = PushState::GotValueByte;
                Ok(None)
            }
            PushState::GotValueByte => match resolve(&self.table, self.frame_state, byte) {
                Ok(entry) => {
                    self.pending = Some(entry.clone());
                    self.state = PushState::AccumulatingPayload;
                    Ok(None)
                }
                Err(e) => {
                    self.reset();
                    Err(e)
                }
            },
            PushState::AccumulatingPayload => {
                self.payload.push(byte);
                let Some((name, ty)) = self.pending.as_ref() else {
                    self.reset();
                    return Ok(None);
                };
                if self.payload.len() < ty.width() {
                    return Ok(None);
                }
                let decoded = ty.decode(&self.payload).map(|value| ValueUpdate {
                    state: self.frame_state,
                    name: name.clone(),
                    value,
                });
                self.reset();
                decoded.map(Some)
            }
        }
    }

    /// Feed a chunk, collecting every completed update.
    ///
    /// Protocol errors are logged and the stream continues.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<ValueUpdate> {
        let mut updates = Vec::new();
        for &b in bytes {
            match self.feed(b) {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(e) => log::warn!("dropping value push: {e}"),
            }
        }
        updates
    }
}

/// What the device side sees on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceInput {
    Hello,
    Ack,
    Command(Command),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandState {
    Idle,
    ChangeStateId,
    EventState,
    EventId { state: u8 },
    ValueState,
    ValueId { state: u8 },
    Payload { state: u8, value: u8, width: usize },
}

/// Device-side decoder for console commands and handshake bytes.
#[derive(Debug, Clone)]
pub struct CommandDecoder {
    table: ValueTable,
    state: CommandState,
    payload: Vec<u8>,
}

impl CommandDecoder {
    /// `table` is the device's own value table, used for set-value widths.
    #[must_use]
    pub fn new(table: ValueTable) -> Self {
        Self {
            table,
            state: CommandState::Idle,
            payload: Vec::with_capacity(4),
        }
    }

    pub fn reset(&mut self) {
        self.state = CommandState::Idle;
        self.payload.clear();
    }

    /// Type of `(state, value)` in the device's table.
    pub fn value_type(&self, state: u8, value: u8) -> Result<ScalarType, StatewireError> {
        resolve(&self.table, state, value).map(|(_, ty)| *ty)
    }

    /// Feed a single byte. Unknown markers are dropped silently.
    ///
    /// # Errors
    ///
    /// `StatewireError::Protocol` when a set-value frame names an unknown
    /// state or value; the frame is dropped.
    pub fn feed(&mut self, byte: u8) -> Result<Option<DeviceInput>, StatewireError> {
        match self.state {
            CommandState::Idle => {
                match byte {
                    HELLO => return Ok(Some(DeviceInput::Hello)),
                    ACK => return Ok(Some(DeviceInput::Ack)),
                    CHANGE_STATE => self.state = CommandState::ChangeStateId,
                    FIRE_EVENT => self.state = CommandState::EventState,
                    SET_VALUE => self.state = CommandState::ValueState,
                    other => log::trace!("ignoring byte {other:#04x} outside a frame"),
                }
                Ok(None)
            }
            CommandState::ChangeStateId => {
                self.reset();
                Ok(Some(DeviceInput::Command(Command::ChangeState { state: byte })))
            }
            CommandState::EventState => {
                self.state = CommandState::EventId { state: byte };
                Ok(None)
            }
            CommandState::EventId { state } => {
                self.reset();
                Ok(Some(DeviceInput::Command(Command::FireEvent {
                    state,
                    event: byte,
                })))
            }
            CommandState::ValueState => {
                self.state = CommandState::ValueId { state: byte };
                Ok(None)
            }
            CommandState::ValueId { state } => match self.value_type(state, byte) {
                Ok(ty) => {
                    self.payload.clear();
                    self.state = CommandState::Payload {
                        state,
                        value: byte,
                        width: ty.width(),
                    };
                    Ok(None)
                }
                Err(e) => {
                    self.reset();
                    Err(e)
                }
            },
            CommandState::Payload { state, value, width } => {
                self.payload.push(byte);
                if self.payload.len() < width {
                    return Ok(None);
                }
                let payload = std::mem::take(&mut self.payload);
                self.reset();
                Ok(Some(DeviceInput::Command(Command::SetValue {
                    state,
                    value,
                    payload,
                })))
            }
        }
    }
}
