//! Connection handshake.
//!
//! ```text
//! console -> 05
//! device  -> 05 id0 id1 id2 id3     (BuildId, little-endian)
//! console -> 06
//! device  -> 06 state               (current state id)
//! ```
//!
//! Every step is strictly sequential and any deviation is fatal.

use std::io::{Read, Write};

use crate::config::maybe_log_frame;
use crate::error::StatewireError;
use crate::frame::{ACK, HELLO};

fn comm_error(step: &str, e: &std::io::Error) -> StatewireError {
    StatewireError::Communications(format!("{step}: {e}"))
}

fn read_byte<T: Read>(io: &mut T, step: &str) -> Result<u8, StatewireError> {
    let mut b = [0u8; 1];
    io.read_exact(&mut b).map_err(|e| comm_error(step, &e))?;
    Ok(b[0])
}

/// Run the console side of the handshake and return the device's current
/// state id.
///
/// # Errors
///
/// `StatewireError::Communications` for missing or unexpected bytes and
/// `StatewireError::VersionMismatch` when the device reports another
/// BuildId. Nothing is written after a mismatch.
pub fn handshake<T: Read + Write>(io: &mut T, expected: u32) -> Result<u8, StatewireError> {
    maybe_log_frame("send", &[HELLO]);
    io.write_all(&[HELLO])
        .and_then(|()| io.flush())
        .map_err(|e| comm_error("sending hello", &e))?;
    let echo = read_byte(io, "reading hello echo")?;
    if echo != HELLO {
        return Err(StatewireError::Communications(format!(
            "expected hello echo {HELLO:#04x}, got {echo:#04x}"
        )));
    }

    let mut id = [0u8; 4];
    io.read_exact(&mut id)
        .map_err(|e| comm_error("reading build id", &e))?;
    maybe_log_frame("recv", &id);
    let actual = u32::from_le_bytes(id);
    if actual != expected {
        log::error!("device build id {actual:#010x} does not match {expected:#010x}");
        return Err(StatewireError::VersionMismatch { expected, actual });
    }

    maybe_log_frame("send", &[ACK]);
    io.write_all(&[ACK])
        .and_then(|()| io.flush())
        .map_err(|e| comm_error("sending ack", &e))?;
    let ack = read_byte(io, "reading ack")?;
    if ack != ACK {
        return Err(StatewireError::Communications(format!(
            "expected ack {ACK:#04x}, got {ack:#04x}"
        )));
    }
    let state = read_byte(io, "reading current state")?;
    log::info!("handshake complete: build id {actual:#010x}, state {state}");
    Ok(state)
}

/// Device reply to a hello: echo plus the BuildId.
#[must_use]
pub fn hello_reply(build_id: u32) -> [u8; 5] {
    let id = build_id.to_le_bytes();
    [HELLO, id[0], id[1], id[2], id[3]]
}

/// Device reply to an ack: echo plus the current state id.
#[must_use]
pub const fn ack_reply(state: u8) -> [u8; 2] {
    [ACK, state]
}
