//! Scalar value types carried on the wire.
//!
//! Every value declared in a description has one of these types. The type
//! fixes the payload width of set-value and value-push frames, so the
//! mapping here is shared by every generator and by the console codec.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StatewireError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
}

impl ScalarType {
    pub const ALL: [Self; 7] = [
        Self::Bool,
        Self::Int8,
        Self::Uint8,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
    ];

    /// Keyword used in descriptions and in the canonical BuildId serialization.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
        }
    }

    /// Payload width in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 => 4,
        }
    }

    #[must_use]
    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32)
    }

    /// Native type name in generated firmware source.
    #[must_use]
    pub const fn c_type(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8_t",
            Self::Uint8 => "uint8_t",
            Self::Int16 => "int16_t",
            Self::Uint16 => "uint16_t",
            Self::Int32 => "int32_t",
            Self::Uint32 => "uint32_t",
        }
    }

    /// Type tag constant in generated control-surface source.
    #[must_use]
    pub const fn js_type(&self) -> &'static str {
        match self {
            Self::Bool => "Manager.TYPE_BOOL",
            Self::Int8 => "Manager.TYPE_INT8",
            Self::Uint8 => "Manager.TYPE_UINT8",
            Self::Int16 => "Manager.TYPE_INT16",
            Self::Uint16 => "Manager.TYPE_UINT16",
            Self::Int32 => "Manager.TYPE_INT32",
            Self::Uint32 => "Manager.TYPE_UINT32",
        }
    }

    /// Path of this variant in generated console source.
    #[must_use]
    pub const fn rust_path(&self) -> &'static str {
        match self {
            Self::Bool => "ScalarType::Bool",
            Self::Int8 => "ScalarType::Int8",
            Self::Uint8 => "ScalarType::Uint8",
            Self::Int16 => "ScalarType::Int16",
            Self::Uint16 => "ScalarType::Uint16",
            Self::Int32 => "ScalarType::Int32",
            Self::Uint32 => "ScalarType::Uint32",
        }
    }

    const fn range(&self) -> (i64, i64) {
        match self {
            Self::Bool => (0, 1),
            Self::Int8 => (i8::MIN as i64, i8::MAX as i64),
            Self::Uint8 => (0, u8::MAX as i64),
            Self::Int16 => (i16::MIN as i64, i16::MAX as i64),
            Self::Uint16 => (0, u16::MAX as i64),
            Self::Int32 => (i32::MIN as i64, i32::MAX as i64),
            Self::Uint32 => (0, u32::MAX as i64),
        }
    }

    /// Parse console input text for this type.
    ///
    /// Booleans accept exactly `true`, `True`, `false` and `False`; integer
    /// types accept a decimal literal that fits the type's range.
    pub fn parse_text(&self, text: &str) -> Result<ScalarValue, StatewireError> {
        if *self == Self::Bool {
            return match text {
                "true" | "True" => Ok(ScalarValue::Bool(true)),
                "false" | "False" => Ok(ScalarValue::Bool(false)),
                _ => Err(StatewireError::Command(format!("{text:?} is not a bool"))),
            };
        }
        let n: i64 = text
            .trim()
            .parse()
            .map_err(|_| StatewireError::Command(format!("{text:?} is not an integer")))?;
        let (lo, hi) = self.range();
        if n < lo || n > hi {
            return Err(StatewireError::Command(format!(
                "{n} is out of range for {} ({lo}..={hi})",
                self.keyword()
            )));
        }
        Ok(ScalarValue::Int(n))
    }

    /// Little-endian payload for `value`. Booleans encode as one byte `0x01`/`0x00`.
    pub fn encode(&self, value: ScalarValue) -> Result<Vec<u8>, StatewireError> {
        let n = match value {
            ScalarValue::Bool(b) if *self == Self::Bool => return Ok(vec![u8::from(b)]),
            ScalarValue::Int(n) if *self != Self::Bool => n,
            _ => {
                return Err(StatewireError::Command(format!(
                    "{value} is not a {} value",
                    self.keyword()
                )));
            }
        };
        let out_of_range =
            || StatewireError::Command(format!("{n} is out of range for {}", self.keyword()));
        let bytes = match self {
            Self::Int8 => i8::try_from(n).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
            Self::Bool | Self::Uint8 => {
                u8::try_from(n).map_err(|_| out_of_range())?.to_le_bytes().to_vec()
            }
            Self::Int16 => i16::try_from(n).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
            Self::Uint16 => u16::try_from(n).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
            Self::Int32 => i32::try_from(n).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
            Self::Uint32 => u32::try_from(n).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        };
        Ok(bytes)
    }

    /// Decode a little-endian payload of exactly [`Self::width`] bytes.
    ///
    /// A bool is false only for the byte `0`.
    pub fn decode(&self, payload: &[u8]) -> Result<ScalarValue, StatewireError> {
        if payload.len() != self.width() {
            return Err(StatewireError::Protocol(format!(
                "{} payload must be {} bytes, got {}",
                self.keyword(),
                self.width(),
                payload.len()
            )));
        }
        let v = match self {
            Self::Bool => return Ok(ScalarValue::Bool(payload[0] != 0)),
            Self::Int8 => i64::from(i8::from_le_bytes([payload[0]])),
            Self::Uint8 => i64::from(payload[0]),
            Self::Int16 => i64::from(i16::from_le_bytes([payload[0], payload[1]])),
            Self::Uint16 => i64::from(u16::from_le_bytes([payload[0], payload[1]])),
            Self::Int32 => i64::from(i32::from_le_bytes([
                payload[0], payload[1], payload[2], payload[3],
            ])),
            Self::Uint32 => i64::from(u32::from_le_bytes([
                payload[0], payload[1], payload[2], payload[3],
            ])),
        };
        Ok(ScalarValue::Int(v))
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.keyword() == s)
            .ok_or_else(|| format!("unknown type {s:?}"))
    }
}

/// A decoded or user-supplied scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_type() {
        assert_eq!(ScalarType::Bool.width(), 1);
        assert_eq!(ScalarType::Int8.width(), 1);
        assert_eq!(ScalarType::Uint16.width(), 2);
        assert_eq!(ScalarType::Int32.width(), 4);
        assert!(ScalarType::Int16.is_signed());
        assert!(!ScalarType::Uint32.is_signed());
    }

    #[test]
    fn bool_text_is_case_restricted() {
        assert_eq!(
            ScalarType::Bool.parse_text("True").expect("True"),
            ScalarValue::Bool(true)
        );
        assert_eq!(
            ScalarType::Bool.parse_text("false").expect("false"),
            ScalarValue::Bool(false)
        );
        assert!(ScalarType::Bool.parse_text("TRUE").is_err());
        assert!(ScalarType::Bool.parse_text("1").is_err());
    }

    #[test]
    fn integer_text_is_range_checked() {
        assert!(ScalarType::Uint8.parse_text("255").is_ok());
        assert!(ScalarType::Uint8.parse_text("256").is_err());
        assert!(ScalarType::Uint8.parse_text("-1").is_err());
        assert!(ScalarType::Int8.parse_text("-128").is_ok());
        assert!(ScalarType::Uint32.parse_text("notanumber").is_err());
        assert!(ScalarType::Uint32.parse_text("true").is_err());
    }

    #[test]
    fn encode_is_little_endian() {
        let v = ScalarType::Uint32.parse_text("5").expect("parse");
        assert_eq!(ScalarType::Uint32.encode(v).expect("encode"), vec![5, 0, 0, 0]);
        let v = ScalarType::Int16.parse_text("-2").expect("parse");
        assert_eq!(ScalarType::Int16.encode(v).expect("encode"), vec![0xFE, 0xFF]);
        assert_eq!(
            ScalarType::Bool.encode(ScalarValue::Bool(true)).expect("encode"),
            vec![1]
        );
    }

    #[test]
    fn decode_bool_nonzero_is_true() {
        assert_eq!(
            ScalarType::Bool.decode(&[0x7F]).expect("decode"),
            ScalarValue::Bool(true)
        );
        assert_eq!(
            ScalarType::Bool.decode(&[0]).expect("decode"),
            ScalarValue::Bool(false)
        );
        assert!(ScalarType::Uint16.decode(&[1]).is_err());
    }

    #[test]
    fn keyword_round_trips_through_from_str() {
        for ty in ScalarType::ALL {
            assert_eq!(ty.keyword().parse::<ScalarType>().expect("parse"), ty);
        }
        assert!("float".parse::<ScalarType>().is_err());
    }
}
