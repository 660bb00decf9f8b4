use std::io;
use thiserror::Error;

use crate::types::{attributes::DefineScope, frame::ArbitrationId};

/// Crate-wide result alias; the error defaults to [`MatrixError`].
pub type Result<T, E = MatrixError> = std::result::Result<T, E>;

/// Invariant violations detected by the mutation API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Arbitration ID {id:#X} is out of range (extended: {extended})")]
    InvalidArbitrationId { id: u32, extended: bool },
    #[error("Frame ID {id} already assigned to an existing frame")]
    DuplicateFrameId { id: ArbitrationId },
    #[error("Frame size {size} exceeds the 64 byte CAN FD payload")]
    InvalidFrameSize { size: u8 },
    #[error("Signal '{signal}' already exists in frame {frame}")]
    DuplicateSignalName { frame: ArbitrationId, signal: String },
    #[error("Signal '{signal}' has invalid bit length {length} (allowed 1..=64)")]
    InvalidSignalLength { signal: String, length: u16 },
    #[error(
        "Signal '{signal}' (start {start_bit}, length {length}) does not fit frame {frame} of {size} bytes"
    )]
    SignalOutOfFrame {
        frame: ArbitrationId,
        signal: String,
        start_bit: u16,
        length: u16,
        size: u8,
    },
    #[error("Frame {frame} already has multiplexor '{existing}', cannot add '{signal}'")]
    DuplicateMultiplexor {
        frame: ArbitrationId,
        existing: String,
        signal: String,
    },
    #[error("Selector {selector} of '{signal}' is outside the raw domain of multiplexor '{multiplexor}'")]
    MuxSelectorOutOfRange {
        signal: String,
        selector: u64,
        multiplexor: String,
    },
    #[error("Signal group '{group}' already exists in frame {frame}")]
    DuplicateSignalGroup { frame: ArbitrationId, group: String },
    #[error("ECU '{name}' already exists")]
    DuplicateEcu { name: String },
    #[error("Define '{key}' already declared for {scope} scope")]
    DuplicateDefine { scope: DefineScope, key: String },
    #[error("Value table '{name}' already exists")]
    DuplicateValueTable { name: String },
    #[error("Attribute '{key}' expects a {expected} value")]
    AttributeType { key: String, expected: String },
    #[error("Attribute '{key}' value {value} is outside the declared range")]
    AttributeOutOfRange { key: String, value: String },
}

/// Bit-math and raw-domain violations raised by the codec.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RangeError {
    #[error("Signal bit length cannot be zero")]
    ZeroLength,
    #[error("Signal bit length {length} exceeds 64 bits")]
    LengthTooLarge { length: u16 },
    #[error("Bit range (start {start_bit}, length {length}) exceeds the {buffer_bits} bit buffer")]
    OutOfBuffer {
        start_bit: u16,
        length: u16,
        buffer_bits: usize,
    },
    #[error("Raw value {raw:#X} does not fit in {length} bits")]
    RawOverflow { raw: u64, length: u16 },
    #[error("Scaling factor cannot be zero")]
    ZeroFactor,
    #[error("Physical value must be finite")]
    NonFinite,
}

/// A referenced entity could not be found.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    #[error("Frame {0} not found")]
    Frame(ArbitrationId),
    #[error("Signal '{signal}' not found in frame {frame}")]
    Signal { frame: ArbitrationId, signal: String },
    #[error("Signal group '{group}' not found in frame {frame}")]
    SignalGroup { frame: ArbitrationId, group: String },
    #[error("ECU '{0}' not found")]
    Ecu(String),
    #[error("Define '{key}' not declared for {scope} scope")]
    Define { scope: DefineScope, key: String },
    #[error("Value table '{0}' not found")]
    ValueTable(String),
    #[error("Attribute '{0}' not set")]
    Attribute(String),
}

/// Errors returned by high-level operations on [`Matrix`](crate::types::matrix::Matrix).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatrixError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Errors produced while reading a `.dbc` file.
#[derive(Debug, Error)]
pub enum DbcParseError {
    #[error("Not a valid .dbc file: {path}")]
    InvalidExtension { path: String },
    #[error("Failed to open '{path}'. \nError: {source}")]
    OpenFile {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed while reading '{path}'. \nError: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_error_from_kinds() {
        let err: MatrixError = RangeError::ZeroLength.into();
        assert!(matches!(err, MatrixError::Range(RangeError::ZeroLength)));

        let err: MatrixError = LookupError::Ecu("Gateway".into()).into();
        assert_eq!(err.to_string(), "ECU 'Gateway' not found");
    }

    #[test]
    fn test_invalid_id_message() {
        let err = ValidationError::InvalidArbitrationId {
            id: 0x800,
            extended: false,
        };
        assert_eq!(
            err.to_string(),
            "Arbitration ID 0x800 is out of range (extended: false)"
        );
    }
}
