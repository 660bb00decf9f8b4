use serde::Serialize;
use std::fmt;

use crate::codec;
use crate::types::{
    attributes::{AttributeMap, AttributeValue, ValueTable},
    errors::RangeError,
};

/// Bit-numbering convention used to locate a signal inside the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ByteOrder {
    /// Intel: bit 0 is the LSB of byte 0, numbering increases across the buffer.
    #[default]
    LittleEndian,
    /// Motorola: `start_bit` is the signal LSB in MSB0 numbering (bit 7 of byte 0 is 0).
    BigEndian,
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ByteOrder::LittleEndian => "Intel",
            ByteOrder::BigEndian => "Motorola",
        })
    }
}

/// What role (if any) a signal plays in multiplexing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum MuxRole {
    /// Not multiplexed (always present).
    #[default]
    None,
    /// This signal is the multiplexer switch (marked as `M` in DBC).
    Multiplexor,
    /// Present only when the multiplexor raw value equals the selector (`mX` in DBC).
    Multiplexed(u64),
}

impl fmt::Display for MuxRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxRole::None => f.write_str("None"),
            MuxRole::Multiplexor => f.write_str("Multiplexor"),
            MuxRole::Multiplexed(v) => write!(f, "Multiplexed({})", v),
        }
    }
}

/// Definition of a signal within a CAN frame.
///
/// Describes position/bit-length, byte order, sign, scaling (factor/offset),
/// valid range, unit of measure, value descriptions, and receiver ECUs.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Signal {
    /// Signal name, unique within the owning frame.
    pub name: String,
    /// Start bit, interpreted according to `byte_order`.
    pub start_bit: u16,
    /// Bit length (1..=64).
    pub length: u16,
    pub byte_order: ByteOrder,
    pub signed: bool,
    /// Scaling factor.
    pub factor: f64,
    /// Scaling offset.
    pub offset: f64,
    /// Minimum physical value.
    pub min: f64,
    /// Maximum physical value.
    pub max: f64,
    pub unit: String,
    pub comment: String,
    /// Receiver ECUs by name; resolved against the owning matrix at use time.
    pub receivers: Vec<String>,
    /// Value-to-text mapping.
    pub values: ValueTable,
    pub mux: MuxRole,

    // --- Signal Attribute Entry ---
    pub attributes: AttributeMap,
}

impl Signal {
    /// New unsigned little-endian signal with identity scaling.
    pub fn new(name: &str, start_bit: u16, length: u16) -> Self {
        Signal {
            name: name.to_string(),
            start_bit,
            length,
            byte_order: ByteOrder::LittleEndian,
            signed: false,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: String::new(),
            comment: String::new(),
            receivers: Vec::new(),
            values: ValueTable::new(),
            mux: MuxRole::None,
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Adds a receiver ECU name. No duplicates.
    pub fn with_receiver(mut self, ecu: &str) -> Self {
        self.add_receiver(ecu);
        self
    }

    pub fn with_value(mut self, raw: i64, label: &str) -> Self {
        self.values.insert(raw, label.to_string());
        self
    }

    pub fn with_mux(mut self, mux: MuxRole) -> Self {
        self.mux = mux;
        self
    }

    pub fn with_attribute(mut self, key: &str, value: AttributeValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub(crate) fn add_receiver(&mut self, ecu: &str) -> bool {
        if self.receivers.iter().any(|r| r == ecu) {
            return false;
        }
        self.receivers.push(ecu.to_string());
        true
    }

    pub fn is_multiplexor(&self) -> bool {
        self.mux == MuxRole::Multiplexor
    }

    /// Mask covering the `length` low bits (all ones for 64 bit signals).
    pub fn raw_mask(&self) -> u64 {
        codec::raw_mask(self.length)
    }

    /// Label of `raw` in the signal value table, if any.
    pub fn label_for(&self, raw: i64) -> Option<&str> {
        self.values.get(&raw).map(String::as_str)
    }

    /// Interprets a raw bit pattern (sign-extended when signed) as a physical value.
    pub fn raw_to_physical(&self, raw: u64) -> f64 {
        let raw: f64 = if self.signed {
            raw as i64 as f64
        } else {
            raw as f64
        };
        codec::raw_to_physical(raw, self.factor, self.offset)
    }

    /// Converts a physical value to the raw pattern, clamped to the signal domain.
    pub fn physical_to_raw(&self, physical: f64) -> Result<u64, RangeError> {
        codec::physical_to_raw(physical, self.factor, self.offset, self.length, self.signed)
    }

    /// Returns `Ok(())` if the bit range fits a payload of `size` bytes.
    pub fn check_fits(&self, size: u8) -> Result<(), RangeError> {
        codec::check_bounds(
            self.start_bit,
            self.length,
            self.byte_order,
            size as usize * 8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let sig = Signal::new("EngineSpeed", 0, 16)
            .with_scaling(0.25, 0.0)
            .with_unit("rpm")
            .with_receiver("Gateway")
            .with_receiver("Gateway");

        assert_eq!(sig.byte_order, ByteOrder::LittleEndian);
        assert!(!sig.signed);
        assert_eq!(sig.receivers, vec!["Gateway".to_string()]);
        assert_eq!(sig.mux, MuxRole::None);
        assert_eq!(sig.raw_mask(), 0xFFFF);
    }

    #[test]
    fn test_label_for() {
        let sig = Signal::new("Gear", 0, 3).with_value(0, "Park").with_value(1, "Drive");
        assert_eq!(sig.label_for(1), Some("Drive"));
        assert_eq!(sig.label_for(5), None);
    }

    #[test]
    fn test_signed_physical() {
        let sig = Signal::new("Temp", 0, 8)
            .with_signed(true)
            .with_scaling(0.5, 0.0);
        // 0xFF sign-extended is -1
        assert_eq!(sig.raw_to_physical(u64::MAX), -0.5);
        assert_eq!(sig.physical_to_raw(-0.5).unwrap(), u64::MAX);
    }

    #[test]
    fn test_check_fits() {
        let sig = Signal::new("Flag", 7, 1);
        assert!(sig.check_fits(1).is_ok());
        let sig = Signal::new("Wide", 4, 8);
        assert!(sig.check_fits(1).is_err());
        assert!(sig.check_fits(2).is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(MuxRole::Multiplexed(3).to_string(), "Multiplexed(3)");
        assert_eq!(ByteOrder::BigEndian.to_string(), "Motorola");
    }
}
