use serde::Serialize;
use std::fmt;

use crate::types::{
    attributes::{AttributeMap, AttributeValue},
    errors::{RangeError, ValidationError},
    signal::{MuxRole, Signal},
};

const CAN_SFF_MASK: u32 = 0x7FF; // 11 bit
const CAN_EFF_MASK: u32 = 0x1FFF_FFFF; // 29 bit
const CAN_EFF_FLAG: u32 = 0x8000_0000; // "extended" flag, SocketCAN/DBC style

/// Largest CAN FD payload in bytes.
pub const MAX_FRAME_SIZE: u8 = 64;

/// CAN identifier: numeric id plus the extended (29-bit) flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArbitrationId {
    id: u32,
    extended: bool,
}

impl ArbitrationId {
    /// 11-bit identifier.
    pub fn standard(id: u32) -> Result<Self, ValidationError> {
        if id > CAN_SFF_MASK {
            return Err(ValidationError::InvalidArbitrationId {
                id,
                extended: false,
            });
        }
        Ok(ArbitrationId {
            id,
            extended: false,
        })
    }

    /// 29-bit identifier.
    pub fn extended(id: u32) -> Result<Self, ValidationError> {
        if id > CAN_EFF_MASK {
            return Err(ValidationError::InvalidArbitrationId { id, extended: true });
        }
        Ok(ArbitrationId { id, extended: true })
    }

    /// Decodes a DBC numeric id, where bit 31 flags an extended identifier.
    pub fn from_dbc(raw: u32) -> Result<Self, ValidationError> {
        if raw & CAN_EFF_FLAG != 0 {
            Self::extended(raw & !CAN_EFF_FLAG)
        } else {
            Self::standard(raw)
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

impl fmt::Display for ArbitrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "0x{:X}x", self.id)
        } else {
            write!(f, "0x{:X}", self.id)
        }
    }
}

/// Named group of signals inside one frame. Members are referenced by signal name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SignalGroup {
    pub name: String,
    pub id: u32,
    pub signals: Vec<String>,
}

impl SignalGroup {
    pub fn new(name: &str, id: u32) -> Self {
        SignalGroup {
            name: name.to_string(),
            id,
            signals: Vec::new(),
        }
    }

    pub fn with_signal(mut self, signal: &str) -> Self {
        if !self.signals.iter().any(|s| s == signal) {
            self.signals.push(signal.to_string());
        }
        self
    }
}

/// CAN frame (message) definition.
///
/// Owns its signals and signal groups. Transmitters are ECU names resolved
/// against the owning matrix when needed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    pub id: ArbitrationId,
    pub name: String,
    /// Payload length in bytes.
    pub size: u8,
    /// CAN FD frame.
    pub fd: bool,
    pub comment: String,
    /// Transmitting ECUs for this frame.
    pub transmitters: Vec<String>,
    /// Signals in declaration order.
    pub signals: Vec<Signal>,
    pub signal_groups: Vec<SignalGroup>,

    // --- Frame Attribute Entry ---
    pub attributes: AttributeMap,
}

impl Frame {
    pub fn new(id: ArbitrationId, name: &str, size: u8) -> Self {
        Frame {
            id,
            name: name.to_string(),
            size,
            fd: size > 8,
            comment: String::new(),
            transmitters: Vec::new(),
            signals: Vec::new(),
            signal_groups: Vec::new(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn with_fd(mut self, fd: bool) -> Self {
        self.fd = fd;
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Adds a transmitter ECU name. No duplicates.
    pub fn with_transmitter(mut self, ecu: &str) -> Self {
        self.add_transmitter(ecu);
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn with_signal_group(mut self, group: SignalGroup) -> Self {
        self.signal_groups.push(group);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: AttributeValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub(crate) fn add_transmitter(&mut self, ecu: &str) -> bool {
        if self.transmitters.iter().any(|t| t == ecu) {
            return false;
        }
        self.transmitters.push(ecu.to_string());
        true
    }

    /// Returns a `&Signal` given its name (case-sensitive).
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub(crate) fn signal_mut(&mut self, name: &str) -> Option<&mut Signal> {
        self.signals.iter_mut().find(|s| s.name == name)
    }

    pub fn signal_group(&self, name: &str) -> Option<&SignalGroup> {
        self.signal_groups.iter().find(|g| g.name == name)
    }

    /// The multiplexor switch of this frame, if any.
    pub fn multiplexor(&self) -> Option<&Signal> {
        self.signals.iter().find(|s| s.is_multiplexor())
    }

    /// Signals gated by the multiplexor value `selector`.
    pub fn multiplexed_signals(&self, selector: u64) -> impl Iterator<Item = &Signal> + '_ {
        self.signals
            .iter()
            .filter(move |s| s.mux == MuxRole::Multiplexed(selector))
    }

    /// Checks `candidate` against the frame layout and every other signal of the frame.
    ///
    /// Signals named like `candidate` are ignored, so the check can be run for
    /// a signal already stored in the frame.
    pub fn validate_signal(&self, candidate: &Signal) -> Result<(), ValidationError> {
        if candidate.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if candidate.length == 0 || candidate.length > 64 {
            return Err(ValidationError::InvalidSignalLength {
                signal: candidate.name.clone(),
                length: candidate.length,
            });
        }
        candidate
            .check_fits(self.size)
            .map_err(|_: RangeError| ValidationError::SignalOutOfFrame {
                frame: self.id,
                signal: candidate.name.clone(),
                start_bit: candidate.start_bit,
                length: candidate.length,
                size: self.size,
            })?;

        let others = self.signals.iter().filter(|s| s.name != candidate.name);
        for other in others {
            match (candidate.mux, other.mux) {
                (MuxRole::Multiplexor, MuxRole::Multiplexor) => {
                    return Err(ValidationError::DuplicateMultiplexor {
                        frame: self.id,
                        existing: other.name.clone(),
                        signal: candidate.name.clone(),
                    });
                }
                (MuxRole::Multiplexed(selector), MuxRole::Multiplexor)
                    if selector > other.raw_mask() =>
                {
                    return Err(ValidationError::MuxSelectorOutOfRange {
                        signal: candidate.name.clone(),
                        selector,
                        multiplexor: other.name.clone(),
                    });
                }
                (MuxRole::Multiplexor, MuxRole::Multiplexed(selector))
                    if selector > candidate.raw_mask() =>
                {
                    return Err(ValidationError::MuxSelectorOutOfRange {
                        signal: other.name.clone(),
                        selector,
                        multiplexor: candidate.name.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validates the whole frame: size, signal names, layouts, multiplexing and groups.
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.size > MAX_FRAME_SIZE {
            return Err(ValidationError::InvalidFrameSize { size: self.size });
        }
        for (i, sig) in self.signals.iter().enumerate() {
            if self.signals[..i].iter().any(|s| s.name == sig.name) {
                return Err(ValidationError::DuplicateSignalName {
                    frame: self.id,
                    signal: sig.name.clone(),
                });
            }
            self.validate_signal(sig)?;
        }
        for (i, group) in self.signal_groups.iter().enumerate() {
            if self.signal_groups[..i].iter().any(|g| g.name == group.name) {
                return Err(ValidationError::DuplicateSignalGroup {
                    frame: self.id,
                    group: group.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::signal::ByteOrder;

    fn build_test_frame() -> Frame {
        Frame::new(ArbitrationId::standard(0x64).unwrap(), "Motor_01", 8)
            .with_transmitter("Motor")
            .with_signal(Signal::new("Mode", 0, 4).with_mux(MuxRole::Multiplexor))
            .with_signal(Signal::new("Speed", 8, 16).with_mux(MuxRole::Multiplexed(1)))
            .with_signal(Signal::new("Torque", 8, 16).with_mux(MuxRole::Multiplexed(2)))
    }

    #[test]
    fn test_arbitration_id_ranges() {
        assert!(ArbitrationId::standard(0x7FF).is_ok());
        assert!(ArbitrationId::standard(0x800).is_err());
        assert!(ArbitrationId::extended(0x1FFF_FFFF).is_ok());
        assert!(ArbitrationId::extended(0x2000_0000).is_err());

        let id = ArbitrationId::from_dbc(0x8000_0123).unwrap();
        assert!(id.is_extended());
        assert_eq!(id.id(), 0x123);
        assert_eq!(id.to_string(), "0x123x");
        assert_eq!(ArbitrationId::from_dbc(960).unwrap().to_string(), "0x3C0");
    }

    #[test]
    fn test_lookups() {
        let frame = build_test_frame();
        assert_eq!(frame.multiplexor().map(|s| s.name.as_str()), Some("Mode"));
        assert_eq!(frame.signal("Speed").map(|s| s.length), Some(16));
        assert!(frame.signal("speed").is_none());

        let names: Vec<&str> = frame.multiplexed_signals(2).map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Torque"]);
    }

    #[test]
    fn test_validate_signal_rejects_second_multiplexor() {
        let frame = build_test_frame();
        let second = Signal::new("Mode2", 4, 4).with_mux(MuxRole::Multiplexor);
        assert!(matches!(
            frame.validate_signal(&second),
            Err(ValidationError::DuplicateMultiplexor { .. })
        ));
    }

    #[test]
    fn test_validate_signal_selector_domain() {
        let frame = build_test_frame();
        // 4 bit multiplexor: selectors 0..=15
        let ok = Signal::new("Extra", 24, 8).with_mux(MuxRole::Multiplexed(15));
        assert!(frame.validate_signal(&ok).is_ok());
        let bad = Signal::new("Extra", 24, 8).with_mux(MuxRole::Multiplexed(16));
        assert!(matches!(
            frame.validate_signal(&bad),
            Err(ValidationError::MuxSelectorOutOfRange { selector: 16, .. })
        ));
    }

    #[test]
    fn test_validate_signal_layout() {
        let frame = Frame::new(ArbitrationId::standard(1).unwrap(), "Small", 1);
        let intel = Signal::new("A", 4, 5);
        assert!(matches!(
            frame.validate_signal(&intel),
            Err(ValidationError::SignalOutOfFrame { .. })
        ));
        let motorola = Signal::new("B", 7, 8).with_byte_order(ByteOrder::BigEndian);
        assert!(frame.validate_signal(&motorola).is_ok());
        let zero = Signal::new("C", 0, 0);
        assert!(matches!(
            frame.validate_signal(&zero),
            Err(ValidationError::InvalidSignalLength { length: 0, .. })
        ));
    }

    #[test]
    fn test_validate_duplicates() {
        let frame = build_test_frame().with_signal(Signal::new("Speed", 40, 8));
        assert!(matches!(
            frame.validate(),
            Err(ValidationError::DuplicateSignalName { .. })
        ));

        let frame = Frame::new(ArbitrationId::standard(2).unwrap(), "Big", 65);
        assert_eq!(
            frame.validate(),
            Err(ValidationError::InvalidFrameSize { size: 65 })
        );
    }
}
