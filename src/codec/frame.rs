use serde::Serialize;

use crate::codec::layout::{decode_raw_from_frame, encode_raw_into_frame};
use crate::types::{
    errors::{LookupError, RangeError, Result},
    frame::Frame,
    signal::{MuxRole, Signal},
};

/// One decoded signal of a payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecodedSignal {
    pub name: String,
    /// Raw bit pattern (sign-extended for signed signals).
    pub raw: u64,
    pub physical: f64,
    /// Value table label of the raw value, if any.
    pub label: Option<String>,
}

impl DecodedSignal {
    fn from_signal(sig: &Signal, raw: u64) -> Self {
        DecodedSignal {
            name: sig.name.clone(),
            raw,
            physical: sig.raw_to_physical(raw),
            label: sig.label_for(raw as i64).map(str::to_string),
        }
    }
}

/// Builds a `frame.size` byte payload from `(signal name, physical value)` pairs.
///
/// Signals not listed stay zero. Selecting a consistent multiplexor value is up to the caller.
pub fn encode_frame(frame: &Frame, values: &[(&str, f64)]) -> Result<Vec<u8>> {
    let mut payload: Vec<u8> = vec![0u8; frame.size as usize];
    for &(name, physical) in values {
        let sig: &Signal = frame.signal(name).ok_or_else(|| LookupError::Signal {
            frame: frame.id,
            signal: name.to_string(),
        })?;
        let raw: u64 = sig.physical_to_raw(physical)?;
        encode_raw_into_frame(&mut payload, sig, raw)?;
    }
    Ok(payload)
}

/// Decodes every signal active in `payload`, in declaration order.
///
/// Multiplexed signals are included only when their selector equals the decoded
/// multiplexor value.
pub fn decode_frame(frame: &Frame, payload: &[u8]) -> Result<Vec<DecodedSignal>, RangeError> {
    let selector: Option<u64> = match frame.multiplexor() {
        Some(mux) => Some(decode_raw_from_frame(payload, mux)? & mux.raw_mask()),
        None => None,
    };

    let mut out: Vec<DecodedSignal> = Vec::with_capacity(frame.signals.len());
    for sig in &frame.signals {
        let active: bool = match sig.mux {
            MuxRole::None | MuxRole::Multiplexor => true,
            MuxRole::Multiplexed(v) => selector == Some(v),
        };
        if active {
            let raw: u64 = decode_raw_from_frame(payload, sig)?;
            out.push(DecodedSignal::from_signal(sig, raw));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::errors::MatrixError;
    use crate::types::frame::ArbitrationId;
    use crate::types::signal::ByteOrder;

    fn build_test_frame() -> Frame {
        Frame::new(ArbitrationId::standard(0x100).unwrap(), "Engine", 8)
            .with_signal(Signal::new("Page", 0, 2).with_mux(MuxRole::Multiplexor))
            .with_signal(
                Signal::new("Rpm", 8, 16)
                    .with_scaling(0.25, 0.0)
                    .with_mux(MuxRole::Multiplexed(0)),
            )
            .with_signal(
                Signal::new("Temp", 8, 8)
                    .with_signed(true)
                    .with_scaling(1.0, -40.0)
                    .with_mux(MuxRole::Multiplexed(1)),
            )
            .with_signal(
                Signal::new("Gear", 31, 8)
                    .with_byte_order(ByteOrder::BigEndian)
                    .with_value(3, "Drive"),
            )
    }

    #[test]
    fn test_encode_decode_page0() {
        let frame = build_test_frame();
        let payload = encode_frame(&frame, &[("Page", 0.0), ("Rpm", 2000.0), ("Gear", 3.0)]).unwrap();
        assert_eq!(payload.len(), 8);
        assert_eq!(&payload[1..3], &[0x40, 0x1F]); // 8000 LE
        assert_eq!(payload[3], 3);

        let decoded = decode_frame(&frame, &payload).unwrap();
        let names: Vec<&str> = decoded.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Page", "Rpm", "Gear"]);
        assert_eq!(decoded[1].physical, 2000.0);
        assert_eq!(decoded[2].label.as_deref(), Some("Drive"));
    }

    #[test]
    fn test_decode_selects_mux_page() {
        let frame = build_test_frame();
        let payload = encode_frame(&frame, &[("Page", 1.0), ("Temp", -50.0)]).unwrap();
        let decoded = decode_frame(&frame, &payload).unwrap();
        let temp = decoded.iter().find(|d| d.name == "Temp").unwrap();
        assert_eq!(temp.physical, -50.0);
        assert_eq!(temp.raw as i64, -10);
        assert!(decoded.iter().all(|d| d.name != "Rpm"));
    }

    #[test]
    fn test_encode_unknown_signal() {
        let frame = build_test_frame();
        assert!(matches!(
            encode_frame(&frame, &[("Missing", 1.0)]),
            Err(MatrixError::Lookup(LookupError::Signal { .. }))
        ));
    }

    #[test]
    fn test_decode_short_payload() {
        let frame = build_test_frame();
        assert!(matches!(
            decode_frame(&frame, &[0u8; 2]),
            Err(RangeError::OutOfBuffer { .. })
        ));
    }
}
