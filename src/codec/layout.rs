use crate::types::{
    errors::RangeError,
    signal::{ByteOrder, Signal},
};

/// One contiguous chunk of a signal inside a single payload byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    /// Source byte index.
    pub(crate) byte_index: usize,
    /// LSB within the source byte (0..7).
    pub(crate) src_lsb: u8,
    /// Number of bits to take (1..8).
    pub(crate) width: u8,
    /// Destination LSB in the final value (LSB-first).
    pub(crate) dst_lsb: u16,
}

impl Step {
    #[inline]
    fn byte_mask(&self) -> u8 {
        if self.width == 8 {
            0xFF
        } else {
            ((1u16 << self.width) - 1) as u8
        }
    }
}

/// Mask covering the `length` low bits. Lengths of 64 or more yield `u64::MAX`.
#[inline]
pub fn raw_mask(length: u16) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// Verifies that `(start_bit, length)` lies inside a buffer of `total_bits` bits.
///
/// - Little-endian: the field occupies `[start, start + length - 1]` on a linear plane.
/// - Big-endian: `start` is the LSB in MSB0 numbering and the field extends towards
///   lower positions, so it needs `length <= start + 1`.
pub fn check_bounds(
    start_bit: u16,
    length: u16,
    byte_order: ByteOrder,
    total_bits: usize,
) -> Result<(), RangeError> {
    if length == 0 {
        return Err(RangeError::ZeroLength);
    }
    if length > 64 {
        return Err(RangeError::LengthTooLarge { length });
    }
    let start: usize = start_bit as usize;
    let len: usize = length as usize;
    let fits: bool = match byte_order {
        ByteOrder::LittleEndian => start + len <= total_bits,
        ByteOrder::BigEndian => start < total_bits && len <= start + 1,
    };
    if fits {
        Ok(())
    } else {
        Err(RangeError::OutOfBuffer {
            start_bit,
            length,
            buffer_bits: total_bits,
        })
    }
}

/// Splits a (bounds-checked) bit range into per-byte steps, LSB first.
pub(crate) fn compile_steps(start_bit: u16, length: u16, byte_order: ByteOrder) -> Vec<Step> {
    // ceil((bit_len + (bit_start % 8)) / 8)
    let n_steps: usize = (length as usize + (start_bit as usize & 7)).div_ceil(8).max(1);
    let mut steps: Vec<Step> = Vec::with_capacity(n_steps);
    match byte_order {
        ByteOrder::LittleEndian => compile_little_endian(&mut steps, start_bit, length),
        ByteOrder::BigEndian => compile_big_endian(&mut steps, start_bit, length),
    }
    steps
}

fn compile_little_endian(steps: &mut Vec<Step>, start_bit: u16, length: u16) {
    let mut remaining: u16 = length;
    let mut bit: u16 = start_bit;
    let mut dst: u16 = 0;

    while remaining > 0 {
        let bit_off: u8 = (bit % 8) as u8;
        let take: u8 = remaining.min(8 - bit_off as u16) as u8;
        steps.push(Step {
            byte_index: (bit / 8) as usize,
            src_lsb: bit_off,
            width: take,
            dst_lsb: dst,
        });
        bit += take as u16;
        dst += take as u16;
        remaining -= take as u16;
    }
}

fn compile_big_endian(steps: &mut Vec<Step>, start_bit: u16, length: u16) {
    // MSB0 position -> (byte, bit-in-byte); the LSB sits at `start_bit`,
    // more significant bits climb inside the byte, then continue at bit 0 of the previous byte.
    let mut remaining: u16 = length;
    let mut byte: usize = (start_bit / 8) as usize;
    let mut bit: u8 = 7 - (start_bit % 8) as u8;
    let mut dst: u16 = 0;

    while remaining > 0 {
        let take: u8 = remaining.min(8 - bit as u16) as u8;
        steps.push(Step {
            byte_index: byte,
            src_lsb: bit,
            width: take,
            dst_lsb: dst,
        });
        dst += take as u16;
        remaining -= take as u16;
        if remaining > 0 {
            byte = byte.saturating_sub(1);
            bit = 0;
        }
    }
}

/// Writes `raw` into `buffer` at the bits owned by `signal`. Every other bit is left untouched.
///
/// For signed signals a sign-extended pattern (e.g. `u64::MAX` for -1) is accepted and
/// truncated to `length` bits; any other value above `2^length - 1` is rejected.
pub fn encode_raw_into_frame(buffer: &mut [u8], signal: &Signal, raw: u64) -> Result<(), RangeError> {
    check_bounds(
        signal.start_bit,
        signal.length,
        signal.byte_order,
        buffer.len() * 8,
    )?;
    let mask: u64 = raw_mask(signal.length);
    let raw: u64 = if raw & !mask == 0 {
        raw
    } else if signal.signed && is_sign_extended(raw, signal.length) {
        raw & mask
    } else {
        return Err(RangeError::RawOverflow {
            raw,
            length: signal.length,
        });
    };

    for st in compile_steps(signal.start_bit, signal.length, signal.byte_order) {
        let byte_mask: u8 = st.byte_mask();
        let chunk: u8 = ((raw >> st.dst_lsb) as u8) & byte_mask;
        let b: &mut u8 = &mut buffer[st.byte_index];
        *b = (*b & !(byte_mask << st.src_lsb)) | (chunk << st.src_lsb);
    }
    Ok(())
}

/// Reads the bits owned by `signal`; signed signals are sign-extended to 64 bits.
pub fn decode_raw_from_frame(buffer: &[u8], signal: &Signal) -> Result<u64, RangeError> {
    check_bounds(
        signal.start_bit,
        signal.length,
        signal.byte_order,
        buffer.len() * 8,
    )?;
    let mut out: u64 = 0;
    for st in compile_steps(signal.start_bit, signal.length, signal.byte_order) {
        let chunk: u64 = ((buffer[st.byte_index] >> st.src_lsb) & st.byte_mask()) as u64;
        out |= chunk << st.dst_lsb;
    }

    if signal.signed && signal.length < 64 && out & (1u64 << (signal.length - 1)) != 0 {
        out |= !raw_mask(signal.length);
    }
    Ok(out)
}

// Upper bits all ones and the sign bit of the field set.
fn is_sign_extended(raw: u64, length: u16) -> bool {
    let mask: u64 = raw_mask(length);
    raw | mask == u64::MAX && raw & (1u64 << (length - 1)) != 0
}

/// Converts a DBC big-endian start bit (signal MSB, LSB0 numbering inside each byte)
/// to the canonical start bit (signal LSB, MSB0 numbering).
pub fn dbc_msb_to_start_bit(dbc_start: u16, length: u16) -> u16 {
    let msb0: u16 = 8 * (dbc_start / 8) + (7 - dbc_start % 8);
    msb0.saturating_add(length.saturating_sub(1))
}

/// Inverse of [`dbc_msb_to_start_bit`].
pub fn start_bit_to_dbc_msb(start_bit: u16, length: u16) -> Result<u16, RangeError> {
    if length == 0 {
        return Err(RangeError::ZeroLength);
    }
    if length > start_bit + 1 {
        return Err(RangeError::OutOfBuffer {
            start_bit,
            length,
            buffer_bits: start_bit as usize + 1,
        });
    }
    let msb0: u16 = start_bit - (length - 1);
    Ok(8 * (msb0 / 8) + (7 - msb0 % 8))
}
