use crate::codec::layout::raw_mask;
use crate::types::errors::RangeError;

/// `physical = raw * factor + offset`
#[inline]
pub fn raw_to_physical(raw: f64, factor: f64, offset: f64) -> f64 {
    raw * factor + offset
}

/// Inverse of [`raw_to_physical`]: rounds to the nearest integer and clamps to the raw
/// domain of a `length` bit field (`[0, 2^length - 1]`, or the two's complement range
/// when `signed`). Signed results are returned as sign-extended bit patterns.
pub fn physical_to_raw(
    physical: f64,
    factor: f64,
    offset: f64,
    length: u16,
    signed: bool,
) -> Result<u64, RangeError> {
    if length == 0 {
        return Err(RangeError::ZeroLength);
    }
    if length > 64 {
        return Err(RangeError::LengthTooLarge { length });
    }
    if factor == 0.0 {
        return Err(RangeError::ZeroFactor);
    }
    if !physical.is_finite() || !factor.is_finite() || !offset.is_finite() {
        return Err(RangeError::NonFinite);
    }

    let raw: f64 = ((physical - offset) / factor).round();
    if signed {
        let half: f64 = 2f64.powi(length as i32 - 1);
        // `as i64` saturates, which covers the 64 bit upper bound
        Ok(raw.clamp(-half, half - 1.0) as i64 as u64)
    } else {
        Ok(raw.clamp(0.0, raw_mask(length) as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_to_physical() {
        assert_eq!(raw_to_physical(100.0, 0.25, -10.0), 15.0);
        assert_eq!(raw_to_physical(-4.0, 0.5, 0.0), -2.0);
    }

    #[test]
    fn test_physical_to_raw_rounds_and_clamps() {
        assert_eq!(physical_to_raw(15.0, 0.25, -10.0, 16, false).unwrap(), 100);
        assert_eq!(physical_to_raw(0.6, 1.0, 0.0, 8, false).unwrap(), 1);
        assert_eq!(physical_to_raw(1000.0, 1.0, 0.0, 8, false).unwrap(), 255);
        assert_eq!(physical_to_raw(-5.0, 1.0, 0.0, 8, false).unwrap(), 0);

        assert_eq!(physical_to_raw(-1000.0, 1.0, 0.0, 8, true).unwrap() as i64, -128);
        assert_eq!(physical_to_raw(1000.0, 1.0, 0.0, 8, true).unwrap(), 127);
        assert_eq!(physical_to_raw(1e30, 1.0, 0.0, 64, false).unwrap(), u64::MAX);
    }

    #[test]
    fn test_scaling_round_trip() {
        for (factor, offset) in [(1.0, 0.0), (0.1, -40.0), (0.03125, 0.0), (-2.0, 7.5)] {
            for r in [0u64, 1, 17, 200, 255] {
                let phys = raw_to_physical(r as f64, factor, offset);
                let back = physical_to_raw(phys, factor, offset, 8, false).unwrap();
                assert!(back.abs_diff(r) <= 1, "factor {factor} offset {offset} raw {r}");
            }
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(physical_to_raw(1.0, 0.0, 0.0, 8, false), Err(RangeError::ZeroFactor));
        assert_eq!(physical_to_raw(f64::NAN, 1.0, 0.0, 8, false), Err(RangeError::NonFinite));
        assert_eq!(physical_to_raw(1.0, 1.0, 0.0, 0, false), Err(RangeError::ZeroLength));
    }
}
