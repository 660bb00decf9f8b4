//! # codec
//!
//! Pure functions moving bits between a [`Signal`](crate::Signal) and a payload buffer,
//! plus raw/physical scaling.
//!
//! Two bit-numbering conventions are supported:
//! - **Little-endian (Intel)**: bit 0 is the LSB of byte 0 and numbering increases across
//!   the buffer. `start_bit` is the signal LSB.
//! - **Big-endian (Motorola)**: bit 7 of byte 0 is position 0, numbering decreases inside a
//!   byte and continues at bit 7 of the next byte (MSB0). `start_bit` is the signal LSB in
//!   that numbering; the codec walks bytes *downward* from it. DBC files store the MSB
//!   instead, see [`dbc_msb_to_start_bit`].

mod frame;
mod layout;
mod scaling;

pub use frame::{DecodedSignal, decode_frame, encode_frame};
pub use layout::{
    check_bounds, dbc_msb_to_start_bit, decode_raw_from_frame, encode_raw_into_frame, raw_mask,
    start_bit_to_dbc_msb,
};
pub use scaling::{physical_to_raw, raw_to_physical};
