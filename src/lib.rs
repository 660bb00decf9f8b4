//! # can_matrix
//!
//! Format-agnostic model of an automotive **CAN communication matrix**.
//!
//! ## Highlights
//! - **Matrix model**: frames, signals, signal groups, ECUs, attribute Defines and value
//!   tables in a SlotMap-backed [`Matrix`], built through a validating mutation API.
//! - **Codec**: bit-exact placement of little-endian (Intel) and big-endian (Motorola)
//!   signals in a payload, raw/physical scaling, and multiplex-aware frame encode/decode.
//! - **Diff**: structural comparison of two matrices into a tree of
//!   `Equal`/`Added`/`Deleted`/`Changed` nodes, with per-category ignore rules.
//! - **Copy and merge**: move frames and ECUs between matrices together with the Defines
//!   their attributes need.
//! - **DBC reader** (feature `dbc`): load `.dbc` files into a [`Matrix`].
//!
//! ## Example
//! ```
//! use can_matrix::{ArbitrationId, Frame, Matrix, Signal, codec};
//!
//! let id = ArbitrationId::standard(0x100).unwrap();
//! let mut db = Matrix::new();
//! db.add_frame(Frame::new(id, "Engine", 8).with_signal(Signal::new("Rpm", 0, 16))).unwrap();
//!
//! let payload = codec::encode_frame(db.frame(id).unwrap(), &[("Rpm", 3000.0)]).unwrap();
//! assert_eq!(payload[..2], [0xB8, 0x0B]);
//! ```

pub mod codec;
pub mod copy;
#[cfg(feature = "dbc")]
pub mod dbc;
pub mod diff;
#[doc(hidden)]
pub mod types;

// Top-level re-exports (appear under Crate Items → Structs)
#[doc(inline)]
pub use crate::types::{
    attributes::{AttributeMap, AttributeValue, Define, DefineKind, DefineScope, ValueTable},
    ecu::Ecu,
    errors::{DbcParseError, LookupError, MatrixError, RangeError, Result, ValidationError},
    frame::{ArbitrationId, Frame, MAX_FRAME_SIZE, SignalGroup},
    matrix::{AttributeTarget, EcuKey, FrameKey, Matrix},
    signal::{ByteOrder, MuxRole, Signal},
};
