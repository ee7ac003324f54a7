//! PackStream: Bolt's self-describing binary value format.
//!
//! Every value begins with a marker byte whose high nibble (or exact value)
//! selects the type and whose low nibble, for "tiny" forms, is the size.
//! See `markers` for the full table.

mod decode;
mod encode;
mod markers;
mod value;

pub use decode::{decode, decode_all, CodecError, Decoder};
pub use encode::{encode, Encoder};
pub use value::Value;
