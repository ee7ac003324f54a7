//! Marker byte constants for the PackStream wire format.

pub const TINY_INT_MAX: u8 = 0x7F;
pub const TINY_STRING: u8 = 0x80;
pub const TINY_LIST: u8 = 0x90;
pub const TINY_MAP: u8 = 0xA0;
pub const TINY_STRUCT: u8 = 0xB0;

pub const NULL: u8 = 0xC0;
pub const FLOAT_64: u8 = 0xC1;
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

pub const BYTES_8: u8 = 0xCC;
pub const BYTES_16: u8 = 0xCD;
pub const BYTES_32: u8 = 0xCE;

pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;
pub const STRING_32: u8 = 0xD2;

pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;
pub const LIST_32: u8 = 0xD6;

pub const MAP_8: u8 = 0xD8;
pub const MAP_16: u8 = 0xD9;
pub const MAP_32: u8 = 0xDA;

pub const STRUCT_8: u8 = 0xDC;
pub const STRUCT_16: u8 = 0xDD;

/// Tiny-negative-int range is `0xF0..=0xFF`, decoding to `marker as i8 as i64`.
pub const TINY_NEG_START: u8 = 0xF0;
