use super::markers::*;
use super::value::Value;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum CodecError {
    #[error("unexpected end of data")]
    Eof,
    #[error("unknown marker byte: 0x{0:02X}")]
    BadMarker(u8),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
}

/// Decode exactly one value from `data`.
pub fn decode(data: &[u8]) -> Result<Value, CodecError> {
    let mut decoder = Decoder::new(data);
    decoder.decode_value()
}

/// Decode every value present in `data`, in order, until exhausted.
pub fn decode_all(data: &[u8]) -> Result<Vec<Value>, CodecError> {
    let mut decoder = Decoder::new(data);
    let mut values = Vec::new();
    while decoder.remaining() > 0 {
        values.push(decoder.decode_value()?);
    }
    Ok(values)
}

/// A cursor-based PackStream decoder over a byte slice.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8, CodecError> {
        let b = *self.data.get(self.pos).ok_or(CodecError::Eof)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.data.len() {
            return Err(CodecError::Eof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_string(&mut self, n: usize) -> Result<String, CodecError> {
        let bytes = self.read_bytes(n)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn decode_value(&mut self) -> Result<Value, CodecError> {
        let marker = self.read_byte()?;

        // Tiny-negative-int must be checked before the tiny-positive/other
        // range comparisons below, since 0xF0..=0xFF would otherwise be
        // mistaken for struct/map/list/string markers in naive range code.
        if marker >= TINY_NEG_START {
            return Ok(Value::Int(marker as i8 as i64));
        }

        if marker <= TINY_INT_MAX {
            return Ok(Value::Int(marker as i64));
        }

        if (TINY_STRING..TINY_LIST).contains(&marker) {
            let size = (marker & 0x0F) as usize;
            return Ok(Value::String(self.read_string(size)?));
        }

        if (TINY_LIST..TINY_MAP).contains(&marker) {
            let size = (marker & 0x0F) as usize;
            return self.decode_list(size);
        }

        if (TINY_MAP..TINY_STRUCT).contains(&marker) {
            let size = (marker & 0x0F) as usize;
            return self.decode_map(size);
        }

        if (TINY_STRUCT..TINY_NEG_START).contains(&marker) {
            let size = (marker & 0x0F) as usize;
            return self.decode_struct(size);
        }

        match marker {
            NULL => Ok(Value::Null),
            FALSE => Ok(Value::Bool(false)),
            TRUE => Ok(Value::Bool(true)),
            FLOAT_64 => {
                let bytes = self.read_bytes(8)?;
                let bits = u64::from_be_bytes(bytes.try_into().unwrap());
                Ok(Value::Float(f64::from_bits(bits)))
            }
            INT_8 => {
                let b = self.read_byte()?;
                Ok(Value::Int(b as i8 as i64))
            }
            INT_16 => {
                let bytes = self.read_bytes(2)?;
                Ok(Value::Int(i16::from_be_bytes(bytes.try_into().unwrap()) as i64))
            }
            INT_32 => {
                let bytes = self.read_bytes(4)?;
                Ok(Value::Int(i32::from_be_bytes(bytes.try_into().unwrap()) as i64))
            }
            INT_64 => {
                let bytes = self.read_bytes(8)?;
                Ok(Value::Int(i64::from_be_bytes(bytes.try_into().unwrap())))
            }
            BYTES_8 => {
                let size = self.read_byte()? as usize;
                Ok(Value::Bytes(self.read_bytes(size)?.to_vec()))
            }
            BYTES_16 => {
                let size = u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()) as usize;
                Ok(Value::Bytes(self.read_bytes(size)?.to_vec()))
            }
            BYTES_32 => {
                let size = u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()) as usize;
                Ok(Value::Bytes(self.read_bytes(size)?.to_vec()))
            }
            STRING_8 => {
                let size = self.read_byte()? as usize;
                Ok(Value::String(self.read_string(size)?))
            }
            STRING_16 => {
                let size = u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()) as usize;
                Ok(Value::String(self.read_string(size)?))
            }
            STRING_32 => {
                let size = u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()) as usize;
                Ok(Value::String(self.read_string(size)?))
            }
            LIST_8 => {
                let size = self.read_byte()? as usize;
                self.decode_list(size)
            }
            LIST_16 => {
                let size = u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()) as usize;
                self.decode_list(size)
            }
            LIST_32 => {
                let size = u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()) as usize;
                self.decode_list(size)
            }
            MAP_8 => {
                let size = self.read_byte()? as usize;
                self.decode_map(size)
            }
            MAP_16 => {
                let size = u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()) as usize;
                self.decode_map(size)
            }
            MAP_32 => {
                let size = u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()) as usize;
                self.decode_map(size)
            }
            STRUCT_8 => {
                let size = self.read_byte()? as usize;
                self.decode_struct(size)
            }
            STRUCT_16 => {
                let size = u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()) as usize;
                self.decode_struct(size)
            }
            other => Err(CodecError::BadMarker(other)),
        }
    }

    fn decode_list(&mut self, size: usize) -> Result<Value, CodecError> {
        let mut items = Vec::with_capacity(size);
        for _ in 0..size {
            items.push(self.decode_value()?);
        }
        Ok(Value::List(items))
    }

    fn decode_map(&mut self, size: usize) -> Result<Value, CodecError> {
        let mut entries = Vec::with_capacity(size);
        for _ in 0..size {
            let key = match self.decode_value()? {
                Value::String(s) => s,
                other => format!("{:?}", other),
            };
            let value = self.decode_value()?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }

    fn decode_struct(&mut self, size: usize) -> Result<Value, CodecError> {
        let tag = self.read_byte()?;
        let mut fields = Vec::with_capacity(size);
        for _ in 0..size {
            fields.push(self.decode_value()?);
        }
        Ok(Value::Struct { tag, fields })
    }
}
