use super::markers::*;
use super::value::Value;

/// Encode a single value, returning the framed bytes.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write(value);
    encoder.into_bytes()
}

/// A reusable PackStream encoder. Values are appended to an internal buffer;
/// call `into_bytes` (or `take_bytes`) to drain it.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    pub fn write(&mut self, value: &Value) {
        match value {
            Value::Null => self.buf.push(NULL),
            Value::Bool(true) => self.buf.push(TRUE),
            Value::Bool(false) => self.buf.push(FALSE),
            Value::Int(i) => self.write_int(*i),
            Value::Float(f) => {
                self.buf.push(FLOAT_64);
                self.buf.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            Value::String(s) => self.write_string(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::List(items) => self.write_list(items),
            Value::Map(entries) => self.write_map(entries),
            Value::Struct { tag, fields } => self.write_struct(*tag, fields),
        }
    }

    fn write_int(&mut self, value: i64) {
        if (-16..128).contains(&value) {
            self.buf.push(value as i8 as u8);
        } else if (i8::MIN as i64..=i8::MAX as i64).contains(&value) {
            self.buf.push(INT_8);
            self.buf.push(value as i8 as u8);
        } else if (i16::MIN as i64..=i16::MAX as i64).contains(&value) {
            self.buf.push(INT_16);
            self.buf.extend_from_slice(&(value as i16).to_be_bytes());
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
            self.buf.push(INT_32);
            self.buf.extend_from_slice(&(value as i32).to_be_bytes());
        } else {
            self.buf.push(INT_64);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let size = bytes.len();
        if size < 16 {
            self.buf.push(TINY_STRING | size as u8);
        } else if size < 256 {
            self.buf.push(STRING_8);
            self.buf.push(size as u8);
        } else if size < 65536 {
            self.buf.push(STRING_16);
            self.buf.extend_from_slice(&(size as u16).to_be_bytes());
        } else {
            self.buf.push(STRING_32);
            self.buf.extend_from_slice(&(size as u32).to_be_bytes());
        }
        self.buf.extend_from_slice(bytes);
    }

    fn write_bytes(&mut self, b: &[u8]) {
        let size = b.len();
        if size < 256 {
            self.buf.push(BYTES_8);
            self.buf.push(size as u8);
        } else if size < 65536 {
            self.buf.push(BYTES_16);
            self.buf.extend_from_slice(&(size as u16).to_be_bytes());
        } else {
            self.buf.push(BYTES_32);
            self.buf.extend_from_slice(&(size as u32).to_be_bytes());
        }
        self.buf.extend_from_slice(b);
    }

    fn write_list(&mut self, items: &[Value]) {
        let size = items.len();
        if size < 16 {
            self.buf.push(TINY_LIST | size as u8);
        } else if size < 256 {
            self.buf.push(LIST_8);
            self.buf.push(size as u8);
        } else if size < 65536 {
            self.buf.push(LIST_16);
            self.buf.extend_from_slice(&(size as u16).to_be_bytes());
        } else {
            self.buf.push(LIST_32);
            self.buf.extend_from_slice(&(size as u32).to_be_bytes());
        }
        for item in items {
            self.write(item);
        }
    }

    fn write_map(&mut self, entries: &[(String, Value)]) {
        let size = entries.len();
        if size < 16 {
            self.buf.push(TINY_MAP | size as u8);
        } else if size < 256 {
            self.buf.push(MAP_8);
            self.buf.push(size as u8);
        } else if size < 65536 {
            self.buf.push(MAP_16);
            self.buf.extend_from_slice(&(size as u16).to_be_bytes());
        } else {
            self.buf.push(MAP_32);
            self.buf.extend_from_slice(&(size as u32).to_be_bytes());
        }
        for (key, value) in entries {
            self.write_string(key);
            self.write(value);
        }
    }

    fn write_struct(&mut self, tag: u8, fields: &[Value]) {
        let size = fields.len();
        if size < 16 {
            self.buf.push(TINY_STRUCT | size as u8);
        } else if size < 256 {
            self.buf.push(STRUCT_8);
            self.buf.push(size as u8);
        } else {
            self.buf.push(STRUCT_16);
            self.buf.extend_from_slice(&(size as u16).to_be_bytes());
        }
        self.buf.push(tag);
        for field in fields {
            self.write(field);
        }
    }
}
