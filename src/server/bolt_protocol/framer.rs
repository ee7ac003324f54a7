//! Message chunking for the Bolt protocol (C2).
//!
//! Bolt messages travel as a sequence of length-prefixed chunks terminated
//! by a zero-length chunk: each chunk is a 2-byte big-endian size prefix
//! followed by that many payload bytes, and the maximum payload per chunk
//! is 65535 bytes.

pub const MAX_CHUNK_SIZE: usize = 65535;

/// Splits a message into consecutive chunks capped at `max_chunk_size`.
pub struct ChunkWriter {
    max_chunk_size: usize,
}

impl ChunkWriter {
    pub fn new(max_chunk_size: usize) -> Self {
        ChunkWriter {
            max_chunk_size: max_chunk_size.min(MAX_CHUNK_SIZE),
        }
    }

    /// Frame `data` into chunks and append the `0x0000` end marker, returning
    /// the fully framed byte sequence for a single write to the socket.
    pub fn write(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + data.len() / self.max_chunk_size.max(1) * 2 + 2);
        let mut offset = 0;
        while offset < data.len() {
            let chunk_size = (data.len() - offset).min(self.max_chunk_size);
            out.extend_from_slice(&(chunk_size as u16).to_be_bytes());
            out.extend_from_slice(&data[offset..offset + chunk_size]);
            offset += chunk_size;
        }
        out.extend_from_slice(&[0x00, 0x00]);
        out
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        ChunkWriter::new(MAX_CHUNK_SIZE)
    }
}

/// Reassembles chunked messages from an arbitrarily-partitioned byte stream.
///
/// Stateful and transport-agnostic: `feed` accepts any slice, however small
/// (down to a single byte), and returns whatever complete messages that feed
/// completed.
#[derive(Default)]
pub struct ChunkReader {
    buffer: Vec<u8>,
    message_buffer: Vec<u8>,
    expected_chunk_size: Option<u16>,
}

impl ChunkReader {
    pub fn new() -> Self {
        ChunkReader::default()
    }

    /// Feed newly-received bytes and return all messages this call completed.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);
        let mut messages = Vec::new();
        while let Some(message) = self.try_read_message() {
            messages.push(message);
        }
        messages
    }

    fn try_read_message(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.expected_chunk_size.is_none() {
                if self.buffer.len() < 2 {
                    return None;
                }
                let size = u16::from_be_bytes([self.buffer[0], self.buffer[1]]);
                self.buffer.drain(0..2);
                self.expected_chunk_size = Some(size);
            }

            let size = self.expected_chunk_size.expect("checked above");

            if size == 0 {
                self.expected_chunk_size = None;
                if !self.message_buffer.is_empty() {
                    return Some(std::mem::take(&mut self.message_buffer));
                }
                // Empty message: a legal no-op, skip and keep looking.
                continue;
            }

            let size = size as usize;
            if self.buffer.len() < size {
                return None;
            }
            self.message_buffer.extend(self.buffer.drain(0..size));
            self.expected_chunk_size = None;
        }
    }

    /// Drop all buffered state; used on protocol-fatal errors.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.message_buffer.clear();
        self.expected_chunk_size = None;
    }
}
