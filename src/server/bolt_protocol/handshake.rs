//! Version negotiation (§4.7 Handshake): magic preamble check plus the
//! range/major/minor matching rule against the server's preference list.

pub const MAGIC_PREAMBLE: u32 = 0x6060_B017;

/// Descending preference order the server offers a client proposal against.
pub const SUPPORTED_VERSIONS: &[(u8, u8)] = &[(5, 4), (5, 0), (4, 4), (4, 3)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub fn new(major: u8, minor: u8) -> Self {
        ProtocolVersion { major, minor }
    }

    /// Decode one big-endian 4-byte handshake proposal:
    /// `0x00 | range<<16 | minor<<8 | major`.
    pub fn parse_proposal(word: u32) -> (u8, u8, u8) {
        let major = (word & 0xFF) as u8;
        let minor = ((word >> 8) & 0xFF) as u8;
        let range = ((word >> 16) & 0xFF) as u8;
        (major, minor, range)
    }

    /// The 4-byte server reply: `0x00 0x00 minor major` big-endian.
    pub fn to_reply_bytes(self) -> [u8; 4] {
        [0x00, 0x00, self.minor, self.major]
    }
}

/// Try each of the client's four proposals in order; within a proposal, try
/// each server-preferred version in descending preference order.
pub fn negotiate(proposals: [u32; 4]) -> Option<ProtocolVersion> {
    for word in proposals {
        if word == 0 {
            continue;
        }
        let (major, minor, range) = ProtocolVersion::parse_proposal(word);
        for &(sup_major, sup_minor) in SUPPORTED_VERSIONS {
            if sup_major != major {
                continue;
            }
            let matches = if range == 0 {
                sup_minor == minor
            } else {
                let low = minor.saturating_sub(range);
                sup_minor >= low && sup_minor <= minor
            };
            if matches {
                return Some(ProtocolVersion::new(sup_major, sup_minor));
            }
        }
    }
    None
}
