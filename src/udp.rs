//! Transport layer: User Datagram Protocol header.

use byte_struct::*;

/// UDP datagram header:
///
/// value `[0:1]` source port
///
/// value `[2:3]` destination port
///
/// value `[4:5]` total length in bytes, header + data
///
/// value `[6:7]` checksum
#[derive(ByteStruct, Clone, Copy, Debug, PartialEq, Eq)]
#[byte_struct_be]
pub struct UdpHeader {
    /// Source port
    pub src_port: u16,
    /// Destination port
    pub dst_port: u16,
    /// Total frame length including header and data
    pub length: u16,
    /// Checksum; `0` means "no checksum" on the wire, so a computed
    /// checksum of exactly zero is substituted with `0xFFFF`
    pub checksum: u16,
}

impl UdpHeader {
    /// Header size in bytes
    pub const BYTE_LEN: usize = 8;

    /// Pack into big-endian (network) byte array
    pub fn to_be_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut bytes = [0_u8; Self::BYTE_LEN];
        self.write_bytes(&mut bytes);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = UdpHeader {
            src_port: 12345,
            dst_port: 54321,
            length: UdpHeader::BYTE_LEN as u16 + 16,
            checksum: 0xABCD,
        };
        let bytes = h.to_be_bytes();
        let parsed = UdpHeader::read_bytes(&bytes);
        assert_eq!(parsed, h);
    }
}
