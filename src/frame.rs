//! Frame Factory: build a complete Ethernet + IP + UDP test frame and derive
//! the uncomplemented checksum the Checksum Patcher will later use.
//!
//! Grounded in `mkPdvFrame4`/`mkPdvFrame6`/`mkDataPdv` from
//! `original_source/pdv.c`, rebuilt atop [`crate::enet`], [`crate::ip`], and
//! [`crate::udp`]'s `ByteStruct` header types instead of raw pointer casts.
//! Where the teacher (`catnip`) encodes frame length in a const generic, this
//! module uses runtime-sized `Vec<u8>` buffers, because frame length here is
//! a command-line parameter, not known at compile time (see DESIGN.md).

use crate::checksum::{checksum_finalize, checksum_incomplete, uncomplemented};
use crate::enet::{EtherType, EthernetHeader};
use crate::ip::{IpV4Header, Ipv6Header};
use crate::udp::UdpHeader;
use crate::{IpV4Addr, IpV6Addr, MacAddr, Protocol};

/// 8-byte magic marking a buffer as a test frame, written and read as the
/// literal ASCII bytes `IDENTIFY`.
pub const MAGIC: [u8; 8] = *b"IDENTIFY";

/// Bytes of CRC/FCS excluded from the configured frame length.
pub const CRC_LEN: usize = 4;

/// Ethernet header length in bytes.
pub const ETH_LEN: usize = EthernetHeader::BYTE_LEN;
/// UDP header length in bytes.
pub const UDP_LEN: usize = UdpHeader::BYTE_LEN;
/// IPv4 header length in bytes.
pub const IPV4_LEN: usize = IpV4Header::BYTE_LEN;
/// IPv6 header length in bytes.
pub const IPV6_LEN: usize = Ipv6Header::BYTE_LEN;

/// Offset of the UDP payload (magic byte 0) within an IPv4 test frame.
pub const IPV4_PAYLOAD_OFFSET: usize = ETH_LEN + IPV4_LEN + UDP_LEN; // 42
/// Offset of the UDP payload (magic byte 0) within an IPv6 test frame.
pub const IPV6_PAYLOAD_OFFSET: usize = ETH_LEN + IPV6_LEN + UDP_LEN; // 62

/// Offset of the sequence counter within an IPv4 test frame.
pub const IPV4_COUNTER_OFFSET: usize = IPV4_PAYLOAD_OFFSET + 8; // 50
/// Offset of the sequence counter within an IPv6 test frame.
pub const IPV6_COUNTER_OFFSET: usize = IPV6_PAYLOAD_OFFSET + 8; // 70

/// Protocol byte offset for IPv4 frames (spec: "protocol byte at 23").
pub const IPV4_PROTOCOL_OFFSET: usize = 23;
/// Next-header byte offset for IPv6 frames (spec: "next-header byte at 20").
pub const IPV6_NEXT_HEADER_OFFSET: usize = 20;

/// UDP checksum field offset within an IPv4 test frame.
pub const IPV4_UDP_CHECKSUM_OFFSET: usize = ETH_LEN + IPV4_LEN + 6; // 40
/// UDP checksum field offset within an IPv6 test frame.
pub const IPV6_UDP_CHECKSUM_OFFSET: usize = ETH_LEN + IPV6_LEN + 6; // 60

/// A single preformed test frame, along with the offsets the hot send path
/// needs to patch it per-frame without re-parsing headers.
#[derive(Clone, Debug)]
pub struct FrameTemplate {
    /// Complete on-wire bytes, excluding FCS/CRC.
    pub bytes: Vec<u8>,
    /// Byte offset of the UDP checksum field.
    pub udp_checksum_offset: usize,
    /// Byte offset of the 8-byte sequence counter.
    pub counter_offset: usize,
    /// Checksum of the template with the counter field all-zero, before the
    /// final one's-complement (spec §4.2 input "a").
    pub uncomplemented_checksum: u16,
}

impl FrameTemplate {
    /// Write a new counter value and its patched checksum into the frame,
    /// per spec §4.2/§4.3. O(1): does not touch any byte besides the
    /// counter field and the checksum field.
    pub fn stamp(&mut self, counter: u64) {
        self.bytes[self.counter_offset..self.counter_offset + 8].copy_from_slice(&counter.to_ne_bytes());
        let patched = crate::checksum::patch_counter_checksum(self.uncomplemented_checksum, counter);
        self.bytes[self.udp_checksum_offset..self.udp_checksum_offset + 2].copy_from_slice(&patched.to_be_bytes());
    }
}

/// Build the fixed-layout UDP payload: 8-byte magic, 8-byte zeroed counter
/// placeholder, then the repeating `0..=255` filler (spec §3 Test Frame).
fn build_payload(len: usize) -> Vec<u8> {
    assert!(len >= 16, "UDP payload must fit magic + counter (16 bytes minimum)");
    let mut data = vec![0_u8; len];
    data[0..8].copy_from_slice(&MAGIC);
    for (i, b) in data[16..].iter_mut().enumerate() {
        *b = (i % 256) as u8;
    }
    data
}

/// Derive a UDP checksum over an IPv4 pseudo-header + UDP header (checksum
/// field zeroed) + payload, per RFC 768.
fn udp_checksum_v4(src: &IpV4Addr, dst: &IpV4Addr, udp_header_bytes: &[u8], payload: &[u8]) -> u16 {
    let mut sum = checksum_incomplete(&src.to_be_bytes());
    sum = sum.wrapping_add(checksum_incomplete(&dst.to_be_bytes()));
    sum = sum.wrapping_add(checksum_incomplete(&[0, Protocol::Udp as u8]));
    let udp_len = (udp_header_bytes.len() + payload.len()) as u16;
    sum = sum.wrapping_add(checksum_incomplete(&udp_len.to_be_bytes()));
    sum = sum.wrapping_add(checksum_incomplete(udp_header_bytes));
    sum = sum.wrapping_add(checksum_incomplete(payload));
    let folded = checksum_finalize(sum);
    if folded == 0 {
        0xFFFF
    } else {
        folded
    }
}

/// Derive a UDP checksum over an IPv6 pseudo-header + UDP header (checksum
/// field zeroed) + payload, per RFC 8200 §8.1.
fn udp_checksum_v6(src: &IpV6Addr, dst: &IpV6Addr, udp_header_bytes: &[u8], payload: &[u8]) -> u16 {
    let mut sum = checksum_incomplete(&src.to_be_bytes());
    sum = sum.wrapping_add(checksum_incomplete(&dst.to_be_bytes()));
    let udp_len = (udp_header_bytes.len() + payload.len()) as u32;
    sum = sum.wrapping_add(checksum_incomplete(&udp_len.to_be_bytes()));
    sum = sum.wrapping_add(checksum_incomplete(&[0, 0, 0, Protocol::Udp as u8]));
    sum = sum.wrapping_add(checksum_incomplete(udp_header_bytes));
    sum = sum.wrapping_add(checksum_incomplete(payload));
    let folded = checksum_finalize(sum);
    if folded == 0 {
        0xFFFF
    } else {
        folded
    }
}

/// Build an IPv4 test frame. `frame_len` includes the 4-byte FCS, as on the
/// command line; the returned buffer excludes it.
pub fn build_frame_v4(
    frame_len: u16,
    dst_mac: MacAddr,
    src_mac: MacAddr,
    src_ip: IpV4Addr,
    dst_ip: IpV4Addr,
) -> FrameTemplate {
    let total_len = frame_len as usize - CRC_LEN;
    assert!(total_len > ETH_LEN + IPV4_LEN + UDP_LEN, "frame too small to hold headers");
    let payload_len = total_len - ETH_LEN - IPV4_LEN - UDP_LEN;
    let payload = build_payload(payload_len);

    let ip_total_length = (total_len - ETH_LEN) as u16;
    let mut ip_header = IpV4Header::new(ip_total_length, Protocol::Udp, src_ip, dst_ip);

    let udp_length = (UDP_LEN + payload_len) as u16;
    let mut udp_header = UdpHeader {
        src_port: 0,
        dst_port: 0,
        length: udp_length,
        checksum: 0,
    };
    let udp_checksum = udp_checksum_v4(&src_ip, &dst_ip, &udp_header.to_be_bytes(), &payload);
    udp_header.checksum = udp_checksum;

    let ip_checksum = crate::checksum::checksum_full(&ip_header.to_be_bytes());
    ip_header.checksum = ip_checksum;

    let eth_header = EthernetHeader {
        dst_macaddr: dst_mac,
        src_macaddr: src_mac,
        ethertype: EtherType::IpV4,
    };

    let mut bytes = Vec::with_capacity(total_len);
    bytes.extend_from_slice(&eth_header.to_be_bytes());
    bytes.extend_from_slice(&ip_header.to_be_bytes());
    bytes.extend_from_slice(&udp_header.to_be_bytes());
    bytes.extend_from_slice(&payload);

    FrameTemplate {
        bytes,
        udp_checksum_offset: IPV4_UDP_CHECKSUM_OFFSET,
        counter_offset: IPV4_COUNTER_OFFSET,
        uncomplemented_checksum: uncomplemented(udp_checksum),
    }
}

/// Build an IPv6 test frame (also used for always-IPv6 background frames).
/// `frame_len` includes the 4-byte FCS, as on the command line; the returned
/// buffer excludes it.
pub fn build_frame_v6(
    frame_len: u16,
    dst_mac: MacAddr,
    src_mac: MacAddr,
    src_ip: IpV6Addr,
    dst_ip: IpV6Addr,
) -> FrameTemplate {
    let total_len = frame_len as usize - CRC_LEN;
    assert!(total_len > ETH_LEN + IPV6_LEN + UDP_LEN, "frame too small to hold headers");
    let payload_len = total_len - ETH_LEN - IPV6_LEN - UDP_LEN;
    let payload = build_payload(payload_len);

    let udp_length = (UDP_LEN + payload_len) as u16;
    let payload_length = udp_length; // IPv6 payload length excludes the fixed 40B header itself
    let mut ip_header = Ipv6Header::new(payload_length, Protocol::Udp, src_ip, dst_ip);

    let mut udp_header = UdpHeader {
        src_port: 0,
        dst_port: 0,
        length: udp_length,
        checksum: 0,
    };
    let udp_checksum = udp_checksum_v6(&src_ip, &dst_ip, &udp_header.to_be_bytes(), &payload);
    udp_header.checksum = udp_checksum;
    let _ = &mut ip_header; // no IPv6 header checksum: none exists in the protocol

    let eth_header = EthernetHeader {
        dst_macaddr: dst_mac,
        src_macaddr: src_mac,
        ethertype: EtherType::IpV6,
    };

    let mut bytes = Vec::with_capacity(total_len);
    bytes.extend_from_slice(&eth_header.to_be_bytes());
    bytes.extend_from_slice(&ip_header.to_be_bytes());
    bytes.extend_from_slice(&udp_header.to_be_bytes());
    bytes.extend_from_slice(&payload);

    FrameTemplate {
        bytes,
        udp_checksum_offset: IPV6_UDP_CHECKSUM_OFFSET,
        counter_offset: IPV6_COUNTER_OFFSET,
        uncomplemented_checksum: uncomplemented(udp_checksum),
    }
}

/// Set the network-index octet used for destination fanout (spec §3
/// "Destination fanout"): IPv4's third octet, bits 16..23.
pub fn perturb_ipv4_dest(addr: IpV4Addr, network: u8) -> IpV4Addr {
    let mut bytes = addr.to_be_bytes();
    bytes[2] = network;
    IpV4Addr::new(bytes)
}

/// Set the network-index octet used for destination fanout (spec §3
/// "Destination fanout"): IPv6's eighth octet, bits 56..63.
pub fn perturb_ipv6_dest(addr: IpV6Addr, network: u8) -> IpV6Addr {
    let mut bytes = addr.to_be_bytes();
    bytes[7] = network;
    IpV6Addr::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_frame_has_zero_checksum_end_to_end() {
        let mut t = build_frame_v4(
            84,
            MacAddr::BROADCAST,
            MacAddr::new([2, 0, 0, 0, 0, 1]),
            IpV4Addr::new([10, 0, 0, 1]),
            IpV4Addr::new([10, 0, 0, 2]),
        );
        t.stamp(0);
        assert_eq!(t.bytes[12], 0x08);
        assert_eq!(t.bytes[13], 0x00);
        assert_eq!(t.bytes[IPV4_PROTOCOL_OFFSET], Protocol::Udp as u8);
        assert_eq!(&t.bytes[IPV4_PAYLOAD_OFFSET..IPV4_PAYLOAD_OFFSET + 8], &MAGIC);

        // Verify end-to-end: UDP checksum over pseudo-header+payload folds to 0xFFFF (valid)
        let udp_bytes = &t.bytes[ETH_LEN + IPV4_LEN..];
        let cksum = udp_checksum_v4(
            &IpV4Addr::new([10, 0, 0, 1]),
            &IpV4Addr::new([10, 0, 0, 2]),
            &udp_bytes[0..UDP_LEN],
            &udp_bytes[UDP_LEN..],
        );
        assert_eq!(cksum, 0xFFFF);
    }

    #[test]
    fn v6_frame_layout_offsets_match_spec() {
        let mut t = build_frame_v6(
            84,
            MacAddr::BROADCAST,
            MacAddr::new([2, 0, 0, 0, 0, 1]),
            IpV6Addr::new([0x20, 1, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]),
            IpV6Addr::new([0x20, 1, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]),
        );
        t.stamp(42);
        assert_eq!(t.bytes[IPV6_NEXT_HEADER_OFFSET], Protocol::Udp as u8);
        assert_eq!(&t.bytes[IPV6_PAYLOAD_OFFSET..IPV6_PAYLOAD_OFFSET + 8], &MAGIC);
        let counter = u64::from_ne_bytes(
            t.bytes[IPV6_COUNTER_OFFSET..IPV6_COUNTER_OFFSET + 8]
                .try_into()
                .unwrap(),
        );
        assert_eq!(counter, 42);
    }

    #[test]
    fn destination_fanout_perturbs_expected_octet() {
        let base4 = IpV4Addr::new([198, 18, 0, 2]);
        assert_eq!(perturb_ipv4_dest(base4, 5).to_be_bytes()[2], 5);

        let base6 = IpV6Addr::new([0x20, 1, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(perturb_ipv6_dest(base6, 9).to_be_bytes()[7], 9);
    }
}
