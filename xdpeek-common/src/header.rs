//! Fixed-size protocol headers, laid out as they appear on the wire.
//!
//! Multi-byte fields are kept as byte arrays in network order so the structs
//! have alignment 1 and can be overlaid at any frame offset.

use crate::cursor::Header;

pub const ETH_P_IPV4: [u8; 2] = 0x0800_u16.to_be_bytes();

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

/// Ethernet II header (14 bytes).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct EthHdr {
    pub dst_addr: [u8; 6],
    pub src_addr: [u8; 6],
    pub ether_type: [u8; 2],
}

/// Fixed part of the IPv4 header (20 bytes). Options are not covered.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Hdr {
    pub version_ihl: u8,
    pub tos: u8,
    pub tot_len: [u8; 2],
    pub id: [u8; 2],
    pub frag_off: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub check: [u8; 2],
    pub src_addr: [u8; 4],
    pub dst_addr: [u8; 4],
}

/// Fixed part of the TCP header (20 bytes).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct TcpHdr {
    pub source: [u8; 2],
    pub dest: [u8; 2],
    pub seq: [u8; 4],
    pub ack_seq: [u8; 4],
    pub off_flags: [u8; 2],
    pub window: [u8; 2],
    pub check: [u8; 2],
    pub urg_ptr: [u8; 2],
}

/// UDP header (8 bytes).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct UdpHdr {
    pub source: [u8; 2],
    pub dest: [u8; 2],
    pub len: [u8; 2],
    pub check: [u8; 2],
}

/// ICMP header (8 bytes), with the rest-of-header word viewed as the
/// echo identifier and sequence number.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct IcmpHdr {
    pub icmp_type: u8,
    pub code: u8,
    pub check: [u8; 2],
    pub id: [u8; 2],
    pub sequence: [u8; 2],
}

unsafe impl Header for EthHdr {}
unsafe impl Header for Ipv4Hdr {}
unsafe impl Header for TcpHdr {}
unsafe impl Header for UdpHdr {}
unsafe impl Header for IcmpHdr {}
