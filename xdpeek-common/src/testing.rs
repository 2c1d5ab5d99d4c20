//! Frame construction helpers for unit tests.

use std::vec::Vec;

use crate::header::{IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP};

pub struct FrameBuilder {
    bytes: Vec<u8>,
}

impl FrameBuilder {
    pub fn ethernet(ether_type: u16) -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        bytes.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
        bytes.extend_from_slice(&ether_type.to_be_bytes());
        Self { bytes }
    }

    pub fn ipv4(src: [u8; 4], dst: [u8; 4], proto: u8) -> Self {
        let mut b = Self::ethernet(0x0800);
        b.bytes.extend_from_slice(&[0x45, 0]);
        b.bytes.extend_from_slice(&0u16.to_be_bytes()); // tot_len, unused
        b.bytes.extend_from_slice(&[0, 0, 0x40, 0, 64, proto, 0, 0]);
        b.bytes.extend_from_slice(&src);
        b.bytes.extend_from_slice(&dst);
        b
    }

    pub fn tcp(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> Self {
        let mut b = Self::ipv4(src, dst, IPPROTO_TCP);
        b.bytes.extend_from_slice(&sport.to_be_bytes());
        b.bytes.extend_from_slice(&dport.to_be_bytes());
        b.bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]);
        b.bytes.extend_from_slice(&[0x50, 0x18, 0xff, 0xff, 0, 0, 0, 0]);
        b
    }

    pub fn udp(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> Self {
        let mut b = Self::ipv4(src, dst, IPPROTO_UDP);
        b.bytes.extend_from_slice(&sport.to_be_bytes());
        b.bytes.extend_from_slice(&dport.to_be_bytes());
        b.bytes.extend_from_slice(&[0, 8, 0, 0]);
        b
    }

    pub fn icmp_echo(src: [u8; 4], dst: [u8; 4], id: u16, seq: u16) -> Self {
        let mut b = Self::ipv4(src, dst, IPPROTO_ICMP);
        b.bytes.extend_from_slice(&[8, 0, 0, 0]);
        b.bytes.extend_from_slice(&id.to_be_bytes());
        b.bytes.extend_from_slice(&seq.to_be_bytes());
        b
    }

    pub fn payload(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Counting payload pattern: byte `i` holds `i as u8`.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}
