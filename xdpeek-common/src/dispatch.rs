use crate::cursor::Cursor;
use crate::header::{
    EthHdr, IcmpHdr, Ipv4Hdr, TcpHdr, UdpHdr, ETH_P_IPV4, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP,
};

/// Everything the layered decode learned about one IPv4 frame.
///
/// Address and port fields hold the wire bytes reinterpreted in native
/// order, so they remain in network byte order. Ports are zero and
/// `payload` is `None` whenever the transport header was missing, truncated
/// or of an unhandled protocol.
#[derive(Clone, Copy)]
pub struct Dissection<'a> {
    pub src_addr: u32,
    pub dst_addr: u32,
    pub proto: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub frame_len: u32,
    /// Cursor positioned on the first byte after the transport header.
    pub payload: Option<Cursor<'a>>,
}

/// Decode Ethernet, IPv4 and at most one transport header.
///
/// Returns `None` when the frame is too short for Ethernet or IPv4, or does
/// not carry IPv4. Every step is a single overlay; there is no header loop.
#[inline(always)]
pub fn dispatch(mut frame: Cursor<'_>) -> Option<Dissection<'_>> {
    let frame_len = frame.frame_len() as u32;

    let eth = frame.overlay::<EthHdr>()?;
    if eth.ether_type != ETH_P_IPV4 {
        return None;
    }

    let ip = frame.overlay::<Ipv4Hdr>()?;
    let mut out = Dissection {
        src_addr: u32::from_ne_bytes(ip.src_addr),
        dst_addr: u32::from_ne_bytes(ip.dst_addr),
        proto: ip.proto,
        src_port: 0,
        dst_port: 0,
        frame_len,
        payload: None,
    };

    match ip.proto {
        IPPROTO_TCP => {
            if let Some(tcp) = frame.overlay::<TcpHdr>() {
                out.src_port = u16::from_ne_bytes(tcp.source);
                out.dst_port = u16::from_ne_bytes(tcp.dest);
                out.payload = Some(frame);
            }
        }
        IPPROTO_UDP => {
            if let Some(udp) = frame.overlay::<UdpHdr>() {
                out.src_port = u16::from_ne_bytes(udp.source);
                out.dst_port = u16::from_ne_bytes(udp.dest);
                out.payload = Some(frame);
            }
        }
        IPPROTO_ICMP => {
            // Identifier and sequence ride in the port slots.
            if let Some(icmp) = frame.overlay::<IcmpHdr>() {
                out.src_port = u16::from_ne_bytes(icmp.id);
                out.dst_port = u16::from_ne_bytes(icmp.sequence);
                out.payload = Some(frame);
            }
        }
        _ => {}
    }

    Some(out)
}
