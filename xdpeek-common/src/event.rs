use crate::cursor::Cursor;
use crate::dispatch::Dissection;
use crate::header::{IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP};

/// Capacity of the payload snapshot carried by every event.
pub const SNAPSHOT_LEN: usize = 128;

/// Per-frame record passed from the XDP hook to userspace through the
/// per-CPU perf channel.
///
/// Addresses and ports are copied verbatim from the wire and therefore stay
/// in network byte order; the reader normalises them. For ICMP, `sport` and
/// `dport` carry the echo identifier and sequence number.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InspectEvent {
    /// `bpf_ktime_get_ns` at capture (CLOCK_MONOTONIC).
    pub ts: u64,
    pub saddr: u32,
    pub daddr: u32,
    pub sport: u16,
    pub dport: u16,
    /// IP protocol number.
    pub proto: u8,
    pub _pad: [u8; 3],
    /// Bytes from frame start to frame end.
    pub pkt_size: u32,
    /// Number of valid bytes at the front of `payload`.
    pub payload_len: u32,
    pub payload: [u8; SNAPSHOT_LEN],
}

const _: () = assert!(core::mem::size_of::<InspectEvent>() == 160);

impl InspectEvent {
    pub const fn zeroed() -> Self {
        Self {
            ts: 0,
            saddr: 0,
            daddr: 0,
            sport: 0,
            dport: 0,
            proto: 0,
            _pad: [0; 3],
            pkt_size: 0,
            payload_len: 0,
            payload: [0; SNAPSHOT_LEN],
        }
    }

    /// Overwrite every field from a dissected frame.
    ///
    /// Safe to call on a reused scratch record: the snapshot is rewritten in
    /// full, with zeroes past the copied prefix.
    #[inline(always)]
    pub fn fill(&mut self, dissection: &Dissection<'_>, ts: u64) {
        self.ts = ts;
        self.saddr = dissection.src_addr;
        self.daddr = dissection.dst_addr;
        self.sport = dissection.src_port;
        self.dport = dissection.dst_port;
        self.proto = dissection.proto;
        self._pad = [0; 3];
        self.pkt_size = dissection.frame_len;
        self.payload_len = copy_snapshot(&mut self.payload, dissection.payload);
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::from_number(self.proto)
    }

    /// The copied snapshot prefix. Clamped so a corrupt length never
    /// slices past the buffer.
    pub fn payload(&self) -> &[u8] {
        let len = (self.payload_len as usize).min(SNAPSHOT_LEN);
        &self.payload[..len]
    }
}

/// Copy up to `SNAPSHOT_LEN` bytes starting at `src`, one checked overlay
/// per byte, zero-filling the rest. Returns the number of bytes copied.
#[inline(always)]
fn copy_snapshot(dst: &mut [u8; SNAPSHOT_LEN], src: Option<Cursor<'_>>) -> u32 {
    let mut src = src;
    let mut copied = 0u32;
    for slot in dst.iter_mut() {
        *slot = match src.as_mut().and_then(|c| c.overlay::<u8>()) {
            Some(byte) => {
                copied += 1;
                *byte
            }
            None => 0,
        };
    }
    copied
}

/// Transport classification of an event's `proto` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl Protocol {
    pub const fn from_number(proto: u8) -> Self {
        match proto {
            IPPROTO_TCP => Protocol::Tcp,
            IPPROTO_UDP => Protocol::Udp,
            IPPROTO_ICMP => Protocol::Icmp,
            _ => Protocol::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch;
    use crate::testing::{pattern, FrameBuilder};

    fn event_for(frame: &[u8]) -> Option<InspectEvent> {
        let d = dispatch(Cursor::from_slice(frame))?;
        let mut ev = InspectEvent::zeroed();
        ev.fill(&d, 42);
        Some(ev)
    }

    #[test]
    fn test_field_offsets() {
        let ev = InspectEvent::zeroed();
        let base = &ev as *const _ as usize;
        assert_eq!(&ev.saddr as *const _ as usize - base, 8);
        assert_eq!(&ev.sport as *const _ as usize - base, 16);
        assert_eq!(&ev.proto as *const _ as usize - base, 20);
        assert_eq!(&ev.pkt_size as *const _ as usize - base, 24);
        assert_eq!(&ev.payload_len as *const _ as usize - base, 28);
        assert_eq!(ev.payload.as_ptr() as usize - base, 32);
    }

    #[test]
    fn test_tcp_scenario_full_snapshot_of_short_payload() {
        let body = pattern(64);
        let frame = FrameBuilder::tcp([10, 0, 0, 1], [10, 0, 0, 2], 443, 51000)
            .payload(&body)
            .build();
        let ev = event_for(&frame).unwrap();

        assert_eq!(ev.ts, 42);
        assert_eq!(ev.protocol(), Protocol::Tcp);
        assert_eq!(u16::from_be(ev.sport), 443);
        assert_eq!(u16::from_be(ev.dport), 51000);
        assert_eq!(ev.pkt_size as usize, frame.len());
        assert_eq!(ev.payload_len, 64);
        assert_eq!(ev.payload(), &body[..]);
        assert!(ev.payload[64..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_udp_scenario_snapshot_is_capped() {
        let body = pattern(300);
        let frame = FrameBuilder::udp([8, 8, 8, 8], [192, 168, 1, 10], 53, 12345)
            .payload(&body)
            .build();
        let ev = event_for(&frame).unwrap();

        assert_eq!(ev.protocol(), Protocol::Udp);
        assert_eq!(ev.payload_len as usize, SNAPSHOT_LEN);
        assert_eq!(&ev.payload[..], &body[..SNAPSHOT_LEN]);
    }

    #[test]
    fn test_truncated_tcp_header_scenario() {
        let frame = FrameBuilder::tcp([10, 0, 0, 1], [10, 0, 0, 2], 443, 51000).build();
        let truncated = &frame[..14 + 20 + 10];
        let ev = event_for(truncated).unwrap();

        assert_eq!(ev.protocol(), Protocol::Tcp);
        assert_eq!((ev.sport, ev.dport), (0, 0));
        assert_eq!(ev.payload_len, 0);
        assert_eq!(ev.pkt_size, 44);
    }

    #[test]
    fn test_other_protocol_carries_no_snapshot() {
        let frame = FrameBuilder::ipv4([1, 2, 3, 4], [5, 6, 7, 8], 50)
            .payload(&pattern(100))
            .build();
        let ev = event_for(&frame).unwrap();
        assert_eq!(ev.protocol(), Protocol::Other);
        assert_eq!(ev.proto, 50);
        assert_eq!(ev.payload_len, 0);
        assert!(ev.payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_icmp_echo_payload() {
        let frame = FrameBuilder::icmp_echo([1, 1, 1, 1], [2, 2, 2, 2], 99, 3)
            .payload(b"ping")
            .build();
        let ev = event_for(&frame).unwrap();
        assert_eq!(ev.protocol(), Protocol::Icmp);
        assert_eq!(u16::from_be(ev.sport), 99);
        assert_eq!(u16::from_be(ev.dport), 3);
        assert_eq!(ev.payload(), b"ping");
    }

    #[test]
    fn test_reused_scratch_is_fully_rewritten() {
        let long = FrameBuilder::udp([1, 1, 1, 1], [2, 2, 2, 2], 1, 2)
            .payload(&[0xee; 200])
            .build();
        let short = FrameBuilder::tcp([3, 3, 3, 3], [4, 4, 4, 4], 5, 6)
            .payload(&[0x11; 3])
            .build();

        let mut ev = InspectEvent::zeroed();
        ev.fill(&dispatch(Cursor::from_slice(&long)).unwrap(), 1);
        ev.fill(&dispatch(Cursor::from_slice(&short)).unwrap(), 2);

        assert_eq!(ev.ts, 2);
        assert_eq!(ev.payload(), &[0x11u8; 3]);
        assert!(ev.payload[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_snapshot_never_exceeds_available_bytes() {
        for extra in [0usize, 1, 17, 127, 128, 129, 500] {
            let frame = FrameBuilder::udp([1, 1, 1, 1], [2, 2, 2, 2], 1, 2)
                .payload(&pattern(extra))
                .build();
            let ev = event_for(&frame).unwrap();
            assert_eq!(ev.payload_len as usize, extra.min(SNAPSHOT_LEN));
        }
    }

    #[test]
    fn test_payload_accessor_clamps_corrupt_length() {
        let mut ev = InspectEvent::zeroed();
        ev.payload_len = 4096;
        assert_eq!(ev.payload().len(), SNAPSHOT_LEN);
    }

    #[test]
    fn test_protocol_from_number() {
        assert_eq!(Protocol::from_number(6), Protocol::Tcp);
        assert_eq!(Protocol::from_number(17), Protocol::Udp);
        assert_eq!(Protocol::from_number(1), Protocol::Icmp);
        assert_eq!(Protocol::from_number(0), Protocol::Other);
        assert_eq!(Protocol::from_number(58), Protocol::Other);
    }

    #[test]
    fn test_event_debug_names_fields() {
        let mut ev = InspectEvent::zeroed();
        ev.proto = IPPROTO_UDP;
        ev.payload_len = 3;
        let text = std::format!("{:?}", ev);
        assert!(text.starts_with("InspectEvent"));
        assert!(text.contains("proto: 17"));
        assert!(text.contains("payload_len: 3"));
    }
}
