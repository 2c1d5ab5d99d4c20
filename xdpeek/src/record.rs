use chrono::{DateTime, Local, TimeZone, Utc};
use nix::time::{clock_gettime, ClockId};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

use xdpeek_common::{InspectEvent, Protocol};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("perf sample too short: {got} bytes, expected {expected}")]
    ShortSample { got: usize, expected: usize },
}

/// Reinterpret one perf sample as the kernel-side record.
pub fn decode_sample(sample: &[u8]) -> Result<InspectEvent, DecodeError> {
    let expected = core::mem::size_of::<InspectEvent>();
    if sample.len() < expected {
        return Err(DecodeError::ShortSample {
            got: sample.len(),
            expected,
        });
    }
    // SAFETY: length checked above; InspectEvent is plain data.
    Ok(unsafe { core::ptr::read_unaligned(sample.as_ptr() as *const InspectEvent) })
}

/// Maps `bpf_ktime_get_ns` readings (CLOCK_MONOTONIC) onto wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    offset_ns: i64,
}

impl MonotonicClock {
    /// Sample both clocks once. Later NTP steps are not tracked.
    pub fn calibrate() -> nix::Result<Self> {
        let mono = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
        let real = clock_gettime(ClockId::CLOCK_REALTIME)?;
        let ns = |t: nix::sys::time::TimeSpec| t.tv_sec() as i64 * 1_000_000_000 + t.tv_nsec() as i64;
        Ok(Self {
            offset_ns: ns(real) - ns(mono),
        })
    }

    pub fn with_offset(offset_ns: i64) -> Self {
        Self { offset_ns }
    }

    pub fn to_wall(&self, monotonic_ns: u64) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.offset_ns.saturating_add(monotonic_ns as i64))
    }
}

/// Per-protocol detail of a record.
///
/// The kernel record reuses its two port slots for the ICMP identifier and
/// sequence number; here they get their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Transport {
    Tcp { src_port: u16, dst_port: u16 },
    Udp { src_port: u16, dst_port: u16 },
    Icmp { id: u16, seq: u16 },
    Other { number: u8 },
}

impl Transport {
    fn from_event(event: &InspectEvent) -> Self {
        let a = u16::from_be(event.sport);
        let b = u16::from_be(event.dport);
        match event.protocol() {
            Protocol::Tcp => Transport::Tcp { src_port: a, dst_port: b },
            Protocol::Udp => Transport::Udp { src_port: a, dst_port: b },
            Protocol::Icmp => Transport::Icmp { id: a, seq: b },
            Protocol::Other => Transport::Other { number: event.proto },
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Transport::Tcp { .. } => Protocol::Tcp,
            Transport::Udp { .. } => Protocol::Udp,
            Transport::Icmp { .. } => Protocol::Icmp,
            Transport::Other { .. } => Protocol::Other,
        }
    }

    /// The two values shown in the port position of a text line.
    fn port_pair(&self) -> (u16, u16) {
        match *self {
            Transport::Tcp { src_port, dst_port } | Transport::Udp { src_port, dst_port } => {
                (src_port, dst_port)
            }
            Transport::Icmp { id, seq } => (id, seq),
            Transport::Other { .. } => (0, 0),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp { .. } => f.write_str("TCP"),
            Transport::Udp { .. } => f.write_str("UDP"),
            Transport::Icmp { .. } => f.write_str("ICMP"),
            Transport::Other { number } => write!(f, "{number}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PacketRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    #[serde(flatten)]
    pub transport: Transport,
    pub length: u32,
    #[serde(serialize_with = "lossy_utf8", skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
}

impl PacketRecord {
    /// Convert a kernel-side event into a userspace record, normalising
    /// byte order and timestamp.
    pub fn from_event(event: &InspectEvent, clock: &MonotonicClock) -> Self {
        Self {
            timestamp: clock.to_wall(event.ts),
            src_ip: Ipv4Addr::from(event.saddr.to_ne_bytes()),
            dst_ip: Ipv4Addr::from(event.daddr.to_ne_bytes()),
            transport: Transport::from_event(event),
            length: event.pkt_size,
            payload: event.payload().to_vec(),
        }
    }

    /// `Payload: ...` line, or None when nothing was captured.
    pub fn payload_line(&self) -> Option<String> {
        if self.payload.is_empty() {
            return None;
        }
        Some(format!("Payload: {}", String::from_utf8_lossy(&self.payload)))
    }
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sport, dport) = self.transport.port_pair();
        write!(
            f,
            "{} {} {}:{} -> {}:{} {} bytes",
            self.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S%.6f"),
            self.transport,
            self.src_ip,
            sport,
            self.dst_ip,
            dport,
            self.length
        )
    }
}

fn lossy_utf8<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(bytes))
}
