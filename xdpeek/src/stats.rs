use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use xdpeek_common::Protocol;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ProtocolLabel {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl From<Protocol> for ProtocolLabel {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Tcp => ProtocolLabel::Tcp,
            Protocol::Udp => ProtocolLabel::Udp,
            Protocol::Icmp => ProtocolLabel::Icmp,
            Protocol::Other => ProtocolLabel::Other,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProtocolLabels {
    pub protocol: ProtocolLabel,
}

/// Reader-side counters. Cheap to clone; clones share the same values.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub records: Family<ProtocolLabels, Counter>,
    pub bytes: Counter,
    /// Samples the kernel could not place because a CPU's ring was full.
    pub lost: Counter,
    pub decode_errors: Counter,
}

impl Stats {
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "xdpeek_records",
            "Packet records received from the XDP program",
            self.records.clone(),
        );
        registry.register(
            "xdpeek_bytes",
            "Frame bytes covered by received records",
            self.bytes.clone(),
        );
        registry.register(
            "xdpeek_lost_records",
            "Records dropped because a per-CPU perf ring was full",
            self.lost.clone(),
        );
        registry.register(
            "xdpeek_decode_errors",
            "Perf samples that could not be decoded",
            self.decode_errors.clone(),
        );
    }

    pub fn record(&self, protocol: Protocol, frame_len: u32) {
        self.records
            .get_or_create(&ProtocolLabels {
                protocol: protocol.into(),
            })
            .inc();
        self.bytes.inc_by(frame_len as u64);
    }

    pub fn records_for(&self, protocol: Protocol) -> u64 {
        self.records
            .get_or_create(&ProtocolLabels {
                protocol: protocol.into(),
            })
            .get()
    }

    pub fn total_records(&self) -> u64 {
        [Protocol::Tcp, Protocol::Udp, Protocol::Icmp, Protocol::Other]
            .into_iter()
            .map(|p| self.records_for(p))
            .sum()
    }

    /// One-line summary for shutdown logging.
    pub fn summary(&self) -> String {
        format!(
            "{} records ({} TCP, {} UDP, {} ICMP, {} other), {} bytes, {} lost, {} undecodable",
            self.total_records(),
            self.records_for(Protocol::Tcp),
            self.records_for(Protocol::Udp),
            self.records_for(Protocol::Icmp),
            self.records_for(Protocol::Other),
            self.bytes.get(),
            self.lost.get(),
            self.decode_errors.get(),
        )
    }
}
