use std::io::{self, Write};

use anyhow::Context as _;
use aya::maps::perf::{AsyncPerfEventArray, AsyncPerfEventArrayBuffer};
use aya::maps::MapData;
use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::{Config, OutputFormat};
use crate::record::{decode_sample, MonotonicClock, PacketRecord};
use crate::stats::Stats;

/// Room for one perf sample: the 160-byte record plus perf framing.
const SAMPLE_CAPACITY: usize = 512;

/// Turns records into stdout lines.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub format: OutputFormat,
    pub show_payload: bool,
}

impl Printer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            format: config.format,
            show_payload: config.payload,
        }
    }

    pub fn write(&self, out: &mut impl Write, record: &PacketRecord) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(out, "{record}")?;
                if self.show_payload {
                    if let Some(line) = record.payload_line() {
                        writeln!(out, "{line}")?;
                    }
                }
            }
            OutputFormat::Json => {
                let mut value = serde_json::to_value(record).map_err(io::Error::other)?;
                if !self.show_payload {
                    if let Some(obj) = value.as_object_mut() {
                        obj.remove("payload");
                    }
                }
                writeln!(out, "{value}")?;
            }
        }
        Ok(())
    }
}

/// Everything a per-CPU reader needs besides its ring.
#[derive(Clone)]
pub struct ReaderContext {
    pub clock: MonotonicClock,
    pub stats: Stats,
    pub printer: Printer,
}

impl ReaderContext {
    /// Decode, count and print one batch drained from a CPU's ring.
    pub fn handle_batch<'a>(
        &self,
        cpu: u32,
        samples: impl IntoIterator<Item = &'a [u8]>,
        lost: usize,
        out: &mut impl Write,
    ) -> io::Result<()> {
        if lost > 0 {
            self.stats.lost.inc_by(lost as u64);
            tracing::warn!(cpu, lost, "perf ring full, records dropped");
        }

        for sample in samples {
            let event = match decode_sample(sample) {
                Ok(event) => event,
                Err(e) => {
                    self.stats.decode_errors.inc();
                    tracing::debug!(cpu, "skipping sample: {}", e);
                    continue;
                }
            };
            let record = PacketRecord::from_event(&event, &self.clock);
            self.stats.record(record.transport.protocol(), record.length);
            self.printer.write(out, &record)?;
        }
        out.flush()
    }
}

/// Rendered chunks queued between the readers and the stdout writer.
pub const OUTPUT_QUEUE: usize = 1024;

/// Write queued chunks to `out` until every sender is gone.
///
/// Blocks the calling thread; run it off the async workers.
pub fn drain_output<W: Write>(mut chunks: mpsc::Receiver<Vec<u8>>, mut out: W) -> io::Result<W> {
    while let Some(chunk) = chunks.blocking_recv() {
        out.write_all(&chunk)?;
        out.flush()?;
    }
    Ok(out)
}

/// Start the output writer on the blocking pool.
pub fn spawn_writer<W>(out: W) -> (mpsc::Sender<Vec<u8>>, JoinHandle<io::Result<W>>)
where
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OUTPUT_QUEUE);
    let handle = tokio::task::spawn_blocking(move || drain_output(rx, out));
    (tx, handle)
}

/// Open the ring of every online CPU and spawn one drain task per ring.
///
/// The tasks never finish on their own; one that returns has lost its ring.
pub fn spawn_readers(
    events: &mut AsyncPerfEventArray<MapData>,
    cpus: &[u32],
    config: &Config,
    ctx: &ReaderContext,
    output: mpsc::Sender<Vec<u8>>,
) -> anyhow::Result<JoinSet<anyhow::Result<()>>> {
    let mut tasks = JoinSet::new();

    for &cpu in cpus {
        let ring = events
            .open(cpu, config.perf_pages)
            .with_context(|| format!("failed to open perf buffer for cpu {cpu}"))?;
        let ctx = ctx.clone();
        let output = output.clone();
        let batch = config.reader_buffers;

        tasks.spawn(drain_ring(cpu, ring, batch, ctx, output));
    }

    tracing::debug!("started {} perf readers", cpus.len());
    Ok(tasks)
}

/// Drain one CPU's ring forever, handing rendered batches to the writer.
async fn drain_ring(
    cpu: u32,
    mut ring: AsyncPerfEventArrayBuffer<MapData>,
    batch: usize,
    ctx: ReaderContext,
    output: mpsc::Sender<Vec<u8>>,
) -> anyhow::Result<()> {
    let mut buffers = (0..batch)
        .map(|_| BytesMut::with_capacity(SAMPLE_CAPACITY))
        .collect::<Vec<_>>();
    let mut rendered = Vec::new();
    loop {
        let events = ring
            .read_events(&mut buffers)
            .await
            .with_context(|| format!("perf buffer read failed on cpu {cpu}"))?;
        let samples = buffers[..events.read].iter().map(|b| b.as_ref());
        ctx.handle_batch(cpu, samples, events.lost, &mut rendered)?;
        if !rendered.is_empty() {
            output
                .send(std::mem::take(&mut rendered))
                .await
                .map_err(|_| anyhow::anyhow!("output writer gone, cpu {cpu} reader stopping"))?;
        }
    }
}

/// Wait for the first reader to stop and describe why.
pub async fn first_exit(readers: &mut JoinSet<anyhow::Result<()>>) -> anyhow::Error {
    match readers.join_next().await {
        Some(Ok(Ok(()))) => anyhow::anyhow!("perf reader exited"),
        Some(Ok(Err(e))) => e,
        Some(Err(e)) => anyhow::Error::new(e).context("perf reader panicked"),
        None => anyhow::anyhow!("no perf readers running"),
    }
}
