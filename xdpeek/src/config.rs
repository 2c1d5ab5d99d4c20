use aya::programs::XdpFlags;
use clap::ValueEnum;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// How the XDP program is attached to the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Generic (SKB) mode. Works on every driver.
    Skb,
    /// Native driver mode.
    Drv,
    /// NIC offload.
    Hw,
    /// Let the kernel pick.
    Default,
}

impl XdpMode {
    pub fn flags(self) -> XdpFlags {
        match self {
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Drv => XdpFlags::DRV_MODE,
            XdpMode::Hw => XdpFlags::HW_MODE,
            XdpMode::Default => XdpFlags::default(),
        }
    }
}

/// Rendering of decoded records on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Application configuration, loadable from CLI or YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Network interface to attach the XDP program on.
    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_xdp_mode")]
    pub xdp_mode: XdpMode,

    /// Print the payload snapshot under each record.
    #[serde(default)]
    pub payload: bool,

    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,

    /// Serve Prometheus metrics on this port. None = disabled.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Number of receive buffers handed to each per-CPU reader per batch.
    #[serde(default = "default_reader_buffers")]
    pub reader_buffers: usize,

    /// Pages per per-CPU perf ring (power of two). None = aya default.
    #[serde(default)]
    pub perf_pages: Option<usize>,

    /// Compiled XDP object to load.
    #[serde(default = "default_object")]
    pub object: PathBuf,
}

fn default_interface() -> String {
    "eth0".to_string()
}

fn default_xdp_mode() -> XdpMode {
    XdpMode::Skb
}

fn default_format() -> OutputFormat {
    OutputFormat::Text
}

fn default_reader_buffers() -> usize {
    16
}

#[cfg(debug_assertions)]
const OBJECT_PROFILE: &str = "debug";
#[cfg(not(debug_assertions))]
const OBJECT_PROFILE: &str = "release";

fn default_object() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../xdpeek-ebpf/target/bpfel-unknown-none")
        .join(OBJECT_PROFILE)
        .join("xdpeek")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            xdp_mode: default_xdp_mode(),
            payload: false,
            format: default_format(),
            quiet: false,
            metrics_port: None,
            reader_buffers: default_reader_buffers(),
            perf_pages: None,
            object: default_object(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.interface.is_empty(), "interface must not be empty");
        anyhow::ensure!(self.reader_buffers > 0, "reader_buffers must be at least 1");
        if let Some(pages) = self.perf_pages {
            anyhow::ensure!(
                pages.is_power_of_two(),
                "perf_pages must be a power of two, got {pages}"
            );
        }
        Ok(())
    }

    /// Merge CLI args into config (CLI takes precedence).
    pub fn merge_cli(&mut self, cli: &CliArgs) -> anyhow::Result<()> {
        if let Some(ref iface) = cli.iface {
            self.interface = iface.clone();
        }
        if let Some(mode) = cli.xdp_mode {
            self.xdp_mode = mode;
        }
        if cli.payload {
            self.payload = true;
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if cli.quiet {
            self.quiet = true;
        }
        if cli.metrics_port.is_some() {
            self.metrics_port = cli.metrics_port;
        }
        if cli.reader_buffers != default_reader_buffers() {
            self.reader_buffers = cli.reader_buffers;
        }
        if cli.perf_pages.is_some() {
            self.perf_pages = cli.perf_pages;
        }
        if let Some(ref object) = cli.object {
            self.object = object.clone();
        }
        self.validate()
    }
}

use clap::Parser;

/// xdpeek: XDP packet tracer
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Network interface to attach to (default: eth0).
    #[arg(short, long)]
    pub iface: Option<String>,

    /// XDP attach mode.
    #[arg(long, value_enum)]
    pub xdp_mode: Option<XdpMode>,

    /// Print the captured payload snapshot of each packet.
    #[arg(long)]
    pub payload: bool,

    /// Output format for packet records.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Path to YAML config file.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Serve Prometheus metrics on this port.
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Receive buffers per per-CPU reader batch.
    #[arg(long, default_value_t = 16)]
    pub reader_buffers: usize,

    /// Pages per per-CPU perf ring (power of two).
    #[arg(long)]
    pub perf_pages: Option<usize>,

    /// Path to the compiled XDP object.
    #[arg(long)]
    pub object: Option<PathBuf>,
}
