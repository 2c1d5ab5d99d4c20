use std::path::PathBuf;
use std::process::Command;

use anyhow::Context as _;
use clap::Parser;

#[derive(Parser)]
enum Cli {
    /// Build the XDP program for bpfel-unknown-none.
    BuildEbpf {
        /// Build in release mode.
        #[arg(long)]
        release: bool,
    },
    /// Build everything: the XDP object first, then the userspace tracer.
    Build {
        /// Build in release mode.
        #[arg(long)]
        release: bool,
    },
    /// Run the host-side unit tests (no root, no eBPF object needed).
    Test,
    /// Build everything and run the tracer with sudo.
    Run {
        /// Build in release mode.
        #[arg(long)]
        release: bool,
        /// Extra arguments passed to the binary, e.g. `-- --iface lo --payload`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse() {
        Cli::BuildEbpf { release } => build_ebpf(release),
        Cli::Build { release } => {
            build_ebpf(release)?;
            cargo(&["build", "--workspace"], release)
        }
        Cli::Test => cargo(&["test", "--workspace"], false),
        Cli::Run { release, args } => {
            build_ebpf(release)?;
            cargo(&["build", "--workspace"], release)?;
            run(release, &args)
        }
    }
}

fn workspace_root() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/.."))
}

fn profile(release: bool) -> &'static str {
    if release {
        "release"
    } else {
        "debug"
    }
}

fn build_ebpf(release: bool) -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.current_dir(workspace_root().join("xdpeek-ebpf"));
    cmd.args([
        "+nightly",
        "build",
        "--target",
        "bpfel-unknown-none",
        "-Z",
        "build-std=core",
    ]);
    if release {
        cmd.arg("--release");
    }
    let status = cmd.status().context("failed to run cargo build for eBPF")?;
    anyhow::ensure!(status.success(), "eBPF build failed");
    Ok(())
}

fn cargo(args: &[&str], release: bool) -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.current_dir(workspace_root());
    cmd.args(args);
    if release {
        cmd.arg("--release");
    }
    let status = cmd
        .status()
        .with_context(|| format!("failed to run cargo {}", args.join(" ")))?;
    anyhow::ensure!(status.success(), "cargo {} failed", args.join(" "));
    Ok(())
}

fn run(release: bool, extra_args: &[String]) -> anyhow::Result<()> {
    let root = workspace_root();
    let bin = root.join("target").join(profile(release)).join("xdpeek");
    let object = root
        .join("xdpeek-ebpf/target/bpfel-unknown-none")
        .join(profile(release))
        .join("xdpeek");

    let mut cmd = Command::new("sudo");
    cmd.arg(&bin).arg("--object").arg(&object);
    cmd.args(extra_args);
    let status = cmd.status().context("failed to run xdpeek")?;
    anyhow::ensure!(status.success(), "xdpeek exited with error");
    Ok(())
}
