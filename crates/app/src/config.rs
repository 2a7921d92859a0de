//! Configuration for the brs-transfer application.
//!
//! Parses command-line arguments with clap and resolves them into a
//! `Config`, filling gaps with defaults (including a randomized sample size
//! that is reproducible with a seed).
//!
//! # Philosophy
//!
//! The tool should work with ZERO arguments: it generates a sample build and
//! writes it to `./out.brs`. All resolved values can be printed so runs are
//! reproducible.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::bail;
use brs_transfer_core::transfer::{LoadFlags, Offset, Placement, TransferConfig};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Encode brick saves and load them into a running server", long_about = None)]
pub struct Args {
    /// JSON save data (default: generate sample bricks)
    #[arg(long = "in", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Write the encoded save to this file (default: ./out.brs)
    #[arg(long, value_name = "PATH", conflicts_with = "server_cmd")]
    pub out: Option<PathBuf>,

    /// Spawn this server command line and load the save through its console
    #[arg(long, value_name = "CMD")]
    pub server_cmd: Option<String>,

    /// Server saves directory temporary artifacts are written to
    #[arg(long, value_name = "DIR", default_value = "./Saved/Builds")]
    pub saves_dir: PathBuf,

    /// Placement offset as x,y,z; repeat to place several copies
    #[arg(long = "offset", value_name = "X,Y,Z", value_parser = parse_offset, allow_hyphen_values = true)]
    pub offsets: Vec<Offset>,

    /// Load without the server announcing it
    #[arg(long)]
    pub quiet: bool,

    /// Remap palette colors to the server palette
    #[arg(long)]
    pub correct_palette: bool,

    /// Remap custom colors
    #[arg(long)]
    pub correct_custom: bool,

    /// Author name written into generated saves
    #[arg(long)]
    pub author: Option<String>,

    /// Author id written into generated saves
    #[arg(long)]
    pub author_id: Option<Uuid>,

    /// Random seed for sample generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of sample bricks (default: random 16-256)
    #[arg(long)]
    pub bricks: Option<usize>,

    /// Deadline for a load to complete, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub load_timeout_ms: u64,

    /// Also write the resolved save data as JSON
    #[arg(long, value_name = "PATH")]
    pub emit_json: Option<PathBuf>,

    /// Print resolved configuration
    #[arg(long)]
    pub print_config: bool,

    /// Don't print metrics summary
    #[arg(long)]
    pub no_metrics: bool,
}

/// What to do with the encoded save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Write the `.brs` file and stop
    WriteFile(PathBuf),
    /// Spawn the server and load through its console
    Load { server_cmd: String, saves_dir: PathBuf },
}

/// Complete configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    // === Input ===
    /// Save data path (None = generate sample)
    pub input_file: Option<PathBuf>,

    /// Seed for sample generation
    pub seed: u64,

    /// Sample brick count
    pub sample_bricks: usize,

    /// Author override for generated saves
    pub author: Option<(String, Uuid)>,

    // === Output ===
    pub mode: Mode,

    /// Placements, in load order (at least one)
    pub placements: Vec<Placement>,

    /// Orchestrator timeouts and naming
    pub transfer: TransferConfig,

    /// Where to dump the resolved save as JSON
    pub emit_json: Option<PathBuf>,

    // === Behavior ===
    pub print_config: bool,
    pub print_metrics: bool,
}

impl Config {
    /// Resolve parsed arguments into a configuration.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let mode = match (args.out, args.server_cmd) {
            (_, Some(cmd)) if cmd.trim().is_empty() => bail!("--server-cmd must not be empty"),
            (_, Some(server_cmd)) => Mode::Load {
                server_cmd,
                saves_dir: args.saves_dir,
            },
            (out, None) => Mode::WriteFile(out.unwrap_or_else(|| PathBuf::from("./out.brs"))),
        };

        // Determine seed (explicit or time-based)
        let seed = args.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let flags = LoadFlags {
            quiet: args.quiet,
            correct_palette: args.correct_palette,
            correct_custom: args.correct_custom,
        };
        let offsets = if args.offsets.is_empty() {
            vec![Offset::default()]
        } else {
            args.offsets
        };
        let placements = offsets
            .into_iter()
            .map(|offset| Placement { offset, flags })
            .collect();

        let author = match (args.author, args.author_id) {
            (None, None) => None,
            (name, id) => Some((name.unwrap_or_else(|| "Unknown".to_string()), id.unwrap_or_else(Uuid::nil))),
        };

        Ok(Config {
            input_file: args.input,
            seed,
            sample_bricks: args.bricks.unwrap_or_else(|| rng.gen_range(16..=256)),
            author,
            mode,
            placements,
            transfer: TransferConfig {
                load_timeout: Duration::from_millis(args.load_timeout_ms),
                ..TransferConfig::default()
            },
            emit_json: args.emit_json,
            print_config: args.print_config,
            print_metrics: !args.no_metrics,
        })
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        match &self.input_file {
            Some(path) => println!("Input: {}", path.display()),
            None => println!("Input: (generate {} sample bricks, seed {})", self.sample_bricks, self.seed),
        }
        if let Some((name, id)) = &self.author {
            println!("Author: {name} ({id})");
        }
        match &self.mode {
            Mode::WriteFile(path) => println!("Output: {}", path.display()),
            Mode::Load { server_cmd, saves_dir } => {
                println!("Server: {server_cmd}");
                println!("Saves dir: {}", saves_dir.display());
            }
        }
        println!();
        println!("=== Placement ===");
        for placement in &self.placements {
            let Offset { x, y, z } = placement.offset;
            println!("Offset: {x}, {y}, {z}");
        }
        let flags = self.placements.first().map(|p| p.flags).unwrap_or_default();
        println!(
            "Quiet: {}  Correct palette: {}  Correct custom: {}",
            flags.quiet, flags.correct_palette, flags.correct_custom
        );
        println!("Load timeout: {} ms", self.transfer.load_timeout.as_millis());
        println!();
    }
}

/// Parse `x,y,z` into an offset.
pub fn parse_offset(value: &str) -> Result<Offset, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got {value:?}"));
    };
    let coord = |s: &str| s.parse::<i32>().map_err(|_| format!("invalid coordinate {s:?}"));
    Ok(Offset::new(coord(*x)?, coord(*y)?, coord(*z)?))
}
