//! Save transfer orchestration.
//!
//! The server only loads saves from its saves directory, and only reports
//! completion through its log. A transfer therefore:
//!
//! ```text
//! SaveData -> write_save -> <root>/<name>.brs
//!          -> Bricks.Load "<name>" x y z q p c
//!          -> LogBrickSerializer: Loading ...<name>.brs...
//!             LogBrickSerializer: Read N bricks        (completion)
//!          -> delete <root>/<name>.brs
//! ```
//!
//! # Phases
//!
//! Every request walks `Encoding -> Writing -> AwaitingCompletion ->
//! {Completed, TimedOut} -> Cleanup -> Done`, logged at debug level.
//! Temporary artifacts are deleted whatever the outcome; a failed delete after
//! a successful load is logged and counted but does not fail the load.
//!
//! # Invariants
//!
//! - Transfer methods take `&mut self`: one orchestrator runs one request at
//!   a time, so log correlation by artifact name is unambiguous.
//! - No retries. A timeout is reported as `TransferError::Timeout`, except in
//!   actor lookup where it means "not found".

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactNames, ArtifactStore, TimestampNames};
use crate::codec;
use crate::console::Console;
use crate::error::{Result, TransferError};
use crate::log_stream::{LogMatch, WatchOptions};
use crate::metrics::TransferMetrics;
use crate::save::SaveData;

/// Default deadline for a load to report completion
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default deadline for an actor lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

/// Timeouts and artifact naming for an orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Deadline for `Bricks.Load` to report completion
    pub load_timeout: Duration,
    /// Deadline for the pawn lookup reply
    pub lookup_timeout: Duration,
    /// Wait after the completion line before returning
    pub post_load_delay: Duration,
    /// Name prefix for one-shot artifacts
    pub temp_prefix: String,
    /// Name prefix for baked artifacts
    pub baked_prefix: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            post_load_delay: Duration::ZERO,
            temp_prefix: "transfer_temp_".to_string(),
            baked_prefix: "transfer_baked_".to_string(),
        }
    }
}

/// World-space offset applied by the server when loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Offset {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Load switches passed to `Bricks.Load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadFlags {
    /// Suppress the server's chat announcement
    pub quiet: bool,
    /// Remap palette colors to the server palette
    pub correct_palette: bool,
    /// Remap custom colors
    pub correct_custom: bool,
}

/// Where and how one copy of a save is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub offset: Offset,
    pub flags: LoadFlags,
}

impl Placement {
    /// Placement at `offset` with default flags.
    pub fn at(offset: Offset) -> Self {
        Self {
            offset,
            flags: LoadFlags::default(),
        }
    }
}

/// Outcome of one completed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Artifact name the server loaded
    pub artifact: String,
    /// Brick count from the completion line, if it parsed
    pub bricks_read: Option<u64>,
    /// Time from issuing the command to the completion line
    pub elapsed: Duration,
}

/// Encoded save kept on disk for repeated placement.
///
/// Not reference counted: whoever holds it decides when to call
/// `TransferOrchestrator::remove_artifact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakedArtifact {
    pub name: String,
    /// Encoded length in bytes
    pub len: usize,
    /// crc32 of the encoded bytes
    pub checksum: u32,
}

/// Request lifecycle, reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Encoding,
    Writing,
    AwaitingCompletion,
    Completed,
    TimedOut,
    Cleanup,
    Done,
}

/// Drives save loads and actor lookups through a server console.
pub struct TransferOrchestrator {
    console: Arc<dyn Console>,
    store: ArtifactStore,
    names: Box<dyn ArtifactNames>,
    config: TransferConfig,
    metrics: TransferMetrics,
}

impl TransferOrchestrator {
    /// Orchestrator with timestamped names and default timeouts.
    pub fn new(console: Arc<dyn Console>, store: ArtifactStore) -> Self {
        Self {
            console,
            store,
            names: Box::new(TimestampNames),
            config: TransferConfig::default(),
            metrics: TransferMetrics::new(),
        }
    }

    /// Replace the artifact name source.
    pub fn with_names(mut self, names: impl ArtifactNames + 'static) -> Self {
        self.names = Box::new(names);
        self
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn metrics(&self) -> &TransferMetrics {
        &self.metrics
    }

    /// Encode `save`, load it once at `placement`, then delete the artifact.
    ///
    /// # Errors
    /// - Encoding errors, before anything is written
    /// - `TransferError::Timeout` if no completion line arrives in
    ///   `load_timeout`; the artifact is still deleted
    /// - I/O and console errors
    pub async fn load_now(&mut self, save: &SaveData, placement: Placement) -> Result<LoadReport> {
        let name = self.names.next_name(&self.config.temp_prefix);

        if let Err(e) = self.encode_and_write(&name, save).await {
            if self.store.exists(&name).await.unwrap_or(false) {
                self.discard(&name).await;
            }
            return Err(e);
        }

        let outcome = self.issue_load(&name, placement).await;

        self.discard(&name).await;
        phase(&name, TransferPhase::Done);
        outcome
    }

    /// Encode `save` and keep it on disk for `place_baked`.
    ///
    /// No console command is issued.
    pub async fn bake_once(&mut self, save: &SaveData) -> Result<BakedArtifact> {
        let name = self.names.next_name(&self.config.baked_prefix);
        let bytes = self.encode_and_write(&name, save).await?;

        self.metrics.artifacts_baked += 1;
        info!(artifact = %name, bytes = bytes.len(), "artifact baked");

        Ok(BakedArtifact {
            name,
            len: bytes.len(),
            checksum: crc32fast::hash(&bytes),
        })
    }

    /// Load a baked artifact at `placement` without re-encoding or deleting it.
    ///
    /// # Errors
    /// - `TransferError::ArtifactMissing` if the file is gone
    /// - `TransferError::ArtifactChanged` if its contents no longer match
    /// - `TransferError::Timeout` as for `load_now`
    pub async fn place_baked(&mut self, artifact: &BakedArtifact, placement: Placement) -> Result<LoadReport> {
        let bytes = self.store.read(&artifact.name).await?;
        let actual = crc32fast::hash(&bytes);
        if bytes.len() != artifact.len || actual != artifact.checksum {
            return Err(TransferError::ArtifactChanged {
                name: artifact.name.clone(),
                expected: artifact.checksum,
                actual,
            }
            .into());
        }

        self.issue_load(&artifact.name, placement).await
    }

    /// Delete a baked artifact.
    pub async fn remove_artifact(&mut self, artifact: BakedArtifact) -> Result<()> {
        phase(&artifact.name, TransferPhase::Cleanup);
        self.store.delete(&artifact.name).await?;
        self.metrics.artifacts_removed += 1;
        Ok(())
    }

    /// Bake `save` once, place it at each placement in order, then remove it.
    ///
    /// Stops at the first failed placement. The artifact is removed either
    /// way and that first error is returned.
    pub async fn multi_place(&mut self, save: &SaveData, placements: &[Placement]) -> Result<Vec<LoadReport>> {
        let artifact = self.bake_once(save).await?;
        let name = artifact.name.clone();

        let mut reports = Vec::with_capacity(placements.len());
        let mut failure = None;
        for placement in placements {
            match self.place_baked(&artifact, *placement).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = self.remove_artifact(artifact).await {
            self.metrics.cleanup_failures += 1;
            warn!(artifact = %name, error = %e, "failed to remove baked artifact");
        }
        phase(&name, TransferPhase::Done);

        match failure {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    /// Find the pawn actor of player controller `owner`.
    ///
    /// Returns `Ok(None)` if the server does not answer within
    /// `lookup_timeout`.
    pub async fn lookup_actor_by_owner(&mut self, owner: &str) -> Result<Option<String>> {
        let pattern = pawn_pattern(owner)?;
        let command = format!("GetAll BP_PlayerController_C Pawn Name={owner}");
        let options = WatchOptions::new(self.config.lookup_timeout).with_first(|m| m.name("index") == Some("0"));

        self.metrics.lookups_issued += 1;
        match self.console.watch_log(&command, &pattern, options).await {
            Ok(window) => {
                let pawn = window.first().and_then(|m| m.name("pawn")).map(str::to_string);
                if pawn.is_some() {
                    self.metrics.lookups_found += 1;
                }
                debug!(owner, pawn = ?pawn, "actor lookup finished");
                Ok(pawn)
            }
            Err(e) if e.is_timeout() => {
                debug!(owner, "actor lookup timed out");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn encode_and_write(&mut self, name: &str, save: &SaveData) -> Result<Vec<u8>> {
        phase(name, TransferPhase::Encoding);
        let bytes = codec::write_save(save)?;

        phase(name, TransferPhase::Writing);
        self.store.write(name, &bytes).await?;

        self.metrics.saves_encoded += 1;
        self.metrics.bricks_encoded += save.bricks.len() as u64;
        self.metrics.bytes_written += bytes.len() as u64;
        Ok(bytes)
    }

    async fn issue_load(&mut self, name: &str, placement: Placement) -> Result<LoadReport> {
        let command = load_command(name, &placement);
        let suffix = format!("{name}.brs...");
        let options = WatchOptions::new(self.config.load_timeout)
            .with_first(move |m| m.group(0).is_some_and(|line| line.ends_with(&suffix)))
            .with_last(|m| m.group(1).is_some_and(|message| read_count_pattern().is_match(message)))
            .with_post_match_delay(self.config.post_load_delay);

        self.metrics.loads_issued += 1;
        phase(name, TransferPhase::AwaitingCompletion);
        let started = Instant::now();

        match self.console.watch_log(&command, load_pattern(), options).await {
            Ok(window) => {
                let elapsed = started.elapsed();
                let bricks_read = window.last().and_then(parse_read_count);

                phase(name, TransferPhase::Completed);
                self.metrics.loads_completed += 1;
                self.metrics.bricks_read += bricks_read.unwrap_or(0);
                self.metrics.load_time += elapsed;
                info!(
                    artifact = name,
                    bricks_read = ?bricks_read,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "load completed"
                );

                Ok(LoadReport {
                    artifact: name.to_string(),
                    bricks_read,
                    elapsed,
                })
            }
            Err(e) if e.is_timeout() => {
                phase(name, TransferPhase::TimedOut);
                self.metrics.loads_timed_out += 1;
                warn!(artifact = name, "load timed out");
                Err(e)
            }
            Err(e) => {
                self.metrics.loads_failed += 1;
                Err(e)
            }
        }
    }

    /// Delete a temporary artifact, logging instead of failing.
    async fn discard(&mut self, name: &str) {
        phase(name, TransferPhase::Cleanup);
        match self.store.delete(name).await {
            Ok(()) => self.metrics.artifacts_removed += 1,
            Err(e) => {
                self.metrics.cleanup_failures += 1;
                warn!(artifact = name, error = %e, "failed to remove temporary artifact");
            }
        }
    }
}

fn phase(artifact: &str, phase: TransferPhase) {
    debug!(artifact, phase = ?phase, "transfer phase");
}

fn flag(enabled: bool) -> u8 {
    u8::from(enabled)
}

/// `Bricks.Load "<name>" x y z quiet palette custom`
pub fn load_command(name: &str, placement: &Placement) -> String {
    let Placement { offset, flags } = placement;
    format!(
        "Bricks.Load \"{name}\" {} {} {} {} {} {}",
        offset.x,
        offset.y,
        offset.z,
        flag(flags.quiet),
        flag(flags.correct_palette),
        flag(flags.correct_custom),
    )
}

fn load_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^LogBrickSerializer: (.+)$").expect("static pattern"))
}

fn read_count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Read (.+) bricks").expect("static pattern"))
}

/// Brick count from a `Read N bricks` completion line. Digit grouping is ignored.
fn parse_read_count(m: &LogMatch) -> Option<u64> {
    let message = m.group(1)?;
    let count = read_count_pattern().captures(message)?.get(1)?.as_str();
    let digits: String = count.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Pattern for the `GetAll` reply naming `controller`'s pawn.
fn pawn_pattern(controller: &str) -> Result<Regex> {
    let controller = regex::escape(controller);
    Ok(Regex::new(&format!(
        r"^(?<index>\d+)\) BP_PlayerController_C .+?PersistentLevel\.{controller}\.Pawn = BP_FigureV2_C'.+?:PersistentLevel.(?<pawn>BP_FigureV2_C_\d+)'"
    ))?)
}
