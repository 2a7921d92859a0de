//! brs-transfer-core: BRS save encoding and server save transfer
//!
//! This library provides the pieces needed to get bricks into a running
//! server:
//! - Encodes structured save data into the bit-exact BRS v10 format
//! - Writes the encoded save as a temporary artifact in the server's saves
//!   directory and issues the console load command
//! - Correlates the load's completion through the server log stream, with a
//!   deadline, and always removes the artifact afterwards
//!
//! # Architecture
//!
//! - `bitio`: Bit-level output buffer (bounded and packed integers)
//! - `cursor`: Forward-only byte reader
//! - `encode`: Byte-aligned value encoders and section framing
//! - `save`: Typed save data with template defaults
//! - `codec`: Full save file layout
//! - `log_stream`: Broadcast log lines and the chunk watcher
//! - `console`: Command/log seam to the server
//! - `process`: Console host over a spawned server process
//! - `artifact`: Artifact directory and unique names
//! - `transfer`: Load, bake, place, remove and actor lookup
//! - `loader`: Template-filled brick loads
//! - `sync`: Build and preset copies between plugin and server
//! - `metrics`: Transfer counters
//!
//! # Design Principles
//!
//! - **No panics**: All errors are structured and recoverable
//! - **Fail before emitting**: Out-of-domain values never produce partial output
//! - **Always clean up**: Temporary artifacts are deleted on every outcome

pub mod artifact;
pub mod bitio;
pub mod codec;
pub mod console;
pub mod cursor;
pub mod encode;
pub mod error;
pub mod loader;
pub mod log_stream;
pub mod metrics;
pub mod process;
pub mod save;
pub mod sync;
pub mod transfer;

// Re-export commonly used types
pub use error::{Error, Result};
