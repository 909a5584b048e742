//! Sub-model blobs: embedded header rewriting, payload patching, and buffer deduplication.

/// Embedded and standalone model headers
pub mod header;
/// In-place payload edits
pub mod payload;
/// Deduplicated `.stream` output
pub mod stream;

pub use header::{ModelKind, MxmdHeader};
pub use stream::{BufferRegistry, StreamWriter};
