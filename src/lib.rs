/// The `.casmhd` container and its record tables
pub mod container;
/// Byte views and the companion data file reader
pub mod data;
/// Error definitions
pub mod error;
/// Per-resource-kind extraction drivers and texture conversion
pub mod export;
/// Orchestration of a full extraction run
pub mod extract;
/// Embedded and standalone model headers, buffer references, and stream files
pub mod models;

pub use error::{CasmError, CasmResult, ExtractError};
pub use extract::{ExtractOptions, ExtractSummary, Extractor};
