use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use rayon::ThreadPoolBuildError;

use crate::container::TableKind;
use crate::extract::Driver;

/// Which loaded byte buffer an offset was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arena {
    /// The `.casmhd` root buffer.
    Container,
    /// The `.casmda` companion data file.
    DataFile,
    /// A sub-model blob read out of the companion file.
    Model,
}

impl fmt::Display for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arena::Container => f.write_str("container"),
            Arena::DataFile => f.write_str("data file"),
            Arena::Model => f.write_str("model blob"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CasmError {
    #[error("invalid container magic: 0x{actual:08X} (expected 0x{expected:08X})")]
    InvalidMagic { actual: u32, expected: u32 },
    #[error(
        "read of 0x{len:X} bytes at 0x{offset:X} exceeds {arena} length 0x{available:X}"
    )]
    OutOfBounds {
        arena: Arena,
        offset: u64,
        len: u64,
        available: u64,
    },
    #[error("index {index} out of range for {table} table (count {count})")]
    IndexOutOfRange {
        table: TableKind,
        index: usize,
        count: usize,
    },
    #[error("corrupt container: {detail}")]
    CorruptContainer { detail: String },
    #[error("I/O error on companion data file")]
    Io(#[from] io::Error),
    #[error("couldn't write output file {}", path.display())]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CasmError {
    pub fn corrupt(detail: impl Into<String>) -> Self {
        CasmError::CorruptContainer {
            detail: detail.into(),
        }
    }

    /// Whether this error must stop the whole run rather than only the current driver.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, CasmError::InvalidMagic { .. } | CasmError::Io(_))
    }
}

pub type CasmResult<T> = Result<T, CasmError>;

/// Failures that stop an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("couldn't load container {}", path.display())]
    Container {
        path: PathBuf,
        #[source]
        source: CasmError,
    },
    #[error("couldn't open companion data file {}", path.display())]
    DataFile {
        path: PathBuf,
        #[source]
        source: CasmError,
    },
    #[error("couldn't start texture worker pool")]
    WorkerPool(#[from] ThreadPoolBuildError),
    #[error("{driver} extraction stopped the run")]
    Driver {
        driver: Driver,
        #[source]
        source: CasmError,
    },
}

impl ExtractError {
    /// The container-level error underneath, if any.
    pub fn casm_error(&self) -> Option<&CasmError> {
        match self {
            ExtractError::Container { source, .. }
            | ExtractError::DataFile { source, .. }
            | ExtractError::Driver { source, .. } => Some(source),
            ExtractError::WorkerPool(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classification() {
        assert!(
            CasmError::InvalidMagic {
                actual: 0,
                expected: 1
            }
            .is_run_fatal()
        );
        assert!(CasmError::Io(io::Error::other("gone")).is_run_fatal());
        assert!(!CasmError::corrupt("bad name offset").is_run_fatal());
        assert!(
            !CasmError::OutOfBounds {
                arena: Arena::Container,
                offset: 0x10,
                len: 4,
                available: 8
            }
            .is_run_fatal()
        );
    }

    #[test]
    fn out_of_bounds_message_names_arena() {
        let err = CasmError::OutOfBounds {
            arena: Arena::DataFile,
            offset: 0x100,
            len: 0x20,
            available: 0x80,
        };
        assert_eq!(
            err.to_string(),
            "read of 0x20 bytes at 0x100 exceeds data file length 0x80"
        );
    }
}
