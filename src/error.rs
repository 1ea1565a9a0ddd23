use std::path::PathBuf;
use thiserror::Error;

/// Failure to look up the region-of-interest symbols of a binary
#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Object {
        path: PathBuf,
        #[source]
        source: object::Error,
    },
    #[error("failure calling {tool}: {status}")]
    ToolFailed {
        tool: String,
        status: std::process::ExitStatus,
    },
    #[error("timeout from {tool} after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}

/// Failure that aborts the analysis of a single trace
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Symbols(#[from] SymbolError),
    #[error("could not find symbol {symbol} in {path}")]
    MissingBoundary { symbol: String, path: PathBuf },
    #[error("failed to read trace {path}: {source}")]
    Trace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model {name}: {reason}")]
    InvalidModel { name: String, reason: String },
}
