/// Top-level Cairn error type.
///
/// All fallible operations in `cairn-core` return [`Result<T, CairnError>`](Result).
/// Each variant wraps an area-specific error enum so callers can match on the
/// source (the CLI maps them to exit codes) without losing type information.
///
/// Recoverable conditions (identity collisions, boundary projection failures,
/// path collisions) never surface here; they are recorded on the report as
/// [`FailureReason`](crate::types::FailureReason) codes.
#[derive(thiserror::Error, Debug)]
pub enum CairnError {
    /// Error in configuration parsing or validation. Always fatal.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error loading the persistent identity cache.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error reading item manifests.
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Error writing run outputs (cache, report, stubs).
    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Errors in Cairn configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the given path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration file syntax could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors from the persistent identity cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The cache was written by a different schema and legacy acceptance
    /// was not requested (or the version cannot be migrated).
    #[error("Cache schema mismatch: found version {found}, expected {expected}")]
    SchemaMismatch {
        /// Version found in the cache file.
        found: u32,
        /// Version this build reads and writes.
        expected: u32,
    },

    /// The cache file is not valid JSON or does not match the schema shape.
    #[error("Corrupt cache file {path}: {message}")]
    Corrupt {
        /// Path of the unreadable cache file.
        path: String,
        /// Description of the decode failure.
        message: String,
    },

    /// Filesystem I/O error reading the cache.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while discovering and reading item manifests.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    /// The manifest glob pattern was malformed.
    #[error("Invalid manifest pattern: {0}")]
    Pattern(String),

    /// A manifest file could not be decoded.
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Path of the manifest that failed to parse.
        path: String,
        /// Description of the parse failure.
        message: String,
    },

    /// Filesystem I/O error during ingestion.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while writing run outputs.
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    /// Filesystem I/O error writing an output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization of an output failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A target path resolves outside the output root.
    #[error("Refusing to write outside output root: {0}")]
    Escape(String),
}

/// Convenience alias for `Result<T, CairnError>`.
pub type Result<T> = std::result::Result<T, CairnError>;
