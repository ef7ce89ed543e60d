//! Error and Result types.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpkgError {
    // I/O errors: truncated input, stream out of room, seek past a fixed limit.
    #[error("unexpected end of input, needed {needed} more byte(s)")]
    Truncated { needed: usize },
    #[error("seek to {0} past the limit of a fixed stream")]
    SeekPastLimit(usize),
    #[error("negative seek would move position below zero")]
    NegativeSeek,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Allocation failure growing a fixed or growable buffer.
    #[error("out of memory growing buffer to {0} bytes")]
    OutOfMemory(usize),

    // Format errors: bad magic, bad version, unknown type code, arity/dimension
    // violations, envelope inconsistency, excess nesting depth.
    #[error("bad magic bytes: {0:?}")]
    BadMagic([u8; 2]),
    #[error("unsupported version {0}")]
    BadVersion(u8),
    #[error("unknown geometry type code {0}")]
    UnknownTypeCode(u32),
    #[error("circular string requires 0 or (n-3) % 2 == 0 points, got {0}")]
    BadArity(usize),
    #[error("dimension mismatch: parent is {parent}, child is {child}")]
    DimensionMismatch { parent: String, child: String },
    #[error("envelope inconsistency: {0}")]
    BadEnvelope(String),
    #[error("nesting depth {0} exceeds GEOM_MAX_DEPTH ({max})", max = crate::geometry::GEOM_MAX_DEPTH)]
    DepthOverflow(usize),
    #[error("format error at column {column}: {message}")]
    Format { column: usize, message: String },

    // Schema errors.
    #[error("table `{0}` is missing")]
    MissingTable(String),
    #[error("column `{table}.{column}` is incompatible: {reason}")]
    IncompatibleColumn {
        table: String,
        column: String,
        reason: String,
    },
    #[error("referential check failed: {0}")]
    ReferentialCheck(String),

    // Misuse: caller violated a documented precondition.
    #[error("required argument `{0}` was null")]
    NullArgument(&'static str),
    #[error("misuse: {0}")]
    Misuse(String),

    // Foreign-geometry bridge.
    #[error("foreign library error")]
    ForeignLibrary,
    #[cfg(feature = "with-geos")]
    #[error("GEOS error: {0}")]
    Geos(String),

    #[cfg(feature = "with-sql")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, GpkgError>;

#[cfg(feature = "with-geos")]
impl From<geos::Error> for GpkgError {
    fn from(e: geos::Error) -> Self {
        GpkgError::Geos(e.to_string())
    }
}
