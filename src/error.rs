use std::fmt;
use std::io;

pub type SegResult<T> = Result<T, SegError>;

/// Crate-wide error type.
///
/// Mirrors the flat, hand-rolled enum + manual `Display` + `From` impls
/// idiom used for CLI error handling elsewhere in this codebase, rather
/// than reaching for a derive-macro based error crate.
#[derive(Debug)]
pub enum SegError {
    /// Unknown mode string, incompatible option combination (e.g.
    /// `measure_per_category` with `seq_length > 1`), or an overlapping
    /// segmentation passed where disjointness is required.
    Configuration(String),
    /// Malformed markup encountered by `import_xml` (orphan closing tag,
    /// tag left unclosed at end of input).
    Parse(String),
    /// Invalid string-store redirect (out of bounds, self-reference, or
    /// an attempt to redirect a concrete entry).
    Range(String),
    /// A sampling or resampling operation was asked for more items than
    /// the source multiset contains.
    NotEnoughData(String),
    /// A conversion or bridge explicitly left unimplemented by this core.
    NotImplemented(String),
    Io(io::Error),
}

impl fmt::Display for SegError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SegError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            SegError::Parse(msg) => write!(f, "parse error: {msg}"),
            SegError::Range(msg) => write!(f, "range error: {msg}"),
            SegError::NotEnoughData(msg) => write!(f, "not enough data: {msg}"),
            SegError::NotImplemented(msg) => write!(f, "not implemented: {msg}"),
            SegError::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SegError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SegError {
    fn from(err: io::Error) -> SegError {
        SegError::Io(err)
    }
}

impl From<regex::Error> for SegError {
    fn from(err: regex::Error) -> SegError {
        SegError::Configuration(err.to_string())
    }
}
