use std::fmt::Display;
use std::io;

/// Silt errors.
#[derive(Debug)]
pub enum Error {
    /// The key and value arrays handed to the writer differ in length.
    SizeMismatch { keys: usize, values: usize },
    /// A single record does not fit in the configured block size.
    BlockOverflow { needed: usize, capacity: usize },
    /// The file is shorter than the 16-byte footer.
    FileTooSmall(u64),
    /// The footer fields are inconsistent with the file.
    CorruptFooter(String),
    /// The metadata region does not decode cleanly.
    CorruptMetadata(String),
    /// A block fetch would run past the end of the data region.
    OutOfBounds { offset: u64, limit: u64 },
    /// An IO error from the host.
    Io(io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::SizeMismatch { keys, values } => {
                write!(f, "{keys} keys but {values} values")
            }
            Error::BlockOverflow { needed, capacity } => {
                write!(f, "record needs {needed} bytes, block capacity is {capacity}")
            }
            Error::FileTooSmall(size) => {
                write!(f, "file is {size} bytes, smaller than the footer")
            }
            Error::CorruptFooter(msg) => write!(f, "corrupt footer: {msg}"),
            Error::CorruptMetadata(msg) => write!(f, "corrupt metadata: {msg}"),
            Error::OutOfBounds { offset, limit } => {
                write!(f, "block at offset {offset} runs past data region end {limit}")
            }
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// A silt Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;
