use core::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexKind {
    Sensor,
    Layer,
}

/// A sensor or layer index at or beyond its configured maximum.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutOfRange {
    pub kind: IndexKind,
    pub index: u32,
    pub limit: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PersistError {
    /// The backing store refused a read or write.
    Store,
    /// A persisted blob does not match the record size for its key.
    SizeMismatch { expected: usize, actual: usize },
    /// A key inside our namespace that does not name a cell or the table.
    UnknownKey,
    /// A flash record failed its magic or checksum test.
    Corrupted,
    /// The namespace leaves no room for the cell or table suffix.
    KeyTooLong,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Malformed {
    UnknownCommand,
    MissingArgument,
    InvalidNumber,
    InvalidDirection,
    TrailingInput,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    OutOfRange(OutOfRange),
    Persist(PersistError),
    Malformed(Malformed),
}

impl From<OutOfRange> for Error {
    fn from(err: OutOfRange) -> Self {
        Self::OutOfRange(err)
    }
}

impl From<PersistError> for Error {
    fn from(err: PersistError) -> Self {
        Self::Persist(err)
    }
}

impl From<Malformed> for Error {
    fn from(err: Malformed) -> Self {
        Self::Malformed(err)
    }
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            IndexKind::Sensor => "sensor",
            IndexKind::Layer => "layer",
        };
        write!(f, "{kind} {} out of range (max {})", self.index, self.limit)
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => f.write_str("store write failed"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "record size {actual} != {expected}")
            }
            Self::UnknownKey => f.write_str("unknown settings key"),
            Self::Corrupted => f.write_str("corrupted record"),
            Self::KeyTooLong => f.write_str("settings key too long"),
        }
    }
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownCommand => "unknown command",
            Self::MissingArgument => "missing argument",
            Self::InvalidNumber => "invalid number",
            Self::InvalidDirection => "direction must be CW or CCW",
            Self::TrailingInput => "unexpected trailing input",
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(err) => err.fmt(f),
            Self::Persist(err) => err.fmt(f),
            Self::Malformed(err) => err.fmt(f),
        }
    }
}
