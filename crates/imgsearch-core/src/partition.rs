//! Explicit accept/reject split for per-item fallible work.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotAnImage,
    UnsupportedFormat(String),
    Decode(String),
    UnknownId,
    DuplicateId,
    Io(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnImage => f.write_str("not an image"),
            Self::UnsupportedFormat(fmt) => write!(f, "unsupported format {fmt}"),
            Self::Decode(e) => write!(f, "decode failed: {e}"),
            Self::UnknownId => f.write_str("no catalog entry for id"),
            Self::DuplicateId => f.write_str("id already seen in this call"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

/// An item that was dropped, with the path or id it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub item: String,
    pub reason: RejectReason,
}

impl Rejection {
    pub fn new(item: impl Into<String>, reason: RejectReason) -> Self {
        Self { item: item.into(), reason }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}

#[derive(Debug)]
pub struct Partitioned<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<Rejection>,
}

impl<T> Default for Partitioned<T> {
    fn default() -> Self {
        Self { accepted: Vec::new(), rejected: Vec::new() }
    }
}

/// Apply `f` to every item, keeping successes in input order and collecting
/// rejections instead of stopping at the first one.
pub fn partition<I, T, F>(items: I, mut f: F) -> Partitioned<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Result<T, Rejection>,
{
    let mut out = Partitioned::default();
    for item in items {
        match f(item) {
            Ok(v) => out.accepted.push(v),
            Err(r) => out.rejected.push(r),
        }
    }
    out
}
