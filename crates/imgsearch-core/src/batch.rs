//! Single-pass fixed-size grouping of an iterator.

use std::num::NonZeroUsize;

/// Iterator adapter yielding successive groups of `size` items.
///
/// The final group may be shorter. The source is pulled lazily and exactly
/// once, so memory stays bounded by one group.
pub struct Chunked<I> {
    iter: I,
    size: NonZeroUsize,
}

impl<I: Iterator> Iterator for Chunked<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<I::Item> = self.iter.by_ref().take(self.size.get()).collect();
        if chunk.is_empty() { None } else { Some(chunk) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.iter.size_hint();
        let n = self.size.get();
        (lo.div_ceil(n), hi.map(|h| h.div_ceil(n)))
    }
}

pub fn chunked<T: IntoIterator>(items: T, size: NonZeroUsize) -> Chunked<T::IntoIter> {
    Chunked { iter: items.into_iter(), size }
}

/// `NonZeroUsize` from a literal known to be positive.
pub const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("chunk size must be positive"),
    }
}
