//! Iteration over consecutive keys.

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::scheme::KeyScheme;

/// Iterator over the keys of consecutive buckets, created by
/// [`KeyScheme::keys_between`].
///
/// Yields the key of every bucket intersecting a half-open wall-clock
/// interval, oldest first. If a successor key cannot be computed the error is
/// yielded once and iteration ends.
#[derive(Debug)]
pub struct KeyRange<'a> {
    scheme: &'a KeyScheme,
    pending: Option<Result<String>>,
    end: NaiveDateTime,
}

impl<'a> KeyRange<'a> {
    pub(crate) fn new(scheme: &'a KeyScheme, first: Option<String>, end: NaiveDateTime) -> Self {
        Self {
            scheme,
            pending: first.map(Ok),
            end,
        }
    }

    fn successor(&self, key: &str) -> Option<Result<String>> {
        match self.scheme.naive_end_time(key) {
            Ok(end) if end >= self.end => return None,
            Ok(_) => {}
            Err(e) => return Some(Err(e)),
        }
        let next = match self.scheme.next_key(key) {
            Ok(next) => next,
            Err(e) => return Some(Err(e)),
        };
        match self.scheme.start_time(&next) {
            Ok(start) if start < self.end => Some(Ok(next)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl Iterator for KeyRange<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.pending.take()? {
            Ok(key) => {
                self.pending = self.successor(&key);
                Some(Ok(key))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::iter::FusedIterator for KeyRange<'_> {}
