//! Group-boundary detection over key-sorted input.

/// Tracks the current group of a stream sorted (or at least grouped) on a key.
///
/// A new group starts whenever the observed key differs from the previous
/// one. Input that is not grouped simply produces more, smaller groups.
#[derive(Debug, Clone)]
pub struct GroupTracker<K> {
    current: Option<K>,
    groups: usize,
}

impl<K> Default for GroupTracker<K> {
    fn default() -> Self {
        Self {
            current: None,
            groups: 0,
        }
    }
}

impl<K: PartialEq + Clone> GroupTracker<K> {
    /// Creates a tracker that has not seen any key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes the key of the next record.
    ///
    /// Returns `true` when the key opens a new group (including the first
    /// record of the stream).
    pub fn observe(&mut self, key: &K) -> bool {
        if self.current.as_ref() == Some(key) {
            return false;
        }
        self.current = Some(key.clone());
        self.groups += 1;
        true
    }

    /// Key of the group in progress.
    pub fn current(&self) -> Option<&K> {
        self.current.as_ref()
    }

    /// Number of groups opened so far.
    pub fn groups(&self) -> usize {
        self.groups
    }
}
