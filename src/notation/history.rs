use std::collections::VecDeque;

use tracing::debug;

/// Bounded undo stack of pre-mutation snapshots.
/// When full, the oldest snapshot is evicted first.
#[derive(Debug, Clone)]
pub struct UndoHistory<T> {
    entries: VecDeque<T>,
    depth: usize,
}

impl<T> UndoHistory<T> {
    /// A stack keeping at most `depth` snapshots (at least one).
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            entries: VecDeque::with_capacity(depth.min(128)),
            depth,
        }
    }

    pub fn push(&mut self, snapshot: T) {
        if self.entries.len() == self.depth {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// The most recent snapshot, if any.
    pub fn pop(&mut self) -> Option<T> {
        let snapshot = self.entries.pop_back();
        if snapshot.is_none() {
            debug!("Undo requested with empty history");
        }
        snapshot
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_is_lifo() {
        let mut history = UndoHistory::new(10);
        history.push(1);
        history.push(2);
        assert_eq!(history.pop(), Some(2));
        assert_eq!(history.pop(), Some(1));
        assert_eq!(history.pop(), None);
    }

    #[test]
    fn test_oldest_evicted_when_full() {
        let mut history = UndoHistory::new(3);
        for i in 0..5 {
            history.push(i);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.pop(), Some(4));
        assert_eq!(history.pop(), Some(3));
        assert_eq!(history.pop(), Some(2));
        assert!(history.is_empty());
    }

    #[test]
    fn test_zero_depth_keeps_one() {
        let mut history = UndoHistory::new(0);
        history.push("a");
        history.push("b");
        assert_eq!(history.depth(), 1);
        assert_eq!(history.pop(), Some("b"));
        assert!(history.is_empty());
    }
}
