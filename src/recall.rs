//! Bounded recall of previously submitted inputs.
//!
//! The store keeps the most recent submissions, newest first, and the
//! engine walks it with a cursor to refill the input buffer the way a shell
//! walks its history with the arrow keys.

use std::collections::VecDeque;

/// Number of submissions remembered by default.
pub const DEFAULT_RECALL_CAPACITY: usize = 5;

/// Which way to move through recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward older entries.
    Older,
    /// Toward newer entries, and eventually back to live input.
    Newer,
}

/// Fixed-capacity, most-recent-first buffer of submitted inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RecallHistory {
    /// Creates an empty store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a submission as the most recent entry, evicting the oldest at capacity.
    ///
    /// Consecutive duplicates are kept.
    pub fn push(&mut self, text: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(text.into());
    }

    /// Returns the entry `offset` steps back (0 is the most recent).
    pub fn get(&self, offset: usize) -> Option<&str> {
        self.entries.get(offset).map(String::as_str)
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been submitted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Moves `cursor` one step in `direction`.
    ///
    /// `None` is live input.  Returns the text the input buffer should now
    /// hold, or `None` when the step is a no-op.  Stepping never leaves the
    /// range of held entries.
    pub fn navigate(&self, cursor: &mut Option<usize>, direction: Direction) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        match (direction, *cursor) {
            (Direction::Older, current) => {
                let next = current.map_or(0, |c| (c + 1).min(self.entries.len() - 1));
                *cursor = Some(next);
                self.get(next).map(str::to_string)
            }
            (Direction::Newer, Some(0)) => {
                *cursor = None;
                Some(String::new())
            }
            (Direction::Newer, Some(current)) => {
                let next = (current - 1).min(self.entries.len() - 1);
                *cursor = Some(next);
                self.get(next).map(str::to_string)
            }
            (Direction::Newer, None) => None,
        }
    }
}

impl Default for RecallHistory {
    fn default() -> Self {
        Self::new(DEFAULT_RECALL_CAPACITY)
    }
}

/// Spells a cursor the way the view layer reports it: `-1` for live input.
pub fn cursor_offset(cursor: Option<usize>) -> isize {
    cursor.map_or(-1, |c| c as isize)
}
