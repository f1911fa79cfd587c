//! Fragment index allocation.

/// Hands out index blocks to fragments in discovery order.
///
/// Every fragment reserves `width` indices whether or not it ends up using
/// them, so a fragment's indices never depend on when another fragment's
/// response arrives.
#[derive(Debug, Clone)]
pub struct IndexCursor {
    next: usize,
    width: usize,
}

impl IndexCursor {
    /// Create a cursor reserving `width` indices per fragment (at least 1).
    pub fn new(width: usize) -> Self {
        Self {
            next: 0,
            width: width.max(1),
        }
    }

    /// Reserve the next block and return its first index.
    pub fn reserve(&mut self) -> usize {
        let index = self.next;
        self.next += self.width;
        index
    }

    /// First index not yet reserved.
    pub fn peek(&self) -> usize {
        self.next
    }
}

/// Inclusive range of indices a fragment's markers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub low: usize,
    pub high: usize,
}

impl IndexRange {
    /// Range for a fragment starting at `low` that emits `scripts` script
    /// markers; a fragment without scripts still uses one index.
    pub fn new(low: usize, scripts: usize) -> Self {
        Self {
            low,
            high: low + scripts.max(1) - 1,
        }
    }

    /// Number of indices in the range.
    pub fn len(&self) -> usize {
        self.high - self.low + 1
    }

    /// A range always holds at least one index.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Indices in ascending order.
    pub fn indices(&self) -> impl DoubleEndedIterator<Item = usize> {
        self.low..=self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reserves_blocks() {
        let mut cursor = IndexCursor::new(3);
        assert_eq!(cursor.reserve(), 0);
        assert_eq!(cursor.reserve(), 3);
        assert_eq!(cursor.peek(), 6);
    }

    #[test]
    fn test_zero_width_treated_as_one() {
        let mut cursor = IndexCursor::new(0);
        assert_eq!(cursor.reserve(), 0);
        assert_eq!(cursor.reserve(), 1);
    }

    #[test]
    fn test_range_width() {
        assert_eq!(IndexRange::new(6, 3), IndexRange { low: 6, high: 8 });
        assert_eq!(IndexRange::new(6, 3).len(), 3);
        assert_eq!(IndexRange::new(4, 0), IndexRange { low: 4, high: 4 });
        assert_eq!(IndexRange::new(0, 2).indices().rev().collect::<Vec<_>>(), vec![1, 0]);
    }
}
