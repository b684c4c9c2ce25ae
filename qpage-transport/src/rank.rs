//! Rank and tag identifiers

use std::fmt;

/// Process rank within the communicator
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Rank(usize);

impl Rank {
    pub const ROOT: Rank = Rank(0);

    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_root(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message tag used to match a send with its receive
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Tag(i32);

impl Tag {
    #[inline]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn value(&self) -> i32 {
        self.0
    }

    /// Tag `offset` steps after this one, wrapping within non-negative values
    #[inline]
    pub const fn offset(&self, offset: i32) -> Self {
        Self(self.0.wrapping_add(offset) & i32::MAX)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        assert!(Rank::ROOT.is_root());
        assert!(!Rank::new(3).is_root());
    }

    #[test]
    fn test_tag_offset_stays_non_negative() {
        assert_eq!(Tag::new(5).offset(2), Tag::new(7));
        assert!(Tag::new(i32::MAX).offset(1).value() >= 0);
    }
}
