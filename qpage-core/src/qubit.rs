//! Logical qubit identifiers

use std::fmt;

/// Logical qubit index
///
/// A logical qubit keeps its identity for the whole run; where its bit
/// lives inside a global amplitude index is decided by the current
/// permutation of the state vector.
///
/// # Example
/// ```
/// use qpage_core::Qubit;
///
/// let q = Qubit::new(5);
/// assert_eq!(q.index(), 5);
/// assert_eq!(q.to_string(), "q5");
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Qubit(usize);

impl Qubit {
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Qubit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<usize> for Qubit {
    #[inline]
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

impl From<Qubit> for usize {
    #[inline]
    fn from(qubit: Qubit) -> Self {
        qubit.index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ordering() {
        assert!(Qubit::new(0) < Qubit::new(1));
        assert_eq!(Qubit::from(3usize), Qubit::new(3));
    }

    #[test]
    fn test_hash_distinguishes_indices() {
        let set: HashSet<Qubit> = [0, 1, 1, 2].into_iter().map(Qubit::new).collect();
        assert_eq!(set.len(), 3);
    }
}
