//! Logical-to-physical qubit permutation

use crate::error::{Result, StateError};
use qpage_core::Qubit;

/// Bijection from logical qubit to physical bit position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    /// indexed by logical qubit
    positions: Vec<usize>,
    /// indexed by physical position
    qubits: Vec<usize>,
}

impl Permutation {
    pub fn identity(num_qubits: usize) -> Self {
        Self {
            positions: (0..num_qubits).collect(),
            qubits: (0..num_qubits).collect(),
        }
    }

    /// Build from `assignment[logical] = position`
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPermutation`] unless the assignment is a
    /// bijection over `0..assignment.len()`.
    pub fn from_assignment(assignment: Vec<usize>) -> Result<Self> {
        let n = assignment.len();
        let mut qubits = vec![usize::MAX; n];
        for (logical, &position) in assignment.iter().enumerate() {
            if position >= n {
                return Err(StateError::InvalidPermutation(format!(
                    "position {} out of range for {} qubits",
                    position, n
                )));
            }
            if qubits[position] != usize::MAX {
                return Err(StateError::InvalidPermutation(format!(
                    "position {} assigned to both q{} and q{}",
                    position, qubits[position], logical
                )));
            }
            qubits[position] = logical;
        }
        Ok(Self {
            positions: assignment,
            qubits,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Physical position of a logical qubit
    #[inline]
    pub fn position(&self, qubit: Qubit) -> usize {
        self.positions[qubit.index()]
    }

    /// Logical qubit stored at a physical position
    #[inline]
    pub fn qubit_at(&self, position: usize) -> Qubit {
        Qubit::new(self.qubits[position])
    }

    pub fn assignment(&self) -> &[usize] {
        &self.positions
    }

    /// Map a logical basis index to the physical amplitude index
    pub fn to_physical_index(&self, logical_index: usize) -> usize {
        self.positions
            .iter()
            .enumerate()
            .fold(0, |acc, (q, &pos)| acc | (((logical_index >> q) & 1) << pos))
    }

    /// Map a physical amplitude index back to the logical basis index
    pub fn to_logical_index(&self, physical_index: usize) -> usize {
        self.positions
            .iter()
            .enumerate()
            .fold(0, |acc, (q, &pos)| acc | (((physical_index >> pos) & 1) << q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_bijections() {
        assert!(Permutation::from_assignment(vec![0, 0, 1]).is_err());
        assert!(Permutation::from_assignment(vec![0, 3, 1]).is_err());
        assert!(Permutation::from_assignment(vec![2, 0, 1]).is_ok());
    }

    #[test]
    fn test_index_mapping_round_trip() {
        let perm = Permutation::from_assignment(vec![2, 0, 3, 1]).unwrap();
        assert_eq!(perm.qubit_at(2), Qubit::new(0));
        // logical q0 set -> physical bit 2
        assert_eq!(perm.to_physical_index(0b0001), 0b0100);
        for index in 0..16 {
            assert_eq!(perm.to_logical_index(perm.to_physical_index(index)), index);
        }
    }

    #[test]
    fn test_identity_is_noop() {
        let perm = Permutation::identity(5);
        for index in [0, 7, 19, 31] {
            assert_eq!(perm.to_physical_index(index), index);
        }
    }
}
