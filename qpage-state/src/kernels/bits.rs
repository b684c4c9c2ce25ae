//! Bit manipulation helpers

/// Insert a zero bit at `position`, shifting higher bits up
#[inline]
pub fn insert_zero_bit(value: usize, position: usize) -> usize {
    let low = value & ((1usize << position) - 1);
    ((value ^ low) << 1) | low
}

/// Insert zero bits at every position in `sorted_positions` (ascending)
#[inline]
pub fn insert_zero_bits(mut value: usize, sorted_positions: &[usize]) -> usize {
    for &position in sorted_positions {
        value = insert_zero_bit(value, position);
    }
    value
}

/// Scatter the low `positions.len()` bits of `pattern` onto `positions`
///
/// Bit `k - 1 - m` of `pattern` lands on `positions[m]`.
#[inline]
pub fn deposit(pattern: usize, positions: &[usize]) -> usize {
    let k = positions.len();
    positions
        .iter()
        .enumerate()
        .fold(0, |acc, (m, &pos)| acc | (((pattern >> (k - 1 - m)) & 1) << pos))
}

/// Gather the bits at `positions` into a pattern, inverse of [`deposit`]
#[inline]
pub fn extract(value: usize, positions: &[usize]) -> usize {
    let k = positions.len();
    positions
        .iter()
        .enumerate()
        .fold(0, |acc, (m, &pos)| acc | (((value >> pos) & 1) << (k - 1 - m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_zero_bit() {
        assert_eq!(insert_zero_bit(0b111, 1), 0b1101);
        assert_eq!(insert_zero_bit(0b1, 0), 0b10);
    }

    #[test]
    fn test_insert_zero_bits_enumerates_complement() {
        let positions = [1, 3];
        let produced: Vec<usize> = (0..4).map(|i| insert_zero_bits(i, &positions)).collect();
        assert_eq!(produced, vec![0b00000, 0b00001, 0b00100, 0b00101]);
    }

    #[test]
    fn test_deposit_extract() {
        let positions = [4, 0, 2];
        assert_eq!(deposit(0b100, &positions), 0b10000);
        assert_eq!(deposit(0b011, &positions), 0b00101);
        for pattern in 0..8 {
            assert_eq!(extract(deposit(pattern, &positions), &positions), pattern);
        }
    }
}
