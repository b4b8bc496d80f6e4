//! Longest Increasing Subsequence
//!
//! The keyed diff maps each new child to its old position (plus one, with
//! `0` meaning "newly created"). Children whose old positions form the
//! longest increasing run can stay where they are; everything else moves.
//!
//! # Algorithm
//!
//! Patience sorting with predecessor links, O(n log n):
//!
//! 1. `result[k]` holds the index of the smallest tail value of any
//!    increasing run of length `k + 1` seen so far.
//! 2. Each value either extends the longest run or replaces the first tail
//!    that is not smaller than it (binary search).
//! 3. `prev[i]` records the index that preceded `i` when it was placed;
//!    walking it back from the last tail rebuilds one longest run.

/// Indices of one longest strictly increasing subsequence of `values`,
/// ignoring zeros.
///
/// The result is in ascending index order.
pub fn get_sequence(values: &[usize]) -> Vec<usize> {
    let mut prev = vec![0usize; values.len()];
    let mut result: Vec<usize> = Vec::new();

    for (i, &value) in values.iter().enumerate() {
        if value == 0 {
            continue;
        }

        if let Some(&last) = result.last() {
            if value > values[last] {
                prev[i] = last;
                result.push(i);
                continue;
            }
        } else {
            result.push(i);
            continue;
        }

        let slot = result.partition_point(|&r| values[r] < value);
        if value < values[result[slot]] {
            if slot > 0 {
                prev[i] = result[slot - 1];
            }
            result[slot] = i;
        }
    }

    let mut k = result.len();
    if let Some(&last) = result.last() {
        let mut cursor = last;
        while k > 0 {
            k -= 1;
            result[k] = cursor;
            cursor = prev[cursor];
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_increasing(values: &[usize], indices: &[usize]) -> bool {
        indices.windows(2).all(|w| w[0] < w[1] && values[w[0]] < values[w[1]])
            && indices.iter().all(|&i| values[i] != 0)
    }

    fn reference_length(values: &[usize]) -> usize {
        let mut best = vec![0usize; values.len()];
        for i in 0..values.len() {
            if values[i] == 0 {
                continue;
            }
            best[i] = 1;
            for j in 0..i {
                if values[j] != 0 && values[j] < values[i] {
                    best[i] = best[i].max(best[j] + 1);
                }
            }
        }
        best.into_iter().max().unwrap_or(0)
    }

    #[test]
    fn classic_example() {
        let values = [2, 3, 1, 5, 6, 8, 7, 9, 4];
        assert_eq!(get_sequence(&values), vec![0, 1, 3, 4, 6, 7]);
    }

    #[test]
    fn zeros_are_skipped() {
        assert_eq!(get_sequence(&[0, 3, 0, 1, 2]), vec![3, 4]);
        assert!(get_sequence(&[0, 0]).is_empty());
        assert!(get_sequence(&[]).is_empty());
    }

    #[test]
    fn reversed_input_keeps_one_element() {
        assert_eq!(get_sequence(&[4, 3, 2, 1]).len(), 1);
    }

    proptest! {
        #[test]
        fn matches_quadratic_reference(values in proptest::collection::vec(0usize..20, 0..40)) {
            let sequence = get_sequence(&values);
            prop_assert!(is_increasing(&values, &sequence));
            prop_assert_eq!(sequence.len(), reference_length(&values));
        }
    }
}
