//! Order-independent distinct helpers.
//!
//! Every table in the star schema is deduplicated by full-row equality.
//! Rows carry floating-point columns, so equality is expressed through a
//! hashable [`RowKey`] instead of `Eq` on the records themselves.

use std::collections::HashSet;
use std::hash::Hash;

/// A hashable identity for full-row equality.
pub trait RowKey {
    type Key: Hash + Eq;

    fn row_key(&self) -> Self::Key;
}

/// Bit pattern of a float suitable for hashing.
///
/// `-0.0` and `0.0` map to the same key, as do all NaN payloads.
#[must_use]
pub fn float_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0_f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

/// [`float_bits`] for nullable columns.
#[must_use]
pub fn opt_float_bits(value: Option<f64>) -> Option<u64> {
    value.map(float_bits)
}

/// Keep the first occurrence of every distinct row.
///
/// The resulting row set does not depend on input order; only the order of
/// the returned rows does.
pub fn distinct<T: RowKey>(rows: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.row_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(&'static str, f64);

    impl RowKey for Row {
        type Key = (&'static str, u64);

        fn row_key(&self) -> Self::Key {
            (self.0, float_bits(self.1))
        }
    }

    #[test]
    fn test_distinct_collapses_identical_rows() {
        let rows = vec![Row("a", 1.5), Row("b", 2.0), Row("a", 1.5)];
        assert_eq!(distinct(rows), vec![Row("a", 1.5), Row("b", 2.0)]);
    }

    #[test]
    fn test_distinct_is_idempotent() {
        let rows = vec![Row("a", 1.0), Row("a", 1.0), Row("c", 3.0)];
        let once = distinct(rows);
        let twice = distinct(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_float_bits_normalizes_signed_zero_and_nan() {
        assert_eq!(float_bits(-0.0), float_bits(0.0));
        assert_eq!(float_bits(f64::NAN), float_bits(-f64::NAN));
        assert_ne!(float_bits(326.43), float_bits(326.44));
    }
}
