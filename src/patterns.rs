//! Attribute pattern space for cognitive diagnosis models.
//!
//! A mastery pattern assigns 0/1 to each of K attributes; the full space has
//! L = 2^K members. Patterns are enumerated in binary counting order with
//! attribute 0 as the most significant bit (for K = 2: 00, 01, 10, 11), and every
//! component of the engine indexes latent classes through this one bijection.

use ndarray::{Array1, Array2};
use numpy::{PyArray1, PyArray2, PyReadonlyArray1, ToPyArray};
use pyo3::prelude::*;

use crate::error::CdcatError;

/// Largest supported K; 2^20 latent classes is already far past practical use.
pub const MAX_ATTRIBUTES: usize = 20;

/// Number of latent classes for K attributes.
#[inline]
pub fn n_patterns(n_attributes: usize) -> usize {
    1usize << n_attributes
}

/// Mastery indicator of `attribute` in the pattern with index `class`.
#[inline]
pub fn pattern_bit(class: usize, attribute: usize, n_attributes: usize) -> u8 {
    ((class >> (n_attributes - 1 - attribute)) & 1) as u8
}

/// The full pattern for a latent-class index.
pub fn pattern_at(class: usize, n_attributes: usize) -> Vec<u8> {
    (0..n_attributes)
        .map(|k| pattern_bit(class, k, n_attributes))
        .collect()
}

/// Flat L x K matrix of all patterns in canonical order.
pub fn pattern_matrix(n_attributes: usize) -> Vec<u8> {
    let l = n_patterns(n_attributes);
    let mut out = Vec::with_capacity(l * n_attributes);
    for class in 0..l {
        for k in 0..n_attributes {
            out.push(pattern_bit(class, k, n_attributes));
        }
    }
    out
}

/// String label of a pattern, e.g. "101".
pub fn label_of(class: usize, n_attributes: usize) -> String {
    (0..n_attributes)
        .map(|k| if pattern_bit(class, k, n_attributes) == 1 { '1' } else { '0' })
        .collect()
}

/// Parse a pattern label back into (class index, K).
pub fn class_of_label(label: &str) -> Result<(usize, usize), CdcatError> {
    if label.is_empty() || label.len() > MAX_ATTRIBUTES {
        return Err(CdcatError::InvalidLabel(label.to_string()));
    }
    let mut class = 0usize;
    for c in label.chars() {
        class = (class << 1)
            | match c {
                '0' => 0,
                '1' => 1,
                _ => return Err(CdcatError::InvalidLabel(label.to_string())),
            };
    }
    Ok((class, label.len()))
}

/// Recover K from a latent-class count, rejecting non-powers-of-two.
pub fn n_attributes_for(n_classes: usize) -> Result<usize, CdcatError> {
    if n_classes < 2 || !n_classes.is_power_of_two() {
        return Err(CdcatError::ClassCount(n_classes));
    }
    let k = n_classes.trailing_zeros() as usize;
    if k > MAX_ATTRIBUTES {
        return Err(CdcatError::InvalidAttributeCount(k as i64));
    }
    Ok(k)
}

/// Attribute-level marginal mastery probabilities under a posterior over classes.
///
/// For each attribute k, sums posterior mass over every class whose pattern has
/// attribute k mastered.
pub fn attribute_marginals(posterior: &[f64], n_attributes: usize) -> Vec<f64> {
    let mut out = vec![0.0; n_attributes];
    for (class, &mass) in posterior.iter().enumerate() {
        for (k, slot) in out.iter_mut().enumerate() {
            if pattern_bit(class, k, n_attributes) == 1 {
                *slot += mass;
            }
        }
    }
    out
}

fn checked_attribute_count(n_attributes: i64) -> Result<usize, CdcatError> {
    if n_attributes < 1 || n_attributes > MAX_ATTRIBUTES as i64 {
        return Err(CdcatError::InvalidAttributeCount(n_attributes));
    }
    Ok(n_attributes as usize)
}

/// All 2^K attribute patterns as an L x K matrix in canonical order.
#[pyfunction]
pub fn attribute_pattern_matrix<'py>(
    py: Python<'py>,
    n_attributes: i64,
) -> PyResult<Bound<'py, PyArray2<i32>>> {
    let k = checked_attribute_count(n_attributes)?;
    let l = n_patterns(k);
    let flat = pattern_matrix(k);

    let mut out = Array2::zeros((l, k));
    for class in 0..l {
        for a in 0..k {
            out[[class, a]] = flat[class * k + a] as i32;
        }
    }
    Ok(out.to_pyarray(py))
}

/// Marginal mastery probability per attribute from a posterior over all classes.
#[pyfunction]
pub fn posterior_attribute_marginals<'py>(
    py: Python<'py>,
    posterior: PyReadonlyArray1<f64>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let posterior = posterior.as_array();
    let k = n_attributes_for(posterior.len())?;
    let post_vec: Vec<f64> = posterior.iter().cloned().collect();
    Ok(Array1::from_vec(attribute_marginals(&post_vec, k)).to_pyarray(py))
}

/// Canonical index of a pattern label such as "101".
#[pyfunction]
pub fn pattern_index(label: &str) -> PyResult<i64> {
    let (class, _) = class_of_label(label)?;
    Ok(class as i64)
}

/// Label of the pattern at a canonical index.
#[pyfunction]
pub fn pattern_label_at(class: i64, n_attributes: i64) -> PyResult<String> {
    let k = checked_attribute_count(n_attributes)?;
    let l = n_patterns(k);
    if class < 0 || class as usize >= l {
        return Err(CdcatError::ShapeMismatch {
            context: "pattern index",
            got: class.max(0) as usize,
            expected: l,
        }
        .into());
    }
    Ok(label_of(class as usize, k))
}

/// Register pattern-space functions with the Python module.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(attribute_pattern_matrix, m)?)?;
    m.add_function(wrap_pyfunction!(posterior_attribute_marginals, m)?)?;
    m.add_function(wrap_pyfunction!(pattern_index, m)?)?;
    m.add_function(wrap_pyfunction!(pattern_label_at, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_counts_in_binary() {
        let m = pattern_matrix(2);
        assert_eq!(m, vec![0, 0, 0, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn index_label_round_trip_is_a_bijection() {
        let k = 3;
        let mut seen = std::collections::HashSet::new();
        for class in 0..n_patterns(k) {
            let label = label_of(class, k);
            assert!(seen.insert(label.clone()));
            let (back, back_k) = class_of_label(&label).unwrap();
            assert_eq!(back, class);
            assert_eq!(back_k, k);
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn label_parsing_rejects_garbage() {
        assert!(class_of_label("").is_err());
        assert!(class_of_label("10x").is_err());
        assert!(class_of_label(&"1".repeat(MAX_ATTRIBUTES + 1)).is_err());
    }

    #[test]
    fn class_count_must_be_a_power_of_two() {
        assert_eq!(n_attributes_for(8).unwrap(), 3);
        assert!(n_attributes_for(6).is_err());
        assert!(n_attributes_for(1).is_err());
        assert!(n_attributes_for(0).is_err());
    }

    #[test]
    fn uniform_posterior_gives_half_marginals() {
        let k = 3;
        let l = n_patterns(k);
        let posterior = vec![1.0 / l as f64; l];
        for p in attribute_marginals(&posterior, k) {
            assert!((p - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn point_mass_posterior_recovers_the_pattern() {
        let k = 3;
        let mut posterior = vec![0.0; n_patterns(k)];
        posterior[5] = 1.0; // 101
        let marginals = attribute_marginals(&posterior, k);
        assert_eq!(marginals, vec![1.0, 0.0, 1.0]);
    }
}
