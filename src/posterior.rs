//! Posterior engine over attribute mastery patterns.
//!
//! Maintains the discrete distribution over all 2^K latent classes given the
//! responses accumulated so far: Bernoulli likelihood per class under conditional
//! independence, multiplied into the prior and renormalized. Point estimates (ML,
//! MAP with tie counts, attribute-level EAP and its >0.5 mastery call) are derived
//! from the same update.

use ndarray::Array1;
use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::prelude::*;

use crate::error::CdcatError;
use crate::patterns;
use crate::utils::{argmax_with_ties, clamp_prob};

/// Tolerance used when counting argmax ties.
pub const TIE_TOL: f64 = 1e-9;

/// Point estimates derived from one posterior update.
#[derive(Debug, Clone)]
pub struct ClassEstimates {
    /// Maximum-likelihood class (argmax of the likelihood alone).
    pub ml_class: usize,
    pub ml_ties: usize,
    /// Maximum-a-posteriori class.
    pub map_class: usize,
    pub map_ties: usize,
    /// Posterior mass on the MAP class.
    pub map_prob: f64,
    /// Attribute-level EAP mastery probabilities.
    pub eap: Vec<f64>,
    /// EAP thresholded at 0.5.
    pub mastery: Vec<u8>,
}

/// Log-likelihood of the observed responses under each latent class.
///
/// `lc_probs` is the flat J x L correct-response probability matrix for the full
/// bank; `administered` indexes the items actually given, aligned with `observed`.
pub fn class_log_likelihoods(
    lc_probs: &[f64],
    n_classes: usize,
    administered: &[usize],
    observed: &[i32],
) -> Vec<f64> {
    let mut log_lik = vec![0.0; n_classes];
    for (pos, &item) in administered.iter().enumerate() {
        let row = &lc_probs[item * n_classes..(item + 1) * n_classes];
        let correct = observed[pos] == 1;
        for (class, ll) in log_lik.iter_mut().enumerate() {
            let p = clamp_prob(row[class]);
            *ll += if correct { p.ln() } else { (1.0 - p).ln() };
        }
    }
    log_lik
}

/// Bayes update: posterior(l) proportional to exp(loglik(l)) * prior(l).
///
/// Returns `None` when the unnormalized mass vanishes or is non-finite; callers
/// surface that as a degenerate-posterior error rather than correcting it.
pub fn posterior_from_log_likelihoods(log_lik: &[f64], prior: &[f64]) -> Option<Vec<f64>> {
    let weighted: Vec<f64> = log_lik
        .iter()
        .zip(prior.iter())
        .map(|(&ll, &p)| ll + p.ln())
        .collect();

    let max_val = weighted.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max_val.is_finite() {
        return None;
    }

    let mut posterior: Vec<f64> = weighted.iter().map(|&w| (w - max_val).exp()).collect();
    let sum: f64 = posterior.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return None;
    }
    for p in posterior.iter_mut() {
        *p /= sum;
    }
    Some(posterior)
}

/// Derive ML/MAP/EAP estimates from a log-likelihood vector and its posterior.
pub fn summarize(log_lik: &[f64], posterior: &[f64], n_attributes: usize) -> ClassEstimates {
    let (ml_class, ml_ties) = argmax_with_ties(log_lik, TIE_TOL);
    let (map_class, map_ties) = argmax_with_ties(posterior, TIE_TOL);
    let eap = patterns::attribute_marginals(posterior, n_attributes);
    let mastery = eap.iter().map(|&p| u8::from(p > 0.5)).collect();
    ClassEstimates {
        ml_class,
        ml_ties,
        map_class,
        map_ties,
        map_prob: posterior[map_class],
        eap,
        mastery,
    }
}

fn validated_prior(
    prior: Option<&[f64]>,
    n_classes: usize,
) -> Result<Vec<f64>, CdcatError> {
    match prior {
        None => Ok(vec![1.0 / n_classes as f64; n_classes]),
        Some(values) => {
            if values.len() != n_classes {
                return Err(CdcatError::PriorLength {
                    len: values.len(),
                    expected: n_classes,
                });
            }
            let sum: f64 = values.iter().sum();
            if values.iter().any(|&p| !(p >= 0.0)) || (sum - 1.0).abs() > 1e-6 {
                return Err(CdcatError::PriorMass { sum });
            }
            Ok(values.to_vec())
        }
    }
}

/// Validate an attribute prior (defaulting to uniform over all classes).
pub fn resolve_prior(
    prior: Option<Vec<f64>>,
    n_classes: usize,
) -> Result<Vec<f64>, CdcatError> {
    validated_prior(prior.as_deref(), n_classes)
}

fn administered_inputs(
    lc_probs: &PyReadonlyArray2<f64>,
    responses: &PyReadonlyArray1<i32>,
) -> Result<(Vec<f64>, usize, Vec<usize>, Vec<i32>), CdcatError> {
    let probs = lc_probs.as_array();
    let resp = responses.as_array();
    let n_administered = probs.nrows();
    let n_classes = probs.ncols();
    patterns::n_attributes_for(n_classes)?;
    if resp.len() != n_administered {
        return Err(CdcatError::ShapeMismatch {
            context: "response vector length",
            got: resp.len(),
            expected: n_administered,
        });
    }
    let flat: Vec<f64> = probs.iter().cloned().collect();
    let administered: Vec<usize> = (0..n_administered).collect();
    let observed: Vec<i32> = resp.iter().cloned().collect();
    for (pos, &value) in observed.iter().enumerate() {
        if value != 0 && value != 1 {
            return Err(CdcatError::MalformedResponse {
                step: pos,
                item: administered[pos],
                value,
            });
        }
    }
    Ok((flat, n_classes, administered, observed))
}

/// Posterior over attribute patterns after the supplied responses.
///
/// `lc_probs` holds one row per administered item (in administration order) and one
/// column per latent class; `att_prior` defaults to uniform.
#[pyfunction]
#[pyo3(signature = (lc_probs, responses, att_prior=None))]
pub fn update_attribute_posterior<'py>(
    py: Python<'py>,
    lc_probs: PyReadonlyArray2<f64>,
    responses: PyReadonlyArray1<i32>,
    att_prior: Option<PyReadonlyArray1<f64>>,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let (flat, n_classes, administered, observed) = administered_inputs(&lc_probs, &responses)?;
    let prior = resolve_prior(att_prior.map(|p| p.as_array().to_vec()), n_classes)?;

    let log_lik = class_log_likelihoods(&flat, n_classes, &administered, &observed);
    let posterior = posterior_from_log_likelihoods(&log_lik, &prior).ok_or(
        CdcatError::DegeneratePosterior {
            step: administered.len().saturating_sub(1),
        },
    )?;
    Ok(Array1::from_vec(posterior).to_pyarray(py))
}

/// Full classification summary after the supplied responses.
///
/// Returns (posterior, ml_class, ml_ties, map_class, map_ties, map_prob, eap,
/// mastery).
#[pyfunction]
#[pyo3(signature = (lc_probs, responses, att_prior=None))]
#[allow(clippy::type_complexity)]
pub fn classify_responses<'py>(
    py: Python<'py>,
    lc_probs: PyReadonlyArray2<f64>,
    responses: PyReadonlyArray1<i32>,
    att_prior: Option<PyReadonlyArray1<f64>>,
) -> PyResult<(
    Bound<'py, PyArray1<f64>>,
    i32,
    i32,
    i32,
    i32,
    f64,
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray1<i32>>,
)> {
    let (flat, n_classes, administered, observed) = administered_inputs(&lc_probs, &responses)?;
    let n_attributes = patterns::n_attributes_for(n_classes)?;
    let prior = resolve_prior(att_prior.map(|p| p.as_array().to_vec()), n_classes)?;

    let log_lik = class_log_likelihoods(&flat, n_classes, &administered, &observed);
    let posterior = posterior_from_log_likelihoods(&log_lik, &prior).ok_or(
        CdcatError::DegeneratePosterior {
            step: administered.len().saturating_sub(1),
        },
    )?;
    let est = summarize(&log_lik, &posterior, n_attributes);

    let mastery: Vec<i32> = est.mastery.iter().map(|&m| m as i32).collect();
    Ok((
        Array1::from_vec(posterior).to_pyarray(py),
        est.ml_class as i32,
        est.ml_ties as i32,
        est.map_class as i32,
        est.map_ties as i32,
        est.map_prob,
        Array1::from_vec(est.eap).to_pyarray(py),
        Array1::from_vec(mastery).to_pyarray(py),
    ))
}

/// Register posterior-engine functions with the Python module.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(update_attribute_posterior, m)?)?;
    m.add_function(wrap_pyfunction!(classify_responses, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two items, K = 1 (two classes); item probabilities favor the master class.
    fn tiny_bank() -> (Vec<f64>, usize) {
        (vec![0.2, 0.9, 0.1, 0.8], 2)
    }

    #[test]
    fn posterior_is_a_normalized_simplex_vector() {
        let (bank, l) = tiny_bank();
        let prior = vec![0.5, 0.5];
        let log_lik = class_log_likelihoods(&bank, l, &[0, 1], &[1, 1]);
        let posterior = posterior_from_log_likelihoods(&log_lik, &prior).unwrap();
        let sum: f64 = posterior.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(posterior.iter().all(|&p| p >= 0.0));
        // Both correct responses point at the master class (index 1).
        assert!(posterior[1] > posterior[0]);
    }

    #[test]
    fn all_zero_prior_is_degenerate() {
        let (bank, l) = tiny_bank();
        let log_lik = class_log_likelihoods(&bank, l, &[0], &[1]);
        assert!(posterior_from_log_likelihoods(&log_lik, &[0.0, 0.0]).is_none());
    }

    #[test]
    fn estimates_report_map_and_mastery_call() {
        let (bank, l) = tiny_bank();
        let prior = vec![0.5, 0.5];
        let log_lik = class_log_likelihoods(&bank, l, &[0, 1], &[1, 1]);
        let posterior = posterior_from_log_likelihoods(&log_lik, &prior).unwrap();
        let est = summarize(&log_lik, &posterior, 1);
        assert_eq!(est.map_class, 1);
        assert_eq!(est.ml_class, 1);
        assert_eq!(est.map_ties, 1);
        assert_eq!(est.mastery, vec![1]);
        assert!((est.map_prob - posterior[1]).abs() < 1e-12);
        assert!((est.eap[0] - posterior[1]).abs() < 1e-12);
    }

    #[test]
    fn uniform_likelihood_reports_all_classes_tied() {
        // One item that cannot distinguish the classes at all.
        let bank = vec![0.5, 0.5, 0.5, 0.5];
        let prior = vec![0.25; 4];
        let log_lik = class_log_likelihoods(&bank, 4, &[0], &[1]);
        let posterior = posterior_from_log_likelihoods(&log_lik, &prior).unwrap();
        let est = summarize(&log_lik, &posterior, 2);
        assert_eq!(est.ml_ties, 4);
        assert_eq!(est.map_ties, 4);
    }

    #[test]
    fn prior_validation_rejects_bad_mass() {
        assert!(resolve_prior(Some(vec![0.5, 0.6]), 2).is_err());
        assert!(resolve_prior(Some(vec![0.5, 0.5, 0.0]), 2).is_err());
        assert!(resolve_prior(Some(vec![-0.5, 1.5]), 2).is_err());
        let uniform = resolve_prior(None, 4).unwrap();
        assert_eq!(uniform, vec![0.25; 4]);
    }
}
