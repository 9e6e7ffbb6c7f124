//! Parametric CD-CAT loop.
//!
//! One session per examinee: score the remaining pool with the configured
//! strategy, administer the best item, replay the examinee's recorded response,
//! recompute the posterior over attribute patterns, log the step diagnostics, and
//! stop on the fixed-length bound or the MAP-probability precision cutoff. Batch
//! runs map sessions over examinees in parallel with per-examinee derived seeds;
//! a failed session is recorded in the status output and never aborts siblings.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array2, Array3};
use numpy::{
    PyArray1, PyArray2, PyArray3, PyReadonlyArray1, PyReadonlyArray2, ToPyArray,
};
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use rand::prelude::*;
use rand_pcg::Pcg64;
use rayon::prelude::*;

use crate::error::{CdcatError, STATUS_OK};
use crate::patterns;
use crate::posterior::{self, ClassEstimates};
use crate::selection::{self, SelectionRule};

/// Resolved configuration for a parametric CAT run.
#[derive(Debug, Clone)]
pub struct CatConfig {
    pub rule: SelectionRule,
    pub max_items: usize,
    pub fixed_length: bool,
    pub precision: f64,
    pub prior: Vec<f64>,
    pub n_workers: usize,
    pub seed: u64,
}

/// Validate the configuration surface; all failures happen before any session.
#[allow(clippy::too_many_arguments)]
pub fn resolve_cat(
    strategy: &str,
    n_classes: usize,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    att_prior: Option<Vec<f64>>,
    n_workers: Option<usize>,
    seed: u64,
) -> Result<CatConfig, CdcatError> {
    let rule = SelectionRule::from_name(strategy)?;
    patterns::n_attributes_for(n_classes)?;
    if max_items < 1 {
        return Err(CdcatError::InvalidMaxItems(max_items));
    }
    if !(precision > 0.0 && precision <= 1.0) {
        return Err(CdcatError::InvalidCutoff(precision));
    }
    let prior = posterior::resolve_prior(att_prior, n_classes)?;
    let n_workers = resolve_workers(n_workers)?;
    Ok(CatConfig {
        rule,
        max_items: max_items as usize,
        fixed_length,
        precision,
        prior,
        n_workers,
        seed,
    })
}

/// Worker count defaults to every available execution unit; oversubscription and
/// zero are configuration errors.
pub fn resolve_workers(requested: Option<usize>) -> Result<usize, CdcatError> {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = requested.unwrap_or(available);
    if workers == 0 || workers > available {
        return Err(CdcatError::WorkerCount {
            requested: workers,
            available,
        });
    }
    Ok(workers)
}

/// Diagnostics logged after each administered item.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub item: usize,
    pub estimates: ClassEstimates,
}

/// Completed session: ordered step log, administered items, final posterior.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub steps: Vec<StepRecord>,
    pub administered: Vec<usize>,
    pub posterior: Vec<f64>,
}

/// Run one examinee's adaptive session against the recorded response row.
pub fn run_session(
    lc_probs: &[f64],
    n_classes: usize,
    n_items: usize,
    responses: &[i32],
    config: &CatConfig,
    rng: &mut Pcg64,
) -> Result<SessionResult, CdcatError> {
    let n_attributes = patterns::n_attributes_for(n_classes)?;
    let max_items = config.max_items.min(n_items);

    let mut pool: Vec<usize> = (0..n_items).collect();
    let mut administered: Vec<usize> = Vec::with_capacity(max_items);
    let mut observed: Vec<i32> = Vec::with_capacity(max_items);
    let mut posterior_now = config.prior.clone();
    let mut steps: Vec<StepRecord> = Vec::with_capacity(max_items);

    while administered.len() < max_items && !pool.is_empty() {
        let scores = selection::score_pool(
            config.rule,
            lc_probs,
            n_classes,
            &pool,
            &posterior_now,
            rng,
        );
        // pool stays sorted ascending, so the first maximum is the lowest index
        let item = pool.remove(selection::pick_best(&scores));

        let value = responses[item];
        if value != 0 && value != 1 {
            return Err(CdcatError::MalformedResponse {
                step: administered.len(),
                item,
                value,
            });
        }
        administered.push(item);
        observed.push(value);

        let log_lik =
            posterior::class_log_likelihoods(lc_probs, n_classes, &administered, &observed);
        posterior_now = posterior::posterior_from_log_likelihoods(&log_lik, &config.prior)
            .ok_or(CdcatError::DegeneratePosterior {
                step: administered.len() - 1,
            })?;
        let estimates = posterior::summarize(&log_lik, &posterior_now, n_attributes);
        let reached_precision = !config.fixed_length && estimates.map_prob >= config.precision;
        steps.push(StepRecord { item, estimates });
        if reached_precision {
            break;
        }
    }

    Ok(SessionResult {
        steps,
        administered,
        posterior: posterior_now,
    })
}

/// Run every examinee's session, in parallel, with per-examinee derived seeds.
///
/// Results come back in examinee order; a failed session is an `Err` slot.
pub fn run_batch(
    lc_probs: &[f64],
    n_classes: usize,
    n_items: usize,
    responses: &[i32],
    n_examinees: usize,
    config: &CatConfig,
    progress: bool,
) -> Result<Vec<Result<SessionResult, CdcatError>>, CdcatError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_workers)
        .build()
        .map_err(|_| CdcatError::WorkerCount {
            requested: config.n_workers,
            available: 0,
        })?;

    let done = AtomicUsize::new(0);
    let chunk = (n_examinees / 10).max(1);

    Ok(pool.install(|| {
        (0..n_examinees)
            .into_par_iter()
            .map(|i| {
                let mut rng = Pcg64::seed_from_u64(config.seed.wrapping_add(i as u64));
                let row = &responses[i * n_items..(i + 1) * n_items];
                let result = run_session(lc_probs, n_classes, n_items, row, config, &mut rng);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if progress && (finished % chunk == 0 || finished == n_examinees) {
                    log::info!("cdcat: {finished}/{n_examinees} examinees processed");
                }
                result
            })
            .collect()
    }))
}

fn bank_inputs(
    lc_probs: &PyReadonlyArray2<f64>,
) -> Result<(Vec<f64>, usize, usize), CdcatError> {
    let probs = lc_probs.as_array();
    let n_items = probs.nrows();
    let n_classes = probs.ncols();
    patterns::n_attributes_for(n_classes)?;
    Ok((probs.iter().cloned().collect(), n_items, n_classes))
}

/// Echo the fully resolved configuration a run would use, validating everything.
///
/// Returns (strategy, max_items, fixed_length, precision, att_prior, n_workers,
/// seed).
#[pyfunction]
#[pyo3(signature = (strategy, n_classes, max_items=20, fixed_length=true, precision=0.8, att_prior=None, n_workers=None, seed=0))]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn resolve_cat_config(
    strategy: &str,
    n_classes: usize,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    att_prior: Option<PyReadonlyArray1<f64>>,
    n_workers: Option<usize>,
    seed: u64,
) -> PyResult<(String, i64, bool, f64, Vec<f64>, i64, u64)> {
    let config = resolve_cat(
        strategy,
        n_classes,
        max_items,
        fixed_length,
        precision,
        att_prior.map(|p| p.as_array().to_vec()),
        n_workers,
        seed,
    )?;
    Ok((
        config.rule.name().to_string(),
        config.max_items as i64,
        config.fixed_length,
        config.precision,
        config.prior,
        config.n_workers as i64,
        config.seed,
    ))
}

/// Run one examinee's session and return the full step-by-step trace.
///
/// Returns (administered, q_rows, ml_class, ml_ties, map_class, map_ties,
/// map_prob, eap, mastery, posterior); `q_rows` has one row per step when a
/// Q-matrix is supplied and zero rows otherwise.
#[pyfunction]
#[pyo3(signature = (lc_probs, responses, strategy="GDI", max_items=20, fixed_length=true, precision=0.8, att_prior=None, q_matrix=None, seed=0))]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn cdcat_single<'py>(
    py: Python<'py>,
    lc_probs: PyReadonlyArray2<f64>,
    responses: PyReadonlyArray1<i32>,
    strategy: &str,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    att_prior: Option<PyReadonlyArray1<f64>>,
    q_matrix: Option<PyReadonlyArray2<i32>>,
    seed: u64,
) -> PyResult<(
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray1<f64>>,
)> {
    let (flat, n_items, n_classes) = bank_inputs(&lc_probs)?;
    let n_attributes = patterns::n_attributes_for(n_classes)?;
    let resp = responses.as_array();
    if resp.len() != n_items {
        return Err(CdcatError::ShapeMismatch {
            context: "response vector length",
            got: resp.len(),
            expected: n_items,
        }
        .into());
    }
    let q_owned = match &q_matrix {
        None => None,
        Some(q) => {
            let q = q.as_array();
            if q.nrows() != n_items || q.ncols() != n_attributes {
                return Err(CdcatError::ShapeMismatch {
                    context: "Q-matrix entries",
                    got: q.nrows() * q.ncols(),
                    expected: n_items * n_attributes,
                }
                .into());
            }
            Some(q.to_owned())
        }
    };

    let config = resolve_cat(
        strategy,
        n_classes,
        max_items,
        fixed_length,
        precision,
        att_prior.map(|p| p.as_array().to_vec()),
        Some(1),
        seed,
    )?;

    let row: Vec<i32> = resp.iter().cloned().collect();
    let mut rng = Pcg64::seed_from_u64(seed);
    let result = run_session(&flat, n_classes, n_items, &row, &config, &mut rng)?;

    let n_steps = result.steps.len();
    let mut administered = Array1::zeros(n_steps);
    let mut ml_class = Array1::zeros(n_steps);
    let mut ml_ties = Array1::zeros(n_steps);
    let mut map_class = Array1::zeros(n_steps);
    let mut map_ties = Array1::zeros(n_steps);
    let mut map_prob = Array1::zeros(n_steps);
    let mut eap = Array2::zeros((n_steps, n_attributes));
    let mut mastery = Array2::zeros((n_steps, n_attributes));
    let q_steps = if q_owned.is_some() { n_steps } else { 0 };
    let mut q_rows = Array2::zeros((q_steps, n_attributes));

    for (s, step) in result.steps.iter().enumerate() {
        administered[s] = step.item as i32;
        ml_class[s] = step.estimates.ml_class as i32;
        ml_ties[s] = step.estimates.ml_ties as i32;
        map_class[s] = step.estimates.map_class as i32;
        map_ties[s] = step.estimates.map_ties as i32;
        map_prob[s] = step.estimates.map_prob;
        for k in 0..n_attributes {
            eap[[s, k]] = step.estimates.eap[k];
            mastery[[s, k]] = step.estimates.mastery[k] as i32;
        }
        if let Some(q) = &q_owned {
            for k in 0..n_attributes {
                q_rows[[s, k]] = q[[step.item, k]];
            }
        }
    }

    Ok((
        administered.to_pyarray(py),
        q_rows.to_pyarray(py),
        ml_class.to_pyarray(py),
        ml_ties.to_pyarray(py),
        map_class.to_pyarray(py),
        map_ties.to_pyarray(py),
        map_prob.to_pyarray(py),
        eap.to_pyarray(py),
        mastery.to_pyarray(py),
        Array1::from_vec(result.posterior).to_pyarray(py),
    ))
}

/// Run the full batch of examinees in parallel.
///
/// Trace arrays are padded with -1 (indices/counts) or NaN (probabilities) past
/// each examinee's administered length. Returns (administered, n_administered,
/// ml_class, ml_ties, map_class, map_ties, map_prob, eap, mastery,
/// final_posterior, status, failed_step); status codes are 0 = ok, 1 = malformed
/// response, 2 = degenerate posterior, with the failing step in `failed_step`
/// (-1 when the session succeeded).
#[pyfunction]
#[pyo3(signature = (lc_probs, responses, strategy="GDI", max_items=20, fixed_length=true, precision=0.8, att_prior=None, n_workers=None, seed=0, progress=false))]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn cdcat_batch<'py>(
    py: Python<'py>,
    lc_probs: PyReadonlyArray2<f64>,
    responses: PyReadonlyArray2<i32>,
    strategy: &str,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    att_prior: Option<PyReadonlyArray1<f64>>,
    n_workers: Option<usize>,
    seed: u64,
    progress: bool,
) -> PyResult<(
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray3<f64>>,
    Bound<'py, PyArray3<i32>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
)> {
    let (flat, n_items, n_classes) = bank_inputs(&lc_probs)?;
    let n_attributes = patterns::n_attributes_for(n_classes)?;
    let resp = responses.as_array();
    if resp.ncols() != n_items {
        return Err(CdcatError::ShapeMismatch {
            context: "response matrix columns",
            got: resp.ncols(),
            expected: n_items,
        }
        .into());
    }
    let n_examinees = resp.nrows();

    let config = resolve_cat(
        strategy,
        n_classes,
        max_items,
        fixed_length,
        precision,
        att_prior.map(|p| p.as_array().to_vec()),
        n_workers,
        seed,
    )?;
    let max_len = config.max_items.min(n_items);

    let resp_flat: Vec<i32> = resp.iter().cloned().collect();
    let results = run_batch(
        &flat,
        n_classes,
        n_items,
        &resp_flat,
        n_examinees,
        &config,
        progress,
    )
    .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;

    let mut administered = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut n_administered = Array1::zeros(n_examinees);
    let mut ml_class = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut ml_ties = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut map_class = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut map_ties = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut map_prob = Array2::from_elem((n_examinees, max_len), f64::NAN);
    let mut eap = Array3::from_elem((n_examinees, max_len, n_attributes), f64::NAN);
    let mut mastery = Array3::from_elem((n_examinees, max_len, n_attributes), -1i32);
    let mut final_posterior = Array2::from_elem((n_examinees, n_classes), f64::NAN);
    let mut status = Array1::from_elem(n_examinees, STATUS_OK);
    let mut failed_step = Array1::from_elem(n_examinees, -1i32);

    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(session) => {
                n_administered[i] = session.administered.len() as i32;
                for (s, step) in session.steps.iter().enumerate() {
                    administered[[i, s]] = step.item as i32;
                    ml_class[[i, s]] = step.estimates.ml_class as i32;
                    ml_ties[[i, s]] = step.estimates.ml_ties as i32;
                    map_class[[i, s]] = step.estimates.map_class as i32;
                    map_ties[[i, s]] = step.estimates.map_ties as i32;
                    map_prob[[i, s]] = step.estimates.map_prob;
                    for k in 0..n_attributes {
                        eap[[i, s, k]] = step.estimates.eap[k];
                        mastery[[i, s, k]] = step.estimates.mastery[k] as i32;
                    }
                }
                for (l, &p) in session.posterior.iter().enumerate() {
                    final_posterior[[i, l]] = p;
                }
            }
            Err(err) => {
                status[i] = err.status_code();
                failed_step[i] = err.failed_step().map(|s| s as i32).unwrap_or(-1);
            }
        }
    }

    Ok((
        administered.to_pyarray(py),
        n_administered.to_pyarray(py),
        ml_class.to_pyarray(py),
        ml_ties.to_pyarray(py),
        map_class.to_pyarray(py),
        map_ties.to_pyarray(py),
        map_prob.to_pyarray(py),
        eap.to_pyarray(py),
        mastery.to_pyarray(py),
        final_posterior.to_pyarray(py),
        status.to_pyarray(py),
        failed_step.to_pyarray(py),
    ))
}

/// Register parametric CAT functions with the Python module.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(resolve_cat_config, m)?)?;
    m.add_function(wrap_pyfunction!(cdcat_single, m)?)?;
    m.add_function(wrap_pyfunction!(cdcat_batch, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::STATUS_MALFORMED_RESPONSE;

    // K = 2 (L = 4), J = 4; the all-mastery class (index 3) answers everything
    // correctly with probability 0.9, every other class with 0.2.
    fn bank_k2() -> (Vec<f64>, usize, usize) {
        let mut flat = Vec::new();
        for _item in 0..4 {
            flat.extend_from_slice(&[0.2, 0.2, 0.2, 0.9]);
        }
        (flat, 4, 4)
    }

    fn config(rule: &str, max_items: i64, fixed_length: bool, precision: f64) -> CatConfig {
        resolve_cat(rule, 4, max_items, fixed_length, precision, None, Some(1), 99).unwrap()
    }

    #[test]
    fn all_correct_responses_concentrate_on_full_mastery() {
        let (flat, n_items, n_classes) = bank_k2();
        let cfg = config("GDI", 4, true, 0.8);
        let mut rng = Pcg64::seed_from_u64(1);
        let result =
            run_session(&flat, n_classes, n_items, &[1, 1, 1, 1], &cfg, &mut rng).unwrap();

        assert_eq!(result.administered.len(), 4);
        let last = result.steps.last().unwrap();
        assert_eq!(last.estimates.map_class, 3);
        assert!(last.estimates.map_prob > 0.9);
        assert_eq!(last.estimates.mastery, vec![1, 1]);
    }

    #[test]
    fn fixed_length_administers_min_of_max_and_bank() {
        let (flat, n_items, n_classes) = bank_k2();
        let mut rng = Pcg64::seed_from_u64(2);
        let cfg = config("JSD", 10, true, 0.8);
        let result =
            run_session(&flat, n_classes, n_items, &[1, 0, 1, 0], &cfg, &mut rng).unwrap();
        assert_eq!(result.administered.len(), 4);

        let mut rng = Pcg64::seed_from_u64(2);
        let cfg = config("JSD", 2, true, 0.8);
        let result =
            run_session(&flat, n_classes, n_items, &[1, 0, 1, 0], &cfg, &mut rng).unwrap();
        assert_eq!(result.administered.len(), 2);
    }

    #[test]
    fn no_item_repeats_within_a_session() {
        let (flat, n_items, n_classes) = bank_k2();
        let cfg = config("random", 4, true, 0.8);
        let mut rng = Pcg64::seed_from_u64(3);
        let result =
            run_session(&flat, n_classes, n_items, &[0, 1, 0, 1], &cfg, &mut rng).unwrap();
        let mut seen = result.administered.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), result.administered.len());
    }

    #[test]
    fn precision_mode_stops_at_the_first_qualifying_step() {
        // K = 1: one strongly informative item lifts the MAP probability to 0.9,
        // clearing the 0.85 cutoff at the first step.
        let flat = vec![0.1, 0.9, 0.1, 0.9, 0.1, 0.9];
        let cfg = resolve_cat("GDI", 2, 3, false, 0.85, None, Some(1), 0).unwrap();
        let mut rng = Pcg64::seed_from_u64(4);
        let result = run_session(&flat, 2, 3, &[1, 1, 1], &cfg, &mut rng).unwrap();

        assert_eq!(result.administered.len(), 1);
        assert!(result.steps[0].estimates.map_prob >= 0.85);
    }

    #[test]
    fn identical_seeds_reproduce_the_whole_trace() {
        let (flat, n_items, n_classes) = bank_k2();
        let cfg = config("PWKL", 4, true, 0.8);
        let run = |seed| {
            let mut rng = Pcg64::seed_from_u64(seed);
            run_session(&flat, n_classes, n_items, &[1, 1, 0, 0], &cfg, &mut rng).unwrap()
        };
        let a = run(11);
        let b = run(11);
        assert_eq!(a.administered, b.administered);
        assert_eq!(a.posterior, b.posterior);
    }

    #[test]
    fn malformed_response_fails_with_step_context() {
        let (flat, n_items, n_classes) = bank_k2();
        let cfg = config("GDI", 4, true, 0.8);
        let mut rng = Pcg64::seed_from_u64(5);
        let err = run_session(&flat, n_classes, n_items, &[1, 9, 9, 9], &cfg, &mut rng)
            .unwrap_err();
        assert!(matches!(err, CdcatError::MalformedResponse { .. }));
        assert!(err.failed_step().is_some());
    }

    #[test]
    fn batch_isolates_a_bad_examinee() {
        let (flat, n_items, n_classes) = bank_k2();
        let cfg = config("GDI", 4, true, 0.8);
        // Examinee 1 has an out-of-range response; 0 and 2 are clean.
        let responses = [1, 1, 1, 1, 1, 7, 1, 1, 0, 0, 0, 0];
        let results =
            run_batch(&flat, n_classes, n_items, &responses, 3, &cfg, false).unwrap();

        assert!(results[0].is_ok());
        assert!(results[2].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.status_code(), STATUS_MALFORMED_RESPONSE);
        assert_eq!(results[0].as_ref().unwrap().administered.len(), 4);
    }

    #[test]
    fn configuration_rejects_bad_surface_values() {
        assert!(resolve_cat("bogus", 4, 4, true, 0.8, None, Some(1), 0).is_err());
        assert!(resolve_cat("GDI", 4, 0, true, 0.8, None, Some(1), 0).is_err());
        assert!(resolve_cat("GDI", 4, 4, true, 1.5, None, Some(1), 0).is_err());
        assert!(resolve_cat("GDI", 4, 4, true, 0.8, Some(vec![0.5; 3]), Some(1), 0).is_err());
        assert!(resolve_cat("GDI", 4, 4, true, 0.8, None, Some(usize::MAX), 0).is_err());
        assert!(resolve_cat("GDI", 4, 4, true, 0.8, None, Some(0), 0).is_err());
        assert!(resolve_cat("GDI", 6, 4, true, 0.8, None, Some(1), 0).is_err());
    }
}
