//! Nonparametric CD-CAT loop.
//!
//! Selection works by pool reduction instead of an information score. The first K
//! steps administer one item per attribute, targeting the closest match to a
//! single-attribute Q-row; afterwards each step searches the pool in seeded-random
//! order for an item whose gate separates the two leading candidate patterns,
//! escalating to lower-ranked rivals when none does. Classification and the
//! pseudo-posterior come from the nonparametric engine after every step.

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

use crate::cat::resolve_workers;
use crate::error::{CdcatError, STATUS_OK};
use crate::npc::{self, Gate, PseudoWeighting};
use crate::patterns;

/// Resolved configuration for a nonparametric CAT run.
#[derive(Debug, Clone)]
pub struct NpcConfig {
    pub gate: Gate,
    pub max_items: usize,
    pub fixed_length: bool,
    pub precision: f64,
    pub weighting: PseudoWeighting,
    pub pseudo: bool,
    /// True when fixed-precision mode forced the pseudo-posterior on.
    pub substituted: bool,
    pub n_workers: usize,
    pub seed: u64,
}

/// Validate the nonparametric configuration surface.
///
/// Fixed-precision mode without pseudo-posterior probabilities is not supported;
/// it is substituted with pseudo-posterior mode and flagged (plus a warning).
#[allow(clippy::too_many_arguments)]
pub fn resolve_npc(
    gate: &str,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    weighting: &str,
    pseudo: bool,
    n_workers: Option<usize>,
    seed: u64,
) -> Result<NpcConfig, CdcatError> {
    let gate = Gate::from_name(gate)?;
    let weighting = PseudoWeighting::from_name(weighting)?;
    if max_items < 1 {
        return Err(CdcatError::InvalidMaxItems(max_items));
    }
    if !(precision > 0.0 && precision <= 1.0) {
        return Err(CdcatError::InvalidCutoff(precision));
    }
    let n_workers = resolve_workers(n_workers)?;

    let mut pseudo = pseudo;
    let mut substituted = false;
    if !fixed_length && !pseudo {
        pseudo = true;
        substituted = true;
        log::warn!(
            "fixed-precision nonparametric mode requires pseudo-posterior probabilities; \
             enabling them"
        );
    }

    Ok(NpcConfig {
        gate,
        max_items: max_items as usize,
        fixed_length,
        precision,
        weighting,
        pseudo,
        substituted,
        n_workers,
        seed,
    })
}

/// Every attribute must be required by at least one item.
pub fn validate_q_coverage(
    q: &[i32],
    n_items: usize,
    n_attributes: usize,
) -> Result<(), CdcatError> {
    for attribute in 0..n_attributes {
        let covered = (0..n_items).any(|j| q[j * n_attributes + attribute] == 1);
        if !covered {
            return Err(CdcatError::AttributeCoverage(attribute));
        }
    }
    Ok(())
}

/// Diagnostics logged after each administered item.
#[derive(Debug, Clone)]
pub struct NpcStepRecord {
    pub item: usize,
    pub best_class: usize,
    pub second_class: usize,
    pub best_loss: u32,
    pub pseudo: Option<Vec<f64>>,
}

/// Completed nonparametric session.
#[derive(Debug, Clone)]
pub struct NpcSessionResult {
    pub steps: Vec<NpcStepRecord>,
    pub administered: Vec<usize>,
    pub losses: Vec<u32>,
    pub ranked: Vec<usize>,
    pub pseudo: Option<Vec<f64>>,
}

#[inline]
fn q_row<'a>(q: &'a [i32], item: usize, n_attributes: usize) -> &'a [i32] {
    &q[item * n_attributes..(item + 1) * n_attributes]
}

#[inline]
fn required_count(q: &[i32], item: usize, n_attributes: usize) -> usize {
    q_row(q, item, n_attributes).iter().filter(|&&v| v == 1).count()
}

struct NpcSessionState {
    pool: Vec<usize>,
    administered: Vec<usize>,
    observed: Vec<i32>,
    steps: Vec<NpcStepRecord>,
    losses: Vec<u32>,
    ranked: Vec<usize>,
    pseudo: Option<Vec<f64>>,
}

/// Remove `item` from the pool, replay its response, reclassify, log the step.
fn administer_item(
    state: &mut NpcSessionState,
    q: &[i32],
    n_attributes: usize,
    responses: &[i32],
    config: &NpcConfig,
    item: usize,
    rng: &mut Pcg64,
) -> Result<(), CdcatError> {
    let pos = state.pool.iter().position(|&j| j == item).unwrap();
    state.pool.remove(pos);
    let value = responses[item];
    if value != 0 && value != 1 {
        return Err(CdcatError::MalformedResponse {
            step: state.administered.len(),
            item,
            value,
        });
    }
    state.administered.push(item);
    state.observed.push(value);

    state.losses = npc::pattern_losses(
        q,
        n_attributes,
        &state.administered,
        &state.observed,
        config.gate,
    );
    state.ranked = npc::rank_by_loss(&state.losses, rng);
    state.pseudo = config
        .pseudo
        .then(|| npc::pseudo_posterior(&state.ranked, n_attributes, config.weighting));
    state.steps.push(NpcStepRecord {
        item,
        best_class: state.ranked[0],
        second_class: state.ranked[1],
        best_loss: state.losses[state.ranked[0]],
        pseudo: state.pseudo.clone(),
    });
    Ok(())
}

/// Run one examinee's nonparametric session against the recorded response row.
pub fn run_npc_session(
    q: &[i32],
    n_items: usize,
    n_attributes: usize,
    responses: &[i32],
    config: &NpcConfig,
    rng: &mut Pcg64,
) -> Result<NpcSessionResult, CdcatError> {
    let max_items = config.max_items.min(n_items);

    let mut state = NpcSessionState {
        pool: (0..n_items).collect(),
        administered: Vec::with_capacity(max_items),
        observed: Vec::with_capacity(max_items),
        steps: Vec::with_capacity(max_items),
        losses: Vec::new(),
        ranked: Vec::new(),
        pseudo: None,
    };

    // steps 1..K: one item per attribute, targeting a single-attribute Q-row
    for attribute in 0..n_attributes {
        if state.pool.is_empty() || state.administered.len() >= max_items {
            break;
        }
        let mut candidates: Vec<usize> = state
            .pool
            .iter()
            .copied()
            .filter(|&j| q[j * n_attributes + attribute] == 1)
            .collect();
        if candidates.is_empty() {
            candidates = state.pool.clone();
        }
        let min_load = candidates
            .iter()
            .map(|&j| required_count(q, j, n_attributes))
            .min()
            .unwrap();
        let narrowed: Vec<usize> = candidates
            .into_iter()
            .filter(|&j| required_count(q, j, n_attributes) == min_load)
            .collect();
        let item = *narrowed.choose(rng).unwrap();
        administer_item(&mut state, q, n_attributes, responses, config, item, rng)?;
    }

    // steps K+1..max: administer items that separate the leading candidates
    while state.administered.len() < max_items && !state.pool.is_empty() {
        if !config.fixed_length && config.pseudo && state.administered.len() >= n_attributes {
            if let Some(pp) = &state.pseudo {
                if pp.iter().all(|&p| p.max(1.0 - p) >= config.precision) {
                    break;
                }
            }
        }

        let mut order = state.pool.clone();
        order.shuffle(rng);
        let best = state.ranked[0];
        let mut found: Option<usize> = None;
        for rival_rank in 1..state.ranked.len() {
            let rival = state.ranked[rival_rank];
            found = order.iter().copied().find(|&j| {
                let row = q_row(q, j, n_attributes);
                npc::ideal_response(best, row, n_attributes, config.gate)
                    != npc::ideal_response(rival, row, n_attributes, config.gate)
            });
            if found.is_some() {
                break;
            }
        }
        let item = found.ok_or(CdcatError::SearchExhausted {
            step: state.administered.len(),
        })?;
        administer_item(&mut state, q, n_attributes, responses, config, item, rng)?;
    }

    Ok(NpcSessionResult {
        steps: state.steps,
        administered: state.administered,
        losses: state.losses,
        ranked: state.ranked,
        pseudo: state.pseudo,
    })
}

/// Run every examinee's nonparametric session in parallel.
pub fn run_npc_batch(
    q: &[i32],
    n_items: usize,
    n_attributes: usize,
    responses: &[i32],
    n_examinees: usize,
    config: &NpcConfig,
    progress: bool,
) -> Result<Vec<Result<NpcSessionResult, CdcatError>>, CdcatError> {
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
                let result =
                    run_npc_session(q, n_items, n_attributes, row, config, &mut rng);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if progress && (finished % chunk == 0 || finished == n_examinees) {
                    log::info!("npc-cat: {finished}/{n_examinees} examinees processed");
                }
                result
            })
            .collect()
    }))
}

fn q_inputs(
    q_matrix: &PyReadonlyArray2<i32>,
) -> Result<(Vec<i32>, usize, usize), CdcatError> {
    let q = q_matrix.as_array();
    let n_items = q.nrows();
    let n_attributes = q.ncols();
    if n_attributes < 1 || n_attributes > patterns::MAX_ATTRIBUTES {
        return Err(CdcatError::InvalidAttributeCount(n_attributes as i64));
    }
    let flat: Vec<i32> = q.iter().cloned().collect();
    validate_q_coverage(&flat, n_items, n_attributes)?;
    Ok((flat, n_items, n_attributes))
}

/// Echo the fully resolved nonparametric configuration.
///
/// Returns (gate, max_items, fixed_length, precision, weighting, pseudo,
/// substituted, n_workers, seed).
#[pyfunction]
#[pyo3(signature = (gate="AND", max_items=20, fixed_length=true, precision=0.8, weighting="power2", pseudo=false, n_workers=None, seed=0))]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn resolve_npc_config(
    gate: &str,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    weighting: &str,
    pseudo: bool,
    n_workers: Option<usize>,
    seed: u64,
) -> PyResult<(String, i64, bool, f64, String, bool, bool, i64, u64)> {
    let config = resolve_npc(
        gate,
        max_items,
        fixed_length,
        precision,
        weighting,
        pseudo,
        n_workers,
        seed,
    )?;
    Ok((
        config.gate.name().to_string(),
        config.max_items as i64,
        config.fixed_length,
        config.precision,
        config.weighting.name().to_string(),
        config.pseudo,
        config.substituted,
        config.n_workers as i64,
        config.seed,
    ))
}

/// Run one examinee's nonparametric session and return the step-by-step trace.
///
/// Returns (administered, best_class, best_loss, second_class, pseudo,
/// final_losses, final_ranked); `pseudo` is NaN-filled when disabled.
#[pyfunction]
#[pyo3(signature = (q_matrix, responses, gate="AND", max_items=20, fixed_length=true, precision=0.8, weighting="power2", pseudo=false, seed=0))]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn npc_cat_single<'py>(
    py: Python<'py>,
    q_matrix: PyReadonlyArray2<i32>,
    responses: PyReadonlyArray1<i32>,
    gate: &str,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    weighting: &str,
    pseudo: bool,
    seed: u64,
) -> PyResult<(
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
)> {
    let (q, n_items, n_attributes) = q_inputs(&q_matrix)?;
    let resp = responses.as_array();
    if resp.len() != n_items {
        return Err(CdcatError::ShapeMismatch {
            context: "response vector length",
            got: resp.len(),
            expected: n_items,
        }
        .into());
    }

    let config = resolve_npc(
        gate,
        max_items,
        fixed_length,
        precision,
        weighting,
        pseudo,
        Some(1),
        seed,
    )?;

    let row: Vec<i32> = resp.iter().cloned().collect();
    let mut rng = Pcg64::seed_from_u64(seed);
    let result = run_npc_session(&q, n_items, n_attributes, &row, &config, &mut rng)?;

    let n_steps = result.steps.len();
    let mut administered = Array1::zeros(n_steps);
    let mut best_class = Array1::zeros(n_steps);
    let mut best_loss = Array1::zeros(n_steps);
    let mut second_class = Array1::zeros(n_steps);
    let mut pseudo_arr = Array2::from_elem((n_steps, n_attributes), f64::NAN);
    for (s, step) in result.steps.iter().enumerate() {
        administered[s] = step.item as i32;
        best_class[s] = step.best_class as i32;
        best_loss[s] = step.best_loss as i32;
        second_class[s] = step.second_class as i32;
        if let Some(pp) = &step.pseudo {
            for k in 0..n_attributes {
                pseudo_arr[[s, k]] = pp[k];
            }
        }
    }

    let losses: Vec<i32> = result.losses.iter().map(|&l| l as i32).collect();
    let ranked: Vec<i32> = result.ranked.iter().map(|&c| c as i32).collect();
    Ok((
        administered.to_pyarray(py),
        best_class.to_pyarray(py),
        best_loss.to_pyarray(py),
        second_class.to_pyarray(py),
        pseudo_arr.to_pyarray(py),
        Array1::from_vec(losses).to_pyarray(py),
        Array1::from_vec(ranked).to_pyarray(py),
    ))
}

/// Run the full nonparametric batch in parallel.
///
/// Trace arrays are padded with -1 / NaN past each examinee's administered
/// length. Returns (administered, n_administered, best_class, best_loss,
/// second_class, pseudo, final_best, final_pseudo, status, failed_step); status
/// codes are 0 = ok, 1 = malformed response, 3 = discrimination search
/// exhausted, with the failing step in `failed_step` (-1 when the session
/// succeeded).
#[pyfunction]
#[pyo3(signature = (q_matrix, responses, gate="AND", max_items=20, fixed_length=true, precision=0.8, weighting="power2", pseudo=false, n_workers=None, seed=0, progress=false))]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn npc_cat_batch<'py>(
    py: Python<'py>,
    q_matrix: PyReadonlyArray2<i32>,
    responses: PyReadonlyArray2<i32>,
    gate: &str,
    max_items: i64,
    fixed_length: bool,
    precision: f64,
    weighting: &str,
    pseudo: bool,
    n_workers: Option<usize>,
    seed: u64,
    progress: bool,
) -> PyResult<(
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray2<i32>>,
    Bound<'py, PyArray3<f64>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
)> {
    let (q, n_items, n_attributes) = q_inputs(&q_matrix)?;
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

    let config = resolve_npc(
        gate,
        max_items,
        fixed_length,
        precision,
        weighting,
        pseudo,
        n_workers,
        seed,
    )?;
    let max_len = config.max_items.min(n_items);

    let resp_flat: Vec<i32> = resp.iter().cloned().collect();
    let results = run_npc_batch(
        &q,
        n_items,
        n_attributes,
        &resp_flat,
        n_examinees,
        &config,
        progress,
    )
    .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;

    let mut administered = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut n_administered = Array1::zeros(n_examinees);
    let mut best_class = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut best_loss = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut second_class = Array2::from_elem((n_examinees, max_len), -1i32);
    let mut pseudo_arr = Array3::from_elem((n_examinees, max_len, n_attributes), f64::NAN);
    let mut final_best = Array1::from_elem(n_examinees, -1i32);
    let mut final_pseudo = Array2::from_elem((n_examinees, n_attributes), f64::NAN);
    let mut status = Array1::from_elem(n_examinees, STATUS_OK);
    let mut failed_step = Array1::from_elem(n_examinees, -1i32);

    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(session) => {
                n_administered[i] = session.administered.len() as i32;
                for (s, step) in session.steps.iter().enumerate() {
                    administered[[i, s]] = step.item as i32;
                    best_class[[i, s]] = step.best_class as i32;
                    best_loss[[i, s]] = step.best_loss as i32;
                    second_class[[i, s]] = step.second_class as i32;
                    if let Some(pp) = &step.pseudo {
                        for k in 0..n_attributes {
                            pseudo_arr[[i, s, k]] = pp[k];
                        }
                    }
                }
                if let Some(first) = session.ranked.first() {
                    final_best[i] = *first as i32;
                }
                if let Some(pp) = &session.pseudo {
                    for k in 0..n_attributes {
                        final_pseudo[[i, k]] = pp[k];
                    }
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
        best_class.to_pyarray(py),
        best_loss.to_pyarray(py),
        second_class.to_pyarray(py),
        pseudo_arr.to_pyarray(py),
        final_best.to_pyarray(py),
        final_pseudo.to_pyarray(py),
        status.to_pyarray(py),
        failed_step.to_pyarray(py),
    ))
}

/// Register nonparametric CAT functions with the Python module.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(resolve_npc_config, m)?)?;
    m.add_function(wrap_pyfunction!(npc_cat_single, m)?)?;
    m.add_function(wrap_pyfunction!(npc_cat_batch, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::STATUS_SEARCH_EXHAUSTED;

    // K = 3, J = 6: one single-attribute item per attribute plus mixed items.
    fn bank_k3() -> (Vec<i32>, usize, usize) {
        let q = vec![
            1, 0, 0, //
            0, 1, 0, //
            0, 0, 1, //
            1, 1, 0, //
            0, 1, 1, //
            1, 1, 1, //
        ];
        (q, 6, 3)
    }

    fn config(max_items: i64, fixed_length: bool, precision: f64, pseudo: bool) -> NpcConfig {
        resolve_npc(
            "AND",
            max_items,
            fixed_length,
            precision,
            "power2",
            pseudo,
            Some(1),
            17,
        )
        .unwrap()
    }

    // Ideal responses of pattern 101 to the bank above under the AND gate.
    fn responses_101() -> Vec<i32> {
        vec![1, 0, 1, 0, 0, 0]
    }

    #[test]
    fn first_k_steps_cover_every_attribute_once() {
        let (q, n_items, k) = bank_k3();
        let cfg = config(6, true, 0.8, false);
        let mut rng = Pcg64::seed_from_u64(5);
        let result =
            run_npc_session(&q, n_items, k, &responses_101(), &cfg, &mut rng).unwrap();

        // The single-attribute items are 0, 1, 2 in some order.
        let mut first_k: Vec<usize> = result.administered[..k].to_vec();
        first_k.sort_unstable();
        assert_eq!(first_k, vec![0, 1, 2]);
    }

    #[test]
    fn consistent_responses_recover_the_generating_pattern() {
        let (q, n_items, k) = bank_k3();
        let cfg = config(6, true, 0.8, false);
        let mut rng = Pcg64::seed_from_u64(6);
        let result =
            run_npc_session(&q, n_items, k, &responses_101(), &cfg, &mut rng).unwrap();

        // After the first K items the best candidate is 101 (class 5), loss 0.
        let step_k = &result.steps[k - 1];
        assert_eq!(step_k.best_class, 5);
        assert_eq!(step_k.best_loss, 0);
        // The full-length run keeps it.
        assert_eq!(result.ranked[0], 5);
        assert_eq!(result.losses[5], 0);
        assert_eq!(result.administered.len(), 6);
    }

    #[test]
    fn sessions_reproduce_under_a_fixed_seed() {
        let (q, n_items, k) = bank_k3();
        let cfg = config(6, true, 0.8, true);
        let run = |seed| {
            let mut rng = Pcg64::seed_from_u64(seed);
            run_npc_session(&q, n_items, k, &responses_101(), &cfg, &mut rng).unwrap()
        };
        let a = run(3);
        let b = run(3);
        assert_eq!(a.administered, b.administered);
        assert_eq!(a.ranked, b.ranked);
    }

    #[test]
    fn no_item_repeats_and_pool_shrinks_monotonically() {
        let (q, n_items, k) = bank_k3();
        let cfg = config(6, true, 0.8, false);
        let mut rng = Pcg64::seed_from_u64(8);
        let result =
            run_npc_session(&q, n_items, k, &responses_101(), &cfg, &mut rng).unwrap();
        let mut seen = result.administered.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), result.administered.len());
    }

    #[test]
    fn precision_mode_stops_once_every_attribute_is_settled() {
        let (q, n_items, k) = bank_k3();
        // A permissive cutoff that the pseudo-posterior clears right after phase 1.
        let cfg = config(6, false, 0.55, true);
        let mut rng = Pcg64::seed_from_u64(9);
        let result =
            run_npc_session(&q, n_items, k, &responses_101(), &cfg, &mut rng).unwrap();
        assert!(result.administered.len() >= k);
        assert!(result.administered.len() < 6);
        let pp = result.pseudo.as_ref().unwrap();
        assert!(pp.iter().all(|&p| p.max(1.0 - p) >= 0.55));
    }

    #[test]
    fn exhausted_discrimination_search_is_reported() {
        // After the only informative item is gone, the all-zero rows cannot
        // separate any pair of patterns.
        let q = vec![1, 0, 0];
        let cfg = config(3, true, 0.8, false);
        let mut rng = Pcg64::seed_from_u64(10);
        let err = run_npc_session(&q, 3, 1, &[1, 1, 1], &cfg, &mut rng).unwrap_err();
        assert!(matches!(err, CdcatError::SearchExhausted { .. }));
        assert_eq!(err.status_code(), STATUS_SEARCH_EXHAUSTED);
    }

    #[test]
    fn fixed_precision_without_pseudo_is_substituted() {
        let cfg = resolve_npc("AND", 5, false, 0.8, "power2", false, Some(1), 0).unwrap();
        assert!(cfg.pseudo);
        assert!(cfg.substituted);

        let cfg = resolve_npc("AND", 5, true, 0.8, "power2", false, Some(1), 0).unwrap();
        assert!(!cfg.pseudo);
        assert!(!cfg.substituted);
    }

    #[test]
    fn q_matrix_must_cover_every_attribute() {
        let q = vec![1, 0, 1, 0]; // two items, neither requires attribute 1
        assert!(matches!(
            validate_q_coverage(&q, 2, 2),
            Err(CdcatError::AttributeCoverage(1))
        ));
        let q = vec![1, 0, 0, 1];
        assert!(validate_q_coverage(&q, 2, 2).is_ok());
    }
}
