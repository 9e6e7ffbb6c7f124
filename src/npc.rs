//! Nonparametric classification engine.
//!
//! Classifies an examinee by Hamming distance: each candidate pattern implies an
//! ideal response to every administered Q-row under a conjunctive (AND) or
//! disjunctive (OR) gate, and the pattern whose ideal vector is closest to the
//! observed vector wins. Equal-loss patterns are ordered by a seeded shuffle
//! followed by a stable sort, so the tie-break is random but reproducible.
//! Ranked losses also yield a pseudo-posterior mastery probability per attribute.

use ndarray::Array1;
use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::prelude::*;
use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::error::CdcatError;
use crate::patterns;

/// Response model gate: how required attributes combine into an ideal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// All required attributes must be mastered.
    Conjunctive,
    /// At least one required attribute must be mastered.
    Disjunctive,
}

impl Gate {
    pub fn from_name(name: &str) -> Result<Self, CdcatError> {
        match name.to_ascii_uppercase().as_str() {
            "AND" | "CONJUNCTIVE" => Ok(Gate::Conjunctive),
            "OR" | "DISJUNCTIVE" => Ok(Gate::Disjunctive),
            _ => Err(CdcatError::UnknownGate(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Gate::Conjunctive => "AND",
            Gate::Disjunctive => "OR",
        }
    }
}

/// Rank weighting scheme for the pseudo-posterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoWeighting {
    /// w_r = 2^-r over 0-based rank r.
    PowerOfTwo,
    /// w_r = e^-r over 0-based rank r.
    Exponential,
}

impl PseudoWeighting {
    pub fn from_name(name: &str) -> Result<Self, CdcatError> {
        match name.to_ascii_lowercase().as_str() {
            "power2" | "pow2" => Ok(PseudoWeighting::PowerOfTwo),
            "exponential" | "exp" => Ok(PseudoWeighting::Exponential),
            _ => Err(CdcatError::UnknownWeighting(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PseudoWeighting::PowerOfTwo => "power2",
            PseudoWeighting::Exponential => "exponential",
        }
    }

    #[inline]
    fn weight(&self, rank: usize) -> f64 {
        match self {
            PseudoWeighting::PowerOfTwo => 0.5f64.powi(rank as i32),
            PseudoWeighting::Exponential => (-(rank as f64)).exp(),
        }
    }
}

/// Ideal response of latent class `class` to one Q-row under `gate`.
#[inline]
pub fn ideal_response(class: usize, q_row: &[i32], n_attributes: usize, gate: Gate) -> i32 {
    match gate {
        Gate::Conjunctive => {
            for (k, &q) in q_row.iter().enumerate() {
                if q == 1 && patterns::pattern_bit(class, k, n_attributes) == 0 {
                    return 0;
                }
            }
            1
        }
        Gate::Disjunctive => {
            for (k, &q) in q_row.iter().enumerate() {
                if q == 1 && patterns::pattern_bit(class, k, n_attributes) == 1 {
                    return 1;
                }
            }
            0
        }
    }
}

/// Hamming loss of every latent class against the observed responses.
///
/// `q` is the flat J x K Q-matrix; `administered` indexes the given items,
/// aligned with `observed`.
pub fn pattern_losses(
    q: &[i32],
    n_attributes: usize,
    administered: &[usize],
    observed: &[i32],
    gate: Gate,
) -> Vec<u32> {
    let n_classes = patterns::n_patterns(n_attributes);
    let mut losses = vec![0u32; n_classes];
    for (pos, &item) in administered.iter().enumerate() {
        let q_row = &q[item * n_attributes..(item + 1) * n_attributes];
        for (class, loss) in losses.iter_mut().enumerate() {
            if ideal_response(class, q_row, n_attributes, gate) != observed[pos] {
                *loss += 1;
            }
        }
    }
    losses
}

/// Classes ordered by ascending loss, equal losses in seeded-random order.
pub fn rank_by_loss(losses: &[u32], rng: &mut Pcg64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..losses.len()).collect();
    order.shuffle(rng);
    order.sort_by_key(|&class| losses[class]);
    order
}

/// Pseudo-posterior mastery probability per attribute from a loss ranking.
pub fn pseudo_posterior(
    ranked: &[usize],
    n_attributes: usize,
    weighting: PseudoWeighting,
) -> Vec<f64> {
    let mut mastered = vec![0.0; n_attributes];
    let mut total = 0.0;
    for (rank, &class) in ranked.iter().enumerate() {
        let w = weighting.weight(rank);
        total += w;
        for (k, slot) in mastered.iter_mut().enumerate() {
            if patterns::pattern_bit(class, k, n_attributes) == 1 {
                *slot += w;
            }
        }
    }
    mastered.iter().map(|&m| m / total).collect()
}

fn classification_inputs(
    q_rows: &PyReadonlyArray2<i32>,
    responses: &PyReadonlyArray1<i32>,
) -> Result<(Vec<i32>, usize, Vec<usize>, Vec<i32>), CdcatError> {
    let q = q_rows.as_array();
    let resp = responses.as_array();
    let n_administered = q.nrows();
    let n_attributes = q.ncols();
    if n_attributes < 1 || n_attributes > patterns::MAX_ATTRIBUTES {
        return Err(CdcatError::InvalidAttributeCount(n_attributes as i64));
    }
    if resp.len() != n_administered {
        return Err(CdcatError::ShapeMismatch {
            context: "response vector length",
            got: resp.len(),
            expected: n_administered,
        });
    }
    let observed: Vec<i32> = resp.iter().cloned().collect();
    for (pos, &value) in observed.iter().enumerate() {
        if value != 0 && value != 1 {
            return Err(CdcatError::MalformedResponse {
                step: pos,
                item: pos,
                value,
            });
        }
    }
    let flat: Vec<i32> = q.iter().cloned().collect();
    let administered: Vec<usize> = (0..n_administered).collect();
    Ok((flat, n_attributes, administered, observed))
}

/// Hamming-distance classification of one response vector.
///
/// `q_rows` holds the administered Q-rows in administration order. Returns
/// (losses, ranked, best_class, second_class, best_loss); `ranked` lists all
/// classes by ascending loss with the seeded tie-break applied.
#[pyfunction]
#[pyo3(signature = (q_rows, responses, gate="AND", seed=0))]
#[allow(clippy::type_complexity)]
pub fn npc_classify<'py>(
    py: Python<'py>,
    q_rows: PyReadonlyArray2<i32>,
    responses: PyReadonlyArray1<i32>,
    gate: &str,
    seed: u64,
) -> PyResult<(
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<i32>>,
    i32,
    i32,
    i32,
)> {
    let gate = Gate::from_name(gate)?;
    let (q, n_attributes, administered, observed) =
        classification_inputs(&q_rows, &responses)?;

    let losses = pattern_losses(&q, n_attributes, &administered, &observed, gate);
    let mut rng = Pcg64::seed_from_u64(seed);
    let ranked = rank_by_loss(&losses, &mut rng);
    let best = ranked[0];
    let second = ranked[1];

    let losses_arr: Vec<i32> = losses.iter().map(|&l| l as i32).collect();
    let ranked_arr: Vec<i32> = ranked.iter().map(|&c| c as i32).collect();
    Ok((
        Array1::from_vec(losses_arr).to_pyarray(py),
        Array1::from_vec(ranked_arr).to_pyarray(py),
        best as i32,
        second as i32,
        losses[best] as i32,
    ))
}

/// Pseudo-posterior mastery probabilities for one response vector.
#[pyfunction]
#[pyo3(signature = (q_rows, responses, gate="AND", weighting="power2", seed=0))]
pub fn npc_pseudo_posterior<'py>(
    py: Python<'py>,
    q_rows: PyReadonlyArray2<i32>,
    responses: PyReadonlyArray1<i32>,
    gate: &str,
    weighting: &str,
    seed: u64,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let gate = Gate::from_name(gate)?;
    let weighting = PseudoWeighting::from_name(weighting)?;
    let (q, n_attributes, administered, observed) =
        classification_inputs(&q_rows, &responses)?;

    let losses = pattern_losses(&q, n_attributes, &administered, &observed, gate);
    let mut rng = Pcg64::seed_from_u64(seed);
    let ranked = rank_by_loss(&losses, &mut rng);
    let pp = pseudo_posterior(&ranked, n_attributes, weighting);
    Ok(Array1::from_vec(pp).to_pyarray(py))
}

/// Register nonparametric-classifier functions with the Python module.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(npc_classify, m)?)?;
    m.add_function(wrap_pyfunction!(npc_pseudo_posterior, m)?)?;
    Ok(())
}
