//! High-performance Rust backend for CD-CAT (Cognitive Diagnosis Computerized
//! Adaptive Testing).
//!
//! This crate provides optimized implementations of the CD-CAT simulation core:
//! - Attribute pattern space enumeration and posterior marginalization
//! - Bayesian posterior updates over 2^K mastery patterns (ML/MAP/EAP estimates)
//! - Item information scorers (GDI, JSD, PWKL, MPWKL, random baseline)
//! - The parametric adaptive item-selection loop with fixed-length and
//!   fixed-precision stopping
//! - Nonparametric Hamming-distance classification with conjunctive and
//!   disjunctive gates and pseudo-posterior mastery probabilities
//! - The nonparametric adaptive loop (pool reduction + discrimination search)
//! - Parallel batch execution over examinees with per-examinee derived seeds

use pyo3::prelude::*;

pub mod utils;

pub mod cat;
pub mod error;
pub mod npc;
pub mod npc_cat;
pub mod patterns;
pub mod posterior;
pub mod selection;

/// Python module for cdcat_rs
#[pymodule]
fn cdcat_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    patterns::register(m)?;
    posterior::register(m)?;
    selection::register(m)?;
    cat::register(m)?;
    npc::register(m)?;
    npc_cat::register(m)?;

    Ok(())
}
