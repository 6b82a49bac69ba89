//! Solution types reported by the OPF pipeline.

use serde::Serialize;

use crate::solver::TerminationStatus;

/// Terminal power flows of one branch at the solution point (per-unit).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BranchFlow {
    pub p_from: f64,
    pub q_from: f64,
    pub p_to: f64,
    pub q_to: f64,
}

impl BranchFlow {
    /// Apparent power at the from terminal.
    pub fn s_from(&self) -> f64 {
        self.p_from.hypot(self.q_from)
    }

    /// Apparent power at the to terminal.
    pub fn s_to(&self) -> f64 {
        self.p_to.hypot(self.q_to)
    }
}

/// An OPF solution: dispatch, voltages, flows, and solve bookkeeping.
///
/// All electrical quantities are per-unit; angles are radians. Vectors are
/// indexed by the dense network ids (`generator_p[g]` belongs to `GenId(g)`
/// and so on).
#[derive(Debug, Clone, Serialize)]
pub struct OpfSolution {
    pub status: TerminationStatus,
    /// Total generation cost ($/hr)
    pub objective_value: f64,
    /// Active power dispatch per generator
    pub generator_p: Vec<f64>,
    /// Reactive power dispatch per generator
    pub generator_q: Vec<f64>,
    /// Voltage magnitude per bus
    pub bus_voltage_mag: Vec<f64>,
    /// Voltage angle per bus (radians)
    pub bus_voltage_ang: Vec<f64>,
    /// Terminal flows per branch
    pub branch_flows: Vec<BranchFlow>,
    /// Estimated locational marginal price per bus ($/hr per pu).
    ///
    /// Approximated as the marginal cost of a generator away from both of
    /// its limits, applied uniformly. Exact LMPs would need the duals of
    /// the balance constraints.
    pub bus_lmp: Vec<f64>,
    /// Solver iterations across all penalty rounds
    pub iterations: usize,
    pub solve_time_ms: u128,
    /// Maximum constraint violation at the returned point
    pub max_violation: f64,
}
