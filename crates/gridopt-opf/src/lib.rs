//! # gridopt-opf: AC Optimal Power Flow
//!
//! Builds and solves the full nonlinear AC optimal power flow problem:
//! minimize quadratic generation cost subject to the exact AC branch flow
//! equations, nodal power balance, voltage and angle limits, and apparent
//! power (thermal) limits.
//!
//! ## Pipeline
//!
//! 1. [`admittance`] derives series admittance and charging susceptance for
//!    each branch of a [`gridopt_core::Network`].
//! 2. [`model`] is a small declarative optimization model: variables with
//!    bounds, registered nonlinear residual functions, linear and quadratic
//!    constraints, and a quadratic objective.
//! 3. [`problem`] translates the network into that model: one flow variable
//!    quadruple and one nonlinear constraint block per branch, one P and one
//!    Q balance equation per bus, limit constraints, and the cost objective.
//! 4. [`solver`] minimizes the model with a quadratic penalty method driven
//!    by L-BFGS.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gridopt_opf::{solve_ac_opf, SolverConfig};
//! # let network = gridopt_opf::test_cases::case5();
//!
//! let solution = solve_ac_opf(&network, &SolverConfig::default()).unwrap();
//! println!("status: {}, cost: {:.1} $/hr", solution.status, solution.objective_value);
//! ```

use thiserror::Error;

pub mod admittance;
pub mod branch_flow;
pub mod model;
pub mod problem;
pub mod solver;
pub mod test_cases;
pub mod types;

pub use admittance::BranchAdmittance;
pub use model::{LinExpr, Model, NlFunctionId, QuadExpr, VarId};
pub use problem::{solve_ac_opf, AcOpfProblem};
pub use solver::{minimize, SolveOutcome, SolverConfig, TerminationStatus};
pub use types::{BranchFlow, OpfSolution};

/// Errors raised while constructing or solving an OPF problem.
///
/// Solver nonconvergence is deliberately not here: a solver that ran but
/// failed to converge still produces a [`SolveOutcome`] whose status says so.
/// An `Err` means the problem could not be posed or the backend broke down
/// entirely.
#[derive(Debug, Error)]
pub enum OpfError {
    /// Branch with zero series impedance, admittance is undefined.
    #[error("branch {branch} has zero series impedance")]
    DegenerateBranch { branch: usize },

    /// A variable or constraint was declared with lower > upper.
    #[error("infeasible bounds on {name}: lower {lower} > upper {upper}")]
    InfeasibleBounds {
        name: String,
        lower: f64,
        upper: f64,
    },

    /// A nonlinear constraint binding does not match its function signature.
    #[error("function {function} expects {expected} arguments, binding supplies {got}")]
    FunctionArity {
        function: String,
        expected: usize,
        got: usize,
    },

    /// The input network failed structural validation.
    #[error("network data: {0}")]
    Network(#[from] gridopt_core::NetworkError),

    /// The optimization backend failed without producing any iterate.
    #[error("solver backend: {0}")]
    Backend(String),
}

pub type OpfResult<T> = Result<T, OpfError>;
