//! AC branch flow equations for the pi-model transmission line.
//!
//! For a branch from bus i to bus j with series admittance `g + jb` and
//! per-terminal charging `bc`, the terminal power injections are
//!
//! ```text
//! Pij =  g*Vi^2      - Vi*Vj*( g*cos(ti-tj) + b*sin(ti-tj))
//! Qij = -(b+bc)*Vi^2 - Vi*Vj*( g*sin(ti-tj) - b*cos(ti-tj))
//! Pji =  g*Vj^2      - Vi*Vj*( g*cos(ti-tj) - b*sin(ti-tj))
//! Qji = -(b+bc)*Vj^2 - Vi*Vj*(-g*sin(ti-tj) - b*cos(ti-tj))
//! ```
//!
//! The constraint form subtracts the dedicated flow variables so that every
//! branch contributes four residuals that an equality solver drives to zero.

use crate::admittance::BranchAdmittance;

/// Variables consumed per branch: `[vi, vj, ti, tj, p_from, q_from, p_to, q_to]`.
pub const BRANCH_FLOW_VARS: usize = 8;
/// Parameters per branch: `[g, b, bc]`.
pub const BRANCH_FLOW_PARAMS: usize = 3;
/// Residuals produced per branch.
pub const BRANCH_FLOW_RESIDUALS: usize = 4;

/// Residuals of the four branch flow equalities.
///
/// `vars` is `[vi, vj, ti, tj, p_from, q_from, p_to, q_to]`, `params` is
/// `[g, b, bc]`, and `out` receives `[Pij - p_from, Qij - q_from,
/// Pji - p_to, Qji - q_to]`.
pub fn branch_flow_residuals(vars: &[f64], params: &[f64], out: &mut [f64]) {
    debug_assert_eq!(vars.len(), BRANCH_FLOW_VARS);
    debug_assert_eq!(params.len(), BRANCH_FLOW_PARAMS);
    debug_assert_eq!(out.len(), BRANCH_FLOW_RESIDUALS);

    let (vi, vj, ti, tj) = (vars[0], vars[1], vars[2], vars[3]);
    let (g, b, bc) = (params[0], params[1], params[2]);

    let dt = ti - tj;
    let (sin_dt, cos_dt) = dt.sin_cos();
    let vivj = vi * vj;

    let p_ij = g * vi * vi - vivj * (g * cos_dt + b * sin_dt);
    let q_ij = -(b + bc) * vi * vi - vivj * (g * sin_dt - b * cos_dt);
    let p_ji = g * vj * vj - vivj * (g * cos_dt - b * sin_dt);
    let q_ji = -(b + bc) * vj * vj - vivj * (-g * sin_dt - b * cos_dt);

    out[0] = p_ij - vars[4];
    out[1] = q_ij - vars[5];
    out[2] = p_ji - vars[6];
    out[3] = q_ji - vars[7];
}

/// Evaluate the terminal flows `(p_from, q_from, p_to, q_to)` at a given
/// voltage/angle operating point.
pub fn terminal_flows(
    adm: &BranchAdmittance,
    vi: f64,
    vj: f64,
    ti: f64,
    tj: f64,
) -> (f64, f64, f64, f64) {
    let vars = [vi, vj, ti, tj, 0.0, 0.0, 0.0, 0.0];
    let params = [adm.g, adm.b, adm.bc];
    let mut out = [0.0; BRANCH_FLOW_RESIDUALS];
    branch_flow_residuals(&vars, &params, &mut out);
    (out[0], out[1], out[2], out[3])
}
