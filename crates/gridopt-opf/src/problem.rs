//! Network-to-model translation for AC optimal power flow.
//!
//! [`AcOpfProblem::build`] turns a validated [`Network`] into a [`Model`]:
//!
//! - per bus: a bounded voltage magnitude variable and an angle variable
//!   (fixed to zero at the slack bus),
//! - per generator: bounded active and reactive dispatch variables,
//! - per branch: four unbounded terminal flow variables tied to the voltage
//!   variables through one nonlinear constraint block of the branch flow
//!   equations,
//! - per bus: one active and one reactive quadratic balance equality over
//!   the incident flows, dispatch, load, and shunt,
//! - per branch: a ranged linear angle difference constraint and, for
//!   thermally limited branches, squared apparent power inequalities at
//!   both terminals,
//! - a quadratic cost objective over active dispatch.
//!
//! The initial point is a flat start: voltages at 1 pu, angles at zero,
//! generators at the midpoint of their box, and flow variables preloaded
//! with the flows implied by the flat voltage profile so the nonlinear
//! residuals start at zero.

use gridopt_core::{BranchId, BusId, GenId, Network};

use crate::admittance::BranchAdmittance;
use crate::branch_flow::{
    branch_flow_residuals, terminal_flows, BRANCH_FLOW_PARAMS, BRANCH_FLOW_RESIDUALS,
    BRANCH_FLOW_VARS,
};
use crate::model::{LinExpr, Model, QuadExpr, VarId};
use crate::solver::{minimize, SolveOutcome, SolverConfig};
use crate::types::{BranchFlow, OpfSolution};
use crate::OpfResult;

/// Margin for deciding a generator sits at one of its active power limits
/// when estimating the marginal price.
const LMP_LIMIT_MARGIN: f64 = 1e-3;

/// An assembled AC-OPF instance with the variable layout kept alongside the
/// model so solutions can be mapped back to network elements.
pub struct AcOpfProblem {
    model: Model,
    network: Network,
    admittances: Vec<BranchAdmittance>,
    v: Vec<VarId>,
    theta: Vec<VarId>,
    pg: Vec<VarId>,
    qg: Vec<VarId>,
    p_from: Vec<VarId>,
    q_from: Vec<VarId>,
    p_to: Vec<VarId>,
    q_to: Vec<VarId>,
}

impl AcOpfProblem {
    /// Build the full OPF model for a network.
    ///
    /// Fails when the network is structurally invalid, a branch has zero
    /// series impedance, or any declared bound range is inverted.
    pub fn build(network: &Network) -> OpfResult<Self> {
        network.validate()?;

        let admittances = network
            .branches
            .iter()
            .map(BranchAdmittance::derive)
            .collect::<OpfResult<Vec<_>>>()?;

        let mut model = Model::new();

        // Bus voltage and angle variables. The slack angle is pinned to
        // zero by a degenerate box, which also serves as the reference for
        // every angle difference.
        let mut v = Vec::with_capacity(network.buses.len());
        let mut theta = Vec::with_capacity(network.buses.len());
        for bus in &network.buses {
            let i = bus.id.value();
            let vi = model.add_variable(format!("v[{i}]"), bus.v_min, bus.v_max)?;
            model.set_initial(vi, 1.0);
            v.push(vi);

            let ti = if bus.id == network.slack {
                model.add_variable(format!("theta[{i}]"), 0.0, 0.0)?
            } else {
                model.add_variable(
                    format!("theta[{i}]"),
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                )?
            };
            model.set_initial(ti, 0.0);
            theta.push(ti);
        }

        // Generator dispatch variables start at the midpoint of their box.
        let mut pg = Vec::with_capacity(network.generators.len());
        let mut qg = Vec::with_capacity(network.generators.len());
        for gen in &network.generators {
            let g = gen.id.value();
            pg.push(model.add_variable(format!("pg[{g}]"), gen.pmin, gen.pmax)?);
            qg.push(model.add_variable(format!("qg[{g}]"), gen.qmin, gen.qmax)?);
        }

        // Flow variables, preloaded with the flat-start flows so the
        // nonlinear residuals vanish at the initial point.
        let x0 = model.initial_point();
        let x0_v: Vec<f64> = v.iter().map(|&vi| x0[vi.value()]).collect();
        let x0_t: Vec<f64> = theta.iter().map(|&ti| x0[ti.value()]).collect();
        let nb = network.branches.len();
        let mut p_from = Vec::with_capacity(nb);
        let mut q_from = Vec::with_capacity(nb);
        let mut p_to = Vec::with_capacity(nb);
        let mut q_to = Vec::with_capacity(nb);
        for (k, branch) in network.branches.iter().enumerate() {
            let (i, j) = (branch.from_bus.value(), branch.to_bus.value());
            let (pf0, qf0, pt0, qt0) =
                terminal_flows(&admittances[k], x0_v[i], x0_v[j], x0_t[i], x0_t[j]);

            let (lo, hi) = (f64::NEG_INFINITY, f64::INFINITY);
            let pf = model.add_variable(format!("p_from[{k}]"), lo, hi)?;
            let qf = model.add_variable(format!("q_from[{k}]"), lo, hi)?;
            let pt = model.add_variable(format!("p_to[{k}]"), lo, hi)?;
            let qt = model.add_variable(format!("q_to[{k}]"), lo, hi)?;
            model.set_initial(pf, pf0);
            model.set_initial(qf, qf0);
            model.set_initial(pt, pt0);
            model.set_initial(qt, qt0);
            p_from.push(pf);
            q_from.push(qf);
            p_to.push(pt);
            q_to.push(qt);
        }

        // One registered flow function, bound once per branch.
        let flow_fn = model.register_function(
            "branch_flow",
            branch_flow_residuals,
            BRANCH_FLOW_VARS,
            BRANCH_FLOW_PARAMS,
            BRANCH_FLOW_RESIDUALS,
        );
        for (k, branch) in network.branches.iter().enumerate() {
            let (i, j) = (branch.from_bus.value(), branch.to_bus.value());
            let adm = &admittances[k];
            model.add_nl_constraint(
                flow_fn,
                vec![
                    v[i], v[j], theta[i], theta[j], p_from[k], q_from[k], p_to[k], q_to[k],
                ],
                vec![adm.g, adm.b, adm.bc],
            )?;
        }

        // Nodal balance, one P and one Q equality for every bus:
        //   sum(flows out) - sum(dispatch) + load + shunt(V^2) = 0
        for bus in &network.buses {
            let i = bus.id.value();
            let mut p_bal = QuadExpr::new();
            let mut q_bal = QuadExpr::new();
            for (k, branch) in network.branches.iter().enumerate() {
                if branch.from_bus == bus.id {
                    p_bal.add_linear_term(p_from[k], 1.0);
                    q_bal.add_linear_term(q_from[k], 1.0);
                }
                if branch.to_bus == bus.id {
                    p_bal.add_linear_term(p_to[k], 1.0);
                    q_bal.add_linear_term(q_to[k], 1.0);
                }
            }
            for gen in network.generators_at_bus(bus.id) {
                p_bal.add_linear_term(pg[gen.id.value()], -1.0);
                q_bal.add_linear_term(qg[gen.id.value()], -1.0);
            }
            p_bal.add_constant(bus.p_load);
            q_bal.add_constant(bus.q_load);
            if bus.gs != 0.0 {
                p_bal.add_quad_term(v[i], v[i], bus.gs);
            }
            if bus.bs != 0.0 {
                q_bal.add_quad_term(v[i], v[i], -bus.bs);
            }
            model.add_quadratic_equality(p_bal);
            model.add_quadratic_equality(q_bal);
        }

        // Angle difference and thermal limits.
        for (k, branch) in network.branches.iter().enumerate() {
            let (i, j) = (branch.from_bus.value(), branch.to_bus.value());
            let mut angle = LinExpr::new();
            angle.add_term(theta[i], 1.0);
            angle.add_term(theta[j], -1.0);
            model.add_linear_constraint(
                angle,
                branch.angle_min.to_radians().value(),
                branch.angle_max.to_radians().value(),
            )?;

            if branch.has_thermal_limit() {
                let s_max_sq = branch.s_max * branch.s_max;
                let mut s_from = QuadExpr::new();
                s_from.add_quad_term(p_from[k], p_from[k], 1.0);
                s_from.add_quad_term(q_from[k], q_from[k], 1.0);
                model.add_quadratic_inequality(s_from, s_max_sq);

                let mut s_to = QuadExpr::new();
                s_to.add_quad_term(p_to[k], p_to[k], 1.0);
                s_to.add_quad_term(q_to[k], q_to[k], 1.0);
                model.add_quadratic_inequality(s_to, s_max_sq);
            }
        }

        // Quadratic generation cost.
        let mut objective = QuadExpr::new();
        for gen in &network.generators {
            let g = gen.id.value();
            if gen.cost.quadratic != 0.0 {
                objective.add_quad_term(pg[g], pg[g], gen.cost.quadratic);
            }
            if gen.cost.linear != 0.0 {
                objective.add_linear_term(pg[g], gen.cost.linear);
            }
            objective.add_constant(gen.cost.constant);
        }
        model.set_objective(objective);

        Ok(Self {
            model,
            network: network.clone(),
            admittances,
            v,
            theta,
            pg,
            qg,
            p_from,
            q_from,
            p_to,
            q_to,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn admittances(&self) -> &[BranchAdmittance] {
        &self.admittances
    }

    pub fn voltage_var(&self, bus: BusId) -> VarId {
        self.v[bus.value()]
    }

    pub fn angle_var(&self, bus: BusId) -> VarId {
        self.theta[bus.value()]
    }

    pub fn gen_p_var(&self, gen: GenId) -> VarId {
        self.pg[gen.value()]
    }

    pub fn gen_q_var(&self, gen: GenId) -> VarId {
        self.qg[gen.value()]
    }

    /// Flow variables `(p_from, q_from, p_to, q_to)` of a branch.
    pub fn flow_vars(&self, branch: BranchId) -> (VarId, VarId, VarId, VarId) {
        let k = branch.value();
        (self.p_from[k], self.q_from[k], self.p_to[k], self.q_to[k])
    }

    /// Solve with the penalty backend and map the result back to network
    /// elements.
    pub fn solve(&self, config: &SolverConfig) -> OpfResult<OpfSolution> {
        let outcome = minimize(&self.model, config)?;
        Ok(self.extract_solution(&outcome))
    }

    /// Turn a raw solver outcome into a network-indexed solution.
    pub fn extract_solution(&self, outcome: &SolveOutcome) -> OpfSolution {
        let generator_p: Vec<f64> = self.pg.iter().map(|&id| outcome.value(id)).collect();
        let generator_q: Vec<f64> = self.qg.iter().map(|&id| outcome.value(id)).collect();
        let bus_voltage_mag: Vec<f64> = self.v.iter().map(|&id| outcome.value(id)).collect();
        let bus_voltage_ang: Vec<f64> = self.theta.iter().map(|&id| outcome.value(id)).collect();

        let branch_flows: Vec<BranchFlow> = (0..self.network.branches.len())
            .map(|k| BranchFlow {
                p_from: outcome.value(self.p_from[k]),
                q_from: outcome.value(self.q_from[k]),
                p_to: outcome.value(self.p_to[k]),
                q_to: outcome.value(self.q_to[k]),
            })
            .collect();

        // Uniform price from the first generator strictly inside its active
        // power box; on a fully-binding dispatch fall back to the most
        // expensive unit actually producing. Bus-level prices would need
        // the balance duals.
        let mut system_lmp = None;
        for (g, gen) in self.network.generators.iter().enumerate() {
            let p = generator_p[g];
            let at_min = (p - gen.pmin).abs() < LMP_LIMIT_MARGIN;
            let at_max = gen.pmax.is_finite() && (gen.pmax - p).abs() < LMP_LIMIT_MARGIN;
            if !at_min && !at_max {
                system_lmp = Some(gen.cost.marginal(p));
                break;
            }
        }
        let system_lmp = system_lmp.unwrap_or_else(|| {
            self.network
                .generators
                .iter()
                .zip(&generator_p)
                .filter(|(_, &p)| p > LMP_LIMIT_MARGIN)
                .map(|(gen, &p)| gen.cost.marginal(p))
                .fold(0.0, f64::max)
        });

        OpfSolution {
            status: outcome.status,
            objective_value: self.model.objective_value(&outcome.values),
            generator_p,
            generator_q,
            bus_voltage_mag,
            bus_voltage_ang,
            branch_flows,
            bus_lmp: vec![system_lmp; self.network.buses.len()],
            iterations: outcome.iterations,
            solve_time_ms: outcome.solve_time_ms,
            max_violation: outcome.max_violation,
        }
    }
}

/// Build and solve the AC-OPF for a network in one call.
pub fn solve_ac_opf(network: &Network, config: &SolverConfig) -> OpfResult<OpfSolution> {
    AcOpfProblem::build(network)?.solve(config)
}
