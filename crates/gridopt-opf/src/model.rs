//! Declarative optimization model.
//!
//! The network formulation layer describes what it wants solved: bounded
//! variables, linear range constraints, quadratic equalities and
//! inequalities, nonlinear residual blocks bound to registered functions,
//! and a quadratic objective. Solver backends consume the model through the
//! evaluation methods ([`Model::objective_value`],
//! [`Model::equality_residuals`], [`Model::inequality_violations`]) without
//! knowing anything about power systems.
//!
//! Nonlinear structure follows a register-once, bind-many pattern: a residual
//! function is registered a single time with its arity, then bound per
//! instance with a concrete variable list and parameter vector. Arity
//! mismatches are rejected at binding time, not at evaluation time.

use crate::{OpfError, OpfResult};

/// Index of a decision variable within a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Handle to a registered nonlinear residual function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlFunctionId(usize);

/// A vector-valued residual: `f(vars, params, out)` writes `out.len()`
/// residuals that the solver drives to zero.
pub type NlResidualFn = fn(&[f64], &[f64], &mut [f64]);

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    lower: f64,
    upper: f64,
    initial: f64,
}

struct NlFunction {
    name: String,
    func: NlResidualFn,
    n_vars: usize,
    n_params: usize,
    n_residuals: usize,
}

struct NlBinding {
    function: usize,
    vars: Vec<VarId>,
    params: Vec<f64>,
}

/// Affine expression `sum(c_k * x_k) + constant`.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, var: VarId, coeff: f64) {
        self.terms.push((var, coeff));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn evaluate(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * x[var.value()])
            .sum::<f64>()
            + self.constant
    }

    /// Accumulate `scale * d(expr)/dx` into `grad`.
    pub fn add_gradient(&self, scale: f64, grad: &mut [f64]) {
        for (var, coeff) in &self.terms {
            grad[var.value()] += scale * coeff;
        }
    }
}

/// Quadratic expression `sum(c_k * x_a * x_b) + linear part`.
#[derive(Debug, Clone, Default)]
pub struct QuadExpr {
    pub quad: Vec<(VarId, VarId, f64)>,
    pub linear: LinExpr,
}

impl QuadExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_quad_term(&mut self, a: VarId, b: VarId, coeff: f64) {
        self.quad.push((a, b, coeff));
    }

    pub fn add_linear_term(&mut self, var: VarId, coeff: f64) {
        self.linear.add_term(var, coeff);
    }

    pub fn add_constant(&mut self, value: f64) {
        self.linear.add_constant(value);
    }

    pub fn evaluate(&self, x: &[f64]) -> f64 {
        self.quad
            .iter()
            .map(|(a, b, coeff)| coeff * x[a.value()] * x[b.value()])
            .sum::<f64>()
            + self.linear.evaluate(x)
    }

    /// Accumulate `scale * d(expr)/dx` at `x` into `grad`.
    pub fn add_gradient(&self, x: &[f64], scale: f64, grad: &mut [f64]) {
        for (a, b, coeff) in &self.quad {
            grad[a.value()] += scale * coeff * x[b.value()];
            grad[b.value()] += scale * coeff * x[a.value()];
        }
        self.linear.add_gradient(scale, grad);
    }
}

struct LinearConstraint {
    expr: LinExpr,
    lower: f64,
    upper: f64,
}

/// The assembled model: variables, constraints, objective.
#[derive(Default)]
pub struct Model {
    variables: Vec<Variable>,
    functions: Vec<NlFunction>,
    bindings: Vec<NlBinding>,
    linear: Vec<LinearConstraint>,
    quad_eq: Vec<QuadExpr>,
    quad_ineq: Vec<(QuadExpr, f64)>,
    objective: QuadExpr,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bounded decision variable.
    ///
    /// The initial value defaults to the midpoint of a finite box, otherwise
    /// to zero projected into the box. `lower > upper` is rejected.
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> OpfResult<VarId> {
        let name = name.into();
        if lower > upper {
            return Err(OpfError::InfeasibleBounds { name, lower, upper });
        }
        let initial = if lower.is_finite() && upper.is_finite() {
            0.5 * (lower + upper)
        } else {
            let mut v = 0.0;
            if v < lower {
                v = lower;
            }
            if v > upper {
                v = upper;
            }
            v
        };
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name,
            lower,
            upper,
            initial,
        });
        Ok(id)
    }

    /// Override a variable's initial value, projected into its bounds.
    pub fn set_initial(&mut self, var: VarId, value: f64) {
        let v = &mut self.variables[var.value()];
        v.initial = value.max(v.lower).min(v.upper);
    }

    /// Register a nonlinear residual function with its arity.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        func: NlResidualFn,
        n_vars: usize,
        n_params: usize,
        n_residuals: usize,
    ) -> NlFunctionId {
        let id = NlFunctionId(self.functions.len());
        self.functions.push(NlFunction {
            name: name.into(),
            func,
            n_vars,
            n_params,
            n_residuals,
        });
        id
    }

    /// Bind a registered function to concrete variables and parameters,
    /// adding its residuals as equality constraints.
    pub fn add_nl_constraint(
        &mut self,
        function: NlFunctionId,
        vars: Vec<VarId>,
        params: Vec<f64>,
    ) -> OpfResult<()> {
        let f = &self.functions[function.0];
        if vars.len() != f.n_vars {
            return Err(OpfError::FunctionArity {
                function: f.name.clone(),
                expected: f.n_vars,
                got: vars.len(),
            });
        }
        if params.len() != f.n_params {
            return Err(OpfError::FunctionArity {
                function: f.name.clone(),
                expected: f.n_params,
                got: params.len(),
            });
        }
        self.bindings.push(NlBinding {
            function: function.0,
            vars,
            params,
        });
        Ok(())
    }

    /// Add a ranged linear constraint `lower <= expr <= upper`.
    ///
    /// With `lower == upper` this is an equality and its residual joins
    /// [`Model::equality_residuals`].
    pub fn add_linear_constraint(&mut self, expr: LinExpr, lower: f64, upper: f64) -> OpfResult<()> {
        if lower > upper {
            return Err(OpfError::InfeasibleBounds {
                name: "linear constraint".into(),
                lower,
                upper,
            });
        }
        self.linear.push(LinearConstraint { expr, lower, upper });
        Ok(())
    }

    /// Add a quadratic equality `expr == 0`.
    pub fn add_quadratic_equality(&mut self, expr: QuadExpr) {
        self.quad_eq.push(expr);
    }

    /// Add a quadratic inequality `expr <= upper`.
    pub fn add_quadratic_inequality(&mut self, expr: QuadExpr, upper: f64) {
        self.quad_ineq.push((expr, upper));
    }

    /// Set the quadratic objective to minimize.
    pub fn set_objective(&mut self, expr: QuadExpr) {
        self.objective = expr;
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_name(&self, var: VarId) -> &str {
        &self.variables[var.value()].name
    }

    /// Variable box bounds as parallel lower/upper vectors.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (
            self.variables.iter().map(|v| v.lower).collect(),
            self.variables.iter().map(|v| v.upper).collect(),
        )
    }

    /// Starting point assembled from the per-variable initial values.
    pub fn initial_point(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.initial).collect()
    }

    /// Total number of equality residuals.
    pub fn num_equalities(&self) -> usize {
        let nl: usize = self
            .bindings
            .iter()
            .map(|b| self.functions[b.function].n_residuals)
            .sum();
        let linear_eq = self.linear.iter().filter(|c| c.lower == c.upper).count();
        nl + self.quad_eq.len() + linear_eq
    }

    pub fn num_inequalities(&self) -> usize {
        let linear_ranged = self.linear.iter().filter(|c| c.lower < c.upper).count();
        self.quad_ineq.len() + linear_ranged
    }

    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.objective.evaluate(x)
    }

    /// Evaluate all equality residuals at `x`.
    ///
    /// Order: nonlinear bindings in insertion order, then quadratic
    /// equalities, then linear equalities.
    pub fn equality_residuals(&self, x: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.num_equalities());
        let mut scratch_vars = Vec::new();
        let mut scratch_out = Vec::new();
        for binding in &self.bindings {
            let f = &self.functions[binding.function];
            scratch_vars.clear();
            scratch_vars.extend(binding.vars.iter().map(|v| x[v.value()]));
            scratch_out.clear();
            scratch_out.resize(f.n_residuals, 0.0);
            (f.func)(&scratch_vars, &binding.params, &mut scratch_out);
            out.extend_from_slice(&scratch_out);
        }
        for expr in &self.quad_eq {
            out.push(expr.evaluate(x));
        }
        for c in &self.linear {
            if c.lower == c.upper {
                out.push(c.expr.evaluate(x) - c.lower);
            }
        }
        out
    }

    /// Evaluate all inequality violations at `x` (zero when satisfied).
    ///
    /// Order: quadratic inequalities, then ranged linear constraints.
    pub fn inequality_violations(&self, x: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.num_inequalities());
        for (expr, upper) in &self.quad_ineq {
            out.push((expr.evaluate(x) - upper).max(0.0));
        }
        for c in &self.linear {
            if c.lower < c.upper {
                let v = c.expr.evaluate(x);
                out.push((c.lower - v).max(0.0).max(v - c.upper));
            }
        }
        out
    }

    /// Violation of the variable box bounds at `x` (zero when inside).
    pub fn bound_violations(&self, x: &[f64]) -> Vec<f64> {
        self.variables
            .iter()
            .zip(x)
            .map(|(v, &xi)| (v.lower - xi).max(0.0).max(xi - v.upper))
            .collect()
    }

    /// Scale that normalizes the objective coefficients to order one.
    ///
    /// Cost curves in $/hr per pu carry coefficients in the thousands, which
    /// would otherwise dwarf the residual terms of a penalty merit function
    /// until the penalty weight explodes.
    pub fn objective_scale(&self) -> f64 {
        let largest = self
            .objective
            .quad
            .iter()
            .map(|(_, _, c)| c.abs())
            .chain(self.objective.linear.terms.iter().map(|(_, c)| c.abs()))
            .fold(0.0, f64::max);
        if largest > 1.0 {
            1.0 / largest
        } else {
            1.0
        }
    }

    /// Quadratic-penalty merit function
    /// `obj_scale * f(x) + penalty * (sum g^2 + sum max(0, h)^2 + sum bound_violation^2)`.
    pub fn merit_value(&self, x: &[f64], obj_scale: f64, penalty: f64) -> f64 {
        let mut merit = obj_scale * self.objective_value(x);
        for g in self.equality_residuals(x) {
            merit += penalty * g * g;
        }
        for h in self.inequality_violations(x) {
            merit += penalty * h * h;
        }
        for bv in self.bound_violations(x) {
            merit += penalty * bv * bv;
        }
        merit
    }

    /// Gradient of [`Model::merit_value`].
    ///
    /// All algebraic parts (objective, quadratic and linear constraints,
    /// bound penalties) are differentiated in closed form. Each nonlinear
    /// binding contributes `2 * penalty * sum_r g_r * dg_r/dx` with the
    /// residual derivatives taken by forward differences restricted to the
    /// binding's own variables; differencing the residuals before squaring
    /// keeps the penalty weight from amplifying the difference noise.
    pub fn merit_gradient(&self, x: &[f64], obj_scale: f64, penalty: f64) -> Vec<f64> {
        let mut grad = vec![0.0; x.len()];

        self.objective.add_gradient(x, obj_scale, &mut grad);

        let eps = 1e-7;
        let mut local = Vec::new();
        let mut r0 = Vec::new();
        let mut r1 = Vec::new();
        for binding in &self.bindings {
            let f = &self.functions[binding.function];
            local.clear();
            local.extend(binding.vars.iter().map(|v| x[v.value()]));
            r0.clear();
            r0.resize(f.n_residuals, 0.0);
            (f.func)(&local, &binding.params, &mut r0);
            r1.resize(f.n_residuals, 0.0);
            for (slot, var) in binding.vars.iter().enumerate() {
                let saved = local[slot];
                local[slot] = saved + eps;
                r1.iter_mut().for_each(|v| *v = 0.0);
                (f.func)(&local, &binding.params, &mut r1);
                local[slot] = saved;
                let mut chain = 0.0;
                for r in 0..f.n_residuals {
                    chain += r0[r] * (r1[r] - r0[r]) / eps;
                }
                grad[var.value()] += 2.0 * penalty * chain;
            }
        }

        for expr in &self.quad_eq {
            let g = expr.evaluate(x);
            if g != 0.0 {
                expr.add_gradient(x, 2.0 * penalty * g, &mut grad);
            }
        }
        for (expr, upper) in &self.quad_ineq {
            let viol = expr.evaluate(x) - upper;
            if viol > 0.0 {
                expr.add_gradient(x, 2.0 * penalty * viol, &mut grad);
            }
        }
        for c in &self.linear {
            let value = c.expr.evaluate(x);
            if c.lower == c.upper {
                c.expr.add_gradient(2.0 * penalty * (value - c.lower), &mut grad);
            } else if value > c.upper {
                c.expr.add_gradient(2.0 * penalty * (value - c.upper), &mut grad);
            } else if value < c.lower {
                c.expr.add_gradient(2.0 * penalty * (value - c.lower), &mut grad);
            }
        }
        for (i, v) in self.variables.iter().enumerate() {
            if x[i] < v.lower {
                grad[i] -= 2.0 * penalty * (v.lower - x[i]);
            }
            if x[i] > v.upper {
                grad[i] += 2.0 * penalty * (x[i] - v.upper);
            }
        }

        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_residual(vars: &[f64], params: &[f64], out: &mut [f64]) {
        out[0] = vars[0] + vars[1] - params[0];
    }

    #[test]
    fn test_variable_defaults() {
        let mut model = Model::new();
        let a = model.add_variable("a", 1.0, 3.0).unwrap();
        let b = model.add_variable("b", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        let c = model.add_variable("c", 2.0, f64::INFINITY).unwrap();
        let x = model.initial_point();
        assert_eq!(x[a.value()], 2.0);
        assert_eq!(x[b.value()], 0.0);
        assert_eq!(x[c.value()], 2.0);
        assert_eq!(model.variable_name(a), "a");
    }

    #[test]
    fn test_infeasible_variable_bounds() {
        let mut model = Model::new();
        let err = model.add_variable("bad", 1.0, -1.0).unwrap_err();
        assert!(matches!(err, OpfError::InfeasibleBounds { .. }));
    }

    #[test]
    fn test_set_initial_is_projected() {
        let mut model = Model::new();
        let a = model.add_variable("a", 0.0, 1.0).unwrap();
        model.set_initial(a, 5.0);
        assert_eq!(model.initial_point()[0], 1.0);
    }

    #[test]
    fn test_nl_binding_arity_check() {
        let mut model = Model::new();
        let a = model.add_variable("a", 0.0, 1.0).unwrap();
        let f = model.register_function("sum", sum_residual, 2, 1, 1);
        let err = model.add_nl_constraint(f, vec![a], vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            OpfError::FunctionArity {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_equality_residual_ordering() {
        let mut model = Model::new();
        let a = model.add_variable("a", -10.0, 10.0).unwrap();
        let b = model.add_variable("b", -10.0, 10.0).unwrap();
        let f = model.register_function("sum", sum_residual, 2, 1, 1);
        model.add_nl_constraint(f, vec![a, b], vec![3.0]).unwrap();

        let mut quad = QuadExpr::new();
        quad.add_quad_term(a, a, 1.0);
        quad.add_constant(-4.0);
        model.add_quadratic_equality(quad);

        let mut lin = LinExpr::new();
        lin.add_term(b, 1.0);
        model.add_linear_constraint(lin, 1.0, 1.0).unwrap();

        let x = vec![2.0, 1.0];
        let residuals = model.equality_residuals(&x);
        assert_eq!(residuals.len(), 3);
        assert!((residuals[0] - 0.0).abs() < 1e-12); // 2 + 1 - 3
        assert!((residuals[1] - 0.0).abs() < 1e-12); // 2^2 - 4
        assert!((residuals[2] - 0.0).abs() < 1e-12); // 1 - 1
        assert_eq!(model.num_equalities(), 3);
    }

    #[test]
    fn test_inequality_violations() {
        let mut model = Model::new();
        let a = model.add_variable("a", -10.0, 10.0).unwrap();

        let mut quad = QuadExpr::new();
        quad.add_quad_term(a, a, 1.0);
        model.add_quadratic_inequality(quad, 4.0);

        let mut lin = LinExpr::new();
        lin.add_term(a, 1.0);
        model.add_linear_constraint(lin, -1.0, 1.0).unwrap();

        let inside = model.inequality_violations(&[1.0]);
        assert!(inside.iter().all(|&v| v == 0.0));

        let outside = model.inequality_violations(&[3.0]);
        assert!((outside[0] - 5.0).abs() < 1e-12); // 9 - 4
        assert!((outside[1] - 2.0).abs() < 1e-12); // 3 - 1
    }

    fn product_residual(vars: &[f64], params: &[f64], out: &mut [f64]) {
        out[0] = vars[0] * vars[1] - params[0];
        out[1] = vars[0] * vars[0] - vars[1];
    }

    fn merit_test_model() -> (Model, Vec<f64>) {
        let mut model = Model::new();
        let a = model.add_variable("a", -5.0, 5.0).unwrap();
        let b = model.add_variable("b", 0.0, 1.5).unwrap();
        let c = model.add_variable("c", -5.0, 5.0).unwrap();

        let mut obj = QuadExpr::new();
        obj.add_quad_term(a, a, 2.0);
        obj.add_linear_term(b, 3000.0);
        model.set_objective(obj);

        let f = model.register_function("product", product_residual, 2, 1, 2);
        model.add_nl_constraint(f, vec![a, b], vec![2.0]).unwrap();

        let mut eq = QuadExpr::new();
        eq.add_quad_term(a, c, 1.0);
        eq.add_constant(-1.0);
        model.add_quadratic_equality(eq);

        let mut ineq = QuadExpr::new();
        ineq.add_quad_term(c, c, 1.0);
        model.add_quadratic_inequality(ineq, 1.0);

        let mut lin = LinExpr::new();
        lin.add_term(a, 1.0);
        lin.add_term(c, -2.0);
        model.add_linear_constraint(lin, -0.5, 0.5).unwrap();

        // a inside bounds, b above its box, the inequality and the ranged
        // linear row both active, every residual nonzero.
        let x = vec![1.3, 1.7, -1.4];
        (model, x)
    }

    #[test]
    fn test_merit_gradient_matches_finite_differences() {
        let (model, x) = merit_test_model();
        let (obj_scale, penalty) = (model.objective_scale(), 37.0);
        let grad = model.merit_gradient(&x, obj_scale, penalty);

        let h = 1e-6;
        for i in 0..x.len() {
            let mut x_plus = x.clone();
            let mut x_minus = x.clone();
            x_plus[i] += h;
            x_minus[i] -= h;
            let fd = (model.merit_value(&x_plus, obj_scale, penalty)
                - model.merit_value(&x_minus, obj_scale, penalty))
                / (2.0 * h);
            assert!(
                (grad[i] - fd).abs() < 1e-3 * (1.0 + fd.abs()),
                "component {}: analytic {} vs fd {}",
                i,
                grad[i],
                fd
            );
        }
    }

    #[test]
    fn test_merit_value_composition() {
        let (model, x) = merit_test_model();
        let merit = model.merit_value(&x, 1.0, 10.0);
        let mut expected = model.objective_value(&x);
        for g in model.equality_residuals(&x) {
            expected += 10.0 * g * g;
        }
        for v in model.inequality_violations(&x) {
            expected += 10.0 * v * v;
        }
        for bv in model.bound_violations(&x) {
            expected += 10.0 * bv * bv;
        }
        assert!((merit - expected).abs() < 1e-12);
    }

    #[test]
    fn test_objective_scale_normalizes_large_coefficients() {
        let (model, _) = merit_test_model();
        assert!((model.objective_scale() - 1.0 / 3000.0).abs() < 1e-15);

        let mut small = Model::new();
        let a = small.add_variable("a", 0.0, 1.0).unwrap();
        let mut obj = QuadExpr::new();
        obj.add_linear_term(a, 0.5);
        small.set_objective(obj);
        assert_eq!(small.objective_scale(), 1.0);
    }

    #[test]
    fn test_objective_and_bound_violations() {
        let mut model = Model::new();
        let a = model.add_variable("a", 0.0, 2.0).unwrap();
        let mut obj = QuadExpr::new();
        obj.add_quad_term(a, a, 2.0);
        obj.add_linear_term(a, 1.0);
        obj.add_constant(3.0);
        model.set_objective(obj);

        assert!((model.objective_value(&[2.0]) - 13.0).abs() < 1e-12);
        let bv = model.bound_violations(&[-0.5]);
        assert!((bv[0] - 0.5).abs() < 1e-12);
    }
}
