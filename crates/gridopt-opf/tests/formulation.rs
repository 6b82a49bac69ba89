//! Structural properties of the assembled OPF model, checked without
//! running the solver.

use gridopt_core::{Branch, BranchId, Bus, BusId, CostCurve, Gen, GenId, Network};
use gridopt_opf::branch_flow::terminal_flows;
use gridopt_opf::test_cases::case5;
use gridopt_opf::AcOpfProblem;

#[test]
fn test_case5_model_shape() {
    let problem = AcOpfProblem::build(&case5()).unwrap();
    let model = problem.model();
    // 5 V + 5 theta + 5 Pg + 5 Qg + 6 * 4 flows
    assert_eq!(model.num_variables(), 44);
    // 6 branches * 4 residuals + 5 buses * 2 balance rows
    assert_eq!(model.num_equalities(), 34);
    // 6 angle ranges + 6 branches * 2 thermal terminals
    assert_eq!(model.num_inequalities(), 18);
}

#[test]
fn test_energy_conservation_across_balance_rows() {
    // At any point where the flow variables equal the flows implied by the
    // voltage profile, summing the active balance residuals over all buses
    // telescopes to: losses - dispatch + load (+ shunt, zero in case5).
    let network = case5();
    let problem = AcOpfProblem::build(&network).unwrap();
    let model = problem.model();

    let mut x = model.initial_point();
    let angles = [0.0, -0.02, 0.015, 0.0, 0.04];
    let volts = [1.02, 0.99, 1.01, 1.0, 1.05];
    for (i, bus) in network.buses.iter().enumerate() {
        x[problem.voltage_var(bus.id).value()] = volts[i];
        x[problem.angle_var(bus.id).value()] = angles[i];
    }
    let dispatch = [0.2, 1.0, 2.5, 1.1, 4.0];
    for (g, gen) in network.generators.iter().enumerate() {
        x[problem.gen_p_var(gen.id).value()] = dispatch[g];
    }

    let mut total_loss = 0.0;
    for (k, branch) in network.branches.iter().enumerate() {
        let (i, j) = (branch.from_bus.value(), branch.to_bus.value());
        let (pf, qf, pt, qt) =
            terminal_flows(&problem.admittances()[k], volts[i], volts[j], angles[i], angles[j]);
        let (pf_var, qf_var, pt_var, qt_var) = problem.flow_vars(branch.id);
        x[pf_var.value()] = pf;
        x[qf_var.value()] = qf;
        x[pt_var.value()] = pt;
        x[qt_var.value()] = qt;
        total_loss += pf + pt;
    }

    let residuals = model.equality_residuals(&x);
    let n_flow_rows = 4 * network.branches.len();
    // Flow rows vanish by construction of x.
    for r in &residuals[..n_flow_rows] {
        assert!(r.abs() < 1e-12);
    }
    // Balance rows alternate P, Q per bus.
    let p_sum: f64 = (0..network.buses.len())
        .map(|i| residuals[n_flow_rows + 2 * i])
        .sum();

    let total_load: f64 = network.buses.iter().map(|b| b.p_load).sum();
    let total_dispatch: f64 = dispatch.iter().sum();
    let expected = total_loss - total_dispatch + total_load;
    assert!(
        (p_sum - expected).abs() < 1e-9,
        "sum {} vs expected {}",
        p_sum,
        expected
    );
}

#[test]
fn test_angle_constraints_in_radians() {
    let problem = AcOpfProblem::build(&case5()).unwrap();
    let model = problem.model();

    // All branches carry +-30 degree limits; an angle spread of 0.4 rad
    // (~22.9 degrees) is inside them, 0.6 rad is not.
    let mut x = model.initial_point();
    let theta1 = problem.angle_var(BusId::new(1)).value();

    x[theta1] = -0.4;
    let inside = model.inequality_violations(&x);
    assert!(inside.iter().all(|&v| v == 0.0));

    x[theta1] = -0.6;
    let outside = model.inequality_violations(&x);
    assert!(outside.iter().any(|&v| v > 0.0));
}

#[test]
fn test_parallel_branches_supported() {
    // Two branches between the same pair of buses each get their own flow
    // variables and residual block.
    let mut network = Network::new(BusId::new(0));
    network.buses.push(Bus::new(BusId::new(0)));
    network
        .buses
        .push(Bus::new(BusId::new(1)).with_load(0.5, 0.1));
    for k in 0..2 {
        network.branches.push(Branch::new(
            BranchId::new(k),
            BusId::new(0),
            BusId::new(1),
            0.01,
            0.1,
        ));
    }
    network.generators.push(
        Gen::new(GenId::new(0), BusId::new(0))
            .with_p_limits(0.0, 1.0)
            .with_cost(CostCurve::linear(10.0, 0.0)),
    );

    let problem = AcOpfProblem::build(&network).unwrap();
    assert_eq!(problem.model().num_equalities(), 2 * 4 + 2 * 2);
    let (pf0, ..) = problem.flow_vars(BranchId::new(0));
    let (pf1, ..) = problem.flow_vars(BranchId::new(1));
    assert_ne!(pf0, pf1);
}

#[test]
fn test_self_loop_branch_contributes_both_terminals() {
    // A branch from a bus to itself puts both its terminal flows into that
    // bus's balance row.
    let mut network = Network::new(BusId::new(0));
    network
        .buses
        .push(Bus::new(BusId::new(0)).with_load(0.1, 0.0));
    network.branches.push(Branch::new(
        BranchId::new(0),
        BusId::new(0),
        BusId::new(0),
        0.01,
        0.1,
    ));
    network
        .generators
        .push(Gen::new(GenId::new(0), BusId::new(0)).with_p_limits(0.0, 1.0));

    let problem = AcOpfProblem::build(&network).unwrap();
    let model = problem.model();

    let mut x = model.initial_point();
    let (pf, _, pt, _) = problem.flow_vars(BranchId::new(0));
    x[pf.value()] = 0.3;
    x[pt.value()] = 0.2;
    x[problem.gen_p_var(GenId::new(0)).value()] = 0.0;
    let residuals = model.equality_residuals(&x);
    // P row: pf + pt + load = 0.6
    let p_row = residuals[4];
    assert!((p_row - 0.6).abs() < 1e-12);
}
