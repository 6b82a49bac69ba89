//! End-to-end solve of the PJM 5-bus case.

use gridopt_opf::test_cases::case5;
use gridopt_opf::{solve_ac_opf, SolverConfig};

fn config() -> SolverConfig {
    SolverConfig {
        max_iterations: 3000,
        ..SolverConfig::default()
    }
}

#[test]
fn test_case5_converges() {
    let solution = solve_ac_opf(&case5(), &config()).unwrap();
    assert!(
        solution.status.is_optimal(),
        "status {} with violation {}",
        solution.status,
        solution.max_violation
    );
    assert!(solution.max_violation < 1e-3);
    assert!(solution.iterations > 0);
}

#[test]
fn test_case5_respects_limits() {
    let network = case5();
    let solution = solve_ac_opf(&network, &config()).unwrap();

    // Box limits hold exactly after the final projection.
    for (g, gen) in network.generators.iter().enumerate() {
        assert!(solution.generator_p[g] >= gen.pmin && solution.generator_p[g] <= gen.pmax);
        assert!(solution.generator_q[g] >= gen.qmin && solution.generator_q[g] <= gen.qmax);
    }
    for (i, bus) in network.buses.iter().enumerate() {
        assert!(solution.bus_voltage_mag[i] >= bus.v_min);
        assert!(solution.bus_voltage_mag[i] <= bus.v_max);
    }

    // The slack angle is pinned, not merely near zero.
    assert_eq!(solution.bus_voltage_ang[network.slack.value()], 0.0);

    // Thermal limits within the solver's feasibility slack.
    for (k, branch) in network.branches.iter().enumerate() {
        let flow = &solution.branch_flows[k];
        assert!(
            flow.s_from() <= branch.s_max + 1e-2,
            "branch {} from-side {} exceeds {}",
            k,
            flow.s_from(),
            branch.s_max
        );
        assert!(flow.s_to() <= branch.s_max + 1e-2);
    }
}

#[test]
fn test_case5_covers_load_plus_losses() {
    let network = case5();
    let solution = solve_ac_opf(&network, &config()).unwrap();
    assert!(solution.status.is_optimal());

    let total_gen: f64 = solution.generator_p.iter().sum();
    let total_load: f64 = network.buses.iter().map(|b| b.p_load).sum();
    // Resistive branches dissipate, so generation strictly covers load.
    assert!(total_gen > total_load - 1e-2);
    assert!(total_gen < total_load + 0.5);

    // Cost is consistent with the dispatch and the cost curves.
    let recomputed: f64 = network
        .generators
        .iter()
        .zip(&solution.generator_p)
        .map(|(gen, &p)| gen.cost.evaluate(p))
        .sum();
    assert!((solution.objective_value - recomputed).abs() < 1e-6);
    assert!(solution.objective_value > 0.0);
}

#[test]
fn test_solve_is_deterministic() {
    let network = case5();
    let first = solve_ac_opf(&network, &config()).unwrap();
    let second = solve_ac_opf(&network, &config()).unwrap();
    assert_eq!(first.status, second.status);
    assert!((first.objective_value - second.objective_value).abs() < 1e-9);
    for (a, b) in first.generator_p.iter().zip(&second.generator_p) {
        assert!((a - b).abs() < 1e-9);
    }
    for (a, b) in first.bus_voltage_mag.iter().zip(&second.bus_voltage_mag) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_case5_lmp_reported() {
    let solution = solve_ac_opf(&case5(), &config()).unwrap();
    assert_eq!(solution.bus_lmp.len(), 5);
    // Every generator prices between the cheapest and the dearest offer.
    let lmp = solution.bus_lmp[0];
    assert!(lmp >= 0.0 && lmp <= 4000.0, "lmp {}", lmp);
}
