//! Bundled benchmark networks.
//!
//! Small cases used by the integration tests and documentation examples.

use gridopt_core::{Branch, BranchId, Bus, BusId, CostCurve, Degrees, Gen, GenId, Network};

/// The classic PJM 5-bus case in per-unit on a 100 MVA base.
///
/// Five buses, six branches, five linear-cost generators, 10 pu of load,
/// slack at bus 3. Branch 3-4 carries the binding 2.4 pu thermal limit.
pub fn case5() -> Network {
    let mut network = Network::new(BusId::new(3));

    // (Pd, Qd, Vmin, Vmax)
    let bus_data = [
        (0.0, 0.0),
        (3.0, 0.9861),
        (3.0, 0.9861),
        (4.0, 1.3147),
        (0.0, 0.0),
    ];
    for (i, (pd, qd)) in bus_data.into_iter().enumerate() {
        network.buses.push(
            Bus::new(BusId::new(i))
                .with_load(pd, qd)
                .with_v_limits(0.9, 1.1),
        );
    }

    // (from, to, R, X, B, Smax)
    let branch_data = [
        (0, 1, 0.00281, 0.0281, 0.00712, 4.00),
        (0, 3, 0.00304, 0.0304, 0.00658, 4.26),
        (0, 4, 0.00064, 0.0064, 0.03126, 4.26),
        (1, 2, 0.00108, 0.0108, 0.01852, 4.26),
        (2, 3, 0.00297, 0.0297, 0.00674, 4.26),
        (3, 4, 0.00297, 0.0297, 0.00674, 2.40),
    ];
    for (k, (from, to, r, x, b, s_max)) in branch_data.into_iter().enumerate() {
        network.branches.push(
            Branch::new(BranchId::new(k), BusId::new(from), BusId::new(to), r, x)
                .with_charging(b)
                .with_angle_limits(Degrees::new(-30.0), Degrees::new(30.0))
                .with_s_max(s_max),
        );
    }

    // (bus, Pmax, Qmin, Qmax, linear cost $/hr per pu)
    let gen_data = [
        (0, 0.4, -0.300, 0.300, 1400.0),
        (0, 1.7, -1.275, 1.275, 1500.0),
        (2, 5.2, -3.900, 3.900, 3000.0),
        (3, 2.0, -1.500, 1.500, 4000.0),
        (4, 6.0, -4.500, 4.500, 1000.0),
    ];
    for (g, (bus, pmax, qmin, qmax, b)) in gen_data.into_iter().enumerate() {
        network.generators.push(
            Gen::new(GenId::new(g), BusId::new(bus))
                .with_p_limits(0.0, pmax)
                .with_q_limits(qmin, qmax)
                .with_cost(CostCurve::linear(b, 0.0)),
        );
    }

    network
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridopt_core::Diagnostics;

    #[test]
    fn test_case5_is_valid() {
        let network = case5();
        network.validate().unwrap();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_case5_shape() {
        let stats = case5().stats();
        assert_eq!(stats.num_buses, 5);
        assert_eq!(stats.num_branches, 6);
        assert_eq!(stats.num_gens, 5);
        assert!((stats.total_load_p - 10.0).abs() < 1e-9);
        assert!((stats.total_gen_capacity - 15.3).abs() < 1e-9);
    }
}
