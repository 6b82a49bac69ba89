//! # gridopt-core: Power Network Modeling Core
//!
//! Fundamental data structures for per-unit steady-state network models used
//! by optimal power flow.
//!
//! ## Design Philosophy
//!
//! A [`Network`] is a flat, densely-indexed container:
//! - `buses[i]` holds the bus with `BusId(i)`
//! - `branches[k]` holds the branch with `BranchId(k)`
//! - `generators[g]` holds the generator with `GenId(g)`
//!
//! Dense indexing keeps the mapping between network elements and optimization
//! variables trivial, which matters when a formulation layer needs to address
//! "voltage magnitude of bus i" without a lookup table. [`Network::validate`]
//! enforces the index invariants before any formulation work begins.
//!
//! All electrical quantities are in per-unit on a common system base; the only
//! non-per-unit inputs are angle limits, carried as [`Degrees`] and converted
//! at the point of use.
//!
//! ## Quick Start
//!
//! ```rust
//! use gridopt_core::*;
//!
//! let mut network = Network::new(BusId::new(0));
//! network.buses.push(Bus::new(BusId::new(0)));
//! network.buses.push(Bus::new(BusId::new(1)).with_load(0.5, 0.1));
//! network.branches.push(
//!     Branch::new(BranchId::new(0), BusId::new(0), BusId::new(1), 0.01, 0.1)
//!         .with_angle_limits(Degrees::new(-30.0), Degrees::new(30.0)),
//! );
//! network.generators.push(
//!     Gen::new(GenId::new(0), BusId::new(0))
//!         .with_p_limits(0.0, 1.0)
//!         .with_cost(CostCurve::quadratic(0.0, 14.0, 0.0)),
//! );
//! network.validate().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`topology`] - Connectivity and island detection
//! - [`units`] - Angle newtypes (degrees/radians)

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod topology;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{NetResult, NetworkError};
pub use topology::{bus_graph, is_connected, island_count};
pub use units::{Degrees, Radians};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl BranchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BranchId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl GenId {
    #[inline]
    pub fn new(value: usize) -> Self {
        GenId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// A bus with its aggregated load, shunt, and voltage band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    /// Active power demand (per-unit)
    pub p_load: f64,
    /// Reactive power demand (per-unit)
    pub q_load: f64,
    /// Shunt conductance to ground (per-unit)
    pub gs: f64,
    /// Shunt susceptance to ground (per-unit, positive = capacitive)
    pub bs: f64,
    /// Minimum voltage magnitude (per-unit)
    pub v_min: f64,
    /// Maximum voltage magnitude (per-unit)
    pub v_max: f64,
}

impl Bus {
    /// Create a bus with no load or shunt and the conventional 0.9..1.1 pu
    /// voltage band.
    pub fn new(id: BusId) -> Self {
        Self {
            id,
            p_load: 0.0,
            q_load: 0.0,
            gs: 0.0,
            bs: 0.0,
            v_min: 0.9,
            v_max: 1.1,
        }
    }

    /// Set active and reactive demand (per-unit).
    pub fn with_load(mut self, p_load: f64, q_load: f64) -> Self {
        self.p_load = p_load;
        self.q_load = q_load;
        self
    }

    /// Set shunt conductance and susceptance (per-unit).
    pub fn with_shunt(mut self, gs: f64, bs: f64) -> Self {
        self.gs = gs;
        self.bs = bs;
        self
    }

    /// Set the voltage magnitude band (per-unit).
    pub fn with_v_limits(mut self, v_min: f64, v_max: f64) -> Self {
        self.v_min = v_min;
        self.v_max = v_max;
        self
    }
}

/// A transmission branch with series impedance and total line charging.
///
/// The charging susceptance `charging_b` is the whole-line value; the pi
/// model splits it half/half between the two terminals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (per-unit)
    pub resistance: f64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    /// Total line charging susceptance (per-unit, split half/half)
    pub charging_b: f64,
    /// Minimum angle difference across the branch
    pub angle_min: Degrees,
    /// Maximum angle difference across the branch
    pub angle_max: Degrees,
    /// Apparent power limit per terminal (per-unit, infinite = unlimited)
    pub s_max: f64,
}

impl Branch {
    pub fn new(id: BranchId, from_bus: BusId, to_bus: BusId, resistance: f64, reactance: f64) -> Self {
        Self {
            id,
            from_bus,
            to_bus,
            resistance,
            reactance,
            charging_b: 0.0,
            angle_min: Degrees::new(-360.0),
            angle_max: Degrees::new(360.0),
            s_max: f64::INFINITY,
        }
    }

    /// Set total line charging susceptance (per-unit).
    pub fn with_charging(mut self, charging_b: f64) -> Self {
        self.charging_b = charging_b;
        self
    }

    /// Set the angle difference limits.
    pub fn with_angle_limits(mut self, angle_min: Degrees, angle_max: Degrees) -> Self {
        self.angle_min = angle_min;
        self.angle_max = angle_max;
        self
    }

    /// Set the symmetric apparent power limit (per-unit).
    pub fn with_s_max(mut self, s_max: f64) -> Self {
        self.s_max = s_max;
        self
    }

    /// True when the branch carries a finite thermal limit.
    pub fn has_thermal_limit(&self) -> bool {
        self.s_max.is_finite()
    }
}

/// Quadratic production cost `a*P^2 + b*P + c` in $/hr with P in per-unit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostCurve {
    /// Quadratic coefficient ($/hr per pu^2)
    pub quadratic: f64,
    /// Linear coefficient ($/hr per pu)
    pub linear: f64,
    /// Constant term ($/hr)
    pub constant: f64,
}

impl CostCurve {
    /// Quadratic cost: `a*P^2 + b*P + c`.
    pub fn quadratic(a: f64, b: f64, c: f64) -> Self {
        Self {
            quadratic: a,
            linear: b,
            constant: c,
        }
    }

    /// Linear cost: `b*P + c`.
    pub fn linear(b: f64, c: f64) -> Self {
        Self {
            quadratic: 0.0,
            linear: b,
            constant: c,
        }
    }

    /// Evaluate cost at output `p` ($/hr).
    pub fn evaluate(&self, p: f64) -> f64 {
        self.quadratic * p * p + self.linear * p + self.constant
    }

    /// Marginal cost at output `p` (derivative, $/hr per pu).
    pub fn marginal(&self, p: f64) -> f64 {
        2.0 * self.quadratic * p + self.linear
    }
}

/// A dispatchable generator with box limits and a production cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gen {
    pub id: GenId,
    pub bus: BusId,
    /// Minimum active power output (per-unit)
    pub pmin: f64,
    /// Maximum active power output (per-unit)
    pub pmax: f64,
    /// Minimum reactive power output (per-unit)
    pub qmin: f64,
    /// Maximum reactive power output (per-unit)
    pub qmax: f64,
    /// Production cost curve
    pub cost: CostCurve,
}

impl Gen {
    /// Create a generator with unbounded output and zero cost.
    pub fn new(id: GenId, bus: BusId) -> Self {
        Self {
            id,
            bus,
            pmin: 0.0,
            pmax: f64::INFINITY,
            qmin: f64::NEG_INFINITY,
            qmax: f64::INFINITY,
            cost: CostCurve::default(),
        }
    }

    /// Set active power limits (per-unit).
    pub fn with_p_limits(mut self, pmin: f64, pmax: f64) -> Self {
        self.pmin = pmin;
        self.pmax = pmax;
        self
    }

    /// Set reactive power limits (per-unit).
    pub fn with_q_limits(mut self, qmin: f64, qmax: f64) -> Self {
        self.qmin = qmin;
        self.qmax = qmax;
        self
    }

    /// Set the cost curve.
    pub fn with_cost(mut self, cost: CostCurve) -> Self {
        self.cost = cost;
        self
    }
}

/// The densely-indexed network container.
///
/// Invariant after [`Network::validate`]: `buses[i].id == BusId(i)` and
/// likewise for branches and generators, branch endpoints and generator
/// buses are in range, and `slack` names an existing bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub buses: Vec<Bus>,
    pub branches: Vec<Branch>,
    pub generators: Vec<Gen>,
    /// Angle reference bus
    pub slack: BusId,
}

impl Network {
    pub fn new(slack: BusId) -> Self {
        Self {
            buses: Vec::new(),
            branches: Vec::new(),
            generators: Vec::new(),
            slack,
        }
    }

    /// Check the index integrity invariants.
    ///
    /// Fails on the structural problems that would make formulation indexing
    /// silently wrong: out-of-order ids, dangling endpoints, a slack bus that
    /// does not exist, or an empty bus set.
    pub fn validate(&self) -> NetResult<()> {
        if self.buses.is_empty() {
            return Err(NetworkError::Validation("network has no buses".into()));
        }
        let n = self.buses.len();
        for (i, bus) in self.buses.iter().enumerate() {
            if bus.id.value() != i {
                return Err(NetworkError::Index(format!(
                    "bus at position {} carries id {}",
                    i,
                    bus.id.value()
                )));
            }
        }
        for (k, branch) in self.branches.iter().enumerate() {
            if branch.id.value() != k {
                return Err(NetworkError::Index(format!(
                    "branch at position {} carries id {}",
                    k,
                    branch.id.value()
                )));
            }
            if branch.from_bus.value() >= n || branch.to_bus.value() >= n {
                return Err(NetworkError::Index(format!(
                    "branch {} references nonexistent bus {}..{}",
                    k,
                    branch.from_bus.value(),
                    branch.to_bus.value()
                )));
            }
        }
        for (g, gen) in self.generators.iter().enumerate() {
            if gen.id.value() != g {
                return Err(NetworkError::Index(format!(
                    "generator at position {} carries id {}",
                    g,
                    gen.id.value()
                )));
            }
            if gen.bus.value() >= n {
                return Err(NetworkError::Index(format!(
                    "generator {} references nonexistent bus {}",
                    g,
                    gen.bus.value()
                )));
            }
        }
        if self.slack.value() >= n {
            return Err(NetworkError::Validation(format!(
                "slack bus {} does not exist",
                self.slack.value()
            )));
        }
        Ok(())
    }

    /// Soft checks for conditions that usually signal bad input data.
    ///
    /// Populates the provided `Diagnostics` with any warnings/errors found.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if let Err(e) = self.validate() {
            diag.add_error("structure", &e.to_string());
            return;
        }

        let stats = self.stats();
        if stats.num_gens == 0 {
            diag.add_error("structure", "network has no generators");
        }
        if stats.total_load_p.abs() < 1e-9 {
            diag.add_warning("structure", "network has no active power load");
        }
        if stats.num_branches == 0 && stats.num_buses > 1 {
            diag.add_error("structure", "network has multiple buses but no branches");
        }

        let islands = island_count(self);
        if islands > 1 {
            diag.add_warning(
                "topology",
                &format!("network splits into {} electrical islands", islands),
            );
        }

        if stats.total_gen_capacity < stats.total_load_p {
            diag.add_warning(
                "capacity",
                &format!(
                    "total generation capacity ({:.3} pu) is less than total load ({:.3} pu)",
                    stats.total_gen_capacity, stats.total_load_p
                ),
            );
        }
    }

    /// Compute basic statistics about the network.
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            num_buses: self.buses.len(),
            num_branches: self.branches.len(),
            num_gens: self.generators.len(),
            ..NetworkStats::default()
        };
        for bus in &self.buses {
            stats.total_load_p += bus.p_load;
            stats.total_load_q += bus.q_load;
        }
        for gen in &self.generators {
            if gen.pmax.is_finite() {
                stats.total_gen_capacity += gen.pmax;
            }
        }
        stats
    }

    /// Generators connected to a specific bus.
    pub fn generators_at_bus(&self, bus: BusId) -> impl Iterator<Item = &Gen> {
        self.generators.iter().filter(move |g| g.bus == bus)
    }
}

/// Statistics about a network's size and loading
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_gens: usize,
    pub total_load_p: f64,
    pub total_load_q: f64,
    pub total_gen_capacity: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} branches, {} gens ({:.3} pu capacity), {:.3} pu load",
            self.num_buses,
            self.num_branches,
            self.num_gens,
            self.total_gen_capacity,
            self.total_load_p
        )
    }
}
