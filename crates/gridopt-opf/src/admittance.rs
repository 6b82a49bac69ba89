//! Branch admittance derivation.
//!
//! Converts the series impedance `r + jx` of each branch into the series
//! admittance `g + jb` used by the flow equations, plus the per-terminal
//! half of the line charging susceptance.

use gridopt_core::Branch;
use num_complex::Complex64;

use crate::{OpfError, OpfResult};

/// Per-branch electrical parameters in admittance form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchAdmittance {
    /// Series conductance, `r / (r^2 + x^2)`
    pub g: f64,
    /// Series susceptance, `-x / (r^2 + x^2)`
    pub b: f64,
    /// Charging susceptance per terminal (half the line total)
    pub bc: f64,
}

impl BranchAdmittance {
    /// Derive admittance parameters from a branch's impedance data.
    ///
    /// Fails with [`OpfError::DegenerateBranch`] when both resistance and
    /// reactance are zero, since the series admittance would be infinite.
    pub fn derive(branch: &Branch) -> OpfResult<Self> {
        let z = Complex64::new(branch.resistance, branch.reactance);
        if z.norm_sqr() == 0.0 {
            return Err(OpfError::DegenerateBranch {
                branch: branch.id.value(),
            });
        }
        let y = z.inv();
        Ok(Self {
            g: y.re,
            b: y.im,
            bc: branch.charging_b / 2.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridopt_core::{BranchId, BusId};

    fn branch(r: f64, x: f64, b: f64) -> Branch {
        Branch::new(BranchId::new(0), BusId::new(0), BusId::new(1), r, x).with_charging(b)
    }

    #[test]
    fn test_derive_matches_closed_form() {
        let adm = BranchAdmittance::derive(&branch(0.01, 0.1, 0.02)).unwrap();
        let denom = 0.01f64 * 0.01 + 0.1 * 0.1;
        assert!((adm.g - 0.01 / denom).abs() < 1e-12);
        assert!((adm.b + 0.1 / denom).abs() < 1e-12);
        assert!((adm.bc - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_pure_reactance() {
        let adm = BranchAdmittance::derive(&branch(0.0, 0.1, 0.0)).unwrap();
        assert!((adm.g).abs() < 1e-12);
        assert!((adm.b + 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_branch_rejected() {
        let err = BranchAdmittance::derive(&branch(0.0, 0.0, 0.02)).unwrap_err();
        assert!(matches!(err, OpfError::DegenerateBranch { branch: 0 }));
    }
}
