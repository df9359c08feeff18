//! Solver-facing assembly
//!
//! Every query walks the constraints in the same order: bilaterals keyed on
//! body 0, bilaterals keyed on body 1, then unilaterals. Index arguments and
//! return values follow the solver's convention of passing the next free
//! slot in and getting the next free slot back.

use crate::body::ComponentId;
use crate::contact::handler::CollisionHandler;
use crate::contact::types::{ContactConstraint, ContactPoint};
use crate::error::{ContactError, Result};
use crate::mesh::geometry::{tangent_basis, tangential_component};
use crate::mesh::types::Vec3;

/// Impulse-times-friction below which no friction row is generated
const MIN_FRICTION_IMPULSE: f64 = 1e-4;

/// Tangential speed below which a bilateral has no friction direction
const MIN_SLIP_SPEED: f64 = 1e-10;

/// Per-row data handed to the solver
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstraintInfo {
    /// Gap value, non-positive
    pub dist: f64,
    pub force: f64,
    pub compliance: f64,
    pub damping: f64,
}

/// Force, compliance and damping of one contact
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceResponse {
    pub force: f64,
    pub compliance: f64,
    pub damping: f64,
}

/// Strategy computing the force response of a contact from its geometry
pub trait ContactForceBehavior: Send + Sync {
    /// Response for a contact; `base` carries the pair's compliance and
    /// damping with any per-constraint overrides applied
    fn compute_response(
        &self,
        base: ForceResponse,
        distance: f64,
        cpnt0: &ContactPoint,
        cpnt1: &ContactPoint,
        normal: &Vec3,
    ) -> ForceResponse;

    /// Whether this behavior replaces the base response, making the
    /// contact compliant
    fn overrides_response(&self) -> bool {
        true
    }
}

/// Zero force with the pair's compliance and damping
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultForceBehavior;

impl ContactForceBehavior for DefaultForceBehavior {
    fn compute_response(
        &self,
        base: ForceResponse,
        _distance: f64,
        _cpnt0: &ContactPoint,
        _cpnt1: &ContactPoint,
        _normal: &Vec3,
    ) -> ForceResponse {
        base
    }

    fn overrides_response(&self) -> bool {
        false
    }
}

impl<F> ContactForceBehavior for F
where
    F: Fn(f64, &ContactPoint, &ContactPoint, &Vec3) -> ForceResponse + Send + Sync,
{
    fn compute_response(
        &self,
        _base: ForceResponse,
        distance: f64,
        cpnt0: &ContactPoint,
        cpnt1: &ContactPoint,
        normal: &Vec3,
    ) -> ForceResponse {
        self(distance, cpnt0, cpnt1, normal)
    }
}

/// Jacobian coefficients of one constraint row for one component
///
/// Three coefficients for a point component, six (force then moment) for a
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianBlock {
    pub component: ComponentId,
    pub coeffs: Vec<f64>,
}

/// One constraint row, as blocks per component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintColumn {
    pub blocks: Vec<JacobianBlock>,
}

impl ConstraintColumn {
    /// Add a block, summing into an existing block for the same component
    pub fn add_block(&mut self, block: JacobianBlock) {
        match self
            .blocks
            .iter_mut()
            .find(|b| b.component == block.component && b.coeffs.len() == block.coeffs.len())
        {
            Some(existing) => {
                for (a, b) in existing.coeffs.iter_mut().zip(&block.coeffs) {
                    *a += b;
                }
            }
            None => self.blocks.push(block),
        }
    }

    /// Dot product with per-component velocity vectors
    pub fn dot(&self, velocity: impl Fn(ComponentId) -> Vec<f64>) -> f64 {
        self.blocks
            .iter()
            .map(|b| {
                let v = velocity(b.component);
                b.coeffs.iter().zip(&v).map(|(c, v)| c * v).sum::<f64>()
            })
            .sum()
    }
}

/// Friction constraint set for one contact
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionRow {
    /// One tangent direction for bilaterals, two for unilaterals
    pub columns: Vec<ConstraintColumn>,

    /// Friction coefficient times the contact's normal impulse magnitude
    pub max_friction: f64,

    /// Solve index of the normal constraint this row belongs to
    pub contact_index: Option<usize>,

    pub bilateral: bool,
}

/// Gap exposed to the solver for a signed distance
///
/// Zero until penetration exceeds `tol`, then the excess penetration.
pub fn penetration_gap(distance: f64, tol: f64) -> f64 {
    if distance < -tol {
        distance + tol
    } else {
        0.0
    }
}

fn constraint_info(
    cons: &ContactConstraint,
    tol: f64,
    pair: ForceResponse,
    behavior: &dyn ContactForceBehavior,
) -> ConstraintInfo {
    let base = ForceResponse {
        force: 0.0,
        compliance: cons.compliance.unwrap_or(pair.compliance),
        damping: cons.damping.unwrap_or(pair.damping),
    };
    let response = behavior.compute_response(
        base,
        cons.distance(),
        cons.point0(),
        cons.point1(),
        cons.normal(),
    );
    ConstraintInfo {
        dist: penetration_gap(cons.distance(), tol),
        force: response.force,
        compliance: response.compliance,
        damping: response.damping,
    }
}

fn check_len(what: &str, len: usize, idx: usize, count: usize) -> Result<()> {
    if idx.checked_add(count).map_or(true, |end| end > len) {
        return Err(ContactError::InvalidArgument(format!(
            "{} vector has length {}, need {} starting at {}",
            what, len, count, idx
        )));
    }
    Ok(())
}

impl CollisionHandler {
    pub fn num_bilateral_constraints(&self) -> usize {
        self.bilaterals.iter().map(|s| s.len()).sum()
    }

    pub fn num_unilateral_constraints(&self) -> usize {
        self.unilaterals.len()
    }

    /// Append the row size (always 1) of each bilateral
    pub fn bilateral_sizes(&self, sizes: &mut Vec<usize>) {
        sizes.extend(std::iter::repeat(1).take(self.num_bilateral_constraints()));
    }

    /// Append the row size (always 1) of each unilateral
    pub fn unilateral_sizes(&self, sizes: &mut Vec<usize>) {
        sizes.extend(std::iter::repeat(1).take(self.num_unilateral_constraints()));
    }

    /// Append one normal column per bilateral; returns the number added
    pub fn add_bilateral_constraints(&self, columns: &mut Vec<ConstraintColumn>) -> usize {
        let start = columns.len();
        columns.extend(self.bilateral_constraints().map(|c| c.column(c.normal())));
        columns.len() - start
    }

    /// Append one normal column per unilateral; returns the number added
    pub fn add_unilateral_constraints(&self, columns: &mut Vec<ConstraintColumn>) -> usize {
        let start = columns.len();
        columns.extend(self.unilaterals.iter().map(|c| c.column(c.normal())));
        columns.len() - start
    }

    fn pair_response(&self) -> ForceResponse {
        ForceResponse {
            force: 0.0,
            compliance: self.behavior.compliance,
            damping: self.behavior.damping,
        }
    }

    /// Fill `infos` from slot `idx` and record solve indices
    pub fn get_bilateral_info(&mut self, infos: &mut [ConstraintInfo], idx: usize) -> Result<usize> {
        check_len("Bilateral info", infos.len(), idx, self.num_bilateral_constraints())?;
        let tol = self.behavior.penetration_tol;
        let pair = self.pair_response();
        let behavior = &*self.force_behavior;

        let mut k = idx;
        for cons in self.bilaterals.iter_mut().flat_map(|s| s.iter_mut()) {
            cons.set_solve_index(k);
            infos[k] = constraint_info(cons, tol, pair, behavior);
            k += 1;
        }
        Ok(k)
    }

    /// Fill `infos` from slot `idx` and record solve indices
    pub fn get_unilateral_info(&mut self, infos: &mut [ConstraintInfo], idx: usize) -> Result<usize> {
        check_len("Unilateral info", infos.len(), idx, self.num_unilateral_constraints())?;
        let tol = self.behavior.penetration_tol;
        let pair = self.pair_response();
        let behavior = &*self.force_behavior;

        let mut k = idx;
        for cons in &mut self.unilaterals {
            cons.set_solve_index(k);
            infos[k] = constraint_info(cons, tol, pair, behavior);
            k += 1;
        }
        Ok(k)
    }

    /// Store `lam[idx..]` as the bilateral impulses
    pub fn set_bilateral_impulses(&mut self, lam: &[f64], idx: usize) -> Result<usize> {
        check_len("Bilateral impulse", lam.len(), idx, self.num_bilateral_constraints())?;
        let mut k = idx;
        for cons in self.bilaterals.iter_mut().flat_map(|s| s.iter_mut()) {
            cons.set_impulse(lam[k]);
            k += 1;
        }
        Ok(k)
    }

    /// Copy the bilateral impulses into `lam` from slot `idx`
    pub fn get_bilateral_impulses(&self, lam: &mut [f64], idx: usize) -> Result<usize> {
        check_len("Bilateral impulse", lam.len(), idx, self.num_bilateral_constraints())?;
        let mut k = idx;
        for cons in self.bilateral_constraints() {
            lam[k] = cons.impulse();
            k += 1;
        }
        Ok(k)
    }

    /// Store `the[idx..]` as the unilateral impulses
    pub fn set_unilateral_impulses(&mut self, the: &[f64], idx: usize) -> Result<usize> {
        check_len("Unilateral impulse", the.len(), idx, self.num_unilateral_constraints())?;
        let mut k = idx;
        for cons in &mut self.unilaterals {
            cons.set_impulse(the[k]);
            k += 1;
        }
        Ok(k)
    }

    /// Copy the unilateral impulses into `the` from slot `idx`
    pub fn get_unilateral_impulses(&self, the: &mut [f64], idx: usize) -> Result<usize> {
        check_len("Unilateral impulse", the.len(), idx, self.num_unilateral_constraints())?;
        let mut k = idx;
        for cons in &self.unilaterals {
            the[k] = cons.impulse();
            k += 1;
        }
        Ok(k)
    }

    pub fn zero_impulses(&mut self) {
        for cons in self.bilaterals.iter_mut().flat_map(|s| s.iter_mut()) {
            cons.set_impulse(0.0);
        }
        for cons in &mut self.unilaterals {
            cons.set_impulse(0.0);
        }
    }

    /// Upper bound on the number of friction rows
    pub fn max_friction_constraint_sets(&self) -> usize {
        self.num_bilateral_constraints() + self.num_unilateral_constraints()
    }

    /// Append friction rows; returns the number added
    ///
    /// Contacts whose impulse times the friction coefficient is negligible
    /// get no row. Bilaterals without tangential slip have no friction
    /// direction and are skipped as well.
    pub fn add_friction_constraints(&self, rows: &mut Vec<FrictionRow>) -> usize {
        let mu = self.behavior.friction;
        if mu == 0.0 {
            return 0;
        }
        let start = rows.len();

        for cons in self.bilateral_constraints() {
            let max_friction = (cons.impulse() * mu).abs();
            if max_friction < MIN_FRICTION_IMPULSE {
                continue;
            }
            let slip = tangential_component(&cons.relative_velocity(), cons.normal());
            let speed = slip.norm();
            if speed < MIN_SLIP_SPEED {
                continue;
            }
            rows.push(FrictionRow {
                columns: vec![cons.column(&(slip / speed))],
                max_friction,
                contact_index: cons.solve_index(),
                bilateral: true,
            });
        }

        for cons in &self.unilaterals {
            let max_friction = (cons.impulse() * mu).abs();
            if max_friction < MIN_FRICTION_IMPULSE {
                continue;
            }
            let (t0, t1) = tangent_basis(cons.normal());
            rows.push(FrictionRow {
                columns: vec![cons.column(&t0), cons.column(&t1)],
                max_friction,
                contact_index: cons.solve_index(),
                bilateral: false,
            });
        }

        rows.len() - start
    }
}
