//! Collision handler for one pair of collidable bodies
//!
//! Each step the handler asks a [`Collider`] for raw contact primitives and
//! turns them into constraints. Penetrating vertices and edge-edge contacts
//! become bilateral constraints that persist across steps, matched by
//! [`FeatureKey`] so impulses carry over as warm starts. Contact planes
//! between two low-DOF bodies become unilateral constraints rebuilt from
//! scratch every step.

use crate::body::{AttachmentGraph, CollidableBody, ComponentId};
use crate::contact::attached::{AttachedVertexCache, AttachedVertexSet};
use crate::contact::collider::{Collider, ContactInfo, ContactPlane, EdgeEdgeContact, PenetratingPoint};
use crate::contact::metrics::StepMetrics;
use crate::contact::solver::{ContactForceBehavior, DefaultForceBehavior};
use crate::contact::store::ConstraintStore;
use crate::contact::types::{CollisionMethod, ContactBehavior, ContactConstraint, ContactPoint};
use crate::error::{ContactError, Result};
use crate::io::state::{read_constraint, skip_constraint, write_constraint, StateBuffer, StateCounts};
use crate::mesh::geometry::signed_distance_to_plane;
use crate::mesh::types::{SurfaceMesh, Vec3};
use std::collections::{BTreeMap, HashSet};

/// What the dynamics system asks of the handler in a constraint update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Run collision detection and rebuild the constraints
    ComputeContacts,
    /// Keep the current constraints in place
    UpdateContacts,
}

/// Contact constraints between two collidable bodies
pub struct CollisionHandler {
    pub(crate) bodies: [Box<dyn CollidableBody>; 2],
    pub(crate) method: CollisionMethod,
    pub(crate) behavior: ContactBehavior,
    /// Bilaterals owned by body 0 and body 1 respectively
    pub(crate) bilaterals: [ConstraintStore; 2],
    pub(crate) unilaterals: Vec<ContactConstraint>,
    attached: AttachedVertexCache,
    pub(crate) force_behavior: Box<dyn ContactForceBehavior>,
    last_contact_info: Option<ContactInfo>,
    last_metrics: StepMetrics,
}

/// Bodies and attached sets seen from one orientation of the pair
struct PassContext<'a> {
    body_a: &'a dyn CollidableBody,
    body_b: &'a dyn CollidableBody,
    attached_a: Option<&'a AttachedVertexSet>,
    attached_b: Option<&'a AttachedVertexSet>,
}

impl CollisionHandler {
    /// Create a handler for a body pair
    ///
    /// A `Default` method resolves to contour regions when both bodies have
    /// low DOF and to vertex penetration otherwise. For every method other
    /// than contour regions, a low-DOF body 0 paired with a deformable
    /// body 1 is swapped so that body 0 is the deformable one.
    pub fn new(
        body0: Box<dyn CollidableBody>,
        body1: Box<dyn CollidableBody>,
        behavior: ContactBehavior,
    ) -> Self {
        let method = match behavior.method {
            CollisionMethod::Default => {
                if body0.is_low_dof() && body1.is_low_dof() {
                    CollisionMethod::ContourRegion
                } else {
                    CollisionMethod::VertexPenetration
                }
            }
            method => method,
        };

        let bodies = if method != CollisionMethod::ContourRegion
            && body0.is_low_dof()
            && !body1.is_low_dof()
        {
            [body1, body0]
        } else {
            [body0, body1]
        };

        log::info!(
            "Collision handler '{}' / '{}' using {:?}",
            bodies[0].name(),
            bodies[1].name(),
            method
        );

        Self {
            bodies,
            method,
            behavior,
            bilaterals: [ConstraintStore::new(), ConstraintStore::new()],
            unilaterals: Vec::new(),
            attached: AttachedVertexCache::default(),
            force_behavior: Box::new(DefaultForceBehavior),
            last_contact_info: None,
            last_metrics: StepMetrics::default(),
        }
    }

    fn check_index(idx: usize) -> Result<()> {
        if idx > 1 {
            return Err(ContactError::InvalidArgument(format!(
                "Body index must be 0 or 1, got {}",
                idx
            )));
        }
        Ok(())
    }

    /// Body `idx` (0 or 1), after any swap made at construction
    pub fn body(&self, idx: usize) -> Result<&dyn CollidableBody> {
        Self::check_index(idx)?;
        Ok(self.bodies[idx].as_ref())
    }

    /// Mutable access to body `idx`, for moving meshes between steps
    pub fn body_mut(&mut self, idx: usize) -> Result<&mut dyn CollidableBody> {
        Self::check_index(idx)?;
        Ok(self.bodies[idx].as_mut())
    }

    /// Collision mesh of body `idx`
    pub fn mesh(&self, idx: usize) -> Result<&SurfaceMesh> {
        Ok(self.body(idx)?.collision_mesh())
    }

    /// Resolved constraint generation method
    pub fn method(&self) -> CollisionMethod {
        self.method
    }

    /// Change the method without re-resolving `Default` or swapping bodies
    pub fn set_method(&mut self, method: CollisionMethod) {
        self.method = method;
    }

    pub fn behavior(&self) -> &ContactBehavior {
        &self.behavior
    }

    pub fn friction(&self) -> f64 {
        self.behavior.friction
    }

    pub fn set_friction(&mut self, mu: f64) {
        self.behavior.friction = mu;
    }

    pub fn penetration_tol(&self) -> f64 {
        self.behavior.penetration_tol
    }

    pub fn set_penetration_tol(&mut self, tol: f64) {
        self.behavior.penetration_tol = tol;
    }

    pub fn compliance(&self) -> f64 {
        self.behavior.compliance
    }

    pub fn set_compliance(&mut self, compliance: f64) {
        self.behavior.compliance = compliance;
    }

    pub fn damping(&self) -> f64 {
        self.behavior.damping
    }

    pub fn set_damping(&mut self, damping: f64) {
        self.behavior.damping = damping;
    }

    pub fn max_unilaterals(&self) -> usize {
        self.behavior.max_unilaterals
    }

    pub fn set_max_unilaterals(&mut self, max: usize) {
        self.behavior.max_unilaterals = max;
    }

    /// Replace the force response strategy
    pub fn set_force_behavior(&mut self, behavior: Box<dyn ContactForceBehavior>) {
        self.force_behavior = behavior;
    }

    /// Go back to the pair's own compliance and damping
    pub fn clear_force_behavior(&mut self) {
        self.force_behavior = Box::new(DefaultForceBehavior);
    }

    /// True if contacts are soft: nonzero compliance or an overriding force
    /// behavior
    pub fn is_compliant(&self) -> bool {
        self.behavior.compliance != 0.0 || self.force_behavior.overrides_response()
    }

    /// Set compliance and critical damping so that a contact supporting the
    /// pair's weight under acceleration `acc` penetrates by `tol`
    pub fn auto_compute_compliance(&mut self, acc: f64, tol: f64) {
        let mass = self.bodies[0].mass() + self.bodies[1].mass();
        let damping_ratio = 1.0;
        let compliance = tol / (acc * mass);
        self.behavior.compliance = compliance;
        self.behavior.damping = damping_ratio * 2.0 * (mass / compliance).sqrt();
    }

    /// Collider output from the most recent computation
    pub fn last_contact_info(&self) -> Option<&ContactInfo> {
        self.last_contact_info.as_ref()
    }

    /// Summary of the most recent computation
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }

    /// Bilaterals in solver order: body-0 store, then body-1 store
    pub fn bilateral_constraints(&self) -> impl Iterator<Item = &ContactConstraint> {
        self.bilaterals.iter().flat_map(|s| s.iter())
    }

    pub fn unilateral_constraints(&self) -> &[ContactConstraint] {
        &self.unilaterals
    }

    /// Bilateral store owned by body `idx`
    pub fn bilateral_store(&self, idx: usize) -> Result<&ConstraintStore> {
        Self::check_index(idx)?;
        Ok(&self.bilaterals[idx])
    }

    /// Drop the cached attached-vertex sets
    ///
    /// Needed when attachments change without going through an
    /// [`AttachmentGraph`] whose version tracks the change.
    pub fn invalidate_attachments(&mut self) {
        self.attached.invalidate();
    }

    pub fn update_constraints(
        &mut self,
        mode: UpdateMode,
        collider: &mut dyn Collider,
        attachments: &AttachmentGraph,
    ) -> Result<f64> {
        match mode {
            UpdateMode::ComputeContacts => self.compute_collision_constraints(collider, attachments),
            UpdateMode::UpdateContacts => Ok(0.0),
        }
    }

    /// Run collision detection and rebuild the constraints
    ///
    /// Returns the maximum penetration depth found this step.
    pub fn compute_collision_constraints(
        &mut self,
        collider: &mut dyn Collider,
        attachments: &AttachmentGraph,
    ) -> Result<f64> {
        let info = collider.get_contacts(
            self.bodies[0].collision_mesh(),
            self.bodies[1].collision_mesh(),
        );

        let max_penetration = match self.method {
            CollisionMethod::VertexPenetration
            | CollisionMethod::VertexPenetrationBilateral
            | CollisionMethod::VertexEdgePenetration => {
                self.attached
                    .update(self.bodies[0].as_ref(), self.bodies[1].as_ref(), attachments);
                self.compute_vertex_penetration_constraints(info.as_ref())
            }
            CollisionMethod::ContourRegion => self.compute_contour_region_constraints(info.as_ref()),
            CollisionMethod::Inactive => 0.0,
            CollisionMethod::Default => {
                return Err(ContactError::UnsupportedMethod(self.method));
            }
        };

        self.last_contact_info = info;
        self.last_metrics = StepMetrics::compute(self, max_penetration);
        log::debug!(
            "'{}' / '{}': {} bilateral, {} unilateral, max penetration {:.6}",
            self.bodies[0].name(),
            self.bodies[1].name(),
            self.num_bilateral_constraints(),
            self.num_unilateral_constraints(),
            max_penetration
        );
        Ok(max_penetration)
    }

    fn compute_vertex_penetration_constraints(&mut self, info: Option<&ContactInfo>) -> f64 {
        self.clear_contact_activity();
        let mut max_penetration = 0.0_f64;

        if let Some(info) = info {
            let compliant = self.is_compliant();
            let body0 = self.bodies[0].as_ref();
            let body1 = self.bodies[1].as_ref();
            let [store0, store1] = &mut self.bilaterals;

            let forward = PassContext {
                body_a: body0,
                body_b: body1,
                attached_a: self.attached.get(0),
                attached_b: self.attached.get(1),
            };
            max_penetration = build_vertex_penetration(
                &info.penetrating_points0,
                &forward,
                store0,
                hash_using_face(compliant, body0, body1),
            );

            if !body1.is_low_dof() || self.behavior.body_face_contact {
                let reverse = PassContext {
                    body_a: body1,
                    body_b: body0,
                    attached_a: self.attached.get(1),
                    attached_b: self.attached.get(0),
                };
                let pen = build_vertex_penetration(
                    &info.penetrating_points1,
                    &reverse,
                    store1,
                    hash_using_face(compliant, body1, body0),
                );
                max_penetration = max_penetration.max(pen);
            }

            if self.method == CollisionMethod::VertexEdgePenetration {
                let pen = build_edge_penetration(&info.edge_edge_contacts, body0, body1, store0);
                max_penetration = max_penetration.max(pen);
            }
        }

        self.remove_inactive_contacts();
        max_penetration
    }

    fn compute_contour_region_constraints(&mut self, info: Option<&ContactInfo>) -> f64 {
        self.unilaterals.clear();
        match info {
            Some(info) => build_contour_region(
                &info.contact_planes,
                self.bodies[0].as_ref(),
                self.bodies[1].as_ref(),
                self.behavior.max_unilaterals,
                &mut self.unilaterals,
            ),
            None => 0.0,
        }
    }

    /// Mark every bilateral inactive with zero distance
    pub fn clear_contact_activity(&mut self) {
        for store in &mut self.bilaterals {
            store.begin_step();
        }
    }

    /// Remove bilaterals left inactive; returns how many were removed
    pub fn remove_inactive_contacts(&mut self) -> usize {
        let removed: usize = self.bilaterals.iter_mut().map(|s| s.commit()).sum();
        if removed > 0 {
            log::trace!("Retired {} inactive contacts", removed);
        }
        removed
    }

    /// Drop every constraint
    pub fn clear_contact_data(&mut self) {
        for store in &mut self.bilaterals {
            store.clear();
        }
        self.unilaterals.clear();
    }

    /// Components acting as masters of any current constraint
    pub fn constrained_components(&self) -> HashSet<ComponentId> {
        self.bilateral_constraints()
            .chain(self.unilaterals.iter())
            .flat_map(|c| c.masters())
            .map(|m| m.component)
            .collect()
    }

    /// Bilateral impulses accumulated per vertex of body `idx`
    ///
    /// Each constraint contributes `impulse * weight * normal` to the
    /// vertices of the contact point lying on that body, negated when the
    /// normal faces the other way.
    pub fn contact_impulses(&self, idx: usize) -> Result<BTreeMap<usize, Vec3>> {
        Self::check_index(idx)?;
        let mut impulses = BTreeMap::new();
        for (owner, store) in self.bilaterals.iter().enumerate() {
            for cons in store {
                let (point, lam) = if owner == idx {
                    (cons.point0(), cons.impulse())
                } else {
                    (cons.point1(), -cons.impulse())
                };
                accumulate_impulses(&mut impulses, point, cons.normal(), lam);
            }
        }
        Ok(impulses)
    }

    /// Append the aux state: three counts, then every constraint
    pub fn get_aux_state(&self, buf: &mut StateBuffer) -> Result<()> {
        self.state_counts().write(buf)?;
        for cons in self.bilateral_constraints().chain(self.unilaterals.iter()) {
            write_constraint(buf, cons)?;
        }
        Ok(())
    }

    fn state_counts(&self) -> StateCounts {
        StateCounts {
            bilaterals0: self.bilaterals[0].len(),
            bilaterals1: self.bilaterals[1].len(),
            unilaterals: self.unilaterals.len(),
        }
    }

    /// Replace all constraints with those decoded from `buf`
    ///
    /// Restored constraints are active with masters reassigned from the
    /// current bodies. On error the existing constraints are left untouched.
    pub fn set_aux_state(&mut self, buf: &mut StateBuffer) -> Result<()> {
        let counts = StateCounts::read(buf)?;
        let mut stores = [ConstraintStore::new(), ConstraintStore::new()];

        for (owner, count) in [counts.bilaterals0, counts.bilaterals1].into_iter().enumerate() {
            let (a, b) = (owner, 1 - owner);
            for _ in 0..count {
                let cons = self.restore_constraint(buf, a, b)?;
                stores[owner].insert(cons);
            }
        }

        let mut unilaterals = Vec::with_capacity(counts.unilaterals.min(self.behavior.max_unilaterals));
        for _ in 0..counts.unilaterals {
            unilaterals.push(self.restore_constraint(buf, 0, 1)?);
        }

        self.bilaterals = stores;
        self.unilaterals = unilaterals;
        log::debug!(
            "Restored {} bilateral and {} unilateral contacts",
            counts.bilaterals0 + counts.bilaterals1,
            counts.unilaterals
        );
        Ok(())
    }

    fn restore_constraint(&self, buf: &mut StateBuffer, a: usize, b: usize) -> Result<ContactConstraint> {
        let body_a = self.bodies[a].as_ref();
        let body_b = self.bodies[b].as_ref();
        let mut cons = read_constraint(buf, body_a.id(), body_b.id())?;
        check_vertices(cons.point0(), body_a)?;
        check_vertices(cons.point1(), body_b)?;
        cons.assign_masters(body_a, body_b);
        cons.set_active(true);
        Ok(cons)
    }

    /// Consume one aux-state record without decoding constraints
    pub fn skip_aux_state(buf: &mut StateBuffer) -> Result<()> {
        let counts = StateCounts::read(buf)?;
        for _ in 0..counts.total() {
            skip_constraint(buf)?;
        }
        Ok(())
    }

    /// Append the aux state of an empty contact set
    pub fn initial_aux_state(buf: &mut StateBuffer) -> Result<()> {
        StateCounts::default().write(buf)
    }
}

fn check_vertices(point: &ContactPoint, body: &dyn CollidableBody) -> Result<()> {
    let count = body.collision_mesh().num_vertices();
    match point.vertices().iter().find(|&&v| v >= count) {
        Some(v) => Err(ContactError::StateError(format!(
            "Vertex {} out of range for '{}' with {} vertices",
            v,
            body.name(),
            count
        ))),
        None => Ok(()),
    }
}

fn accumulate_impulses(map: &mut BTreeMap<usize, Vec3>, point: &ContactPoint, normal: &Vec3, lam: f64) {
    for (&v, &w) in point.vertices().iter().zip(point.weights()) {
        *map.entry(v).or_insert_with(Vec3::zeros) += normal * (lam * w);
    }
}

/// Key on the opposing face when a low-DOF body with the denser mesh
/// supplies the vertices
fn hash_using_face(compliant: bool, body_a: &dyn CollidableBody, body_b: &dyn CollidableBody) -> bool {
    !compliant
        && body_a.is_low_dof()
        && body_a.collision_mesh().num_vertices() > body_b.collision_mesh().num_vertices()
}

fn build_vertex_penetration(
    points: &[PenetratingPoint],
    pass: &PassContext,
    store: &mut ConstraintStore,
    hash_using_face: bool,
) -> f64 {
    let mesh_a = pass.body_a.collision_mesh();
    let mesh_b = pass.body_b.collision_mesh();
    let mut max_penetration = 0.0_f64;

    for cpp in points {
        let Some(face) = mesh_b.faces.get(cpp.face) else {
            log::trace!("Skipping contact on missing face {}", cpp.face);
            continue;
        };
        let pnt0 = match ContactPoint::from_vertex(mesh_a, pass.body_a.id(), cpp.vertex) {
            Ok(pnt0) => pnt0,
            Err(e) => {
                log::trace!("Skipping contact: {}", e);
                continue;
            }
        };
        let pnt1 = ContactPoint::from_face(cpp.position, pass.body_b.id(), face, cpp.coords);

        if !pass.body_a.allow_collision(&pnt0, pass.body_b, pass.attached_a)
            || !pass.body_b.allow_collision(&pnt1, pass.body_a, pass.attached_b)
        {
            log::trace!("Vertex {} of '{}' vetoed by attachment", cpp.vertex, pass.body_a.name());
            continue;
        }

        let Some(cons) = store.match_candidate(pnt0, pnt1, hash_using_face, cpp.distance) else {
            continue;
        };
        cons.set_active(true);

        let normal = match mesh_b.world_face_normal(cpp.face) {
            Ok(normal) => normal,
            Err(e) => {
                log::trace!("Dropping contact on face {}: {}", cpp.face, e);
                cons.set_active(false);
                continue;
            }
        };
        cons.set_normal(normal);
        cons.assign_masters(pass.body_a, pass.body_b);
        let dist = signed_distance_to_plane(&cons.point0().position, &cons.point1().position, &normal);

        if !cons.is_controllable() {
            cons.set_active(false);
            continue;
        }
        cons.set_distance(dist);
        max_penetration = max_penetration.max(-dist);
    }
    max_penetration
}

fn build_edge_penetration(
    contacts: &[EdgeEdgeContact],
    body0: &dyn CollidableBody,
    body1: &dyn CollidableBody,
    store: &mut ConstraintStore,
) -> f64 {
    let mut max_penetration = 0.0_f64;

    for eec in contacts {
        let pnt0 = ContactPoint::from_edge(eec.point0, body0.id(), eec.edge0, eec.s0);
        let pnt1 = ContactPoint::from_edge(eec.point1, body1.id(), eec.edge1, eec.s1);

        let Some(cons) = store.match_candidate(pnt0, pnt1, false, eec.displacement) else {
            continue;
        };
        cons.set_active(true);
        cons.set_normal(-eec.point1_to_point0_normal);
        cons.assign_masters(body0, body1);

        if !cons.is_controllable() {
            cons.set_active(false);
            continue;
        }
        let dist = -eec.displacement;
        cons.set_distance(dist);
        max_penetration = max_penetration.max(-dist);
    }
    max_penetration
}

fn build_contour_region(
    planes: &[ContactPlane],
    body0: &dyn CollidableBody,
    body1: &dyn CollidableBody,
    max_unilaterals: usize,
    unilaterals: &mut Vec<ContactConstraint>,
) -> f64 {
    let mut max_penetration = 0.0_f64;

    'planes: for plane in planes {
        for &p in &plane.points {
            if unilaterals.len() >= max_unilaterals {
                log::trace!("Unilateral limit {} reached", max_unilaterals);
                break 'planes;
            }
            let mut cons = ContactConstraint::new_equated(p, body0.id(), body1.id());
            cons.set_normal(plane.normal);
            cons.assign_masters(body0, body1);
            cons.set_distance(-plane.depth);
            cons.set_active(true);
            max_penetration = max_penetration.max(plane.depth);
            unilaterals.push(cons);
        }
    }
    max_penetration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyId, DeformableMeshBody, RigidMeshBody};
    use crate::contact::collider::ScriptedCollider;
    use crate::mesh::types::{Point, TriFace};
    use approx::assert_relative_eq;

    fn square(z: f64) -> SurfaceMesh {
        SurfaceMesh::new(
            vec![
                Point::new(0.0, 0.0, z),
                Point::new(1.0, 0.0, z),
                Point::new(1.0, 1.0, z),
                Point::new(0.0, 1.0, z),
            ],
            vec![TriFace::new([0, 1, 2]), TriFace::new([0, 2, 3])],
        )
        .unwrap()
    }

    fn sheet() -> Box<dyn CollidableBody> {
        Box::new(DeformableMeshBody::new(BodyId(0), "sheet", square(-0.01), ComponentId(10), 1.0))
    }

    fn block(id: u32) -> Box<dyn CollidableBody> {
        Box::new(RigidMeshBody::new(BodyId(id), "block", square(0.0), ComponentId(id), 2.0))
    }

    fn vertex_hit(vertex: usize, depth: f64) -> PenetratingPoint {
        PenetratingPoint {
            vertex,
            face: 0,
            coords: [0.3, 0.3],
            position: Point::new(0.6, 0.3, 0.0),
            distance: depth,
        }
    }

    #[test]
    fn test_method_resolution_and_swap() {
        let handler = CollisionHandler::new(block(1), block(2), ContactBehavior::default());
        assert_eq!(handler.method(), CollisionMethod::ContourRegion);

        let handler = CollisionHandler::new(block(1), sheet(), ContactBehavior::default());
        assert_eq!(handler.method(), CollisionMethod::VertexPenetration);
        assert_eq!(handler.body(0).unwrap().name(), "sheet");
        assert!(handler.body(1).unwrap().is_low_dof());

        let contour = ContactBehavior::new(CollisionMethod::ContourRegion, 0.0);
        let handler = CollisionHandler::new(block(1), sheet(), contour);
        assert_eq!(handler.body(0).unwrap().name(), "block");
    }

    #[test]
    fn test_invalid_body_index() {
        let handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        assert!(matches!(handler.body(2), Err(ContactError::InvalidArgument(_))));
        assert!(handler.mesh(3).is_err());
        assert!(handler.contact_impulses(2).is_err());
        assert!(handler.mesh(1).is_ok());
    }

    #[test]
    fn test_default_method_is_unsupported_at_compute() {
        let mut handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        handler.set_method(CollisionMethod::Default);
        let mut collider = ScriptedCollider::new();
        let result = handler.compute_collision_constraints(&mut collider, &AttachmentGraph::new());
        assert!(matches!(result, Err(ContactError::UnsupportedMethod(CollisionMethod::Default))));
    }

    #[test]
    fn test_vertex_penetration_builds_world_normal() {
        let mut handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        let mut info = ContactInfo::default();
        info.penetrating_points0.push(vertex_hit(1, 0.01));
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();

        let max_pen = handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();
        assert_relative_eq!(max_pen, 0.01, epsilon = 1e-12);
        assert_eq!(handler.num_bilateral_constraints(), 1);

        let cons = handler.bilateral_constraints().next().unwrap();
        assert!(cons.is_active());
        assert_relative_eq!(cons.normal().z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(cons.distance(), -0.01, epsilon = 1e-12);
        assert_eq!(handler.last_metrics().num_bilateral, 1);
        assert!(handler.last_contact_info().is_some());
    }

    #[test]
    fn test_out_of_range_candidates_are_skipped() {
        let mut handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        let mut info = ContactInfo::default();
        info.penetrating_points0.push(vertex_hit(99, 0.05));
        info.penetrating_points0.push(PenetratingPoint {
            face: 7,
            ..vertex_hit(2, 0.05)
        });
        info.penetrating_points0.push(vertex_hit(1, 0.01));
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();

        let max_pen = handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();
        assert_eq!(handler.num_bilateral_constraints(), 1);
        assert_relative_eq!(max_pen, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_second_pass_skipped_for_rigid_body1() {
        let mut handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        let mut info = ContactInfo::default();
        info.penetrating_points1.push(vertex_hit(2, 0.02));
        let mut collider: ScriptedCollider = vec![Some(info.clone())].into_iter().collect();
        handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();
        assert_eq!(handler.num_bilateral_constraints(), 0);

        let mut behavior = ContactBehavior::default();
        behavior.body_face_contact = true;
        let mut handler = CollisionHandler::new(sheet(), block(1), behavior);
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();
        handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();
        assert_eq!(handler.bilateral_store(1).unwrap().len(), 1);
    }

    #[test]
    fn test_fixed_bodies_produce_no_constraints() {
        let mut fixed = RigidMeshBody::new(BodyId(1), "ground", square(0.0), ComponentId(1), 1.0);
        fixed.set_dynamic(false);
        let mut pinned = DeformableMeshBody::new(BodyId(0), "pinned", square(-0.01), ComponentId(10), 1.0);
        pinned.set_node_dynamic(1, false).unwrap();

        let mut handler =
            CollisionHandler::new(Box::new(pinned), Box::new(fixed), ContactBehavior::default());
        let mut info = ContactInfo::default();
        info.penetrating_points0.push(vertex_hit(1, 0.01));
        info.penetrating_points0.push(vertex_hit(2, 0.01));
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();
        handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();

        // vertex 1 has only fixed masters, vertex 2 is still free
        assert_eq!(handler.num_bilateral_constraints(), 1);
        let cons = handler.bilateral_constraints().next().unwrap();
        assert_eq!(cons.point0().vertices(), &[2]);
    }

    #[test]
    fn test_edge_pass() {
        let behavior = ContactBehavior::new(CollisionMethod::VertexEdgePenetration, 0.0);
        let mut handler = CollisionHandler::new(sheet(), block(1), behavior);
        let mut info = ContactInfo::default();
        info.edge_edge_contacts.push(EdgeEdgeContact {
            edge0: (0, 1),
            s0: 0.5,
            point0: Point::new(0.5, 0.0, -0.01),
            edge1: (3, 2),
            s1: 0.25,
            point1: Point::new(0.5, 0.0, 0.0),
            point1_to_point0_normal: -Vec3::z(),
            displacement: 0.015,
        });
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();
        let max_pen = handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();

        assert_relative_eq!(max_pen, 0.015, epsilon = 1e-12);
        let cons = handler.bilateral_constraints().next().unwrap();
        assert_relative_eq!(cons.normal().z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(cons.distance(), -0.015, epsilon = 1e-12);
        assert_eq!(cons.point0().weights(), &[0.5, 0.5]);
    }

    #[test]
    fn test_inactive_method_generates_nothing() {
        let behavior = ContactBehavior::new(CollisionMethod::Inactive, 0.0);
        let mut handler = CollisionHandler::new(sheet(), block(1), behavior);
        let mut info = ContactInfo::default();
        info.penetrating_points0.push(vertex_hit(1, 0.01));
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();

        let max_pen = handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();
        assert_eq!(max_pen, 0.0);
        assert_eq!(handler.num_bilateral_constraints(), 0);
    }

    #[test]
    fn test_update_mode_keeps_contacts() {
        let mut handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        let mut info = ContactInfo::default();
        info.penetrating_points0.push(vertex_hit(1, 0.01));
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();
        let graph = AttachmentGraph::new();

        handler
            .update_constraints(UpdateMode::ComputeContacts, &mut collider, &graph)
            .unwrap();
        let pen = handler
            .update_constraints(UpdateMode::UpdateContacts, &mut collider, &graph)
            .unwrap();
        assert_eq!(pen, 0.0);
        assert_eq!(handler.num_bilateral_constraints(), 1);
    }

    #[test]
    fn test_auto_compute_compliance() {
        let mut handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        assert!(!handler.is_compliant());

        handler.auto_compute_compliance(9.8, 0.001);
        let mass = 3.0;
        let compliance = 0.001 / (9.8 * mass);
        assert_relative_eq!(handler.compliance(), compliance, epsilon = 1e-15);
        assert_relative_eq!(handler.damping(), 2.0 * (mass / compliance).sqrt(), epsilon = 1e-9);
        assert!(handler.is_compliant());
    }

    #[test]
    fn test_hash_using_face_needs_rigid_dense_body() {
        let dense = RigidMeshBody::new(
            BodyId(3),
            "dense",
            SurfaceMesh::new(
                (0..5).map(|i| Point::new(i as f64, (i % 2) as f64, 0.0)).collect(),
                vec![TriFace::new([0, 1, 2]), TriFace::new([2, 3, 4])],
            )
            .unwrap(),
            ComponentId(3),
            1.0,
        );
        let coarse = block(1);
        let deformable = sheet();

        assert!(hash_using_face(false, &dense, coarse.as_ref()));
        assert!(!hash_using_face(true, &dense, coarse.as_ref()));
        assert!(!hash_using_face(false, coarse.as_ref(), &dense));
        assert!(!hash_using_face(false, deformable.as_ref(), coarse.as_ref()));
    }

    #[test]
    fn test_contact_impulses_split_by_side() {
        let mut handler = CollisionHandler::new(sheet(), block(1), ContactBehavior::default());
        let mut info = ContactInfo::default();
        info.penetrating_points0.push(vertex_hit(1, 0.01));
        let mut collider: ScriptedCollider = vec![Some(info)].into_iter().collect();
        handler
            .compute_collision_constraints(&mut collider, &AttachmentGraph::new())
            .unwrap();
        handler.set_bilateral_impulses(&[2.0], 0).unwrap();

        let on_sheet = handler.contact_impulses(0).unwrap();
        assert_eq!(on_sheet.len(), 1);
        assert_relative_eq!(on_sheet[&1].z, 2.0, epsilon = 1e-12);

        let on_block = handler.contact_impulses(1).unwrap();
        let total: Vec3 = on_block.values().sum();
        assert_relative_eq!(total.z, -2.0, epsilon = 1e-12);
        assert_eq!(on_block.len(), 3);

        let components = handler.constrained_components();
        assert!(components.contains(&ComponentId(11)));
        assert!(components.contains(&ComponentId(1)));
    }
}
