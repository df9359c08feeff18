//! Contact constraint data types

use crate::body::{BodyId, CollidableBody, ComponentId};
use crate::contact::solver::{ConstraintColumn, JacobianBlock};
use crate::error::{ContactError, Result};
use crate::mesh::geometry::barycentric_weights;
use crate::mesh::types::{Point, SurfaceMesh, TriFace, Vec3};
use serde::{Deserialize, Serialize};

/// Constraint generation method for a body pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMethod {
    /// Resolved when the handler is created: contour regions when both bodies
    /// have low DOF, vertex penetration otherwise
    #[default]
    Default,
    /// Vertices of each body penetrating faces of the other
    VertexPenetration,
    /// Same builder as `VertexPenetration`
    VertexPenetrationBilateral,
    /// Vertex penetration plus an edge-edge pass
    VertexEdgePenetration,
    /// Unilateral constraints on the contact planes of two rigid bodies
    ContourRegion,
    /// No constraints are generated
    Inactive,
}

/// Per-pair contact parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactBehavior {
    /// Constraint generation method
    pub method: CollisionMethod,

    /// Coefficient of friction
    pub friction: f64,

    /// Penetration allowed before a constraint starts pushing
    pub penetration_tol: f64,

    /// Constraint compliance (0 means rigid)
    pub compliance: f64,

    /// Constraint damping
    pub damping: f64,

    /// Maximum number of unilateral (contour region) constraints
    pub max_unilaterals: usize,

    /// Run the second vertex pass even when body 1 has low DOF
    pub body_face_contact: bool,
}

impl Default for ContactBehavior {
    fn default() -> Self {
        Self {
            method: CollisionMethod::Default,
            friction: 0.0,
            penetration_tol: 0.001,
            compliance: 0.0,
            damping: 0.0,
            max_unilaterals: 100,
            body_face_contact: false,
        }
    }
}

impl ContactBehavior {
    /// Create contact behavior with a method and friction coefficient
    pub fn new(method: CollisionMethod, friction: f64) -> Self {
        Self {
            method,
            friction,
            ..Self::default()
        }
    }
}

/// Mesh feature a contact point lies on
///
/// Vertex lists are sorted so that the same feature always compares equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Vertex(usize),
    Edge([usize; 2]),
    Face([usize; 3]),
    /// A bare position with no mesh support (contour region points)
    Free,
}

/// Identity of a contact point across simulation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub body: BodyId,
    pub feature: Feature,
}

impl FeatureKey {
    fn from_vertices(body: BodyId, vertices: &[usize]) -> Result<Self> {
        let feature = match *vertices {
            [] => Feature::Free,
            [v] => Feature::Vertex(v),
            [a, b] => Feature::Edge([a.min(b), a.max(b)]),
            [a, b, c] => Feature::Face(TriFace::new([a, b, c]).canonical()),
            _ => {
                return Err(ContactError::StateError(format!(
                    "Contact point with {} vertices has no feature",
                    vertices.len()
                )))
            }
        };
        Ok(Self { body, feature })
    }
}

/// A point on one body's contact surface
///
/// Represented by a single vertex, a barycentric point on a face, a point on
/// an edge, or a free position. Weights always sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPoint {
    /// World position
    pub position: Point,
    vertices: Vec<usize>,
    weights: Vec<f64>,
    key: FeatureKey,
}

impl ContactPoint {
    /// Contact point located at a mesh vertex
    pub fn from_vertex(mesh: &SurfaceMesh, body: BodyId, vertex: usize) -> Result<Self> {
        Ok(Self {
            position: mesh.world_vertex(vertex)?,
            vertices: vec![vertex],
            weights: vec![1.0],
            key: FeatureKey {
                body,
                feature: Feature::Vertex(vertex),
            },
        })
    }

    /// Contact point inside a face, given face coordinates `(s1, s2)`
    pub fn from_face(position: Point, body: BodyId, face: &TriFace, coords: [f64; 2]) -> Self {
        Self {
            position,
            vertices: face.node_ids.to_vec(),
            weights: barycentric_weights(coords[0], coords[1]).to_vec(),
            key: FeatureKey {
                body,
                feature: Feature::Face(face.canonical()),
            },
        }
    }

    /// Contact point on the edge `(tail, head)` at parameter `s` from the tail
    pub fn from_edge(position: Point, body: BodyId, edge: (usize, usize), s: f64) -> Self {
        let (tail, head) = edge;
        Self {
            position,
            vertices: vec![tail, head],
            weights: vec![1.0 - s, s],
            key: FeatureKey {
                body,
                feature: Feature::Edge([tail.min(head), tail.max(head)]),
            },
        }
    }

    /// Contact point with no mesh support
    pub fn free(position: Point, body: BodyId) -> Self {
        Self {
            position,
            vertices: Vec::new(),
            weights: Vec::new(),
            key: FeatureKey {
                body,
                feature: Feature::Free,
            },
        }
    }

    /// Rebuild a point from its stored parts
    pub fn from_parts(
        position: Point,
        body: BodyId,
        vertices: Vec<usize>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        if vertices.len() != weights.len() {
            return Err(ContactError::StateError(format!(
                "{} vertices but {} weights",
                vertices.len(),
                weights.len()
            )));
        }
        let key = FeatureKey::from_vertices(body, &vertices)?;
        Ok(Self {
            position,
            vertices,
            weights,
            key,
        })
    }

    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn key(&self) -> &FeatureKey {
        &self.key
    }
}

/// Motion model of a master component
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MasterKind {
    /// Three translational DOFs
    Point { velocity: Vec3 },
    /// Six DOFs about a world origin
    Frame {
        origin: Point,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
    },
}

/// A dynamic component contributing DOFs to a constraint, with its weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaster {
    pub component: ComponentId,
    pub weight: f64,
    pub kind: MasterKind,
    /// Whether the solver may move this component
    pub controllable: bool,
}

impl ContactMaster {
    /// Copy of this master with its weight multiplied by `s`
    pub fn scaled(mut self, s: f64) -> Self {
        self.weight *= s;
        self
    }

    /// Velocity of the material point at `point` driven by this component
    pub fn velocity_at(&self, point: &Point) -> Vec3 {
        match self.kind {
            MasterKind::Point { velocity } => velocity,
            MasterKind::Frame {
                origin,
                linear_velocity,
                angular_velocity,
            } => linear_velocity + angular_velocity.cross(&(point - origin)),
        }
    }

    /// Jacobian block routing a force along `dir` at `point` to this component
    pub fn jacobian_block(&self, point: &Point, dir: &Vec3) -> JacobianBlock {
        let d = dir * self.weight;
        let coeffs = match self.kind {
            MasterKind::Point { .. } => vec![d.x, d.y, d.z],
            MasterKind::Frame { origin, .. } => {
                let m = (point - origin).cross(&d);
                vec![d.x, d.y, d.z, m.x, m.y, m.z]
            }
        };
        JacobianBlock {
            component: self.component,
            coeffs,
        }
    }
}

/// A contact constraint between a point on body 0 and a point on body 1
///
/// The normal points from body 1 toward body 0, so a negative distance means
/// the bodies interpenetrate.
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    cpnt0: ContactPoint,
    cpnt1: ContactPoint,
    normal: Vec3,
    distance: f64,
    impulse: f64,
    active: bool,
    identify_by_point1: bool,
    /// Per-constraint overrides of the pair compliance and damping
    pub compliance: Option<f64>,
    pub damping: Option<f64>,
    masters0: Vec<ContactMaster>,
    masters1: Vec<ContactMaster>,
    solve_index: Option<usize>,
}

impl ContactConstraint {
    pub fn new(cpnt0: ContactPoint, cpnt1: ContactPoint, identify_by_point1: bool) -> Self {
        Self {
            cpnt0,
            cpnt1,
            normal: Vec3::zeros(),
            distance: 0.0,
            impulse: 0.0,
            active: false,
            identify_by_point1,
            compliance: None,
            damping: None,
            masters0: Vec::new(),
            masters1: Vec::new(),
            solve_index: None,
        }
    }

    /// Constraint whose two contact points are the same free position
    pub fn new_equated(position: Point, body0: BodyId, body1: BodyId) -> Self {
        Self::new(
            ContactPoint::free(position, body0),
            ContactPoint::free(position, body1),
            false,
        )
    }

    /// Key this constraint is stored under
    pub fn key(&self) -> &FeatureKey {
        if self.identify_by_point1 {
            self.cpnt1.key()
        } else {
            self.cpnt0.key()
        }
    }

    pub fn point0(&self) -> &ContactPoint {
        &self.cpnt0
    }

    pub fn point1(&self) -> &ContactPoint {
        &self.cpnt1
    }

    /// Replace both contact points. Masters are stale until reassigned.
    pub fn set_contact_points(&mut self, cpnt0: ContactPoint, cpnt1: ContactPoint) {
        self.cpnt0 = cpnt0;
        self.cpnt1 = cpnt1;
    }

    pub fn normal(&self) -> &Vec3 {
        &self.normal
    }

    pub fn set_normal(&mut self, normal: Vec3) {
        self.normal = normal;
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }

    pub fn impulse(&self) -> f64 {
        self.impulse
    }

    pub fn set_impulse(&mut self, impulse: f64) {
        self.impulse = impulse;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn identify_by_point1(&self) -> bool {
        self.identify_by_point1
    }

    pub fn solve_index(&self) -> Option<usize> {
        self.solve_index
    }

    pub(crate) fn set_solve_index(&mut self, idx: usize) {
        self.solve_index = Some(idx);
    }

    /// Recompute the master lists from the two bodies
    ///
    /// Masters of body 1 carry negated weights since the normal points away
    /// from body 1.
    pub fn assign_masters(&mut self, body0: &dyn CollidableBody, body1: &dyn CollidableBody) {
        self.masters0.clear();
        body0.point_masters(&self.cpnt0, &mut self.masters0);

        self.masters1.clear();
        body1.point_masters(&self.cpnt1, &mut self.masters1);
        for m in &mut self.masters1 {
            m.weight = -m.weight;
        }
    }

    pub fn masters0(&self) -> &[ContactMaster] {
        &self.masters0
    }

    pub fn masters1(&self) -> &[ContactMaster] {
        &self.masters1
    }

    /// All masters, body 0 first
    pub fn masters(&self) -> impl Iterator<Item = &ContactMaster> {
        self.masters0.iter().chain(self.masters1.iter())
    }

    /// True if at least one master can be moved by the solver
    pub fn is_controllable(&self) -> bool {
        self.masters().any(|m| m.controllable)
    }

    /// Velocity of point 0 relative to point 1
    pub fn relative_velocity(&self) -> Vec3 {
        let v0: Vec3 = self
            .masters0
            .iter()
            .map(|m| m.velocity_at(&self.cpnt0.position) * m.weight)
            .sum();
        let v1: Vec3 = self
            .masters1
            .iter()
            .map(|m| m.velocity_at(&self.cpnt1.position) * m.weight)
            .sum();
        v0 + v1
    }

    /// Constraint column along `dir`, one block per distinct component
    pub fn column(&self, dir: &Vec3) -> ConstraintColumn {
        let mut column = ConstraintColumn::default();
        for m in &self.masters0 {
            column.add_block(m.jacobian_block(&self.cpnt0.position, dir));
        }
        for m in &self.masters1 {
            column.add_block(m.jacobian_block(&self.cpnt1.position, dir));
        }
        column
    }
}
