//! Rigid body with a collision mesh

use crate::body::{BodyId, CollidableBody, ComponentId};
use crate::contact::attached::AttachedVertexSet;
use crate::contact::types::{ContactMaster, ContactPoint, MasterKind};
use crate::mesh::types::{Point, Pose, SurfaceMesh, Vec3};

/// Rigid body whose collision mesh moves with a single frame component
///
/// Every vertex and every free point maps to the same frame master with
/// weight one. The frame origin is the translation of the mesh-to-world pose.
#[derive(Debug, Clone)]
pub struct RigidMeshBody {
    id: BodyId,
    name: String,
    mesh: SurfaceMesh,
    component: ComponentId,
    mass: f64,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    dynamic: bool,
}

impl RigidMeshBody {
    /// Create a dynamic rigid body at rest
    pub fn new(
        id: BodyId,
        name: impl Into<String>,
        mesh: SurfaceMesh,
        component: ComponentId,
        mass: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            mesh,
            component,
            mass,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            dynamic: true,
        }
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn pose(&self) -> &Pose {
        self.mesh.mesh_to_world()
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.mesh.set_mesh_to_world(pose);
    }

    pub fn set_velocity(&mut self, linear: Vec3, angular: Vec3) {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
    }

    /// Whether the solver may move this body. Fixed bodies produce no
    /// controllable masters.
    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn frame_master(&self) -> ContactMaster {
        ContactMaster {
            component: self.component,
            weight: 1.0,
            kind: MasterKind::Frame {
                origin: Point::from(self.pose().translation.vector),
                linear_velocity: self.linear_velocity,
                angular_velocity: self.angular_velocity,
            },
            controllable: self.dynamic,
        }
    }
}

impl CollidableBody for RigidMeshBody {
    fn id(&self) -> BodyId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn collision_mesh(&self) -> &SurfaceMesh {
        &self.mesh
    }

    fn collision_mesh_mut(&mut self) -> &mut SurfaceMesh {
        &mut self.mesh
    }

    fn is_low_dof(&self) -> bool {
        true
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn vertex_masters(&self, _vertex: usize, masters: &mut Vec<ContactMaster>) {
        masters.push(self.frame_master());
    }

    fn free_point_masters(&self, _point: &Point, masters: &mut Vec<ContactMaster>) {
        masters.push(self.frame_master());
    }

    fn contains_contact_master(&self, component: ComponentId) -> bool {
        component == self.component
    }

    // Rigid bodies never veto contacts.
    fn allow_collision(
        &self,
        _point: &ContactPoint,
        _other: &dyn CollidableBody,
        _attached: Option<&AttachedVertexSet>,
    ) -> bool {
        true
    }
}
