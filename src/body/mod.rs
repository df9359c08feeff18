//! Collidable bodies and the attachment graph between their components
//!
//! The handler never branches on a concrete body type. Everything it needs
//! goes through [`CollidableBody`], with [`CollidableBody::is_low_dof`] as the
//! single capability flag separating rigid-like bodies from deformable ones.

pub mod attachment;
pub mod deformable;
pub mod rigid;

pub use attachment::AttachmentGraph;
pub use deformable::DeformableMeshBody;
pub use rigid::RigidMeshBody;

use crate::contact::attached::{attached_near_contact, AttachedVertexSet};
use crate::contact::types::{ContactMaster, ContactPoint};
use crate::mesh::types::{Point, SurfaceMesh};
use serde::{Deserialize, Serialize};

/// Identifier of a collidable body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// Identifier of a dynamic component (rigid frame, particle, FEM node)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

/// A body that owns a collision mesh and the dynamic components moving it
pub trait CollidableBody: Send + Sync {
    fn id(&self) -> BodyId;

    /// Name used in log output
    fn name(&self) -> &str;

    fn collision_mesh(&self) -> &SurfaceMesh;

    fn collision_mesh_mut(&mut self) -> &mut SurfaceMesh;

    /// True for bodies with few DOFs (rigid bodies, rigid mesh components)
    fn is_low_dof(&self) -> bool;

    /// Total mass, used for compliance auto-tuning
    fn mass(&self) -> f64;

    /// Append the masters of a mesh vertex, with weights summing to one
    fn vertex_masters(&self, vertex: usize, masters: &mut Vec<ContactMaster>);

    /// Append the masters of an arbitrary world point attached to this body
    fn free_point_masters(&self, point: &Point, masters: &mut Vec<ContactMaster>);

    /// True if `component` is one of the masters this body reports
    fn contains_contact_master(&self, component: ComponentId) -> bool;

    /// Whether a contact at `point` against `other` should be generated
    ///
    /// The default vetoes points near vertices attached to the other body.
    fn allow_collision(
        &self,
        point: &ContactPoint,
        _other: &dyn CollidableBody,
        attached: Option<&AttachedVertexSet>,
    ) -> bool {
        !attached_near_contact(point, self.collision_mesh(), attached)
    }

    /// Append the masters of a contact point, scaled by its vertex weights
    fn point_masters(&self, point: &ContactPoint, masters: &mut Vec<ContactMaster>) {
        if point.vertices().is_empty() {
            self.free_point_masters(&point.position, masters);
            return;
        }
        for (&vertex, &weight) in point.vertices().iter().zip(point.weights()) {
            let start = masters.len();
            self.vertex_masters(vertex, masters);
            for m in &mut masters[start..] {
                m.weight *= weight;
            }
        }
    }
}
