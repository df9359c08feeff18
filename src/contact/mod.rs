//! Contact constraint generation and solver interface

pub mod attached;
pub mod collider;
pub mod handler;
pub mod metrics;
pub mod solver;
pub mod store;
pub mod types;

pub use attached::{AttachedVertexCache, AttachedVertexSet};
pub use collider::{Collider, ContactInfo, ContactPlane, EdgeEdgeContact, PenetratingPoint, ScriptedCollider};
pub use handler::{CollisionHandler, UpdateMode};
pub use metrics::StepMetrics;
pub use solver::{
    penetration_gap, ConstraintColumn, ConstraintInfo, ContactForceBehavior, DefaultForceBehavior,
    ForceResponse, FrictionRow, JacobianBlock,
};
pub use store::ConstraintStore;
pub use types::*;
