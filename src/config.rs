//! Scenario files for replaying recorded contact steps

use crate::body::{AttachmentGraph, BodyId, CollidableBody, ComponentId, DeformableMeshBody, RigidMeshBody};
use crate::contact::{CollisionHandler, ContactBehavior, ContactInfo, ScriptedCollider};
use crate::error::{ContactError, Result};
use crate::mesh::types::{Point, Pose, SurfaceMesh, TriFace, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of collidable body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    /// One frame component, low DOF
    Rigid,
    /// One point component per vertex
    Deformable,
}

fn default_mass() -> f64 {
    1.0
}

/// Description of one body of the pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Name used in logs and reports
    pub name: String,

    pub kind: BodyKind,

    /// Total mass
    #[serde(default = "default_mass")]
    pub mass: f64,

    /// Mesh vertices in mesh coordinates
    pub vertices: Vec<[f64; 3]>,

    /// Triangles as vertex index triples
    pub faces: Vec<[usize; 3]>,

    /// Translation of the mesh-to-world pose
    #[serde(default)]
    pub translation: [f64; 3],

    /// Linear velocity of every component
    #[serde(default)]
    pub velocity: [f64; 3],

    /// Rigid bodies only: body is not simulated
    #[serde(default)]
    pub fixed: bool,

    /// Deformable bodies only: vertices whose nodes are not simulated
    #[serde(default)]
    pub fixed_vertices: Vec<usize>,
}

impl BodyConfig {
    /// Number of dynamic components the body creates
    pub fn num_components(&self) -> usize {
        match self.kind {
            BodyKind::Rigid => 1,
            BodyKind::Deformable => self.vertices.len(),
        }
    }

    fn build_mesh(&self) -> Result<SurfaceMesh> {
        let vertices = self
            .vertices
            .iter()
            .map(|&[x, y, z]| Point::new(x, y, z))
            .collect();
        let faces = self.faces.iter().map(|&ids| TriFace::new(ids)).collect();
        let mut mesh = SurfaceMesh::new(vertices, faces)?;
        let [tx, ty, tz] = self.translation;
        if tx != 0.0 || ty != 0.0 || tz != 0.0 {
            mesh.set_mesh_to_world(Pose::translation(tx, ty, tz));
        }
        Ok(mesh)
    }

    /// Create the body with components numbered from `first_component`
    pub fn build(&self, id: BodyId, first_component: u32) -> Result<Box<dyn CollidableBody>> {
        let mesh = self.build_mesh()?;
        let velocity = Vec3::from(self.velocity);

        match self.kind {
            BodyKind::Rigid => {
                let mut body = RigidMeshBody::new(
                    id,
                    self.name.clone(),
                    mesh,
                    ComponentId(first_component),
                    self.mass,
                );
                body.set_velocity(velocity, Vec3::zeros());
                body.set_dynamic(!self.fixed);
                Ok(Box::new(body))
            }
            BodyKind::Deformable => {
                let mut body = DeformableMeshBody::new(
                    id,
                    self.name.clone(),
                    mesh,
                    ComponentId(first_component),
                    self.mass,
                );
                for node in 0..self.vertices.len() {
                    body.set_node_velocity(node, velocity)?;
                }
                for &v in &self.fixed_vertices {
                    body.set_node_dynamic(v, false)?;
                }
                Ok(Box::new(body))
            }
        }
    }
}

/// An attachment of one component to its masters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    pub component: u32,
    pub masters: Vec<u32>,
}

/// One recorded step: collider output and the solver's impulses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Collider output for the step; absent means no contact
    #[serde(default)]
    pub contact_info: Option<ContactInfo>,

    /// Impulses returned by the solver, bilaterals first then unilaterals
    #[serde(default)]
    pub impulses: Vec<f64>,
}

/// Top-level replay scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// The two bodies of the pair
    pub bodies: [BodyConfig; 2],

    /// Contact parameters for the pair
    #[serde(default)]
    pub behavior: ContactBehavior,

    #[serde(default)]
    pub attachments: Vec<AttachmentConfig>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl ScenarioConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContactError::ConfigError(format!("Failed to read scenario file: {}", e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ContactError::ConfigError(format!("Failed to parse scenario file: {}", e))
        })
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            ContactError::ConfigError(format!("Failed to serialize scenario: {}", e))
        })?;

        std::fs::write(path, content).map_err(|e| {
            ContactError::ConfigError(format!("Failed to write scenario file: {}", e))
        })?;

        Ok(())
    }

    /// Build both bodies; body 1's components follow body 0's
    pub fn build_bodies(&self) -> Result<[Box<dyn CollidableBody>; 2]> {
        let first1 = u32::try_from(self.bodies[0].num_components()).map_err(|_| {
            ContactError::ConfigError("Too many components in body 0".to_string())
        })?;
        Ok([
            self.bodies[0].build(BodyId(0), 0)?,
            self.bodies[1].build(BodyId(1), first1)?,
        ])
    }

    pub fn build_handler(&self) -> Result<CollisionHandler> {
        let [body0, body1] = self.build_bodies()?;
        Ok(CollisionHandler::new(body0, body1, self.behavior.clone()))
    }

    /// Collider replaying the recorded steps in order
    pub fn build_collider(&self) -> ScriptedCollider {
        self.steps.iter().map(|s| s.contact_info.clone()).collect()
    }

    pub fn build_attachments(&self) -> AttachmentGraph {
        let mut graph = AttachmentGraph::new();
        for a in &self.attachments {
            graph.attach(
                ComponentId(a.component),
                a.masters.iter().map(|&m| ComponentId(m)).collect(),
            );
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::CollisionMethod;

    const SCENARIO: &str = r#"{
        "bodies": [
            {
                "name": "sheet",
                "kind": "deformable",
                "mass": 4.0,
                "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
                "faces": [[0,1,2],[0,2,3]],
                "fixed_vertices": [3]
            },
            {
                "name": "block",
                "kind": "rigid",
                "vertices": [[0,0,0],[1,0,0],[0,1,0]],
                "faces": [[0,1,2]],
                "translation": [0, 0, 0.5]
            }
        ],
        "behavior": {"friction": 0.2},
        "attachments": [{"component": 0, "masters": [4]}],
        "steps": [{}, {"impulses": [1.0]}]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let config: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        assert_eq!(config.bodies[0].kind, BodyKind::Deformable);
        assert_eq!(config.bodies[1].mass, 1.0);
        assert_eq!(config.behavior.friction, 0.2);
        assert_eq!(config.behavior.method, CollisionMethod::Default);
        assert_eq!(config.behavior.max_unilaterals, 100);
        assert_eq!(config.steps.len(), 2);
        assert!(config.steps[0].contact_info.is_none());
    }

    #[test]
    fn test_component_numbering() {
        let config: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        let [sheet, block] = config.build_bodies().unwrap();

        assert!(sheet.contains_contact_master(ComponentId(3)));
        assert!(!sheet.contains_contact_master(ComponentId(4)));
        assert!(block.contains_contact_master(ComponentId(4)));
        assert_eq!(block.collision_mesh().world_vertex(0).unwrap().z, 0.5);

        let graph = config.build_attachments();
        assert!(graph.vertex_attached_to(0, sheet.as_ref(), block.as_ref()));

        let mut masters = Vec::new();
        sheet.vertex_masters(3, &mut masters);
        assert!(!masters[0].controllable);
    }

    #[test]
    fn test_scenario_file_round_trip() {
        let config: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");

        config.to_file(&path).unwrap();
        let loaded = ScenarioConfig::from_file(&path).unwrap();
        assert_eq!(loaded.bodies[1].name, "block");
        assert_eq!(loaded.build_collider().len(), 2);

        assert!(matches!(
            ScenarioConfig::from_file(&dir.path().join("missing.json")),
            Err(ContactError::ConfigError(_))
        ));
    }

    #[test]
    fn test_bad_face_index_rejected() {
        let mut config: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        config.bodies[1].faces.push([0, 1, 9]);
        assert!(config.build_bodies().is_err());
    }
}
