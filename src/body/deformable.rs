//! Deformable body whose mesh vertices are driven by dynamic nodes

use crate::body::{BodyId, CollidableBody, ComponentId};
use crate::contact::types::{ContactMaster, MasterKind};
use crate::error::{ContactError, Result};
use crate::mesh::types::{Point, SurfaceMesh, Vec3};
use std::collections::HashMap;

/// A dynamic point component (particle or FEM node)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub component: ComponentId,
    pub mass: f64,
    pub velocity: Vec3,
    /// Non-dynamic nodes are fixed or driven parametrically
    pub dynamic: bool,
}

/// Deformable body with one or more nodes per collision vertex
///
/// By default vertex `i` is driven by node `i` alone. A vertex can instead be
/// embedded in several nodes with interpolation weights, as an FEM surface
/// vertex is embedded in the nodes of its element.
#[derive(Debug, Clone)]
pub struct DeformableMeshBody {
    id: BodyId,
    name: String,
    mesh: SurfaceMesh,
    nodes: Vec<Node>,
    /// Per-vertex (node index, weight) list
    bindings: Vec<Vec<(usize, f64)>>,
    node_lookup: HashMap<ComponentId, usize>,
}

impl DeformableMeshBody {
    /// Create a body with one node per mesh vertex
    ///
    /// Node components are numbered consecutively from `first_component` and
    /// share `total_mass` equally.
    pub fn new(
        id: BodyId,
        name: impl Into<String>,
        mesh: SurfaceMesh,
        first_component: ComponentId,
        total_mass: f64,
    ) -> Self {
        let count = mesh.num_vertices();
        let node_mass = if count > 0 { total_mass / count as f64 } else { 0.0 };
        let nodes: Vec<Node> = (0..count)
            .map(|i| Node {
                component: ComponentId(first_component.0 + i as u32),
                mass: node_mass,
                velocity: Vec3::zeros(),
                dynamic: true,
            })
            .collect();
        let node_lookup = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.component, i))
            .collect();
        let bindings = (0..count).map(|i| vec![(i, 1.0)]).collect();

        Self {
            id,
            name: name.into(),
            mesh,
            nodes,
            bindings,
            node_lookup,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Add an extra node not tied to any vertex; returns its index
    pub fn add_node(&mut self, component: ComponentId, mass: f64) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            component,
            mass,
            velocity: Vec3::zeros(),
            dynamic: true,
        });
        self.node_lookup.insert(component, idx);
        idx
    }

    /// Drive `vertex` by a weighted combination of nodes
    pub fn embed_vertex(&mut self, vertex: usize, binding: Vec<(usize, f64)>) -> Result<()> {
        if vertex >= self.bindings.len() {
            return Err(ContactError::InvalidArgument(format!(
                "Vertex index {} out of bounds",
                vertex
            )));
        }
        if let Some(&(bad, _)) = binding.iter().find(|(n, _)| *n >= self.nodes.len()) {
            return Err(ContactError::InvalidArgument(format!(
                "Node index {} out of bounds",
                bad
            )));
        }
        self.bindings[vertex] = binding;
        Ok(())
    }

    pub fn set_node_dynamic(&mut self, node: usize, dynamic: bool) -> Result<()> {
        self.node_mut(node)?.dynamic = dynamic;
        Ok(())
    }

    pub fn set_node_velocity(&mut self, node: usize, velocity: Vec3) -> Result<()> {
        self.node_mut(node)?.velocity = velocity;
        Ok(())
    }

    fn node_mut(&mut self, node: usize) -> Result<&mut Node> {
        self.nodes.get_mut(node).ok_or_else(|| {
            ContactError::InvalidArgument(format!("Node index {} out of bounds", node))
        })
    }
}

impl CollidableBody for DeformableMeshBody {
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
        false
    }

    fn mass(&self) -> f64 {
        self.nodes.iter().map(|n| n.mass).sum()
    }

    fn vertex_masters(&self, vertex: usize, masters: &mut Vec<ContactMaster>) {
        let Some(binding) = self.bindings.get(vertex) else {
            return;
        };
        for &(node_idx, weight) in binding {
            let node = &self.nodes[node_idx];
            masters.push(ContactMaster {
                component: node.component,
                weight,
                kind: MasterKind::Point {
                    velocity: node.velocity,
                },
                controllable: node.dynamic,
            });
        }
    }

    // Free points only arise on contour regions, which deformable bodies never
    // take part in. Fall back to the nearest vertex.
    fn free_point_masters(&self, point: &Point, masters: &mut Vec<ContactMaster>) {
        let nearest = (0..self.mesh.num_vertices())
            .filter_map(|v| {
                let p = self.mesh.world_vertex(v).ok()?;
                Some((v, (p - point).norm_squared()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((vertex, _)) = nearest {
            self.vertex_masters(vertex, masters);
        }
    }

    fn contains_contact_master(&self, component: ComponentId) -> bool {
        self.node_lookup.contains_key(&component)
    }
}
