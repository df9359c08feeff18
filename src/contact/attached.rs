//! Attachment-aware contact filtering
//!
//! Vertices whose motion is already fixed to the opposing body are collected
//! once per body over the whole mesh and cached against the attachment
//! graph's topology version and the mesh sizes.

use crate::body::{AttachmentGraph, CollidableBody};
use crate::contact::types::ContactPoint;
use crate::mesh::types::SurfaceMesh;
use std::collections::HashSet;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Vertices of one body that are attached to the opposing body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachedVertexSet {
    vertices: HashSet<usize>,
}

impl AttachedVertexSet {
    pub fn contains(&self, vertex: usize) -> bool {
        self.vertices.contains(&vertex)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl FromIterator<usize> for AttachedVertexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            vertices: iter.into_iter().collect(),
        }
    }
}

/// True if a contact point touches, or for a single vertex borders, an
/// attached vertex
pub fn attached_near_contact(
    point: &ContactPoint,
    mesh: &SurfaceMesh,
    attached: Option<&AttachedVertexSet>,
) -> bool {
    let Some(attached) = attached.filter(|a| !a.is_empty()) else {
        return false;
    };
    if point.vertices().iter().any(|&v| attached.contains(v)) {
        return true;
    }
    match point.vertices() {
        [vertex] => mesh.neighbors(*vertex).iter().any(|&n| attached.contains(n)),
        _ => false,
    }
}

/// Collect the vertices of `body` attached to `other`
///
/// Low-DOF bodies and bodies with nothing attached yield None.
pub fn compute_attached_vertices(
    body: &dyn CollidableBody,
    other: &dyn CollidableBody,
    graph: &AttachmentGraph,
) -> Option<AttachedVertexSet> {
    if body.is_low_dof() {
        return None;
    }

    let num_vertices = body.collision_mesh().num_vertices();

    // Threshold for parallelization (below this, overhead isn't worth it)
    const PARALLEL_THRESHOLD: usize = 1000;

    #[cfg(feature = "parallel")]
    let attached: AttachedVertexSet = if num_vertices >= PARALLEL_THRESHOLD {
        (0..num_vertices)
            .into_par_iter()
            .filter(|&v| graph.vertex_attached_to(v, body, other))
            .collect::<Vec<usize>>()
            .into_iter()
            .collect()
    } else {
        (0..num_vertices)
            .filter(|&v| graph.vertex_attached_to(v, body, other))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let attached: AttachedVertexSet = (0..num_vertices)
        .filter(|&v| graph.vertex_attached_to(v, body, other))
        .collect();

    if attached.is_empty() {
        None
    } else {
        log::debug!(
            "{} of {} vertices of '{}' are attached to '{}'",
            attached.len(),
            num_vertices,
            body.name(),
            other.name()
        );
        Some(attached)
    }
}

/// Attached-vertex sets for both bodies of a pair
#[derive(Debug, Clone, Default)]
pub struct AttachedVertexCache {
    /// Graph version and vertex counts of both meshes at the last update
    key: Option<(u64, usize, usize)>,
    sets: [Option<AttachedVertexSet>; 2],
}

impl AttachedVertexCache {
    /// Recompute both sets if the graph changed since the last update
    pub fn update(
        &mut self,
        body0: &dyn CollidableBody,
        body1: &dyn CollidableBody,
        graph: &AttachmentGraph,
    ) {
        let key = (
            graph.version(),
            body0.collision_mesh().num_vertices(),
            body1.collision_mesh().num_vertices(),
        );
        if self.key == Some(key) {
            return;
        }
        self.sets = [
            compute_attached_vertices(body0, body1, graph),
            compute_attached_vertices(body1, body0, graph),
        ];
        self.key = Some(key);
    }

    /// Force recomputation on the next update
    pub fn invalidate(&mut self) {
        self.key = None;
        self.sets = [None, None];
    }

    pub fn is_valid(&self) -> bool {
        self.key.is_some()
    }

    /// Attached set of body `idx` (0 or 1)
    pub fn get(&self, idx: usize) -> Option<&AttachedVertexSet> {
        self.sets.get(idx).and_then(|s| s.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyId, ComponentId, DeformableMeshBody, RigidMeshBody};
    use crate::mesh::types::{Point, TriFace};

    fn strip() -> SurfaceMesh {
        // 0 - 1 - 2 - 3 along x, with a second row above
        let mut vertices = Vec::new();
        for j in 0..2 {
            for i in 0..4 {
                vertices.push(Point::new(i as f64, j as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for i in 0..3 {
            faces.push(TriFace::new([i, i + 1, i + 5]));
            faces.push(TriFace::new([i, i + 5, i + 4]));
        }
        SurfaceMesh::new(vertices, faces).unwrap()
    }

    fn bodies() -> (DeformableMeshBody, RigidMeshBody) {
        (
            DeformableMeshBody::new(BodyId(0), "strip", strip(), ComponentId(100), 1.0),
            RigidMeshBody::new(BodyId(1), "anchor", strip(), ComponentId(1), 1.0),
        )
    }

    #[test]
    fn test_compute_attached_vertices() {
        let (sheet, anchor) = bodies();
        let mut graph = AttachmentGraph::new();
        assert!(compute_attached_vertices(&sheet, &anchor, &graph).is_none());

        graph.attach(ComponentId(100), vec![ComponentId(1)]);
        let attached = compute_attached_vertices(&sheet, &anchor, &graph).unwrap();
        assert_eq!(attached.len(), 1);
        assert!(attached.contains(0));

        // rigid bodies never have an attached set
        assert!(compute_attached_vertices(&anchor, &sheet, &graph).is_none());
    }

    #[test]
    fn test_attached_near_contact_expands_single_vertex() {
        let mesh = strip();
        let attached: AttachedVertexSet = [0usize].into_iter().collect();

        let on = ContactPoint::from_vertex(&mesh, BodyId(0), 0).unwrap();
        let neighbour = ContactPoint::from_vertex(&mesh, BodyId(0), 1).unwrap();
        let far = ContactPoint::from_vertex(&mesh, BodyId(0), 3).unwrap();

        assert!(attached_near_contact(&on, &mesh, Some(&attached)));
        assert!(attached_near_contact(&neighbour, &mesh, Some(&attached)));
        assert!(!attached_near_contact(&far, &mesh, Some(&attached)));
        assert!(!attached_near_contact(&on, &mesh, None));

        // face points are not expanded to neighbours
        let face = ContactPoint::from_face(Point::origin(), BodyId(0), &TriFace::new([1, 2, 6]), [0.3, 0.3]);
        assert!(!attached_near_contact(&face, &mesh, Some(&attached)));
    }

    #[test]
    fn test_cache_tracks_graph_version() {
        let (sheet, anchor) = bodies();
        let mut graph = AttachmentGraph::new();
        let mut cache = AttachedVertexCache::default();

        cache.update(&sheet, &anchor, &graph);
        assert!(cache.is_valid());
        assert!(cache.get(0).is_none());

        graph.attach(ComponentId(103), vec![ComponentId(1)]);
        cache.update(&sheet, &anchor, &graph);
        assert!(cache.get(0).unwrap().contains(3));
        assert!(cache.get(1).is_none());

        cache.invalidate();
        assert!(!cache.is_valid());
        assert!(cache.get(0).is_none());
    }

    #[test]
    fn test_cache_refreshes_for_other_graph() {
        let (sheet, anchor) = bodies();
        let mut first = AttachmentGraph::new();
        first.attach(ComponentId(100), vec![ComponentId(1)]);
        let mut second = AttachmentGraph::new();
        second.attach(ComponentId(107), vec![ComponentId(1)]);

        let mut cache = AttachedVertexCache::default();
        cache.update(&sheet, &anchor, &first);
        assert!(cache.get(0).unwrap().contains(0));

        // same number of edits, different topology
        cache.update(&sheet, &anchor, &second);
        let attached = cache.get(0).unwrap();
        assert!(!attached.contains(0));
        assert!(attached.contains(7));
    }
}
