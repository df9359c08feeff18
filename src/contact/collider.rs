//! Collider output consumed by the constraint builders
//!
//! Detection itself is external. A [`Collider`] hands back raw geometric
//! primitives for a pair of meshes; [`ScriptedCollider`] replays recorded
//! output for tests and the replay command.

use crate::mesh::types::{Point, SurfaceMesh, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A vertex of one mesh lying inside the other mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenetratingPoint {
    /// Penetrating vertex index
    pub vertex: usize,

    /// Nearest face on the opposing mesh
    pub face: usize,

    /// Face coordinates `(s1, s2)` of the nearest point on that face
    pub coords: [f64; 2],

    /// World position of the nearest point on the face
    pub position: Point,

    /// Penetration depth (positive inside)
    pub distance: f64,
}

/// Closest points between an edge of mesh 0 and an edge of mesh 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeEdgeContact {
    /// Edge of mesh 0 as (tail, head) vertex indices
    pub edge0: (usize, usize),
    /// Parameter along `edge0` from the tail
    pub s0: f64,
    pub point0: Point,

    /// Edge of mesh 1 as (tail, head) vertex indices
    pub edge1: (usize, usize),
    /// Parameter along `edge1` from the tail
    pub s1: f64,
    pub point1: Point,

    /// Unit vector from point 1 toward point 0 for separated edges
    pub point1_to_point0_normal: Vec3,

    /// Penetration displacement (positive when interpenetrating)
    pub displacement: f64,
}

/// A planar contact region between two rigid bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPlane {
    /// Plane normal, pointing toward body 0
    pub normal: Vec3,

    /// Representative points of the region
    pub points: Vec<Point>,

    /// Penetration depth of the region
    pub depth: f64,
}

/// Everything a collider reports for one mesh pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    /// Vertices of mesh 0 inside mesh 1
    pub penetrating_points0: Vec<PenetratingPoint>,

    /// Vertices of mesh 1 inside mesh 0
    pub penetrating_points1: Vec<PenetratingPoint>,

    pub edge_edge_contacts: Vec<EdgeEdgeContact>,

    pub contact_planes: Vec<ContactPlane>,

    /// Intersecting (face of mesh 0, face of mesh 1) pairs
    pub face_intersections: Vec<(usize, usize)>,
}

impl ContactInfo {
    /// True if the collider reported no primitives at all
    pub fn is_empty(&self) -> bool {
        self.penetrating_points0.is_empty()
            && self.penetrating_points1.is_empty()
            && self.edge_edge_contacts.is_empty()
            && self.contact_planes.is_empty()
    }
}

/// Source of contact primitives for a mesh pair
pub trait Collider {
    /// Contacts between the two meshes, or None if they do not touch
    fn get_contacts(&mut self, mesh0: &SurfaceMesh, mesh1: &SurfaceMesh) -> Option<ContactInfo>;
}

/// Collider returning queued results in order
///
/// An empty queue reports no contact.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCollider {
    queue: VecDeque<Option<ContactInfo>>,
}

impl ScriptedCollider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next call
    pub fn push(&mut self, info: Option<ContactInfo>) {
        self.queue.push_back(info);
    }

    /// Number of queued results
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl FromIterator<Option<ContactInfo>> for ScriptedCollider {
    fn from_iter<I: IntoIterator<Item = Option<ContactInfo>>>(iter: I) -> Self {
        Self {
            queue: iter.into_iter().collect(),
        }
    }
}

impl Collider for ScriptedCollider {
    fn get_contacts(&mut self, _mesh0: &SurfaceMesh, _mesh1: &SurfaceMesh) -> Option<ContactInfo> {
        self.queue.pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::types::TriFace;

    fn mesh() -> SurfaceMesh {
        SurfaceMesh::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![TriFace::new([0, 1, 2])],
        )
        .unwrap()
    }

    #[test]
    fn test_scripted_collider_replays_in_order() {
        let mut info = ContactInfo::default();
        info.contact_planes.push(ContactPlane {
            normal: Vec3::z(),
            points: vec![Point::origin()],
            depth: 0.01,
        });

        let mut collider: ScriptedCollider = vec![Some(info.clone()), None].into_iter().collect();
        assert_eq!(collider.len(), 2);

        let m = mesh();
        assert_eq!(collider.get_contacts(&m, &m), Some(info));
        assert_eq!(collider.get_contacts(&m, &m), None);
        assert!(collider.is_empty());
        assert_eq!(collider.get_contacts(&m, &m), None);
    }

    #[test]
    fn test_contact_info_deserializes_with_defaults() {
        let json = r#"{
            "penetrating_points0": [
                {"vertex": 3, "face": 0, "coords": [0.2, 0.3],
                 "position": [0.0, 0.0, 0.0], "distance": 0.01}
            ]
        }"#;
        let info: ContactInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.penetrating_points0.len(), 1);
        assert!(info.penetrating_points1.is_empty());
        assert!(!info.is_empty());
        assert!(ContactInfo::default().is_empty());
    }
}
