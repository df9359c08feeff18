//! Core mesh data structures

use crate::error::{ContactError, Result};
use crate::mesh::geometry::compute_face_normal;
use nalgebra::{Isometry3, Point3, Vector3};

/// 3D point type
pub type Point = Point3<f64>;

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// Rigid mesh-to-world transform
pub type Pose = Isometry3<f64>;

/// Triangular face with 3 vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriFace {
    /// Vertex indices in counter-clockwise order when viewed from outside
    pub node_ids: [usize; 3],
}

impl TriFace {
    /// Create a new triangle face
    pub fn new(node_ids: [usize; 3]) -> Self {
        Self { node_ids }
    }

    /// Get canonical form for hashing (sorted vertex indices)
    ///
    /// Two faces over the same vertices hash equally regardless of winding.
    pub fn canonical(&self) -> [usize; 3] {
        let mut nodes = self.node_ids;
        nodes.sort_unstable();
        nodes
    }

    /// The three directed edges (tail, head) of this face
    pub fn edges(&self) -> [(usize, usize); 3] {
        let n = self.node_ids;
        [(n[0], n[1]), (n[1], n[2]), (n[2], n[0])]
    }
}

/// Closed or open triangle surface used as a collision mesh
///
/// Vertices are stored in mesh coordinates; `mesh_to_world` maps them into
/// world space. Deformable bodies usually keep an identity transform and move
/// the vertices themselves, rigid bodies move the transform.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    /// Vertex positions in mesh coordinates
    pub vertices: Vec<Point>,

    /// Triangle faces
    pub faces: Vec<TriFace>,

    mesh_to_world: Pose,

    /// One-ring vertex neighbours, built from the faces
    neighbors: Vec<Vec<usize>>,
}

impl SurfaceMesh {
    /// Create a new surface mesh, validating face connectivity
    pub fn new(vertices: Vec<Point>, faces: Vec<TriFace>) -> Result<Self> {
        for (face_idx, face) in faces.iter().enumerate() {
            if let Some(&bad) = face.node_ids.iter().find(|&&v| v >= vertices.len()) {
                return Err(ContactError::GeometryError(format!(
                    "Face {} references vertex {} out of bounds",
                    face_idx, bad
                )));
            }
        }

        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        for face in &faces {
            for (tail, head) in face.edges() {
                if !neighbors[tail].contains(&head) {
                    neighbors[tail].push(head);
                }
                if !neighbors[head].contains(&tail) {
                    neighbors[head].push(tail);
                }
            }
        }

        Ok(Self {
            vertices,
            faces,
            mesh_to_world: Pose::identity(),
            neighbors,
        })
    }

    /// Get total number of vertices
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get total number of faces
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Current mesh-to-world transform
    pub fn mesh_to_world(&self) -> &Pose {
        &self.mesh_to_world
    }

    pub fn set_mesh_to_world(&mut self, pose: Pose) {
        self.mesh_to_world = pose;
    }

    /// True when mesh coordinates already are world coordinates
    pub fn mesh_to_world_is_identity(&self) -> bool {
        self.mesh_to_world == Pose::identity()
    }

    /// World position of a vertex
    pub fn world_vertex(&self, vertex: usize) -> Result<Point> {
        let p = self.vertices.get(vertex).ok_or_else(|| {
            ContactError::InvalidArgument(format!("Vertex index {} out of bounds", vertex))
        })?;
        Ok(self.mesh_to_world * p)
    }

    /// Vertices sharing an edge with `vertex`
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        self.neighbors
            .get(vertex)
            .map(|n| n.as_slice())
            .unwrap_or(&[])
    }

    /// Unit face normal in mesh coordinates
    pub fn face_normal(&self, face: usize) -> Result<Vec3> {
        let face = self.faces.get(face).ok_or_else(|| {
            ContactError::InvalidArgument(format!("Face index {} out of bounds", face))
        })?;
        compute_face_normal(face, &self.vertices)
    }

    /// Unit face normal in world coordinates
    pub fn world_face_normal(&self, face: usize) -> Result<Vec3> {
        let normal = self.face_normal(face)?;
        if self.mesh_to_world_is_identity() {
            Ok(normal)
        } else {
            Ok(self.mesh_to_world.rotation * normal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn make_square() -> SurfaceMesh {
        SurfaceMesh::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![TriFace::new([0, 1, 2]), TriFace::new([0, 2, 3])],
        )
        .unwrap()
    }

    #[test]
    fn test_tri_canonical() {
        let face1 = TriFace::new([4, 2, 9]);
        let face2 = TriFace::new([9, 4, 2]);

        assert_eq!(face1.canonical(), face2.canonical());
        assert_eq!(face1.canonical(), [2, 4, 9]);
    }

    #[test]
    fn test_neighbors() {
        let mesh = make_square();

        let mut n0 = mesh.neighbors(0).to_vec();
        n0.sort();
        assert_eq!(n0, vec![1, 2, 3]);

        let mut n1 = mesh.neighbors(1).to_vec();
        n1.sort();
        assert_eq!(n1, vec![0, 2]);
        assert!(mesh.neighbors(42).is_empty());
    }

    #[test]
    fn test_invalid_face_rejected() {
        let result = SurfaceMesh::new(
            vec![Point::origin(), Point::new(1.0, 0.0, 0.0)],
            vec![TriFace::new([0, 1, 2])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_world_normal_follows_transform() {
        let mut mesh = make_square();
        assert!(mesh.mesh_to_world_is_identity());
        assert_relative_eq!(mesh.world_face_normal(0).unwrap().z, 1.0, epsilon = 1e-12);

        // Rotate a quarter turn about x: +z maps to -y
        let rotation = UnitQuaternion::from_axis_angle(&Vec3::x_axis(), std::f64::consts::FRAC_PI_2);
        mesh.set_mesh_to_world(Pose::from_parts(Translation3::new(0.0, 0.0, 2.0), rotation));
        assert!(!mesh.mesh_to_world_is_identity());

        let normal = mesh.world_face_normal(0).unwrap();
        assert_relative_eq!(normal.y, -1.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.world_vertex(0).unwrap().z, 2.0, epsilon = 1e-12);
        assert!(mesh.world_vertex(4).is_err());
    }
}
