//! Geometric operations for mesh elements

use crate::error::{ContactError, Result};
use crate::mesh::types::{Point, TriFace, Vec3};

/// Compute the unit normal vector of a triangle face
/// Uses the cross product of two edges, counter-clockwise winding points outward
pub fn compute_face_normal(face: &TriFace, nodes: &[Point]) -> Result<Vec3> {
    let n0 = get_node(nodes, face.node_ids[0])?;
    let n1 = get_node(nodes, face.node_ids[1])?;
    let n2 = get_node(nodes, face.node_ids[2])?;

    let normal = (n1 - n0).cross(&(n2 - n0));

    let norm = normal.norm();
    if norm < 1e-12 {
        return Err(ContactError::GeometryError(
            "Degenerate face (zero normal)".to_string(),
        ));
    }

    Ok(normal / norm)
}

/// Barycentric weights of face coordinates `(s1, s2)`
///
/// The point is `(1 - s1 - s2) * v0 + s1 * v1 + s2 * v2`.
pub fn barycentric_weights(s1: f64, s2: f64) -> [f64; 3] {
    [1.0 - s1 - s2, s1, s2]
}

/// Height of `point` above the plane through `plane_point` with unit `normal`
///
/// Contact distances are measured this way, from the opposing contact point
/// along the constraint normal, so a negative value is penetration.
pub fn signed_distance_to_plane(point: &Point, plane_point: &Point, normal: &Vec3) -> f64 {
    (point - plane_point).dot(normal)
}

/// Project a vector onto the plane perpendicular to a unit normal
pub fn tangential_component(v: &Vec3, normal: &Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Two unit tangents spanning the plane perpendicular to a unit normal
///
/// The first tangent is built from the coordinate axis least aligned with the
/// normal, so the basis is stable for a fixed normal.
pub fn tangent_basis(normal: &Vec3) -> (Vec3, Vec3) {
    let abs = normal.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vec3::x()
    } else if abs.y <= abs.z {
        Vec3::y()
    } else {
        Vec3::z()
    };
    let t0 = tangential_component(&axis, normal).normalize();
    let t1 = normal.cross(&t0);
    (t0, t1)
}

/// Helper to safely get a node from the node array
fn get_node(nodes: &[Point], index: usize) -> Result<&Point> {
    nodes.get(index).ok_or_else(|| {
        ContactError::GeometryError(format!("Node index {} out of bounds", index))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_triangle() -> (TriFace, Vec<Point>) {
        let face = TriFace::new([0, 1, 2]);
        let nodes = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(0.0, 2.0, 0.0),
        ];
        (face, nodes)
    }

    #[test]
    fn test_face_normal() {
        let (face, nodes) = make_triangle();
        let normal = compute_face_normal(&face, &nodes).unwrap();

        assert_relative_eq!(normal.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(normal.y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(normal.z, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_face() {
        let face = TriFace::new([0, 1, 2]);
        let nodes = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
        ];
        assert!(compute_face_normal(&face, &nodes).is_err());
    }

    #[test]
    fn test_barycentric_weights_sum_to_one() {
        let w = barycentric_weights(0.25, 0.5);
        assert_relative_eq!(w[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_signed_distance_to_plane() {
        let face_point = Point::new(0.6, 0.3, 0.0);
        let normal = Vec3::z();

        // a vertex sunk below the face penetrates
        let sunk = Point::new(0.5, 0.5, -0.01);
        assert_relative_eq!(signed_distance_to_plane(&sunk, &face_point, &normal), -0.01, epsilon = 1e-12);

        // tangential offset does not count
        let clear = Point::new(3.0, -2.0, 0.02);
        assert_relative_eq!(signed_distance_to_plane(&clear, &face_point, &normal), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_tangent_basis_is_orthonormal() {
        for normal in [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 0.0).normalize(),
            Vec3::new(-0.3, 0.8, 0.2).normalize(),
        ] {
            let (t0, t1) = tangent_basis(&normal);
            assert_relative_eq!(t0.norm(), 1.0, epsilon = 1e-10);
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-10);
            assert_relative_eq!(t0.dot(&normal), 0.0, epsilon = 1e-10);
            assert_relative_eq!(t1.dot(&normal), 0.0, epsilon = 1e-10);
            assert_relative_eq!(t0.dot(&t1), 0.0, epsilon = 1e-10);
        }
    }
}
