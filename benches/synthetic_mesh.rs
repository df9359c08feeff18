//! Synthetic mesh generation utilities for benchmarking
//!
//! Triangle grids and matching collider output, so the handler can be timed
//! at scale without a collision detector.

use contact_handler::contact::{ContactInfo, ContactPlane, PenetratingPoint};
use contact_handler::mesh::types::{Point, SurfaceMesh, TriFace, Vec3};

/// Generate a flat `nx` × `ny` grid of cells at height `z`
///
/// Each cell is split into two triangles, so the mesh has `2 * nx * ny`
/// faces and `(nx + 1) * (ny + 1)` vertices. Normals point along +z.
pub fn generate_tri_grid(nx: usize, ny: usize, cell_size: f64, z: f64) -> SurfaceMesh {
    let num_x = nx + 1;
    let mut vertices = Vec::with_capacity(num_x * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            vertices.push(Point::new(i as f64 * cell_size, j as f64 * cell_size, z));
        }
    }

    let mut faces = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let n0 = vertex_index(i, j, num_x);
            let n1 = vertex_index(i + 1, j, num_x);
            let n2 = vertex_index(i + 1, j + 1, num_x);
            let n3 = vertex_index(i, j + 1, num_x);
            faces.push(TriFace::new([n0, n1, n2]));
            faces.push(TriFace::new([n0, n2, n3]));
        }
    }

    SurfaceMesh::new(vertices, faces).expect("grid indices are in range")
}

#[inline]
fn vertex_index(i: usize, j: usize, nx: usize) -> usize {
    j * nx + i
}

/// Collider output for a sheet sunk `depth` into a plane at z = 0
///
/// Every sheet vertex penetrates the face of `target` below it. Both grids
/// must share the same cell layout.
pub fn sheet_penetration(sheet: &SurfaceMesh, target: &SurfaceMesh, depth: f64) -> ContactInfo {
    let penetrating_points0 = (0..sheet.num_vertices())
        .map(|v| {
            let p = sheet.vertices[v];
            let face = v.min(target.num_faces().saturating_sub(1));
            PenetratingPoint {
                vertex: v,
                face,
                coords: [0.25, 0.25],
                position: Point::new(p.x, p.y, 0.0),
                distance: depth,
            }
        })
        .collect();

    ContactInfo {
        penetrating_points0,
        ..ContactInfo::default()
    }
}

/// Collider output with `num_planes` contact planes of `points_per_plane`
pub fn contour_planes(num_planes: usize, points_per_plane: usize) -> ContactInfo {
    let contact_planes = (0..num_planes)
        .map(|k| ContactPlane {
            normal: Vec3::z(),
            points: (0..points_per_plane)
                .map(|i| Point::new(i as f64 * 0.01, k as f64 * 0.01, 0.0))
                .collect(),
            depth: 0.001 * (k + 1) as f64,
        })
        .collect();

    ContactInfo {
        contact_planes,
        ..ContactInfo::default()
    }
}
