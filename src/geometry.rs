//! Vertex record generators for the demo scenes.

use std::f32::consts::TAU;

use cgmath::{InnerSpace, Vector3 as Vec3};
use rand::Rng;
use serde::Deserialize;

use crate::vertex::VertexRecord;

pub const POSITION: &str = "position";
pub const TEXTURE_COORD: &str = "textureCoord";
pub const COLOR: &str = "color";

/// `w` x `h` rectangle in the XY plane, in triangle-strip order.
pub fn rect(w: f32, h: f32) -> Vec<VertexRecord> {
    let (kx, ky) = (w * 0.5, h * 0.5);
    [[-kx, -ky], [-kx, ky], [kx, -ky], [kx, ky]]
        .into_iter()
        .map(|[x, y]| VertexRecord::new().with(POSITION, [x, y, 0.0]))
        .collect()
}

/// [`rect`] with texture coordinates spanning 0..1.
pub fn textured_rect(w: f32, h: f32) -> Vec<VertexRecord> {
    let uvs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    rect(w, h)
        .into_iter()
        .zip(uvs)
        .map(|(record, uv)| record.with(TEXTURE_COORD, uv))
        .collect()
}

/// Outline of the cube [-1, 1]^3 as one line strip.
#[rustfmt::skip]
pub fn cube() -> Vec<VertexRecord> {
    const CORNERS: [[f32; 3]; 14] = [
        [-1.0,  1.0,  1.0],
        [ 1.0,  1.0,  1.0],
        [-1.0, -1.0,  1.0],
        [ 1.0, -1.0,  1.0],
        [ 1.0, -1.0, -1.0],
        [ 1.0,  1.0,  1.0],
        [ 1.0,  1.0, -1.0],
        [-1.0,  1.0,  1.0],
        [-1.0,  1.0, -1.0],
        [-1.0, -1.0,  1.0],
        [-1.0, -1.0, -1.0],
        [ 1.0, -1.0, -1.0],
        [-1.0,  1.0, -1.0],
        [ 1.0,  1.0, -1.0],
    ];
    CORNERS
        .into_iter()
        .map(|p| VertexRecord::new().with(POSITION, p))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointShape {
    Box,
    BoxShell,
    #[default]
    Sphere,
    SphereShell,
    Cylinder,
    CylinderShell,
    Cone,
    ConeShell,
}

impl PointShape {
    /// Map three samples in [-0.5, 0.5) to a point on or in the shape.
    pub fn point(self, p: [f32; 3]) -> [f32; 3] {
        // polar coordinates shared by the round shapes
        let r = p[0] + 0.5;
        let a = (p[1] + 0.5) * TAU;
        let h = p[2] + 0.5;

        match self {
            PointShape::Box => p,
            PointShape::BoxShell => {
                let mut out = p;
                let nearest = (0..3)
                    .min_by(|&i, &j| {
                        let di = 0.5 - p[i].abs();
                        let dj = 0.5 - p[j].abs();
                        di.total_cmp(&dj)
                    })
                    .unwrap_or(0);
                out[nearest] = 0.5 * p[nearest].signum();
                out
            }
            PointShape::Sphere => {
                let b = p[2] * 2.0;
                [r * a.cos(), r * a.sin(), b * (1.0 - r * r).max(0.0).sqrt()]
            }
            PointShape::SphereShell => {
                let v = Vec3::from(p);
                if v.magnitude2() <= f32::EPSILON {
                    [0.0, 0.0, 1.0]
                } else {
                    v.normalize().into()
                }
            }
            PointShape::Cylinder => [r * a.cos(), r * a.sin(), p[2]],
            PointShape::CylinderShell => [a.cos(), a.sin(), p[2]],
            PointShape::Cone => [r * a.cos(), r * a.sin(), h * (1.0 - r)],
            PointShape::ConeShell => [r * a.cos(), r * a.sin(), 1.0 - r],
        }
    }
}

/// `count` random points of `shape`.
pub fn point_cloud<R: Rng + ?Sized>(shape: PointShape, count: usize, rng: &mut R) -> Vec<VertexRecord> {
    (0..count)
        .map(|_| {
            let sample = [
                rng.random_range(-0.5..0.5),
                rng.random_range(-0.5..0.5),
                rng.random_range(-0.5..0.5),
            ];
            VertexRecord::new().with(POSITION, shape.point(sample))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    #[test]
    fn rect_is_centered_strip() {
        let r = rect(2.0, 4.0);
        let positions: Vec<_> = r.iter().map(|v| v.get(POSITION).unwrap().to_vec()).collect();
        assert_eq!(
            positions,
            vec![
                vec![-1.0, -2.0, 0.0],
                vec![-1.0, 2.0, 0.0],
                vec![1.0, -2.0, 0.0],
                vec![1.0, 2.0, 0.0],
            ]
        );
    }

    #[test]
    fn textured_rect_maps_corners() {
        let r = textured_rect(1.0, 1.0);
        assert_eq!(r[1].get(TEXTURE_COORD), Some(&[0.0, 1.0][..]));
        assert_eq!(r[2].get(TEXTURE_COORD), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn cube_strip_has_fourteen_corners() {
        let c = cube();
        assert_eq!(c.len(), 14);
        assert!(c.iter().all(|v| v.get(POSITION).unwrap().iter().all(|x| x.abs() == 1.0)));
    }

    #[rstest]
    #[case(PointShape::Box, 0.5 * 3f32.sqrt())]
    #[case(PointShape::BoxShell, 0.5 * 3f32.sqrt())]
    #[case(PointShape::Sphere, 1.0)]
    #[case(PointShape::Cylinder, 2f32.sqrt())]
    #[case(PointShape::Cone, 2f32.sqrt())]
    #[case(PointShape::ConeShell, 2f32.sqrt())]
    fn points_stay_bounded(#[case] shape: PointShape, #[case] radius: f32) {
        let mut rng = StdRng::seed_from_u64(7);
        for record in point_cloud(shape, 500, &mut rng) {
            let p = Vec3::from(<[f32; 3]>::try_from(record.get(POSITION).unwrap()).unwrap());
            assert!(p.magnitude() <= radius + 1e-4, "{shape:?} produced {p:?}");
        }
    }

    #[rstest]
    #[case(PointShape::SphereShell)]
    #[case(PointShape::CylinderShell)]
    fn shell_points_lie_on_surface(#[case] shape: PointShape) {
        let mut rng = StdRng::seed_from_u64(11);
        for record in point_cloud(shape, 200, &mut rng) {
            let p = record.get(POSITION).unwrap();
            let radial = match shape {
                PointShape::SphereShell => Vec3::new(p[0], p[1], p[2]).magnitude(),
                _ => (p[0] * p[0] + p[1] * p[1]).sqrt(),
            };
            assert!((radial - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn box_shell_snaps_nearest_wall() {
        assert_eq!(PointShape::BoxShell.point([0.1, -0.45, 0.2]), [0.1, -0.5, 0.2]);
    }
}
