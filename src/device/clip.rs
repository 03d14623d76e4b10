use super::vertex_shader::ClipSpaceVertex;

pub trait Clipper {
    /// Clip one triangle; the result holds zero or more triangles.
    fn clip_triangle(&self, triangle: &[ClipSpaceVertex; 3]) -> Vec<[ClipSpaceVertex; 3]>;

    fn clip_line(&self, line: &[ClipSpaceVertex; 2]) -> Option<[ClipSpaceVertex; 2]>;

    fn keep_point(&self, point: &ClipSpaceVertex) -> bool;
}

/// Signed distance to the near plane (z = -w); visible side is >= 0.
fn near_distance(v: &ClipSpaceVertex) -> f32 {
    v.position.z + v.position.w
}

/// Signed distances to the six frustum planes; inside is >= 0.
const FRUSTUM_PLANES: [fn(&ClipSpaceVertex) -> f32; 6] = [
    near_distance,
    |v| v.position.w - v.position.z,
    |v| v.position.w + v.position.x,
    |v| v.position.w - v.position.x,
    |v| v.position.w + v.position.y,
    |v| v.position.w - v.position.y,
];

/// True when every vertex lies beyond the same side plane of the frustum.
fn outside_one_plane(vertices: &[ClipSpaceVertex]) -> bool {
    let planes: [fn(&ClipSpaceVertex) -> bool; 5] = [
        |v| v.position.x > v.position.w,
        |v| v.position.x < -v.position.w,
        |v| v.position.y > v.position.w,
        |v| v.position.y < -v.position.w,
        |v| v.position.z > v.position.w,
    ];
    planes.iter().any(|outside| vertices.iter().all(outside))
}

/// Near-plane clipping plus trivial rejection against the side planes.
/// Lines are cut to the whole frustum.
pub struct NearPlaneClipper;

impl Clipper for NearPlaneClipper {
    fn clip_triangle(&self, triangle: &[ClipSpaceVertex; 3]) -> Vec<[ClipSpaceVertex; 3]> {
        if outside_one_plane(triangle) {
            return vec![];
        }

        let distances = triangle.map(|v| near_distance(&v));
        if distances.iter().all(|d| *d >= 0.0) {
            return vec![*triangle];
        }
        if distances.iter().all(|d| *d < 0.0) {
            return vec![];
        }

        // Sutherland-Hodgman against the near plane, then fan the polygon.
        let mut polygon = Vec::with_capacity(4);
        for i in 0..3 {
            let (a, b) = (&triangle[i], &triangle[(i + 1) % 3]);
            let (da, db) = (distances[i], distances[(i + 1) % 3]);
            if da >= 0.0 {
                polygon.push(*a);
            }
            if (da >= 0.0) != (db >= 0.0) {
                polygon.push(a.lerp(b, da / (da - db)));
            }
        }

        (1..polygon.len() - 1)
            .map(|i| [polygon[0], polygon[i], polygon[i + 1]])
            .collect()
    }

    fn clip_line(&self, line: &[ClipSpaceVertex; 2]) -> Option<[ClipSpaceVertex; 2]> {
        if outside_one_plane(line) {
            return None;
        }

        // Liang-Barsky against all six planes, so endpoints stay inside the viewport.
        let (mut enter, mut exit) = (0.0f32, 1.0f32);
        for distance in FRUSTUM_PLANES {
            let (da, db) = (distance(&line[0]), distance(&line[1]));
            if da < 0.0 && db < 0.0 {
                return None;
            }
            if da < 0.0 {
                enter = enter.max(da / (da - db));
            } else if db < 0.0 {
                exit = exit.min(da / (da - db));
            }
        }
        if enter > exit {
            return None;
        }

        let a = if enter > 0.0 { line[0].lerp(&line[1], enter) } else { line[0] };
        let b = if exit < 1.0 { line[0].lerp(&line[1], exit) } else { line[1] };
        Some([a, b])
    }

    fn keep_point(&self, point: &ClipSpaceVertex) -> bool {
        point.position.w > 0.0 && near_distance(point) >= 0.0 && !outside_one_plane(&[*point])
    }
}
