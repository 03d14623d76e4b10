use cgmath::{Vector2 as Vec2, Vector4 as Vec4, dot};

/// A vertex after perspective division and viewport mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterPoint {
    pub pos: Vec2<f32>,
    /// Window-space depth in 0..1.
    pub z: f32,
    /// 1/w of the clip-space position, for perspective-correct varyings.
    pub inv_w: f32,
    pub color: Vec4<f32>,
    pub uv: Vec2<f32>,
}

/// Interpolated values for one covered pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: usize,
    pub y: usize,
    pub z: f32,
    pub color: Vec4<f32>,
    pub uv: Vec2<f32>,
}

/// Weights of `vertices[0..3]` at `p`, or `None` for a degenerate triangle.
pub fn get_barycentric_coords(
    vertices: &[Vec2<f32>; 3],
    p: &Vec2<f32>,
) -> Option<(f32, f32, f32)> {
    let v0 = vertices[1] - vertices[0];
    let v1 = vertices[2] - vertices[0];
    let v2 = *p - vertices[0];

    let d00 = dot(v0, v0);
    let d01 = dot(v0, v1);
    let d11 = dot(v1, v1);
    let d20 = dot(v2, v0);
    let d21 = dot(v2, v1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-12 {
        return None;
    }

    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;

    Some((u, v, w))
}

/// Pixel bounding box of a triangle, clipped to a `width` x `height` target.
/// `None` when it lies entirely outside.
pub fn get_box(
    vertices: &[Vec2<f32>; 3],
    width: usize,
    height: usize,
) -> Option<(usize, usize, usize, usize)> {
    let mut min_x = vertices[0].x;
    let mut max_x = vertices[0].x;
    let mut min_y = vertices[0].y;
    let mut max_y = vertices[0].y;

    for v in vertices.iter().skip(1) {
        min_x = min_x.min(v.x);
        max_x = max_x.max(v.x);
        min_y = min_y.min(v.y);
        max_y = max_y.max(v.y);
    }

    let min_x = min_x.floor().max(0.0);
    let min_y = min_y.floor().max(0.0);
    let max_x = max_x.ceil().min(width as f32 - 1.0);
    let max_y = max_y.ceil().min(height as f32 - 1.0);
    if min_x > max_x || min_y > max_y {
        return None;
    }
    Some((
        min_x as usize,
        min_y as usize,
        max_x as usize,
        max_y as usize,
    ))
}

pub fn is_inside_triangle(vertices: &[Vec2<f32>; 3], p: &Vec2<f32>) -> bool {
    let v0 = vertices[1] - vertices[0];
    let v1 = vertices[2] - vertices[1];
    let v2 = vertices[0] - vertices[2];

    let p0 = *p - vertices[0];
    let p1 = *p - vertices[1];
    let p2 = *p - vertices[2];

    let cross0 = v0.x * p0.y - v0.y * p0.x;
    let cross1 = v1.x * p1.y - v1.y * p1.x;
    let cross2 = v2.x * p2.y - v2.y * p2.x;

    (cross0 >= 0.0 && cross1 >= 0.0 && cross2 >= 0.0)
        || (cross0 <= 0.0 && cross1 <= 0.0 && cross2 <= 0.0)
}

/// Perspective-correct blend of three points with screen-space weights.
pub fn interpolate(points: &[RasterPoint; 3], bary: (f32, f32, f32)) -> (f32, Vec4<f32>, Vec2<f32>) {
    let (u, v, w) = bary;
    let z = points[0].z * u + points[1].z * v + points[2].z * w;

    let (a, b, c) = (
        u * points[0].inv_w,
        v * points[1].inv_w,
        w * points[2].inv_w,
    );
    let sum = a + b + c;
    let (a, b, c) = if sum.abs() > f32::EPSILON {
        (a / sum, b / sum, c / sum)
    } else {
        (u, v, w)
    };

    let color = points[0].color * a + points[1].color * b + points[2].color * c;
    let uv = points[0].uv * a + points[1].uv * b + points[2].uv * c;
    (z, color, uv)
}

/// Every pixel covered by a triangle, sampled at pixel centers.
pub fn triangle_fragments(points: &[RasterPoint; 3], width: usize, height: usize) -> Vec<Fragment> {
    let corners = [points[0].pos, points[1].pos, points[2].pos];
    let Some((min_x, min_y, max_x, max_y)) = get_box(&corners, width, height) else {
        return Vec::new();
    };

    let mut fragments = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if !is_inside_triangle(&corners, &p) {
                continue;
            }
            let Some(bary) = get_barycentric_coords(&corners, &p) else {
                continue;
            };
            let (z, color, uv) = interpolate(points, bary);
            fragments.push(Fragment { x, y, z, color, uv });
        }
    }
    fragments
}

/// Bresenham walk from `a` to `b`, interpolating along the segment.
pub fn line_fragments(a: &RasterPoint, b: &RasterPoint, width: usize, height: usize) -> Vec<Fragment> {
    // endpoints are expected inside the clip volume; saturate anything else
    let limit = (width.max(height) as f32 + 1.0) * 4.0;
    let snap = |v: f32| v.clamp(-limit, limit).floor() as i64;
    let mut x0 = snap(a.pos.x);
    let mut y0 = snap(a.pos.y);
    let x1 = snap(b.pos.x);
    let y1 = snap(b.pos.y);

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    let steps = dx.max(dy).max(1) as f32;
    let mut step = 0.0;

    let mut fragments = Vec::new();
    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as usize) < width && (y0 as usize) < height {
            let t = step / steps;
            let (z, color, uv) = interpolate(&[*a, *b, *b], (1.0 - t, t, 0.0));
            fragments.push(Fragment {
                x: x0 as usize,
                y: y0 as usize,
                z,
                color,
                uv,
            });
        }

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
        step += 1.0;
    }
    fragments
}

/// A `size` x `size` square centered on the point.
pub fn point_fragments(p: &RasterPoint, size: f32, width: usize, height: usize) -> Vec<Fragment> {
    let half = size.max(1.0) * 0.5;
    let x0 = (p.pos.x - half).round().max(0.0) as usize;
    let y0 = (p.pos.y - half).round().max(0.0) as usize;
    let x1 = ((p.pos.x + half).round() as usize).min(width);
    let y1 = ((p.pos.y + half).round() as usize).min(height);

    let mut fragments = Vec::new();
    for y in y0..y1 {
        for x in x0..x1 {
            fragments.push(Fragment {
                x,
                y,
                z: p.z,
                color: p.color,
                uv: p.uv,
            });
        }
    }
    fragments
}
