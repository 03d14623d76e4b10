use cgmath::{
    Deg, Matrix4 as Mat4, Point3, Rad, SquareMatrix, Transform, Vector3 as Vec3,
};

pub const NEAR_PLANE: f32 = 1e-5;
pub const FAR_PLANE: f32 = 1e5;

/// OpenGL-style perspective projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    near: f32,
    aspect: f32,
    fovy: Rad<f32>,
    far: f32,
    mat: Mat4<f32>,
}

impl Frustum {
    #[rustfmt::skip]
    pub fn new(near: f32, aspect: f32, far: f32, fovy: Rad<f32>) -> Self {
        let tan_half_fovy = (fovy.0 / 2.0).tan();
        let a = 1.0 / (aspect * tan_half_fovy);
        let b = 1.0 / tan_half_fovy;
        let c = -(far + near) / (far - near);
        let d = -2.0 * far * near / (far - near);

        // column-major
        let mat = Mat4::new(
            a,    0.0,   0.0,   0.0,
            0.0,  b,     0.0,   0.0,
            0.0,  0.0,   c,    -1.0,
            0.0,  0.0,   d,     0.0,
        );

        Self {
            near,
            aspect,
            fovy,
            far,
            mat,
        }
    }

    pub fn get_mat(&self) -> &Mat4<f32> {
        &self.mat
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }
}

/// What the renderer needs from a camera.
pub trait Camera {
    fn view_matrix(&self) -> Mat4<f32>;

    fn projection_matrix(&self) -> Mat4<f32>;

    /// projection * view
    fn matrix(&self) -> Mat4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Camera looking from `position` at `center` with +Y up.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    frustum: Frustum,
    pub position: Point3<f32>,
    pub center: Point3<f32>,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(16.0 / 9.0, 75.0)
    }
}

impl PerspectiveCamera {
    pub fn new(aspect: f32, fov_degrees: f32) -> Self {
        Self {
            frustum: Frustum::new(NEAR_PLANE, aspect, FAR_PLANE, Deg(fov_degrees).into()),
            position: Point3::new(0.0, 0.0, 0.0),
            center: Point3::new(0.0, 0.0, 1.0),
        }
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
    }

    pub fn look_at(&mut self, center: Point3<f32>) {
        self.center = center;
    }

    /// Swing the position around `center` about the world Y axis.
    pub fn orbit_y(&mut self, angle: Rad<f32>) {
        let offset = self.position - self.center;
        let rotated = Mat4::from_angle_y(angle).transform_vector(offset);
        self.position = self.center + rotated;
    }
}

impl Camera for PerspectiveCamera {
    fn view_matrix(&self) -> Mat4<f32> {
        if self.position == self.center {
            return Mat4::identity();
        }
        Mat4::look_at_rh(self.position, self.center, Vec3::unit_y())
    }

    fn projection_matrix(&self) -> Mat4<f32> {
        *self.frustum.get_mat()
    }
}

/// Explicit view and projection matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub view: Mat4<f32>,
    pub projection: Mat4<f32>,
}

impl FixedCamera {
    pub fn identity() -> Self {
        Self {
            view: Mat4::identity(),
            projection: Mat4::identity(),
        }
    }
}

impl Camera for FixedCamera {
    fn view_matrix(&self) -> Mat4<f32> {
        self.view
    }

    fn projection_matrix(&self) -> Mat4<f32> {
        self.projection
    }
}
