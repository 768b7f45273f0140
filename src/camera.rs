use terra_geom::{Frustum, Plane, Vec3};

/// What the streaming world needs from whoever is looking at it.
pub trait Viewer {
    fn eye_position(&self) -> Vec3;
    /// Current view volume, if the viewer has one.
    fn frustum(&self) -> Option<Frustum>;
}

/// Per-frame input edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub toggle_freeze_culling: bool,
}

#[derive(Clone, Debug)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,   // degrees
    pub pitch: f32, // degrees
    pub fov_y: f32, // degrees
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl FlyCamera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: -45.0,
            pitch: -15.0,
            fov_y: 70.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 2000.0,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let yaw_rad = self.yaw.to_radians();
        let pitch_rad = self.pitch.to_radians();
        Vec3::new(
            yaw_rad.cos() * pitch_rad.cos(),
            pitch_rad.sin(),
            yaw_rad.sin() * pitch_rad.cos(),
        )
        .normalized()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::UP).normalized()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalized()
    }

    /// Six inward-facing planes of the perspective view volume.
    pub fn view_frustum(&self) -> Frustum {
        let f = self.forward();
        let r = self.right();
        let u = self.up();
        let p = self.position;
        let tan_v = (self.fov_y.to_radians() * 0.5).tan();
        let tan_h = tan_v * self.aspect;
        Frustum::new([
            Plane::from_point_normal(p + f * self.near, f),
            Plane::from_point_normal(p + f * self.far, -f),
            Plane::from_point_normal(p, r + f * tan_h),
            Plane::from_point_normal(p, -r + f * tan_h),
            Plane::from_point_normal(p, u + f * tan_v),
            Plane::from_point_normal(p, -u + f * tan_v),
        ])
    }
}

impl Viewer for FlyCamera {
    fn eye_position(&self) -> Vec3 {
        self.position
    }

    fn frustum(&self) -> Option<Frustum> {
        Some(self.view_frustum())
    }
}

/// Camera that flies in a straight line at a fixed speed; drives headless runs.
#[derive(Clone, Debug)]
pub struct ScriptedViewer {
    pub camera: FlyCamera,
    pub velocity: Vec3,
}

impl ScriptedViewer {
    pub fn new(start: Vec3, velocity: Vec3) -> Self {
        let mut camera = FlyCamera::new(start);
        if velocity.length() > 0.0 {
            let d = velocity.normalized();
            camera.yaw = d.z.atan2(d.x).to_degrees();
            camera.pitch = d.y.clamp(-1.0, 1.0).asin().to_degrees();
        }
        Self { camera, velocity }
    }

    pub fn stationary(at: Vec3) -> Self {
        Self::new(at, Vec3::ZERO)
    }

    pub fn advance(&mut self, dt: f32) {
        self.camera.position += self.velocity * dt;
    }
}

impl Viewer for ScriptedViewer {
    fn eye_position(&self) -> Vec3 {
        self.camera.position
    }

    fn frustum(&self) -> Option<Frustum> {
        self.camera.frustum()
    }
}
