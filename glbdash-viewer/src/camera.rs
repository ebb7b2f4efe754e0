//! Orbit camera for the model viewer

use std::f32::consts::{PI, TAU};

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// Distance kept between the polar angle and either pole
const POLAR_EPSILON: f32 = 1e-4;

/// Which orbit interactions are accepted, and their limits
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub max_polar_angle: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enable_rotate: true,
            enable_zoom: true,
            enable_pan: true,
            min_distance: 1.0,
            max_distance: 20.0,
            max_polar_angle: PI,
        }
    }
}

impl OrbitControls {
    /// Toggle pan, zoom and rotate together
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enable_rotate = enabled;
        self.enable_zoom = enabled;
        self.enable_pan = enabled;
    }

    pub fn all_enabled(&self) -> bool {
        self.enable_rotate && self.enable_zoom && self.enable_pan
    }
}

/// A perspective camera orbiting a target point
///
/// The position is kept in spherical coordinates around `target`: `radius`,
/// `polar` measured from +Y, and `azimuth` around Y starting at +Z.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub controls: OrbitControls,
    radius: f32,
    polar: f32,
    azimuth: f32,
    home: (Point3<f32>, Point3<f32>),
}

impl OrbitCamera {
    pub fn new(position: Point3<f32>, target: Point3<f32>, fov: f32, aspect_ratio: f32) -> Self {
        let mut camera = Self {
            target,
            up: Vector3::y(),
            fov,
            aspect_ratio,
            near: 0.1,
            far: 1000.0,
            controls: OrbitControls::default(),
            radius: 1.0,
            polar: PI / 2.0,
            azimuth: 0.0,
            home: (position, target),
        };
        camera.look_from(position);
        camera
    }

    /// Place the camera at `position`, keeping the current target
    pub fn look_from(&mut self, position: Point3<f32>) {
        let offset = position - self.target;
        let radius = offset.norm();
        if radius > f32::EPSILON {
            self.polar = (offset.y / radius).clamp(-1.0, 1.0).acos();
            self.azimuth = offset.x.atan2(offset.z);
        }
        self.radius = radius;
        self.clamp();
    }

    pub fn position(&self) -> Point3<f32> {
        let sin_polar = self.polar.sin();
        self.target
            + Vector3::new(
                sin_polar * self.azimuth.sin(),
                self.polar.cos(),
                sin_polar * self.azimuth.cos(),
            ) * self.radius
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    pub fn polar_angle(&self) -> f32 {
        self.polar
    }

    pub fn azimuth_angle(&self) -> f32 {
        self.azimuth
    }

    /// Rotate around the target. Ignored while rotation is disabled.
    pub fn rotate(&mut self, delta_azimuth: f32, delta_polar: f32) -> bool {
        if !self.controls.enable_rotate {
            return false;
        }
        self.azimuth = (self.azimuth + delta_azimuth).rem_euclid(TAU);
        self.polar += delta_polar;
        self.clamp();
        true
    }

    /// Scale the distance to the target, e.g. `0.95` to move closer.
    /// Ignored while zoom is disabled.
    pub fn zoom(&mut self, scale: f32) -> bool {
        if !self.controls.enable_zoom || scale <= 0.0 || !scale.is_finite() {
            return false;
        }
        self.radius *= scale;
        self.clamp();
        true
    }

    /// Move camera and target in the view plane. `dx`/`dy` are fractions of
    /// the viewport, scaled by the visible height at the target distance.
    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        if !self.controls.enable_pan {
            return false;
        }
        let forward = (self.target - self.position()).normalize();
        let right = forward.cross(&self.up).normalize();
        let up = right.cross(&forward);
        let visible_height = 2.0 * self.radius * (self.fov / 2.0).tan();
        self.target += (-right * dx * self.aspect_ratio + up * dy) * visible_height;
        true
    }

    /// Restore the initial position and target
    pub fn reset(&mut self) {
        let (position, target) = self.home;
        self.target = target;
        self.look_from(position);
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position(), &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Perspective3::new(self.aspect_ratio, self.fov, self.near, self.far).into_inner()
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    fn clamp(&mut self) {
        let limits = &self.controls;
        self.radius = self.radius.clamp(limits.min_distance, limits.max_distance);
        let max_polar = limits.max_polar_angle.min(PI) - POLAR_EPSILON;
        self.polar = self.polar.clamp(POLAR_EPSILON, max_polar.max(POLAR_EPSILON));
    }
}

impl Default for OrbitCamera {
    /// Camera at `(8, 8, 8)` looking at the origin with a 45° vertical FOV
    fn default() -> Self {
        Self::new(
            Point3::new(8.0, 8.0, 8.0),
            Point3::origin(),
            std::f32::consts::FRAC_PI_4,
            16.0 / 9.0,
        )
    }
}
