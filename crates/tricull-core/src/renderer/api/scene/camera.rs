// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Perspective camera used for the main pass and the ID pass.

use crate::math::Mat4;

/// A right-handed perspective camera with a `[0, 1]` depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World-to-view transform.
    pub view: Mat4,
    /// Vertical field of view in radians.
    pub fov_y_radians: f32,
    /// Viewport width divided by height.
    pub aspect_ratio: f32,
    /// Near clipping plane distance.
    pub z_near: f32,
    /// Far clipping plane distance.
    pub z_far: f32,
}

impl Camera {
    /// Creates a camera from a view matrix and its projection parameters.
    pub fn new(view: Mat4, fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            view,
            fov_y_radians,
            aspect_ratio,
            z_near,
            z_far,
        }
    }

    /// The projection matrix.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_zo(self.fov_y_radians, self.aspect_ratio, self.z_near, self.z_far)
    }

    /// Projection multiplied by view.
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view
    }

    /// A copy of this camera whose vertical field of view is scaled by `factor`.
    ///
    /// The result is clamped below a half turn so the projection stays finite.
    pub fn with_fov_scale(&self, factor: f32) -> Self {
        let max_fov = std::f32::consts::PI * 0.99;
        Self {
            fov_y_radians: (self.fov_y_radians * factor).min(max_fov),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Vec3, FRAC_PI_3};

    fn camera() -> Camera {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y).unwrap();
        Camera::new(view, FRAC_PI_3, 1.0, 0.1, 100.0)
    }

    #[test]
    fn fov_scale_only_touches_field_of_view() {
        let cam = camera();
        let wide = cam.with_fov_scale(1.3);
        assert!(approx_eq(wide.fov_y_radians, FRAC_PI_3 * 1.3));
        assert_eq!(wide.view, cam.view);
        assert_eq!(wide.z_near, cam.z_near);
    }

    #[test]
    fn fov_scale_is_clamped_below_half_turn() {
        let wide = camera().with_fov_scale(10.0);
        assert!(wide.fov_y_radians < std::f32::consts::PI);
    }

    #[test]
    fn wider_fov_shrinks_projected_offsets() {
        let cam = camera();
        let p = Vec3::new(0.5, 0.0, 0.0);
        let narrow = cam.view_projection().transform_point(p);
        let wide = cam.with_fov_scale(1.5).view_projection().transform_point(p);
        assert!(wide.x / wide.w < narrow.x / narrow.w);
    }
}
