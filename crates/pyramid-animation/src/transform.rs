//! Model/view/projection computation.
//!
//! Pure functions of elapsed time and window dimensions; nothing here touches
//! the GPU.

use glam::{Mat4, Vec3};

use pyramid_engine::coords::Viewport;

use crate::config::PyramidConfig;

/// The three matrices uploaded each frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Transforms {
    pub fn compute(config: &PyramidConfig, elapsed_ms: f32, viewport: Viewport) -> Self {
        Self {
            model: model_matrix(elapsed_ms, config.rotation_rate, config.model_scale),
            view: view_matrix(config.camera_distance),
            projection: projection_matrix(
                viewport,
                config.fov_y_degrees,
                config.z_near,
                config.z_far,
            ),
        }
    }

    /// Combined clip-space transform, as the vertex stage applies it.
    pub fn model_view_projection(&self) -> Mat4 {
        self.projection * self.view * self.model
    }
}

/// Axis the pyramid spins around.
pub fn rotation_axis() -> Vec3 {
    Vec3::ONE.normalize()
}

/// `translate(0) * rotate(elapsed_ms * rate, (1,1,1)) * scale(s)`.
///
/// The angle grows without bound; periodicity comes from the rotation itself.
pub fn model_matrix(elapsed_ms: f32, rate: f32, scale: f32) -> Mat4 {
    Mat4::from_translation(Vec3::ZERO)
        * Mat4::from_axis_angle(rotation_axis(), elapsed_ms * rate)
        * Mat4::from_scale(Vec3::splat(scale))
}

/// Fixed camera pulled back along -Z.
pub fn view_matrix(distance: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(0.0, 0.0, -distance))
}

/// Right-handed perspective with a 0..1 depth range.
pub fn projection_matrix(viewport: Viewport, fov_y_degrees: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_y_degrees.to_radians(), viewport.aspect_ratio(), near, far)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use glam::Vec4;

    use super::*;

    const EPS: f32 = 1e-5;

    fn aspect_of(p: Mat4) -> f32 {
        // perspective: x_axis.x = f / aspect, y_axis.y = f
        p.y_axis.y / p.x_axis.x
    }

    // ── model ─────────────────────────────────────────────────────────────

    #[test]
    fn model_is_fixed_composition() {
        for t in [0.0f32, 16.7, 1_000.0, 123_456.0] {
            let expected = Mat4::from_translation(Vec3::ZERO)
                * Mat4::from_axis_angle(Vec3::new(1.0, 1.0, 1.0).normalize(), t * -0.0005)
                * Mat4::from_scale(Vec3::splat(2.0));
            assert!(model_matrix(t, -0.0005, 2.0).abs_diff_eq(expected, EPS));
        }
    }

    #[test]
    fn model_at_time_zero_is_pure_scale() {
        let m = model_matrix(0.0, -0.0005, 2.0);
        assert!(m.abs_diff_eq(Mat4::from_scale(Vec3::splat(2.0)), EPS));
    }

    #[test]
    fn rotation_axis_is_invariant() {
        for t in [0.0f32, 500.0, 9_999.0] {
            let m = model_matrix(t, -0.0005, 2.0);
            let axis = m * Vec4::new(1.0, 1.0, 1.0, 0.0);
            assert!(axis.abs_diff_eq(Vec4::new(2.0, 2.0, 2.0, 0.0), 1e-4));
        }
    }

    #[test]
    fn rotation_is_periodic_without_wrapping() {
        let period_ms = TAU / 0.0005;
        let a = model_matrix(250.0, -0.0005, 2.0);
        let b = model_matrix(250.0 + period_ms, -0.0005, 2.0);
        assert!(a.abs_diff_eq(b, 1e-3));
    }

    #[test]
    fn negative_rate_spins_clockwise_about_axis() {
        let quarter_ms = (TAU / 4.0) / 0.0005;
        let m = model_matrix(quarter_ms, -0.0005, 1.0);
        let expected = Mat4::from_axis_angle(rotation_axis(), -TAU / 4.0);
        assert!(m.abs_diff_eq(expected, 1e-4));
    }

    // ── view ──────────────────────────────────────────────────────────────

    #[test]
    fn view_is_constant_translation() {
        let v = view_matrix(5.0);
        assert!(v.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)), EPS));

        let config = PyramidConfig::default();
        let a = Transforms::compute(&config, 0.0, Viewport::new(800, 600));
        let b = Transforms::compute(&config, 42_000.0, Viewport::new(1024, 768));
        assert_eq!(a.view, b.view);
    }

    // ── projection ────────────────────────────────────────────────────────

    #[test]
    fn projection_aspect_follows_window() {
        let config = PyramidConfig::default();

        let p = Transforms::compute(&config, 0.0, Viewport::new(800, 600)).projection;
        assert!((aspect_of(p) - 800.0 / 600.0).abs() < EPS);

        let p = Transforms::compute(&config, 0.0, Viewport::new(400, 400)).projection;
        assert!((aspect_of(p) - 1.0).abs() < EPS);

        let p = Transforms::compute(&config, 0.0, Viewport::new(1024, 768)).projection;
        assert!((aspect_of(p) - 1024.0 / 768.0).abs() < EPS);
    }

    #[test]
    fn projection_uses_45_degree_fov() {
        let p = projection_matrix(Viewport::new(800, 600), 45.0, 0.1, 100.0);
        let f = 1.0 / (45.0f32.to_radians() / 2.0).tan();
        assert!((p.y_axis.y - f).abs() < EPS);
    }

    #[test]
    fn degenerate_window_stays_finite() {
        for vp in [Viewport::new(0, 600), Viewport::new(800, 0), Viewport::new(0, 0)] {
            let p = projection_matrix(vp, 45.0, 0.1, 100.0);
            assert!(p.is_finite(), "{vp:?}");
        }
    }

    #[test]
    fn depth_range_maps_near_and_far_to_unit_interval() {
        let p = projection_matrix(Viewport::new(800, 600), 45.0, 0.1, 100.0);
        let near = p.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = p.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn apex_projects_inside_clip_volume() {
        let t = Transforms::compute(&PyramidConfig::default(), 1_234.0, Viewport::new(800, 600));
        let clip = t.model_view_projection() * Vec4::new(0.0, 1.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
