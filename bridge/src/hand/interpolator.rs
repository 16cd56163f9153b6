//! Maps the tracked fingertip to a world-space pointer position.
//!
//! Palm size stands in for distance to the camera: a large palm is close,
//! a small palm is far.  The interpolator keeps a target position from the
//! latest frame and moves its current position toward it on each tick.

use tracing::{debug, info};

use super::classifier::{GestureClassifier, GestureEvent};
use super::landmarks::{Vec2, Vec3};

// ── Config ─────────────────────────────────────────────────

/// Depth mapping and pointer behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatorConfig {
    /// Depth (m) for the largest palm.
    pub min_depth: f32,
    /// Depth (m) for the smallest palm.
    pub max_depth: f32,
    /// Palm size treated as farthest.
    pub min_hand_size: f32,
    /// Palm size treated as closest.
    pub max_hand_size: f32,
    /// Only move the pointer while the pointing gesture is active.
    pub only_track_when_pointing: bool,
    /// Follow rate in 1/s for non-sticky mode.
    pub pointer_smoothing: f32,
    /// Jump straight to the target on every tick.
    pub sticky: bool,
    /// Ignore palm size and use the fixed depth.
    pub use_2d_only: bool,
    pub fixed_depth: f32,
    pub fixed_hand_size: f32,
    /// Screen point that maps to the world origin.
    pub mapping_offset: Vec2,
    pub horizontal_scale: f32,
    pub vertical_scale: f32,
    pub invert_x: bool,
    pub invert_y: bool,
    /// Applied to the classifier palm size before depth mapping.
    pub palm_size_multiplier: f32,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            min_depth: 0.2,
            max_depth: 1.0,
            min_hand_size: 0.05,
            max_hand_size: 0.3,
            only_track_when_pointing: true,
            pointer_smoothing: 5.0,
            sticky: true,
            use_2d_only: false,
            fixed_depth: 0.5,
            fixed_hand_size: 0.15,
            mapping_offset: Vec2::new(0.5, 0.5),
            horizontal_scale: 1.0,
            vertical_scale: 1.0,
            invert_x: true,
            invert_y: true,
            palm_size_multiplier: 1.0,
        }
    }
}

// ── State ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HandPositionInterpolator {
    pub config: InterpolatorConfig,
    target: Vec3,
    current: Vec3,
    visible: bool,
    pointing: bool,
    estimated_depth: f32,
    hand_size_normalized: f32,
    /// Connector switch; when off, classifier frames are ignored.
    tracking_enabled: bool,
}

impl Default for HandPositionInterpolator {
    fn default() -> Self {
        Self::new(InterpolatorConfig::default())
    }
}

impl HandPositionInterpolator {
    pub fn new(config: InterpolatorConfig) -> Self {
        Self {
            config,
            target: Vec3::ZERO,
            current: Vec3::ZERO,
            visible: false,
            pointing: false,
            estimated_depth: 0.5,
            hand_size_normalized: 0.0,
            tracking_enabled: true,
        }
    }

    /// Record a new fingertip sample in normalized screen coordinates.
    pub fn update_hand_position(&mut self, screen: Vec2, palm_size: f32, pointing: bool) {
        self.visible = true;
        self.pointing = pointing;

        let cfg = &self.config;
        if cfg.use_2d_only {
            self.hand_size_normalized = cfg.fixed_hand_size;
            self.estimated_depth = cfg.fixed_depth;
        } else {
            let span = cfg.max_hand_size - cfg.min_hand_size;
            let size = if span.abs() > f32::EPSILON {
                ((palm_size - cfg.min_hand_size) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            self.hand_size_normalized = size;
            self.estimated_depth = lerp(cfg.max_depth, cfg.min_depth, size);
        }

        self.target = self.screen_to_world(screen, self.estimated_depth);
        debug!(
            x = screen.x,
            y = screen.y,
            palm_size,
            depth = self.estimated_depth,
            pointing,
            "hand position updated"
        );
    }

    fn screen_to_world(&self, screen: Vec2, depth: f32) -> Vec3 {
        let cfg = &self.config;
        let sx = if cfg.invert_x { 1.0 - screen.x } else { screen.x };
        let sy = if cfg.invert_y { 1.0 - screen.y } else { screen.y };
        Vec3::new(
            (sx - cfg.mapping_offset.x) * cfg.horizontal_scale,
            (sy - cfg.mapping_offset.y) * cfg.vertical_scale,
            -depth,
        )
    }

    /// Advance the pointer by `dt_s` seconds.  Returns whether it is active.
    pub fn tick(&mut self, dt_s: f32) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.config.sticky {
            self.current = self.target;
        } else {
            let t = (dt_s * self.config.pointer_smoothing).clamp(0.0, 1.0);
            self.current = self.current.lerp(self.target, t);
        }
        true
    }

    /// Hand no longer visible.  The last position is kept.
    pub fn clear(&mut self) {
        if self.visible {
            debug!("hand position cleared");
        }
        self.visible = false;
    }

    // ── Classifier connection ─────────────────────────────

    /// Pull the index fingertip, palm size and pointing state.
    pub fn sync_from(&mut self, classifier: &GestureClassifier) {
        if !self.tracking_enabled || !classifier.is_hand_detected() {
            return;
        }
        let tip = classifier.index_tip();
        let palm = classifier.palm_size() * self.config.palm_size_multiplier;
        self.update_hand_position(Vec2::new(tip.x, tip.y), palm, classifier.is_pointing());
    }

    pub fn handle_event(&mut self, event: &GestureEvent) {
        match event {
            GestureEvent::HandLost => self.clear(),
            GestureEvent::PointingStart => self.pointing = true,
            GestureEvent::PointingEnd => self.pointing = false,
            _ => {}
        }
    }

    pub fn toggle_tracking(&mut self) -> bool {
        self.tracking_enabled = !self.tracking_enabled;
        if !self.tracking_enabled {
            self.clear();
        }
        info!(enabled = self.tracking_enabled, "hand tracking toggled");
        self.tracking_enabled
    }

    pub fn toggle_sticky(&mut self) -> bool {
        self.config.sticky = !self.config.sticky;
        info!(sticky = self.config.sticky, "sticky mode toggled");
        self.config.sticky
    }

    pub fn set_sticky(&mut self, sticky: bool) {
        self.config.sticky = sticky;
    }

    pub fn toggle_2d_only(&mut self) -> bool {
        self.config.use_2d_only = !self.config.use_2d_only;
        info!(use_2d_only = self.config.use_2d_only, "2D tracking mode toggled");
        self.config.use_2d_only
    }

    pub fn set_2d_only(&mut self, enabled: bool) {
        self.config.use_2d_only = enabled;
    }

    // ── Accessors ─────────────────────────────────────────

    pub fn current_position(&self) -> Vec3 {
        self.current
    }

    pub fn target_position(&self) -> Vec3 {
        self.target
    }

    pub fn estimated_depth(&self) -> f32 {
        self.estimated_depth
    }

    pub fn hand_size_normalized(&self) -> f32 {
        self.hand_size_normalized
    }

    pub fn is_hand_visible(&self) -> bool {
        self.visible
    }

    pub fn is_pointing(&self) -> bool {
        self.pointing
    }

    pub fn is_tracking_enabled(&self) -> bool {
        self.tracking_enabled
    }

    /// Whether the pointer should be shown and followed.
    pub fn is_active(&self) -> bool {
        self.visible && (!self.config.only_track_when_pointing || self.pointing)
    }

    /// Marker scale: 1.0 when far, 0.5 when the hand is closest.
    pub fn marker_scale(&self) -> f32 {
        lerp(0.5, 1.0, 1.0 - self.hand_size_normalized)
    }

    /// Generate s-expression for debug status.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:visible {} :pointing {} :active {} :depth {:.3} :position ({:.3} {:.3} {:.3}))",
            if self.visible { "t" } else { "nil" },
            if self.pointing { "t" } else { "nil" },
            if self.is_active() { "t" } else { "nil" },
            self.estimated_depth,
            self.current.x,
            self.current.y,
            self.current.z,
        )
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::classifier::{pointing_hand, ClassifierConfig};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn approx_vec(v: Vec3, x: f32, y: f32, z: f32) -> bool {
        approx(v.x, x) && approx(v.y, y) && approx(v.z, z)
    }

    #[test]
    fn test_new_interpolator() {
        let interp = HandPositionInterpolator::default();
        assert!(!interp.is_hand_visible());
        assert!(!interp.is_active());
        assert_eq!(interp.current_position(), Vec3::ZERO);
        assert!(approx(interp.estimated_depth(), 0.5));
    }

    #[test]
    fn test_depth_mapping() {
        let mut interp = HandPositionInterpolator::default();

        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.05, true);
        assert!(approx(interp.estimated_depth(), 1.0));

        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.3, true);
        assert!(approx(interp.estimated_depth(), 0.2));

        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.175, true);
        assert!(approx(interp.estimated_depth(), 0.6));
        assert!(approx(interp.hand_size_normalized(), 0.5));
    }

    #[test]
    fn test_depth_clamped() {
        let mut interp = HandPositionInterpolator::default();
        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.0, true);
        assert!(approx(interp.estimated_depth(), 1.0));
        interp.update_hand_position(Vec2::new(0.5, 0.5), 5.0, true);
        assert!(approx(interp.estimated_depth(), 0.2));
    }

    #[test]
    fn test_2d_mode_uses_fixed_depth() {
        let mut interp = HandPositionInterpolator::default();
        interp.set_2d_only(true);
        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.3, true);
        assert!(approx(interp.estimated_depth(), 0.5));
        assert!(approx(interp.hand_size_normalized(), 0.15));
        assert!(!interp.toggle_2d_only());
    }

    #[test]
    fn test_screen_mapping_inverted() {
        let mut interp = HandPositionInterpolator::default();
        interp.update_hand_position(Vec2::new(0.25, 0.75), 0.175, true);
        assert!(approx_vec(interp.target_position(), 0.25, -0.25, -0.6));
    }

    #[test]
    fn test_screen_mapping_scaled() {
        let mut interp = HandPositionInterpolator::new(InterpolatorConfig {
            invert_x: false,
            invert_y: false,
            horizontal_scale: 2.0,
            vertical_scale: 0.5,
            ..InterpolatorConfig::default()
        });
        interp.update_hand_position(Vec2::new(0.75, 0.9), 0.05, true);
        assert!(approx_vec(interp.target_position(), 0.5, 0.2, -1.0));
    }

    #[test]
    fn test_tick_sticky() {
        let mut interp = HandPositionInterpolator::default();
        interp.update_hand_position(Vec2::new(0.25, 0.75), 0.175, true);
        assert!(interp.tick(0.016));
        assert_eq!(interp.current_position(), interp.target_position());
    }

    #[test]
    fn test_tick_smoothed() {
        let mut interp = HandPositionInterpolator::new(InterpolatorConfig {
            sticky: false,
            ..InterpolatorConfig::default()
        });
        interp.update_hand_position(Vec2::new(0.25, 0.75), 0.175, true);
        // 0.1 s at 5/s moves half way.
        assert!(interp.tick(0.1));
        assert!(approx_vec(interp.current_position(), 0.125, -0.125, -0.3));

        // Large steps clamp to the target.
        interp.tick(10.0);
        assert!(approx_vec(interp.current_position(), 0.25, -0.25, -0.6));
    }

    #[test]
    fn test_only_track_when_pointing() {
        let mut interp = HandPositionInterpolator::default();
        interp.update_hand_position(Vec2::new(0.25, 0.75), 0.175, false);
        assert!(interp.is_hand_visible());
        assert!(!interp.tick(0.016));
        assert_eq!(interp.current_position(), Vec3::ZERO);

        interp.config.only_track_when_pointing = false;
        assert!(interp.tick(0.016));
        assert_ne!(interp.current_position(), Vec3::ZERO);
    }

    #[test]
    fn test_clear_keeps_last_position() {
        let mut interp = HandPositionInterpolator::default();
        interp.update_hand_position(Vec2::new(0.25, 0.75), 0.175, true);
        interp.tick(0.016);
        let last = interp.current_position();

        interp.clear();
        assert!(!interp.is_hand_visible());
        assert!(!interp.tick(0.016));
        assert_eq!(interp.current_position(), last);
    }

    #[test]
    fn test_sync_from_classifier() {
        let mut classifier = GestureClassifier::with_config(ClassifierConfig {
            smoothing_factor: 0.0,
            ..ClassifierConfig::default()
        });
        let frame = pointing_hand();
        for _ in 0..3 {
            classifier.update_from(&frame);
        }
        assert!(classifier.is_pointing());

        let mut interp = HandPositionInterpolator::default();
        interp.sync_from(&classifier);
        assert!(interp.is_pointing());
        assert!(interp.is_active());
        // Palm 0.1 -> normalized size 0.2 -> depth 0.84.
        assert!(approx(interp.estimated_depth(), 0.84));
        // Index tip (0.47, 0.38) inverted to (0.53, 0.62).
        assert!(approx_vec(interp.target_position(), 0.03, 0.12, -0.84));
    }

    #[test]
    fn test_sync_without_hand_is_noop() {
        let classifier = GestureClassifier::new();
        let mut interp = HandPositionInterpolator::default();
        interp.sync_from(&classifier);
        assert!(!interp.is_hand_visible());
    }

    #[test]
    fn test_palm_size_multiplier() {
        let mut classifier = GestureClassifier::with_config(ClassifierConfig {
            smoothing_factor: 0.0,
            ..ClassifierConfig::default()
        });
        classifier.update_from(&pointing_hand());

        let mut interp = HandPositionInterpolator::new(InterpolatorConfig {
            palm_size_multiplier: 3.0,
            ..InterpolatorConfig::default()
        });
        interp.sync_from(&classifier);
        // 0.3 is the closest size.
        assert!(approx(interp.estimated_depth(), 0.2));
    }

    #[test]
    fn test_handle_events() {
        let mut interp = HandPositionInterpolator::default();
        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.1, false);

        interp.handle_event(&GestureEvent::PointingStart);
        assert!(interp.is_active());
        interp.handle_event(&GestureEvent::PointingEnd);
        assert!(!interp.is_active());

        interp.handle_event(&GestureEvent::PinchStart);
        assert!(interp.is_hand_visible());
        interp.handle_event(&GestureEvent::HandLost);
        assert!(!interp.is_hand_visible());
    }

    #[test]
    fn test_toggle_tracking() {
        let mut classifier = GestureClassifier::new();
        classifier.update_from(&pointing_hand());

        let mut interp = HandPositionInterpolator::default();
        interp.sync_from(&classifier);
        assert!(interp.is_hand_visible());

        assert!(!interp.toggle_tracking());
        assert!(!interp.is_hand_visible());
        interp.sync_from(&classifier);
        assert!(!interp.is_hand_visible());

        assert!(interp.toggle_tracking());
        interp.sync_from(&classifier);
        assert!(interp.is_hand_visible());
    }

    #[test]
    fn test_sticky_toggle() {
        let mut interp = HandPositionInterpolator::default();
        assert!(!interp.toggle_sticky());
        interp.set_sticky(true);
        assert!(interp.config.sticky);
    }

    #[test]
    fn test_marker_scale() {
        let mut interp = HandPositionInterpolator::default();
        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.05, true);
        assert!(approx(interp.marker_scale(), 1.0));
        interp.update_hand_position(Vec2::new(0.5, 0.5), 0.3, true);
        assert!(approx(interp.marker_scale(), 0.5));
    }

    #[test]
    fn test_status_sexp() {
        let mut interp = HandPositionInterpolator::default();
        assert!(interp.status_sexp().contains(":visible nil"));
        interp.update_hand_position(Vec2::new(0.25, 0.75), 0.175, true);
        interp.tick(0.016);
        let sexp = interp.status_sexp();
        assert!(sexp.contains(":active t"));
        assert!(sexp.contains(":depth 0.600"));
        assert!(sexp.contains(":position (0.250 -0.250 -0.600)"));
    }
}
