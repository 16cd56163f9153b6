//! Moving-window smoothing for gaze and head pose samples.
//!
//! Positions use the arithmetic mean of the window.  Rotations are folded
//! oldest-first with slerp, each step weighted by its share of the
//! samples seen so far, which approximates an equal-weight average.

use std::collections::VecDeque;

use crate::hand::landmarks::{Quat, Vec2, Vec3};

/// Window length used when none is configured.
pub const DEFAULT_SAMPLE_COUNT: usize = 3;
/// Largest accepted window length.
pub const MAX_SAMPLE_COUNT: usize = 10;

#[derive(Debug, Clone)]
pub struct DataSmoother {
    max_samples: usize,
    gaze: VecDeque<Vec2>,
    head_position: VecDeque<Vec3>,
    head_rotation: VecDeque<Quat>,
}

impl Default for DataSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_COUNT)
    }
}

impl DataSmoother {
    /// Window length is clamped to `1..=MAX_SAMPLE_COUNT`.
    pub fn new(sample_count: usize) -> Self {
        let max_samples = sample_count.clamp(1, MAX_SAMPLE_COUNT);
        Self {
            max_samples,
            gaze: VecDeque::with_capacity(max_samples + 1),
            head_position: VecDeque::with_capacity(max_samples + 1),
            head_rotation: VecDeque::with_capacity(max_samples + 1),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.max_samples
    }

    pub fn smooth_gaze(&mut self, sample: Vec2) -> Vec2 {
        push_bounded(&mut self.gaze, sample, self.max_samples);
        let n = self.gaze.len() as f32;
        let (sx, sy) = self
            .gaze
            .iter()
            .fold((0.0_f32, 0.0_f32), |(x, y), p| (x + p.x, y + p.y));
        Vec2::new(sx / n, sy / n)
    }

    pub fn smooth_head_position(&mut self, sample: Vec3) -> Vec3 {
        push_bounded(&mut self.head_position, sample, self.max_samples);
        let n = self.head_position.len() as f32;
        let sum = self
            .head_position
            .iter()
            .fold(Vec3::ZERO, |acc, p| acc + *p);
        sum * (1.0 / n)
    }

    pub fn smooth_head_rotation(&mut self, sample: Quat) -> Quat {
        push_bounded(&mut self.head_rotation, sample, self.max_samples);

        let mut samples = self.head_rotation.iter();
        let Some(first) = samples.next() else {
            return sample;
        };

        let weight = 1.0 / self.head_rotation.len() as f32;
        let mut accumulated = weight;
        let mut result = *first;
        for rot in samples {
            result = result.slerp(*rot, accumulated / (accumulated + weight));
            accumulated += weight;
        }
        result
    }

    /// Drop every window.
    pub fn reset(&mut self) {
        self.gaze.clear();
        self.head_position.clear();
        self.head_rotation.clear();
    }
}

fn push_bounded<T>(window: &mut VecDeque<T>, sample: T, max: usize) {
    window.push_back(sample);
    while window.len() > max {
        window.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_sample_count_clamped() {
        assert_eq!(DataSmoother::new(0).sample_count(), 1);
        assert_eq!(DataSmoother::new(3).sample_count(), 3);
        assert_eq!(DataSmoother::new(50).sample_count(), MAX_SAMPLE_COUNT);
        assert_eq!(DataSmoother::default().sample_count(), DEFAULT_SAMPLE_COUNT);
    }

    #[test]
    fn test_gaze_moving_average() {
        let mut s = DataSmoother::new(3);
        let out = s.smooth_gaze(Vec2::new(0.3, 0.6));
        assert!(approx(out.x, 0.3) && approx(out.y, 0.6));

        s.smooth_gaze(Vec2::new(0.6, 0.0));
        let out = s.smooth_gaze(Vec2::new(0.0, 0.3));
        assert!(approx(out.x, 0.3));
        assert!(approx(out.y, 0.3));

        // Oldest sample falls out of the window.
        let out = s.smooth_gaze(Vec2::new(0.9, 0.9));
        assert!(approx(out.x, 0.5));
        assert!(approx(out.y, 0.4));
    }

    #[test]
    fn test_head_position_average() {
        let mut s = DataSmoother::new(2);
        s.smooth_head_position(Vec3::new(10.0, 0.0, -4.0));
        let out = s.smooth_head_position(Vec3::new(20.0, 2.0, 0.0));
        assert!(approx(out.x, 15.0));
        assert!(approx(out.y, 1.0));
        assert!(approx(out.z, -2.0));
    }

    #[test]
    fn test_window_of_one_passes_through() {
        let mut s = DataSmoother::new(1);
        s.smooth_head_position(Vec3::new(1.0, 1.0, 1.0));
        let out = s.smooth_head_position(Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(out, Vec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_single_rotation_passes_through() {
        let mut s = DataSmoother::default();
        let q = Quat::new(0.0, 0.0, 0.38268343, 0.9238795);
        assert_eq!(s.smooth_head_rotation(q), q);
    }

    #[test]
    fn test_rotation_average_of_two() {
        let mut s = DataSmoother::new(2);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        s.smooth_head_rotation(Quat::IDENTITY);
        // 0 and 90 degrees about Z average to 45 degrees.
        let out = s.smooth_head_rotation(Quat::new(0.0, 0.0, half, half));
        assert!(approx(out.x, 0.0));
        assert!(approx(out.z, 0.382_683_4));
        assert!(approx(out.w, 0.923_879_5));
    }

    #[test]
    fn test_rotation_average_of_identical() {
        let mut s = DataSmoother::new(3);
        let q = Quat::new(0.0, 0.5, 0.0, 0.866_025_4);
        s.smooth_head_rotation(q);
        s.smooth_head_rotation(q);
        let out = s.smooth_head_rotation(q);
        assert!(approx(out.y, q.y));
        assert!(approx(out.w, q.w));
    }

    #[test]
    fn test_reset() {
        let mut s = DataSmoother::new(3);
        s.smooth_gaze(Vec2::new(1.0, 1.0));
        s.smooth_head_position(Vec3::new(1.0, 1.0, 1.0));
        s.reset();
        let out = s.smooth_gaze(Vec2::new(0.0, 0.0));
        assert_eq!(out, Vec2::ZERO);
        let out = s.smooth_head_position(Vec3::ZERO);
        assert_eq!(out, Vec3::ZERO);
    }
}
