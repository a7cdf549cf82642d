//! Easing curves and time-bounded tweens.
//!
//! A [`Tween`] never holds suspended state: its value is a pure function of the
//! wall-clock time passed to [`Tween::sample`]. Retargeting an in-flight tween
//! just rewrites its start time, start value and end value.

use serde::{Deserialize, Serialize};

/// Easing function for interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingFunction {
    /// Linear interpolation.
    #[default]
    Linear,
    /// Quadratic ease-in (slow start).
    QuadraticIn,
    /// Quadratic ease-out (slow end).
    QuadraticOut,
    /// Quadratic ease-in-out (slow start and end).
    QuadraticInOut,
    /// Cubic ease-in.
    CubicIn,
    /// Cubic ease-out.
    CubicOut,
    /// Cubic ease-in-out.
    CubicInOut,
    /// Exponential ease-out.
    ExponentialOut,
    /// Smooth step (Hermite interpolation).
    SmoothStep,
}

impl EasingFunction {
    /// Map normalized progress `t` in [0, 1] through the curve.
    ///
    /// Input is clamped; every curve maps 0 to 0 and 1 to 1 exactly.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingFunction::Linear => t,
            EasingFunction::QuadraticIn => t * t,
            EasingFunction::QuadraticOut => t * (2.0 - t),
            EasingFunction::QuadraticInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            EasingFunction::CubicIn => t * t * t,
            EasingFunction::CubicOut => {
                let t1 = t - 1.0;
                t1 * t1 * t1 + 1.0
            }
            EasingFunction::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let t1 = 2.0 * t - 2.0;
                    0.5 * t1 * t1 * t1 + 1.0
                }
            }
            EasingFunction::ExponentialOut => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - (2.0_f32).powf(-10.0 * t)
                }
            }
            EasingFunction::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Values that can be linearly interpolated by a tween.
pub trait Lerp: Copy {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for glam::Vec3 {
    fn lerp(self, other: Self, t: f32) -> Self {
        glam::Vec3::lerp(self, other, t)
    }
}

/// A fixed-duration eased interpolation from one value to another.
#[derive(Debug, Clone, Copy)]
pub struct Tween<T: Lerp> {
    from: T,
    to: T,
    start_time: f32,
    duration: f32,
    easing: EasingFunction,
}

impl<T: Lerp> Tween<T> {
    /// A tween that is already finished and rests at `value`.
    pub fn at_rest(value: T, easing: EasingFunction) -> Self {
        Self {
            from: value,
            to: value,
            start_time: 0.0,
            duration: 0.0,
            easing,
        }
    }

    pub fn new(from: T, to: T, start_time: f32, duration: f32, easing: EasingFunction) -> Self {
        Self {
            from,
            to,
            start_time,
            duration: duration.max(0.0),
            easing,
        }
    }

    /// Normalized progress at `now`, clamped to [0, 1].
    pub fn progress(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    /// Value at `now`. Clamps at the end value once the duration has elapsed.
    pub fn sample(&self, now: f32) -> T {
        let p = self.progress(now);
        if p >= 1.0 {
            return self.to;
        }
        self.from.lerp(self.to, self.easing.apply(p))
    }

    pub fn is_finished(&self, now: f32) -> bool {
        self.progress(now) >= 1.0
    }

    /// Restart toward `to`, beginning from wherever the tween is at `now`.
    pub fn retarget(&mut self, now: f32, to: T, duration: f32) {
        self.from = self.sample(now);
        self.to = to;
        self.start_time = now;
        self.duration = duration.max(0.0);
    }

    pub fn target(&self) -> T {
        self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [EasingFunction; 9] = [
        EasingFunction::Linear,
        EasingFunction::QuadraticIn,
        EasingFunction::QuadraticOut,
        EasingFunction::QuadraticInOut,
        EasingFunction::CubicIn,
        EasingFunction::CubicOut,
        EasingFunction::CubicInOut,
        EasingFunction::ExponentialOut,
        EasingFunction::SmoothStep,
    ];

    #[test]
    fn test_curves_hit_endpoints() {
        for curve in CURVES {
            assert!(curve.apply(0.0).abs() < 1e-3, "{:?} at 0", curve);
            assert!((curve.apply(1.0) - 1.0).abs() < 1e-6, "{:?} at 1", curve);
        }
    }

    #[test]
    fn test_curve_clamps_input() {
        assert_eq!(EasingFunction::CubicInOut.apply(-2.0), 0.0);
        assert_eq!(EasingFunction::CubicInOut.apply(7.0), 1.0);
    }

    #[test]
    fn test_tween_clamps_after_duration() {
        let tween = Tween::new(0.0_f32, 10.0, 1.0, 2.0, EasingFunction::CubicInOut);
        assert_eq!(tween.sample(0.5), 0.0);
        assert!((tween.sample(2.0) - 5.0).abs() < 1e-4);
        assert_eq!(tween.sample(3.0), 10.0);
        assert_eq!(tween.sample(100.0), 10.0);
        assert!(tween.is_finished(3.0));
        assert!(!tween.is_finished(2.9));
    }

    #[test]
    fn test_retarget_starts_from_current_value() {
        let mut tween = Tween::new(0.0_f32, 10.0, 0.0, 1.0, EasingFunction::Linear);
        tween.retarget(0.5, -4.0, 1.0);

        assert!((tween.sample(0.5) - 5.0).abs() < 1e-5);
        assert_eq!(tween.sample(1.5), -4.0);
        assert_eq!(tween.target(), -4.0);
    }

    #[test]
    fn test_vec3_tween() {
        let tween = Tween::new(
            glam::Vec3::ZERO,
            glam::Vec3::new(2.0, 4.0, -6.0),
            0.0,
            1.0,
            EasingFunction::Linear,
        );
        let mid = tween.sample(0.5);
        assert!((mid - glam::Vec3::new(1.0, 2.0, -3.0)).length() < 1e-5);
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let tween = Tween::new(1.0_f32, 3.0, 5.0, 0.0, EasingFunction::SmoothStep);
        assert_eq!(tween.sample(5.0), 3.0);
        assert!(tween.is_finished(0.0));
    }
}
