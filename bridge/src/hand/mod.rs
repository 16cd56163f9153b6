//! Hand subsystem: landmark model, gesture classification, pointer mapping.
//!
//! Provides:
//! - `landmarks`: the 21-point hand model and small vector types
//! - `classifier`: `GestureClassifier`, smoothing, thresholds, hysteresis, events
//! - `interpolator`: fingertip to world-space pointer with depth from palm size

pub mod classifier;
pub mod interpolator;
pub mod landmarks;
mod metrics;

pub use classifier::{
    ClassifierConfig, GestureClassifier, GestureDetections, GestureEvent, GestureKind,
    SubscriptionId,
};
pub use interpolator::{HandPositionInterpolator, InterpolatorConfig};
pub use landmarks::{HandLandmark, Quat, Vec2, Vec3, LANDMARK_COUNT};
