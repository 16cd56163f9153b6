//! Head and gaze tracking helpers.

pub mod smoother;

pub use smoother::DataSmoother;
