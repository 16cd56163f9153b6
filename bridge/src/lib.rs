//! arhand-bridge: hand gesture classification and tracking-data streaming.
//!
//! Recorded hand landmark frames are classified into neutral, pinching,
//! pointing and open-hand gestures, mapped to a world-space pointer, and
//! streamed with head/gaze data to a UDP consumer.

pub mod config;
pub mod hand;
pub mod net;
pub mod replay;
pub mod session;
pub mod sexp;
pub mod tracking;

pub use config::BridgeConfig;
pub use hand::{GestureClassifier, GestureEvent, GestureKind};
pub use session::BridgeSession;
