//! Rate-limited tracking packet sender.
//!
//! Every send interval the sender formats one `DATA:` packet from the
//! latest head/gaze sample and, when enabled, one `HAND:` packet from the
//! gesture classifier.

use tracing::{debug, info};

use crate::hand::classifier::GestureClassifier;
use crate::hand::landmarks::{Quat, Vec2, Vec3};
use crate::tracking::smoother::DataSmoother;

use super::udp::UdpLink;

/// Anything that accepts text packets.
pub trait PacketSink {
    /// Returns false when the packet was not delivered to the transport.
    fn send_packet(&mut self, packet: &str) -> bool;
}

impl PacketSink for UdpLink {
    fn send_packet(&mut self, packet: &str) -> bool {
        self.send(packet)
    }
}

impl PacketSink for Vec<String> {
    fn send_packet(&mut self, packet: &str) -> bool {
        self.push(packet.to_string());
        true
    }
}

// ── Config ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SenderConfig {
    /// Minimum time between packets.
    pub send_interval_ms: u64,
    /// Smooth gaze and head pose before sending.
    pub smoothing: bool,
    /// Smoothing window length.
    pub sample_count: usize,
    /// Start sending on construction.
    pub auto_start: bool,
    /// Also send the `HAND:` packet.
    pub send_hand: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: 50,
            smoothing: true,
            sample_count: 3,
            auto_start: false,
            send_hand: true,
        }
    }
}

/// One head/gaze reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackingSample {
    /// Gaze point in normalized screen coordinates.
    pub gaze: Vec2,
    /// Head position in metres.
    pub head_position: Vec3,
    pub head_rotation: Quat,
    pub audio_triggered: bool,
}

// ── Packet formats ─────────────────────────────────────────

/// `DATA:` packet.  `head_position` is expected in centimetres here.
pub fn format_tracking_packet(
    gaze: Vec2,
    head_position: Vec3,
    head_rotation: Quat,
    audio_triggered: bool,
) -> String {
    format!(
        "DATA:{:.4},{:.4},{:.2},{:.2},{:.2},{:.4},{:.4},{:.4},{:.4},{}",
        gaze.x,
        gaze.y,
        head_position.x,
        head_position.y,
        head_position.z,
        head_rotation.x,
        head_rotation.y,
        head_rotation.z,
        head_rotation.w,
        if audio_triggered { 1 } else { 0 },
    )
}

/// `HAND:` packet with gesture, handedness, palm center, index tip and
/// palm size, or `HAND:none` without a hand.
pub fn format_hand_packet(classifier: &GestureClassifier) -> String {
    if !classifier.is_hand_detected() {
        return "HAND:none".to_string();
    }
    let palm = classifier.palm_center();
    let tip = classifier.index_tip();
    format!(
        "HAND:{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
        classifier.current_gesture().as_str(),
        classifier.handedness(),
        palm.x,
        palm.y,
        palm.z,
        tip.x,
        tip.y,
        tip.z,
        classifier.palm_size(),
    )
}

// ── Sender ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct TrackingSender {
    pub config: SenderConfig,
    smoother: DataSmoother,
    sending: bool,
    /// Time since the last send.
    elapsed_ms: f64,
    last_sent: Option<String>,
    packets_sent: u64,
}

impl Default for TrackingSender {
    fn default() -> Self {
        Self::new(SenderConfig::default())
    }
}

impl TrackingSender {
    pub fn new(config: SenderConfig) -> Self {
        let smoother = DataSmoother::new(config.sample_count);
        let sending = config.auto_start;
        Self {
            config,
            smoother,
            sending,
            elapsed_ms: 0.0,
            last_sent: None,
            packets_sent: 0,
        }
    }

    pub fn start(&mut self) {
        self.sending = true;
        self.elapsed_ms = 0.0;
        info!(interval_ms = self.config.send_interval_ms, "tracking send started");
    }

    pub fn stop(&mut self) {
        self.sending = false;
        info!(packets = self.packets_sent, "tracking send stopped");
    }

    pub fn toggle(&mut self) -> bool {
        if self.sending {
            self.stop();
        } else {
            self.start();
        }
        self.sending
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Last `DATA:` packet handed to the sink.
    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Advance by `dt_ms` and send once more than the interval has passed.
    ///
    /// Returns true when the sink accepted a tracking packet this call.
    /// Rejected packets are not counted and do not become `last_sent`.
    pub fn update(
        &mut self,
        dt_ms: f64,
        sample: &TrackingSample,
        classifier: &GestureClassifier,
        sink: &mut impl PacketSink,
    ) -> bool {
        if !self.sending {
            return false;
        }

        self.elapsed_ms += dt_ms;
        if self.elapsed_ms <= self.config.send_interval_ms as f64 {
            return false;
        }
        self.elapsed_ms = 0.0;

        let head_cm = sample.head_position * 100.0;
        let (gaze, head, rotation) = if self.config.smoothing {
            (
                self.smoother.smooth_gaze(sample.gaze),
                self.smoother.smooth_head_position(head_cm),
                self.smoother.smooth_head_rotation(sample.head_rotation),
            )
        } else {
            (sample.gaze, head_cm, sample.head_rotation)
        };

        let packet = format_tracking_packet(gaze, head, rotation, sample.audio_triggered);
        if !sink.send_packet(&packet) {
            debug!(packet = %packet, "tracking data not delivered");
            return false;
        }
        debug!(packet = %packet, "tracking data sent");
        self.last_sent = Some(packet);
        self.packets_sent += 1;

        if self.config.send_hand {
            let hand = format_hand_packet(classifier);
            if sink.send_packet(&hand) {
                debug!(packet = %hand, "hand data sent");
            } else {
                debug!(packet = %hand, "hand data not delivered");
            }
        }
        true
    }

    /// Clear smoothing history, e.g. after a replay restarts.
    pub fn reset_smoothing(&mut self) {
        self.smoother.reset();
    }
}
