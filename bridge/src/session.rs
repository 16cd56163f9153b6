//! One replay run: classifier, pointer, sender and link driven frame by frame.

use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::hand::classifier::{GestureClassifier, GestureEvent, GestureKind};
use crate::hand::interpolator::HandPositionInterpolator;
use crate::net::sender::TrackingSender;
use crate::net::udp::UdpLink;
use crate::replay::Replay;

/// What happened in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Zero-based count of frames run so far.
    pub index: u64,
    pub gesture: GestureKind,
    pub events: Vec<GestureEvent>,
    /// Whether the pointer was active after this frame.
    pub pointer_active: bool,
    /// Whether packets were sent this frame.
    pub sent: bool,
}

pub struct BridgeSession {
    pub classifier: GestureClassifier,
    pub interpolator: HandPositionInterpolator,
    pub sender: TrackingSender,
    pub link: UdpLink,
    replay: Replay,
    frame_interval: Duration,
    frames_run: u64,
    max_frames: Option<u64>,
}

impl BridgeSession {
    pub fn new(config: &BridgeConfig, replay: Replay) -> anyhow::Result<Self> {
        let frame_interval = config.frame_interval()?;
        let mut classifier = GestureClassifier::with_config(config.classifier.clone());
        classifier.subscribe(|event| info!(event = event.as_str(), "gesture event"));

        Ok(Self {
            classifier,
            interpolator: HandPositionInterpolator::new(config.interpolator.clone()),
            sender: TrackingSender::new(config.sender.clone()),
            link: UdpLink::new(config.link.server, config.link.local_port),
            replay,
            frame_interval,
            frames_run: 0,
            max_frames: None,
        })
    }

    /// Stop after `max` frames regardless of the replay length.
    pub fn set_max_frames(&mut self, max: Option<u64>) {
        self.max_frames = max;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.replay.set_looping(looping);
    }

    /// Open the link and begin sending.
    pub fn start_sending(&mut self) -> anyhow::Result<()> {
        self.link.connect().context("failed to open UDP link")?;
        if !self.sender.is_sending() {
            self.sender.start();
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    /// Run one frame.  `None` once the replay or the frame limit is done.
    pub fn step(&mut self) -> Option<FrameReport> {
        if self.max_frames.is_some_and(|max| self.frames_run >= max) {
            return None;
        }

        // Last and first frames of a recording are not consecutive.
        if self.replay.is_looping() && self.replay.position() >= self.replay.len() {
            debug!(passes = self.replay.passes(), "replay wrapped");
            self.classifier.reset_smoothing();
            self.sender.reset_smoothing();
        }
        let frame = self.replay.next_frame()?.clone();

        if let Some(label) = &frame.handedness {
            self.classifier.set_handedness(label);
        }
        let events = self.classifier.update_from(&frame.landmarks);
        for event in &events {
            self.interpolator.handle_event(event);
        }

        let dt = self.frame_interval.as_secs_f64();
        self.interpolator.sync_from(&self.classifier);
        let pointer_active = self.interpolator.tick(dt as f32);

        for message in self.link.poll_incoming() {
            debug!(message = %message, "message from server");
        }

        let sample = frame.tracking_sample();
        let sent = self
            .sender
            .update(dt * 1000.0, &sample, &self.classifier, &mut self.link);

        let report = FrameReport {
            index: self.frames_run,
            gesture: self.classifier.current_gesture(),
            events,
            pointer_active,
            sent,
        };
        self.frames_run += 1;
        Some(report)
    }

    /// Log final state and close the link.
    pub fn finish(&mut self) {
        info!(
            frames = self.frames_run,
            packets = self.sender.packets_sent(),
            status = %self.classifier.status_sexp(),
            "replay finished"
        );
        if self.sender.is_sending() {
            self.sender.stop();
        }
        self.link.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::classifier::{neutral_hand, pinch_hand, pointing_hand};
    use crate::replay::{format_frame, ReplayFrame};
    use std::net::UdpSocket;

    fn frame(landmarks: Vec<crate::hand::landmarks::Vec3>) -> ReplayFrame {
        ReplayFrame {
            handedness: Some("Left".to_string()),
            landmarks,
            ..ReplayFrame::default()
        }
    }

    fn recording() -> Replay {
        let mut frames = Vec::new();
        frames.extend((0..4).map(|_| frame(pointing_hand())));
        frames.extend((0..4).map(|_| frame(pinch_hand())));
        frames.push(ReplayFrame::default());
        Replay::new(frames)
    }

    fn quiet_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.classifier.smoothing_factor = 0.0;
        config
    }

    #[test]
    fn test_runs_to_end_of_replay() {
        let mut session = BridgeSession::new(&quiet_config(), recording()).unwrap();
        let reports: Vec<FrameReport> = std::iter::from_fn(|| session.step()).collect();
        assert_eq!(reports.len(), 9);
        assert_eq!(session.frames_run(), 9);

        let events: Vec<GestureEvent> = reports.iter().flat_map(|r| r.events.clone()).collect();
        assert_eq!(
            events,
            vec![
                GestureEvent::HandDetected,
                GestureEvent::PointingStart,
                GestureEvent::PointingEnd,
                GestureEvent::PinchStart,
                GestureEvent::HandLost,
                GestureEvent::PinchEnd,
            ]
        );
        assert_eq!(reports[2].gesture, GestureKind::Pointing);
        assert_eq!(reports[7].gesture, GestureKind::Pinching);
        assert_eq!(session.classifier.current_gesture(), GestureKind::Neutral);
        assert_eq!(session.classifier.handedness(), "Right");
    }

    #[test]
    fn test_pointer_follows_pointing() {
        let mut session = BridgeSession::new(&quiet_config(), recording()).unwrap();
        let reports: Vec<FrameReport> = std::iter::from_fn(|| session.step()).collect();
        assert!(!reports[1].pointer_active);
        assert!(reports[2].pointer_active);
        assert!(reports[3].pointer_active);
        assert!(!reports[8].pointer_active);
        assert!(!session.interpolator.is_hand_visible());
    }

    #[test]
    fn test_max_frames() {
        let mut session = BridgeSession::new(&quiet_config(), recording()).unwrap();
        session.set_max_frames(Some(3));
        assert_eq!(std::iter::from_fn(|| session.step()).count(), 3);
    }

    #[test]
    fn test_looping_with_limit() {
        let mut session = BridgeSession::new(&quiet_config(), recording()).unwrap();
        session.set_looping(true);
        session.set_max_frames(Some(20));
        assert_eq!(std::iter::from_fn(|| session.step()).count(), 20);
    }

    #[test]
    fn test_wrap_reseeds_smoothing() {
        let frames = vec![frame(pointing_hand()), frame(pinch_hand())];
        let mut session = BridgeSession::new(&BridgeConfig::default(), Replay::new(frames)).unwrap();
        session.set_looping(true);

        session.step().unwrap();
        let first_pass = session.classifier.landmarks().to_vec();
        session.step().unwrap();
        assert_ne!(session.classifier.landmarks(), first_pass.as_slice());

        // Back at frame 0: no blending with the pinch frame.
        session.step().unwrap();
        assert_eq!(session.classifier.landmarks(), first_pass.as_slice());
        assert_eq!(session.replay.passes(), 1);
    }

    #[test]
    fn test_unusable_frame_rate_rejected() {
        let mut config = quiet_config();
        config.frame_rate_hz = 1e-300;
        assert!(BridgeSession::new(&config, recording()).is_err());
    }

    #[test]
    fn test_frame_interval_from_rate() {
        let mut config = quiet_config();
        config.frame_rate_hz = 20.0;
        let session = BridgeSession::new(&config, Replay::new(Vec::new())).unwrap();
        assert_eq!(session.frame_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_no_packets_without_sending() {
        let mut session = BridgeSession::new(&quiet_config(), recording()).unwrap();
        let reports: Vec<FrameReport> = std::iter::from_fn(|| session.step()).collect();
        assert!(reports.iter().all(|r| !r.sent));
        assert_eq!(session.sender.packets_sent(), 0);
    }

    #[test]
    fn test_streams_packets_to_server() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let mut config = quiet_config();
        config.link.server = server.local_addr().unwrap();
        config.link.local_port = 0;
        config.frame_rate_hz = 10.0;

        let text: String = (0..3)
            .map(|_| format_frame(&frame(neutral_hand())) + "\n")
            .collect();
        let mut session = BridgeSession::new(&config, text.parse().unwrap()).unwrap();
        session.start_sending().unwrap();

        let sent = std::iter::from_fn(|| session.step()).filter(|r| r.sent).count();
        // 100 ms per frame exceeds the 50 ms interval every frame.
        assert_eq!(sent, 3);
        session.finish();

        let mut buf = [0u8; 1024];
        let mut received = Vec::new();
        while let Ok((len, _)) = server.recv_from(&mut buf) {
            let text = String::from_utf8_lossy(&buf[..len]).into_owned();
            let done = text == crate::net::udp::DISCONNECT_MESSAGE;
            received.push(text);
            if done {
                break;
            }
        }

        assert_eq!(received[0], crate::net::udp::CONNECT_MESSAGE);
        assert_eq!(received.iter().filter(|p| p.starts_with("DATA:")).count(), 3);
        assert_eq!(received.iter().filter(|p| p.starts_with("HAND:neutral,Right,")).count(), 3);
        assert_eq!(received.last().map(String::as_str), Some("__DISCONNECT__"));
    }
}
