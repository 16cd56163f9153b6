//! Gesture classification from per-frame hand landmarks.
//!
//! Consumes 21 normalized landmarks per frame, mirrors and smooths them,
//! derives palm-size-relative thresholds, and classifies the hand as
//! neutral, pinching, pointing, or open.  A candidate gesture must be
//! detected on consecutive frames before it is published, and every
//! published transition emits start/end events.

use tracing::{debug, info};

use super::landmarks::{HandLandmark, Vec3, LANDMARK_COUNT};
use super::metrics::DistanceTable;

// ── Gesture types ──────────────────────────────────────────

/// Published gesture state.  Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GestureKind {
    /// Relaxed hand, or nothing else matched.
    #[default]
    Neutral,
    /// Thumb and index fingertips together.
    Pinching,
    /// Index finger extended, the others curled.
    Pointing,
    /// All five digits extended and spread.
    HandOpen,
}

impl GestureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Pinching => "pinching",
            Self::Pointing => "pointing",
            Self::HandOpen => "hand-open",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "neutral" => Some(Self::Neutral),
            "pinching" => Some(Self::Pinching),
            "pointing" => Some(Self::Pointing),
            "hand-open" => Some(Self::HandOpen),
            _ => None,
        }
    }
}

// ── Events ─────────────────────────────────────────────────

/// Transition events emitted during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureEvent {
    HandDetected,
    HandLost,
    PinchStart,
    PinchEnd,
    PointingStart,
    PointingEnd,
    HandOpenStart,
    HandOpenEnd,
}

impl GestureEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandDetected => "hand-detected",
            Self::HandLost => "hand-lost",
            Self::PinchStart => "pinch-start",
            Self::PinchEnd => "pinch-end",
            Self::PointingStart => "pointing-start",
            Self::PointingEnd => "pointing-end",
            Self::HandOpenStart => "hand-open-start",
            Self::HandOpenEnd => "hand-open-end",
        }
    }

    /// Event fired when `gesture` becomes the published state.
    pub fn started(gesture: GestureKind) -> Option<Self> {
        match gesture {
            GestureKind::Neutral => None,
            GestureKind::Pinching => Some(Self::PinchStart),
            GestureKind::Pointing => Some(Self::PointingStart),
            GestureKind::HandOpen => Some(Self::HandOpenStart),
        }
    }

    /// Event fired when `gesture` stops being the published state.
    pub fn ended(gesture: GestureKind) -> Option<Self> {
        match gesture {
            GestureKind::Neutral => None,
            GestureKind::Pinching => Some(Self::PinchEnd),
            GestureKind::Pointing => Some(Self::PointingEnd),
            GestureKind::HandOpen => Some(Self::HandOpenEnd),
        }
    }
}

/// Handle returned by [`GestureClassifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&GestureEvent)>;

// ── Config ─────────────────────────────────────────────────

/// Classification thresholds.  Factors are fractions of palm size.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Weight of the previous smoothed pose (0.0 disables smoothing).
    pub smoothing_factor: f32,
    /// Consecutive matching frames before a candidate is published.
    pub frames_to_activate: u32,
    /// Thumb-index distance below which the hand is pinching.
    pub pinch_factor: f32,
    /// Index length must exceed the other fingers' average by this ratio.
    pub pointing_length_ratio: f32,
    /// Minimum absolute index length for pointing.
    pub pointing_min_index_factor: f32,
    /// Index tip must be this much farther from the palm than the others.
    pub pointing_extension_ratio: f32,
    /// Minimum average index-to-other-tip separation for pointing.
    pub pointing_tip_separation_factor: f32,
    /// Minimum digit length for an open hand.
    pub open_min_length_factor: f32,
    /// Minimum thumb-to-pinky spread for an open hand.
    pub open_min_spread_factor: f32,
    /// Maximum max/min ratio of fingertip-to-palm distances when neutral.
    pub neutral_uniformity_max: f32,
    /// Lower bound of the neutral fingertip distance band.
    pub neutral_min_factor: f32,
    /// Upper bound of the neutral fingertip distance band.
    pub neutral_max_factor: f32,
    /// Flip incoming X coordinates (front-facing camera).
    pub mirror_x: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.7,
            frames_to_activate: 2,
            pinch_factor: 0.2,
            pointing_length_ratio: 2.0,
            pointing_min_index_factor: 0.5,
            pointing_extension_ratio: 1.8,
            pointing_tip_separation_factor: 0.5,
            open_min_length_factor: 0.35,
            open_min_spread_factor: 0.6,
            neutral_uniformity_max: 1.5,
            neutral_min_factor: 0.15,
            neutral_max_factor: 0.45,
            mirror_x: true,
        }
    }
}

/// Raw per-detector results for the last classified frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureDetections {
    pub pinch: bool,
    pub pointing: bool,
    pub hand_open: bool,
    pub neutral: bool,
}

impl GestureDetections {
    /// First match in priority order: pinch, pointing, open, neutral.
    pub fn resolve(&self) -> GestureKind {
        if self.pinch {
            GestureKind::Pinching
        } else if self.pointing {
            GestureKind::Pointing
        } else if self.hand_open {
            GestureKind::HandOpen
        } else {
            GestureKind::Neutral
        }
    }
}

// Finger (base, tip) landmark pairs.
const THUMB: (usize, usize) = (1, 4);
const INDEX: (usize, usize) = (5, 8);
const MIDDLE: (usize, usize) = (9, 12);
const RING: (usize, usize) = (13, 16);
const PINKY: (usize, usize) = (17, 20);

const WRIST: usize = 0;
const MIDDLE_MCP: usize = 9;
const THUMB_TIP: usize = 4;
const INDEX_TIP: usize = 8;
const MIDDLE_TIP: usize = 12;
const RING_TIP: usize = 16;
const PINKY_TIP: usize = 20;

// ── State ──────────────────────────────────────────────────

/// Stateful single-hand gesture classifier.
///
/// Written by one `update_from` call per frame; read through the
/// accessors by any number of consumers between updates.
pub struct GestureClassifier {
    /// Configuration.
    pub config: ClassifierConfig,
    /// Mirrored, smoothed landmarks for the current frame.
    landmarks: Vec<Vec3>,
    /// Smoothing history, same length as `landmarks` when valid.
    smoothed: Vec<Vec3>,
    handedness: String,
    palm_size: f32,
    palm_center: Vec3,
    distances: DistanceTable,
    /// Published gesture.
    current: GestureKind,
    /// Raw detection being debounced.
    candidate: GestureKind,
    /// Consecutive frames the candidate has repeated.
    candidate_frames: u32,
    detections: GestureDetections,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
    /// Events emitted during the current call.
    pending: Vec<GestureEvent>,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GestureClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureClassifier")
            .field("config", &self.config)
            .field("landmarks", &self.landmarks.len())
            .field("handedness", &self.handedness)
            .field("palm_size", &self.palm_size)
            .field("current", &self.current)
            .field("candidate", &self.candidate)
            .field("candidate_frames", &self.candidate_frames)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl GestureClassifier {
    /// Create a classifier with default thresholds.
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self {
            config,
            landmarks: Vec::with_capacity(LANDMARK_COUNT),
            smoothed: Vec::with_capacity(LANDMARK_COUNT),
            handedness: String::new(),
            palm_size: 0.0,
            palm_center: Vec3::ZERO,
            distances: DistanceTable::new(),
            current: GestureKind::Neutral,
            candidate: GestureKind::Neutral,
            candidate_frames: 0,
            detections: GestureDetections::default(),
            observers: Vec::new(),
            next_subscription: 0,
            pending: Vec::new(),
        }
    }

    // ── Subscriptions ─────────────────────────────────────

    /// Register an observer.  Observers run synchronously, in
    /// subscription order, for every event emitted by an update.
    pub fn subscribe(&mut self, observer: impl FnMut(&GestureEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer.  Returns true if it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() < before
    }

    fn emit(&mut self, event: GestureEvent) {
        debug!(event = event.as_str(), "gesture event");
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
        self.pending.push(event);
    }

    // ── Frame input ───────────────────────────────────────

    /// Ingest one frame of landmarks.  An empty slice means no hand.
    ///
    /// Returns the events emitted by this frame, in emission order.
    pub fn update_from(&mut self, points: &[Vec3]) -> Vec<GestureEvent> {
        let had_landmarks = !self.landmarks.is_empty();

        self.landmarks.clear();
        self.distances.advance();

        if points.is_empty() {
            if had_landmarks {
                info!("hand lost");
                self.emit(GestureEvent::HandLost);
                self.set_gesture(GestureKind::Neutral);
                self.reset_candidate();
                self.smoothed.clear();
                self.palm_size = 0.0;
                self.palm_center = Vec3::ZERO;
            }
            return std::mem::take(&mut self.pending);
        }

        let mirror = self.config.mirror_x;
        self.landmarks.extend(
            points
                .iter()
                .map(|p| if mirror { p.mirrored_x() } else { *p }),
        );

        self.apply_smoothing();

        if !had_landmarks {
            info!(count = self.landmarks.len(), "hand detected");
            self.emit(GestureEvent::HandDetected);
        }

        self.palm_size = self.distance(WRIST, MIDDLE_MCP);
        self.palm_center = if self.landmarks.len() >= LANDMARK_COUNT {
            self.landmarks[WRIST].midpoint(self.landmarks[MIDDLE_MCP])
        } else {
            Vec3::ZERO
        };

        self.update_gesture();
        std::mem::take(&mut self.pending)
    }

    /// Blend toward the previous smoothed pose, or reseed the history.
    fn apply_smoothing(&mut self) {
        let factor = self.config.smoothing_factor;
        if factor > 0.0 && self.smoothed.len() == self.landmarks.len() {
            for (current, history) in self.landmarks.iter_mut().zip(self.smoothed.iter_mut()) {
                *history = current.lerp(*history, factor);
                *current = *history;
            }
        } else {
            self.smoothed.clear();
            self.smoothed.extend_from_slice(&self.landmarks);
        }
    }

    /// Drop the smoothing history so the next frame reseeds it.  Gesture
    /// state is kept.
    pub fn reset_smoothing(&mut self) {
        self.smoothed.clear();
    }

    /// Record the handedness label, swapped to undo camera mirroring.
    pub fn set_handedness(&mut self, label: &str) {
        self.handedness = mirror_handedness(label);
    }

    /// Explicit tracking loss: reset everything and report the hand lost.
    pub fn clear_hand_data(&mut self) -> Vec<GestureEvent> {
        self.landmarks.clear();
        self.smoothed.clear();
        self.distances.advance();

        self.set_gesture(GestureKind::Neutral);
        self.reset_candidate();
        self.handedness.clear();
        self.palm_size = 0.0;
        self.palm_center = Vec3::ZERO;

        info!("hand data cleared");
        self.emit(GestureEvent::HandLost);
        std::mem::take(&mut self.pending)
    }

    fn reset_candidate(&mut self) {
        self.candidate = GestureKind::Neutral;
        self.candidate_frames = 0;
        self.detections = GestureDetections::default();
    }

    // ── Classification ────────────────────────────────────

    fn update_gesture(&mut self) {
        if self.landmarks.len() < LANDMARK_COUNT {
            return;
        }

        let detections = GestureDetections {
            pinch: self.detect_pinch(),
            pointing: self.detect_pointing(),
            hand_open: self.detect_hand_open(),
            neutral: self.detect_neutral(),
        };
        self.detections = detections;
        let detected = detections.resolve();

        if detected != self.candidate {
            self.candidate = detected;
            self.candidate_frames = 0;
        } else {
            self.candidate_frames = self.candidate_frames.saturating_add(1);
        }

        if self.candidate_frames >= self.config.frames_to_activate && self.current != self.candidate
        {
            self.set_gesture(self.candidate);
        }
    }

    /// Publish a gesture, emitting end/start events around the change.
    fn set_gesture(&mut self, gesture: GestureKind) {
        if gesture == self.current {
            return;
        }

        let previous = self.current;
        if let Some(event) = GestureEvent::ended(previous) {
            self.emit(event);
        }

        self.current = gesture;
        info!(from = previous.as_str(), to = gesture.as_str(), "gesture changed");

        if let Some(event) = GestureEvent::started(gesture) {
            self.emit(event);
        }
    }

    fn finger_length(&self, finger: (usize, usize)) -> f32 {
        self.distance(finger.0, finger.1)
    }

    fn distance_to_palm(&self, index: usize) -> f32 {
        self.landmark(index).distance(self.palm_center)
    }

    fn detect_pinch(&self) -> bool {
        self.distance(THUMB_TIP, INDEX_TIP) < self.palm_size * self.config.pinch_factor
    }

    fn detect_pointing(&self) -> bool {
        let cfg = &self.config;

        // Index clearly longer than the curled fingers.
        let index_length = self.finger_length(INDEX);
        let others_length = (self.finger_length(MIDDLE)
            + self.finger_length(RING)
            + self.finger_length(PINKY))
            / 3.0;
        let long_index = index_length > self.palm_size * cfg.pointing_min_index_factor
            && index_length > others_length * cfg.pointing_length_ratio;

        // Index tip well away from the palm compared with the others.
        let index_to_palm = self.distance_to_palm(INDEX_TIP);
        let others_to_palm = (self.distance_to_palm(MIDDLE_TIP)
            + self.distance_to_palm(RING_TIP)
            + self.distance_to_palm(PINKY_TIP))
            / 3.0;
        let extended = index_to_palm > others_to_palm * cfg.pointing_extension_ratio;

        // Index tip separated from the other tips.
        let separation = (self.distance(INDEX_TIP, MIDDLE_TIP)
            + self.distance(INDEX_TIP, RING_TIP)
            + self.distance(INDEX_TIP, PINKY_TIP))
            / 3.0;
        let separated = separation > self.palm_size * cfg.pointing_tip_separation_factor;

        long_index && extended && separated
    }

    fn detect_hand_open(&self) -> bool {
        if self.detect_pinch() {
            return false;
        }

        let min_length = self.palm_size * self.config.open_min_length_factor;
        let all_extended = [THUMB, INDEX, MIDDLE, RING, PINKY]
            .iter()
            .all(|finger| self.finger_length(*finger) > min_length);

        let spread = self.distance(THUMB_TIP, PINKY_TIP);
        all_extended && spread > self.palm_size * self.config.open_min_spread_factor
    }

    fn detect_neutral(&self) -> bool {
        let cfg = &self.config;
        let tips = [
            self.distance_to_palm(INDEX_TIP),
            self.distance_to_palm(MIDDLE_TIP),
            self.distance_to_palm(RING_TIP),
            self.distance_to_palm(PINKY_TIP),
        ];

        let average = tips.iter().sum::<f32>() / tips.len() as f32;
        let max = tips.iter().copied().fold(f32::MIN, f32::max);
        let min = tips.iter().copied().fold(f32::MAX, f32::min);

        let uniform = max / min < cfg.neutral_uniformity_max;
        let in_band = average >= self.palm_size * cfg.neutral_min_factor
            && average <= self.palm_size * cfg.neutral_max_factor;
        let not_pinching = self.distance(THUMB_TIP, INDEX_TIP) > self.palm_size * cfg.pinch_factor;

        uniform && in_band && not_pinching
    }

    // ── Accessors ─────────────────────────────────────────

    /// Landmark position by index; zero vector when missing.
    pub fn landmark(&self, index: usize) -> Vec3 {
        self.landmarks.get(index).copied().unwrap_or(Vec3::ZERO)
    }

    pub fn landmark_at(&self, landmark: HandLandmark) -> Vec3 {
        self.landmark(landmark.index())
    }

    pub fn wrist(&self) -> Vec3 {
        self.landmark_at(HandLandmark::Wrist)
    }

    pub fn thumb_tip(&self) -> Vec3 {
        self.landmark_at(HandLandmark::ThumbTip)
    }

    pub fn index_tip(&self) -> Vec3 {
        self.landmark_at(HandLandmark::IndexTip)
    }

    pub fn middle_tip(&self) -> Vec3 {
        self.landmark_at(HandLandmark::MiddleTip)
    }

    pub fn ring_tip(&self) -> Vec3 {
        self.landmark_at(HandLandmark::RingTip)
    }

    pub fn pinky_tip(&self) -> Vec3 {
        self.landmark_at(HandLandmark::PinkyTip)
    }

    /// All landmarks of the current frame (mirrored and smoothed).
    pub fn landmarks(&self) -> &[Vec3] {
        &self.landmarks
    }

    /// Distance between two landmarks, memoized for the current frame.
    /// Returns 0.0 when either index is missing.
    pub fn distance(&self, a: usize, b: usize) -> f32 {
        let (Some(pa), Some(pb)) = (self.landmarks.get(a), self.landmarks.get(b)) else {
            return 0.0;
        };
        self.distances.get_or_compute(a, b, || pa.distance(*pb))
    }

    /// Wrist to middle-finger base distance; the scale for all thresholds.
    pub fn palm_size(&self) -> f32 {
        self.palm_size
    }

    /// Midpoint of wrist and middle-finger base.
    pub fn palm_center(&self) -> Vec3 {
        self.palm_center
    }

    /// Unit normal of the palm plane; `Vec3::FORWARD` without a full hand.
    pub fn palm_normal(&self) -> Vec3 {
        if self.landmarks.len() < LANDMARK_COUNT {
            return Vec3::FORWARD;
        }
        let across = self.landmark_at(HandLandmark::IndexMcp) - self.landmark_at(HandLandmark::PinkyMcp);
        let along = self.landmark_at(HandLandmark::MiddleMcp) - self.landmark_at(HandLandmark::Wrist);
        across.cross(along).normalized()
    }

    pub fn current_gesture(&self) -> GestureKind {
        self.current
    }

    pub fn is_neutral(&self) -> bool {
        self.current == GestureKind::Neutral
    }

    pub fn is_pinching(&self) -> bool {
        self.current == GestureKind::Pinching
    }

    pub fn is_pointing(&self) -> bool {
        self.current == GestureKind::Pointing
    }

    pub fn is_hand_open(&self) -> bool {
        self.current == GestureKind::HandOpen
    }

    pub fn is_hand_detected(&self) -> bool {
        !self.landmarks.is_empty()
    }

    /// Mirrored handedness label ("" until set).
    pub fn handedness(&self) -> &str {
        &self.handedness
    }

    /// Raw detector flags from the last classified frame.
    pub fn detections(&self) -> GestureDetections {
        self.detections
    }

    /// Frame epoch of the distance cache.
    pub fn epoch(&self) -> u64 {
        self.distances.epoch()
    }

    /// Generate s-expression for debug status.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:hand {} :gesture :{} :handedness \"{}\" :palm-size {:.4} :candidate :{} :frames {})",
            if self.is_hand_detected() { "t" } else { "nil" },
            self.current.as_str(),
            self.handedness,
            self.palm_size,
            self.candidate.as_str(),
            self.candidate_frames,
        )
    }

    /// Generate s-expression for the active thresholds.
    pub fn config_sexp(&self) -> String {
        let c = &self.config;
        format!(
            "(:smoothing-factor {:.2} :frames-to-activate {} :pinch-factor {:.2} :pointing-length-ratio {:.2} :pointing-extension-ratio {:.2} :open-min-length-factor {:.2} :open-min-spread-factor {:.2} :mirror-x {})",
            c.smoothing_factor,
            c.frames_to_activate,
            c.pinch_factor,
            c.pointing_length_ratio,
            c.pointing_extension_ratio,
            c.open_min_length_factor,
            c.open_min_spread_factor,
            if c.mirror_x { "t" } else { "nil" },
        )
    }
}

/// Swap a free-form "left"/"right" label; other labels pass through.
pub fn mirror_handedness(label: &str) -> String {
    let lower = label.to_lowercase();
    if lower.contains("left") {
        "Right".to_string()
    } else if lower.contains("right") {
        "Left".to_string()
    } else {
        label.to_string()
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Build a 21-point hand from a curled neutral pose with palm size 0.1,
/// replacing the `(index, x, y)` entries in `overrides`.
#[cfg(test)]
pub(crate) fn make_hand(overrides: &[(usize, f32, f32)]) -> Vec<Vec3> {
    // Coordinates are given in the mirrored (classifier) frame and
    // un-mirrored here, so tests can reason about what the classifier sees.
    let mut points = vec![
        (0.50, 0.60), // 0 wrist
        (0.46, 0.58), // 1 thumb cmc
        (0.45, 0.57), // 2
        (0.445, 0.565), // 3
        (0.44, 0.56), // 4 thumb tip
        (0.47, 0.50), // 5 index mcp
        (0.47, 0.47), // 6
        (0.47, 0.50), // 7
        (0.47, 0.53), // 8 index tip
        (0.50, 0.50), // 9 middle mcp
        (0.50, 0.47), // 10
        (0.50, 0.49), // 11
        (0.50, 0.52), // 12 middle tip
        (0.53, 0.50), // 13 ring mcp
        (0.53, 0.48), // 14
        (0.53, 0.50), // 15
        (0.53, 0.53), // 16 ring tip
        (0.56, 0.51), // 17 pinky mcp
        (0.56, 0.50), // 18
        (0.55, 0.53), // 19
        (0.53, 0.56), // 20 pinky tip
    ];
    for &(i, x, y) in overrides {
        points[i] = (x, y);
    }
    points
        .into_iter()
        .map(|(x, y)| Vec3::new(1.0 - x, y, 0.0))
        .collect()
}

#[cfg(test)]
pub(crate) fn neutral_hand() -> Vec<Vec3> {
    make_hand(&[])
}

#[cfg(test)]
pub(crate) fn pinch_hand() -> Vec<Vec3> {
    make_hand(&[(4, 0.47, 0.53)])
}

#[cfg(test)]
pub(crate) fn pointing_hand() -> Vec<Vec3> {
    make_hand(&[(6, 0.47, 0.46), (7, 0.47, 0.42), (8, 0.47, 0.38)])
}

#[cfg(test)]
pub(crate) fn open_hand() -> Vec<Vec3> {
    make_hand(&[
        (4, 0.38, 0.50),
        (8, 0.44, 0.38),
        (12, 0.50, 0.37),
        (16, 0.56, 0.38),
        (20, 0.62, 0.42),
    ])
}

// ── Tests ──────────────────────────────────────────────────
