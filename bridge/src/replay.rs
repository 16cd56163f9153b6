//! Recorded frame source.
//!
//! A recording holds one plist per line:
//!
//! ```text
//! ; comment
//! (:handedness "Left" :landmarks ((0.50 0.60 0.0) ...) :gaze (0.5 0.5)
//!  :head-position (0.0 0.0 0.35) :head-rotation (0 0 0 1) :audio nil)
//! ```
//!
//! Every key is optional.  Missing or empty `:landmarks` means no hand was
//! seen in that frame.

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context};
use lexpr::Value;
use tracing::info;

use crate::hand::landmarks::{Quat, Vec2, Vec3};
use crate::net::sender::TrackingSample;
use crate::sexp;

/// One recorded camera/pose frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayFrame {
    pub handedness: Option<String>,
    pub landmarks: Vec<Vec3>,
    pub gaze: Option<Vec2>,
    pub head_position: Option<Vec3>,
    pub head_rotation: Option<Quat>,
    pub audio: bool,
}

impl ReplayFrame {
    /// Head/gaze sample, with neutral defaults for missing fields.
    pub fn tracking_sample(&self) -> TrackingSample {
        TrackingSample {
            gaze: self.gaze.unwrap_or(Vec2::new(0.5, 0.5)),
            head_position: self.head_position.unwrap_or(Vec3::ZERO),
            head_rotation: self.head_rotation.unwrap_or(Quat::IDENTITY),
            audio_triggered: self.audio,
        }
    }
}

/// Parse one frame line.
pub fn parse_frame(line: &str) -> anyhow::Result<ReplayFrame> {
    let value = sexp::parse(line)?;
    if sexp::list_items(&value).is_none() {
        bail!("frame is not a list");
    }

    let handedness = match sexp::get_value(&value, "handedness") {
        None => None,
        Some(v) if sexp::is_nil(v) => None,
        Some(v) => Some(sexp::as_string(v).context(":handedness must be a string")?),
    };

    let landmarks = match sexp::get_value(&value, "landmarks") {
        None => Vec::new(),
        Some(v) => parse_landmarks(v)?,
    };

    let gaze = optional_numbers(&value, "gaze", 2)?.map(|n| Vec2::new(n[0], n[1]));
    let head_position =
        optional_numbers(&value, "head-position", 3)?.map(|n| Vec3::new(n[0], n[1], n[2]));
    let head_rotation =
        optional_numbers(&value, "head-rotation", 4)?.map(|n| Quat::new(n[0], n[1], n[2], n[3]));
    let audio = sexp::get_bool(&value, "audio").unwrap_or(false);

    Ok(ReplayFrame {
        handedness,
        landmarks,
        gaze,
        head_position,
        head_rotation,
        audio,
    })
}

fn parse_landmarks(value: &Value) -> anyhow::Result<Vec<Vec3>> {
    let points = sexp::list_items(value).context(":landmarks must be a list")?;
    points
        .into_iter()
        .enumerate()
        .map(|(i, point)| -> anyhow::Result<Vec3> {
            let n = sexp::number_list(point)
                .with_context(|| format!("landmark {} is not a list of numbers", i))?;
            match n.as_slice() {
                [x, y] => Ok(Vec3::new(*x as f32, *y as f32, 0.0)),
                [x, y, z] => Ok(Vec3::new(*x as f32, *y as f32, *z as f32)),
                _ => bail!("landmark {} has {} coordinates, expected 2 or 3", i, n.len()),
            }
        })
        .collect()
}

/// Fixed-length number list under `key`; `nil` counts as absent.
fn optional_numbers(plist: &Value, key: &str, len: usize) -> anyhow::Result<Option<Vec<f32>>> {
    let Some(v) = sexp::get_value(plist, key) else {
        return Ok(None);
    };
    if sexp::is_nil(v) {
        return Ok(None);
    }
    let n = sexp::number_list(v).with_context(|| format!(":{} must be a list of numbers", key))?;
    if n.len() != len {
        bail!(":{} needs {} numbers, got {}", key, len, n.len());
    }
    Ok(Some(n.into_iter().map(|x| x as f32).collect()))
}

// ── Replay ─────────────────────────────────────────────────

/// In-memory recording with a playback cursor.
#[derive(Debug, Clone)]
pub struct Replay {
    frames: Vec<ReplayFrame>,
    cursor: usize,
    looping: bool,
    /// Completed passes through the recording.
    passes: u64,
}

impl Replay {
    pub fn new(frames: Vec<ReplayFrame>) -> Self {
        Self {
            frames,
            cursor: 0,
            looping: false,
            passes: 0,
        }
    }

    /// Read a recording file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay {}", path.display()))?;
        let replay: Replay = text
            .parse()
            .with_context(|| format!("failed to parse replay {}", path.display()))?;
        info!(path = %path.display(), frames = replay.len(), "replay loaded");
        Ok(replay)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[ReplayFrame] {
        &self.frames
    }

    /// Index of the frame `next_frame` will return.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Next frame, wrapping around when looping.  `None` at the end.
    pub fn next_frame(&mut self) -> Option<&ReplayFrame> {
        if self.cursor >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return None;
            }
            self.cursor = 0;
        }
        let frame = self.frames.get(self.cursor)?;
        self.cursor += 1;
        if self.cursor == self.frames.len() {
            self.passes += 1;
        }
        Some(frame)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl FromStr for Replay {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> anyhow::Result<Self> {
        let mut frames = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let frame = parse_frame(line).with_context(|| format!("line {}", i + 1))?;
            frames.push(frame);
        }
        Ok(Self::new(frames))
    }
}

/// Render a frame back to its line format.
pub fn format_frame(frame: &ReplayFrame) -> String {
    let mut s = String::from("(");
    if let Some(h) = &frame.handedness {
        s.push_str(&format!(":handedness \"{}\" ", sexp::escape_string(h)));
    }
    s.push_str(":landmarks (");
    let points: Vec<String> = frame
        .landmarks
        .iter()
        .map(|p| format!("({} {} {})", p.x, p.y, p.z))
        .collect();
    s.push_str(&points.join(" "));
    s.push(')');
    if let Some(g) = frame.gaze {
        s.push_str(&format!(" :gaze ({} {})", g.x, g.y));
    }
    if let Some(p) = frame.head_position {
        s.push_str(&format!(" :head-position ({} {} {})", p.x, p.y, p.z));
    }
    if let Some(q) = frame.head_rotation {
        s.push_str(&format!(" :head-rotation ({} {} {} {})", q.x, q.y, q.z, q.w));
    }
    s.push_str(if frame.audio { " :audio t)" } else { " :audio nil)" });
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::classifier::neutral_hand;
    use std::io::Write;

    #[test]
    fn test_parse_full_frame() {
        let frame = parse_frame(
            "(:handedness \"Left\" :landmarks ((0.5 0.6 0.0) (0.4 0.5)) :gaze (0.25 0.75) \
             :head-position (0.1 0.2 0.3) :head-rotation (0 0 0 1) :audio t)",
        )
        .unwrap();
        assert_eq!(frame.handedness.as_deref(), Some("Left"));
        assert_eq!(frame.landmarks.len(), 2);
        assert_eq!(frame.landmarks[1], Vec3::new(0.4, 0.5, 0.0));
        assert_eq!(frame.gaze, Some(Vec2::new(0.25, 0.75)));
        assert_eq!(frame.head_position, Some(Vec3::new(0.1, 0.2, 0.3)));
        assert_eq!(frame.head_rotation, Some(Quat::IDENTITY));
        assert!(frame.audio);
    }

    #[test]
    fn test_parse_empty_frame() {
        let frame = parse_frame("()").unwrap();
        assert_eq!(frame, ReplayFrame::default());

        let frame = parse_frame("(:landmarks nil :handedness nil)").unwrap();
        assert!(frame.landmarks.is_empty());
        assert!(frame.handedness.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_frame("(:landmarks ((0.5)))").is_err());
        assert!(parse_frame("(:landmarks ((a b c)))").is_err());
        assert!(parse_frame("(:gaze (1 2 3))").is_err());
        assert!(parse_frame("(:landmarks 5)").is_err());
        assert!(parse_frame("42").is_err());
        assert!(parse_frame("(:gaze").is_err());
    }

    #[test]
    fn test_tracking_sample_defaults() {
        let sample = ReplayFrame::default().tracking_sample();
        assert_eq!(sample.gaze, Vec2::new(0.5, 0.5));
        assert_eq!(sample.head_position, Vec3::ZERO);
        assert_eq!(sample.head_rotation, Quat::IDENTITY);
        assert!(!sample.audio_triggered);
    }

    #[test]
    fn test_from_str_skips_comments_and_blanks() {
        let text = "; recorded session\n\n(:audio t)\n   \n(:landmarks ((0.1 0.2 0.3)))\n";
        let replay: Replay = text.parse().unwrap();
        assert_eq!(replay.len(), 2);
        assert!(replay.frames()[0].audio);
        assert_eq!(replay.frames()[1].landmarks.len(), 1);
    }

    #[test]
    fn test_from_str_reports_line_number() {
        let text = "(:audio t)\n; ok\n(:gaze (1))\n";
        let err = text.parse::<Replay>().unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"), "{:#}", err);
    }

    #[test]
    fn test_playback_stops_at_end() {
        let mut replay: Replay = "(:audio t)\n(:audio nil)\n".parse().unwrap();
        assert!(replay.next_frame().unwrap().audio);
        assert!(!replay.next_frame().unwrap().audio);
        assert!(replay.next_frame().is_none());
        assert_eq!(replay.passes(), 1);

        replay.rewind();
        assert_eq!(replay.position(), 0);
        assert!(replay.next_frame().is_some());
    }

    #[test]
    fn test_playback_loops() {
        let mut replay: Replay = "(:audio t)\n(:audio nil)\n".parse().unwrap();
        replay.set_looping(true);
        let audio: Vec<bool> = (0..5).map(|_| replay.next_frame().unwrap().audio).collect();
        assert_eq!(audio, vec![true, false, true, false, true]);
        assert_eq!(replay.passes(), 2);
    }

    #[test]
    fn test_empty_replay_never_yields() {
        let mut replay = Replay::new(Vec::new());
        replay.set_looping(true);
        assert!(replay.is_empty());
        assert!(replay.next_frame().is_none());
    }

    #[test]
    fn test_format_frame_parses_back() {
        let frame = ReplayFrame {
            handedness: Some("Right".to_string()),
            landmarks: neutral_hand(),
            gaze: Some(Vec2::new(0.25, 0.5)),
            head_position: None,
            head_rotation: Some(Quat::IDENTITY),
            audio: true,
        };
        let parsed = parse_frame(&format_frame(&frame)).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "; two frames").unwrap();
        writeln!(file, "{}", format_frame(&ReplayFrame::default())).unwrap();
        writeln!(file, "(:handedness \"Right\")").unwrap();
        let replay = Replay::load(file.path()).unwrap();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay.frames()[1].handedness.as_deref(), Some("Right"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Replay::load(Path::new("/nonexistent/replay.sexp")).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read replay"));
    }
}
