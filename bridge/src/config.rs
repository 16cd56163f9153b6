//! Bridge configuration.
//!
//! Defaults live on each component's config struct.  A config file is a
//! single plist whose keys override those defaults:
//!
//! ```text
//! (:server "192.168.1.20:8080" :local-port 8081 :frame-rate 30
//!  :smoothing-factor 0.7 :frames-to-activate 2 :send-interval-ms 50)
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use lexpr::Value;
use tracing::{debug, warn};

use crate::hand::classifier::ClassifierConfig;
use crate::hand::interpolator::InterpolatorConfig;
use crate::net::sender::SenderConfig;
use crate::sexp;
use crate::tracking::smoother::MAX_SAMPLE_COUNT;

/// Where packets go and which local port answers come back to.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub server: SocketAddr,
    pub local_port: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            server: SocketAddr::from(([192, 168, 1, 100], 8080)),
            local_port: 8081,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub classifier: ClassifierConfig,
    pub interpolator: InterpolatorConfig,
    pub sender: SenderConfig,
    pub link: LinkConfig,
    /// Replay frames per second.
    pub frame_rate_hz: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            interpolator: InterpolatorConfig::default(),
            sender: SenderConfig::default(),
            link: LinkConfig::default(),
            frame_rate_hz: 30.0,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by the plist in `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Defaults overridden by the plist in `text`.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut config = Self::default();
        // Full-line `;` comments, as in replay files.
        let body: Vec<&str> = text
            .lines()
            .filter(|line| !line.trim_start().starts_with(';'))
            .collect();
        let value = sexp::parse(&body.join("\n"))?;
        config.apply_plist(&value)?;
        Ok(config)
    }

    /// Apply every recognized key of `plist`.  Unknown keys are logged
    /// and skipped; a recognized key with a bad value is an error.
    pub fn apply_plist(&mut self, plist: &Value) -> anyhow::Result<()> {
        if sexp::list_items(plist).is_none() {
            bail!("config must be a plist");
        }

        for (key, value) in sexp::plist_entries(plist) {
            self.apply_entry(key, value)
                .with_context(|| format!("bad value for :{}", key))?;
        }
        Ok(())
    }

    fn apply_entry(&mut self, key: &str, value: &Value) -> anyhow::Result<()> {
        let c = &mut self.classifier;
        let i = &mut self.interpolator;
        let s = &mut self.sender;

        match key {
            // Classifier
            "smoothing-factor" => {
                let f = float(value)?;
                if !(0.0..1.0).contains(&f) {
                    bail!("must be in [0, 1)");
                }
                c.smoothing_factor = f as f32;
            }
            "frames-to-activate" => c.frames_to_activate = uint(value, u32::MAX as u64)? as u32,
            "pinch-factor" => c.pinch_factor = positive(value)?,
            "pointing-length-ratio" => c.pointing_length_ratio = positive(value)?,
            "pointing-min-index-factor" => c.pointing_min_index_factor = positive(value)?,
            "pointing-extension-ratio" => c.pointing_extension_ratio = positive(value)?,
            "pointing-tip-separation-factor" => {
                c.pointing_tip_separation_factor = positive(value)?
            }
            "open-min-length-factor" => c.open_min_length_factor = positive(value)?,
            "open-min-spread-factor" => c.open_min_spread_factor = positive(value)?,
            "neutral-uniformity-max" => c.neutral_uniformity_max = positive(value)?,
            "neutral-min-factor" => c.neutral_min_factor = positive(value)?,
            "neutral-max-factor" => c.neutral_max_factor = positive(value)?,
            "mirror-x" => c.mirror_x = boolean(value)?,

            // Interpolator
            "min-depth" => i.min_depth = positive(value)?,
            "max-depth" => i.max_depth = positive(value)?,
            "min-hand-size" => i.min_hand_size = positive(value)?,
            "max-hand-size" => i.max_hand_size = positive(value)?,
            "only-track-when-pointing" => i.only_track_when_pointing = boolean(value)?,
            "pointer-smoothing" => i.pointer_smoothing = positive(value)?,
            "sticky" => i.sticky = boolean(value)?,
            "use-2d-only" => i.use_2d_only = boolean(value)?,
            "fixed-depth" => i.fixed_depth = positive(value)?,
            "invert-x" => i.invert_x = boolean(value)?,
            "invert-y" => i.invert_y = boolean(value)?,
            "palm-size-multiplier" => i.palm_size_multiplier = positive(value)?,

            // Sender
            "send-interval-ms" => s.send_interval_ms = uint(value, u64::MAX)?,
            "tracking-smoothing" => s.smoothing = boolean(value)?,
            "sample-count" => {
                let n = uint(value, MAX_SAMPLE_COUNT as u64)?;
                if n == 0 {
                    bail!("must be at least 1");
                }
                s.sample_count = n as usize;
            }
            "auto-start" => s.auto_start = boolean(value)?,
            "send-hand" => s.send_hand = boolean(value)?,

            // Link and loop
            "server" => {
                let text = sexp::as_string(value).context("expected a string")?;
                self.link.server = text
                    .parse()
                    .with_context(|| format!("invalid address {:?}", text))?;
            }
            "local-port" => self.link.local_port = uint(value, u16::MAX as u64)? as u16,
            "frame-rate" => {
                let f = float(value)?;
                if f <= 0.0 {
                    bail!("must be positive");
                }
                frame_interval(f)?;
                self.frame_rate_hz = f;
            }

            other => {
                warn!(key = other, "unknown config key ignored");
                return Ok(());
            }
        }
        debug!(key, "config key applied");
        Ok(())
    }

    /// Time between replay frames at `frame_rate_hz`.
    pub fn frame_interval(&self) -> anyhow::Result<Duration> {
        frame_interval(self.frame_rate_hz)
    }

    /// Generate s-expression for the effective configuration.
    pub fn config_sexp(&self) -> String {
        let c = &self.classifier;
        let i = &self.interpolator;
        let s = &self.sender;
        let b = |v: bool| if v { "t" } else { "nil" };
        format!(
            "(:server \"{}\" :local-port {} :frame-rate {} \
             :smoothing-factor {} :frames-to-activate {} :pinch-factor {} :mirror-x {} \
             :sticky {} :only-track-when-pointing {} :use-2d-only {} \
             :send-interval-ms {} :tracking-smoothing {} :sample-count {} :send-hand {})",
            sexp::escape_string(&self.link.server.to_string()),
            self.link.local_port,
            self.frame_rate_hz,
            c.smoothing_factor,
            c.frames_to_activate,
            c.pinch_factor,
            b(c.mirror_x),
            b(i.sticky),
            b(i.only_track_when_pointing),
            b(i.use_2d_only),
            s.send_interval_ms,
            b(s.smoothing),
            s.sample_count,
            b(s.send_hand),
        )
    }
}

fn frame_interval(rate_hz: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .with_context(|| format!("no usable frame interval at {} Hz", rate_hz))
}

fn float(value: &Value) -> anyhow::Result<f64> {
    let f = sexp::as_f64(value).context("expected a number")?;
    if !f.is_finite() {
        bail!("expected a finite number");
    }
    Ok(f)
}

fn positive(value: &Value) -> anyhow::Result<f32> {
    let f = float(value)?;
    if f <= 0.0 {
        bail!("must be positive");
    }
    Ok(f as f32)
}

fn uint(value: &Value, max: u64) -> anyhow::Result<u64> {
    let n = sexp::as_i64(value).context("expected an integer")?;
    if n < 0 || n as u64 > max {
        bail!("must be between 0 and {}", max);
    }
    Ok(n as u64)
}

fn boolean(value: &Value) -> anyhow::Result<bool> {
    sexp::as_bool(value).context("expected t or nil")
}
