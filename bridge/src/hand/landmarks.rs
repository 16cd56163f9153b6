//! Hand landmark model and the small vector math the classifier needs.
//!
//! Models the 21 keypoints produced by common hand-pose detectors
//! (wrist, four joints per finger).  Positions are normalized,
//! hand-local coordinates in roughly [0, 1].

use std::ops::{Add, Mul, Sub};

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks, in detector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

const ALL_LANDMARKS: [HandLandmark; LANDMARK_COUNT] = [
    HandLandmark::Wrist,
    HandLandmark::ThumbCmc,
    HandLandmark::ThumbMcp,
    HandLandmark::ThumbIp,
    HandLandmark::ThumbTip,
    HandLandmark::IndexMcp,
    HandLandmark::IndexPip,
    HandLandmark::IndexDip,
    HandLandmark::IndexTip,
    HandLandmark::MiddleMcp,
    HandLandmark::MiddlePip,
    HandLandmark::MiddleDip,
    HandLandmark::MiddleTip,
    HandLandmark::RingMcp,
    HandLandmark::RingPip,
    HandLandmark::RingDip,
    HandLandmark::RingTip,
    HandLandmark::PinkyMcp,
    HandLandmark::PinkyPip,
    HandLandmark::PinkyDip,
    HandLandmark::PinkyTip,
];

impl HandLandmark {
    /// Array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        ALL_LANDMARKS.get(index).copied()
    }

    /// Kebab-case name used in logs and recordings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }

    /// Parse a kebab-case landmark name.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_LANDMARKS.iter().copied().find(|l| l.as_str() == s)
    }

    /// Fingertip landmarks, thumb first.
    pub fn fingertips() -> [HandLandmark; 5] {
        [
            Self::ThumbTip,
            Self::IndexTip,
            Self::MiddleTip,
            Self::RingTip,
            Self::PinkyTip,
        ]
    }
}

// ── Vectors ────────────────────────────────────────────────

/// 3D point or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const FORWARD: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance between two points.
    pub fn distance(&self, other: Vec3) -> f32 {
        (other - *self).length()
    }

    /// Linear interpolation, `t = 0` yields `self`, `t = 1` yields `other`.
    pub fn lerp(&self, other: Vec3, t: f32) -> Vec3 {
        *self + (other - *self) * t
    }

    pub fn midpoint(&self, other: Vec3) -> Vec3 {
        self.lerp(other, 0.5)
    }

    pub fn cross(&self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Unit vector in the same direction; degenerate vectors become zero.
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len <= 1e-5 {
            Vec3::ZERO
        } else {
            *self * (1.0 / len)
        }
    }

    /// Horizontal flip in normalized image space (`x' = 1 - x`).
    pub fn mirrored_x(&self) -> Vec3 {
        Vec3::new(1.0 - self.x, self.y, self.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// 2D screen-space point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

// ── Quaternion ─────────────────────────────────────────────

/// Rotation quaternion (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn dot(&self, other: Quat) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn normalized(&self) -> Quat {
        let len = self.dot(*self).sqrt();
        if len <= 1e-6 {
            return Quat::IDENTITY;
        }
        Quat::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }

    /// Spherical interpolation along the shortest arc, `t` clamped to [0, 1].
    pub fn slerp(&self, other: Quat, t: f32) -> Quat {
        let t = t.clamp(0.0, 1.0);
        let a = self.normalized();
        let mut b = other.normalized();

        let mut cos_theta = a.dot(b);
        if cos_theta < 0.0 {
            b = Quat::new(-b.x, -b.y, -b.z, -b.w);
            cos_theta = -cos_theta;
        }

        // Nearly parallel: sin(theta) is too small to divide by.
        if cos_theta > 0.9995 {
            return Quat::new(
                a.x + (b.x - a.x) * t,
                a.y + (b.y - a.y) * t,
                a.z + (b.z - a.z) * t,
                a.w + (b.w - a.w) * t,
            )
            .normalized();
        }

        let theta = cos_theta.clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();
        let wa = ((1.0 - t) * theta).sin() / sin_theta;
        let wb = (t * theta).sin() / sin_theta;
        Quat::new(
            a.x * wa + b.x * wb,
            a.y * wa + b.y * wb,
            a.z * wa + b.z * wb,
            a.w * wa + b.w * wb,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
