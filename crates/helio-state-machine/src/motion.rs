use serde::{Deserialize, Serialize};

/// What a leaf state plays. Sampling and blend weights belong to the pose sampler;
/// the state machine only needs the payload index and the playback length.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionKind {
    Clip,
    BlendTree,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub kind: MotionKind,
    /// Index into the sampler's per-kind clip or blend tree array
    pub payload: u32,
    /// Playback length in seconds
    pub duration: f32,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl Motion {
    pub fn clip(payload: u32, duration: f32) -> Self {
        Self {
            kind: MotionKind::Clip,
            payload,
            duration,
            speed: 1.0,
        }
    }

    pub fn blend_tree(payload: u32, duration: f32) -> Self {
        Self {
            kind: MotionKind::BlendTree,
            payload,
            duration,
            speed: 1.0,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0 && self.speed.is_finite() && self.speed >= 0.0
    }

    /// Normalized progress gained per second of playback
    #[inline]
    pub fn normalized_rate(&self) -> f32 {
        self.speed / self.duration
    }
}

impl Default for Motion {
    fn default() -> Self {
        Self::clip(0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_scales_with_speed() {
        let motion = Motion::clip(3, 2.0).with_speed(0.5);
        assert_eq!(motion.normalized_rate(), 0.25);
        assert!(motion.is_valid());
    }

    #[test]
    fn invalid_motions() {
        assert!(!Motion::blend_tree(0, 0.0).is_valid());
        assert!(!Motion::clip(0, f32::NAN).is_valid());
        assert!(!Motion::clip(0, 1.0).with_speed(f32::INFINITY).is_valid());
        assert!(!Motion::clip(0, 1.0).with_speed(-1.0).is_valid());
        assert!(Motion::clip(0, 1.0).with_speed(0.0).is_valid());
    }
}
