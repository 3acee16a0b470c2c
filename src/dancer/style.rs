//! Coarse music-style detection.
//!
//! Threshold classifiers over one frame of smoothed control signals.
//! The result only ever biases pose weighting; it never gates a
//! category outright, so a wrong guess costs nothing but flavor.

use serde::{Deserialize, Serialize};

use super::pose::PoseCategory;
use crate::control::ControlSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicStyle {
    Unknown,
    /// Heavy, steady bass.
    Electronic,
    /// Balanced spectrum with driving dynamics.
    Rock,
    /// Strong bass with swinging dynamics.
    HipHop,
    /// Low energy, flowing.
    Ambient,
    /// Wide dynamic range and bright harmonic content.
    Classical,
    /// Mid-tempo, bright, moderate dynamics.
    Pop,
}

/// A classification plus how sure the classifier is, 0..1.
#[derive(Debug, Clone, Copy)]
pub struct StyleReading {
    pub style: MusicStyle,
    pub confidence: f32,
}

/// Classify one frame's smoothed signals.
pub fn classify(snapshot: &ControlSnapshot) -> StyleReading {
    if snapshot.is_silent || snapshot.energy < 0.03 {
        return StyleReading {
            style: MusicStyle::Unknown,
            confidence: 0.0,
        };
    }

    if snapshot.energy < 0.18 && snapshot.dynamics < 0.25 {
        return StyleReading {
            style: MusicStyle::Ambient,
            confidence: 0.4 + (0.18 - snapshot.energy),
        };
    }

    if snapshot.bass_ratio > 0.5 {
        // Bass-dominant: steady pulse reads electronic, swung and
        // punchy reads hip-hop.
        if snapshot.dynamics < 0.35 {
            return StyleReading {
                style: MusicStyle::Electronic,
                confidence: (snapshot.bass_ratio - 0.5) * 2.0 + 0.3,
            };
        }
        return StyleReading {
            style: MusicStyle::HipHop,
            confidence: (snapshot.dynamics - 0.35) + 0.35,
        };
    }

    if snapshot.dynamics > 0.5 {
        if snapshot.brightness > 0.65 {
            return StyleReading {
                style: MusicStyle::Classical,
                confidence: (snapshot.brightness - 0.65) * 2.0 + 0.3,
            };
        }
        return StyleReading {
            style: MusicStyle::Rock,
            confidence: (snapshot.dynamics - 0.5) * 2.0 + 0.3,
        };
    }

    if snapshot.brightness > 0.45 && snapshot.energy > 0.25 {
        return StyleReading {
            style: MusicStyle::Pop,
            confidence: 0.3,
        };
    }

    StyleReading {
        style: MusicStyle::Unknown,
        confidence: 0.0,
    }
}

/// Multiplier a style contributes to a category's pose weights.
/// Soft by construction: bounded well away from zero.
pub fn category_bias(style: MusicStyle, category: PoseCategory) -> f32 {
    use MusicStyle::*;
    use PoseCategory::*;
    match (style, category) {
        (Electronic, Groove) | (Electronic, BassHit) => 1.4,
        (Electronic, Calm) => 1.1,
        (Rock, Energetic) | (Rock, Intense) => 1.4,
        (Rock, TrebleAccent) => 1.2,
        (HipHop, Groove) | (HipHop, BassHit) | (HipHop, Dip) => 1.35,
        (Ambient, Idle) | (Ambient, Calm) => 1.4,
        (Ambient, Intense) => 0.8,
        (Classical, Calm) | (Classical, Spin) => 1.3,
        (Pop, Groove) | (Pop, Energetic) => 1.25,
        _ => 1.0,
    }
}
