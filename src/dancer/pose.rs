use serde::{Deserialize, Serialize};

use super::skeleton::{Joint, JointId, JOINT_COUNT};
use crate::error::{Error, Result};

/// Pose categories, ordered by the energy ladder first, reactive and
/// special-move categories after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoseCategory {
    /// Near-silence, barely moving.
    Idle,
    /// Low energy, gentle swaying.
    Calm,
    /// Medium energy, rhythmic movement.
    Groove,
    /// High energy, active dancing.
    Energetic,
    /// Peak energy, jumping and wild shapes.
    Intense,
    /// One-shot reaction to a bass hit.
    BassHit,
    /// One-shot reaction to a treble spike.
    TrebleAccent,
    /// Spinning moves.
    Spin,
    /// Dips and drops.
    Dip,
}

pub const CATEGORY_COUNT: usize = 9;

impl PoseCategory {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Map effective energy to the category ladder. The reactive
    /// categories are never chosen this way; they are entered through
    /// triggers only.
    pub fn for_energy(energy: f32) -> PoseCategory {
        match energy {
            e if e < 0.15 => PoseCategory::Idle,
            e if e < 0.35 => PoseCategory::Calm,
            e if e < 0.6 => PoseCategory::Groove,
            e if e < 0.8 => PoseCategory::Energetic,
            _ => PoseCategory::Intense,
        }
    }
}

/// An immutable pose template: joint offsets in pose space plus the
/// metadata the selector weighs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pose {
    pub name: String,
    pub category: PoseCategory,
    pub joints: [Joint; JOINT_COUNT],
    /// Energy window this pose suits.
    pub energy_min: f32,
    pub energy_max: f32,
    /// How well the pose suits bass-heavy music, 0..1.
    pub bass_affinity: f32,
    /// How well the pose suits treble-heavy music, 0..1.
    pub treble_affinity: f32,
    /// Facing direction in radians; 0 is toward the viewer.
    #[serde(default)]
    pub facing: f32,
    /// How far the body dips down in this pose, 0..1.
    #[serde(default)]
    pub dip: f32,
}

impl Pose {
    fn with_facing(mut self, facing: f32) -> Self {
        self.facing = facing;
        self
    }

    fn with_dip(mut self, dip: f32) -> Self {
        self.dip = dip;
        self
    }
}

/// Read-only pose table with per-category index lists for filtered
/// lookup. Poses are referenced by index everywhere past construction.
#[derive(Debug, Clone)]
pub struct PoseLibrary {
    poses: Vec<Pose>,
    by_category: [Vec<usize>; CATEGORY_COUNT],
}

impl PoseLibrary {
    pub fn from_poses(poses: Vec<Pose>) -> Result<Self> {
        if poses.is_empty() {
            return Err(Error::poses("pose table is empty"));
        }
        for pose in &poses {
            if pose.energy_min > pose.energy_max {
                return Err(Error::poses(format!(
                    "pose '{}' has an inverted energy range",
                    pose.name
                )));
            }
            if pose
                .joints
                .iter()
                .any(|j| !j.x.is_finite() || !j.y.is_finite())
            {
                return Err(Error::poses(format!(
                    "pose '{}' contains non-finite joints",
                    pose.name
                )));
            }
        }

        let mut by_category: [Vec<usize>; CATEGORY_COUNT] = std::array::from_fn(|_| Vec::new());
        for (idx, pose) in poses.iter().enumerate() {
            by_category[pose.category.index()].push(idx);
        }
        Ok(Self { poses, by_category })
    }

    /// Parse a pose table from its JSON form: an array of pose records.
    pub fn from_json(json: &str) -> Result<Self> {
        let poses: Vec<Pose> = serde_json::from_str(json)?;
        Self::from_poses(poses)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn get(&self, index: usize) -> &Pose {
        &self.poses[index]
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// Indices of all poses in one category.
    pub fn category(&self, category: PoseCategory) -> &[usize] {
        &self.by_category[category.index()]
    }

    /// The built-in pose set. Covers every category so a dancer created
    /// without an external table can always find a move.
    pub fn builtin() -> Self {
        Self::from_poses(builtin_poses()).expect("built-in pose table is valid")
    }
}

fn base_joints() -> [Joint; JOINT_COUNT] {
    let mut joints = [Joint::default(); JOINT_COUNT];
    set(&mut joints, JointId::Head, 0.0, -0.85);
    set(&mut joints, JointId::Neck, 0.0, -0.6);
    set(&mut joints, JointId::ShoulderL, -0.25, -0.55);
    set(&mut joints, JointId::ShoulderR, 0.25, -0.55);
    set(&mut joints, JointId::ElbowL, -0.35, -0.3);
    set(&mut joints, JointId::ElbowR, 0.35, -0.3);
    set(&mut joints, JointId::HandL, -0.4, -0.05);
    set(&mut joints, JointId::HandR, 0.4, -0.05);
    set(&mut joints, JointId::HipCenter, 0.0, 0.0);
    set(&mut joints, JointId::HipL, -0.15, 0.02);
    set(&mut joints, JointId::HipR, 0.15, 0.02);
    set(&mut joints, JointId::KneeL, -0.18, 0.45);
    set(&mut joints, JointId::KneeR, 0.18, 0.45);
    set(&mut joints, JointId::FootL, -0.2, 0.9);
    set(&mut joints, JointId::FootR, 0.2, 0.9);
    joints
}

fn set(joints: &mut [Joint; JOINT_COUNT], id: JointId, x: f32, y: f32) {
    joints[id.index()] = Joint::new(x, y);
}

fn pose(
    name: &str,
    category: PoseCategory,
    energy: (f32, f32),
    affinity: (f32, f32),
    adjust: impl FnOnce(&mut [Joint; JOINT_COUNT]),
) -> Pose {
    let mut joints = base_joints();
    adjust(&mut joints);
    Pose {
        name: name.to_string(),
        category,
        joints,
        energy_min: energy.0,
        energy_max: energy.1,
        bass_affinity: affinity.0,
        treble_affinity: affinity.1,
        facing: 0.0,
        dip: 0.0,
    }
}

fn builtin_poses() -> Vec<Pose> {
    use JointId::*;
    use PoseCategory::*;

    vec![
        // ---- Idle ----
        pose("stand", Idle, (0.0, 0.25), (0.0, 0.0), |_| {}),
        pose("rest-hip", Idle, (0.0, 0.25), (0.0, 0.0), |j| {
            set(j, HipCenter, 0.05, 0.0);
            set(j, HipL, -0.1, 0.0);
            set(j, HipR, 0.2, 0.04);
            set(j, KneeR, 0.22, 0.44);
            set(j, FootL, -0.24, 0.9);
            set(j, Head, 0.03, -0.84);
        }),
        pose("slouch", Idle, (0.0, 0.2), (0.0, 0.0), |j| {
            set(j, Head, 0.0, -0.78);
            set(j, Neck, 0.0, -0.56);
            set(j, ShoulderL, -0.23, -0.5);
            set(j, ShoulderR, 0.23, -0.5);
            set(j, HandL, -0.36, 0.0);
            set(j, HandR, 0.36, 0.0);
        }),
        // ---- Calm ----
        pose("sway-left", Calm, (0.1, 0.45), (0.2, 0.1), |j| {
            set(j, Head, -0.08, -0.84);
            set(j, Neck, -0.05, -0.6);
            set(j, HipCenter, -0.06, 0.0);
            set(j, HandL, -0.44, -0.1);
            set(j, HandR, 0.34, -0.02);
        }),
        pose("sway-right", Calm, (0.1, 0.45), (0.2, 0.1), |j| {
            set(j, Head, 0.08, -0.84);
            set(j, Neck, 0.05, -0.6);
            set(j, HipCenter, 0.06, 0.0);
            set(j, HandL, -0.34, -0.02);
            set(j, HandR, 0.44, -0.1);
        }),
        pose("head-nod", Calm, (0.1, 0.4), (0.1, 0.3), |j| {
            set(j, Head, 0.0, -0.8);
            set(j, HandL, -0.3, 0.0);
            set(j, HandR, 0.3, 0.0);
            set(j, ElbowL, -0.32, -0.28);
            set(j, ElbowR, 0.32, -0.28);
        }),
        pose("heel-tap", Calm, (0.15, 0.45), (0.3, 0.2), |j| {
            set(j, FootR, 0.34, 0.84);
            set(j, KneeR, 0.24, 0.42);
            set(j, HandL, -0.42, -0.12);
        }),
        // ---- Groove ----
        pose("step-touch-l", Groove, (0.3, 0.7), (0.5, 0.2), |j| {
            set(j, HipCenter, -0.1, 0.02);
            set(j, FootL, -0.38, 0.88);
            set(j, KneeL, -0.26, 0.44);
            set(j, HandL, -0.5, -0.2);
            set(j, HandR, 0.3, -0.3);
            set(j, Head, -0.06, -0.83);
        }),
        pose("step-touch-r", Groove, (0.3, 0.7), (0.5, 0.2), |j| {
            set(j, HipCenter, 0.1, 0.02);
            set(j, FootR, 0.38, 0.88);
            set(j, KneeR, 0.26, 0.44);
            set(j, HandR, 0.5, -0.2);
            set(j, HandL, -0.3, -0.3);
            set(j, Head, 0.06, -0.83);
        }),
        pose("shoulder-roll", Groove, (0.3, 0.65), (0.2, 0.5), |j| {
            set(j, ShoulderL, -0.27, -0.6);
            set(j, ShoulderR, 0.23, -0.5);
            set(j, ElbowL, -0.4, -0.38);
            set(j, HandL, -0.46, -0.16);
            set(j, Head, -0.03, -0.86);
        }),
        pose("hip-bump", Groove, (0.35, 0.7), (0.8, 0.1), |j| {
            set(j, HipCenter, 0.14, 0.0);
            set(j, HipL, 0.0, 0.0);
            set(j, HipR, 0.3, 0.04);
            set(j, Neck, -0.04, -0.6);
            set(j, Head, -0.08, -0.84);
            set(j, HandL, -0.46, -0.18);
        }),
        pose("finger-point", Groove, (0.35, 0.7), (0.1, 0.8), |j| {
            set(j, ElbowR, 0.38, -0.5);
            set(j, HandR, 0.55, -0.75);
            set(j, HandL, -0.3, 0.05);
            set(j, Head, 0.05, -0.86);
        }),
        // ---- Energetic ----
        pose("arms-up", Energetic, (0.55, 0.9), (0.3, 0.6), |j| {
            set(j, ElbowL, -0.33, -0.72);
            set(j, ElbowR, 0.33, -0.72);
            set(j, HandL, -0.3, -0.98);
            set(j, HandR, 0.3, -0.98);
            set(j, Head, 0.0, -0.87);
        }),
        pose("side-kick", Energetic, (0.55, 0.9), (0.5, 0.3), |j| {
            set(j, FootR, 0.55, 0.6);
            set(j, KneeR, 0.35, 0.35);
            set(j, HipCenter, -0.08, 0.0);
            set(j, HandL, -0.5, -0.3);
            set(j, HandR, 0.4, -0.4);
        }),
        pose("punch-l", Energetic, (0.55, 0.95), (0.6, 0.3), |j| {
            set(j, ElbowL, -0.45, -0.5);
            set(j, HandL, -0.65, -0.55);
            set(j, HandR, 0.3, -0.2);
            set(j, Neck, -0.04, -0.6);
            set(j, HipCenter, -0.05, 0.0);
        }),
        pose("punch-r", Energetic, (0.55, 0.95), (0.6, 0.3), |j| {
            set(j, ElbowR, 0.45, -0.5);
            set(j, HandR, 0.65, -0.55);
            set(j, HandL, -0.3, -0.2);
            set(j, Neck, 0.04, -0.6);
            set(j, HipCenter, 0.05, 0.0);
        }),
        pose("clap-high", Energetic, (0.6, 0.95), (0.2, 0.8), |j| {
            set(j, ElbowL, -0.2, -0.75);
            set(j, ElbowR, 0.2, -0.75);
            set(j, HandL, -0.04, -0.95);
            set(j, HandR, 0.04, -0.95);
        }),
        // ---- Intense ----
        pose("jump-star", Intense, (0.75, 1.0), (0.5, 0.5), |j| {
            set(j, HandL, -0.6, -0.85);
            set(j, HandR, 0.6, -0.85);
            set(j, ElbowL, -0.42, -0.68);
            set(j, ElbowR, 0.42, -0.68);
            set(j, FootL, -0.45, 0.8);
            set(j, FootR, 0.45, 0.8);
            set(j, KneeL, -0.3, 0.4);
            set(j, KneeR, 0.3, 0.4);
            set(j, HipCenter, 0.0, -0.08);
        }),
        pose("air-punch", Intense, (0.75, 1.0), (0.6, 0.4), |j| {
            set(j, ElbowR, 0.3, -0.75);
            set(j, HandR, 0.35, -1.05);
            set(j, HandL, -0.35, -0.1);
            set(j, HipCenter, 0.0, -0.05);
            set(j, Head, 0.04, -0.9);
        }),
        pose("wide-stomp", Intense, (0.75, 1.0), (0.9, 0.1), |j| {
            set(j, FootL, -0.42, 0.9);
            set(j, FootR, 0.42, 0.9);
            set(j, KneeL, -0.34, 0.5);
            set(j, KneeR, 0.34, 0.5);
            set(j, HipCenter, 0.0, 0.08);
            set(j, HandL, -0.55, -0.35);
            set(j, HandR, 0.55, -0.35);
        }),
        pose("full-wave", Intense, (0.75, 1.0), (0.3, 0.7), |j| {
            set(j, HandL, -0.62, -0.7);
            set(j, ElbowL, -0.45, -0.45);
            set(j, HandR, 0.62, -0.3);
            set(j, ElbowR, 0.44, -0.28);
            set(j, Neck, 0.05, -0.6);
            set(j, Head, 0.1, -0.85);
        }),
        // ---- Bass hits ----
        pose("stomp", BassHit, (0.2, 1.0), (1.0, 0.0), |j| {
            set(j, HipCenter, 0.0, 0.1);
            set(j, KneeL, -0.26, 0.52);
            set(j, KneeR, 0.26, 0.52);
            set(j, HandL, -0.45, -0.15);
            set(j, HandR, 0.45, -0.15);
            set(j, Head, 0.0, -0.76);
        })
        .with_dip(0.3),
        pose("drop-low", BassHit, (0.3, 1.0), (1.0, 0.0), |j| {
            set(j, HipCenter, 0.0, 0.2);
            set(j, KneeL, -0.32, 0.58);
            set(j, KneeR, 0.32, 0.58);
            set(j, Neck, 0.0, -0.45);
            set(j, Head, 0.0, -0.68);
            set(j, HandL, -0.4, 0.05);
            set(j, HandR, 0.4, 0.05);
        })
        .with_dip(0.5),
        // ---- Treble accents ----
        pose("hands-flick", TrebleAccent, (0.2, 1.0), (0.0, 1.0), |j| {
            set(j, HandL, -0.55, -0.6);
            set(j, HandR, 0.55, -0.6);
            set(j, ElbowL, -0.4, -0.42);
            set(j, ElbowR, 0.4, -0.42);
        }),
        pose("head-tilt-snap", TrebleAccent, (0.2, 1.0), (0.1, 0.9), |j| {
            set(j, Head, 0.12, -0.82);
            set(j, Neck, 0.05, -0.59);
            set(j, HandR, 0.5, -0.45);
            set(j, ElbowR, 0.38, -0.4);
        }),
        // ---- Spins ----
        pose("spin-prep", Spin, (0.4, 1.0), (0.4, 0.4), |j| {
            set(j, HandL, -0.5, -0.4);
            set(j, HandR, 0.2, -0.2);
            set(j, FootR, 0.1, 0.88);
            set(j, Head, -0.05, -0.85);
        })
        .with_facing(std::f32::consts::FRAC_PI_2),
        pose("spin-free", Spin, (0.5, 1.0), (0.4, 0.4), |j| {
            set(j, HandL, -0.55, -0.5);
            set(j, HandR, 0.55, -0.5);
            set(j, FootR, 0.05, 0.85);
            set(j, KneeR, 0.1, 0.42);
        })
        .with_facing(std::f32::consts::PI),
        // ---- Dips ----
        pose("lunge-dip", Dip, (0.3, 1.0), (0.6, 0.2), |j| {
            set(j, HipCenter, -0.1, 0.15);
            set(j, KneeL, -0.35, 0.55);
            set(j, FootL, -0.3, 0.9);
            set(j, KneeR, 0.15, 0.6);
            set(j, FootR, 0.45, 0.9);
            set(j, Head, -0.1, -0.7);
            set(j, Neck, -0.08, -0.48);
        })
        .with_dip(0.6),
        pose("back-lean-dip", Dip, (0.3, 1.0), (0.4, 0.4), |j| {
            set(j, Head, -0.18, -0.75);
            set(j, Neck, -0.1, -0.55);
            set(j, HipCenter, 0.05, 0.08);
            set(j, HandL, -0.5, -0.55);
            set(j, KneeL, -0.2, 0.5);
        })
        .with_dip(0.4),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_category() {
        let lib = PoseLibrary::builtin();
        let categories = [
            PoseCategory::Idle,
            PoseCategory::Calm,
            PoseCategory::Groove,
            PoseCategory::Energetic,
            PoseCategory::Intense,
            PoseCategory::BassHit,
            PoseCategory::TrebleAccent,
            PoseCategory::Spin,
            PoseCategory::Dip,
        ];
        for category in categories {
            assert!(
                !lib.category(category).is_empty(),
                "no poses in {category:?}"
            );
        }
    }

    #[test]
    fn category_indices_point_back() {
        let lib = PoseLibrary::builtin();
        for category in [PoseCategory::Idle, PoseCategory::Intense] {
            for &idx in lib.category(category) {
                assert_eq!(lib.get(idx).category, category);
            }
        }
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            PoseLibrary::from_poses(Vec::new()),
            Err(Error::PoseLibrary(_))
        ));
    }

    #[test]
    fn inverted_energy_range_is_rejected() {
        let mut bad = builtin_poses();
        bad[0].energy_min = 0.9;
        bad[0].energy_max = 0.1;
        assert!(PoseLibrary::from_poses(bad).is_err());
    }

    #[test]
    fn energy_ladder_boundaries() {
        assert_eq!(PoseCategory::for_energy(0.0), PoseCategory::Idle);
        assert_eq!(PoseCategory::for_energy(0.14), PoseCategory::Idle);
        assert_eq!(PoseCategory::for_energy(0.2), PoseCategory::Calm);
        assert_eq!(PoseCategory::for_energy(0.5), PoseCategory::Groove);
        assert_eq!(PoseCategory::for_energy(0.7), PoseCategory::Energetic);
        assert_eq!(PoseCategory::for_energy(1.0), PoseCategory::Intense);
    }

    #[test]
    fn json_round_trip() {
        let lib = PoseLibrary::builtin();
        let json = serde_json::to_string(lib.poses()).unwrap();
        let reloaded = PoseLibrary::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), lib.len());
        assert_eq!(reloaded.get(0).name, lib.get(0).name);
    }

    #[test]
    fn malformed_json_is_a_library_error() {
        assert!(matches!(
            PoseLibrary::from_json("{not json"),
            Err(Error::PoseLibrary(_))
        ));
    }
}
