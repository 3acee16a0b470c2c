use serde::{Deserialize, Serialize};

/// Named joints of the humanoid skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointId {
    Head,
    Neck,
    ShoulderL,
    ShoulderR,
    ElbowL,
    ElbowR,
    HandL,
    HandR,
    HipCenter,
    HipL,
    HipR,
    KneeL,
    KneeR,
    FootL,
    FootR,
}

pub const JOINT_COUNT: usize = 15;

impl JointId {
    pub const ALL: [JointId; JOINT_COUNT] = [
        JointId::Head,
        JointId::Neck,
        JointId::ShoulderL,
        JointId::ShoulderR,
        JointId::ElbowL,
        JointId::ElbowR,
        JointId::HandL,
        JointId::HandR,
        JointId::HipCenter,
        JointId::HipL,
        JointId::HipR,
        JointId::KneeL,
        JointId::KneeR,
        JointId::FootL,
        JointId::FootR,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A 2D joint position. Pose space is centered on the hip with x right
/// and y down, roughly -1..1 in both axes; rendered space is canvas
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joint {
    pub x: f32,
    pub y: f32,
}

impl Joint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(a: Joint, b: Joint, t: f32) -> Joint {
        Joint {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }
}

/// A bone connecting two joints, with drawing hints for the renderer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bone {
    pub from: JointId,
    pub to: JointId,
    /// Stroke thickness in canvas pixels.
    pub thickness: u8,
    /// Lateral bow applied by the renderer; 0.0 draws a straight line.
    pub curve: f32,
}

impl Bone {
    fn new(from: JointId, to: JointId, thickness: u8, curve: f32) -> Self {
        Self {
            from,
            to,
            thickness,
            curve,
        }
    }
}

/// Bone topology plus head geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDef {
    pub bones: Vec<Bone>,
    /// Head radius as a fraction of the dancer's pose-space height.
    pub head_radius: f32,
}

impl SkeletonDef {
    /// The standard humanoid rig: spine, shoulder girdle, arms with
    /// elbows, pelvis, and legs with knees.
    pub fn humanoid() -> Self {
        use JointId::*;
        Self {
            bones: vec![
                Bone::new(Head, Neck, 2, 0.0),
                Bone::new(Neck, HipCenter, 2, 0.0),
                Bone::new(Neck, ShoulderL, 2, 0.0),
                Bone::new(Neck, ShoulderR, 2, 0.0),
                Bone::new(ShoulderL, ElbowL, 1, 0.12),
                Bone::new(ElbowL, HandL, 1, 0.1),
                Bone::new(ShoulderR, ElbowR, 1, 0.12),
                Bone::new(ElbowR, HandR, 1, 0.1),
                Bone::new(HipCenter, HipL, 2, 0.0),
                Bone::new(HipCenter, HipR, 2, 0.0),
                Bone::new(HipL, KneeL, 1, 0.1),
                Bone::new(KneeL, FootL, 1, 0.08),
                Bone::new(HipR, KneeR, 1, 0.1),
                Bone::new(KneeR, FootR, 1, 0.08),
            ],
            head_radius: 0.1,
        }
    }
}
