use super::skeleton::Joint;

/// Spring-damper state for one joint.
///
/// Each joint chases its target with spring acceleration and velocity
/// damping, which gives overshoot and settle instead of a linear snap:
///
/// ```text
/// velocity += stiffness * (target - position) * dt
/// velocity *= damping
/// position += velocity * dt
/// ```
#[derive(Debug, Clone, Copy)]
pub struct JointPhysics {
    pub position: Joint,
    pub velocity: Joint,
    pub target: Joint,
    /// Spring constant; higher follows the target more tightly.
    pub stiffness: f32,
    /// Per-step velocity retention in 0..1; lower bleeds energy faster.
    pub damping: f32,
}

impl JointPhysics {
    pub fn new(at: Joint, stiffness: f32, damping: f32) -> Self {
        Self {
            position: at,
            velocity: Joint::default(),
            target: at,
            stiffness,
            damping,
        }
    }

    pub fn set_target(&mut self, target: Joint) {
        self.target = target;
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.velocity.x += self.stiffness * (self.target.x - self.position.x) * dt;
        self.velocity.y += self.stiffness * (self.target.y - self.position.y) * dt;
        self.velocity.x *= self.damping;
        self.velocity.y *= self.damping;
        self.position.x += self.velocity.x * dt;
        self.position.y += self.velocity.y * dt;
    }

    /// Teleport to a position, killing all motion.
    pub fn snap_to(&mut self, at: Joint) {
        self.position = at;
        self.target = at;
        self.velocity = Joint::default();
    }

    /// Kick the joint without moving its target.
    pub fn impulse(&mut self, dx: f32, dy: f32) {
        self.velocity.x += dx;
        self.velocity.y += dy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn converges_to_target() {
        let mut joint = JointPhysics::new(Joint::new(0.0, 0.0), 40.0, 0.82);
        joint.set_target(Joint::new(10.0, -4.0));
        for _ in 0..600 {
            joint.step(DT);
        }
        assert!((joint.position.x - 10.0).abs() < 0.05);
        assert!((joint.position.y + 4.0).abs() < 0.05);
        assert!(joint.velocity.x.abs() < 0.1);
    }

    #[test]
    fn underdamped_spring_overshoots() {
        let mut joint = JointPhysics::new(Joint::new(0.0, 0.0), 80.0, 0.97);
        joint.set_target(Joint::new(1.0, 0.0));
        let mut max_x = 0.0f32;
        for _ in 0..300 {
            joint.step(DT);
            max_x = max_x.max(joint.position.x);
        }
        assert!(max_x > 1.0, "expected overshoot, peaked at {max_x}");
    }

    #[test]
    fn snap_kills_motion() {
        let mut joint = JointPhysics::new(Joint::new(0.0, 0.0), 40.0, 0.82);
        joint.set_target(Joint::new(5.0, 5.0));
        for _ in 0..10 {
            joint.step(DT);
        }
        joint.snap_to(Joint::new(2.0, 2.0));
        assert_eq!(joint.position, Joint::new(2.0, 2.0));
        assert_eq!(joint.velocity, Joint::default());
        joint.step(DT);
        assert!((joint.position.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn impulse_moves_joint_then_settles_back() {
        let mut joint = JointPhysics::new(Joint::new(0.0, 0.0), 40.0, 0.82);
        joint.impulse(3.0, 0.0);
        joint.step(DT);
        assert!(joint.position.x > 0.0);
        for _ in 0..600 {
            joint.step(DT);
        }
        assert!(joint.position.x.abs() < 0.05);
    }
}
