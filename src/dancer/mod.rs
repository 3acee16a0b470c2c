//! Pose-driven skeletal dancer.
//!
//! Turns smoothed band energies into a time-varying humanoid figure:
//! pose selection under energy/affinity constraints, primary/secondary
//! blending, procedural modifiers phase-locked to the beat, and a
//! spring-damper physics pass per joint. Rendering goes through the
//! [`Canvas`] trait; this module never draws pixels itself.

pub mod physics;
pub mod pose;
pub mod rng;
pub mod skeleton;
pub mod style;

pub use physics::JointPhysics;
pub use pose::{Pose, PoseCategory, PoseLibrary};
pub use skeleton::{Bone, Joint, JointId, SkeletonDef, JOINT_COUNT};
pub use style::{MusicStyle, StyleReading};

use std::collections::VecDeque;
use std::f32::consts::TAU;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::control::ControlSnapshot;
use crate::error::{Error, Result};
use rng::XorShift;

/// Braille subcell geometry: each terminal cell is 2 pixels wide and 4
/// pixels tall.
const CELL_PIXELS_W: usize = 2;
const CELL_PIXELS_H: usize = 4;

/// How many recently used poses bias selection away from repeats.
const POSE_HISTORY: usize = 24;

/// Energy history ring for the dancer's own dynamics estimate.
const ENERGY_RING: usize = 32;

/// The five-step energy ladder, in ascending order.
const LADDER: [PoseCategory; 5] = [
    PoseCategory::Idle,
    PoseCategory::Calm,
    PoseCategory::Groove,
    PoseCategory::Energetic,
    PoseCategory::Intense,
];

/// Per-joint response shaping: (stiffness multiplier, damping
/// multiplier). The torso tracks tightly, extremities trail behind for
/// follow-through.
const JOINT_RESPONSE: [(f32, f32); JOINT_COUNT] = [
    (1.2, 0.98),  // head
    (1.25, 0.98), // neck
    (1.1, 1.0),   // shoulder l
    (1.1, 1.0),   // shoulder r
    (0.85, 1.04), // elbow l
    (0.85, 1.04), // elbow r
    (0.7, 1.07),  // hand l
    (0.7, 1.07),  // hand r
    (1.25, 0.98), // hip center
    (1.2, 0.98),  // hip l
    (1.2, 0.98),  // hip r
    (1.0, 1.02),  // knee l
    (1.0, 1.02),  // knee r
    (1.0, 1.0),   // foot l
    (1.0, 1.0),   // foot r
];

/// Drawing surface the dancer renders into. Implemented by the glyph
/// layer outside this crate; tests use a recording stub.
pub trait Canvas {
    fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, thickness: u8);
    fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32);
    fn draw_text(&mut self, text: &str);
}

/// Tunable constants for [`SkeletonDancer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DancerConfig {
    /// Smoothed bass must rise through this to fire a bass reaction.
    pub bass_hit_threshold: f32,
    /// Smoothed treble must rise through this to fire an accent.
    pub treble_hit_threshold: f32,
    /// Overall energy floor for the generic beat reaction.
    pub beat_threshold: f32,
    /// Energy must rise at least this much in one frame for a beat.
    pub beat_rise: f32,
    /// Base spring constant for joint physics.
    pub joint_stiffness: f32,
    /// Base per-step velocity retention for joint physics.
    pub joint_damping: f32,
    /// Per-second exponential decay rate of the manual energy boost.
    pub boost_decay: f32,
    /// Seed for the deterministic variation generator.
    pub seed: u32,
}

impl Default for DancerConfig {
    fn default() -> Self {
        Self {
            bass_hit_threshold: 0.6,
            treble_hit_threshold: 0.5,
            beat_threshold: 0.5,
            beat_rise: 0.2,
            joint_stiffness: 40.0,
            joint_damping: 0.82,
            boost_decay: 1.5,
            seed: 0x0BAD_5EED,
        }
    }
}

/// Cached body bounding box in canvas pixel coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyBounds {
    pub center_x: f32,
    pub center_y: f32,
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

/// Quadratic ease, symmetric in and out.
pub fn ease_in_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Cubic ease, symmetric in and out.
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Band smoothing and derived features the dancer keeps for itself.
///
/// The attack side is fast so single-frame hits still cross the
/// reaction thresholds; the release side is slow for visual weight.
#[derive(Debug, Default)]
struct AudioState {
    bass_smooth: f32,
    mid_smooth: f32,
    treble_smooth: f32,
    energy: f32,
    energy_smooth: f32,
    prev_bass_smooth: f32,
    prev_treble_smooth: f32,
    prev_energy_smooth: f32,
    prev_energy: f32,
    bass_ratio: f32,
    treble_ratio: f32,
    brightness: f32,
    dynamics: f32,
    history: [f32; ENERGY_RING],
    history_idx: usize,
}

impl AudioState {
    fn envelope(current: f32, input: f32, dt: f32) -> f32 {
        let tau = if input > current { 0.012 } else { 0.25 };
        let coef = 1.0 - (-dt / tau).exp();
        current + (input - current) * coef
    }

    fn update(&mut self, bass: f32, mid: f32, treble: f32, dt: f32) {
        self.prev_bass_smooth = self.bass_smooth;
        self.prev_treble_smooth = self.treble_smooth;
        self.prev_energy_smooth = self.energy_smooth;
        self.prev_energy = self.energy;

        self.bass_smooth = Self::envelope(self.bass_smooth, bass, dt);
        self.mid_smooth = Self::envelope(self.mid_smooth, mid, dt);
        self.treble_smooth = Self::envelope(self.treble_smooth, treble, dt);

        self.energy = (bass + mid + treble) / 3.0;
        self.energy_smooth = Self::envelope(self.energy_smooth, self.energy, dt);

        let total = bass + mid + treble;
        if total > 0.01 {
            self.bass_ratio = bass / total;
            self.treble_ratio = treble / total;
            self.brightness = (mid * 0.5 + treble) / total;
        } else {
            self.bass_ratio = 0.33;
            self.treble_ratio = 0.33;
            self.brightness = 0.5;
        }

        self.history[self.history_idx] = self.energy;
        self.history_idx = (self.history_idx + 1) % ENERGY_RING;
        let mean = self.history.iter().sum::<f32>() / ENERGY_RING as f32;
        let variance = self
            .history
            .iter()
            .map(|e| (e - mean) * (e - mean))
            .sum::<f32>()
            / ENERGY_RING as f32;
        self.dynamics = (variance.sqrt() * 3.0).min(1.0);
    }

    fn snapshot(&self, bpm: f32) -> ControlSnapshot {
        ControlSnapshot {
            energy: self.energy_smooth,
            bass: self.bass_smooth,
            mid: self.mid_smooth,
            treble: self.treble_smooth,
            onset: ((self.energy - self.prev_energy).max(0.0) * 2.0).min(1.0),
            bass_ratio: self.bass_ratio,
            treble_ratio: self.treble_ratio,
            brightness: self.brightness,
            dynamics: self.dynamics,
            beat_phase: 0.0,
            beat_hit: 0.0,
            bpm,
            is_silent: self.energy_smooth < 0.02,
        }
    }
}

/// Beat interval tracking for the internal tempo estimate.
struct TempoTracker {
    intervals: Vec<f32>,
    last_beat_time: f32,
    current_time: f32,
    bpm: f32,
}

impl TempoTracker {
    fn new() -> Self {
        Self {
            intervals: Vec::new(),
            last_beat_time: 0.0,
            current_time: 0.0,
            bpm: 120.0,
        }
    }

    fn update(&mut self, beat_detected: bool, dt: f32) {
        self.current_time += dt;
        if !beat_detected {
            return;
        }
        if self.last_beat_time > 0.0 {
            let interval = self.current_time - self.last_beat_time;
            // 30-200 BPM window; anything outside is noise.
            if interval > 0.3 && interval < 2.0 {
                self.intervals.push(interval);
                if self.intervals.len() > 8 {
                    self.intervals.remove(0);
                }
                let avg = self.intervals.iter().sum::<f32>() / self.intervals.len() as f32;
                self.bpm = 60.0 / avg;
            }
        }
        self.last_beat_time = self.current_time;
    }
}

/// The dancer. Exclusively owned by the caller; mutated by exactly one
/// `update` call per frame.
pub struct SkeletonDancer {
    config: DancerConfig,
    library: PoseLibrary,
    skeleton: SkeletonDef,

    current: [Joint; JOINT_COUNT],
    physics: [JointPhysics; JOINT_COUNT],

    pose_primary: usize,
    pose_secondary: usize,
    blend: f32,
    pose_history: VecDeque<usize>,

    phase: f32,
    time_total: f32,
    time_in_pose: f32,
    pose_duration: f32,

    // Continuous modifier scalars, recomputed every frame.
    head_bob: f32,
    arm_swing: f32,
    hip_sway: f32,
    bounce: f32,
    lean: f32,
    shimmer: f32,
    knee_pump: f32,
    twist: f32,

    facing: f32,
    facing_target: f32,
    facing_velocity: f32,
    spin_momentum: f32,
    dip: f32,
    dip_target: f32,

    energy_override: f32,
    energy_boost: f32,
    energy_locked: bool,

    audio: AudioState,
    tempo: TempoTracker,
    style: StyleReading,
    last_external_phase: f32,

    bass_hits: u32,
    treble_hits: u32,
    beats: u32,
    spins: u32,

    pixel_width: f32,
    pixel_height: f32,
    scale: f32,
    offset_x: f32,
    offset_y: f32,
    bounds: BodyBounds,

    rng: XorShift,
}

impl SkeletonDancer {
    /// Create a dancer sized to a canvas of terminal cells, with the
    /// built-in pose set.
    pub fn new(canvas_cells_w: usize, canvas_cells_h: usize) -> Result<Self> {
        Self::with_library(canvas_cells_w, canvas_cells_h, PoseLibrary::builtin())
    }

    /// Create a dancer with an externally supplied pose table.
    pub fn with_library(
        canvas_cells_w: usize,
        canvas_cells_h: usize,
        library: PoseLibrary,
    ) -> Result<Self> {
        if canvas_cells_w == 0 || canvas_cells_h == 0 {
            return Err(Error::config(format!(
                "canvas must be at least 1x1 cell, got {canvas_cells_w}x{canvas_cells_h}"
            )));
        }
        if library.is_empty() {
            return Err(Error::poses("cannot dance with an empty pose table"));
        }

        let config = DancerConfig::default();
        let pixel_width = (canvas_cells_w * CELL_PIXELS_W) as f32;
        let pixel_height = (canvas_cells_h * CELL_PIXELS_H) as f32;
        let scale = (pixel_height / 2.4).min(pixel_width / 1.6);
        let offset_x = pixel_width / 2.0;
        let offset_y = pixel_height * 0.47;

        let start = library
            .category(PoseCategory::Idle)
            .first()
            .copied()
            .unwrap_or(0);

        let mut dancer = Self {
            skeleton: SkeletonDef::humanoid(),
            current: [Joint::default(); JOINT_COUNT],
            physics: [JointPhysics::new(
                Joint::default(),
                config.joint_stiffness,
                config.joint_damping,
            ); JOINT_COUNT],
            pose_primary: start,
            pose_secondary: start,
            blend: 0.0,
            pose_history: VecDeque::with_capacity(POSE_HISTORY),
            phase: 0.0,
            time_total: 0.0,
            time_in_pose: 0.0,
            pose_duration: 2.4,
            head_bob: 0.0,
            arm_swing: 0.0,
            hip_sway: 0.0,
            bounce: 0.0,
            lean: 0.0,
            shimmer: 0.0,
            knee_pump: 0.0,
            twist: 0.0,
            facing: 0.0,
            facing_target: 0.0,
            facing_velocity: 0.0,
            spin_momentum: 0.0,
            dip: 0.0,
            dip_target: 0.0,
            energy_override: 0.0,
            energy_boost: 0.0,
            energy_locked: false,
            audio: AudioState::default(),
            tempo: TempoTracker::new(),
            style: StyleReading {
                style: MusicStyle::Unknown,
                confidence: 0.0,
            },
            last_external_phase: 0.0,
            bass_hits: 0,
            treble_hits: 0,
            beats: 0,
            spins: 0,
            pixel_width,
            pixel_height,
            scale,
            offset_x,
            offset_y,
            bounds: BodyBounds::default(),
            rng: XorShift::new(config.seed),
            library,
            config,
        };

        for (i, (stiffness_mul, damping_mul)) in JOINT_RESPONSE.iter().enumerate() {
            dancer.physics[i].stiffness = dancer.config.joint_stiffness * stiffness_mul;
            dancer.physics[i].damping = (dancer.config.joint_damping * damping_mul).min(0.95);
        }

        // Settle the rig on its starting pose so the first frame
        // doesn't fling joints in from the origin.
        let start_joints = dancer.library.get(start).joints;
        for (i, joint) in start_joints.iter().enumerate() {
            let at = dancer.to_canvas(*joint, 1.0);
            dancer.physics[i].snap_to(at);
            dancer.current[i] = at;
        }
        dancer.update_bounds();

        debug!(
            "dancer ready: {} poses, canvas {}x{} cells",
            dancer.library.len(),
            canvas_cells_w,
            canvas_cells_h
        );
        Ok(dancer)
    }

    /// Advance the animation using the dancer's own beat tracking.
    pub fn update(&mut self, bass: f32, mid: f32, treble: f32, dt: f32) {
        self.advance(bass, mid, treble, dt, None);
    }

    /// Advance the animation with beat phase and tempo from an external
    /// tracker (e.g. the control bus).
    pub fn update_with_phase(
        &mut self,
        bass: f32,
        mid: f32,
        treble: f32,
        dt: f32,
        beat_phase: f32,
        bpm: f32,
    ) {
        self.advance(bass, mid, treble, dt, Some((beat_phase, bpm)));
    }

    fn advance(&mut self, bass: f32, mid: f32, treble: f32, dt: f32, external: Option<(f32, f32)>) {
        if !(dt > 0.0 && dt.is_finite()) || self.library.is_empty() {
            return;
        }

        let bass = bass.clamp(0.0, 1.0);
        let mid = mid.clamp(0.0, 1.0);
        let treble = treble.clamp(0.0, 1.0);

        self.time_total += dt;
        self.audio.update(bass, mid, treble, dt);

        // External tempo wins over the internal estimate.
        let mut external_beat = false;
        if let Some((beat_phase, bpm)) = external {
            if bpm > 30.0 && bpm < 300.0 {
                self.tempo.bpm = bpm;
            }
            // The phase wrapping back around marks the downbeat.
            external_beat = beat_phase < self.last_external_phase - 0.5;
            self.last_external_phase = beat_phase;
        }

        self.decay_boost(dt);
        let effective = self.effective_energy();

        self.update_style();
        self.detect_reactions(external_beat, dt, effective);
        self.advance_pose_cycle(effective, dt);
        self.update_modifiers(dt);
        self.update_facing(dt);
        self.update_dip(dt);
        self.drive_physics(dt);
        self.update_bounds();
    }

    /// Draw the current frame. A dancer with no poses writes a
    /// placeholder instead of geometry.
    pub fn render<C: Canvas>(&self, canvas: &mut C) {
        if self.library.is_empty() {
            canvas.draw_text("no dancer loaded");
            return;
        }

        for bone in &self.skeleton.bones {
            let from = self.current[bone.from.index()];
            let to = self.current[bone.to.index()];
            if bone.curve != 0.0 {
                // Bow through a midpoint offset perpendicular to the bone.
                let mx = (from.x + to.x) / 2.0;
                let my = (from.y + to.y) / 2.0;
                let dx = to.x - from.x;
                let dy = to.y - from.y;
                let len = (dx * dx + dy * dy).sqrt().max(1e-6);
                let ox = -dy / len * bone.curve * len;
                let oy = dx / len * bone.curve * len;
                canvas.draw_line(from.x, from.y, mx + ox, my + oy, bone.thickness);
                canvas.draw_line(mx + ox, my + oy, to.x, to.y, bone.thickness);
            } else {
                canvas.draw_line(from.x, from.y, to.x, to.y, bone.thickness);
            }
        }

        let head = self.current[JointId::Head.index()];
        canvas.draw_circle(head.x, head.y, self.skeleton.head_radius * self.scale);
    }

    // ---- energy override ----

    /// Nudge the manual energy offset; positive nudges also leave a
    /// decaying boost so the kick is visible immediately.
    pub fn adjust_energy(&mut self, amount: f32) {
        self.energy_override = (self.energy_override + amount).clamp(-1.0, 1.0);
        if amount > 0.0 {
            self.energy_boost = (self.energy_boost + amount * 0.5).min(1.0);
        }
    }

    /// Toggle ignoring audio energy entirely. Returns the new state.
    pub fn toggle_energy_lock(&mut self) -> bool {
        self.energy_locked = !self.energy_locked;
        self.energy_locked
    }

    /// The energy the pose machine actually sees. Lock beats boost,
    /// boost beats raw audio.
    pub fn effective_energy(&self) -> f32 {
        if self.energy_locked {
            (0.5 + 0.5 * self.energy_override).clamp(0.0, 1.0)
        } else {
            (self.audio.energy_smooth + self.energy_override + self.energy_boost).clamp(0.0, 1.0)
        }
    }

    pub fn is_energy_locked(&self) -> bool {
        self.energy_locked
    }

    pub fn energy_override(&self) -> f32 {
        self.energy_override
    }

    /// Queue a spin: several full turns in the given direction, eased
    /// in by the facing spring rather than snapped.
    pub fn trigger_spin(&mut self, direction: i32) {
        if direction == 0 {
            return;
        }
        let sign = if direction > 0 { 1.0 } else { -1.0 };
        let turns = 2.0 + self.rng.next_f32() * 2.0;
        self.facing_target += sign * turns * TAU;
        self.spin_momentum += sign * 6.0;
        self.spins += 1;
    }

    // ---- accessors ----

    pub fn joints(&self) -> &[Joint; JOINT_COUNT] {
        &self.current
    }

    pub fn bones(&self) -> &[Bone] {
        &self.skeleton.bones
    }

    pub fn primary_pose(&self) -> &Pose {
        self.library.get(self.pose_primary)
    }

    pub fn secondary_pose(&self) -> &Pose {
        self.library.get(self.pose_secondary)
    }

    pub fn blend(&self) -> f32 {
        self.blend
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn facing(&self) -> f32 {
        self.facing
    }

    pub fn time(&self) -> f32 {
        self.time_total
    }

    /// Body bounding box in canvas pixels.
    pub fn bounds(&self) -> BodyBounds {
        self.bounds
    }

    /// Body bounding box normalized to 0..1 of the canvas.
    pub fn bounds_normalized(&self) -> BodyBounds {
        BodyBounds {
            center_x: self.bounds.center_x / self.pixel_width,
            center_y: self.bounds.center_y / self.pixel_height,
            top: self.bounds.top / self.pixel_height,
            bottom: self.bounds.bottom / self.pixel_height,
            left: self.bounds.left / self.pixel_width,
            right: self.bounds.right / self.pixel_width,
        }
    }

    pub fn style(&self) -> StyleReading {
        self.style
    }

    pub fn bass_hit_count(&self) -> u32 {
        self.bass_hits
    }

    pub fn treble_hit_count(&self) -> u32 {
        self.treble_hits
    }

    pub fn beat_count(&self) -> u32 {
        self.beats
    }

    pub fn spin_count(&self) -> u32 {
        self.spins
    }

    pub fn bpm(&self) -> f32 {
        self.tempo.bpm
    }

    pub fn library(&self) -> &PoseLibrary {
        &self.library
    }

    pub fn config(&self) -> &DancerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DancerConfig {
        &mut self.config
    }

    // ---- internals ----

    fn decay_boost(&mut self, dt: f32) {
        self.energy_boost *= (-self.config.boost_decay * dt).exp();
        if self.energy_boost < 1e-3 {
            self.energy_boost = 0.0;
        }
    }

    fn update_style(&mut self) {
        let reading = style::classify(&self.audio.snapshot(self.tempo.bpm));
        if reading.style == self.style.style {
            self.style.confidence = self.style.confidence.max(reading.confidence);
        } else if reading.confidence > self.style.confidence + 0.1 {
            self.style = reading;
        } else {
            // Hold the old guess but let it fade.
            self.style.confidence = (self.style.confidence - 0.002).max(0.0);
        }
    }

    /// Rising-edge reactions. Comparing previous and current smoothed
    /// values keeps a sustained loud band from re-firing every frame.
    fn detect_reactions(&mut self, external_beat: bool, dt: f32, effective: f32) {
        let bass_edge = self.audio.prev_bass_smooth < self.config.bass_hit_threshold
            && self.audio.bass_smooth >= self.config.bass_hit_threshold;
        let treble_edge = self.audio.prev_treble_smooth < self.config.treble_hit_threshold
            && self.audio.treble_smooth >= self.config.treble_hit_threshold;
        let energy_edge = self.audio.energy_smooth - self.audio.prev_energy_smooth
            > self.config.beat_rise
            && self.audio.energy_smooth > self.config.beat_threshold;

        let beat = external_beat || energy_edge;
        self.tempo.update(beat, dt);

        if beat {
            self.beats += 1;
            // Whole-body dip-and-recover kick.
            self.physics[JointId::HipCenter.index()].impulse(0.0, self.scale * 0.6);
            self.physics[JointId::Head.index()].impulse(0.0, self.scale * 0.4);
        }

        if bass_edge {
            self.bass_hits += 1;
            if self.rng.next_f32() < 0.35 && effective > 0.4 {
                let direction = if self.rng.next_f32() < 0.5 { 1 } else { -1 };
                self.trigger_spin(direction);
            } else {
                self.force_reaction(PoseCategory::BassHit);
                self.dip_target = (self.dip_target + 0.4).min(1.0);
            }
        }

        if treble_edge {
            self.treble_hits += 1;
            if self.rng.next_f32() < 0.6 {
                self.force_reaction(PoseCategory::TrebleAccent);
            }
            // Arms flick a little on every accent.
            self.physics[JointId::HandL.index()].impulse(-self.scale * 0.5, -self.scale * 0.5);
            self.physics[JointId::HandR.index()].impulse(self.scale * 0.5, -self.scale * 0.5);
        }
    }

    /// Cut to a reaction pose outside the normal cycle.
    fn force_reaction(&mut self, category: PoseCategory) {
        if self.library.category(category).is_empty() {
            return;
        }
        // Whatever currently dominates becomes the blend origin.
        if self.blend > 0.5 {
            self.pose_primary = self.pose_secondary;
        }
        let pick = self.weighted_pick(category);
        self.pose_secondary = pick;
        self.remember_pose(pick);
        self.blend = 0.0;
        self.time_in_pose = 0.0;
        self.pose_duration = 0.45 + self.rng.next_f32() * 0.25;
    }

    fn advance_pose_cycle(&mut self, effective: f32, dt: f32) {
        self.time_in_pose += dt;
        self.blend = (self.time_in_pose / self.pose_duration).min(1.0);
        if self.blend < 1.0 {
            return;
        }

        self.pose_primary = self.pose_secondary;
        let category = self.choose_category(effective);
        let pick = self.weighted_pick(category);
        self.pose_secondary = pick;
        self.remember_pose(pick);

        // Spin poses feed the facing system instead of snapping it.
        let pose = self.library.get(pick);
        if pose.category == PoseCategory::Spin && pose.facing != 0.0 {
            let sign = if self.rng.next_f32() < 0.5 { 1.0 } else { -1.0 };
            self.facing_target += sign * pose.facing;
        }

        self.blend = 0.0;
        self.time_in_pose = 0.0;
        // Faster cuts as the music heats up.
        let base = 2.4 - 1.7 * effective;
        self.pose_duration = base * self.rng.range(0.85, 1.15);
    }

    /// Pick the pose category for the current energy, with soft style
    /// bias toward a neighboring ladder step. The ladder only ever
    /// moves one step from the threshold category, so extremes stay
    /// honest: zero energy cannot reach Intense, full cannot reach Idle.
    fn choose_category(&mut self, effective: f32) -> PoseCategory {
        let base = PoseCategory::for_energy(effective);
        let base_idx = LADDER.iter().position(|c| *c == base).unwrap_or(0);

        let mut candidates: Vec<(PoseCategory, f32)> = Vec::with_capacity(3);
        candidates.push((base, 1.0));
        if base_idx > 0 {
            candidates.push((LADDER[base_idx - 1], 0.25));
        }
        if base_idx + 1 < LADDER.len() {
            candidates.push((LADDER[base_idx + 1], 0.25));
        }

        let mut total = 0.0;
        for (category, weight) in candidates.iter_mut() {
            *weight *= style::category_bias(self.style.style, *category);
            if self.library.category(*category).is_empty() {
                *weight = 0.0;
            }
            total += *weight;
        }
        if total <= 0.0 {
            // Sparse external table: fall back to any populated step.
            for category in LADDER {
                if !self.library.category(category).is_empty() {
                    return category;
                }
            }
            return base;
        }

        let mut roll = self.rng.next_f32() * total;
        for (category, weight) in &candidates {
            if roll < *weight {
                return *category;
            }
            roll -= weight;
        }
        base
    }

    /// Affinity-weighted random pick inside a category. Recently used
    /// poses are penalized, never excluded.
    fn weighted_pick(&mut self, category: PoseCategory) -> usize {
        let candidates: Vec<usize> = if self.library.category(category).is_empty() {
            (0..self.library.len()).collect()
        } else {
            self.library.category(category).to_vec()
        };
        let effective = self.effective_energy();

        let mut weights = Vec::with_capacity(candidates.len());
        let mut total = 0.0;
        for &idx in &candidates {
            let pose = self.library.get(idx);
            let mut weight = 0.2
                + pose.bass_affinity * self.audio.bass_ratio
                + pose.treble_affinity * self.audio.treble_ratio;
            if effective < pose.energy_min || effective > pose.energy_max {
                weight *= 0.35;
            }
            if self.pose_history.contains(&idx) {
                weight *= 0.25;
            }
            if idx == self.pose_secondary {
                weight *= 0.5;
            }
            total += weight;
            weights.push(weight);
        }

        let mut roll = self.rng.next_f32() * total;
        for (&idx, &weight) in candidates.iter().zip(&weights) {
            if roll < weight {
                return idx;
            }
            roll -= weight;
        }
        *candidates.last().expect("candidate list is never empty")
    }

    fn remember_pose(&mut self, idx: usize) {
        self.pose_history.push_back(idx);
        if self.pose_history.len() > POSE_HISTORY {
            self.pose_history.pop_front();
        }
    }

    fn update_modifiers(&mut self, dt: f32) {
        let beats_per_second = (self.tempo.bpm / 60.0).clamp(0.5, 4.0);
        self.phase += dt * beats_per_second;
        if self.phase > 64.0 {
            self.phase -= 64.0;
        }

        let p = self.phase * TAU;
        let audio = &self.audio;
        self.bounce = p.sin() * audio.bass_smooth;
        self.knee_pump = p.sin() * audio.bass_smooth;
        self.hip_sway = (p * 0.5).sin() * audio.mid_smooth;
        self.lean = (p * 0.25).sin() * audio.mid_smooth * 0.6;
        self.shimmer = (p * 8.0).sin() * audio.treble_smooth;
        self.arm_swing = (p + 1.0).sin() * (0.25 + audio.treble_smooth * 0.75);
        self.head_bob = (p * 2.0).sin() * audio.energy_smooth;
        self.twist = (p * 0.25).sin() * audio.dynamics;
    }

    fn update_facing(&mut self, dt: f32) {
        let delta = self.facing_target - self.facing;
        self.facing_velocity += delta * 12.0 * dt;
        self.facing_velocity += self.spin_momentum * dt;
        self.facing_velocity *= 0.9;
        self.facing += self.facing_velocity * dt;
        self.spin_momentum *= (-1.8 * dt).exp();

        if delta.abs() < 0.01 && self.facing_velocity.abs() < 0.01 && self.spin_momentum.abs() < 0.01
        {
            self.facing = self.facing_target;
            self.facing_velocity = 0.0;
        }
    }

    fn update_dip(&mut self, dt: f32) {
        let t = ease_in_out_quad(self.blend);
        let primary_dip = self.library.get(self.pose_primary).dip;
        let secondary_dip = self.library.get(self.pose_secondary).dip;
        let pose_dip = primary_dip + (secondary_dip - primary_dip) * t;

        let target = pose_dip.max(self.dip_target);
        let coef = 1.0 - (-dt * 8.0).exp();
        self.dip += (target - self.dip) * coef;
        // Reaction dips fade on their own; the pose part persists.
        self.dip_target *= (-dt * 2.5).exp();
    }

    fn drive_physics(&mut self, dt: f32) {
        let t = ease_in_out_cubic(self.blend);
        let primary = self.library.get(self.pose_primary).joints;
        let secondary = self.library.get(self.pose_secondary).joints;
        let xscale = facing_xscale(self.facing);

        for i in 0..JOINT_COUNT {
            let blended = Joint::lerp(primary[i], secondary[i], t);
            let modified = self.apply_modifiers(JointId::ALL[i], blended);
            let target = self.to_canvas(modified, xscale);
            self.physics[i].set_target(target);
            self.physics[i].step(dt);
            self.current[i] = self.physics[i].position;
        }
    }

    /// Add the continuous modifier offsets to one joint, in pose space.
    fn apply_modifiers(&self, id: JointId, joint: Joint) -> Joint {
        use JointId::*;
        let mut p = joint;

        // Whole-body: dip crouches everything but the feet, bounce
        // lifts the lot on the beat.
        p.y += match id {
            FootL | FootR => 0.0,
            KneeL | KneeR => self.dip * 0.12,
            _ => self.dip * 0.22,
        };
        p.y -= self.bounce * 0.05;

        match id {
            Head => {
                p.y += self.head_bob * 0.045;
                p.x += self.lean * 0.1 + self.twist * 0.06;
            }
            Neck => {
                p.x += self.lean * 0.07 + self.twist * 0.04;
            }
            ShoulderL => {
                p.y += self.shimmer * 0.025;
                p.x += self.twist * 0.05;
            }
            ShoulderR => {
                p.y -= self.shimmer * 0.025;
                p.x += self.twist * 0.05;
            }
            ElbowL => p.x -= self.arm_swing * 0.05,
            ElbowR => p.x += self.arm_swing * 0.05,
            HandL => {
                p.x -= self.arm_swing * 0.08;
                p.y += self.shimmer * 0.05;
            }
            HandR => {
                p.x += self.arm_swing * 0.08;
                p.y -= self.shimmer * 0.05;
            }
            HipCenter | HipL | HipR => p.x += self.hip_sway * 0.09,
            KneeL => p.y -= self.knee_pump.max(0.0) * 0.09,
            KneeR => p.y -= (-self.knee_pump).max(0.0) * 0.09,
            FootL | FootR => {}
        }
        p
    }

    fn to_canvas(&self, joint: Joint, xscale: f32) -> Joint {
        Joint::new(
            self.offset_x + joint.x * xscale * self.scale,
            self.offset_y + joint.y * self.scale,
        )
    }

    fn update_bounds(&mut self) {
        let head_radius = self.skeleton.head_radius * self.scale;
        let mut left = f32::MAX;
        let mut right = f32::MIN;
        let mut top = f32::MAX;
        let mut bottom = f32::MIN;
        for (i, joint) in self.current.iter().enumerate() {
            let pad = if i == JointId::Head.index() {
                head_radius
            } else {
                0.0
            };
            left = left.min(joint.x - pad);
            right = right.max(joint.x + pad);
            top = top.min(joint.y - pad);
            bottom = bottom.max(joint.y + pad);
        }
        self.bounds = BodyBounds {
            center_x: (left + right) / 2.0,
            center_y: (top + bottom) / 2.0,
            top,
            bottom,
            left,
            right,
        };
    }
}

/// Fold the facing angle into a horizontal scale: the figure narrows
/// as it turns and mirrors past the side-on point, which keeps joints
/// continuous through a full rotation.
fn facing_xscale(facing: f32) -> f32 {
    let c = facing.cos();
    if c.abs() < 0.25 {
        if c < 0.0 {
            -0.25
        } else {
            0.25
        }
    } else {
        c
    }
}
