//! Unified audio-driven control signals.
//!
//! Converts raw bass/mid/treble energies into smoothed, beat-aware
//! control values in 0..1. Every signal runs through an attack/release
//! envelope: a fast attack coefficient when the input rises, a slower
//! release when it falls, so animation reacts to hits immediately but
//! decays smoothly.

use serde::{Deserialize, Serialize};

/// Size of the energy history ring used for the dynamics estimate.
const ENERGY_HISTORY: usize = 64;

/// Envelope coefficient for a time constant in milliseconds at a given
/// update rate. One-pole filter; zero or negative time is passthrough.
fn time_to_coef(time_ms: f32, fps: f32) -> f32 {
    if time_ms <= 0.0 {
        return 1.0;
    }
    let samples = (time_ms / 1000.0) * fps;
    1.0 - (-1.0 / samples).exp()
}

/// A single control signal with attack/release smoothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothedValue {
    /// Unsmoothed input from the current frame.
    pub raw: f32,
    /// Output after the envelope, clamped to 0..1.
    pub smoothed: f32,
    /// Recent peak, decaying slowly.
    pub peak: f32,
    /// Input minus smoothed output; positive while rising.
    pub velocity: f32,
    attack_coef: f32,
    release_coef: f32,
    peak_decay: f32,
}

impl SmoothedValue {
    fn with_times(attack_ms: f32, release_ms: f32, fps: f32) -> Self {
        Self {
            attack_coef: time_to_coef(attack_ms, fps),
            release_coef: time_to_coef(release_ms, fps),
            peak_decay: 0.995,
            ..Self::default()
        }
    }

    fn set_times(&mut self, attack_ms: f32, release_ms: f32, fps: f32) {
        self.attack_coef = time_to_coef(attack_ms, fps);
        self.release_coef = time_to_coef(release_ms, fps);
    }

    fn set_instant(&mut self) {
        self.attack_coef = 1.0;
        self.release_coef = 1.0;
    }

    fn update(&mut self, input: f32) {
        self.raw = input;
        self.velocity = input - self.smoothed;

        let coef = if input > self.smoothed {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.smoothed += coef * (input - self.smoothed);

        if input > self.peak {
            self.peak = input;
        } else {
            self.peak *= self.peak_decay;
        }

        self.smoothed = self.smoothed.clamp(0.0, 1.0);
    }

    fn reset(&mut self) {
        self.raw = 0.0;
        self.smoothed = 0.0;
        self.peak = 0.0;
        self.velocity = 0.0;
    }
}

/// Beat tracking state fed by an external tempo source.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatState {
    /// Position in the beat cycle, 0..1.
    pub phase: f32,
    /// Impulse set to 1.0 on each detected beat, decaying geometrically.
    pub hit: f32,
    /// Current BPM estimate.
    pub bpm: f32,
    /// Bus time of the last detected beat.
    pub last_beat: f32,
    /// True when the phase is near the beat.
    pub on_beat: bool,
    /// True when the phase is near the half beat.
    pub on_half_beat: bool,
    /// Total beats seen.
    pub beat_count: u32,
}

/// Smoothing presets selecting attack/release time constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmoothingPreset {
    /// Snappy response for the dancer itself.
    Fast,
    /// Default balance.
    Medium,
    /// Slow drift for backdrop elements.
    Slow,
    /// No smoothing at all.
    Instant,
}

/// Which signal a per-signal envelope override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Energy,
    Bass,
    Mid,
    Treble,
    Onset,
}

/// Tunable constants for [`ControlBus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlBusConfig {
    /// Smoothed energy below this counts toward the silence timer.
    pub silence_threshold: f32,
    /// Seconds below the threshold before `is_silent` flips on.
    pub silence_debounce: f32,
    /// Scale applied to the positive energy derivative for onset.
    pub onset_sensitivity: f32,
    /// Geometric decay applied to the beat hit impulse every update.
    pub beat_hit_decay: f32,
    /// Frame rate the envelope coefficients are derived against. Must
    /// match the caller's update cadence; changing it re-derives the
    /// coefficients on the next preset or envelope call.
    pub frame_rate: f32,
}

impl Default for ControlBusConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.02,
            silence_debounce: 0.3,
            onset_sensitivity: 2.0,
            beat_hit_decay: 0.85,
            frame_rate: 60.0,
        }
    }
}

/// Frame-synchronous control bus.
///
/// Mutated by exactly one `update` call per frame from the animation
/// thread; never shared across threads.
pub struct ControlBus {
    config: ControlBusConfig,

    pub energy: SmoothedValue,
    pub bass: SmoothedValue,
    pub mid: SmoothedValue,
    pub treble: SmoothedValue,
    pub onset: SmoothedValue,
    prev_energy: f32,

    bass_ratio: f32,
    treble_ratio: f32,
    brightness: f32,
    dynamics: f32,

    beat: BeatState,

    energy_history: [f32; ENERGY_HISTORY],
    history_idx: usize,

    silence_time: f32,
    is_silent: bool,
    current_time: f32,
}

impl ControlBus {
    pub fn new() -> Self {
        Self::with_config(ControlBusConfig::default())
    }

    pub fn with_config(config: ControlBusConfig) -> Self {
        let fps = config.frame_rate;
        Self {
            // Default envelope times: fast attack everywhere, release
            // slowing toward the low end for visual weight.
            energy: SmoothedValue::with_times(5.0, 80.0, fps),
            bass: SmoothedValue::with_times(8.0, 100.0, fps),
            mid: SmoothedValue::with_times(5.0, 60.0, fps),
            treble: SmoothedValue::with_times(3.0, 40.0, fps),
            onset: SmoothedValue::with_times(2.0, 30.0, fps),
            prev_energy: 0.0,
            bass_ratio: 0.33,
            treble_ratio: 0.33,
            brightness: 0.5,
            dynamics: 0.0,
            beat: BeatState {
                bpm: 120.0,
                ..BeatState::default()
            },
            energy_history: [0.0; ENERGY_HISTORY],
            history_idx: 0,
            silence_time: 0.0,
            is_silent: false,
            current_time: 0.0,
            config,
        }
    }

    /// Feed one frame of macro-band energies. Inputs are clamped to
    /// 0..1; `dt` is the frame delta in seconds.
    pub fn update(&mut self, bass: f32, mid: f32, treble: f32, dt: f32) {
        self.current_time += dt;

        let bass = bass.clamp(0.0, 1.0);
        let mid = mid.clamp(0.0, 1.0);
        let treble = treble.clamp(0.0, 1.0);

        // Weighted overall energy: bass carries the motion.
        let energy = bass * 0.5 + mid * 0.3 + treble * 0.2;

        let energy_delta = energy - self.prev_energy;
        let onset = if energy_delta > 0.0 {
            (energy_delta * self.config.onset_sensitivity).min(1.0)
        } else {
            0.0
        };
        self.prev_energy = energy;

        self.energy.update(energy);
        self.bass.update(bass);
        self.mid.update(mid);
        self.treble.update(treble);
        self.onset.update(onset);

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

        self.energy_history[self.history_idx] = energy;
        self.history_idx = (self.history_idx + 1) % ENERGY_HISTORY;

        let mean = self.energy_history.iter().sum::<f32>() / ENERGY_HISTORY as f32;
        let variance = self
            .energy_history
            .iter()
            .map(|e| (e - mean) * (e - mean))
            .sum::<f32>()
            / ENERGY_HISTORY as f32;
        self.dynamics = (variance.sqrt() * 3.0).min(1.0);

        if self.energy.smoothed < self.config.silence_threshold {
            self.silence_time += dt;
            self.is_silent = self.silence_time > self.config.silence_debounce;
        } else {
            self.silence_time = 0.0;
            self.is_silent = false;
        }

        self.beat.hit *= self.config.beat_hit_decay;
    }

    /// Feed beat phase and tempo from an external tracker. Independent
    /// of `update`; BPM outside a plausible range is ignored.
    pub fn update_beat(&mut self, phase: f32, bpm: f32, detected: bool) {
        self.beat.phase = phase;
        if bpm > 30.0 && bpm < 300.0 {
            self.beat.bpm = bpm;
        }

        self.beat.on_beat = phase < 0.1 || phase > 0.9;
        self.beat.on_half_beat = phase > 0.45 && phase < 0.55;

        if detected {
            self.beat.hit = 1.0;
            self.beat.beat_count += 1;
            self.beat.last_beat = self.current_time;
        }
    }

    /// Swap every envelope to a preset's time constants.
    pub fn set_smoothing(&mut self, preset: SmoothingPreset) {
        let fps = self.config.frame_rate;
        match preset {
            SmoothingPreset::Fast => {
                self.energy.set_times(3.0, 40.0, fps);
                self.bass.set_times(5.0, 60.0, fps);
                self.mid.set_times(3.0, 40.0, fps);
                self.treble.set_times(2.0, 30.0, fps);
                self.onset.set_times(1.0, 20.0, fps);
            }
            SmoothingPreset::Medium => {
                self.energy.set_times(8.0, 100.0, fps);
                self.bass.set_times(10.0, 120.0, fps);
                self.mid.set_times(8.0, 80.0, fps);
                self.treble.set_times(5.0, 60.0, fps);
                self.onset.set_times(3.0, 40.0, fps);
            }
            SmoothingPreset::Slow => {
                self.energy.set_times(20.0, 200.0, fps);
                self.bass.set_times(25.0, 250.0, fps);
                self.mid.set_times(20.0, 180.0, fps);
                self.treble.set_times(15.0, 150.0, fps);
                self.onset.set_times(10.0, 100.0, fps);
            }
            SmoothingPreset::Instant => {
                self.energy.set_instant();
                self.bass.set_instant();
                self.mid.set_instant();
                self.treble.set_instant();
                self.onset.set_instant();
            }
        }
    }

    /// Override one signal's attack/release times in milliseconds.
    pub fn set_envelope(&mut self, signal: SignalKind, attack_ms: f32, release_ms: f32) {
        let fps = self.config.frame_rate;
        let value = match signal {
            SignalKind::Energy => &mut self.energy,
            SignalKind::Bass => &mut self.bass,
            SignalKind::Mid => &mut self.mid,
            SignalKind::Treble => &mut self.treble,
            SignalKind::Onset => &mut self.onset,
        };
        value.set_times(attack_ms, release_ms, fps);
    }

    /// Return to the just-created state, treating the room as silent.
    pub fn reset(&mut self) {
        self.energy.reset();
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
        self.onset.reset();
        self.prev_energy = 0.0;
        self.bass_ratio = 0.33;
        self.treble_ratio = 0.33;
        self.brightness = 0.5;
        self.dynamics = 0.0;
        self.beat.phase = 0.0;
        self.beat.hit = 0.0;
        self.beat.beat_count = 0;
        self.energy_history = [0.0; ENERGY_HISTORY];
        self.history_idx = 0;
        self.silence_time = 0.0;
        self.is_silent = true;
    }

    pub fn beat(&self) -> &BeatState {
        &self.beat
    }

    pub fn bass_ratio(&self) -> f32 {
        self.bass_ratio
    }

    pub fn treble_ratio(&self) -> f32 {
        self.treble_ratio
    }

    /// Spectral-centroid proxy: mids and treble relative to the total.
    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    /// Recent energy variance, scaled into 0..1.
    pub fn dynamics(&self) -> f32 {
        self.dynamics
    }

    pub fn is_silent(&self) -> bool {
        self.is_silent
    }

    pub fn silence_time(&self) -> f32 {
        self.silence_time
    }

    pub fn config(&self) -> &ControlBusConfig {
        &self.config
    }

    /// One frame's smoothed signals as a plain value, for classifiers
    /// and display layers that shouldn't hold a borrow on the bus.
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            energy: self.energy.smoothed,
            bass: self.bass.smoothed,
            mid: self.mid.smoothed,
            treble: self.treble.smoothed,
            onset: self.onset.smoothed,
            bass_ratio: self.bass_ratio,
            treble_ratio: self.treble_ratio,
            brightness: self.brightness,
            dynamics: self.dynamics,
            beat_phase: self.beat.phase,
            beat_hit: self.beat.hit,
            bpm: self.beat.bpm,
            is_silent: self.is_silent,
        }
    }
}

impl Default for ControlBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Copyable snapshot of the bus for one frame.
#[derive(Debug, Clone, Copy)]
pub struct ControlSnapshot {
    pub energy: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub onset: f32,
    pub bass_ratio: f32,
    pub treble_ratio: f32,
    pub brightness: f32,
    pub dynamics: f32,
    pub beat_phase: f32,
    pub beat_hit: f32,
    pub bpm: f32,
    pub is_silent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn zero_input_decays_to_silence() {
        let mut bus = ControlBus::new();
        bus.update(0.8, 0.6, 0.4, DT);
        for _ in 0..120 {
            bus.update(0.0, 0.0, 0.0, DT);
        }
        assert!(bus.energy.smoothed < 0.02);
        assert!(bus.is_silent(), "2 s of zeros must trip the silence flag");
    }

    #[test]
    fn silence_flag_waits_for_debounce() {
        let mut bus = ControlBus::new();
        for _ in 0..10 {
            bus.update(0.0, 0.0, 0.0, DT);
        }
        // Only ~167 ms elapsed, under the 300 ms debounce.
        assert!(!bus.is_silent());
    }

    #[test]
    fn attack_is_faster_than_release() {
        let mut bus = ControlBus::new();
        let mut rise_frames = 0;
        loop {
            bus.update(1.0, 1.0, 1.0, DT);
            rise_frames += 1;
            if bus.energy.smoothed > 0.9 {
                break;
            }
        }
        let mut fall_frames = 0;
        loop {
            bus.update(0.0, 0.0, 0.0, DT);
            fall_frames += 1;
            if bus.energy.smoothed < 0.1 {
                break;
            }
        }
        assert!(
            rise_frames < fall_frames,
            "rise {rise_frames} frames vs fall {fall_frames} frames"
        );
    }

    #[test]
    fn inputs_are_clamped() {
        let mut bus = ControlBus::new();
        bus.set_smoothing(SmoothingPreset::Instant);
        bus.update(5.0, -3.0, 2.0, DT);
        assert!(bus.bass.smoothed <= 1.0);
        assert!(bus.mid.smoothed >= 0.0);
        assert!(bus.energy.smoothed <= 1.0);
    }

    #[test]
    fn instant_preset_is_passthrough() {
        let mut bus = ControlBus::new();
        bus.set_smoothing(SmoothingPreset::Instant);
        bus.update(0.7, 0.2, 0.1, DT);
        assert!((bus.bass.smoothed - 0.7).abs() < 1e-6);
        bus.update(0.0, 0.0, 0.0, DT);
        assert!(bus.bass.smoothed.abs() < 1e-6);
    }

    #[test]
    fn beat_hit_decays_every_update() {
        let mut bus = ControlBus::new();
        bus.update_beat(0.0, 128.0, true);
        assert!((bus.beat().hit - 1.0).abs() < 1e-6);
        assert_eq!(bus.beat().beat_count, 1);

        let mut previous = bus.beat().hit;
        for _ in 0..10 {
            bus.update(0.3, 0.3, 0.3, DT);
            let hit = bus.beat().hit;
            assert!(hit < previous, "hit must strictly decrease");
            previous = hit;
        }
        assert!(previous < 0.25);
    }

    #[test]
    fn bpm_outside_plausible_range_is_ignored() {
        let mut bus = ControlBus::new();
        bus.update_beat(0.0, 128.0, false);
        bus.update_beat(0.0, 500.0, false);
        assert!((bus.beat().bpm - 128.0).abs() < 1e-6);
        bus.update_beat(0.0, 10.0, false);
        assert!((bus.beat().bpm - 128.0).abs() < 1e-6);
    }

    #[test]
    fn beat_phase_flags() {
        let mut bus = ControlBus::new();
        bus.update_beat(0.05, 120.0, false);
        assert!(bus.beat().on_beat);
        assert!(!bus.beat().on_half_beat);
        bus.update_beat(0.5, 120.0, false);
        assert!(!bus.beat().on_beat);
        assert!(bus.beat().on_half_beat);
    }

    #[test]
    fn quiet_frames_report_neutral_ratios() {
        let mut bus = ControlBus::new();
        bus.update(0.0, 0.0, 0.0, DT);
        assert!((bus.bass_ratio() - 0.33).abs() < 1e-6);
        assert!((bus.brightness() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn dynamics_tracks_variation() {
        let mut steady = ControlBus::new();
        let mut varied = ControlBus::new();
        for i in 0..128 {
            steady.update(0.5, 0.5, 0.5, DT);
            let pulse = if i % 8 < 2 { 1.0 } else { 0.0 };
            varied.update(pulse, pulse, pulse, DT);
        }
        assert!(varied.dynamics() > steady.dynamics());
        assert!(varied.dynamics() <= 1.0);
    }

    #[test]
    fn custom_envelope_changes_response() {
        let mut slow = ControlBus::new();
        let mut fast = ControlBus::new();
        fast.set_envelope(SignalKind::Bass, 0.0, 0.0);
        slow.set_envelope(SignalKind::Bass, 200.0, 400.0);
        slow.update(1.0, 0.0, 0.0, DT);
        fast.update(1.0, 0.0, 0.0, DT);
        assert!(fast.bass.smoothed > slow.bass.smoothed);
    }

    #[test]
    fn reset_returns_to_silent_state() {
        let mut bus = ControlBus::new();
        for _ in 0..30 {
            bus.update(0.9, 0.8, 0.7, DT);
        }
        bus.update_beat(0.0, 140.0, true);
        bus.reset();
        assert_eq!(bus.beat().beat_count, 0);
        assert!(bus.is_silent());
        assert!(bus.energy.smoothed.abs() < 1e-6);
        assert!(bus.dynamics().abs() < 1e-6);
    }

    #[test]
    fn onset_fires_on_rising_energy_only() {
        let mut bus = ControlBus::new();
        bus.set_smoothing(SmoothingPreset::Instant);
        bus.update(0.0, 0.0, 0.0, DT);
        bus.update(0.8, 0.8, 0.8, DT);
        assert!(bus.onset.smoothed > 0.0);
        bus.update(0.2, 0.2, 0.2, DT);
        assert!(bus.onset.raw.abs() < 1e-6);
    }
}
