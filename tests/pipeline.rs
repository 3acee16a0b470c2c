//! End-to-end pipeline scenarios: analyzer -> aggregator -> control bus
//! -> dancer, driven the way the render loop drives them.

use jitterbug::audio::{aggregate, SharedSampleBuffer, SpectralAnalyzer, SpectralConfig};
use jitterbug::control::ControlBus;
use jitterbug::dancer::{PoseCategory, SkeletonDancer};

const DT: f32 = 1.0 / 60.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mono_analyzer() -> SpectralAnalyzer {
    SpectralAnalyzer::new(SpectralConfig {
        bands: 24,
        channels: 1,
        ..SpectralConfig::default()
    })
    .unwrap()
}

/// One frame's worth of a sine at 60 fps and 44.1 kHz.
fn sine_frame(freq: f32, amplitude: f32) -> Vec<f32> {
    (0..735)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / 44_100.0).sin())
        .collect()
}

#[test]
fn silence_settles_the_whole_pipeline_to_idle() {
    init_logging();
    let mut analyzer = mono_analyzer();
    let mut bus = ControlBus::new();
    let mut dancer = SkeletonDancer::new(25, 13).unwrap();

    // Two seconds of dead air.
    for _ in 0..120 {
        let out = aggregate(analyzer.execute(&[]));
        bus.update(out.bass, out.mid, out.treble, DT);
        let snap = bus.snapshot();
        dancer.update(snap.bass, snap.mid, snap.treble, DT);
    }

    assert!(bus.is_silent());
    assert!(bus.energy.smoothed < 0.02);
    assert!(dancer.effective_energy() < 0.05);
    assert!(matches!(
        dancer.primary_pose().category,
        PoseCategory::Idle | PoseCategory::Calm
    ));

    // Physics has had time to settle onto the pose.
    let bounds = dancer.bounds();
    assert!(bounds.top < bounds.bottom);
}

#[test]
fn loud_music_drives_every_stage_within_range() {
    init_logging();
    let mut analyzer = mono_analyzer();
    let mut bus = ControlBus::new();
    let mut dancer = SkeletonDancer::new(25, 13).unwrap();

    for frame in 0..300 {
        // Kick plus hat: low tone always, bursts of highs every 8 frames.
        let mut samples = sine_frame(90.0, 18_000.0);
        if frame % 8 < 2 {
            for (i, sample) in samples.iter_mut().enumerate() {
                *sample +=
                    9_000.0 * (2.0 * std::f32::consts::PI * 6_000.0 * i as f32 / 44_100.0).sin();
            }
        }

        let out = analyzer.execute(&samples);
        for &band in out {
            assert!((0.0..=1.0).contains(&band));
        }

        let bands = aggregate(out);
        bus.update(bands.bass, bands.mid, bands.treble, DT);
        let snap = bus.snapshot();
        assert!((0.0..=1.0).contains(&snap.energy));
        assert!((0.0..=1.0).contains(&snap.bass));

        dancer.update_with_phase(snap.bass, snap.mid, snap.treble, DT, snap.beat_phase, snap.bpm);
    }

    assert!(!bus.is_silent());
    assert!(analyzer.gain() > 0.0);
    // Something loud has been happening; the dancer should not be idling.
    assert_ne!(dancer.primary_pose().category, PoseCategory::Idle);
}

#[test]
fn bass_spike_through_the_bus_fires_exactly_once() {
    init_logging();
    let mut bus = ControlBus::new();
    let mut dancer = SkeletonDancer::new(25, 13).unwrap();

    // One full-scale bass frame, then quiet.
    bus.update(1.0, 0.0, 0.0, DT);
    let snap = bus.snapshot();
    dancer.update(snap.bass, snap.mid, snap.treble, DT);
    for _ in 0..120 {
        bus.update(0.0, 0.0, 0.0, DT);
        let snap = bus.snapshot();
        dancer.update(snap.bass, snap.mid, snap.treble, DT);
    }

    assert_eq!(dancer.bass_hit_count(), 1);
}

#[test]
fn beat_state_flows_from_bus_to_dancer() {
    init_logging();
    let mut bus = ControlBus::new();
    let mut dancer = SkeletonDancer::new(25, 13).unwrap();

    let mut phase = 0.0f32;
    for _ in 0..240 {
        bus.update(0.5, 0.4, 0.3, DT);
        phase += DT * 2.0; // 120 BPM
        let detected = phase >= 1.0;
        if detected {
            phase -= 1.0;
        }
        bus.update_beat(phase, 120.0, detected);
        let snap = bus.snapshot();
        dancer.update_with_phase(snap.bass, snap.mid, snap.treble, DT, snap.beat_phase, snap.bpm);
    }

    assert!(bus.beat().beat_count >= 3);
    assert!((dancer.bpm() - 120.0).abs() < 1.0);
    assert!(dancer.beat_count() >= 3);
}

#[test]
fn capture_buffer_feeds_the_analyzer_across_threads() {
    init_logging();
    let buffer = SharedSampleBuffer::new(16_384);
    let writer = buffer.clone();
    let producer = std::thread::spawn(move || {
        for _ in 0..20 {
            writer.push(&sine_frame(200.0, 15_000.0));
        }
    });
    producer.join().unwrap();

    let mut analyzer = mono_analyzer();
    let drained = buffer.drain();
    assert!(!drained.is_empty());
    let out = analyzer.execute(&drained);
    assert!(out.iter().any(|&b| b > 0.0));

    // Underrun frame: analyzer repeats its previous window.
    let empty = buffer.drain();
    assert!(empty.is_empty());
    let out = analyzer.execute(&empty);
    assert!(out.iter().any(|&b| b > 0.0));
}
