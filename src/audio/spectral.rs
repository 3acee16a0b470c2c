use std::sync::Arc;

use log::debug;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reference magnitude that maps summed FFT output to the unit range
/// before auto-gain is applied. Tuned for 16-bit-scale PCM input.
const MAGNITUDE_REFERENCE: f32 = 100_000.0;

/// Bars whose cutoff frequency sits below this use the long bass FFT.
const BASS_SPLIT_HZ: f32 = 300.0;

/// Configuration for [`SpectralAnalyzer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Total output bands across all channels. Must divide evenly by
    /// `channels`.
    pub bands: usize,
    /// Input sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count, 1 or 2.
    pub channels: usize,
    /// Enable automatic gain adjustment.
    pub auto_gain: bool,
    /// Per-band floor factor in 0..1; each band never drops below
    /// `previous * noise_reduction` in one step.
    pub noise_reduction: f32,
    /// Lowest analyzed frequency in Hz.
    pub low_cut_hz: f32,
    /// Highest analyzed frequency in Hz.
    pub high_cut_hz: f32,
    /// Gain multiplier applied when a band clips past 1.0.
    pub gain_decay: f32,
    /// Gain multiplier applied on non-silent, non-clipping frames.
    pub gain_growth: f32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            bands: 24,
            sample_rate: 44_100,
            channels: 2,
            auto_gain: true,
            noise_reduction: 0.77,
            low_cut_hz: 50.0,
            high_cut_hz: 10_000.0,
            gain_decay: 0.985,
            gain_growth: 1.001,
        }
    }
}

/// Dual-resolution spectral analyzer.
///
/// Turns a rolling window of interleaved PCM into per-band magnitudes in
/// 0..1. Two FFT lengths run side by side: a long (~50 ms) window that
/// gives bass bars real frequency resolution, and a short (~12.5 ms)
/// window that keeps mid/treble bars responsive to transients. Band
/// cutoffs follow a logarithmic schedule so low frequencies get more
/// bars, matching pitch perception.
pub struct SpectralAnalyzer {
    config: SpectralConfig,
    bars_per_channel: usize,

    bass_fft_size: usize,
    fft_size: usize,
    bass_fft: Arc<dyn Fft<f32>>,
    fft: Arc<dyn Fft<f32>>,
    bass_window: Vec<f32>,
    window: Vec<f32>,

    cutoff_frequency: Vec<f32>,
    lower_cut_off: Vec<usize>,
    upper_cut_off: Vec<usize>,
    bass_cut_off_bar: usize,
    eq: Vec<f32>,

    /// Rolling input, newest sample first, interleaved.
    input_buffer: Vec<f32>,
    bass_scratch: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,

    /// Previous banded output before normalization, for the noise floor.
    prev_out: Vec<f32>,
    out: Vec<f32>,

    sens: f32,
    sens_init: bool,
    framerate: f32,
    frame_skip: u32,
}

impl SpectralAnalyzer {
    pub fn new(config: SpectralConfig) -> Result<Self> {
        if config.channels < 1 || config.channels > 2 {
            return Err(Error::config(format!(
                "illegal number of channels: {}",
                config.channels
            )));
        }
        if config.bands < 1 {
            return Err(Error::config(format!(
                "illegal number of bands: {}",
                config.bands
            )));
        }
        if config.bands % config.channels != 0 {
            return Err(Error::config(
                "number of bands must be divisible by number of channels",
            ));
        }
        if (config.sample_rate as f32) < config.high_cut_hz * 2.0 {
            return Err(Error::config(
                "sample rate must be at least twice the high cutoff frequency",
            ));
        }
        if config.low_cut_hz >= config.high_cut_hz {
            return Err(Error::config(
                "low cutoff must be below high cutoff frequency",
            ));
        }

        let rate = config.sample_rate as f32;
        let bars_per_channel = config.bands / config.channels;

        // Bass needs a longer FFT for resolution at low frequencies;
        // mids/treble use a short one for latency.
        let bass_fft_size = ((config.sample_rate / 20) as usize).next_power_of_two();
        let fft_size = ((config.sample_rate / 80) as usize).next_power_of_two();

        let mut planner = FftPlanner::new();
        let bass_fft = planner.plan_fft_forward(bass_fft_size);
        let fft = planner.plan_fft_forward(fft_size);

        // Logarithmic cutoff schedule concentrates bars in low frequencies.
        let freq_const = (config.low_cut_hz / config.high_cut_hz).log10()
            / (1.0 / (bars_per_channel as f32 + 1.0) - 1.0);
        let cutoff_frequency: Vec<f32> = (0..=bars_per_channel)
            .map(|n| {
                let t = (n as f32 + 1.0) / (bars_per_channel as f32 + 1.0);
                config.high_cut_hz * 10f32.powf(freq_const * (t - 1.0))
            })
            .collect();

        let bass_cut_off_bar = cutoff_frequency[..bars_per_channel]
            .iter()
            .filter(|f| **f < BASS_SPLIT_HZ)
            .count();

        let mut lower_cut_off = vec![0usize; bars_per_channel];
        let mut upper_cut_off = vec![0usize; bars_per_channel];
        let mut eq = vec![0f32; bars_per_channel];
        for n in 0..bars_per_channel {
            let size = if n < bass_cut_off_bar {
                bass_fft_size
            } else {
                fft_size
            };
            let lower = ((cutoff_frequency[n] * size as f32 / rate) as usize).max(1);
            let upper = ((cutoff_frequency[n + 1] * size as f32 / rate) as usize)
                .max(lower)
                .min(size / 2);
            lower_cut_off[n] = lower;
            upper_cut_off[n] = upper;
            eq[n] = cutoff_frequency[n + 1].powf(0.85)
                / (size as f32).log2()
                / (upper - lower + 1) as f32;
        }

        debug!(
            "spectral analyzer: {} bands, bass fft {} / short fft {}, {} bass bars",
            config.bands, bass_fft_size, fft_size, bass_cut_off_bar
        );

        let input_buffer = vec![0.0; bass_fft_size * config.channels];
        let out = vec![0.0; config.bands];
        Ok(Self {
            bars_per_channel,
            bass_window: hann_window(bass_fft_size),
            window: hann_window(fft_size),
            bass_fft,
            fft,
            bass_fft_size,
            fft_size,
            cutoff_frequency,
            lower_cut_off,
            upper_cut_off,
            bass_cut_off_bar,
            eq,
            input_buffer,
            bass_scratch: vec![Complex::new(0.0, 0.0); bass_fft_size],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            prev_out: out.clone(),
            out,
            sens: 1.0,
            sens_init: true,
            framerate: 0.0,
            frame_skip: 1,
            config,
        })
    }

    /// Analyze one frame's worth of new interleaved samples.
    ///
    /// `new_samples` may be empty on an underrun (the previous window is
    /// re-processed) or longer than the internal buffer (the excess is
    /// truncated). Returns the per-band magnitudes, one slot per band,
    /// channel-major, each clamped to 0..1.
    pub fn execute(&mut self, new_samples: &[f32]) -> &[f32] {
        let buffer_len = self.input_buffer.len();
        let new_len = new_samples.len().min(buffer_len);
        let mut silence = true;

        if new_len > 0 {
            let produced = (self.config.sample_rate as f32
                * self.config.channels as f32
                * self.frame_skip as f32)
                / new_len as f32;
            self.framerate -= self.framerate / 64.0;
            self.framerate += produced / 64.0;
            self.frame_skip = 1;

            // Shift older samples back, then write the new block
            // newest-first at the front.
            self.input_buffer.copy_within(0..buffer_len - new_len, new_len);
            for (n, &sample) in new_samples[..new_len].iter().enumerate() {
                self.input_buffer[new_len - n - 1] = sample;
                if sample != 0.0 {
                    silence = false;
                }
            }
        } else {
            self.frame_skip += 1;
        }

        let channels = self.config.channels;
        let mut max_band = 0.0f32;
        for channel in 0..channels {
            // Window + transform both resolutions for this channel.
            for i in 0..self.bass_fft_size {
                let sample = self.input_buffer[i * channels + channel];
                self.bass_scratch[i] = Complex::new(sample * self.bass_window[i], 0.0);
            }
            self.bass_fft.process(&mut self.bass_scratch);

            for i in 0..self.fft_size {
                let sample = self.input_buffer[i * channels + channel];
                self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process(&mut self.scratch);

            for n in 0..self.bars_per_channel {
                let bins = if n < self.bass_cut_off_bar {
                    &self.bass_scratch
                } else {
                    &self.scratch
                };
                let mut magnitude = 0.0f32;
                for bin in bins
                    .iter()
                    .take(self.upper_cut_off[n] + 1)
                    .skip(self.lower_cut_off[n])
                {
                    magnitude += bin.norm();
                }
                magnitude *= self.eq[n];

                let slot = channel * self.bars_per_channel + n;
                // Noise floor: never fall faster than the reduction factor.
                if magnitude < self.prev_out[slot] * self.config.noise_reduction {
                    magnitude = self.prev_out[slot] * self.config.noise_reduction;
                }
                self.prev_out[slot] = magnitude;

                let scaled = magnitude / MAGNITUDE_REFERENCE * self.sens;
                if scaled > max_band {
                    max_band = scaled;
                }
                self.out[slot] = scaled.clamp(0.0, 1.0);
            }
        }

        if self.config.auto_gain {
            if max_band > 1.0 {
                self.sens *= self.config.gain_decay;
                self.sens_init = false;
            } else if !silence {
                self.sens *= self.config.gain_growth;
                if self.sens_init {
                    // Converge quickly from the conservative initial gain.
                    self.sens *= 1.1;
                }
            }
        }

        &self.out
    }

    pub fn band_count(&self) -> usize {
        self.config.bands
    }

    /// Band cutoff frequencies in Hz, one more entry than bars per
    /// channel; strictly increasing.
    pub fn cutoff_frequencies(&self) -> &[f32] {
        &self.cutoff_frequency
    }

    /// FFT bin range `(lower, upper)` for one bar, inclusive.
    pub fn bin_range(&self, bar: usize) -> (usize, usize) {
        (self.lower_cut_off[bar], self.upper_cut_off[bar])
    }

    /// Number of bars fed from the long bass window.
    pub fn bass_bar_count(&self) -> usize {
        self.bass_cut_off_bar
    }

    /// Current auto-gain factor. Strictly positive.
    pub fn gain(&self) -> f32 {
        self.sens
    }

    /// Smoothed estimate of the caller's analysis frame rate.
    pub fn framerate(&self) -> f32 {
        self.framerate
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_config(bands: usize) -> SpectralConfig {
        SpectralConfig {
            bands,
            channels: 1,
            ..SpectralConfig::default()
        }
    }

    fn sine(freq: f32, rate: f32, channels: usize, frames: usize, amplitude: f32) -> Vec<f32> {
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let value =
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin();
            for _ in 0..channels {
                samples.push(value);
            }
        }
        samples
    }

    #[test]
    fn rejects_illegal_channel_count() {
        let config = SpectralConfig {
            channels: 3,
            ..SpectralConfig::default()
        };
        assert!(matches!(
            SpectralAnalyzer::new(config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn rejects_zero_bands() {
        assert!(SpectralAnalyzer::new(mono_config(0)).is_err());
    }

    #[test]
    fn rejects_bands_not_divisible_by_channels() {
        let config = SpectralConfig {
            bands: 25,
            channels: 2,
            ..SpectralConfig::default()
        };
        assert!(SpectralAnalyzer::new(config).is_err());
    }

    #[test]
    fn rejects_rate_below_nyquist_of_high_cut() {
        let config = SpectralConfig {
            sample_rate: 16_000,
            high_cut_hz: 10_000.0,
            ..mono_config(12)
        };
        assert!(SpectralAnalyzer::new(config).is_err());
    }

    #[test]
    fn cutoffs_strictly_increasing_and_bins_ordered() {
        let analyzer = SpectralAnalyzer::new(mono_config(24)).unwrap();
        let cutoffs = analyzer.cutoff_frequencies();
        for pair in cutoffs.windows(2) {
            assert!(pair[0] < pair[1], "cutoffs not increasing: {:?}", pair);
        }
        for bar in 0..analyzer.band_count() {
            let (lower, upper) = analyzer.bin_range(bar);
            assert!(lower >= 1);
            assert!(lower <= upper);
        }
    }

    #[test]
    fn some_bars_use_the_bass_window() {
        let analyzer = SpectralAnalyzer::new(mono_config(24)).unwrap();
        assert!(analyzer.bass_bar_count() > 0);
        assert!(analyzer.bass_bar_count() < analyzer.band_count());
    }

    #[test]
    fn output_stays_in_unit_range_even_when_clipping() {
        let mut analyzer = SpectralAnalyzer::new(mono_config(12)).unwrap();
        let blast = sine(440.0, 44_100.0, 1, 4096, 1.0e7);
        for _ in 0..20 {
            let out = analyzer.execute(&blast);
            for &band in out {
                assert!((0.0..=1.0).contains(&band), "band out of range: {band}");
            }
        }
    }

    #[test]
    fn gain_decays_under_sustained_clipping() {
        let mut analyzer = SpectralAnalyzer::new(mono_config(12)).unwrap();
        let blast = sine(440.0, 44_100.0, 1, 4096, 1.0e7);
        for _ in 0..10 {
            analyzer.execute(&blast);
        }
        assert!(analyzer.gain() < 1.0);
        assert!(analyzer.gain() > 0.0);
    }

    #[test]
    fn gain_grows_on_quiet_signal() {
        let mut analyzer = SpectralAnalyzer::new(mono_config(12)).unwrap();
        let quiet = sine(440.0, 44_100.0, 1, 2048, 10.0);
        for _ in 0..10 {
            analyzer.execute(&quiet);
        }
        assert!(analyzer.gain() > 1.0);
    }

    #[test]
    fn tone_lands_in_a_matching_band() {
        let mut analyzer = SpectralAnalyzer::new(mono_config(24)).unwrap();
        let tone = sine(100.0, 44_100.0, 1, 8192, 20_000.0);
        let mut loudest = 0;
        for _ in 0..5 {
            let out = analyzer.execute(&tone).to_vec();
            loudest = out
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(i, _)| i)
                .unwrap();
        }
        // 100 Hz should land well inside the lower half of the bars.
        assert!(loudest < 12, "100 Hz peaked at bar {loudest}");
    }

    #[test]
    fn empty_input_repeats_previous_window() {
        let mut analyzer = SpectralAnalyzer::new(mono_config(12)).unwrap();
        let tone = sine(200.0, 44_100.0, 1, 4096, 20_000.0);
        let first: Vec<f32> = analyzer.execute(&tone).to_vec();
        let repeat: Vec<f32> = analyzer.execute(&[]).to_vec();
        assert!(first.iter().any(|&b| b > 0.0));
        for (a, b) in first.iter().zip(repeat.iter()) {
            if *a > 0.0 {
                assert!(*b > 0.0);
            }
        }
    }

    #[test]
    fn oversized_input_is_truncated() {
        let mut analyzer = SpectralAnalyzer::new(mono_config(12)).unwrap();
        let long = sine(200.0, 44_100.0, 1, 100_000, 5_000.0);
        let out = analyzer.execute(&long);
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn stereo_produces_channel_major_output() {
        let config = SpectralConfig {
            bands: 24,
            channels: 2,
            ..SpectralConfig::default()
        };
        let mut analyzer = SpectralAnalyzer::new(config).unwrap();
        let tone = sine(150.0, 44_100.0, 2, 4096, 20_000.0);
        for _ in 0..4 {
            analyzer.execute(&tone);
        }
        let out = analyzer.execute(&tone);
        assert_eq!(out.len(), 24);
        // Identical channels should produce matching halves.
        for n in 0..12 {
            assert!((out[n] - out[n + 12]).abs() < 1e-3);
        }
    }
}
