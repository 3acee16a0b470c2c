use super::FrequencyBands;

/// Reduce per-band analyzer output to the three macro-bands.
///
/// The band array is split into thirds (the cutoff schedule already
/// concentrates low frequencies in the first bars) and each third is
/// averaged. Fewer than three bands yields silence rather than a guess.
pub fn aggregate(band_energies: &[f32]) -> FrequencyBands {
    let count = band_energies.len();
    if count < 3 {
        return FrequencyBands::default();
    }

    let bass_end = count / 3;
    let mid_end = (count * 2) / 3;

    let bass = average(&band_energies[..bass_end]);
    let mid = average(&band_energies[bass_end..mid_end]);
    let treble = average(&band_energies[mid_end..]);

    FrequencyBands {
        bass: bass.clamp(0.0, 1.0),
        mid: mid.clamp(0.0, 1.0),
        treble: treble.clamp(0.0, 1.0),
    }
}

fn average(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_thirds() {
        let bands = [0.9, 0.9, 0.9, 0.3, 0.3, 0.3, 0.6, 0.6, 0.6];
        let out = aggregate(&bands);
        assert!((out.bass - 0.9).abs() < 1e-6);
        assert!((out.mid - 0.3).abs() < 1e-6);
        assert!((out.treble - 0.6).abs() < 1e-6);
    }

    #[test]
    fn uneven_band_counts_cover_every_band() {
        let bands = [1.0; 7];
        let out = aggregate(&bands);
        assert!((out.bass - 1.0).abs() < 1e-6);
        assert!((out.mid - 1.0).abs() < 1e-6);
        assert!((out.treble - 1.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_bands_is_silence() {
        let out = aggregate(&[0.5, 0.5]);
        assert_eq!(out, FrequencyBands::default());
    }

    #[test]
    fn output_clamped_to_unit_range() {
        let out = aggregate(&[2.0, 2.0, 2.0]);
        assert!(out.bass <= 1.0 && out.mid <= 1.0 && out.treble <= 1.0);
    }
}
