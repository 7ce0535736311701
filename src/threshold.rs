use log::info;

use crate::config::RunConfig;
use crate::error::DetectError;
use crate::source::{excerpt_ranges, ChunkSource};

/// MAD of a zero-centered signal scaled by this factor approximates its
/// standard deviation under Gaussian noise.
const MAD_TO_SIGMA: f32 = 0.6745;

/// The two amplitude cutoffs shared by every chunk of a run. `weak` gates
/// component membership, `strong` is the mandatory seed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub strong: f32,
    pub weak: f32,
}

/// Estimate both thresholds from excerpts scattered uniformly across the
/// recording: robust amplitude scale `median(|x|) / 0.6745`, multiplied by
/// the configured strong/weak factors.
///
/// Computed once per run and applied identically to every chunk, so
/// thresholds never drift across chunk boundaries.
pub fn estimate_thresholds<S: ChunkSource>(
    source: &mut S,
    channels: &[usize],
    config: &RunConfig,
) -> Result<Thresholds, DetectError> {
    let n = source.n_samples();
    let ranges = excerpt_ranges(n, config.nexcerpts, config.excerpt_size);
    let mut amplitudes: Vec<f32> = Vec::new();
    for (start, end) in ranges {
        let chunk = source.fetch(channels, start, end, 0)?;
        amplitudes.extend(chunk.samples.iter().map(|v| v.abs()));
    }
    if amplitudes.is_empty() {
        return Err(DetectError::EmptyRecording);
    }
    let scale = median(&mut amplitudes) / MAD_TO_SIGMA;
    let thresholds = Thresholds {
        strong: scale * config.threshold_strong_multiplier,
        weak: scale * config.threshold_weak_multiplier,
    };
    info!(
        "estimated thresholds from {} excerpt samples: scale {:.4}, strong {:.4}, weak {:.4}",
        amplitudes.len(),
        scale,
        thresholds.strong,
        thresholds.weak
    );
    Ok(thresholds)
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_unstable_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config() -> RunConfig {
        RunConfig {
            nexcerpts: 10,
            excerpt_size: 100,
            ..RunConfig::default()
        }
    }

    #[test]
    fn constant_amplitude_gives_exact_scale() {
        let mut source = MemorySource::from_channels(&[vec![-1.0; 1000]]);
        let thresholds = estimate_thresholds(&mut source, &[0], &config()).unwrap();
        let scale = 1.0 / MAD_TO_SIGMA;
        assert!((thresholds.strong - scale * 4.5).abs() < 1e-4);
        assert!((thresholds.weak - scale * 2.0).abs() < 1e-4);
        assert!(thresholds.strong >= thresholds.weak);
    }

    #[test]
    fn gaussian_noise_scale_tracks_sigma() {
        let mut rng = StdRng::seed_from_u64(7);
        let sigma = 0.5_f32;
        // Box-Muller pairs; one value kept per pair is plenty here.
        let samples: Vec<f32> = (0..20_000)
            .map(|_| {
                let u1: f32 = rng.gen_range(1e-6..1.0);
                let u2: f32 = rng.gen_range(0.0..1.0);
                sigma
                    * (-2.0 * u1.ln()).sqrt()
                    * (2.0 * std::f32::consts::PI * u2).cos()
            })
            .collect();
        let mut source = MemorySource::from_channels(&[samples]);
        let cfg = RunConfig {
            nexcerpts: 20,
            excerpt_size: 1000,
            threshold_strong_multiplier: 1.0,
            threshold_weak_multiplier: 1.0,
            ..RunConfig::default()
        };
        let thresholds = estimate_thresholds(&mut source, &[0], &cfg).unwrap();
        assert!(
            (thresholds.strong - sigma).abs() < 0.05,
            "scale {} should be close to sigma {}",
            thresholds.strong,
            sigma
        );
    }

    #[test]
    fn empty_recording_is_rejected() {
        let mut source = MemorySource::from_channels(&[Vec::new()]);
        assert!(matches!(
            estimate_thresholds(&mut source, &[0], &config()),
            Err(DetectError::EmptyRecording)
        ));
    }
}
