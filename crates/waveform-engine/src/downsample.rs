//! Peak-preserving reduction of decoded audio into waveform bars.

/// One sample per frame, taken from the first channel of interleaved audio.
pub fn channel_samples(interleaved: &[f32], channels: usize) -> Vec<f32> {
    interleaved.iter().step_by(channels.max(1)).copied().collect()
}

/// Collapses `samples` into `bucket_count` peak magnitudes.
///
/// Every bucket spans `samples.len() / bucket_count` inputs; trailing samples
/// that do not fill a whole bucket are dropped, and buckets with no input
/// read as 0.
pub fn downsample(samples: &[f32], bucket_count: usize) -> Vec<f32> {
    if bucket_count == 0 {
        return Vec::new();
    }

    let total = samples.len();
    let per_bucket = total / bucket_count;
    (0..bucket_count)
        .map(|bucket| {
            let start = (bucket * per_bucket).min(total);
            let end = ((bucket + 1) * per_bucket).min(total);
            samples[start..end]
                .iter()
                .map(|sample| sample.abs())
                .fold(0.0_f32, f32::max)
        })
        .collect()
}

/// Scales `samples` so the largest value becomes 1.0. All-zero input stays zero.
pub fn normalize(samples: &[f32]) -> Vec<f32> {
    let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if samples.is_empty() {
        return Vec::new();
    }
    if max <= 0.0 || !max.is_finite() {
        return vec![0.0; samples.len()];
    }
    samples.iter().map(|sample| sample / max).collect()
}

#[cfg(test)]
mod tests {
    use super::{channel_samples, downsample, normalize};

    #[test]
    fn downsample_takes_peak_of_each_slice() {
        let samples: Vec<f32> = (0..1_000).map(|i| (i % 100) as f32 + (i / 100) as f32).collect();
        let bars = downsample(&samples, 10);

        assert_eq!(bars.len(), 10);
        for (bucket, value) in bars.iter().enumerate() {
            let slice = &samples[bucket * 100..(bucket + 1) * 100];
            let expected = slice.iter().copied().fold(0.0_f32, f32::max);
            assert_eq!(*value, expected);
        }
    }

    #[test]
    fn downsample_uses_magnitude() {
        assert_eq!(downsample(&[0.1, -0.9, 0.3, -0.2], 2), vec![0.9, 0.3]);
    }

    #[test]
    fn uneven_lengths_still_yield_requested_buckets() {
        let samples: Vec<f32> = (0..1_005).map(|i| i as f32).collect();
        let bars = downsample(&samples, 10);
        assert_eq!(bars.len(), 10);
        assert_eq!(bars[9], 999.0);

        let short = downsample(&[0.5, 0.25, 0.75], 7);
        assert_eq!(short, vec![0.0; 7]);
    }

    #[test]
    fn zero_buckets_or_empty_input() {
        assert!(downsample(&[1.0, 2.0], 0).is_empty());
        assert_eq!(downsample(&[], 3), vec![0.0; 3]);
    }

    #[test]
    fn channel_samples_picks_first_channel() {
        let interleaved = [0.1, 0.9, 0.2, 0.8, 0.3, 0.7];
        assert_eq!(channel_samples(&interleaved, 2), vec![0.1, 0.2, 0.3]);
        assert_eq!(channel_samples(&interleaved, 1), interleaved.to_vec());
    }

    #[test]
    fn normalize_scales_to_peak() {
        assert_eq!(normalize(&[2.0, 4.0, 8.0]), vec![0.25, 0.5, 1.0]);
        assert!(normalize(&[]).is_empty());
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
