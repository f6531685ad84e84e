//! Autocorrelation pitch estimation
//!
//! Untrained, single-frame pitch estimate for voiced chant. Candidate lags
//! are restricted to the plausible human-voice band; the winner must be a
//! local maximum of the correlation curve that clears a normalized floor,
//! so weak or out-of-band content is discarded rather than zero-filled.

/// Estimate the fundamental frequency of one voiced frame.
///
/// Returns `None` when the frame is too short for the requested band, the
/// frame is effectively silent, or no in-band correlation peak clears
/// `corr_floor`.
pub fn estimate_pitch(
    frame: &[f32],
    sample_rate: u32,
    min_hz: f64,
    max_hz: f64,
    corr_floor: f64,
) -> Option<f64> {
    if sample_rate == 0 || min_hz <= 0.0 || max_hz <= min_hz {
        return None;
    }

    let lag_min = (sample_rate as f64 / max_hz).floor() as usize;
    let lag_max = (sample_rate as f64 / min_hz).ceil() as usize;
    // Need at least one full period of overlap at the longest lag
    if lag_min < 2 || frame.len() < lag_max * 2 {
        return None;
    }

    // Remove DC so a constant offset does not masquerade as correlation
    let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len() as f64;

    let energy: f64 = frame.iter().map(|&s| (s as f64 - mean).powi(2)).sum();
    if energy <= f64::EPSILON {
        return None;
    }

    // One extra lag on each side so in-band peaks can be checked for
    // local-maximum shape
    let scan_lo = lag_min - 1;
    let scan_hi = lag_max + 1;
    let corr: Vec<f64> = (scan_lo..=scan_hi)
        .map(|lag| {
            let mut acc = 0.0f64;
            for i in 0..frame.len() - lag {
                acc += (frame[i] as f64 - mean) * (frame[i + lag] as f64 - mean);
            }
            acc / energy
        })
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for lag in lag_min..=lag_max {
        let idx = lag - scan_lo;
        let value = corr[idx];
        if value < corr_floor || value < corr[idx - 1] || value < corr[idx + 1] {
            continue;
        }
        if best.map_or(true, |(_, best_value)| value > best_value) {
            best = Some((lag, value));
        }
    }

    best.map(|(lag, _)| sample_rate as f64 / lag as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| {
                (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin() as f32
            })
            .collect()
    }

    #[test]
    fn test_estimates_sine_within_tolerance() {
        let frame = sine(220.0, 44_100, 2048);
        let pitch = estimate_pitch(&frame, 44_100, 70.0, 420.0, 0.3).expect("pitch");
        assert!((pitch - 220.0).abs() < 6.0, "got {pitch}");
    }

    #[test]
    fn test_low_chant_tone() {
        let frame = sine(110.0, 44_100, 2048);
        let pitch = estimate_pitch(&frame, 44_100, 70.0, 420.0, 0.3).expect("pitch");
        assert!((pitch - 110.0).abs() < 4.0, "got {pitch}");
    }

    #[test]
    fn test_out_of_band_rumble_is_discarded() {
        // 30 Hz is below the chant band; its correlation decays monotonically
        // across the in-band lag range, so no local peak exists to accept.
        let frame = sine(30.0, 44_100, 4096);
        assert!(estimate_pitch(&frame, 44_100, 70.0, 420.0, 0.3).is_none());
    }

    #[test]
    fn test_silence_yields_none() {
        let frame = vec![0.0f32; 2048];
        assert!(estimate_pitch(&frame, 44_100, 70.0, 420.0, 0.3).is_none());
    }

    #[test]
    fn test_frame_too_short_for_band() {
        let frame = sine(220.0, 44_100, 256);
        // 256 samples cannot cover two 70 Hz periods at 44.1kHz
        assert!(estimate_pitch(&frame, 44_100, 70.0, 420.0, 0.3).is_none());
    }
}
