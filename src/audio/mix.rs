use crate::audio::track::{AudioTrack, check_gain};
use crate::foundation::error::{MillError, MillResult};

/// Number of whole copies of a `track_frames`-long track needed to cover `target_frames`.
pub fn loop_count(track_frames: usize, target_frames: usize) -> usize {
    if track_frames == 0 {
        return 0;
    }
    target_frames.div_ceil(track_frames)
}

/// Fit `track` to exactly `round(target_secs * sample_rate)` sample frames.
///
/// Shorter tracks are repeated back to back and then truncated; longer tracks are truncated
/// from the start; tracks of the target length are returned unchanged.
pub fn conform(track: &AudioTrack, target_secs: f64) -> MillResult<AudioTrack> {
    if !target_secs.is_finite() || target_secs <= 0.0 {
        return Err(MillError::validation(format!(
            "conform target must be finite and > 0, got {target_secs}"
        )));
    }
    if track.is_empty() {
        return Err(MillError::validation("cannot conform an empty audio track"));
    }

    let ch = usize::from(track.channels());
    let len = track.frame_count();
    let target = (target_secs * f64::from(track.sample_rate())).round() as usize;
    if target == 0 {
        return Err(MillError::validation(format!(
            "conform target {target_secs}s is shorter than one sample"
        )));
    }

    let samples = track.samples();
    let out = if target == len {
        samples.to_vec()
    } else if target < len {
        samples[..target * ch].to_vec()
    } else {
        let loops = loop_count(len, target);
        tracing::debug!(
            source_secs = track.duration_secs(),
            target_secs,
            loops,
            "looping audio track"
        );
        let mut out = Vec::with_capacity(loops * samples.len());
        for _ in 0..loops {
            out.extend_from_slice(samples);
        }
        out.truncate(target * ch);
        out
    };

    AudioTrack::new(track.sample_rate(), track.channels(), out)
}

/// Sample-wise linear mix `primary * primary_gain + secondary * secondary_gain`, clamped to
/// `[-1, 1]`.
///
/// Both tracks must have the same sample rate, channel count and length; nothing is resampled.
pub fn mix(
    primary: &AudioTrack,
    secondary: &AudioTrack,
    primary_gain: f32,
    secondary_gain: f32,
) -> MillResult<AudioTrack> {
    check_gain("primary gain", primary_gain)?;
    check_gain("secondary gain", secondary_gain)?;

    if primary.sample_rate() != secondary.sample_rate() {
        return Err(MillError::incompatible_audio(format!(
            "sample rate {} Hz vs {} Hz",
            primary.sample_rate(),
            secondary.sample_rate()
        )));
    }
    if primary.channels() != secondary.channels() {
        return Err(MillError::incompatible_audio(format!(
            "{} channels vs {} channels",
            primary.channels(),
            secondary.channels()
        )));
    }
    if primary.frame_count() != secondary.frame_count() {
        return Err(MillError::incompatible_audio(format!(
            "length {} vs {} sample frames",
            primary.frame_count(),
            secondary.frame_count()
        )));
    }

    let out = primary
        .samples()
        .iter()
        .zip(secondary.samples())
        .map(|(&p, &s)| (p * primary_gain + s * secondary_gain).clamp(-1.0, 1.0))
        .collect();
    AudioTrack::new(primary.sample_rate(), primary.channels(), out)
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
