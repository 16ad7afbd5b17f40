use std::f64::consts::PI;

use tracing::debug;

use crate::config::{ProcessingOptions, RedactionMethod};
use crate::transcript::RedactionInterval;

use super::AudioBuffer;

/// A pure 1 kHz tone: unmistakably synthetic and trivially distinguishable
/// from speech, so a listener can always tell that redaction occurred.
const BEEP_FREQUENCY_HZ: f64 = 1000.0;

/// One sample of the redaction tone, `offset` samples into the tone.
pub(crate) fn tone_sample(offset: usize, sample_rate: f64, volume: f64) -> f32 {
    let t = offset as f64 / sample_rate;
    (volume * (2.0 * PI * BEEP_FREQUENCY_HZ * t).sin()) as f32
}

/// Overwrite every redaction interval's sample range with silence or a tone.
///
/// Consumes the buffer and returns it; the caller does not retain the
/// un-redacted input. An optional whole-buffer gain is applied first.
/// Intervals are clamped and validated independently; they are not assumed
/// to be sorted, though the merger upstream guarantees disjointness.
pub fn apply_redactions(
    mut buf: AudioBuffer,
    intervals: &[RedactionInterval],
    opts: &ProcessingOptions,
) -> AudioBuffer {
    if (opts.audio_volume - 1.0).abs() > f64::EPSILON {
        let gain = opts.audio_volume as f32;
        for channel in &mut buf.channels {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    let rate = buf.sample_rate as f64;
    let len = buf.len() as i64;

    for interval in intervals {
        let start_sample = ((interval.start * rate).floor() as i64).clamp(0, len) as usize;
        let end_sample = ((interval.end * rate).floor() as i64).clamp(0, len) as usize;
        if start_sample >= end_sample {
            continue;
        }

        debug!(
            "Redacting {:.2}s-{:.2}s (samples {}..{}) with {}",
            interval.start, interval.end, start_sample, end_sample, opts.method
        );

        match opts.method {
            RedactionMethod::Mute => {
                for channel in &mut buf.channels {
                    for sample in &mut channel[start_sample..end_sample] {
                        *sample = 0.0;
                    }
                }
            }
            RedactionMethod::Beep => {
                for i in start_sample..end_sample {
                    let tone = tone_sample(i - start_sample, rate, opts.beep_volume);
                    for channel in &mut buf.channels {
                        channel[i] = tone;
                    }
                }
            }
        }
    }

    buf
}
