//! Audio cues for newly arrived events.
//!
//! The server decides *whether* and *what* to play; the browser owns the
//! audio context and plays the [`Tone`] it receives over the event stream
//! with an oscillator and a gain envelope.

use serde::Serialize;

const MIN_FREQUENCY_HZ: f64 = 80.0;
const BASE_FREQUENCY_HZ: f64 = 600.0;
const FREQUENCY_PER_MAG: f64 = 60.0;

const MIN_VOLUME: f64 = 0.05;
const MAX_VOLUME: f64 = 0.3;

const ATTACK_SECS: f64 = 0.05;
const BASE_DECAY_SECS: f64 = 0.5;
const DECAY_PER_MAG_SECS: f64 = 0.2;
const STOP_SECS: f64 = 2.0;

/// Oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
}

/// Parameters for one synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tone {
    pub frequency_hz: f64,
    pub volume: f64,
    pub waveform: Waveform,
    /// Linear ramp from silence to `volume`
    pub attack_secs: f64,
    /// Exponential ramp down to near silence ends here
    pub decay_secs: f64,
    /// Oscillator stop time
    pub stop_secs: f64,
}

impl Tone {
    /// Tone for a magnitude: lower and louder for bigger events, with a
    /// sharper waveform above magnitude 5.
    #[must_use]
    pub fn for_magnitude(mag: f64) -> Self {
        Self {
            frequency_hz: (BASE_FREQUENCY_HZ - mag * FREQUENCY_PER_MAG).max(MIN_FREQUENCY_HZ),
            volume: ((mag - 2.0) / 20.0).clamp(MIN_VOLUME, MAX_VOLUME),
            waveform: if mag > 5.0 {
                Waveform::Triangle
            } else {
                Waveform::Sine
            },
            attack_secs: ATTACK_SECS,
            decay_secs: BASE_DECAY_SECS + mag * DECAY_PER_MAG_SECS,
            stop_secs: STOP_SECS,
        }
    }
}

/// Gatekeeper for audio cues.
///
/// `enabled` is the user's toggle; `armed` is set once a browser has an
/// audio context (created after a user gesture).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ToneEmitter {
    pub enabled: bool,
    pub armed: bool,
}

impl ToneEmitter {
    /// Tone to play for `mag`, or `None` when cues are off.
    #[must_use]
    pub fn emit(&self, mag: Option<f64>) -> Option<Tone> {
        if !self.enabled || !self.armed {
            return None;
        }
        // Missing magnitudes play the quietest tone
        Some(Tone::for_magnitude(mag.filter(|m| m.is_finite()).unwrap_or(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_shape() {
        let small = Tone::for_magnitude(3.0);
        assert!((small.frequency_hz - 420.0).abs() < 1e-9);
        assert!((small.volume - 0.05).abs() < 1e-9);
        assert_eq!(small.waveform, Waveform::Sine);
        assert!((small.decay_secs - 1.1).abs() < 1e-9);

        let big = Tone::for_magnitude(9.0);
        assert!((big.frequency_hz - 80.0).abs() < 1e-9);
        assert!((big.volume - 0.3).abs() < 1e-9);
        assert_eq!(big.waveform, Waveform::Triangle);
    }

    #[test]
    fn test_frequency_decreases_with_magnitude() {
        let a = Tone::for_magnitude(2.5);
        let b = Tone::for_magnitude(4.5);
        let c = Tone::for_magnitude(6.5);
        assert!(a.frequency_hz > b.frequency_hz && b.frequency_hz > c.frequency_hz);
        assert!(a.volume <= b.volume && b.volume <= c.volume);
    }

    #[test]
    fn test_waveform_switch_is_strict() {
        assert_eq!(Tone::for_magnitude(5.0).waveform, Waveform::Sine);
        assert_eq!(Tone::for_magnitude(5.01).waveform, Waveform::Triangle);
    }

    #[test]
    fn test_emitter_gates() {
        let off = ToneEmitter::default();
        assert!(off.emit(Some(6.0)).is_none());

        let unarmed = ToneEmitter { enabled: true, armed: false };
        assert!(unarmed.emit(Some(6.0)).is_none());

        let on = ToneEmitter { enabled: true, armed: true };
        assert!(on.emit(Some(6.0)).is_some());
        assert!(on.emit(None).is_some());
    }
}
