//! Transmit waveforms: per-pulse frequency/phase modulation.
//!
//! # Design choices
//! - A closed set of tagged variants with one uniform evaluation interface,
//!   `phase_at(t, pulse)`, resolved once at configuration time — never
//!   re-dispatched per sample through runtime type inspection.
//! - Phases follow the baseband convention: the instantaneous frequency of a
//!   linear chirp sweeps from -B/2 to +B/2 over the pulse.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Modulation applied within (and across) pulses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WaveformKind {
    /// Linear FM up-chirp sweeping `bandwidth_hz` over the pulse:
    /// `phi(t) = 2π (−B/2 · t + (B / 2T) · t²)`
    LinearChirp { bandwidth_hz: f64 },
    /// Stepped frequency: pulse `n` is a tone offset by `n · step_hz`.
    SteppedFrequency { step_hz: f64 },
    /// Phase-coded: the pulse is divided into equal chips, each holding a
    /// constant phase from the code sequence (radians).
    PhaseCoded { chips: Vec<f64> },
}

/// A complete pulsed waveform description.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Waveform {
    pub kind: WaveformKind,
    /// Carrier frequency (Hz)
    pub carrier_hz: f64,
    /// Transmitted pulse duration (s)
    pub pulse_duration_s: f64,
    /// Pulse repetition interval (s)
    pub pri_s: f64,
    /// Baseband sample rate (Hz)
    pub sample_rate_hz: f64,
    /// Receive-window samples recorded per pulse
    pub samples_per_pulse: usize,
    /// Pulses per frame
    pub pulses: usize,
}

impl Waveform {
    /// Carrier wavelength (m).
    pub fn wavelength(&self) -> f64 {
        scene_core::SPEED_OF_LIGHT / self.carrier_hz
    }

    /// Range resolution `c / 2B` for chirps; single-tone waveforms resolve
    /// range only through the sample period.
    pub fn range_resolution(&self) -> f64 {
        match self.kind {
            WaveformKind::LinearChirp { bandwidth_hz } => {
                scene_core::SPEED_OF_LIGHT / (2.0 * bandwidth_hz)
            }
            _ => scene_core::SPEED_OF_LIGHT / (2.0 * self.sample_rate_hz),
        }
    }

    /// Duration of the recorded receive window (s).
    pub fn receive_window_s(&self) -> f64 {
        self.samples_per_pulse as f64 / self.sample_rate_hz
    }

    /// Modulation phase at `t` seconds into pulse `pulse`. Zero outside the
    /// transmitted pulse (the envelope gate lives in the synthesizer).
    pub fn phase_at(&self, t: f64, pulse: usize) -> f64 {
        match &self.kind {
            WaveformKind::LinearChirp { bandwidth_hz } => {
                let rate = bandwidth_hz / self.pulse_duration_s;
                2.0 * PI * (-bandwidth_hz / 2.0 * t + 0.5 * rate * t * t)
            }
            WaveformKind::SteppedFrequency { step_hz } => {
                2.0 * PI * (pulse as f64 * step_hz) * t
            }
            WaveformKind::PhaseCoded { chips } => {
                if chips.is_empty() {
                    return 0.0;
                }
                let chip = ((t / self.pulse_duration_s) * chips.len() as f64) as usize;
                chips[chip.min(chips.len() - 1)]
            }
        }
    }

    /// Fail fast on inconsistent parameters, naming the offending one.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.carrier_hz <= 0.0 {
            return Err(ConfigurationError::new(
                "waveform.carrier_hz",
                "carrier frequency must be positive",
            ));
        }
        if self.sample_rate_hz <= 0.0 {
            return Err(ConfigurationError::new(
                "waveform.sample_rate_hz",
                "sample rate must be positive",
            ));
        }
        if self.pulse_duration_s <= 0.0 {
            return Err(ConfigurationError::new(
                "waveform.pulse_duration_s",
                "pulse duration must be positive",
            ));
        }
        if self.pulse_duration_s > self.pri_s {
            return Err(ConfigurationError::new(
                "waveform.pulse_duration_s",
                format!(
                    "pulse duration {:.3e} s exceeds the repetition interval {:.3e} s",
                    self.pulse_duration_s, self.pri_s
                ),
            ));
        }
        if self.samples_per_pulse == 0 {
            return Err(ConfigurationError::new(
                "waveform.samples_per_pulse",
                "at least one sample per pulse is required",
            ));
        }
        if self.receive_window_s() > self.pri_s {
            return Err(ConfigurationError::new(
                "waveform.samples_per_pulse",
                "receive window extends past the pulse repetition interval",
            ));
        }
        if self.pulses == 0 {
            return Err(ConfigurationError::new(
                "waveform.pulses",
                "at least one pulse is required",
            ));
        }
        if let WaveformKind::LinearChirp { bandwidth_hz } = self.kind {
            if bandwidth_hz <= 0.0 {
                return Err(ConfigurationError::new(
                    "waveform.bandwidth_hz",
                    "chirp bandwidth must be positive",
                ));
            }
            if bandwidth_hz > self.sample_rate_hz {
                return Err(ConfigurationError::new(
                    "waveform.bandwidth_hz",
                    "chirp bandwidth exceeds the baseband sample rate",
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn chirp() -> Waveform {
        Waveform {
            kind: WaveformKind::LinearChirp { bandwidth_hz: 1.0e6 },
            carrier_hz: 10.0e9,
            pulse_duration_s: 25.6e-6,
            pri_s: 100.0e-6,
            sample_rate_hz: 10.0e6,
            samples_per_pulse: 256,
            pulses: 64,
        }
    }

    #[test]
    fn chirp_phase_endpoints() {
        let wf = chirp();
        // phi(0) = 0 and phi(T) = 0 for a symmetric -B/2..B/2 sweep
        assert_abs_diff_eq!(wf.phase_at(0.0, 0), 0.0, epsilon = 1e-9);
        let t = wf.pulse_duration_s;
        let expected = 2.0 * PI * (-0.5e6 * t + 0.5 * (1.0e6 / t) * t * t);
        assert_abs_diff_eq!(wf.phase_at(t, 0), expected, epsilon = 1e-6);
        assert_abs_diff_eq!(expected, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn stepped_frequency_advances_per_pulse() {
        let wf = Waveform {
            kind: WaveformKind::SteppedFrequency { step_hz: 1.0e5 },
            ..chirp()
        };
        let t = 1.0e-6;
        assert_abs_diff_eq!(wf.phase_at(t, 0), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            wf.phase_at(t, 3),
            2.0 * PI * 3.0e5 * t,
            epsilon = 1e-6
        );
    }

    #[test]
    fn phase_code_selects_chips() {
        let wf = Waveform {
            kind: WaveformKind::PhaseCoded {
                chips: vec![0.0, PI, 0.0, PI],
            },
            ..chirp()
        };
        let quarter = wf.pulse_duration_s / 4.0;
        assert_abs_diff_eq!(wf.phase_at(0.5 * quarter, 0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wf.phase_at(1.5 * quarter, 0), PI, epsilon = 1e-12);
        // Past the end: clamps to the last chip instead of panicking
        assert_abs_diff_eq!(wf.phase_at(wf.pulse_duration_s * 2.0, 0), PI, epsilon = 1e-12);
    }

    #[test]
    fn duration_longer_than_pri_rejected() {
        let wf = Waveform {
            pulse_duration_s: 200.0e-6,
            ..chirp()
        };
        let err = wf.validate().unwrap_err();
        assert!(err.to_string().contains("pulse_duration_s"));
    }

    #[test]
    fn receive_window_past_pri_rejected() {
        let wf = Waveform {
            samples_per_pulse: 4096,
            ..chirp()
        };
        assert!(wf.validate().is_err());
    }

    #[test]
    fn valid_chirp_passes() {
        assert!(chirp().validate().is_ok());
    }

    #[test]
    fn range_resolution_of_chirp() {
        let wf = chirp();
        assert_abs_diff_eq!(
            wf.range_resolution(),
            scene_core::SPEED_OF_LIGHT / 2.0e6,
            epsilon = 1e-6
        );
    }
}
