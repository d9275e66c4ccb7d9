//! Per-pulse baseband synthesis.
//!
//! For every (channel, pulse, sample) cell the synthesizer sums, over all
//! scattering contributions of that pulse:
//!
//! ```text
//! amplitude · g_tx · g_rx · exp(j(−2π f_c τ + φ_waveform(t − τ) + 2π f_d t))
//! ```
//!
//! The delay τ is re-resolved per channel from the actual element positions
//! (first leg to the transmit element, last leg from the receive element),
//! so inter-element phase structure emerges from geometry rather than from a
//! separate steering model. Free-space loss divides by the total path
//! length, accumulated over the full multi-bounce path.
//!
//! Slow-time Doppler appears through the per-pulse delays — each pulse sees
//! the scene frozen at its own timestamp — while the intra-pulse term
//! `2π f_d t` is applied explicitly.

use num_complex::Complex64;
use radar_models::{Receiver, Transmitter, Waveform};
use rand::Rng;
use rand_distr::StandardNormal;
use scene_core::{ScatteringContribution, SPEED_OF_LIGHT};

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// Noise amplitude (per complex sample, one standard deviation of the total
/// complex magnitude): thermal noise power `k_B · T · B · F` converted to a
/// voltage across the load resistor and amplified by the receiver chain.
pub fn noise_sigma(rx: &Receiver) -> f64 {
    (BOLTZMANN * rx.temperature_k * rx.noise_bandwidth_hz * rx.noise_factor()).sqrt()
        * rx.channel_voltage_gain()
}

/// Synthesize one (channel, pulse) slab of samples in place.
///
/// `pulse_in_frame` is the within-frame pulse index driving pulse-dependent
/// modulation (stepped frequency).
#[allow(clippy::too_many_arguments)]
pub fn synthesize_pulse(
    slab: &mut [Complex64],
    contributions: &[ScatteringContribution],
    tx: &Transmitter,
    tx_element: usize,
    rx: &Receiver,
    rx_element: usize,
    waveform: &Waveform,
    pulse_in_frame: usize,
) {
    let fs = waveform.sample_rate_hz;
    let fc = waveform.carrier_hz;
    let pulse_duration = waveform.pulse_duration_s;
    let tx_pos = tx.element_position(tx_element);
    let rx_pos = rx.element_position(rx_element);
    // Amplitude scale shared by every contribution on this channel
    let power_amp = 10.0_f64.powf((tx.power_dbm - 30.0) / 20.0);
    let chain_amp = rx.channel_voltage_gain();

    for contribution in contributions {
        let to_first = contribution.first_point - tx_pos;
        let from_last = rx_pos - contribution.last_point;
        let d_tx = to_first.norm();
        let d_rx = from_last.norm();
        if d_tx < 1e-9 || d_rx < 1e-9 {
            continue; // zero-length leg: degenerate, skip
        }
        let total_path = d_tx + contribution.mid_path_len + d_rx;
        let tau = total_path / SPEED_OF_LIGHT;

        let (tx_az, tx_el) = tx.direction_angles(&(to_first / d_tx));
        let (rx_az, rx_el) = rx.direction_angles(&(-from_last / d_rx));
        let g_tx = tx.elements[tx_element].pattern.gain_amplitude(tx_az, tx_el);
        let g_rx = rx.elements[rx_element].pattern.gain_amplitude(rx_az, rx_el);

        let amp = contribution.amplitude * g_tx * g_rx * power_amp * chain_amp / total_path;
        let carrier_phase = -(2.0 * std::f64::consts::PI) * fc * tau;
        let doppler = 2.0 * std::f64::consts::PI * contribution.doppler_hz;

        // Only samples inside the delayed pulse window are non-zero.
        let start = (tau * fs).ceil().max(0.0) as usize;
        let end = (((tau + pulse_duration) * fs).ceil() as usize).min(slab.len());
        for s in start..end {
            let t_sample = s as f64 / fs;
            let t_rel = t_sample - tau;
            if t_rel < 0.0 || t_rel >= pulse_duration {
                continue;
            }
            let phase =
                carrier_phase + waveform.phase_at(t_rel, pulse_in_frame) + doppler * t_sample;
            slab[s] += Complex64::from_polar(amp, phase);
        }
    }
}

/// Add zero-mean complex Gaussian noise to a slab. The caller provides an
/// explicitly seeded generator so runs stay reproducible.
pub fn add_noise<R: Rng>(slab: &mut [Complex64], sigma: f64, rng: &mut R) {
    let per_component = sigma / 2.0_f64.sqrt();
    for cell in slab {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        *cell += Complex64::new(re * per_component, im * per_component);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
