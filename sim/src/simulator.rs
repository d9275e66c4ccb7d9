//! Orchestrator: drives ray generation, tracing, accumulation and baseband
//! synthesis over the full channel × pulse × sample tensor.
//!
//! # State machine
//! `Idle → Configured → Running → {Completed, Failed}`
//!
//! `Configured` validates waveform/array/scene consistency and fails fast.
//! `Running` iterates pulses in increasing absolute time — pulse *n* of
//! frame *f* starts at `frame_times[f] + n · PRI` — because target motion is
//! time-dependent and later pulses must see later scene states. Each pulse's
//! workers get their own immutable scene snapshot at that pulse's timestamp;
//! nothing walks a mutable scene concurrently.
//!
//! # Parallelism
//! Embarrassingly parallel across pulses (snapshot + trace + accumulate) and
//! across (channel, pulse) slabs (synthesis). Every tensor cell is written by
//! exactly one worker; no locks. Cancellation is cooperative and checked at
//! pulse granularity, never per ray.

use crate::baseband::{add_noise, noise_sigma, synthesize_pulse};
use crate::error::SimulationError;
use crate::tensor::BasebandTensor;
use radar_models::{ConfigurationError, Receiver, Transmitter, Waveform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use scene_core::rcs::accumulate_contribution;
use scene_core::{generate_rays, trace, RaySampling, ScatteringContribution, Scene, TraceConfig};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The full radar description: transmit array, receive array, waveform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RadarConfig {
    pub transmitter: Transmitter,
    pub receiver: Receiver,
    pub waveform: Waveform,
}

impl RadarConfig {
    /// Channel count: transmit elements × receive elements.
    pub fn channels(&self) -> usize {
        self.transmitter.elements.len() * self.receiver.elements.len()
    }
}

/// Run-level options: ray density, bounce budget, noise injection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimOptions {
    /// Ray coverage of the field of view. Density is a tunable trade between
    /// runtime and RCS-estimate variance.
    pub sampling: RaySampling,
    pub trace: TraceConfig,
    /// Inject receiver noise into the output tensor
    pub noise_enabled: bool,
    /// Explicit noise seed; same seed, same tensor
    pub noise_seed: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            sampling: RaySampling::AngularGrid {
                az_fov: 0.35, // ≈ 20°
                el_fov: 0.35,
                rays_az: 64,
                rays_el: 64,
            },
            trace: TraceConfig::default(),
            noise_enabled: false,
            noise_seed: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation handle, checked once per pulse. Bounds the
/// cancellation latency to one time-step without per-ray overhead.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Orchestrator lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimState {
    Idle,
    Configured,
    Running,
    Completed,
    Failed,
}

/// The simulation orchestrator. Owns the output tensor for the duration of
/// one run; ownership transfers to the caller on completion.
pub struct Simulator {
    pub radar: RadarConfig,
    pub scene: Scene,
    pub options: SimOptions,
    state: SimState,
}

impl Simulator {
    pub fn new(radar: RadarConfig, scene: Scene, options: SimOptions) -> Self {
        Self {
            radar,
            scene,
            options,
            state: SimState::Idle,
        }
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Validate the full configuration. Fails fast before any trace work.
    pub fn configure(&mut self) -> Result<(), SimulationError> {
        let result = self.validate();
        self.state = match result {
            Ok(()) => SimState::Configured,
            Err(_) => SimState::Failed,
        };
        result
    }

    fn validate(&self) -> Result<(), SimulationError> {
        self.radar.waveform.validate()?;
        self.radar.transmitter.validate()?;
        self.radar.receiver.validate()?;
        if self.radar.channels() == 0 {
            return Err(ConfigurationError::new(
                "radar.channels",
                "transmit × receive element count must be at least one channel",
            )
            .into());
        }
        self.scene.validate()?;
        Ok(())
    }

    /// Run to completion (no external cancellation).
    pub fn run(&mut self, frame_times: &[f64]) -> Result<BasebandTensor, SimulationError> {
        self.run_cancellable(frame_times, &CancelToken::new())
    }

    /// Run with cooperative cancellation. On any error the state is `Failed`
    /// and no partial tensor escapes.
    pub fn run_cancellable(
        &mut self,
        frame_times: &[f64],
        cancel: &CancelToken,
    ) -> Result<BasebandTensor, SimulationError> {
        if self.state != SimState::Configured {
            self.configure()?;
        }
        if frame_times.is_empty() {
            self.state = SimState::Failed;
            return Err(ConfigurationError::new(
                "frame_times",
                "at least one frame start time is required",
            )
            .into());
        }
        if frame_times.windows(2).any(|w| w[1] <= w[0]) {
            self.state = SimState::Failed;
            return Err(ConfigurationError::new(
                "frame_times",
                "frame start times must be strictly ascending",
            )
            .into());
        }

        self.state = SimState::Running;

        let waveform = &self.radar.waveform;
        let pulses_per_frame = waveform.pulses;
        let total_pulses = frame_times.len() * pulses_per_frame;
        let wavelength = waveform.wavelength();
        let tx = &self.radar.transmitter;
        let rx = &self.radar.receiver;

        // ----------------------------------------------------------------
        // Stage 1: per-pulse trace + accumulate, in increasing time order.
        // Each worker builds its own immutable snapshot at the pulse's
        // absolute timestamp; the scene itself is read-only throughout.
        // ----------------------------------------------------------------
        let scene = &self.scene;
        let options = &self.options;
        let per_pulse: Vec<Option<Vec<ScatteringContribution>>> = (0..total_pulses)
            .into_par_iter()
            .map(|global_pulse| {
                if cancel.is_cancelled() {
                    return None;
                }
                let frame = global_pulse / pulses_per_frame;
                let pulse = global_pulse % pulses_per_frame;
                let t = frame_times[frame] + pulse as f64 * waveform.pri_s;

                let snapshot = scene.snapshot(t);
                if snapshot.is_empty() {
                    return Some(Vec::new());
                }
                let rays = generate_rays(tx.position, tx.boresight(), &options.sampling);
                let contributions = rays
                    .into_iter()
                    .filter_map(|ray| trace(&snapshot, ray, &options.trace))
                    .filter_map(|path| {
                        accumulate_contribution(
                            &snapshot,
                            &path,
                            &tx.position,
                            &rx.position,
                            wavelength,
                            &rx.polarization,
                        )
                    })
                    .collect();
                Some(contributions)
            })
            .collect();

        let mut pulse_contributions = Vec::with_capacity(total_pulses);
        for entry in per_pulse {
            match entry {
                Some(c) => pulse_contributions.push(c),
                None => {
                    self.state = SimState::Failed;
                    return Err(SimulationError::Cancelled);
                }
            }
        }

        tracing::debug!(
            pulses = total_pulses,
            scatterers = pulse_contributions.iter().map(Vec::len).sum::<usize>(),
            "trace stage complete"
        );

        // ----------------------------------------------------------------
        // Stage 2: synthesize every (channel, pulse) slab. Disjoint slabs,
        // one worker each — the tensor needs no locking.
        // ----------------------------------------------------------------
        let channels = self.radar.channels();
        let samples = waveform.samples_per_pulse;
        let n_rx = rx.elements.len();
        let noise_enabled = self.options.noise_enabled;
        let noise_seed = self.options.noise_seed;
        let sigma = noise_sigma(rx);

        let mut tensor = BasebandTensor::zeros(channels, total_pulses, samples);
        tensor
            .as_mut_slice()
            .par_chunks_mut(samples)
            .enumerate()
            .for_each(|(slab_index, slab)| {
                let channel = slab_index / total_pulses;
                let global_pulse = slab_index % total_pulses;
                let tx_element = channel / n_rx;
                let rx_element = channel % n_rx;
                let pulse_in_frame = global_pulse % pulses_per_frame;

                synthesize_pulse(
                    slab,
                    &pulse_contributions[global_pulse],
                    tx,
                    tx_element,
                    rx,
                    rx_element,
                    waveform,
                    pulse_in_frame,
                );

                if noise_enabled {
                    // Per-slab stream derived from the explicit seed: stable
                    // under any parallel execution order.
                    let mut rng = ChaCha8Rng::seed_from_u64(
                        noise_seed ^ (slab_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
                    );
                    add_noise(slab, sigma, &mut rng);
                }
            });

        self.state = SimState::Completed;
        Ok(tensor)
    }
}

/// The primary entry point: configure, run, and hand the tensor to the
/// caller. Fails with `Configuration`/`Geometry` errors before any trace
/// work; never returns a partially filled tensor.
pub fn run_simulator(
    radar: RadarConfig,
    scene: Scene,
    frame_times: &[f64],
    options: SimOptions,
) -> Result<BasebandTensor, SimulationError> {
    Simulator::new(radar, scene, options).run(frame_times)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};
    use num_complex::Complex64;
    use radar_models::{Element, WaveformKind};
    use rustfft::FftPlanner;
    use scene_core::{Material, MotionSpec, SceneTarget, TargetId, TriMesh, SPEED_OF_LIGHT};

    fn chirp_waveform(pulses: usize) -> Waveform {
        Waveform {
            kind: WaveformKind::LinearChirp { bandwidth_hz: 1.0e6 },
            carrier_hz: 10.0e9,
            pulse_duration_s: 25.6e-6,
            pri_s: 100.0e-6,
            sample_rate_hz: 10.0e6,
            samples_per_pulse: 256,
            pulses,
        }
    }

    fn single_channel_radar(pulses: usize) -> RadarConfig {
        RadarConfig {
            transmitter: Transmitter {
                position: Point3::origin(),
                orientation: UnitQuaternion::identity(),
                elements: vec![Element::omni()],
                power_dbm: 30.0,
            },
            receiver: Receiver {
                position: Point3::origin(),
                orientation: UnitQuaternion::identity(),
                elements: vec![Element::omni()],
                noise_figure_db: 6.0,
                noise_bandwidth_hz: 10.0e6,
                rf_gain_db: 0.0,
                baseband_gain_db: 0.0,
                load_resistor_ohm: 1.0,
                temperature_k: 290.0,
                polarization: Vector3::zeros(),
            },
            waveform: chirp_waveform(pulses),
        }
    }

    /// A facet target at `range` on the +x axis, facing the radar.
    fn facet_scene(range: f64, motion: MotionSpec) -> Scene {
        let pose = Isometry3::from_parts(
            Translation3::new(range, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(
                &Unit::new_normalize(Vector3::y()),
                -std::f64::consts::FRAC_PI_2,
            ),
        );
        Scene::new(vec![SceneTarget {
            id: TargetId(0),
            mesh: TriMesh::flat_plate(5.0, 5.0, Material::Specular { reflectivity: 1.0 }),
            base_pose: pose,
            motion,
        }])
    }

    fn tight_sampling() -> SimOptions {
        SimOptions {
            sampling: RaySampling::AngularGrid {
                az_fov: 0.02,
                el_fov: 0.02,
                rays_az: 32,
                rays_el: 32,
            },
            ..Default::default()
        }
    }

    fn fft(buf: &mut [Complex64]) {
        FftPlanner::new().plan_fft_forward(buf.len()).process(buf);
    }

    #[test]
    fn noise_off_runs_are_bit_identical() {
        let scene = facet_scene(1000.0, MotionSpec::Static);
        let a = run_simulator(single_channel_radar(2), scene.clone(), &[0.0], tight_sampling())
            .expect("run a");
        let b = run_simulator(single_channel_radar(2), scene, &[0.0], tight_sampling())
            .expect("run b");
        assert_eq!(a.as_slice().len(), b.as_slice().len());
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert_eq!(x.re.to_bits(), y.re.to_bits(), "real parts must match bitwise");
            assert_eq!(x.im.to_bits(), y.im.to_bits(), "imag parts must match bitwise");
        }
    }

    #[test]
    fn noise_seeded_runs_are_reproducible() {
        let scene = facet_scene(1000.0, MotionSpec::Static);
        let mut options = tight_sampling();
        options.noise_enabled = true;
        options.noise_seed = 1234;
        let a = run_simulator(single_channel_radar(1), scene.clone(), &[0.0], options.clone())
            .expect("run a");
        let b = run_simulator(single_channel_radar(1), scene.clone(), &[0.0], options.clone())
            .expect("run b");
        assert_eq!(a.as_slice(), b.as_slice(), "same seed, same noise");

        options.noise_seed = 4321;
        let c = run_simulator(single_channel_radar(1), scene, &[0.0], options).expect("run c");
        assert_ne!(a.as_slice(), c.as_slice(), "different seed, different noise");
    }

    #[test]
    fn zero_targets_yield_zero_tensor() {
        let tensor = run_simulator(
            single_channel_radar(2),
            Scene::default(),
            &[0.0],
            SimOptions::default(),
        )
        .expect("empty scene is not an error");
        assert_eq!(tensor.channels(), 1);
        assert_eq!(tensor.pulses(), 2);
        assert!(tensor.is_zero());
    }

    #[test]
    fn zero_targets_with_noise_is_noise_only() {
        let mut options = SimOptions::default();
        options.noise_enabled = true;
        options.noise_seed = 7;
        let tensor = run_simulator(single_channel_radar(1), Scene::default(), &[0.0], options)
            .expect("empty scene is not an error");
        assert!(!tensor.is_zero(), "noise must fill the tensor");
    }

    #[test]
    fn dimension_errors_fail_fast() {
        let mut radar = single_channel_radar(1);
        radar.waveform.pulse_duration_s = radar.waveform.pri_s * 2.0;
        let err = run_simulator(radar, Scene::default(), &[0.0], SimOptions::default())
            .expect_err("waveform longer than PRI must fail");
        assert!(matches!(err, SimulationError::Configuration(_)));

        let mut radar = single_channel_radar(1);
        radar.receiver.elements.clear();
        let err = run_simulator(radar, Scene::default(), &[0.0], SimOptions::default())
            .expect_err("empty receive array must fail");
        assert!(err.to_string().contains("receiver.elements"));
    }

    #[test]
    fn unordered_frame_times_rejected() {
        let err = run_simulator(
            single_channel_radar(1),
            Scene::default(),
            &[0.1, 0.0],
            SimOptions::default(),
        )
        .expect_err("descending frame times must fail");
        assert!(matches!(err, SimulationError::Configuration(_)));
    }

    #[test]
    fn cancellation_yields_no_tensor() {
        let token = CancelToken::new();
        token.cancel();
        let mut simulator = Simulator::new(
            single_channel_radar(4),
            facet_scene(1000.0, MotionSpec::Static),
            tight_sampling(),
        );
        let err = simulator
            .run_cancellable(&[0.0], &token)
            .expect_err("pre-cancelled run must not produce a tensor");
        assert!(matches!(err, SimulationError::Cancelled));
        assert_eq!(simulator.state(), SimState::Failed);
    }

    #[test]
    fn state_machine_reaches_completed() {
        let mut simulator = Simulator::new(
            single_channel_radar(1),
            facet_scene(1000.0, MotionSpec::Static),
            tight_sampling(),
        );
        assert_eq!(simulator.state(), SimState::Idle);
        simulator.configure().expect("valid configuration");
        assert_eq!(simulator.state(), SimState::Configured);
        simulator.run(&[0.0]).expect("run");
        assert_eq!(simulator.state(), SimState::Completed);
    }

    /// Dechirp pulse 0 against the reference chirp and FFT: the beat
    /// frequency maps back to the target range.
    fn recovered_range(tensor: &BasebandTensor, waveform: &Waveform) -> f64 {
        let slab = tensor.pulse_slab(0, 0);
        let n = slab.len();
        let fs = waveform.sample_rate_hz;
        let mut buf: Vec<Complex64> = (0..n)
            .map(|s| {
                let t = s as f64 / fs;
                let reference = Complex64::from_polar(1.0, waveform.phase_at(t, 0));
                slab[s] * reference.conj()
            })
            .collect();
        fft(&mut buf);
        let peak = buf
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm_sqr().partial_cmp(&b.1.norm_sqr()).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        // Map FFT bins to signed beat frequency, then to range:
        // f_beat = −kτ with k = B/T, so range = |f| · c · T / (2B).
        let freq = if peak <= n / 2 {
            peak as f64 * fs / n as f64
        } else {
            (peak as f64 - n as f64) * fs / n as f64
        };
        let bandwidth = match waveform.kind {
            WaveformKind::LinearChirp { bandwidth_hz } => bandwidth_hz,
            _ => unreachable!("range recovery test uses a chirp"),
        };
        freq.abs() * SPEED_OF_LIGHT * waveform.pulse_duration_s / (2.0 * bandwidth)
    }

    #[test]
    fn static_facet_range_recovered_within_one_bin() {
        let range = 1000.0;
        let radar = single_channel_radar(1);
        let tensor = run_simulator(
            radar.clone(),
            facet_scene(range, MotionSpec::Static),
            &[0.0],
            tight_sampling(),
        )
        .expect("run");

        let estimated = recovered_range(&tensor, &radar.waveform);
        // One FFT bin of beat frequency maps to this much range
        let n = radar.waveform.samples_per_pulse as f64;
        let bin_range = radar.waveform.sample_rate_hz / n * SPEED_OF_LIGHT
            * radar.waveform.pulse_duration_s
            / (2.0 * 1.0e6);
        assert!(
            (estimated - range).abs() <= bin_range,
            "recovered range {estimated:.1} m should be within one bin ({bin_range:.1} m) of {range:.1} m"
        );
    }

    #[test]
    fn closing_target_doppler_recovered_within_one_bin() {
        let velocity = 15.0; // m/s toward the radar
        let pulses = 64;
        let radar = single_channel_radar(pulses);
        let scene = facet_scene(
            1000.0,
            MotionSpec::ConstantVelocity {
                velocity: Vector3::new(-velocity, 0.0, 0.0),
            },
        );
        let tensor =
            run_simulator(radar.clone(), scene, &[0.0], tight_sampling()).expect("run");

        // Slow-time FFT at the sample where the echo lives
        let tau = 2.0 * 1000.0 / SPEED_OF_LIGHT;
        let sample = (tau * radar.waveform.sample_rate_hz).ceil() as usize + 4;
        let mut slow_time: Vec<Complex64> = (0..pulses)
            .map(|p| tensor.cell(0, p, sample))
            .collect();
        fft(&mut slow_time);
        let peak = slow_time
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm_sqr().partial_cmp(&b.1.norm_sqr()).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        let prf = 1.0 / radar.waveform.pri_s;
        let doppler = if peak <= pulses / 2 {
            peak as f64 * prf / pulses as f64
        } else {
            (peak as f64 - pulses as f64) * prf / pulses as f64
        };
        let expected = 2.0 * velocity / radar.waveform.wavelength();
        let bin = prf / pulses as f64;
        assert!(
            (doppler - expected).abs() <= bin,
            "recovered Doppler {doppler:.1} Hz should be within one bin ({bin:.1} Hz) of {expected:.1} Hz"
        );
    }

    #[test]
    fn two_element_receiver_doubles_channels() {
        let mut radar = single_channel_radar(1);
        radar.receiver.elements = vec![
            Element::omni(),
            Element::at_offset(
                Vector3::new(0.0, 0.015, 0.0),
                std::sync::Arc::new(radar_models::GainPattern::Omni),
            ),
        ];
        let tensor = run_simulator(
            radar,
            facet_scene(1000.0, MotionSpec::Static),
            &[0.0],
            tight_sampling(),
        )
        .expect("run");
        assert_eq!(tensor.channels(), 2);
        // Both channels must carry the echo
        assert!(tensor.pulse_slab(0, 0).iter().any(|c| c.norm() > 0.0));
        assert!(tensor.pulse_slab(1, 0).iter().any(|c| c.norm() > 0.0));
    }
}
