//! Scenario definitions.
//!
//! Each scenario is a named configuration of radar, scene, and run options.
//! All scenarios are deterministic given the same seed (the seed only feeds
//! receiver noise, which stays disabled unless a scenario enables it).

use crate::simulator::{RadarConfig, SimOptions};
use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};
use radar_models::{Element, Receiver, Transmitter, Waveform, WaveformKind};
use scene_core::{Material, MotionSpec, RaySampling, Scene, SceneTarget, TargetId, TriMesh};
use serde::{Deserialize, Serialize};

/// Which pre-defined scenario to load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Single reflective plate at 1 km, one pulse — the range sanity check
    PlateAtRange,
    /// Sphere closing at 50 m/s, 64-pulse Doppler stack
    MovingSphere,
    /// Two targets crossing at different ranges and speeds
    TwoTargetCrossing,
    /// Trihedral corner reflector — multi-bounce showcase
    CornerReflector,
    /// Four-wall room for lidar raster scans
    LidarRoom,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub radar: RadarConfig,
    pub scene: Scene,
    pub options: SimOptions,
    pub frame_times: Vec<f64>,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for noise repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::PlateAtRange => Self::plate_at_range(seed),
            ScenarioKind::MovingSphere => Self::moving_sphere(seed),
            ScenarioKind::TwoTargetCrossing => Self::two_target_crossing(seed),
            ScenarioKind::CornerReflector => Self::corner_reflector(seed),
            ScenarioKind::LidarRoom => Self::lidar_room(seed),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 1: PlateAtRange
    // -----------------------------------------------------------------------
    fn plate_at_range(seed: u64) -> Self {
        Scenario {
            name: "plate_at_range".into(),
            seed,
            radar: radar(chirp(1), 1, 1),
            scene: Scene::new(vec![facing_target(
                0,
                1000.0,
                TriMesh::flat_plate(5.0, 5.0, Material::Specular { reflectivity: 1.0 }),
                MotionSpec::Static,
            )]),
            options: narrow_beam(seed),
            frame_times: vec![0.0],
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 2: MovingSphere
    // -----------------------------------------------------------------------
    fn moving_sphere(seed: u64) -> Self {
        Scenario {
            name: "moving_sphere".into(),
            seed,
            radar: radar(chirp(64), 1, 1),
            scene: Scene::new(vec![facing_target(
                0,
                2000.0,
                TriMesh::icosphere(2.0, 3, Material::Specular { reflectivity: 0.9 }),
                MotionSpec::ConstantVelocity {
                    velocity: Vector3::new(-50.0, 0.0, 0.0),
                },
            )]),
            options: narrow_beam(seed),
            frame_times: vec![0.0],
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 3: TwoTargetCrossing
    // -----------------------------------------------------------------------
    fn two_target_crossing(seed: u64) -> Self {
        let near = facing_target(
            0,
            800.0,
            TriMesh::icosphere(1.0, 3, Material::Specular { reflectivity: 1.0 }),
            MotionSpec::ConstantVelocity {
                velocity: Vector3::new(-30.0, 5.0, 0.0),
            },
        );
        let far = facing_target(
            1,
            1500.0,
            TriMesh::icosphere(1.5, 3, Material::Specular { reflectivity: 0.7 }),
            MotionSpec::ConstantVelocity {
                velocity: Vector3::new(40.0, -8.0, 0.0),
            },
        );
        Scenario {
            name: "two_target_crossing".into(),
            seed,
            radar: radar(chirp(64), 1, 2),
            scene: Scene::new(vec![near, far]),
            options: SimOptions {
                sampling: RaySampling::AngularGrid {
                    az_fov: 0.1,
                    el_fov: 0.05,
                    rays_az: 128,
                    rays_el: 64,
                },
                noise_enabled: true,
                noise_seed: seed,
                ..Default::default()
            },
            frame_times: vec![0.0],
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 4: CornerReflector
    // -----------------------------------------------------------------------
    fn corner_reflector(seed: u64) -> Self {
        // Corner opening turned back toward the radar
        let pose = Isometry3::from_parts(
            Translation3::new(1200.0, 0.0, 0.0),
            UnitQuaternion::rotation_between(
                &Vector3::new(1.0, 1.0, 1.0),
                &Vector3::new(-1.0, 0.0, 0.0),
            )
            .unwrap_or_else(UnitQuaternion::identity),
        );
        Scenario {
            name: "corner_reflector".into(),
            seed,
            radar: radar(chirp(16), 1, 1),
            scene: Scene::new(vec![SceneTarget {
                id: TargetId(0),
                mesh: TriMesh::corner_reflector(3.0, Material::Specular { reflectivity: 0.95 }),
                base_pose: pose,
                motion: MotionSpec::Spin {
                    axis: Vector3::z(),
                    rate: 0.05,
                },
            }]),
            options: narrow_beam(seed),
            frame_times: vec![0.0],
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 5: LidarRoom
    // -----------------------------------------------------------------------
    fn lidar_room(seed: u64) -> Self {
        let wall = |id: u32, x: f64, y: f64, yaw: f64| {
            let face = UnitQuaternion::from_axis_angle(
                &Unit::new_normalize(Vector3::y()),
                -std::f64::consts::FRAC_PI_2,
            );
            let yaw_rot =
                UnitQuaternion::from_axis_angle(&Unit::new_normalize(Vector3::z()), yaw);
            SceneTarget {
                id: TargetId(id),
                mesh: TriMesh::flat_plate(12.0, 44.0, Material::Diffuse { reflectivity: 0.6 }),
                base_pose: Isometry3::from_parts(Translation3::new(x, y, 0.0), yaw_rot * face),
                motion: MotionSpec::Static,
            }
        };
        Scenario {
            name: "lidar_room".into(),
            seed,
            radar: radar(chirp(1), 1, 1),
            scene: Scene::new(vec![
                wall(0, 20.0, 0.0, 0.0),
                wall(1, -20.0, 0.0, std::f64::consts::PI),
                wall(2, 0.0, 20.0, std::f64::consts::FRAC_PI_2),
                wall(3, 0.0, -20.0, -std::f64::consts::FRAC_PI_2),
            ]),
            options: SimOptions {
                sampling: RaySampling::LidarRaster {
                    rays_azimuth: 720,
                    rays_elevation: 1,
                    el_fov: 0.0,
                },
                ..Default::default()
            },
            frame_times: vec![0.0],
        }
    }
}

// ---------------------------------------------------------------------------
// Builder helpers
// ---------------------------------------------------------------------------

fn chirp(pulses: usize) -> Waveform {
    Waveform {
        kind: WaveformKind::LinearChirp { bandwidth_hz: 2.0e6 },
        carrier_hz: 10.0e9,
        pulse_duration_s: 25.6e-6,
        pri_s: 100.0e-6,
        sample_rate_hz: 10.0e6,
        samples_per_pulse: 256,
        pulses,
    }
}

fn radar(waveform: Waveform, tx_elements: usize, rx_elements: usize) -> RadarConfig {
    // Half-wavelength stacking for multi-element arrays
    let spacing = waveform.wavelength() / 2.0;
    let element = |i: usize| {
        Element::at_offset(
            Vector3::new(0.0, i as f64 * spacing, 0.0),
            std::sync::Arc::new(radar_models::GainPattern::Omni),
        )
    };
    RadarConfig {
        transmitter: Transmitter {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            elements: (0..tx_elements).map(element).collect(),
            power_dbm: 30.0,
        },
        receiver: Receiver {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            elements: (0..rx_elements).map(element).collect(),
            noise_figure_db: 6.0,
            noise_bandwidth_hz: 10.0e6,
            rf_gain_db: 20.0,
            baseband_gain_db: 20.0,
            load_resistor_ohm: 500.0,
            temperature_k: 290.0,
            polarization: Vector3::zeros(),
        },
        waveform,
    }
}

/// A target on the +x axis at `range`, its local +z facing the radar.
fn facing_target(id: u32, range: f64, mesh: TriMesh, motion: MotionSpec) -> SceneTarget {
    let pose = Isometry3::from_parts(
        Translation3::new(range, 0.0, 0.0),
        UnitQuaternion::from_axis_angle(
            &Unit::new_normalize(Vector3::y()),
            -std::f64::consts::FRAC_PI_2,
        ),
    );
    SceneTarget {
        id: TargetId(id),
        mesh,
        base_pose: pose,
        motion,
    }
}

fn narrow_beam(seed: u64) -> SimOptions {
    SimOptions {
        sampling: RaySampling::AngularGrid {
            az_fov: 0.02,
            el_fov: 0.02,
            rays_az: 48,
            rays_el: 48,
        },
        noise_enabled: false,
        noise_seed: seed,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
