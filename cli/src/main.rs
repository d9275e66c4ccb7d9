//! `raysim` CLI: scenario runs, RCS sweeps, lidar scans.

use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::Vector3;
use scene_core::{lidar_scene, rcs_sbr, Material, RcsOptions, SummationMode, TraceConfig, TriMesh};
use sim::{run_simulator, Scenario, ScenarioKind};
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "raysim", about = "Ray-traced radar scene simulator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario and report tensor statistics.
    Simulate {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Noise seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Force receiver noise on regardless of the scenario default
        #[arg(long)]
        noise: bool,
        /// Write run metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Dump the raw IQ tensor (little-endian f64 re/im pairs,
        /// channel-major) to a binary file
        #[arg(long)]
        dump_iq: Option<PathBuf>,
    },
    /// Estimate the RCS of a canonical shape over a ray-density sweep.
    Rcs {
        #[arg(value_enum)]
        shape: Shape,
        /// Shape dimension: sphere radius / plate side / corner edge (m)
        #[arg(long, default_value_t = 1.0)]
        size: f64,
        /// Radar frequency (GHz)
        #[arg(long, default_value_t = 10.0)]
        frequency_ghz: f64,
        /// Maximum bounce count
        #[arg(long, default_value_t = 3)]
        bounces: u32,
        /// Use coherent bounce summation instead of incoherent
        #[arg(long)]
        coherent: bool,
    },
    /// Raster-scan the lidar room scenario and dump hit records.
    LidarScan {
        /// Write hit records to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Scan timestamp (s)
        #[arg(long, default_value_t = 0.0)]
        time: f64,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum Shape {
    Sphere,
    Plate,
    Corner,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            scenario,
            seed,
            noise,
            output,
            dump_iq,
        } => run_simulate(scenario, seed, noise, output.as_deref(), dump_iq.as_deref())?,
        Commands::Rcs {
            shape,
            size,
            frequency_ghz,
            bounces,
            coherent,
        } => run_rcs(shape, size, frequency_ghz, bounces, coherent),
        Commands::LidarScan { output, time } => run_lidar(output.as_deref(), time)?,
    }

    Ok(())
}

fn run_simulate(
    kind: ScenarioKind,
    seed: u64,
    force_noise: bool,
    output: Option<&std::path::Path>,
    dump_iq: Option<&std::path::Path>,
) -> Result<()> {
    let mut scenario = Scenario::build(kind, seed);
    if force_noise {
        scenario.options.noise_enabled = true;
        scenario.options.noise_seed = seed;
    }

    println!(
        "Running scenario '{}' (seed={}, frames={})...",
        scenario.name,
        seed,
        scenario.frame_times.len()
    );

    let start = std::time::Instant::now();
    let tensor = run_simulator(
        scenario.radar,
        scenario.scene,
        &scenario.frame_times,
        scenario.options,
    )?;
    let elapsed = start.elapsed();

    let peak = tensor
        .as_slice()
        .iter()
        .map(|c| c.norm())
        .fold(0.0, f64::max);
    println!(
        "Done: {}×{}×{} tensor, total power {:.3e}, peak |x| {:.3e}, elapsed={:.2}s",
        tensor.channels(),
        tensor.pulses(),
        tensor.samples(),
        tensor.total_power(),
        peak,
        elapsed.as_secs_f64(),
    );

    if let Some(path) = dump_iq {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        for cell in tensor.as_slice() {
            writer.write_f64::<LittleEndian>(cell.re)?;
            writer.write_f64::<LittleEndian>(cell.im)?;
        }
        println!("IQ tensor dumped to {}", path.display());
    }

    if let Some(path) = output {
        let json = serde_json::json!({
            "scenario": scenario.name,
            "seed": seed,
            "elapsed_s": elapsed.as_secs_f64(),
            "channels": tensor.channels(),
            "pulses": tensor.pulses(),
            "samples": tensor.samples(),
            "total_power": tensor.total_power(),
            "peak_magnitude": peak,
        });
        std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", path.display());
    }

    Ok(())
}

fn run_rcs(shape: Shape, size: f64, frequency_ghz: f64, bounces: u32, coherent: bool) {
    let material = Material::Specular { reflectivity: 1.0 };
    let mesh = match shape {
        Shape::Sphere => TriMesh::icosphere(size, 4, material),
        Shape::Plate => TriMesh::flat_plate(size, size, material),
        Shape::Corner => TriMesh::corner_reflector(size, material),
    };
    let incident = match shape {
        // Hit plates broadside, corners down the open diagonal
        Shape::Plate => -Vector3::z(),
        Shape::Corner => Vector3::new(-1.0, -1.0, -1.0).normalize(),
        Shape::Sphere => Vector3::x(),
    };
    let frequency_hz = frequency_ghz * 1.0e9;
    let summation = if coherent {
        SummationMode::Coherent
    } else {
        SummationMode::Incoherent
    };

    println!(
        "Monostatic RCS sweep ({:?}, size {size} m, {frequency_ghz} GHz, {} summation):",
        shape,
        if coherent { "coherent" } else { "incoherent" }
    );
    for rays_per_side in [32, 64, 128, 256] {
        let options = RcsOptions {
            rays_per_side,
            trace: TraceConfig {
                max_bounces: bounces,
                min_energy: 1e-6,
            },
            summation,
        };
        let dbsm = rcs_sbr(
            &mesh,
            incident,
            -incident,
            frequency_hz,
            Vector3::zeros(),
            &options,
        );
        println!("  {:>4} rays/side: {:+8.2} dBsm", rays_per_side, dbsm);
    }
}

fn run_lidar(output: Option<&std::path::Path>, time: f64) -> Result<()> {
    let scenario = Scenario::build(ScenarioKind::LidarRoom, 0);
    let sampling = scene_core::RaySampling::LidarRaster {
        rays_azimuth: 720,
        rays_elevation: 1,
        el_fov: 0.0,
    };
    let records = lidar_scene(
        &scenario.scene,
        &nalgebra::Isometry3::identity(),
        &sampling,
        time,
        100.0,
        None,
    );

    let mean_range = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.range).sum::<f64>() / records.len() as f64
    };
    println!(
        "Lidar scan at t={time:.2}s: {} returns, mean range {:.2} m",
        records.len(),
        mean_range
    );

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&records)?)?;
        println!("Hit records saved to {}", path.display());
    }

    Ok(())
}
