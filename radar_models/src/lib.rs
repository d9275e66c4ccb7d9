//! `radar_models` — Antenna elements and patterns, waveforms, array descriptors.

pub mod antenna;
pub mod array;
pub mod error;
pub mod waveform;

pub use antenna::{Element, GainPattern};
pub use array::{Receiver, Transmitter};
pub use error::ConfigurationError;
pub use waveform::{Waveform, WaveformKind};
