//! The simulator's sole durable output: the complex baseband tensor.
//!
//! Indexed `[channel][pulse][sample]` with the channel axis outermost —
//! downstream processing treats this axis order as fixed. The shape is set
//! once from configuration and never resized mid-run. Each (channel, pulse)
//! cell is a contiguous slab of samples written by exactly one worker, so
//! the parallel fill needs no locking.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BasebandTensor {
    channels: usize,
    pulses: usize,
    samples: usize,
    /// Row-major: `data[(ch * pulses + pulse) * samples + sample]`
    data: Vec<Complex64>,
}

impl BasebandTensor {
    /// All-zero tensor of the given fixed shape.
    pub fn zeros(channels: usize, pulses: usize, samples: usize) -> Self {
        Self {
            channels,
            pulses,
            samples,
            data: vec![Complex64::new(0.0, 0.0); channels * pulses * samples],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn pulses(&self) -> usize {
        self.pulses
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn cell(&self, channel: usize, pulse: usize, sample: usize) -> Complex64 {
        self.data[(channel * self.pulses + pulse) * self.samples + sample]
    }

    /// One pulse's contiguous sample slab.
    pub fn pulse_slab(&self, channel: usize, pulse: usize) -> &[Complex64] {
        let start = (channel * self.pulses + pulse) * self.samples;
        &self.data[start..start + self.samples]
    }

    /// Flat view in the fixed `[channel][pulse][sample]` order.
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    /// Mutable flat view for the parallel fill. Chunking this by `samples()`
    /// yields exactly the per-(channel, pulse) slabs.
    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    /// Total power: `Σ |x|²` over every cell.
    pub fn total_power(&self) -> f64 {
        self.data.iter().map(|c| c.norm_sqr()).sum()
    }

    /// True when every cell is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|c| c.re == 0.0 && c.im == 0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_channel_major() {
        let mut t = BasebandTensor::zeros(2, 3, 4);
        let samples = t.samples();
        let pulses = t.pulses();
        // Write a recognizable value through the flat view
        let idx = (1 * pulses + 2) * samples + 3;
        t.as_mut_slice()[idx] = Complex64::new(7.0, -7.0);
        assert_eq!(t.cell(1, 2, 3), Complex64::new(7.0, -7.0));
        assert_eq!(t.pulse_slab(1, 2)[3], Complex64::new(7.0, -7.0));
    }

    #[test]
    fn zeros_is_zero() {
        let t = BasebandTensor::zeros(2, 2, 8);
        assert!(t.is_zero());
        assert_eq!(t.total_power(), 0.0);
        assert_eq!(t.as_slice().len(), 32);
    }
}
