//! Transmitter and receiver array descriptors.
//!
//! Both arrays share the same geometry model: a phase centre, a boresight
//! orientation, and a list of elements offset from the centre. The channel
//! dimension of the output tensor is the cross product of transmit and
//! receive elements.

use crate::antenna::Element;
use crate::error::ConfigurationError;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// The transmit array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transmitter {
    /// Array phase centre (world frame, m)
    pub position: Point3<f64>,
    /// Boresight orientation: local +x is the look direction
    pub orientation: UnitQuaternion<f64>,
    pub elements: Vec<Element>,
    /// Transmit power (dBm); folded into the overall amplitude scale
    pub power_dbm: f64,
}

/// The receive array, with the front-end noise description.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Receiver {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub elements: Vec<Element>,
    /// Receiver noise figure (dB)
    pub noise_figure_db: f64,
    /// Noise-equivalent bandwidth (Hz)
    pub noise_bandwidth_hz: f64,
    /// RF front-end gain (dB), ahead of the mixer
    pub rf_gain_db: f64,
    /// Baseband voltage gain (dB)
    pub baseband_gain_db: f64,
    /// Load resistance (Ω) converting received power to voltage
    pub load_resistor_ohm: f64,
    /// System noise temperature (K)
    pub temperature_k: f64,
    /// Receive polarization filter (world frame); a near-zero vector means
    /// unpolarized reception
    pub polarization: Vector3<f64>,
}

impl Transmitter {
    /// Boresight direction in the world frame.
    pub fn boresight(&self) -> Vector3<f64> {
        self.orientation * Vector3::x()
    }

    /// World position of element `i`.
    pub fn element_position(&self, i: usize) -> Point3<f64> {
        self.position + self.orientation * self.elements[i].offset
    }

    /// (azimuth, elevation) of a world direction in this array's frame.
    pub fn direction_angles(&self, dir_world: &Vector3<f64>) -> (f64, f64) {
        local_angles(&self.orientation, dir_world)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.elements.is_empty() {
            return Err(ConfigurationError::new(
                "transmitter.elements",
                "the transmit array needs at least one element",
            ));
        }
        for (i, el) in self.elements.iter().enumerate() {
            el.pattern.validate(&format!("transmitter.elements[{i}].pattern"))?;
        }
        Ok(())
    }
}

impl Receiver {
    pub fn boresight(&self) -> Vector3<f64> {
        self.orientation * Vector3::x()
    }

    pub fn element_position(&self, i: usize) -> Point3<f64> {
        self.position + self.orientation * self.elements[i].offset
    }

    pub fn direction_angles(&self, dir_world: &Vector3<f64>) -> (f64, f64) {
        local_angles(&self.orientation, dir_world)
    }

    /// Linear noise factor `F`.
    pub fn noise_factor(&self) -> f64 {
        10.0_f64.powf(self.noise_figure_db / 10.0)
    }

    /// Combined voltage gain of the RF and baseband stages, including the
    /// power-to-voltage conversion across the load resistor.
    pub fn channel_voltage_gain(&self) -> f64 {
        10.0_f64.powf((self.rf_gain_db + self.baseband_gain_db) / 20.0)
            * self.load_resistor_ohm.sqrt()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.elements.is_empty() {
            return Err(ConfigurationError::new(
                "receiver.elements",
                "the receive array needs at least one element",
            ));
        }
        if self.noise_bandwidth_hz <= 0.0 {
            return Err(ConfigurationError::new(
                "receiver.noise_bandwidth_hz",
                "noise bandwidth must be positive",
            ));
        }
        if self.load_resistor_ohm <= 0.0 {
            return Err(ConfigurationError::new(
                "receiver.load_resistor_ohm",
                "load resistance must be positive",
            ));
        }
        if self.temperature_k <= 0.0 {
            return Err(ConfigurationError::new(
                "receiver.temperature_k",
                "system temperature must be positive",
            ));
        }
        for (i, el) in self.elements.iter().enumerate() {
            el.pattern.validate(&format!("receiver.elements[{i}].pattern"))?;
        }
        Ok(())
    }
}

/// Azimuth/elevation of a world direction in an array's local frame
/// (local +x = boresight, +z = up).
fn local_angles(orientation: &UnitQuaternion<f64>, dir_world: &Vector3<f64>) -> (f64, f64) {
    let local = orientation.inverse_transform_vector(dir_world);
    let az = local.y.atan2(local.x);
    let el = (local.z / local.norm().max(1e-12)).clamp(-1.0, 1.0).asin();
    (az, el)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn single_element_tx() -> Transmitter {
        Transmitter {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            elements: vec![Element::omni()],
            power_dbm: 10.0,
        }
    }

    #[test]
    fn boresight_is_local_x() {
        let tx = single_element_tx();
        assert_abs_diff_eq!(tx.boresight().x, 1.0, epsilon = 1e-12);
        let (az, el) = tx.direction_angles(&Vector3::x());
        assert_abs_diff_eq!(az, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(el, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rotated_array_sees_rotated_angles() {
        let tx = Transmitter {
            orientation: UnitQuaternion::from_axis_angle(
                &nalgebra::Unit::new_normalize(Vector3::z()),
                std::f64::consts::FRAC_PI_2,
            ),
            ..single_element_tx()
        };
        // World +y is now the boresight
        let (az, _) = tx.direction_angles(&Vector3::y());
        assert_abs_diff_eq!(az, 0.0, epsilon = 1e-12);
        let (az_x, _) = tx.direction_angles(&Vector3::x());
        assert_abs_diff_eq!(az_x, -std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn element_positions_follow_orientation() {
        let mut tx = single_element_tx();
        tx.elements = vec![Element::at_offset(
            Vector3::new(0.0, 1.0, 0.0),
            std::sync::Arc::new(crate::antenna::GainPattern::Omni),
        )];
        tx.orientation = UnitQuaternion::from_axis_angle(
            &nalgebra::Unit::new_normalize(Vector3::z()),
            std::f64::consts::FRAC_PI_2,
        );
        let p = tx.element_position(0);
        assert_abs_diff_eq!(p.x, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_array_rejected() {
        let tx = Transmitter {
            elements: Vec::new(),
            ..single_element_tx()
        };
        let err = tx.validate().unwrap_err();
        assert!(err.to_string().contains("transmitter.elements"));
    }
}
