//! Drive calibration and motion limit types
//!
//! Stores the values the drive consumes that can be persisted to flash
//! and loaded on boot.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Magic number to identify valid drive settings
pub const SETTINGS_MAGIC: u32 = 0x5654_4453; // "VTDS"

/// Current drive settings version
pub const SETTINGS_VERSION: u8 = 1;

/// Wheel and axel calibration
///
/// Corrects the nominal step-to-distance and step-to-angle ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    /// Effective wheel diameter in micrometres
    pub wheel_diameter_um: u32,
    /// Distance between the wheel contact points in micrometres
    pub axel_distance_um: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            wheel_diameter_um: 42_000,
            axel_distance_um: 100_000,
        }
    }
}

impl Calibration {
    /// Both values must be strictly positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wheel_diameter_um == 0 || self.axel_distance_um == 0 {
            return Err(ConfigError::InvalidCalibration);
        }
        Ok(())
    }
}

/// Speed and acceleration ceilings for new motions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionLimits {
    /// Cruise speed for forward/backward drives (µm/s)
    pub linear_target_speed_umps: u32,
    /// Acceleration for forward/backward drives (µm/s²)
    pub linear_accel_umpss: u32,
    /// Wheel cruise speed for turns (µm/s)
    pub rotational_target_speed_umps: u32,
    /// Wheel acceleration for turns (µm/s²)
    pub rotational_accel_umpss: u32,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            linear_target_speed_umps: 100_000,
            linear_accel_umpss: 50_000,
            rotational_target_speed_umps: 50_000,
            rotational_accel_umpss: 25_000,
        }
    }
}

impl MotionLimits {
    /// Speeds and accelerations must be strictly positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            self.linear_target_speed_umps,
            self.linear_accel_umpss,
            self.rotational_target_speed_umps,
            self.rotational_accel_umpss,
        ];
        if values.contains(&0) {
            return Err(ConfigError::InvalidVelocity);
        }
        Ok(())
    }
}

/// Complete drive settings stored in flash
///
/// Contains calibration and limits with a header for data validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriveSettings {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Wheel/axel calibration
    pub calibration: Calibration,
    /// Motion limits
    pub limits: MotionLimits,
    /// CRC32 checksum (calculated over magic..limits)
    pub crc: u32,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self::new(Calibration::default(), MotionLimits::default())
    }
}

impl DriveSettings {
    /// Create settings with a valid header and CRC
    pub fn new(calibration: Calibration, limits: MotionLimits) -> Self {
        let mut settings = Self {
            magic: SETTINGS_MAGIC,
            version: SETTINGS_VERSION,
            calibration,
            limits,
            crc: 0,
        };
        settings.update_crc();
        settings
    }

    /// Check if the header matches this firmware's format
    pub fn is_valid(&self) -> bool {
        self.magic == SETTINGS_MAGIC && self.version == SETTINGS_VERSION
    }

    /// Validate calibration and limit values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.calibration.validate()?;
        self.limits.validate()
    }

    /// Calculate CRC32 for the data (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        crc = crc32_update(crc, &self.calibration.wheel_diameter_um.to_le_bytes());
        crc = crc32_update(crc, &self.calibration.axel_distance_um.to_le_bytes());
        crc = crc32_update(crc, &self.limits.linear_target_speed_umps.to_le_bytes());
        crc = crc32_update(crc, &self.limits.linear_accel_umpss.to_le_bytes());
        crc = crc32_update(crc, &self.limits.rotational_target_speed_umps.to_le_bytes());
        crc = crc32_update(crc, &self.limits.rotational_accel_umpss.to_le_bytes());

        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }
}

/// CRC32 update (IEEE 802.3 polynomial)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
