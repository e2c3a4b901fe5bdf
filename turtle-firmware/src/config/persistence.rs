//! Drive settings persistence
//!
//! Loads and saves calibration and motion limits to flash storage.

use defmt::*;

use turtle_core::config::DriveSettings;
use turtle_core::ConfigError;
use turtle_hal_rp2040::flash::{FlashError, Rp2040FlashStorage, StorageKey};
use turtle_hal_rp2040::FlashStorageTrait;

/// Maximum serialized settings size
const MAX_SETTINGS_SIZE: usize = 64;

/// Settings persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistenceError {
    /// Flash operation failed
    Flash(FlashError),
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// CRC check failed
    CrcMismatch,
    /// Invalid magic or version
    InvalidFormat,
    /// Stored values are out of range
    Invalid(ConfigError),
}

impl From<FlashError> for PersistenceError {
    fn from(e: FlashError) -> Self {
        PersistenceError::Flash(e)
    }
}

/// Load drive settings from flash, falling back to defaults
pub async fn load_settings(storage: &mut Rp2040FlashStorage<'_>) -> DriveSettings {
    match try_load_settings(storage).await {
        Ok(settings) => {
            info!("Loaded drive settings from flash");
            log_settings(&settings);
            settings
        }
        Err(PersistenceError::Flash(FlashError::NotFound)) => {
            debug!("No drive settings in flash, using defaults");
            DriveSettings::default()
        }
        Err(e) => {
            warn!("Failed to load drive settings: {:?}, using defaults", e);
            DriveSettings::default()
        }
    }
}

/// Load drive settings from flash
pub async fn try_load_settings(
    storage: &mut Rp2040FlashStorage<'_>,
) -> Result<DriveSettings, PersistenceError> {
    let mut buffer = [0u8; MAX_SETTINGS_SIZE];
    let len = storage.read(StorageKey::DriveSettings, &mut buffer).await?;

    debug!("Read {} bytes of drive settings from flash", len);

    let settings: DriveSettings =
        postcard::from_bytes(&buffer[..len]).map_err(|_| PersistenceError::Deserialize)?;

    if !settings.is_valid() {
        return Err(PersistenceError::InvalidFormat);
    }
    if !settings.verify_crc() {
        warn!("Drive settings CRC mismatch");
        return Err(PersistenceError::CrcMismatch);
    }
    settings.validate().map_err(PersistenceError::Invalid)?;

    Ok(settings)
}

/// Save drive settings to flash
///
/// Refreshes the header and CRC before writing.
pub async fn save_settings(
    storage: &mut Rp2040FlashStorage<'_>,
    settings: &DriveSettings,
) -> Result<(), PersistenceError> {
    let record = DriveSettings::new(settings.calibration, settings.limits);

    let mut buffer = [0u8; MAX_SETTINGS_SIZE];
    let bytes =
        postcard::to_slice(&record, &mut buffer).map_err(|_| PersistenceError::Serialize)?;

    debug!("Saving {} bytes of drive settings to flash", bytes.len());

    storage.write(StorageKey::DriveSettings, bytes).await?;

    info!("Saved drive settings to flash");
    log_settings(&record);
    Ok(())
}

fn log_settings(settings: &DriveSettings) {
    debug!(
        "Calibration: wheel {} um, axel {} um",
        settings.calibration.wheel_diameter_um, settings.calibration.axel_distance_um
    );
    debug!(
        "Linear {} um/s @ {} um/s^2, rotational {} um/s @ {} um/s^2",
        settings.limits.linear_target_speed_umps,
        settings.limits.linear_accel_umpss,
        settings.limits.rotational_target_speed_umps,
        settings.limits.rotational_accel_umpss
    );
}
