//! Flash storage driver for RP2040
//!
//! Wear-leveled key-value storage on `sequential-storage`, in the last
//! 64KB of flash. Implements `turtle_hal::FlashStorage`.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use turtle_hal::flash::{FlashError, StorageKey};

/// Pico W flash size
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
/// Settings partition size
pub const SETTINGS_PARTITION_SIZE: usize = 64 * 1024;
pub const SETTINGS_PARTITION_START: usize = FLASH_SIZE - SETTINGS_PARTITION_SIZE;

/// Flash range for the settings partition
pub const SETTINGS_RANGE: core::ops::Range<u32> =
    (SETTINGS_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Largest record the driver will stage
const ITEM_BUFFER_SIZE: usize = 256;

/// RP2040 flash storage
pub struct Rp2040FlashStorage<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> Rp2040FlashStorage<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }

    /// Fetch a record, borrowing its bytes from `scratch`
    async fn fetch<'b>(
        &mut self,
        key: StorageKey,
        scratch: &'b mut [u8],
    ) -> Result<Option<&'b [u8]>, FlashError> {
        map::fetch_item::<StorageKey, &'b [u8], _>(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            scratch,
            &key,
        )
        .await
        .map_err(|_| FlashError::Storage)
    }
}

impl<'d> turtle_hal::FlashStorage for Rp2040FlashStorage<'d> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let mut scratch = [0u8; ITEM_BUFFER_SIZE];
        let data = self.fetch(key, &mut scratch).await?.ok_or(FlashError::NotFound)?;

        let out = buffer.get_mut(..data.len()).ok_or(FlashError::BufferTooSmall)?;
        out.copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let mut scratch = [0u8; ITEM_BUFFER_SIZE];

        map::store_item(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            &mut scratch,
            &key,
            &data,
        )
        .await
        .map_err(|e| match e {
            sequential_storage::Error::FullStorage => FlashError::Full,
            _ => FlashError::Storage,
        })
    }
}
