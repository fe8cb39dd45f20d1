//! Device identification. The gauge answers DeviceType() with its part number
//! in BCD, so a BQ4050 reports 0x4050.

use embedded_hal_async::delay::DelayNs;

use crate::{transport::Transport, Bq4050, ChipError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipType {
    BQ4050,
    Unknown(u16),
}

impl From<u16> for ChipType {
    fn from(code: u16) -> Self {
        match code {
            0x4050 => Self::BQ4050,
            other => Self::Unknown(other),
        }
    }
}

impl<T, D, E> Bq4050<T, D>
where
    D: DelayNs,
    T: Transport<Error = E>,
{
    /// Tries to communicate with the chip and reads the device type.
    /// Any failure on the way is reported as [`ChipError::DeviceNotFound`]
    pub async fn probe(&mut self) -> Result<ChipType, ChipError<E>> {
        let device_type = match self.device_type().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("probe failed: {}", e.code().as_str());
                return self.record(Err(ChipError::DeviceNotFound));
            }
        };

        let chip = ChipType::from(device_type);
        info!("device type 0x{:04x}", device_type);

        if let ChipType::Unknown(_) = chip {
            warn!("unexpected device type, continuing anyway");
        }

        Ok(chip)
    }
}
