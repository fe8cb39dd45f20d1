#![cfg_attr(not(test), no_std)]

//! A small driver for the Texas Instruments BQ4050 smart battery gauge
//!
//! Every transaction returns a `Result`, and the outcome of the most recent one is
//! also kept in the handle as an [`ErrorCode`] (see [`Bq4050::last_error`]).

pub(crate) mod fmt;

pub mod access;
pub mod cedv;
pub mod known_chips;
pub mod memory;
pub mod pec;
pub mod registers;
pub mod smart_pec;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use core::fmt::{Display, Formatter};

use embedded_hal_async::delay::DelayNs;

pub use access::{Block, MAX_BLOCK_LEN};
pub use cedv::{CedvConfig, CedvProfile, SmoothingConfig, SmoothingFlags};
pub use memory::{BalancingConfig, CellCount, DaConfiguration, FetOptions, PowerConfig};
pub use registers::*;
pub use transport::Transport;

/// Factory-default SMBus address of the gauge
pub const DEFAULT_ADDRESS: u8 = 0x0B;

/// Chip error type
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipError<E> {
    /// The bus transaction did not complete (address or data not acknowledged)
    Nack(E),
    /// The gauge returned fewer bytes than requested
    Timeout,
    /// Out-of-range argument or an implausible length reported by the gauge
    InvalidParameter,
    /// Reserved, nothing reports it at the moment
    Checksum,
    /// The received PEC does not match the frame
    Pec,
    /// The gauge did not answer the probe
    DeviceNotFound,
}

impl<E> From<E> for ChipError<E> {
    fn from(e: E) -> Self {
        Self::Nack(e)
    }
}

impl<E> ChipError<E> {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Nack(_) => ErrorCode::BusNack,
            Self::Timeout => ErrorCode::BusTimeout,
            Self::InvalidParameter => ErrorCode::InvalidParameter,
            Self::Checksum => ErrorCode::ChecksumMismatch,
            Self::Pec => ErrorCode::IntegrityMismatch,
            Self::DeviceNotFound => ErrorCode::DeviceNotFound,
        }
    }
}

/// Outcome of the most recent transaction, kept by the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    #[default]
    None,
    BusTimeout,
    BusNack,
    InvalidParameter,
    ChecksumMismatch,
    IntegrityMismatch,
    DeviceNotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "No error",
            Self::BusTimeout => "I2C timeout",
            Self::BusNack => "I2C NACK",
            Self::InvalidParameter => "Invalid parameter",
            Self::ChecksumMismatch => "CRC mismatch",
            Self::IntegrityMismatch => "PEC mismatch",
            Self::DeviceNotFound => "Device not found",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security mode, as reported in ManufacturingStatus()
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityMode {
    Sealed,
    Unsealed,
    FullAccess,
}

impl From<ManufacturingStatus> for SecurityMode {
    fn from(status: ManufacturingStatus) -> Self {
        if !status.contains(ManufacturingStatus::UNSEALED) {
            Self::Sealed
        } else if status.contains(ManufacturingStatus::FULL_ACCESS) {
            Self::FullAccess
        } else {
            Self::Unsealed
        }
    }
}

/// Chip handle
pub struct Bq4050<T, D> {
    pub(crate) bus: T,
    pub(crate) delay: D,
    pub(crate) addr: u8,
    pub(crate) pec_enabled: bool,
    pub(crate) last_error: ErrorCode,
}

impl<T, D> Bq4050<T, D> {
    /// Creates the driver instance. PEC starts disabled
    pub fn new(bus: T, delay: D, addr: u8) -> Self {
        Self {
            bus,
            delay,
            addr,
            pec_enabled: false,
            last_error: ErrorCode::None,
        }
    }

    /// Releases the bus and the delay provider
    pub fn release(self) -> (T, D) {
        (self.bus, self.delay)
    }

    pub fn address(&self) -> u8 {
        self.addr
    }

    /// Turns PEC on or off for the whole session. Some registers ignore this,
    /// see [`smart_pec`]
    pub fn set_pec_enabled(&mut self, enable: bool) {
        info!("PEC {}", if enable { "enabled" } else { "disabled" });
        self.pec_enabled = enable;
    }

    /// The session-wide PEC setting, regardless of any per-register override
    pub fn pec_enabled(&self) -> bool {
        self.pec_enabled
    }

    /// Outcome of the most recent transaction
    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    /// Stores the outcome of a transaction and passes it through
    pub(crate) fn record<V, E>(&mut self, result: Result<V, ChipError<E>>) -> Result<V, ChipError<E>> {
        self.last_error = match &result {
            Ok(_) => ErrorCode::None,
            Err(e) => e.code(),
        };

        if let Err(e) = &result {
            warn!("transaction failed: {}", e.code().as_str());
        }

        result
    }
}

impl<T, D, E> Bq4050<T, D>
where
    D: DelayNs,
    T: Transport<Error = E>,
{
    pub async fn remaining_capacity_alarm(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::REMAINING_CAPACITY_ALARM).await
    }

    pub async fn remaining_time_alarm(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::REMAINING_TIME_ALARM).await
    }

    pub async fn battery_mode(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::BATTERY_MODE).await
    }

    pub async fn set_battery_mode(&mut self, mode: u16) -> Result<(), ChipError<E>> {
        self.write_u16(commands::BATTERY_MODE, mode).await
    }

    /// Reads the pack temperature in units of 0.1 K
    pub async fn temperature(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::TEMPERATURE).await
    }

    /// Reads the pack voltage in millivolts
    pub async fn voltage(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::VOLTAGE).await
    }

    /// Reads the instantaneous current in milliamps, negative while discharging
    pub async fn current(&mut self) -> Result<i16, ChipError<E>> {
        let raw = self.read_u16(commands::CURRENT).await?;
        Ok(raw as i16)
    }

    pub async fn average_current(&mut self) -> Result<i16, ChipError<E>> {
        let raw = self.read_u16(commands::AVERAGE_CURRENT).await?;
        Ok(raw as i16)
    }

    pub async fn relative_state_of_charge(&mut self) -> Result<u8, ChipError<E>> {
        let raw = self.read_u16(commands::RELATIVE_STATE_OF_CHARGE).await?;
        Ok(raw as u8)
    }

    pub async fn absolute_state_of_charge(&mut self) -> Result<u8, ChipError<E>> {
        let raw = self.read_u16(commands::ABSOLUTE_STATE_OF_CHARGE).await?;
        Ok(raw as u8)
    }

    /// Remaining capacity in mAh (or 10 mWh, depending on BatteryMode)
    pub async fn remaining_capacity(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::REMAINING_CAPACITY).await
    }

    pub async fn full_charge_capacity(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::FULL_CHARGE_CAPACITY).await
    }

    /// Predicted run time at the present rate, in minutes
    pub async fn run_time_to_empty(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::RUN_TIME_TO_EMPTY).await
    }

    pub async fn average_time_to_full(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::AVERAGE_TIME_TO_FULL).await
    }

    pub async fn battery_status(&mut self) -> Result<BatteryStatus, ChipError<E>> {
        let raw = self.read_u16(commands::BATTERY_STATUS).await?;
        Ok(BatteryStatus::from(raw))
    }

    pub async fn cycle_count(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::CYCLE_COUNT).await
    }

    pub async fn design_capacity(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::DESIGN_CAPACITY).await
    }

    pub async fn design_voltage(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::DESIGN_VOLTAGE).await
    }

    /// Packed as (year - 1980) * 512 + month * 32 + day
    pub async fn manufacture_date(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::MANUFACTURE_DATE).await
    }

    pub async fn serial_number(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16(commands::SERIAL_NUMBER).await
    }

    /// Reads the voltage of cell 1..=4 in millivolts
    pub async fn cell_voltage(&mut self, cell: u8) -> Result<u16, ChipError<E>> {
        let command = match cell {
            1 => commands::CELL_VOLTAGE_1,
            2 => commands::CELL_VOLTAGE_2,
            3 => commands::CELL_VOLTAGE_3,
            4 => commands::CELL_VOLTAGE_4,
            _ => return self.record(Err(ChipError::InvalidParameter)),
        };

        self.read_u16(command).await
    }

    pub async fn manufacturer_name(&mut self) -> Result<Block, ChipError<E>> {
        self.read_block(commands::MANUFACTURER_NAME).await
    }

    pub async fn device_name(&mut self) -> Result<Block, ChipError<E>> {
        self.read_block(commands::DEVICE_NAME).await
    }

    pub async fn device_chemistry(&mut self) -> Result<Block, ChipError<E>> {
        self.read_block(commands::DEVICE_CHEMISTRY).await
    }

    // Status and flag registers. These go through the smart PEC policy

    pub async fn safety_alert(&mut self) -> Result<SafetyFlags, ChipError<E>> {
        let raw = self.read_u16_smart(commands::SAFETY_ALERT).await?;
        Ok(SafetyFlags::from(raw))
    }

    pub async fn safety_status(&mut self) -> Result<SafetyFlags, ChipError<E>> {
        let raw = self.read_u16_smart(commands::SAFETY_STATUS).await?;
        Ok(SafetyFlags::from(raw))
    }

    pub async fn pf_alert(&mut self) -> Result<PermanentFailureFlags, ChipError<E>> {
        let raw = self.read_u16_smart(commands::PF_ALERT).await?;
        Ok(PermanentFailureFlags::from(raw))
    }

    pub async fn pf_status(&mut self) -> Result<PermanentFailureFlags, ChipError<E>> {
        let raw = self.read_u16_smart(commands::PF_STATUS).await?;
        Ok(PermanentFailureFlags::from(raw))
    }

    pub async fn operation_status(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16_smart(commands::OPERATION_STATUS).await
    }

    pub async fn charging_status(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16_smart(commands::CHARGING_STATUS).await
    }

    pub async fn gauging_status(&mut self) -> Result<GaugingStatus, ChipError<E>> {
        let raw = self.read_u16_smart(commands::GAUGING_STATUS).await?;
        Ok(GaugingStatus::from(raw))
    }

    pub async fn manufacturing_status(&mut self) -> Result<ManufacturingStatus, ChipError<E>> {
        let raw = self.read_u16_smart(commands::MANUFACTURING_STATUS).await?;
        Ok(ManufacturingStatus::from(raw))
    }

    pub async fn afe_register(&mut self) -> Result<u16, ChipError<E>> {
        self.read_u16_smart(commands::AFE_REGISTER).await
    }

    /// Reads lifetime data block 1..=5
    pub async fn lifetime_data_block(&mut self, block: u8) -> Result<u32, ChipError<E>> {
        let command = match block {
            1 => commands::LIFETIME_DATA_BLOCK_1,
            2 => commands::LIFETIME_DATA_BLOCK_2,
            3 => commands::LIFETIME_DATA_BLOCK_3,
            4 => commands::LIFETIME_DATA_BLOCK_4,
            5 => commands::LIFETIME_DATA_BLOCK_5,
            _ => return self.record(Err(ChipError::InvalidParameter)),
        };

        self.read_u32_smart(command).await
    }

    pub async fn manufacturer_info(&mut self) -> Result<Block, ChipError<E>> {
        self.read_block_smart(commands::MANUFACTURER_INFO).await
    }

    pub async fn da_status_1(&mut self) -> Result<Block, ChipError<E>> {
        self.read_block_smart(commands::DA_STATUS_1).await
    }

    pub async fn da_status_2(&mut self) -> Result<Block, ChipError<E>> {
        self.read_block_smart(commands::DA_STATUS_2).await
    }

    // Manufacturer access

    pub async fn device_type(&mut self) -> Result<u16, ChipError<E>> {
        self.manufacturer_access_u16(mac_subcommands::DEVICE_TYPE)
            .await
    }

    pub async fn firmware_version(&mut self) -> Result<u16, ChipError<E>> {
        self.manufacturer_access_u16(mac_subcommands::FIRMWARE_VERSION)
            .await
    }

    pub async fn hardware_version(&mut self) -> Result<u16, ChipError<E>> {
        self.manufacturer_access_u16(mac_subcommands::HARDWARE_VERSION)
            .await
    }

    /// Instruction flash signature
    pub async fn if_checksum(&mut self) -> Result<u16, ChipError<E>> {
        self.manufacturer_access_u16(mac_subcommands::IF_CHECKSUM)
            .await
    }

    pub async fn static_df_signature(&mut self) -> Result<u16, ChipError<E>> {
        self.manufacturer_access_u16(mac_subcommands::STATIC_DF_SIGNATURE)
            .await
    }

    pub async fn all_df_signature(&mut self) -> Result<u16, ChipError<E>> {
        self.manufacturer_access_u16(mac_subcommands::ALL_DF_SIGNATURE)
            .await
    }

    pub async fn device_type_block(&mut self) -> Result<Block, ChipError<E>> {
        self.manufacturer_block(mac_subcommands::DEVICE_TYPE).await
    }

    pub async fn firmware_version_block(&mut self) -> Result<Block, ChipError<E>> {
        self.manufacturer_block(mac_subcommands::FIRMWARE_VERSION)
            .await
    }

    pub async fn hardware_version_block(&mut self) -> Result<Block, ChipError<E>> {
        self.manufacturer_block(mac_subcommands::HARDWARE_VERSION)
            .await
    }

    /// Lifetime data block 1..=3, fetched through manufacturer access
    pub async fn mac_lifetime_data(&mut self, block: u8) -> Result<u32, ChipError<E>> {
        let subcommand = match block {
            1 => mac_subcommands::LIFETIME_DATA_BLOCK_1,
            2 => mac_subcommands::LIFETIME_DATA_BLOCK_2,
            3 => mac_subcommands::LIFETIME_DATA_BLOCK_3,
            _ => return self.record(Err(ChipError::InvalidParameter)),
        };

        self.manufacturer_access_u32(subcommand).await
    }

    // FET and device control. These need the gauge unsealed

    pub async fn set_charge_fet(&mut self, enable: bool) -> Result<(), ChipError<E>> {
        self.manufacturer_access_write(mac_subcommands::CHARGE_FET, enable as u16)
            .await
    }

    pub async fn set_discharge_fet(&mut self, enable: bool) -> Result<(), ChipError<E>> {
        self.manufacturer_access_write(mac_subcommands::DISCHARGE_FET, enable as u16)
            .await
    }

    pub async fn set_precharge_fet(&mut self, enable: bool) -> Result<(), ChipError<E>> {
        self.manufacturer_access_write(mac_subcommands::PRECHARGE_FET, enable as u16)
            .await
    }

    pub async fn set_fet_control(&mut self, control: u8) -> Result<(), ChipError<E>> {
        self.manufacturer_access_write(mac_subcommands::FET_CONTROL, control.into())
            .await
    }

    pub async fn enter_calibration_mode(&mut self) -> Result<(), ChipError<E>> {
        self.manufacturer_access_write(mac_subcommands::CALIBRATION_MODE, 1)
            .await
    }

    pub async fn seal(&mut self) -> Result<(), ChipError<E>> {
        info!("sealing the gauge...");
        self.manufacturer_access_write(mac_subcommands::SEAL_DEVICE, 0)
            .await
    }

    pub async fn reset(&mut self) -> Result<(), ChipError<E>> {
        info!("performing device reset...");
        self.manufacturer_access_write(mac_subcommands::DEVICE_RESET, 0)
            .await
    }

    pub async fn enter_sleep_mode(&mut self) -> Result<(), ChipError<E>> {
        self.manufacturer_access_write(mac_subcommands::SLEEP_MODE, 0)
            .await
    }

    pub async fn enter_shutdown_mode(&mut self) -> Result<(), ChipError<E>> {
        info!("entering shutdown...");
        self.manufacturer_access_write(mac_subcommands::SHUTDOWN_MODE, 0)
            .await
    }

    pub async fn security_mode(&mut self) -> Result<SecurityMode, ChipError<E>> {
        let status = self.manufacturing_status().await?;
        Ok(SecurityMode::from(status))
    }

    // Quick status

    pub async fn is_charging(&mut self) -> Result<bool, ChipError<E>> {
        Ok(self.current().await? > 0)
    }

    pub async fn is_discharging(&mut self) -> Result<bool, ChipError<E>> {
        let status = self.battery_status().await?;
        Ok(status.contains(BatteryStatus::DSG))
    }

    /// No safety fault and no permanent failure latched
    pub async fn is_healthy(&mut self) -> Result<bool, ChipError<E>> {
        let safety = self.safety_status().await?;
        let pf = self.pf_status().await?;

        Ok(safety.is_empty() && pf.is_empty())
    }

    /// Full charge capacity as a percentage of design capacity
    pub async fn state_of_health(&mut self) -> Result<u8, ChipError<E>> {
        let full = self.full_charge_capacity().await?;
        let design = self.design_capacity().await?;

        if design == 0 {
            return Ok(0);
        }

        let percent = u32::from(full) * 100 / u32::from(design);
        Ok(percent.min(u8::MAX.into()) as u8)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_async::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    use super::*;
    use crate::testing::NoopDelay;

    const ADDR: u8 = DEFAULT_ADDRESS;

    fn with_pec(command: u8, data: &[u8]) -> Vec<u8> {
        let mut frame = data.to_vec();
        frame.push(pec::read_frame_pec(ADDR, command, data));
        frame
    }

    #[test]
    fn error_strings() {
        assert_eq!(ErrorCode::None.as_str(), "No error");
        assert_eq!(ErrorCode::IntegrityMismatch.as_str(), "PEC mismatch");
        assert_eq!(ErrorCode::DeviceNotFound.to_string(), "Device not found");
        assert_eq!(ChipError::Nack(()).code(), ErrorCode::BusNack);
        assert_eq!(ChipError::<()>::Timeout.code(), ErrorCode::BusTimeout);
    }

    #[test]
    fn security_mode_from_manufacturing_status() {
        let sealed = ManufacturingStatus::from(0x0000);
        let unsealed = ManufacturingStatus::from(0x2000);
        let full = ManufacturingStatus::from(0x6000);

        assert_eq!(SecurityMode::from(sealed), SecurityMode::Sealed);
        assert_eq!(SecurityMode::from(unsealed), SecurityMode::Unsealed);
        assert_eq!(SecurityMode::from(full), SecurityMode::FullAccess);
        // FULL_ACCESS alone still means sealed
        assert_eq!(
            SecurityMode::from(ManufacturingStatus::from(0x4000)),
            SecurityMode::Sealed
        );
    }

    #[tokio::test]
    async fn safety_status_skips_pec_and_keeps_the_session_flag() {
        // PEC is on, but 0x51 must be read as two bytes without a trailing PEC
        let expectations = [Transaction::write_read(ADDR, vec![0x51], vec![0x02, 0x00])];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);
        gauge.set_pec_enabled(true);

        let status = gauge.safety_status().await.unwrap();

        assert_eq!(status, SafetyFlags::COV);
        assert!(gauge.pec_enabled());
        assert_eq!(gauge.last_error(), ErrorCode::None);

        i2c.done();
    }

    #[tokio::test]
    async fn voltage_uses_pec_when_enabled() {
        let expectations = [Transaction::write_read(
            ADDR,
            vec![0x09],
            with_pec(0x09, &[0x10, 0x3B]),
        )];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);
        gauge.set_pec_enabled(true);

        assert_eq!(gauge.voltage().await.unwrap(), 15120);

        i2c.done();
    }

    #[tokio::test]
    async fn error_is_sticky_until_the_next_call() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x0A], vec![0x00, 0x00]).with_error(ErrorKind::Other),
            Transaction::write_read(ADDR, vec![0x0A], vec![0x18, 0xFC]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert!(gauge.current().await.is_err());
        assert_eq!(gauge.last_error(), ErrorCode::BusNack);
        assert_eq!(gauge.last_error(), ErrorCode::BusNack);

        assert_eq!(gauge.current().await.unwrap(), -1000);
        assert_eq!(gauge.last_error(), ErrorCode::None);

        i2c.done();
    }

    #[tokio::test]
    async fn bad_cell_index_touches_no_bus() {
        let expectations: [Transaction; 0] = [];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert!(matches!(
            gauge.cell_voltage(5).await,
            Err(ChipError::InvalidParameter)
        ));
        assert!(gauge.lifetime_data_block(0).await.is_err());
        assert_eq!(gauge.last_error(), ErrorCode::InvalidParameter);

        i2c.done();
    }

    #[tokio::test]
    async fn cell_voltages_map_to_their_registers() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x3F], vec![0x68, 0x10]),
            Transaction::write_read(ADDR, vec![0x3C], vec![0x70, 0x10]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert_eq!(gauge.cell_voltage(1).await.unwrap(), 4200);
        assert_eq!(gauge.cell_voltage(4).await.unwrap(), 4208);

        i2c.done();
    }

    #[tokio::test]
    async fn lifetime_blocks_are_32_bit_without_pec() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x62], vec![0x01, 0x00, 0x00, 0x80]),
            Transaction::write_read(ADDR, vec![0x64], vec![0x10, 0x00, 0x00, 0x00]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);
        gauge.set_pec_enabled(true);

        assert_eq!(gauge.lifetime_data_block(3).await.unwrap(), 0x8000_0001);
        assert_eq!(gauge.lifetime_data_block(5).await.unwrap(), 0x10);
        assert!(gauge.pec_enabled());

        i2c.done();
    }

    #[tokio::test]
    async fn fet_control_is_a_manufacturer_write() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00, 0x1F, 0x00, 0x01, 0x00]),
            Transaction::write(ADDR, vec![0x00, 0x20, 0x00, 0x00, 0x00]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        gauge.set_charge_fet(true).await.unwrap();
        gauge.set_discharge_fet(false).await.unwrap();

        i2c.done();
    }

    #[tokio::test]
    async fn security_mode_reads_manufacturing_status() {
        let expectations = [Transaction::write_read(ADDR, vec![0x57], vec![0x00, 0x20])];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert_eq!(gauge.security_mode().await.unwrap(), SecurityMode::Unsealed);

        i2c.done();
    }

    #[tokio::test]
    async fn state_of_health_from_capacities() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x10], vec![0x08, 0x07]),
            Transaction::write_read(ADDR, vec![0x18], vec![0xD0, 0x07]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        // 1800 / 2000
        assert_eq!(gauge.state_of_health().await.unwrap(), 90);

        i2c.done();
    }

    #[tokio::test]
    async fn discharging_follows_battery_status() {
        let expectations = [Transaction::write_read(ADDR, vec![0x16], vec![0xC0, 0x00])];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert!(gauge.is_discharging().await.unwrap());

        i2c.done();
    }

    #[tokio::test]
    async fn charging_follows_the_sign_of_current() {
        let expectations = [
            Transaction::write_read(ADDR, vec![0x0A], vec![0xF4, 0x01]),
            Transaction::write_read(ADDR, vec![0x0A], vec![0x0C, 0xFE]),
            Transaction::write_read(ADDR, vec![0x0A], vec![0x00, 0x00]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        // +500 mA
        assert!(gauge.is_charging().await.unwrap());
        // -500 mA
        assert!(!gauge.is_charging().await.unwrap());
        // idle
        assert!(!gauge.is_charging().await.unwrap());

        i2c.done();
    }
}
