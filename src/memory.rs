//! Besides regular commands and manufacturer access there is also the data flash.
//! It is addressed byte by byte: the flash address goes through manufacturer access,
//! then the byte itself is read or written through a window register.
//!
//! Writes are fire-and-forget, nothing here caches or verifies flash contents.

use byteorder::{ByteOrder, LittleEndian};
use embedded_hal_async::delay::DelayNs;

use crate::{
    fmt::bitflags,
    registers::{commands, mac_subcommands},
    transport::Transport,
    Bq4050, ChipError,
};

pub const DATA_FLASH_START: u16 = 0x4000;
pub const DATA_FLASH_END: u16 = 0x5FFF;

/// Time the gauge needs to fetch a flash byte into the window
const FLASH_SETTLE_MS: u32 = 5;

/// Known data flash locations
pub mod locations {
    pub const DA_CONFIGURATION: u16 = 0x4000;
    pub const FET_OPTIONS: u16 = 0x4001;
    pub const POWER_CONFIG: u16 = 0x4002;
    pub const BALANCING_CONFIG: u16 = 0x4009;
    pub const CEDV_CONFIG: u16 = 0x4120;
    pub const CEDV_PROFILE: u16 = 0x4140;
    pub const SMOOTHING_CONFIG: u16 = 0x4160;
}

bitflags! {
    /// DA Configuration. The two low bits hold the cell count
    pub struct DaConfiguration: u8 {
        const FET_TEMP_AVERAGE = 1 << 7;
        const CELL_TEMP_AVERAGE = 1 << 6;
        const EMERGENCY_SHUTDOWN = 1 << 5;
        const SLEEP = 1 << 4;
        const IN_SYSTEM_SLEEP = 1 << 3;
        const NON_REMOVABLE = 1 << 2;
        const CC1 = 1 << 1;
        const CC0 = 1 << 0;
    }
}

/// Number of series cells the gauge is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CellCount {
    One,
    Two,
    Three,
    Four,
}

impl DaConfiguration {
    const CELL_COUNT_MASK: u8 = 0x03;

    pub fn cell_count(&self) -> CellCount {
        match self.bits() & Self::CELL_COUNT_MASK {
            0 => CellCount::One,
            1 => CellCount::Two,
            2 => CellCount::Three,
            _ => CellCount::Four,
        }
    }

    pub fn with_cell_count(self, count: CellCount) -> Self {
        let bits = (self.bits() & !Self::CELL_COUNT_MASK) | count as u8;
        Self::from_bits_truncate(bits)
    }
}

bitflags! {
    /// FET Options
    pub struct FetOptions: u8 {
        const OVER_TEMP_FET_DISABLE = 1 << 3;
        const CHARGE_INHIBIT_FET = 1 << 2;
        const CHARGE_SUSPEND_FET = 1 << 1;
        const PRECHARGE_COMM = 1 << 0;
    }
}

bitflags! {
    pub struct PowerConfig: u8 {
        const AUTO_SHIP = 1 << 0;
    }
}

const BALANCING_CONFIG_LEN: usize = 5;

/// Cell balancing setup, stored from 0x4009
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BalancingConfig {
    pub enabled: bool,
    /// Cell voltage in millivolts above which balancing starts
    pub voltage: u16,
    pub time: u16,
}

impl BalancingConfig {
    const ENABLE: u8 = 0x01;

    fn from_raw(raw: &[u8; BALANCING_CONFIG_LEN]) -> Self {
        Self {
            enabled: raw[0] & Self::ENABLE != 0,
            voltage: LittleEndian::read_u16(&raw[1..3]),
            time: LittleEndian::read_u16(&raw[3..5]),
        }
    }

    fn to_raw(self) -> [u8; BALANCING_CONFIG_LEN] {
        let mut raw = [0; BALANCING_CONFIG_LEN];

        if self.enabled {
            raw[0] = Self::ENABLE;
        }
        LittleEndian::write_u16(&mut raw[1..3], self.voltage);
        LittleEndian::write_u16(&mut raw[3..5], self.time);

        raw
    }
}

impl<T, D, E> Bq4050<T, D>
where
    D: DelayNs,
    T: Transport<Error = E>,
{
    /// Points the flash window at `address`
    async fn flash_select(&mut self, address: u16) -> Result<(), ChipError<E>> {
        if !(DATA_FLASH_START..=DATA_FLASH_END).contains(&address) {
            warn!("data flash address 0x{:04x} out of range", address);
            return self.record(Err(ChipError::InvalidParameter));
        }

        self.manufacturer_access_write(mac_subcommands::DATA_FLASH_ADDRESS, address)
            .await
    }

    /// Reads a single data flash byte
    pub async fn read_data_flash(&mut self, address: u16) -> Result<u8, ChipError<E>> {
        self.flash_select(address).await?;
        self.delay.delay_ms(FLASH_SETTLE_MS).await;
        self.read_u8(commands::DATA_FLASH).await
    }

    /// Writes a single data flash byte
    pub async fn write_data_flash(&mut self, address: u16, value: u8) -> Result<(), ChipError<E>> {
        self.flash_select(address).await?;
        self.write_u8(commands::DATA_FLASH, value).await
    }

    /// Reads consecutive flash bytes starting at `address`
    pub async fn read_data_flash_into(
        &mut self,
        address: u16,
        data: &mut [u8],
    ) -> Result<(), ChipError<E>> {
        for (offset, byte) in data.iter_mut().enumerate() {
            *byte = self.read_data_flash(address.wrapping_add(offset as u16)).await?;
        }

        Ok(())
    }

    /// Writes consecutive flash bytes starting at `address`, stopping at the first failure
    pub async fn write_data_flash_from(
        &mut self,
        address: u16,
        data: &[u8],
    ) -> Result<(), ChipError<E>> {
        for (offset, byte) in data.iter().enumerate() {
            self.write_data_flash(address.wrapping_add(offset as u16), *byte)
                .await?;
        }

        Ok(())
    }

    /// Little-endian 16-bit value from two consecutive flash bytes
    pub async fn read_data_flash_u16(&mut self, address: u16) -> Result<u16, ChipError<E>> {
        let mut raw = [0; 2];
        self.read_data_flash_into(address, &mut raw).await?;
        Ok(LittleEndian::read_u16(&raw))
    }

    pub async fn write_data_flash_u16(&mut self, address: u16, value: u16) -> Result<(), ChipError<E>> {
        let mut raw = [0; 2];
        LittleEndian::write_u16(&mut raw, value);
        self.write_data_flash_from(address, &raw).await
    }

    pub async fn da_configuration(&mut self) -> Result<DaConfiguration, ChipError<E>> {
        let raw = self.read_data_flash(locations::DA_CONFIGURATION).await?;
        Ok(DaConfiguration::from_bits_truncate(raw))
    }

    pub async fn set_da_configuration(&mut self, config: DaConfiguration) -> Result<(), ChipError<E>> {
        self.write_data_flash(locations::DA_CONFIGURATION, config.bits())
            .await
    }

    pub async fn cell_count(&mut self) -> Result<CellCount, ChipError<E>> {
        Ok(self.da_configuration().await?.cell_count())
    }

    /// Changes the cell count, leaving the other DA Configuration bits alone
    pub async fn set_cell_count(&mut self, count: CellCount) -> Result<(), ChipError<E>> {
        let config = self.da_configuration().await?;
        self.set_da_configuration(config.with_cell_count(count))
            .await
    }

    pub async fn fet_options(&mut self) -> Result<FetOptions, ChipError<E>> {
        let raw = self.read_data_flash(locations::FET_OPTIONS).await?;
        Ok(FetOptions::from_bits_truncate(raw))
    }

    pub async fn set_fet_options(&mut self, options: FetOptions) -> Result<(), ChipError<E>> {
        self.write_data_flash(locations::FET_OPTIONS, options.bits())
            .await
    }

    pub async fn power_config(&mut self) -> Result<PowerConfig, ChipError<E>> {
        let raw = self.read_data_flash(locations::POWER_CONFIG).await?;
        Ok(PowerConfig::from_bits_truncate(raw))
    }

    pub async fn set_power_config(&mut self, config: PowerConfig) -> Result<(), ChipError<E>> {
        self.write_data_flash(locations::POWER_CONFIG, config.bits())
            .await
    }

    pub async fn balancing_config(&mut self) -> Result<BalancingConfig, ChipError<E>> {
        let mut raw = [0; BALANCING_CONFIG_LEN];
        self.read_data_flash_into(locations::BALANCING_CONFIG, &mut raw)
            .await?;
        Ok(BalancingConfig::from_raw(&raw))
    }

    pub async fn set_balancing_config(&mut self, config: BalancingConfig) -> Result<(), ChipError<E>> {
        self.write_data_flash_from(locations::BALANCING_CONFIG, &config.to_raw())
            .await
    }

    /// Sets the cell count and turns cell balancing on or off.
    /// Balancing voltage and time are kept as they are
    pub async fn configure_for_cells(
        &mut self,
        count: CellCount,
        balancing: bool,
    ) -> Result<(), ChipError<E>> {
        info!("configuring for {} cells...", count as u8 + 1);

        self.set_cell_count(count).await?;

        let mut config = self.balancing_config().await?;
        config.enabled = balancing;
        self.set_balancing_config(config).await
    }

    /// Pack built into the host: non-removable, sleeps with the system
    pub async fn configure_for_embedded_battery(&mut self) -> Result<(), ChipError<E>> {
        let config = self.da_configuration().await?;
        self.set_da_configuration(
            config | DaConfiguration::NON_REMOVABLE | DaConfiguration::IN_SYSTEM_SLEEP,
        )
        .await
    }

    pub async fn configure_for_removable_battery(&mut self) -> Result<(), ChipError<E>> {
        let config = self.da_configuration().await?;
        self.set_da_configuration(
            config - (DaConfiguration::NON_REMOVABLE | DaConfiguration::IN_SYSTEM_SLEEP),
        )
        .await
    }

    /// Enables auto ship mode and sleep
    pub async fn configure_for_portable_device(&mut self) -> Result<(), ChipError<E>> {
        let power = self.power_config().await?;
        self.set_power_config(power | PowerConfig::AUTO_SHIP)
            .await?;

        let config = self.da_configuration().await?;
        self.set_da_configuration(config | DaConfiguration::SLEEP)
            .await
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_async::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    use super::*;
    use crate::{
        testing::{NoopDelay, ScriptedBus},
        ErrorCode, DEFAULT_ADDRESS as ADDR,
    };

    #[tokio::test]
    async fn out_of_range_address_touches_no_bus() {
        let expectations: [Transaction; 0] = [];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert!(matches!(
            gauge.read_data_flash(0x3FFF).await,
            Err(ChipError::InvalidParameter)
        ));
        assert!(gauge.write_data_flash(0x6000, 0).await.is_err());
        assert_eq!(gauge.last_error(), ErrorCode::InvalidParameter);

        i2c.done();
    }

    #[tokio::test]
    async fn flash_read_selects_then_reads_the_window() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00, 0x44, 0x00, 0x00, 0x40]),
            Transaction::write_read(ADDR, vec![0x40], vec![0x93]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        let config = gauge.da_configuration().await.unwrap();

        assert_eq!(config.cell_count(), CellCount::Four);
        assert!(config.contains(DaConfiguration::FET_TEMP_AVERAGE | DaConfiguration::SLEEP));

        i2c.done();
    }

    #[tokio::test]
    async fn set_cell_count_keeps_other_bits() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00, 0x44, 0x00, 0x00, 0x40]),
            Transaction::write_read(ADDR, vec![0x40], vec![0x27]),
            Transaction::write(ADDR, vec![0x00, 0x44, 0x00, 0x00, 0x40]),
            Transaction::write(ADDR, vec![0x40, 0x25]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        gauge.set_cell_count(CellCount::Two).await.unwrap();

        i2c.done();
    }

    #[tokio::test]
    async fn flash_word_is_little_endian() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00, 0x44, 0x00, 0x40, 0x41]),
            Transaction::write(ADDR, vec![0x40, 0x34]),
            Transaction::write(ADDR, vec![0x00, 0x44, 0x00, 0x41, 0x41]),
            Transaction::write(ADDR, vec![0x40, 0x12]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        gauge.write_data_flash_u16(0x4140, 0x1234).await.unwrap();

        i2c.done();
    }

    #[test]
    fn cell_count_round_trip_through_da_configuration() {
        let config = DaConfiguration::NON_REMOVABLE.with_cell_count(CellCount::Three);

        assert_eq!(config.bits(), 0x06);
        assert_eq!(config.cell_count(), CellCount::Three);
    }

    #[tokio::test]
    async fn failed_select_skips_the_window_read() {
        let expectations =
            [Transaction::write(ADDR, vec![0x00, 0x44, 0x00, 0x20, 0x41]).with_error(ErrorKind::Other)];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert!(matches!(
            gauge.read_data_flash(0x4120).await,
            Err(ChipError::Nack(ErrorKind::Other))
        ));
        assert_eq!(gauge.last_error(), ErrorCode::BusNack);

        // No read of 0x40 was issued
        i2c.done();
    }

    #[tokio::test]
    async fn fet_options_from_flash() {
        let expectations = [
            Transaction::write(ADDR, vec![0x00, 0x44, 0x00, 0x01, 0x40]),
            Transaction::write_read(ADDR, vec![0x40], vec![0x0A]),
        ];
        let mut i2c = Mock::new(&expectations);
        let mut gauge = Bq4050::new(i2c.clone(), NoopDelay, ADDR);

        assert_eq!(
            gauge.fet_options().await.unwrap(),
            FetOptions::CHARGE_SUSPEND_FET | FetOptions::OVER_TEMP_FET_DISABLE
        );

        i2c.done();
    }

    #[test]
    fn balancing_config_layout() {
        let raw = [0x01, 0x10, 0x0E, 0x3C, 0x00];

        let config = BalancingConfig::from_raw(&raw);

        assert!(config.enabled);
        assert_eq!(config.voltage, 3600);
        assert_eq!(config.time, 60);
        assert_eq!(config.to_raw(), raw);

        let off = BalancingConfig {
            enabled: false,
            ..config
        };
        assert_eq!(off.to_raw()[0], 0x00);
    }

    #[test]
    fn option_bytes_drop_unknown_bits() {
        assert_eq!(PowerConfig::from_bits_truncate(0xFF), PowerConfig::AUTO_SHIP);
        assert_eq!(FetOptions::from_bits_truncate(0xF0), FetOptions::empty());
    }

    #[tokio::test]
    async fn configure_for_cells_sets_count_and_balancing() {
        let replies = [
            vec![0x03],
            vec![0x00],
            vec![0x10],
            vec![0x0E],
            vec![0x3C],
            vec![0x00],
        ];
        let mut gauge = Bq4050::new(ScriptedBus::new(replies), NoopDelay, ADDR);

        gauge
            .configure_for_cells(CellCount::Two, true)
            .await
            .unwrap();

        let writes = &gauge.bus.writes;
        assert_eq!(writes.len(), 24);
        // DA Configuration now says two cells
        assert_eq!(writes[3], [0x40, 0x01]);
        // Balancing enabled, voltage and time written back unchanged
        assert_eq!(writes[14], [0x00, 0x44, 0x00, 0x09, 0x40]);
        assert_eq!(writes[15], [0x40, 0x01]);
        assert_eq!(writes[17], [0x40, 0x10]);
        assert_eq!(writes[19], [0x40, 0x0E]);
        assert_eq!(writes[21], [0x40, 0x3C]);
    }

    #[tokio::test]
    async fn embedded_battery_keeps_cell_count() {
        let mut gauge = Bq4050::new(ScriptedBus::new([vec![0x01]]), NoopDelay, ADDR);

        gauge.configure_for_embedded_battery().await.unwrap();

        assert_eq!(gauge.bus.writes[3], [0x40, 0x0D]);
    }

    #[tokio::test]
    async fn removable_battery_clears_sleep_with_system() {
        let mut gauge = Bq4050::new(ScriptedBus::new([vec![0x9E]]), NoopDelay, ADDR);

        gauge.configure_for_removable_battery().await.unwrap();

        assert_eq!(gauge.bus.writes[3], [0x40, 0x92]);
    }
}
