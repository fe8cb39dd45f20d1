//! Compensated end-of-discharge voltage (CEDV) gauging.
//!
//! The model parameters, the discharge profile and the smoothing setup live in data
//! flash. Thresholds, compensation and learning are reached through manufacturer access.

use byteorder::{ByteOrder, LittleEndian};
use embedded_hal_async::delay::DelayNs;

use crate::{
    fmt::bitflags,
    memory::locations,
    registers::{mac_subcommands, GaugingStatus},
    transport::Transport,
    Bq4050, ChipError,
};

const CEDV_CONFIG_LEN: usize = 15;

/// Model parameters, stored little-endian from 0x4120
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CedvConfig {
    pub emf: u16,
    pub c0: u16,
    pub r0: u16,
    pub t0: u16,
    pub r1: u16,
    pub tc: u8,
    pub c1: u8,
    pub age_factor: u8,
    pub battery_low: u16,
}

impl CedvConfig {
    fn from_raw(raw: &[u8; CEDV_CONFIG_LEN]) -> Self {
        Self {
            emf: LittleEndian::read_u16(&raw[0..2]),
            c0: LittleEndian::read_u16(&raw[2..4]),
            r0: LittleEndian::read_u16(&raw[4..6]),
            t0: LittleEndian::read_u16(&raw[6..8]),
            r1: LittleEndian::read_u16(&raw[8..10]),
            tc: raw[10],
            c1: raw[11],
            age_factor: raw[12],
            battery_low: LittleEndian::read_u16(&raw[13..15]),
        }
    }

    fn to_raw(self) -> [u8; CEDV_CONFIG_LEN] {
        let mut raw = [0; CEDV_CONFIG_LEN];

        LittleEndian::write_u16(&mut raw[0..2], self.emf);
        LittleEndian::write_u16(&mut raw[2..4], self.c0);
        LittleEndian::write_u16(&mut raw[4..6], self.r0);
        LittleEndian::write_u16(&mut raw[6..8], self.t0);
        LittleEndian::write_u16(&mut raw[8..10], self.r1);
        raw[10] = self.tc;
        raw[11] = self.c1;
        raw[12] = self.age_factor;
        LittleEndian::write_u16(&mut raw[13..15], self.battery_low);

        raw
    }
}

/// Number of points in the discharge profile
pub const PROFILE_POINTS: usize = 11;

const CEDV_PROFILE_LEN: usize = PROFILE_POINTS * 2;

/// Cell voltage in millivolts at 0%, 10%, ..., 100% depth of discharge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CedvProfile {
    pub voltages: [u16; PROFILE_POINTS],
}

impl CedvProfile {
    fn from_raw(raw: &[u8; CEDV_PROFILE_LEN]) -> Self {
        let mut voltages = [0; PROFILE_POINTS];
        LittleEndian::read_u16_into(raw, &mut voltages);

        Self { voltages }
    }

    fn to_raw(self) -> [u8; CEDV_PROFILE_LEN] {
        let mut raw = [0; CEDV_PROFILE_LEN];
        LittleEndian::write_u16_into(&self.voltages, &mut raw);

        raw
    }
}

bitflags! {
    /// Last byte of the smoothing configuration
    pub struct SmoothingFlags: u8 {
        const EXTENDED = 1 << 2;
        const TO_EDV1 = 1 << 1;
        const TO_EDV0 = 1 << 0;
    }
}

const SMOOTHING_CONFIG_LEN: usize = 9;

/// End-of-discharge smoothing, stored from 0x4160
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SmoothingConfig {
    pub start_voltage: u16,
    pub delta_voltage: u16,
    pub max_current: u16,
    pub eoc_current: u8,
    pub eoc_time: u8,
    pub flags: SmoothingFlags,
}

impl SmoothingConfig {
    fn from_raw(raw: &[u8; SMOOTHING_CONFIG_LEN]) -> Self {
        Self {
            start_voltage: LittleEndian::read_u16(&raw[0..2]),
            delta_voltage: LittleEndian::read_u16(&raw[2..4]),
            max_current: LittleEndian::read_u16(&raw[4..6]),
            eoc_current: raw[6],
            eoc_time: raw[7],
            flags: SmoothingFlags::from_bits_truncate(raw[8]),
        }
    }

    fn to_raw(self) -> [u8; SMOOTHING_CONFIG_LEN] {
        let mut raw = [0; SMOOTHING_CONFIG_LEN];

        LittleEndian::write_u16(&mut raw[0..2], self.start_voltage);
        LittleEndian::write_u16(&mut raw[2..4], self.delta_voltage);
        LittleEndian::write_u16(&mut raw[4..6], self.max_current);
        raw[6] = self.eoc_current;
        raw[7] = self.eoc_time;
        raw[8] = self.flags.bits();

        raw
    }
}

impl<T, D, E> Bq4050<T, D>
where
    D: DelayNs,
    T: Transport<Error = E>,
{
    pub async fn cedv_config(&mut self) -> Result<CedvConfig, ChipError<E>> {
        let mut raw = [0; CEDV_CONFIG_LEN];
        self.read_data_flash_into(locations::CEDV_CONFIG, &mut raw)
            .await?;
        Ok(CedvConfig::from_raw(&raw))
    }

    pub async fn set_cedv_config(&mut self, config: CedvConfig) -> Result<(), ChipError<E>> {
        info!("writing CEDV configuration...");
        self.write_data_flash_from(locations::CEDV_CONFIG, &config.to_raw())
            .await
    }

    pub async fn cedv_profile(&mut self) -> Result<CedvProfile, ChipError<E>> {
        let mut raw = [0; CEDV_PROFILE_LEN];
        self.read_data_flash_into(locations::CEDV_PROFILE, &mut raw)
            .await?;
        Ok(CedvProfile::from_raw(&raw))
    }

    pub async fn set_cedv_profile(&mut self, profile: CedvProfile) -> Result<(), ChipError<E>> {
        info!("writing CEDV profile...");
        self.write_data_flash_from(locations::CEDV_PROFILE, &profile.to_raw())
            .await
    }

    pub async fn smoothing_config(&mut self) -> Result<SmoothingConfig, ChipError<E>> {
        let mut raw = [0; SMOOTHING_CONFIG_LEN];
        self.read_data_flash_into(locations::SMOOTHING_CONFIG, &mut raw)
            .await?;
        Ok(SmoothingConfig::from_raw(&raw))
    }

    pub async fn set_smoothing_config(&mut self, config: SmoothingConfig) -> Result<(), ChipError<E>> {
        self.write_data_flash_from(locations::SMOOTHING_CONFIG, &config.to_raw())
            .await
    }

    /// End-of-discharge voltage thresholds EDV0..=EDV2 in millivolts
    pub async fn edv_threshold(&mut self, level: u8) -> Result<u16, ChipError<E>> {
        let subcommand = match level {
            0 => mac_subcommands::EDV0_THRESHOLD,
            1 => mac_subcommands::EDV1_THRESHOLD,
            2 => mac_subcommands::EDV2_THRESHOLD,
            _ => return self.record(Err(ChipError::InvalidParameter)),
        };

        self.manufacturer_access_u16(subcommand).await
    }

    /// Sets a fixed EDV0..=EDV2 threshold in millivolts. Only used with compensation off
    pub async fn set_fixed_edv(&mut self, level: u8, millivolts: u16) -> Result<(), ChipError<E>> {
        let subcommand = match level {
            0 => mac_subcommands::FIXED_EDV0,
            1 => mac_subcommands::FIXED_EDV1,
            2 => mac_subcommands::FIXED_EDV2,
            _ => return self.record(Err(ChipError::InvalidParameter)),
        };

        self.manufacturer_access_write(subcommand, millivolts)
            .await
    }

    pub async fn edv_compensation_enabled(&mut self) -> Result<bool, ChipError<E>> {
        let raw = self
            .manufacturer_access_u16(mac_subcommands::CEDV_COMPENSATION)
            .await?;
        Ok(raw & 0x0001 != 0)
    }

    pub async fn set_edv_compensation(&mut self, enable: bool) -> Result<(), ChipError<E>> {
        self.manufacturer_access_write(mac_subcommands::CEDV_COMPENSATION, enable as u16)
            .await
    }

    pub async fn is_using_fixed_edv(&mut self) -> Result<bool, ChipError<E>> {
        Ok(!self.edv_compensation_enabled().await?)
    }

    /// A qualified discharge is in progress, so capacity learning will run at EDV2
    pub async fn is_learning_discharge(&mut self) -> Result<bool, ChipError<E>> {
        let status = self.gauging_status().await?;
        Ok(status.contains(GaugingStatus::QUALIFIED_DISCHARGE))
    }

    pub async fn qualified_discharge_count(&mut self) -> Result<u16, ChipError<E>> {
        self.manufacturer_access_u16(mac_subcommands::QUALIFIED_DISCHARGE_COUNT)
            .await
    }

    pub async fn reset_learning(&mut self) -> Result<(), ChipError<E>> {
        info!("resetting capacity learning...");
        self.manufacturer_access_write(mac_subcommands::RESET_LEARNING, 0)
            .await
    }
}
