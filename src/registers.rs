//! These are low-level definitions for the BQ4050

use crate::fmt::bitflags;

/// This is a list of SBS commands (i.e *registers*) supported by the gauge
pub mod commands {
    pub const MANUFACTURER_ACCESS: u8 = 0x00;
    pub const REMAINING_CAPACITY_ALARM: u8 = 0x01;
    pub const REMAINING_TIME_ALARM: u8 = 0x02;
    pub const BATTERY_MODE: u8 = 0x03;
    pub const TEMPERATURE: u8 = 0x08;
    pub const VOLTAGE: u8 = 0x09;
    pub const CURRENT: u8 = 0x0A;
    pub const AVERAGE_CURRENT: u8 = 0x0B;
    pub const RELATIVE_STATE_OF_CHARGE: u8 = 0x0D;
    pub const ABSOLUTE_STATE_OF_CHARGE: u8 = 0x0E;
    pub const REMAINING_CAPACITY: u8 = 0x0F;
    pub const FULL_CHARGE_CAPACITY: u8 = 0x10;
    pub const RUN_TIME_TO_EMPTY: u8 = 0x11;
    pub const AVERAGE_TIME_TO_FULL: u8 = 0x13;
    pub const BATTERY_STATUS: u8 = 0x16;
    pub const CYCLE_COUNT: u8 = 0x17;
    pub const DESIGN_CAPACITY: u8 = 0x18;
    pub const DESIGN_VOLTAGE: u8 = 0x19;
    pub const MANUFACTURE_DATE: u8 = 0x1B;
    pub const SERIAL_NUMBER: u8 = 0x1C;
    pub const MANUFACTURER_NAME: u8 = 0x20;
    pub const DEVICE_NAME: u8 = 0x21;
    pub const DEVICE_CHEMISTRY: u8 = 0x22;
    pub const MANUFACTURER_DATA: u8 = 0x23;
    pub const CELL_VOLTAGE_4: u8 = 0x3C;
    pub const CELL_VOLTAGE_3: u8 = 0x3D;
    pub const CELL_VOLTAGE_2: u8 = 0x3E;
    pub const CELL_VOLTAGE_1: u8 = 0x3F;

    // Data flash window, addressed through manufacturer access
    pub const DATA_FLASH: u8 = 0x40;

    // Status and flag registers. These do not answer with a PEC byte
    pub const SAFETY_ALERT: u8 = 0x50;
    pub const SAFETY_STATUS: u8 = 0x51;
    pub const PF_ALERT: u8 = 0x52;
    pub const PF_STATUS: u8 = 0x53;
    pub const OPERATION_STATUS: u8 = 0x54;
    pub const CHARGING_STATUS: u8 = 0x55;
    pub const GAUGING_STATUS: u8 = 0x56;
    pub const MANUFACTURING_STATUS: u8 = 0x57;

    // Extended commands
    pub const AFE_REGISTER: u8 = 0x58;
    pub const LIFETIME_DATA_BLOCK_1: u8 = 0x60;
    pub const LIFETIME_DATA_BLOCK_2: u8 = 0x61;
    pub const LIFETIME_DATA_BLOCK_3: u8 = 0x62;
    pub const LIFETIME_DATA_BLOCK_4: u8 = 0x63;
    pub const LIFETIME_DATA_BLOCK_5: u8 = 0x64;
    pub const MANUFACTURER_INFO: u8 = 0x70;
    pub const DA_STATUS_1: u8 = 0x71;
    pub const DA_STATUS_2: u8 = 0x72;
}

/// Manufacturer access subcommands, written to `MANUFACTURER_ACCESS`.
/// Most reads work in sealed mode, most writes need the device unsealed
pub mod mac_subcommands {
    pub const DEVICE_TYPE: u16 = 0x0001;
    pub const FIRMWARE_VERSION: u16 = 0x0002;
    pub const HARDWARE_VERSION: u16 = 0x0003;
    pub const IF_CHECKSUM: u16 = 0x0004;
    pub const STATIC_DF_SIGNATURE: u16 = 0x0005;
    pub const ALL_DF_SIGNATURE: u16 = 0x0009;
    pub const SHUTDOWN_MODE: u16 = 0x0010;
    pub const SLEEP_MODE: u16 = 0x0011;
    pub const PRECHARGE_FET: u16 = 0x001E;
    pub const CHARGE_FET: u16 = 0x001F;
    pub const DISCHARGE_FET: u16 = 0x0020;
    pub const FET_CONTROL: u16 = 0x0022;
    pub const CALIBRATION_MODE: u16 = 0x002D;
    pub const SEAL_DEVICE: u16 = 0x0030;
    pub const DEVICE_RESET: u16 = 0x0041;
    pub const DATA_FLASH_ADDRESS: u16 = 0x0044;
    pub const LIFETIME_DATA_BLOCK_1: u16 = 0x0060;
    pub const LIFETIME_DATA_BLOCK_2: u16 = 0x0061;
    pub const LIFETIME_DATA_BLOCK_3: u16 = 0x0062;
    pub const EDV0_THRESHOLD: u16 = 0x0080;
    pub const EDV1_THRESHOLD: u16 = 0x0081;
    pub const EDV2_THRESHOLD: u16 = 0x0082;
    pub const CEDV_COMPENSATION: u16 = 0x0083;
    pub const FIXED_EDV0: u16 = 0x0084;
    pub const FIXED_EDV1: u16 = 0x0085;
    pub const FIXED_EDV2: u16 = 0x0086;
    pub const QUALIFIED_DISCHARGE_COUNT: u16 = 0x0087;
    pub const RESET_LEARNING: u16 = 0x0088;
}

bitflags! {
    /// BatteryStatus(), standard Smart Battery Data layout. The low nibble is the error code
    pub struct BatteryStatus: u16 {
        const OCA = 1 << 15;
        const TCA = 1 << 14;
        const OTA = 1 << 12;
        const TDA = 1 << 11;
        const RCA = 1 << 9;
        const RTA = 1 << 8;
        const INIT = 1 << 7;
        const DSG = 1 << 6;
        const FC = 1 << 5;
        const FD = 1 << 4;
        const EC3 = 1 << 3;
        const EC2 = 1 << 2;
        const EC1 = 1 << 1;
        const EC0 = 1 << 0;
    }
}

bitflags! {
    /// Low word of SafetyAlert() / SafetyStatus()
    pub struct SafetyFlags: u16 {
        const CUVC = 1 << 14;
        const OTD = 1 << 13;
        const OTC = 1 << 12;
        const ASCDL = 1 << 11;
        const ASCD = 1 << 10;
        const ASCCL = 1 << 9;
        const ASCC = 1 << 8;
        const AOLDL = 1 << 7;
        const AOLD = 1 << 6;
        const OCD2 = 1 << 5;
        const OCD1 = 1 << 4;
        const OCC2 = 1 << 3;
        const OCC1 = 1 << 2;
        const COV = 1 << 1;
        const CUV = 1 << 0;
    }
}

bitflags! {
    /// Low word of PFAlert() / PFStatus()
    pub struct PermanentFailureFlags: u16 {
        const VIMA = 1 << 12;
        const VIMR = 1 << 11;
        const SOTF = 1 << 6;
        const SOT = 1 << 4;
        const SOCD = 1 << 3;
        const SOCC = 1 << 2;
        const SOV = 1 << 1;
        const SUV = 1 << 0;
    }
}

bitflags! {
    /// CEDV part of GaugingStatus()
    pub struct GaugingStatus: u16 {
        const QUALIFIED_DISCHARGE = 1 << 6;
        const VDQ = 1 << 5;
        const SMOOTHING = 1 << 4;
        const FCC_UPDATED = 1 << 3;
        const EDV2 = 1 << 2;
        const EDV1 = 1 << 1;
        const EDV0 = 1 << 0;
    }
}

bitflags! {
    /// ManufacturingStatus(). Bits 13 and 14 carry the security state
    pub struct ManufacturingStatus: u16 {
        const FULL_ACCESS = 1 << 14;
        const UNSEALED = 1 << 13;
        const PF_EN = 1 << 6;
        const LF_EN = 1 << 5;
        const FET_EN = 1 << 4;
        const GAUGE_EN = 1 << 3;
        const DSG_EN = 1 << 2;
        const CHG_EN = 1 << 1;
        const PCHG_EN = 1 << 0;
    }
}

impl From<u16> for BatteryStatus {
    fn from(value: u16) -> Self {
        BatteryStatus::from_bits_truncate(value)
    }
}

impl From<u16> for SafetyFlags {
    fn from(value: u16) -> Self {
        SafetyFlags::from_bits_truncate(value)
    }
}

impl From<u16> for PermanentFailureFlags {
    fn from(value: u16) -> Self {
        PermanentFailureFlags::from_bits_truncate(value)
    }
}

impl From<u16> for GaugingStatus {
    fn from(value: u16) -> Self {
        GaugingStatus::from_bits_truncate(value)
    }
}

impl From<u16> for ManufacturingStatus {
    fn from(value: u16) -> Self {
        ManufacturingStatus::from_bits_truncate(value)
    }
}

impl BatteryStatus {
    /// SBS error code from the low nibble (0 = OK)
    pub fn error_code(&self) -> u8 {
        (self.bits() & 0x000F) as u8
    }
}
