//! Register access on top of raw bus transactions.
//!
//! Reads are one write of the command byte followed by a repeated start and the data
//! phase, since the gauge needs the command latched before it can answer. With PEC
//! active one more byte is requested and checked against the frame CRC. Writes never
//! carry a PEC.
//!
//! Manufacturer access is an indirection: the subcommand goes to register 0x00 and
//! the gauge stages the answer either back at 0x00 or in the ManufacturerData block.

use byteorder::{ByteOrder, LittleEndian};
use embedded_hal_async::delay::DelayNs;

use crate::{
    pec, registers::commands, smart_pec::PecOverride, transport::Transport, Bq4050, ChipError,
};

/// Longest block the gauge returns in a single read
pub const MAX_BLOCK_LEN: usize = 32;

/// Printable contents of a block read
pub type Block = heapless::String<MAX_BLOCK_LEN>;

const MAX_SCALAR_LEN: usize = 4;

/// Time the gauge needs to stage the result of a subcommand
const MAC_SETTLE_MS: u32 = 5;

fn printable(bytes: &[u8]) -> Block {
    let mut text = Block::new();

    for &b in bytes.iter().filter(|b| (0x20..=0x7E).contains(*b)) {
        // Never overflows, blocks are at most MAX_BLOCK_LEN long
        let _ = text.push(b as char);
    }

    text
}

impl<T, D, E> Bq4050<T, D>
where
    D: DelayNs,
    T: Transport<Error = E>,
{
    /// Fills `data` from `command`, validating the trailing PEC if it is active
    async fn read_scalar(&mut self, command: u8, data: &mut [u8]) -> Result<(), ChipError<E>> {
        let mut frame = [0; MAX_SCALAR_LEN + 1];
        let wanted = data.len() + usize::from(self.pec_enabled);
        let frame = &mut frame[..wanted];

        let received = self.bus.write_read(self.addr, &[command], frame).await?;
        if received < wanted {
            warn!(
                "short read on 0x{:02x}: wanted {}, got {}",
                command,
                wanted,
                received
            );
            return Err(ChipError::Timeout);
        }

        let (payload, trailer) = frame.split_at(data.len());

        if self.pec_enabled {
            let expected = pec::read_frame_pec(self.addr, command, payload);

            if trailer[0] != expected {
                warn!(
                    "PEC mismatch on 0x{:02x}: expected 0x{:02x}, got 0x{:02x}",
                    command,
                    expected,
                    trailer[0]
                );
                return Err(ChipError::Pec);
            }
        }

        data.copy_from_slice(payload);
        Ok(())
    }

    /// Reads an 8-bit register
    pub async fn read_u8(&mut self, command: u8) -> Result<u8, ChipError<E>> {
        let mut data = [0];
        let result = self.read_scalar(command, &mut data).await.map(|_| data[0]);
        self.record(result)
    }

    /// Reads a 16-bit register
    pub async fn read_u16(&mut self, command: u8) -> Result<u16, ChipError<E>> {
        let mut data = [0; 2];
        let result = self
            .read_scalar(command, &mut data)
            .await
            .map(|_| LittleEndian::read_u16(&data));
        self.record(result)
    }

    /// Reads a 32-bit register
    pub async fn read_u32(&mut self, command: u8) -> Result<u32, ChipError<E>> {
        let mut data = [0; 4];
        let result = self
            .read_scalar(command, &mut data)
            .await
            .map(|_| LittleEndian::read_u32(&data));
        self.record(result)
    }

    /// Writes an 8-bit register
    pub async fn write_u8(&mut self, command: u8, value: u8) -> Result<(), ChipError<E>> {
        let result = self
            .bus
            .write(self.addr, &[command, value])
            .await
            .map_err(ChipError::from);
        self.record(result)
    }

    /// Writes a 16-bit register, low byte first
    pub async fn write_u16(&mut self, command: u8, value: u16) -> Result<(), ChipError<E>> {
        let mut request = [command, 0, 0];
        LittleEndian::write_u16(&mut request[1..], value);

        let result = self
            .bus
            .write(self.addr, &request)
            .await
            .map_err(ChipError::from);
        self.record(result)
    }

    /// Length-prefixed block read. The length comes in its own transfer, then the
    /// data (and PEC, if active) in a second one
    async fn read_block_inner(
        &mut self,
        command: u8,
        block: &mut [u8; MAX_BLOCK_LEN],
    ) -> Result<usize, ChipError<E>> {
        let mut length = [0];

        let received = self.bus.write_read(self.addr, &[command], &mut length).await?;
        if received < 1 {
            warn!("no block length from 0x{:02x}", command);
            return Err(ChipError::Timeout);
        }

        let length = usize::from(length[0]);
        debug!("block 0x{:02x} is {} bytes long", command, length);

        if length == 0 {
            return Ok(0);
        }

        if length > MAX_BLOCK_LEN {
            warn!("block 0x{:02x} too long: {}", command, length);
            return Err(ChipError::InvalidParameter);
        }

        let mut frame = [0; MAX_BLOCK_LEN + 1];
        let wanted = length + usize::from(self.pec_enabled);

        let received = self.bus.read(self.addr, &mut frame[..wanted]).await?;
        if received < wanted {
            warn!(
                "block 0x{:02x} ended early: wanted {}, got {}",
                command,
                wanted,
                received
            );
            return Err(ChipError::Timeout);
        }

        // TODO: check the block PEC over {addr_w, command, addr_r, length, data..}.
        // That needs the length and data phases merged into one bus transaction;
        // until then the trailing PEC byte is consumed and ignored.
        if self.pec_enabled {
            debug!("block PEC not validated for 0x{:02x}", command);
        }

        block[..length].copy_from_slice(&frame[..length]);
        Ok(length)
    }

    /// Reads a block register as text, keeping printable ASCII only.
    /// A zero-length block is an empty string, not an error
    pub async fn read_block(&mut self, command: u8) -> Result<Block, ChipError<E>> {
        let mut raw = [0; MAX_BLOCK_LEN];
        let result = self
            .read_block_inner(command, &mut raw)
            .await
            .map(|len| printable(&raw[..len]));
        self.record(result)
    }

    /// Reads a block register as is. Returns the number of valid bytes in `block`
    pub async fn read_block_raw(
        &mut self,
        command: u8,
        block: &mut [u8; MAX_BLOCK_LEN],
    ) -> Result<usize, ChipError<E>> {
        let result = self.read_block_inner(command, block).await;
        self.record(result)
    }

    /// 16-bit read with PEC decided per register, see [`crate::smart_pec`]
    pub async fn read_u16_smart(&mut self, command: u8) -> Result<u16, ChipError<E>> {
        let mut gauge = PecOverride::new(self, command);
        let result = gauge.read_u16(command).await;
        result
    }

    /// 32-bit read with PEC decided per register
    pub async fn read_u32_smart(&mut self, command: u8) -> Result<u32, ChipError<E>> {
        let mut gauge = PecOverride::new(self, command);
        let result = gauge.read_u32(command).await;
        result
    }

    /// Block read with PEC decided per register
    pub async fn read_block_smart(&mut self, command: u8) -> Result<Block, ChipError<E>> {
        let mut gauge = PecOverride::new(self, command);
        let result = gauge.read_block(command).await;
        result
    }

    /// Issues a subcommand and gives the gauge time to stage the answer
    async fn mac_request(&mut self, subcommand: u16) -> Result<(), ChipError<E>> {
        debug!("MAC request 0x{:04x}", subcommand);

        self.write_u16(commands::MANUFACTURER_ACCESS, subcommand)
            .await?;
        self.delay.delay_ms(MAC_SETTLE_MS).await;

        Ok(())
    }

    /// Manufacturer access with a 16-bit answer
    pub async fn manufacturer_access_u16(&mut self, subcommand: u16) -> Result<u16, ChipError<E>> {
        self.mac_request(subcommand).await?;
        self.read_u16(commands::MANUFACTURER_ACCESS).await
    }

    /// Manufacturer access with a 32-bit answer
    pub async fn manufacturer_access_u32(&mut self, subcommand: u16) -> Result<u32, ChipError<E>> {
        self.mac_request(subcommand).await?;
        self.read_u32(commands::MANUFACTURER_ACCESS).await
    }

    /// Manufacturer access answered through the ManufacturerData block, kept as is.
    /// Returns the number of valid bytes in `block`
    pub async fn manufacturer_block_raw(
        &mut self,
        subcommand: u16,
        block: &mut [u8; MAX_BLOCK_LEN],
    ) -> Result<usize, ChipError<E>> {
        self.mac_request(subcommand).await?;
        self.read_block_raw(commands::MANUFACTURER_DATA, block)
            .await
    }

    /// Manufacturer access answered through the ManufacturerData block, as text
    pub async fn manufacturer_block(&mut self, subcommand: u16) -> Result<Block, ChipError<E>> {
        let mut raw = [0; MAX_BLOCK_LEN];
        let len = self.manufacturer_block_raw(subcommand, &mut raw).await?;
        Ok(printable(&raw[..len]))
    }

    /// Sends a subcommand together with a 16-bit argument in one transaction
    pub async fn manufacturer_access_write(
        &mut self,
        subcommand: u16,
        data: u16,
    ) -> Result<(), ChipError<E>> {
        let mut request = [commands::MANUFACTURER_ACCESS, 0, 0, 0, 0];
        LittleEndian::write_u16(&mut request[1..3], subcommand);
        LittleEndian::write_u16(&mut request[3..5], data);

        debug!("MAC write 0x{:04x} <- 0x{:04x}", subcommand, data);

        let result = self
            .bus
            .write(self.addr, &request)
            .await
            .map_err(ChipError::from);
        self.record(result)
    }
}
