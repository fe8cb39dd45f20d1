//! SMBus Packet Error Code: CRC-8 with polynomial x^8 + x^2 + x + 1,
//! initial value 0, no reflection and no final xor.
//!
//! The PEC covers the whole logical transaction, so for a read it is computed over
//! the write address, the command, the read address and then the data bytes.

use crc::{Crc, Digest, CRC_8_SMBUS};

const SMBUS: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Running PEC over a frame that is fed piece by piece
pub fn digest() -> Digest<'static, u8> {
    SMBUS.digest()
}

/// Computes the PEC of a complete frame
pub fn pec(bytes: &[u8]) -> u8 {
    SMBUS.checksum(bytes)
}

/// PEC of a read transaction: `addr << 1`, `command`, `(addr << 1) | 1`, `data...`
pub fn read_frame_pec(addr: u8, command: u8, data: &[u8]) -> u8 {
    let mut digest = SMBUS.digest();
    digest.update(&[addr << 1, command, (addr << 1) | 1]);
    digest.update(data);
    digest.finalize()
}
