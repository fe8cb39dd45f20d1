//! The register layer only needs three bus primitives. Reads report how many
//! bytes actually arrived so that short transfers can be told apart from bus faults.
//!
//! Every `embedded-hal-async` I2C bus is a transport. Such buses either fill the
//! whole buffer or fail, so they always report a full read.

use embedded_hal_async::i2c;

#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error;

    /// Writes `bytes` in a single transaction terminated by a stop condition
    async fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Writes `bytes` and, after a repeated start (the bus is not released),
    /// reads into `buffer`. Returns the number of bytes received.
    async fn write_read(
        &mut self,
        addr: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error>;

    /// Reads into `buffer` in a fresh transaction. Returns the number of bytes received.
    async fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<I: i2c::I2c> Transport for I {
    type Error = I::Error;

    async fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        i2c::I2c::write(self, addr, bytes).await
    }

    async fn write_read(
        &mut self,
        addr: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<usize, Self::Error> {
        i2c::I2c::write_read(self, addr, bytes, buffer).await?;
        Ok(buffer.len())
    }

    async fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        i2c::I2c::read(self, addr, buffer).await?;
        Ok(buffer.len())
    }
}
