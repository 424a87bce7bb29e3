//! Register access over I2C or SPI.
//!
//! The DPS310 exposes the same register map on both buses. The driver only
//! needs byte-wise register reads and writes, so each bus is wrapped in a small
//! adapter implementing [`Interface`]. The adapter is chosen once when the
//! driver is constructed and cannot change afterwards.

use embedded_hal::{i2c, spi};

/// Which bus a driver instance talks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transport {
    /// I2C with the given 7-bit device address.
    I2c(u8),
    /// 4-wire SPI, chip select handled by the `SpiDevice`.
    Spi,
}

/// Register-level access to the sensor.
pub trait Interface {
    /// Error type of the underlying bus.
    type Error;

    /// Reads `buffer.len()` consecutive registers starting at `reg`.
    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes a single register.
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;

    /// Reports the bus this adapter drives.
    fn transport(&self) -> Transport;

    /// Reads a single register.
    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
        let mut buffer = [0u8];
        self.read_registers(reg, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Reads the `width`-bit field located `shift` bits up in `reg`.
    fn read_bits(&mut self, reg: u8, shift: u8, width: u8) -> Result<u8, Self::Error> {
        let register = self.read_register(reg)?;
        Ok((register >> shift) & field_mask(width))
    }

    /// Replaces the `width`-bit field located `shift` bits up in `reg`,
    /// leaving the other bits of the register untouched.
    fn write_bits(&mut self, reg: u8, shift: u8, width: u8, value: u8) -> Result<(), Self::Error> {
        let mask = field_mask(width) << shift;
        let register = self.read_register(reg)?;
        self.write_register(reg, (register & !mask) | ((value << shift) & mask))
    }
}

/// Mask covering the low `width` bits of a byte.
fn field_mask(width: u8) -> u8 {
    if width >= 8 {
        0xFF
    } else {
        (1u8 << width) - 1
    }
}

/// I2C adapter. Register reads are a write of the register address followed
/// by a repeated-start read.
#[derive(Debug)]
pub struct I2cInterface<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cInterface<I2C>
where
    I2C: i2c::I2c,
{
    /// Wraps an I2C bus talking to the sensor at `address`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Gives back the wrapped bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C> Interface for I2cInterface<I2C>
where
    I2C: i2c::I2c,
{
    type Error = I2C::Error;

    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &[reg], buffer)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[reg, value])
    }

    fn transport(&self) -> Transport {
        Transport::I2c(self.address)
    }
}

/// SPI adapter. The top bit of the address byte selects read (1) or write (0).
#[derive(Debug)]
pub struct SpiInterface<SPI> {
    spi: SPI,
}

/// Read flag in the SPI address byte.
const SPI_READ: u8 = 0x80;

impl<SPI> SpiInterface<SPI>
where
    SPI: spi::SpiDevice,
{
    /// Wraps an SPI device (bus plus chip select).
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Gives back the wrapped device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI> Interface for SpiInterface<SPI>
where
    SPI: spi::SpiDevice,
{
    type Error = SPI::Error;

    fn read_registers(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.transaction(&mut [
            spi::Operation::Write(&[reg | SPI_READ]),
            spi::Operation::Read(buffer),
        ])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        self.spi.write(&[reg & !SPI_READ, value])
    }

    fn transport(&self) -> Transport {
        Transport::Spi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    const ADDR: u8 = 0x77;

    #[test]
    fn field_masks() {
        assert_eq!(field_mask(1), 0b1);
        assert_eq!(field_mask(3), 0b111);
        assert_eq!(field_mask(4), 0x0F);
        assert_eq!(field_mask(8), 0xFF);
    }

    #[test]
    fn i2c_read_bits_isolates_field() {
        let mut i2c = I2cMock::new(&[I2cTransaction::write_read(ADDR, vec![0x08], vec![0b1011_0111])]);
        let mut bus = I2cInterface::new(i2c.clone(), ADDR);

        assert_eq!(bus.read_bits(0x08, 4, 1).unwrap(), 1);
        i2c.done();
    }

    #[test]
    fn i2c_write_bits_preserves_neighbours() {
        let mut i2c = I2cMock::new(&[
            I2cTransaction::write_read(ADDR, vec![0x08], vec![0b1100_0010]),
            I2cTransaction::write(ADDR, vec![0x08, 0b1100_0111]),
        ]);
        let mut bus = I2cInterface::new(i2c.clone(), ADDR);

        bus.write_bits(0x08, 0, 3, 0b111).unwrap();
        assert_eq!(bus.transport(), Transport::I2c(ADDR));
        i2c.done();
    }

    #[test]
    fn spi_sets_read_flag() {
        let mut spi = SpiMock::new(&[
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x8D]),
            SpiTransaction::read_vec(vec![0x10]),
            SpiTransaction::transaction_end(),
        ]);
        let mut bus = SpiInterface::new(spi.clone());

        assert_eq!(bus.read_register(0x0D).unwrap(), 0x10);
        spi.done();
    }

    #[test]
    fn spi_clears_read_flag_on_write() {
        let mut spi = SpiMock::new(&[
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x0C, 0x89]),
            SpiTransaction::transaction_end(),
        ]);
        let mut bus = SpiInterface::new(spi.clone());

        bus.write_register(0x0C, 0x89).unwrap();
        assert_eq!(bus.transport(), Transport::Spi);
        spi.done();
    }
}
