//! SPI through the MPSSE engine
//!
//! The MPSSE shifts whole bytes in hardware. One SPI transaction is a single
//! command buffer: pull CS low, clock the outgoing bytes, clock in the read
//! bytes, release CS and flush.

use std::time::Duration;

use ftflasher_core::error::{Error as CoreError, Result as CoreResult};
use ftflasher_core::programmer::{default_execute_with_vec, SpiFeatures, SpiMaster};
use ftflasher_core::spi::SpiCommand;

use crate::error::{FtdiError, Result};
use crate::port::{self, FtdiPort};
use crate::protocol::*;

/// Smallest TCK divisor the engine accepts
pub const MIN_DIVISOR: u32 = 2;

/// Largest TCK divisor (16-bit register value, times two)
pub const MAX_DIVISOR: u32 = 131_072;

/// Divisor of `base_clock` giving the fastest SCK not above `frequency`
///
/// The engine only divides by even numbers, so odd results are rounded up.
pub fn clock_divisor(base_clock: u32, frequency: u32) -> u32 {
    let frequency = frequency.max(1);
    let mut divisor = base_clock.div_ceil(frequency);
    if divisor % 2 != 0 {
        divisor += 1;
    }
    divisor.clamp(MIN_DIVISOR, MAX_DIVISOR)
}

/// MPSSE SPI settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpsseSettings {
    /// Device type of the channel, for its base clock
    pub device_type: FtdiDeviceType,
    /// Requested SCK frequency in Hz
    pub frequency: u32,
    /// Chip select line, 0 for ADBUS3 up to 4 for ADBUS7
    pub chip_select: u8,
}

impl MpsseSettings {
    /// TCK divisor for the requested frequency
    pub fn divisor(&self) -> u32 {
        clock_divisor(self.device_type.base_clock(), self.frequency)
    }

    /// SCK frequency actually produced
    pub fn actual_frequency(&self) -> u32 {
        self.device_type.base_clock() / self.divisor()
    }

    fn cs_bit(&self) -> u8 {
        1 << (PIN_CS0 + self.chip_select)
    }

    /// Commands that bring a freshly opened channel into SPI mode 0
    pub fn init_sequence(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);

        if self.device_type.is_high_speed() {
            buf.push(DIS_DIV_5);
            buf.push(CLK_NO_ADAPTIVE);
            buf.push(DIS_3_PHASE);
        }

        let value = (self.divisor() / 2 - 1) as u16;
        buf.push(TCK_DIVISOR);
        buf.extend_from_slice(&value.to_le_bytes());

        buf.push(LOOPBACK_END);

        buf.push(SET_BITS_LOW);
        buf.push(self.cs_bit());
        buf.push(self.pin_direction());
        buf
    }

    fn pin_direction(&self) -> u8 {
        (1 << PIN_SK) | (1 << PIN_DO) | self.cs_bit()
    }
}

/// SPI master driving an FTDI channel in MPSSE mode
pub struct MpsseSpi<P: FtdiPort> {
    port: P,
    settings: MpsseSettings,
}

impl<P: FtdiPort> MpsseSpi<P> {
    /// Initialise the engine on an already opened channel
    pub fn new(mut port: P, settings: MpsseSettings) -> Result<Self> {
        if settings.chip_select >= MPSSE_CS_COUNT {
            return Err(FtdiError::InvalidPins(format!(
                "MPSSE chip select {} out of range (0-{})",
                settings.chip_select,
                MPSSE_CS_COUNT - 1
            )));
        }

        log::debug!(
            "MPSSE divisor {} for {} Hz requested",
            settings.divisor(),
            settings.frequency
        );
        port::send(&mut port, &settings.init_sequence())?;

        log::info!(
            "FTDI MPSSE SPI at {:.3} MHz on CS{}",
            settings.actual_frequency() as f64 / 1_000_000.0,
            settings.chip_select
        );

        Ok(Self { port, settings })
    }

    /// Settings the engine was initialised with
    pub fn settings(&self) -> &MpsseSettings {
        &self.settings
    }

    /// Borrow the underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Perform an SPI transfer
    fn spi_transfer(&mut self, write_data: &[u8], read_len: usize) -> Result<Vec<u8>> {
        if write_data.len() > MPSSE_MAX_TRANSFER || read_len > MPSSE_MAX_TRANSFER {
            return Err(FtdiError::TransferFailed(
                "transfer length exceeds 64KB limit".to_string(),
            ));
        }

        let dir = self.settings.pin_direction();
        let mut buf = Vec::with_capacity(write_data.len() + 16);

        buf.push(SET_BITS_LOW);
        buf.push(0);
        buf.push(dir);

        if !write_data.is_empty() {
            let n = (write_data.len() - 1) as u16;
            buf.push(MPSSE_DO_WRITE | MPSSE_WRITE_NEG);
            buf.extend_from_slice(&n.to_le_bytes());
            buf.extend_from_slice(write_data);
        }

        if read_len > 0 {
            let n = (read_len - 1) as u16;
            buf.push(MPSSE_DO_READ);
            buf.extend_from_slice(&n.to_le_bytes());
        }

        buf.push(SET_BITS_LOW);
        buf.push(self.settings.cs_bit());
        buf.push(dir);

        buf.push(SEND_IMMEDIATE);

        port::send(&mut self.port, &buf)?;

        if read_len > 0 {
            port::recv(&mut self.port, read_len)
        } else {
            Ok(Vec::new())
        }
    }

    /// Release I/O pins (set all as inputs)
    fn release_pins(&mut self) -> Result<()> {
        port::send(&mut self.port, &[SET_BITS_LOW, 0x00, 0x00])
    }
}

impl<P: FtdiPort> Drop for MpsseSpi<P> {
    fn drop(&mut self) {
        if let Err(e) = self.release_pins() {
            log::warn!("Failed to release pins on close: {}", e);
        }
    }
}

impl<P: FtdiPort> SpiMaster for MpsseSpi<P> {
    fn features(&self) -> SpiFeatures {
        SpiFeatures::FOUR_BYTE_ADDR
    }

    fn max_read_len(&self) -> usize {
        MPSSE_MAX_TRANSFER
    }

    fn max_write_len(&self) -> usize {
        256
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> CoreResult<()> {
        default_execute_with_vec(cmd, |write_data, read_len| {
            self.spi_transfer(write_data, read_len)
                .map_err(|e| CoreError::Transport(e.to_string()))
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}
