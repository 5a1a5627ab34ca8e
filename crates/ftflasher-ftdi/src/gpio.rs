//! Software SPI on the FTDI bit-bang GPIO port
//!
//! Every pin update is one byte written to the channel. In synchronous
//! bit-bang mode the chip answers each written byte with the pin state it
//! sampled just before applying it, so a whole transaction is a single
//! write followed by a single read. In asynchronous mode nothing is echoed
//! and the pins are sampled after every update, one round trip per edge.

use std::time::Duration;

use ftflasher_core::error::{Error as CoreError, Result as CoreResult};
use ftflasher_core::programmer::bitbang::{self, Edge};
use ftflasher_core::programmer::{default_execute_with_vec, BitbangSpiMaster, SpiFeatures, SpiMaster};
use ftflasher_core::spi::SpiCommand;

use crate::error::{FtdiError, Result};
use crate::mode::{FtdiMode, GpioPins};
use crate::port::{self, FtdiPort};
use crate::protocol::FTDI_HW_BUFFER_SIZE;

/// Pin updates sent per synchronous write
///
/// One slot of the chip's buffer is taken by the trailing sample request.
const SYNC_CHUNK: usize = FTDI_HW_BUFFER_SIZE - 1;

/// SPI master clocking the bus by toggling GPIO pins
pub struct GpioSpi<P: FtdiPort> {
    port: P,
    pins: GpioPins,
    synchronous: bool,
}

impl<P: FtdiPort> GpioSpi<P> {
    /// Take over a channel already switched into a bit-bang mode
    ///
    /// `mode` must be [`FtdiMode::Sync`] or [`FtdiMode::Async`] and match the
    /// bit mode the channel was opened with.
    pub fn new(mut port: P, mode: FtdiMode, pins: GpioPins) -> Result<Self> {
        if !mode.is_bitbang() {
            return Err(FtdiError::InvalidParameter(format!(
                "{} is not a bit-bang mode",
                mode
            )));
        }
        pins.validate()?;

        let idle = pins.levels(false, false, false);
        port::send(&mut port, &[idle])?;
        let synchronous = mode == FtdiMode::Sync;
        if synchronous {
            port::recv(&mut port, 1)?;
        }

        log::debug!("FTDI GPIO SPI ({}) on pins {}", mode, pins);
        Ok(Self {
            port,
            pins,
            synchronous,
        })
    }

    /// Pin assignment in use
    pub fn pins(&self) -> &GpioPins {
        &self.pins
    }

    /// Borrow the underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    fn apply_sync(&mut self, levels: &[u8]) -> Result<Vec<u8>> {
        let mut samples = Vec::with_capacity(levels.len());
        for chunk in levels.chunks(SYNC_CHUNK) {
            let mut out = Vec::with_capacity(chunk.len() + 1);
            out.extend_from_slice(chunk);
            out.extend(chunk.last().copied());
            port::send(&mut self.port, &out)?;

            // Byte i+1 of the echo is the pin state after update i.
            let echo = port::recv(&mut self.port, out.len())?;
            samples.extend_from_slice(&echo[1..]);
        }
        Ok(samples)
    }

    fn apply_async(&mut self, levels: &[u8]) -> Result<Vec<u8>> {
        let mut samples = Vec::with_capacity(levels.len());
        for &level in levels {
            port::send(&mut self.port, &[level])?;
            let sample = self
                .port
                .read_pins()
                .map_err(|e| FtdiError::TransferFailed(format!("pin read failed: {}", e)))?;
            samples.push(sample);
        }
        Ok(samples)
    }
}

impl<P: FtdiPort> BitbangSpiMaster for GpioSpi<P> {
    fn clock_edges(&mut self, edges: &[Edge]) -> CoreResult<Vec<bool>> {
        let levels: Vec<u8> = edges
            .iter()
            .map(|e| self.pins.levels(e.cs_active, e.sck, e.mosi))
            .collect();

        let samples = if self.synchronous {
            self.apply_sync(&levels)
        } else {
            self.apply_async(&levels)
        }
        .map_err(|e| CoreError::Transport(e.to_string()))?;

        Ok(samples.iter().map(|&s| self.pins.miso_level(s)).collect())
    }
}

impl<P: FtdiPort> SpiMaster for GpioSpi<P> {
    fn features(&self) -> SpiFeatures {
        SpiFeatures::FOUR_BYTE_ADDR
    }

    fn max_read_len(&self) -> usize {
        4096
    }

    fn max_write_len(&self) -> usize {
        256
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> CoreResult<()> {
        default_execute_with_vec(cmd, |write_data, read_len| {
            bitbang::single::transfer(self, write_data, read_len)
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}
