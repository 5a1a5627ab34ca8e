//! Programmer trait definitions

use crate::error::Result;
use crate::spi::SpiCommand;
use bitflags::bitflags;

bitflags! {
    /// SPI master feature flags
    ///
    /// These flags indicate what capabilities a programmer supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiFeatures: u32 {
        /// Supports 4-byte addressing commands
        const FOUR_BYTE_ADDR = 1 << 0;
    }
}

impl Default for SpiFeatures {
    fn default() -> Self {
        SpiFeatures::empty()
    }
}

/// SPI Master trait
///
/// This trait represents a bridge that can execute half-duplex SPI commands:
/// the opcode, address and write data are shifted out, then `read_buf` is
/// filled, all within a single chip-select assertion.
pub trait SpiMaster {
    /// Get the features supported by this programmer
    fn features(&self) -> SpiFeatures;

    /// Get the maximum number of bytes that can be read in a single transaction
    fn max_read_len(&self) -> usize;

    /// Get the maximum number of bytes that can be written in a single transaction
    fn max_write_len(&self) -> usize;

    /// Execute a single SPI command
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<M: SpiMaster + ?Sized> SpiMaster for Box<M> {
    fn features(&self) -> SpiFeatures {
        (**self).features()
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        (**self).execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Helper function for implementing `SpiMaster::execute()` when the
/// internal transfer method returns a `Vec<u8>` instead of writing
/// directly into the read buffer.
///
/// # Example
///
/// ```ignore
/// fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> CoreResult<()> {
///     default_execute_with_vec(cmd, |write_data, read_len| {
///         self.spi_transfer(write_data, read_len)
///             .map_err(|e| CoreError::Transport(e.to_string()))
///     })
/// }
/// ```
pub fn default_execute_with_vec<F>(cmd: &mut SpiCommand<'_>, transfer_fn: F) -> Result<()>
where
    F: FnOnce(&[u8], usize) -> Result<Vec<u8>>,
{
    let write_data = cmd.outgoing_bytes();

    let read_len = cmd.read_buf.len();
    let result = transfer_fn(&write_data, read_len)?;
    if read_len > 0 {
        if result.len() < read_len {
            return Err(crate::error::Error::Transport(format!(
                "short read: expected {} bytes, got {}",
                read_len,
                result.len()
            )));
        }
        cmd.read_buf.copy_from_slice(&result[..read_len]);
    }

    Ok(())
}
