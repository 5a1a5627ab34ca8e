//! Byte stream to and from one FTDI channel

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use crate::error::{FtdiError, Result};

/// How long to wait for the bridge to return requested bytes
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// An open FTDI channel
///
/// Writes go to the channel's transmit FIFO and reads drain its receive
/// FIFO. In addition the current pin state can be sampled directly, which
/// the asynchronous bit-bang mode relies on.
pub trait FtdiPort: Read + Write {
    /// Sample the channel's pins right now
    fn read_pins(&mut self) -> io::Result<u8>;
}

impl<P: FtdiPort + ?Sized> FtdiPort for Box<P> {
    fn read_pins(&mut self) -> io::Result<u8> {
        (**self).read_pins()
    }
}

impl<P: FtdiPort + ?Sized> FtdiPort for &mut P {
    fn read_pins(&mut self) -> io::Result<u8> {
        (**self).read_pins()
    }
}

/// Write all of `data` to the port
pub(crate) fn send<P: FtdiPort + ?Sized>(port: &mut P, data: &[u8]) -> Result<()> {
    port.write_all(data)
        .map_err(|e| FtdiError::TransferFailed(format!("write failed: {}", e)))?;
    log::trace!("Sent {} bytes", data.len());
    Ok(())
}

/// Read exactly `len` bytes, giving up after [`READ_TIMEOUT`] without
/// progress
pub(crate) fn recv<P: FtdiPort + ?Sized>(port: &mut P, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut total = 0;
    let mut last_progress = Instant::now();

    while total < len {
        match port.read(&mut buf[total..]) {
            Ok(0) => {
                if last_progress.elapsed() > READ_TIMEOUT {
                    return Err(FtdiError::TransferFailed(format!(
                        "timed out after {} of {} bytes",
                        total, len
                    )));
                }
                std::thread::sleep(Duration::from_micros(100));
            }
            Ok(n) => {
                total += n;
                last_progress = Instant::now();
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(FtdiError::TransferFailed(format!("read failed: {}", e)));
            }
        }
    }

    log::trace!("Received {} bytes", total);
    Ok(buf)
}

#[cfg(feature = "libftdi")]
impl FtdiPort for ftdi::Device {
    fn read_pins(&mut self) -> io::Result<u8> {
        ftdi::Device::read_pins(self).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
