//! SPI25 protocol implementation
//!
//! This module implements the common SPI flash command sequences
//! as defined by JEDEC. Only single I/O transfers are used, which is all an
//! FTDI bridge can drive.

use crate::chip::JedecId;
use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::spi::{opcodes, AddressWidth, SpiCommand};

/// Read the JEDEC ID from a flash chip
///
/// The raw three bytes are returned as-is; callers decide how to treat an
/// all-ones or all-zero answer.
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> Result<JedecId> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;
    log::trace!("RDID -> {:02X?}", buf);
    Ok(JedecId(buf))
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Send the Write Enable command and check that the latch was set
///
/// A chip that ignores WREN (hardware write protect, or nothing on the bus
/// that pulls MISO low) is reported as [`Error::WriteProtected`].
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)?;

    let status = read_status1(master)?;
    if status & opcodes::SR1_WEL == 0 || status == 0xFF {
        return Err(Error::WriteProtected);
    }
    Ok(())
}

/// Send the Write Disable command
pub fn write_disable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    master.execute(&mut cmd)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// # Arguments
/// * `poll_delay_us` - Delay in microseconds between status register polls
/// * `timeout_us` - Maximum time to wait before returning Error::Timeout
///
/// Each status read is a USB round trip, which already costs a millisecond or
/// so; the delay mainly keeps long erases from flooding the bus.
pub fn wait_ready<M: SpiMaster + ?Sized>(
    master: &mut M,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        (timeout_us / poll_delay_us).max(1)
    } else {
        timeout_us.max(1)
    };

    for _ in 0..max_polls {
        let status = read_status1(master)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        if poll_delay_us > 0 {
            master.delay_us(poll_delay_us);
        }
    }

    Err(Error::Timeout)
}

/// Read opcode for the given address width
pub fn read_opcode(width: AddressWidth) -> u8 {
    match width {
        AddressWidth::FourByte => opcodes::READ_4B,
        _ => opcodes::READ,
    }
}

/// Page program opcode for the given address width
pub fn program_opcode(width: AddressWidth) -> u8 {
    match width {
        AddressWidth::FourByte => opcodes::PP_4B,
        _ => opcodes::PP,
    }
}

/// Read data from flash, split into transfers the master can carry
pub fn read<M: SpiMaster + ?Sized>(
    master: &mut M,
    opcode: u8,
    width: AddressWidth,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    let max_len = master.max_read_len().max(1);
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read(opcode, width, addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

/// Program a single page (up to page_size bytes)
///
/// The data must not cross a page boundary.
/// Page program typically takes 0.7-5ms, we poll every 100us with 50ms timeout.
pub fn program_page<M: SpiMaster + ?Sized>(
    master: &mut M,
    opcode: u8,
    width: AddressWidth,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    write_enable(master)?;

    let mut cmd = SpiCommand::write(opcode, width, addr, data);
    master.execute(&mut cmd)?;

    wait_ready(master, 100, 50_000)
}

/// Poll interval and timeout (both in microseconds) for erasing `size` bytes
///
/// - 4KB sector: 10ms poll, 1s timeout (typical 45-400ms)
/// - 32KB/64KB block: 100ms poll, 4s timeout (typical 120-2000ms)
/// - anything larger: 1s poll, 200s timeout
pub fn erase_timing(size: u32) -> (u32, u32) {
    match size {
        0..=4096 => (10_000, 1_000_000),
        4097..=65536 => (100_000, 4_000_000),
        _ => (1_000_000, 200_000_000),
    }
}

/// Erase a sector/block at the given address
pub fn erase_block<M: SpiMaster + ?Sized>(
    master: &mut M,
    opcode: u8,
    width: AddressWidth,
    addr: u32,
    size: u32,
) -> Result<()> {
    write_enable(master)?;

    let mut cmd = SpiCommand::erase(opcode, width, addr);
    master.execute(&mut cmd)?;

    let (poll, timeout) = erase_timing(size);
    wait_ready(master, poll, timeout)
}

/// Erase the entire chip
///
/// Chip erase typically takes 25-100s for large chips.
/// We poll every 1s with a 200s timeout.
pub fn chip_erase<M: SpiMaster + ?Sized>(master: &mut M, opcode: u8) -> Result<()> {
    write_enable(master)?;

    let mut cmd = SpiCommand::simple(opcode);
    master.execute(&mut cmd)?;

    wait_ready(master, 1_000_000, 200_000_000)
}

/// Enter 4-byte address mode
pub fn enter_4byte_mode<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::EN4B);
    master.execute(&mut cmd)
}

/// Exit 4-byte address mode
pub fn exit_4byte_mode<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::EX4B);
    master.execute(&mut cmd)
}
