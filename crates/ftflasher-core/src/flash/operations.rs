//! High-level flash operations
//!
//! Everything here works on byte ranges of an identified chip. Writes are
//! sector based read-modify-write: the affected erase sectors are read,
//! patched in memory, and only the sectors that actually change are erased
//! and programmed.

use crate::chip::{EraseBlock, WriteGranularity};
use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::protocol;

use super::context::FlashContext;
use super::progress::{OperationProgress, Phase};

/// The erased value for flash memory (all bits set)
pub const ERASED_VALUE: u8 = 0xFF;

/// Chunk size used for reads that report progress
const READ_CHUNK_SIZE: usize = 4096;

/// Determine if an erase is required to transition from `have` to `want`
///
/// Flash memory can only change bits from 1 to 0 during writes. To change
/// bits from 0 to 1, an erase is required (which sets all bits to 1).
pub fn need_erase(have: &[u8], want: &[u8], granularity: WriteGranularity) -> bool {
    debug_assert_eq!(have.len(), want.len());

    match granularity {
        // (have & want) != want means some bit in want is 1 but in have is 0
        WriteGranularity::Bit => have.iter().zip(want).any(|(h, w)| (h & w) != *w),
        // A changed byte must still be in the erased state
        WriteGranularity::Byte | WriteGranularity::Page => have
            .iter()
            .zip(want)
            .any(|(h, w)| h != w && *h != ERASED_VALUE),
    }
}

/// A contiguous range of bytes that needs to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRange {
    /// Start offset within the compared buffers
    pub start: usize,
    /// Length in bytes
    pub len: usize,
}

/// Find every contiguous run of bytes where `have` and `want` differ
pub fn changed_ranges(have: &[u8], want: &[u8]) -> Vec<WriteRange> {
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < have.len() {
        if have[i] == want[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < have.len() && have[i] != want[i] {
            i += 1;
        }
        ranges.push(WriteRange {
            start,
            len: i - start,
        });
    }
    ranges
}

/// Statistics about a completed write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Sectors that were erased before programming
    pub sectors_erased: usize,
    /// Sectors whose contents already matched
    pub sectors_skipped: usize,
    /// Bytes sent with page program commands
    pub bytes_programmed: usize,
}

/// Statistics about a completed erase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EraseStats {
    /// Number of erase commands issued
    pub blocks_erased: usize,
    /// Whether the chip erase command was used
    pub chip_erase: bool,
}

fn check_abort<P: OperationProgress + ?Sized>(progress: &P) -> Result<()> {
    if progress.should_abort() {
        Err(Error::Aborted)
    } else {
        Ok(())
    }
}

/// Read flash contents without progress reporting
pub fn read<M: SpiMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    if !ctx.is_valid_range(addr, buf.len()) {
        return Err(Error::AddressOutOfBounds);
    }

    let opcode = ctx.read_opcode();
    let width = ctx.address_width();
    ctx.with_address_mode(master, |m| protocol::read(m, opcode, width, addr, buf))
}

/// Read `buf.len()` bytes starting at `addr`, reporting progress
pub fn read_range<M, P>(
    master: &mut M,
    ctx: &FlashContext,
    addr: u32,
    buf: &mut [u8],
    progress: &mut P,
) -> Result<()>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    if !ctx.is_valid_range(addr, buf.len()) {
        return Err(Error::AddressOutOfBounds);
    }

    progress.start(Phase::Reading, buf.len() as u64);
    read_chunks(master, ctx, addr, buf, progress)
}

fn read_chunks<M, P>(
    master: &mut M,
    ctx: &FlashContext,
    addr: u32,
    buf: &mut [u8],
    progress: &mut P,
) -> Result<()>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    let opcode = ctx.read_opcode();
    let width = ctx.address_width();

    ctx.with_address_mode(master, |m| {
        let mut done = 0;
        for chunk in buf.chunks_mut(READ_CHUNK_SIZE) {
            check_abort(progress)?;
            protocol::read(m, opcode, width, addr + done as u32, chunk)?;
            done += chunk.len();
            progress.advance(done as u64);
        }
        Ok(())
    })
}

/// Program `data` at `addr`, splitting on page boundaries
///
/// The target must already be in a state that allows the write (erased, or
/// only 1->0 transitions). Must be called with the chip in the right address
/// mode.
fn program<M, P>(
    master: &mut M,
    ctx: &FlashContext,
    addr: u32,
    data: &[u8],
    progress: &P,
) -> Result<()>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    let page_size = ctx.page_size();
    let max_write = master.max_write_len().max(1);
    let opcode = ctx.program_opcode();
    let width = ctx.address_width();

    let mut offset = 0usize;
    while offset < data.len() {
        let current = addr as usize + offset;
        let to_page_end = page_size - current % page_size;
        let chunk_len = to_page_end.min(max_write).min(data.len() - offset);

        check_abort(progress)?;
        protocol::program_page(
            master,
            opcode,
            width,
            current as u32,
            &data[offset..offset + chunk_len],
        )?;
        offset += chunk_len;
    }
    Ok(())
}

fn erase_one<M: SpiMaster + ?Sized>(
    master: &mut M,
    ctx: &FlashContext,
    block: EraseBlock,
    addr: u32,
) -> Result<()> {
    log::trace!(
        "Erasing {} bytes at 0x{:08X} with opcode 0x{:02X}",
        block.size,
        addr,
        block.opcode
    );
    let opcode = ctx.erase_opcode(block.opcode);
    match protocol::erase_block(master, opcode, ctx.address_width(), addr, block.size) {
        Err(Error::Timeout) => Err(Error::EraseError { addr }),
        other => other,
    }
}

/// Select the largest sector erase block that starts at `addr` and fits in
/// `remaining` bytes
fn select_erase_block(ctx: &FlashContext, addr: u32, remaining: u32) -> Option<EraseBlock> {
    ctx.chip
        .sector_erase_blocks()
        .filter(|eb| eb.size <= remaining && addr % eb.size == 0)
        .max_by_key(|eb| eb.size)
        .copied()
}

/// Erase `len` bytes starting at `addr`
///
/// The range must be aligned to the smallest erase block of the chip. Each
/// step uses the largest block that is aligned and fits. A range covering
/// the whole chip uses the chip erase command if the chip has one.
pub fn erase_range<M, P>(
    master: &mut M,
    ctx: &FlashContext,
    addr: u32,
    len: u32,
    progress: &mut P,
) -> Result<EraseStats>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    if !ctx.is_valid_range(addr, len as usize) {
        return Err(Error::AddressOutOfBounds);
    }

    let min_size = ctx
        .chip
        .min_erase_size()
        .or_else(|| ctx.chip.chip_erase_block().map(|eb| eb.size))
        .ok_or(Error::OpcodeNotSupported)?;
    if addr % min_size != 0 || len % min_size != 0 {
        return Err(Error::InvalidAlignment(min_size));
    }

    let mut stats = EraseStats::default();
    if len == 0 {
        return Ok(stats);
    }

    progress.start(Phase::Erasing, len as u64);

    if addr == 0 && len == ctx.chip.total_size {
        if let Some(block) = ctx.chip.chip_erase_block() {
            check_abort(progress)?;
            log::debug!("Using chip erase (opcode 0x{:02X})", block.opcode);
            match protocol::chip_erase(master, block.opcode) {
                Err(Error::Timeout) => return Err(Error::EraseError { addr: 0 }),
                other => other?,
            }
            progress.advance(len as u64);
            stats.blocks_erased = 1;
            stats.chip_erase = true;
            return Ok(stats);
        }
    }

    ctx.with_address_mode(master, |m| {
        let end = addr + len;
        let mut current = addr;
        while current < end {
            let block = select_erase_block(ctx, current, end - current)
                .ok_or(Error::InvalidAlignment(min_size))?;
            check_abort(progress)?;
            erase_one(m, ctx, block, current)?;
            current += block.size;
            stats.blocks_erased += 1;
            progress.advance((current - addr) as u64);
        }
        Ok(())
    })?;

    Ok(stats)
}

/// Write `data` at `addr`, preserving every byte outside the range
///
/// The erase sectors touched by the range are read first. Sectors that
/// already hold the wanted contents are skipped, sectors that only need
/// bits cleared are programmed in place, and the rest are erased and
/// reprogrammed with the merged old/new contents.
pub fn write_range<M, P>(
    master: &mut M,
    ctx: &FlashContext,
    addr: u32,
    data: &[u8],
    progress: &mut P,
) -> Result<WriteStats>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    if !ctx.is_valid_range(addr, data.len()) {
        return Err(Error::AddressOutOfBounds);
    }

    let mut stats = WriteStats::default();
    if data.is_empty() {
        return Ok(stats);
    }

    let sector = ctx
        .chip
        .sector_erase_blocks()
        .min_by_key(|eb| eb.size)
        .copied()
        .ok_or(Error::OpcodeNotSupported)?;
    let sector_size = sector.size as usize;

    let window_start = addr as usize / sector_size * sector_size;
    let range_end = addr as usize + data.len();
    let window_end = range_end.div_ceil(sector_size) * sector_size;
    let window_end = window_end.min(ctx.total_size());

    let mut current = vec![0u8; window_end - window_start];
    progress.start(Phase::Reading, current.len() as u64);
    read_chunks(master, ctx, window_start as u32, &mut current, progress)?;

    let mut wanted = current.clone();
    let patch_start = addr as usize - window_start;
    wanted[patch_start..patch_start + data.len()].copy_from_slice(data);

    let granularity = ctx.chip.write_granularity;
    progress.start(Phase::Writing, wanted.len() as u64);

    ctx.with_address_mode(master, |m| {
        for (index, (have, want)) in current
            .chunks_mut(sector_size)
            .zip(wanted.chunks(sector_size))
            .enumerate()
        {
            let sector_addr = (window_start + index * sector_size) as u32;

            if have == want {
                stats.sectors_skipped += 1;
            } else {
                if need_erase(have, want, granularity) {
                    check_abort(progress)?;
                    erase_one(m, ctx, sector, sector_addr)?;
                    have.fill(ERASED_VALUE);
                    stats.sectors_erased += 1;
                }

                for range in changed_ranges(have, want) {
                    let chunk = &want[range.start..range.start + range.len];
                    program(m, ctx, sector_addr + range.start as u32, chunk, progress)?;
                    stats.bytes_programmed += chunk.len();
                }
            }

            progress.advance(((index + 1) * sector_size).min(wanted.len()) as u64);
        }
        Ok(())
    })?;

    log::debug!(
        "Write done: {} sectors erased, {} unchanged, {} bytes programmed",
        stats.sectors_erased,
        stats.sectors_skipped,
        stats.bytes_programmed
    );
    Ok(stats)
}

/// Read back `expected.len()` bytes at `addr` and compare
pub fn verify_range<M, P>(
    master: &mut M,
    ctx: &FlashContext,
    addr: u32,
    expected: &[u8],
    progress: &mut P,
) -> Result<()>
where
    M: SpiMaster + ?Sized,
    P: OperationProgress + ?Sized,
{
    if !ctx.is_valid_range(addr, expected.len()) {
        return Err(Error::AddressOutOfBounds);
    }

    progress.start(Phase::Verifying, expected.len() as u64);
    let mut actual = vec![0u8; expected.len()];
    read_chunks(master, ctx, addr, &mut actual, progress)?;

    match actual.iter().zip(expected).position(|(a, e)| a != e) {
        Some(pos) => Err(Error::VerifyError {
            addr: addr + pos as u32,
        }),
        None => Ok(()),
    }
}
