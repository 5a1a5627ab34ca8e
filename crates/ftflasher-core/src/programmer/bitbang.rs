//! Bitbang SPI support
//!
//! This module provides the pieces needed to implement a **bitbang-style**
//! SPI master, where the clock, data and chip-select signals are produced by
//! software toggling general purpose pins.
//!
//! USB attached pin ports are far too slow to toggle one line per round
//! trip, so a transaction is described up front as a sequence of [`Edge`]s
//! (the state of CS/SCK/MOSI after each pin update). The port applies the
//! whole sequence in one go and reports the MISO level observed after every
//! update. The helpers in [`single`] build that sequence for a standard
//! mode 0, MSB-first, half-duplex transaction and decode the read phase.

use crate::error::Result;

/// Line states applied by one pin update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Chip select asserted (CS is active low, so `true` means CS=0)
    pub cs_active: bool,
    /// Clock line level
    pub sck: bool,
    /// MOSI line level
    pub mosi: bool,
}

impl Edge {
    /// Bus idle state: CS released, clock low
    pub const IDLE: Edge = Edge {
        cs_active: false,
        sck: false,
        mosi: false,
    };

    const fn selected(sck: bool, mosi: bool) -> Edge {
        Edge {
            cs_active: true,
            sck,
            mosi,
        }
    }
}

/// Trait for low-level bitbang SPI ports
pub trait BitbangSpiMaster {
    /// Apply `edges` in order and return the MISO level observed after each
    ///
    /// The returned vector must have the same length as `edges`.
    fn clock_edges(&mut self, edges: &[Edge]) -> Result<Vec<bool>>;
}

/// Bitbang helper functions for single-wire I/O
pub mod single {
    use super::{BitbangSpiMaster, Edge};
    use crate::error::{Error, Result};

    /// Build the pin sequence for a transaction that writes `write` and then
    /// reads `read_len` bytes (MSB first, SPI mode 0)
    pub fn transaction_edges(write: &[u8], read_len: usize) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(3 + 16 * (write.len() + read_len));

        edges.push(Edge::selected(false, false));

        for &byte in write {
            for i in (0..8).rev() {
                let bit = (byte >> i) & 1 != 0;
                edges.push(Edge::selected(false, bit));
                edges.push(Edge::selected(true, bit));
            }
        }

        for _ in 0..read_len * 8 {
            edges.push(Edge::selected(false, false));
            edges.push(Edge::selected(true, false));
        }

        edges.push(Edge::selected(false, false));
        edges.push(Edge::IDLE);
        edges
    }

    /// Extract the read phase from the MISO samples of a transaction built
    /// with [`transaction_edges`]
    pub fn decode_read(samples: &[bool], write_len: usize, read_len: usize) -> Result<Vec<u8>> {
        let expected = 3 + 16 * (write_len + read_len);
        if samples.len() != expected {
            return Err(Error::Transport(format!(
                "bitbang port returned {} samples, expected {}",
                samples.len(),
                expected
            )));
        }

        // The sample after each rising edge holds the bit the chip shifted
        // out on the preceding falling edge.
        let first = 1 + 16 * write_len;
        let mut out = Vec::with_capacity(read_len);
        for byte_idx in 0..read_len {
            let mut byte = 0u8;
            for bit_idx in 0..8 {
                let rising = first + 2 * (byte_idx * 8 + bit_idx) + 1;
                byte <<= 1;
                if samples[rising] {
                    byte |= 1;
                }
            }
            out.push(byte);
        }
        Ok(out)
    }

    /// Run one complete transaction on a bitbang port
    pub fn transfer<M: BitbangSpiMaster + ?Sized>(
        master: &mut M,
        write: &[u8],
        read_len: usize,
    ) -> Result<Vec<u8>> {
        let edges = transaction_edges(write, read_len);
        let samples = master.clock_edges(&edges)?;
        decode_read(&samples, write.len(), read_len)
    }
}
