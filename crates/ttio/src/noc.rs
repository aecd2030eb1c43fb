// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! The NoC transfer engine: turns a logical (noc, x, y, addr, len) access
//! into a sequence of aperture-aligned transfers through one TLB window.

use crate::error::NocError;
use crate::ioctl::NocTlbConfig;
use crate::kmd::TlbDriver;
use crate::tlb::{MemoryType, TlbWindow};

/// One aperture-sized piece of a transfer. `aperture` is the window-aligned
/// chip address the TLB is aimed at, `intra` the byte offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    aperture: u64,
    intra: u64,
    len: u64,
}

/// Decomposes `[addr, addr + len)` into chunks that each lie wholly within
/// one `window_size`-aligned aperture, in ascending address order. Only the
/// first and last chunk can be shorter than the window.
struct Chunks {
    cursor: u64,
    remaining: u64,
    window_size: u64,
}

fn chunks(addr: u64, len: u64, window_size: u64) -> Chunks {
    Chunks {
        cursor: addr,
        remaining: len,
        window_size,
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.remaining == 0 {
            return None;
        }

        let mask = self.window_size - 1;
        let aperture = self.cursor & !mask;
        let intra = self.cursor & mask;
        let len = self.remaining.min(self.window_size - intra);

        self.cursor += len;
        self.remaining -= len;

        Some(Chunk {
            aperture,
            intra,
            len,
        })
    }
}

fn check_addr(addr: u64) -> Result<(), NocError> {
    if addr % 4 != 0 {
        return Err(NocError::InvalidArgument("address must be 4-byte aligned"));
    }
    Ok(())
}

fn check_len(len: usize) -> Result<(), NocError> {
    if len % 4 != 0 {
        return Err(NocError::InvalidArgument(
            "transfer size must be a multiple of 4 bytes",
        ));
    }
    Ok(())
}

/// Read one word. Uses an uncached mapping so the load is ordered with the
/// rest of MMIO.
pub fn read32<D: TlbDriver>(
    driver: &D,
    window_size: u64,
    noc: u8,
    x: u16,
    y: u16,
    addr: u64,
) -> Result<u32, NocError> {
    check_addr(addr)?;

    let window = TlbWindow::acquire(driver, window_size, MemoryType::Uc)?;

    let mask = window_size - 1;
    let intra = addr & mask;
    if intra + 4 > window_size {
        return Err(NocError::OutOfBounds {
            offset: intra,
            window_size,
        });
    }

    window.configure(&NocTlbConfig::unicast(noc, x, y, addr & !mask))?;

    let mut word = [0u8; 4];
    window.read_words(intra as usize, &mut word);

    window.release()?;
    Ok(u32::from_le_bytes(word))
}

/// Write one word, little-endian, through an uncached mapping.
pub fn write32<D: TlbDriver>(
    driver: &D,
    window_size: u64,
    noc: u8,
    x: u16,
    y: u16,
    addr: u64,
    value: u32,
) -> Result<(), NocError> {
    check_addr(addr)?;

    let mut window = TlbWindow::acquire(driver, window_size, MemoryType::Uc)?;

    let mask = window_size - 1;
    let intra = addr & mask;
    if intra + 4 > window_size {
        return Err(NocError::OutOfBounds {
            offset: intra,
            window_size,
        });
    }

    window.configure(&NocTlbConfig::unicast(noc, x, y, addr & !mask))?;
    window.write_words(intra as usize, &value.to_le_bytes());

    window.release()
}

enum Transfer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// Fill `data` from chip memory starting at `addr`.
pub fn read_block<D: TlbDriver>(
    driver: &D,
    window_size: u64,
    noc: u8,
    x: u16,
    y: u16,
    addr: u64,
    data: &mut [u8],
) -> Result<(), NocError> {
    run_block(driver, window_size, noc, x, y, addr, Transfer::Read(data))
}

/// Write `data` to chip memory starting at `addr`.
pub fn write_block<D: TlbDriver>(
    driver: &D,
    window_size: u64,
    noc: u8,
    x: u16,
    y: u16,
    addr: u64,
    data: &[u8],
) -> Result<(), NocError> {
    run_block(driver, window_size, noc, x, y, addr, Transfer::Write(data))
}

fn run_block<D: TlbDriver>(
    driver: &D,
    window_size: u64,
    noc: u8,
    x: u16,
    y: u16,
    addr: u64,
    mut transfer: Transfer,
) -> Result<(), NocError> {
    let len = match &transfer {
        Transfer::Read(data) => data.len(),
        Transfer::Write(data) => data.len(),
    };

    check_addr(addr)?;
    check_len(len)?;
    if len == 0 {
        return Ok(());
    }

    // One window, write-combining, re-aimed per aperture. Each configure
    // drains the traffic of the previous aim, so no explicit flush is needed
    // between chunks; the final free flushes the last one.
    let mut window = TlbWindow::acquire(driver, window_size, MemoryType::Wc)?;

    let mut done = 0usize;
    for chunk in chunks(addr, len as u64, window_size) {
        window.configure(&NocTlbConfig::unicast(noc, x, y, chunk.aperture))?;

        let span = done..done + chunk.len as usize;
        match &mut transfer {
            Transfer::Read(data) => window.read_words(chunk.intra as usize, &mut data[span]),
            Transfer::Write(data) => window.write_words(chunk.intra as usize, &data[span]),
        }
        done += chunk.len as usize;
    }

    window.release()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 1 << 21;

    fn collect(addr: u64, len: u64) -> Vec<Chunk> {
        chunks(addr, len, WINDOW).collect()
    }

    #[test]
    fn chunks_partition_the_range() {
        for (addr, len) in [
            (0x4000_4000_0008u64, 7 * WINDOW + 24),
            (WINDOW - 4, 8u64),
            (0, 3 * WINDOW),
            (0x1234_5674, 4u64),
        ] {
            let chunks = collect(addr, len);

            let mut cursor = addr;
            for chunk in &chunks {
                // Disjoint, contiguous, in ascending order.
                assert_eq!(chunk.aperture + chunk.intra, cursor);
                // Wholly within one aperture.
                assert_eq!(chunk.aperture % WINDOW, 0);
                assert!(chunk.intra + chunk.len <= WINDOW);
                cursor += chunk.len;
            }
            assert_eq!(cursor, addr + len);
            assert_eq!(chunks.iter().map(|c| c.len).sum::<u64>(), len);
        }
    }

    #[test]
    fn aligned_full_window_is_one_chunk() {
        let chunks = collect(3 * WINDOW, WINDOW);
        assert_eq!(
            chunks,
            vec![Chunk {
                aperture: 3 * WINDOW,
                intra: 0,
                len: WINDOW
            }]
        );
    }

    #[test]
    fn short_first_chunk_then_full_windows() {
        let addr = 0x4000_4000_0008u64;
        let chunks = collect(addr, 4 * WINDOW);

        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].len, WINDOW - 8);
        assert_eq!(chunks[0].intra, 8);
        for chunk in &chunks[1..4] {
            assert_eq!(chunk.len, WINDOW);
            assert_eq!(chunk.intra, 0);
        }
        assert_eq!(chunks[4].len, 8);
    }

    #[test]
    fn straddling_word_pair_splits_at_the_boundary() {
        let chunks = collect(WINDOW - 4, 8);
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    aperture: 0,
                    intra: WINDOW - 4,
                    len: 4
                },
                Chunk {
                    aperture: WINDOW,
                    intra: 0,
                    len: 4
                },
            ]
        );
    }

    #[test]
    fn high_address_bits_pass_through() {
        let addr = 0x4000_4000_0000_0008u64;
        let chunks = collect(addr, 16);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].aperture, addr & !(WINDOW - 1));
        assert_eq!(chunks[0].intra, 8);
    }

    #[test]
    fn crossing_mid_range_yields_two_half_chunks() {
        let chunks = collect(WINDOW - 8, 16);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].len, chunks[1].len), (8, 8));
        assert_eq!(chunks[1].aperture, chunks[0].aperture + WINDOW);
    }
}
