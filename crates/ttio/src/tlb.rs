// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::NocError;
use crate::ioctl::NocTlbConfig;
use crate::kmd::TlbDriver;

/// Host memory type of a window mapping. Uncached keeps single-word accesses
/// ordered with the rest of MMIO; write-combining lets the CPU coalesce
/// stores across the aperture, which is what block transfers want.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Uc,
    Wc,
}

/// A TLB window held for the duration of one transfer: the driver-assigned id
/// plus the host mapping of its aperture.
///
/// Either both exist or neither does; if the mapping cannot be established
/// the id is handed back before the error surfaces. Dropping the window
/// unmaps and then frees, suppressing cleanup errors; [`release`] is the
/// explicit path that reports them.
///
/// [`release`]: TlbWindow::release
pub struct TlbWindow<'d, D: TlbDriver> {
    driver: &'d D,
    id: u32,
    size: u64,
    memory_type: MemoryType,
    mapping: Option<memmap2::MmapMut>,
    freed: bool,
}

impl<'d, D: TlbDriver> TlbWindow<'d, D> {
    pub fn acquire(
        driver: &'d D,
        size: u64,
        memory_type: MemoryType,
    ) -> Result<TlbWindow<'d, D>, NocError> {
        let alloc = driver.allocate_tlb(size)?;

        let mapping = match driver.map_tlb(&alloc, size, memory_type) {
            Ok(mapping) => mapping,
            Err(err) => {
                // The caller never saw the id; hand it straight back.
                if let Err(free_err) = driver.free_tlb(alloc.id) {
                    tracing::warn!("failed to free tlb {} after mmap failure: {free_err}", alloc.id);
                }
                return Err(err);
            }
        };

        Ok(TlbWindow {
            driver,
            id: alloc.id,
            size,
            memory_type,
            mapping: Some(mapping),
            freed: false,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Re-aim the window. On failure the window's aim is undefined and the
    /// transfer must abort.
    pub fn configure(&self, config: &NocTlbConfig) -> Result<(), NocError> {
        self.driver.configure_tlb(self.id, config)
    }

    /// Copy words out of the mapping at `offset`. Both `offset` and
    /// `dst.len()` must be multiples of 4 and lie within the window.
    pub fn read_words(&self, offset: usize, dst: &mut [u8]) {
        assert!(offset % 4 == 0 && dst.len() % 4 == 0);
        assert!(offset + dst.len() <= self.size as usize);

        let base = self.mapping().as_ptr();
        // SAFETY: the mapping is `size` bytes long and the span is bounds
        // checked above; accesses are whole aligned words.
        unsafe {
            let mut src = base.add(offset) as *const u32;
            for word in dst.chunks_exact_mut(4) {
                word.copy_from_slice(&src.read_volatile().to_le_bytes());
                src = src.add(1);
            }
        }
    }

    /// Copy words into the mapping at `offset`. Same constraints as
    /// [`read_words`](TlbWindow::read_words).
    pub fn write_words(&mut self, offset: usize, src: &[u8]) {
        assert!(offset % 4 == 0 && src.len() % 4 == 0);
        assert!(offset + src.len() <= self.size as usize);

        let base = self.mapping_mut().as_mut_ptr();
        // SAFETY: as in read_words.
        unsafe {
            let mut dst = base.add(offset) as *mut u32;
            for word in src.chunks_exact(4) {
                dst.write_volatile(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
                dst = dst.add(1);
            }
        }
    }

    /// Unmap, then free the window, reporting a free failure. Used on the
    /// success path, where a cleanup error must not be swallowed.
    pub fn release(mut self) -> Result<(), NocError> {
        self.mapping = None;
        self.freed = true;
        self.driver.free_tlb(self.id)
    }

    fn mapping(&self) -> &memmap2::MmapMut {
        // SAFETY: `mapping` is populated in acquire and only taken by
        // release and drop, both of which consume the window.
        unsafe { self.mapping.as_ref().unwrap_unchecked() }
    }

    fn mapping_mut(&mut self) -> &mut memmap2::MmapMut {
        // SAFETY: as in mapping.
        unsafe { self.mapping.as_mut().unwrap_unchecked() }
    }
}

impl<D: TlbDriver> Drop for TlbWindow<'_, D> {
    fn drop(&mut self) {
        if self.freed {
            return;
        }

        // Unmap before the id goes back to the driver.
        self.mapping = None;
        if let Err(err) = self.driver.free_tlb(self.id) {
            tracing::warn!("failed to free tlb {}: {err}", self.id);
        }
    }
}
