// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::os::unix::prelude::FileTypeExt;
use std::path::{Path, PathBuf};

mod error;
pub mod ioctl;
mod kmd;
pub mod noc;
mod tlb;

pub use error::{DeviceOpenError, IoctlOp, NocError};
pub use kmd::{Kmd, TlbAllocation, TlbDriver};
pub use tlb::{MemoryType, TlbWindow};

/// Size of the TLB windows requested from the driver (2 MiB). The driver
/// guarantees window sizes are powers of two.
pub const TLB_WINDOW_SIZE: u64 = 1 << 21;

/// A handle onto one accelerator's character device, exposing word and block
/// access to its NoC address space.
///
/// A handle is single-threaded: every transfer reconfigures a freshly
/// allocated TLB window, and two threads doing so through one handle would
/// race at the chip. Open one handle per thread or serialize externally.
pub struct Device {
    path: PathBuf,
    kmd: Option<Kmd>,
    tlb_window_size: u64,
}

impl Device {
    /// A handle on `path` (conventionally `/dev/tenstorrent/<N>`), not yet
    /// opened.
    pub fn new(path: impl Into<PathBuf>) -> Device {
        Device {
            path: path.into(),
            kmd: None,
            tlb_window_size: TLB_WINDOW_SIZE,
        }
    }

    /// Open the device read-write. A no-op when already open.
    pub fn open(&mut self) -> Result<(), NocError> {
        if self.kmd.is_some() {
            return Ok(());
        }

        self.kmd = Some(Kmd::open(&self.path)?);
        Ok(())
    }

    /// Close the device. Idempotent; close errors are suppressed. Closing
    /// while a transfer is in flight on another thread is undefined.
    pub fn close(&mut self) {
        self.kmd = None;
    }

    pub fn is_open(&self) -> bool {
        self.kmd.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn kmd(&self) -> Result<&Kmd, NocError> {
        self.kmd.as_ref().ok_or(NocError::NotOpen)
    }

    /// Read one 32-bit word from (x, y) at `addr`. `addr` must be 4-byte
    /// aligned.
    pub fn noc_read32(&self, noc: u8, x: u16, y: u16, addr: u64) -> Result<u32, NocError> {
        noc::read32(self.kmd()?, self.tlb_window_size, noc, x, y, addr)
    }

    /// Write one 32-bit word to (x, y) at `addr`. `addr` must be 4-byte
    /// aligned.
    pub fn noc_write32(
        &self,
        noc: u8,
        x: u16,
        y: u16,
        addr: u64,
        value: u32,
    ) -> Result<(), NocError> {
        noc::write32(self.kmd()?, self.tlb_window_size, noc, x, y, addr, value)
    }

    /// Read `size` bytes from (x, y) starting at `addr`. `addr` and `size`
    /// must be multiples of 4; `size == 0` returns an empty buffer without
    /// touching the driver.
    pub fn noc_read(
        &self,
        noc: u8,
        x: u16,
        y: u16,
        addr: u64,
        size: usize,
    ) -> Result<Vec<u8>, NocError> {
        let mut data = vec![0u8; size];
        noc::read_block(self.kmd()?, self.tlb_window_size, noc, x, y, addr, &mut data)?;
        Ok(data)
    }

    /// Write `data` to (x, y) starting at `addr`. `addr` and `data.len()`
    /// must be multiples of 4.
    pub fn noc_write(&self, noc: u8, x: u16, y: u16, addr: u64, data: &[u8]) -> Result<(), NocError> {
        noc::write_block(self.kmd()?, self.tlb_window_size, noc, x, y, addr, data)
    }

    /// Device ids present under /dev/tenstorrent, sorted.
    pub fn scan() -> Vec<usize> {
        let entries = match std::fs::read_dir("/dev/tenstorrent") {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("scan found no devices, /dev/tenstorrent unreadable: {err}");
                return Vec::new();
            }
        };

        // The driver names each char device after its numeric id.
        let mut ids: Vec<usize> = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_type()
                    .map(|ty| ty.is_char_device())
                    .unwrap_or(false)
            })
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();

        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfers_on_a_closed_handle_fail() {
        let device = Device::new("/dev/tenstorrent/0");
        assert!(matches!(
            device.noc_read32(0, 1, 1, 0x0),
            Err(NocError::NotOpen)
        ));
        assert!(matches!(
            device.noc_write(0, 1, 1, 0x0, &[0u8; 4]),
            Err(NocError::NotOpen)
        ));
    }

    #[test]
    fn open_of_a_missing_device_reports_not_found() {
        let mut device = Device::new("/dev/tenstorrent/this-does-not-exist");
        let err = device.open().unwrap_err();
        assert!(matches!(
            err,
            NocError::Open(DeviceOpenError::DeviceNotFound { .. })
        ));
        assert!(!device.is_open());
    }

    #[test]
    fn close_is_idempotent() {
        let mut device = Device::new("/dev/tenstorrent/0");
        device.close();
        device.close();
        assert!(!device.is_open());
    }
}
