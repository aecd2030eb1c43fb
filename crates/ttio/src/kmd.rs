// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::os::fd::AsRawFd;
use std::path::Path;

use nix::errno::Errno;

use crate::error::{DeviceOpenError, IoctlOp, NocError};
use crate::ioctl;
use crate::tlb::MemoryType;

/// One reserved TLB window, as reported by the driver. The window is not
/// host-visible until one of the two offsets is mapped.
#[derive(Debug, Clone, Copy)]
pub struct TlbAllocation {
    pub id: u32,
    pub mmap_offset_uc: u64,
    pub mmap_offset_wc: u64,
}

/// The four primitives the transfer engine needs from the kernel driver.
///
/// [`Kmd`] is the production implementation; tests substitute a mock that
/// simulates chip memory behind a `memfd`.
pub trait TlbDriver {
    fn allocate_tlb(&self, size: u64) -> Result<TlbAllocation, NocError>;

    /// Re-aim the window. May be called many times on the same id; the
    /// driver drains traffic through the previous aim before switching.
    fn configure_tlb(&self, id: u32, config: &ioctl::NocTlbConfig) -> Result<(), NocError>;

    /// Must be called exactly once per successful [`allocate_tlb`], after the
    /// mapping is gone.
    ///
    /// [`allocate_tlb`]: TlbDriver::allocate_tlb
    fn free_tlb(&self, id: u32) -> Result<(), NocError>;

    fn map_tlb(
        &self,
        alloc: &TlbAllocation,
        size: u64,
        memory_type: MemoryType,
    ) -> Result<memmap2::MmapMut, NocError>;
}

/// Connection to the tenstorrent kernel-mode driver through its character
/// device.
pub struct Kmd {
    fd: std::fs::File,
}

impl Kmd {
    /// Open the character device read-write. `std` opens with `O_CLOEXEC` on
    /// Linux.
    pub fn open(path: &Path) -> Result<Kmd, DeviceOpenError> {
        let fd = std::fs::OpenOptions::new().read(true).write(true).open(path);
        match fd {
            Ok(fd) => Ok(Kmd { fd }),
            Err(err) => Err(match err.kind() {
                std::io::ErrorKind::NotFound => DeviceOpenError::DeviceNotFound {
                    path: path.display().to_string(),
                },
                std::io::ErrorKind::PermissionDenied => DeviceOpenError::PermissionDenied {
                    path: path.display().to_string(),
                },
                _ => DeviceOpenError::OpenFailed {
                    path: path.display().to_string(),
                    source: err,
                },
            }),
        }
    }
}

fn ioctl_result(op: IoctlOp, result: nix::Result<nix::libc::c_int>) -> Result<(), NocError> {
    match result {
        Ok(0) => Ok(()),
        Ok(rc) => Err(NocError::IoctlFailed {
            op,
            errno: Errno::from_i32(rc),
        }),
        Err(errno) => Err(NocError::IoctlFailed { op, errno }),
    }
}

impl TlbDriver for Kmd {
    fn allocate_tlb(&self, size: u64) -> Result<TlbAllocation, NocError> {
        let mut data = ioctl::AllocateTlb {
            input: ioctl::AllocateTlbIn {
                size,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = unsafe { ioctl::allocate_tlb(self.fd.as_raw_fd(), (&mut data) as *mut _) };
        ioctl_result(IoctlOp::AllocateTlb, result)?;

        Ok(TlbAllocation {
            id: data.output.id,
            mmap_offset_uc: data.output.mmap_offset_uc,
            mmap_offset_wc: data.output.mmap_offset_wc,
        })
    }

    fn configure_tlb(&self, id: u32, config: &ioctl::NocTlbConfig) -> Result<(), NocError> {
        let mut data = ioctl::ConfigureTlb {
            input: ioctl::ConfigureTlbIn {
                id,
                config: *config,
            },
            ..Default::default()
        };

        let result = unsafe { ioctl::configure_tlb(self.fd.as_raw_fd(), (&mut data) as *mut _) };
        ioctl_result(IoctlOp::ConfigureTlb, result)
    }

    fn free_tlb(&self, id: u32) -> Result<(), NocError> {
        let mut data = ioctl::FreeTlb {
            input: ioctl::FreeTlbIn { id },
            output: ioctl::FreeTlbOut {},
        };

        let result = unsafe { ioctl::free_tlb(self.fd.as_raw_fd(), (&mut data) as *mut _) };
        ioctl_result(IoctlOp::FreeTlb, result)
    }

    fn map_tlb(
        &self,
        alloc: &TlbAllocation,
        size: u64,
        memory_type: MemoryType,
    ) -> Result<memmap2::MmapMut, NocError> {
        let offset = match memory_type {
            MemoryType::Uc => alloc.mmap_offset_uc,
            MemoryType::Wc => alloc.mmap_offset_wc,
        };

        unsafe {
            memmap2::MmapOptions::default()
                .len(size as usize)
                .offset(offset)
                .map_mut(self.fd.as_raw_fd())
        }
        .map_err(|source| NocError::MmapFailed { source })
    }
}
