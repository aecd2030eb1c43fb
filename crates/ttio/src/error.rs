// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use nix::errno::Errno;
use thiserror::Error;

/// The three TLB ioctls the driver exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlOp {
    AllocateTlb,
    FreeTlb,
    ConfigureTlb,
}

impl std::fmt::Display for IoctlOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoctlOp::AllocateTlb => f.write_str("allocate_tlb"),
            IoctlOp::FreeTlb => f.write_str("free_tlb"),
            IoctlOp::ConfigureTlb => f.write_str("configure_tlb"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DeviceOpenError {
    #[error("device {path} not found")]
    DeviceNotFound { path: String },

    #[error("permission denied opening {path}")]
    PermissionDenied { path: String },

    #[error("failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum NocError {
    #[error("{0}")]
    Open(#[from] DeviceOpenError),

    #[error("device is not open")]
    NotOpen,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("ioctl {op} failed: {errno}")]
    IoctlFailed { op: IoctlOp, errno: Errno },

    #[error("failed to map tlb window: {source}")]
    MmapFailed { source: std::io::Error },

    #[error("offset {offset:#x} + 4 crosses the {window_size:#x} byte tlb window")]
    OutOfBounds { offset: u64, window_size: u64 },
}
