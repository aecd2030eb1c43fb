// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

const TENSTORRENT_IOCTL_MAGIC: usize = 0xFA;

use nix::request_code_none;

/// Strict NoC ordering. The driver encodes tlb ordering as relaxed = 0,
/// strict = 1, posted = 2; keep in sync with the driver's uapi header. The
/// data path always issues strictly ordered unicast transactions.
pub const NOC_ORDERING_STRICT: u8 = 1;

#[derive(Default)]
#[repr(C)]
pub struct AllocateTlbIn {
    pub size: u64,
    pub reserved: u64,
}

#[derive(Default)]
#[repr(C)]
pub struct AllocateTlbOut {
    pub id: u32,
    pub reserved0: u32,
    pub mmap_offset_uc: u64,
    pub mmap_offset_wc: u64,
    pub reserved1: u64,
}

#[derive(Default)]
#[repr(C)]
pub struct AllocateTlb {
    pub input: AllocateTlbIn,
    pub output: AllocateTlbOut,
}

nix::ioctl_readwrite_bad!(
    allocate_tlb,
    request_code_none!(TENSTORRENT_IOCTL_MAGIC, 11),
    AllocateTlb
);

#[derive(Default)]
#[repr(C)]
pub struct FreeTlbIn {
    pub id: u32,
}

#[derive(Default)]
#[repr(C)]
pub struct FreeTlbOut {}

#[derive(Default)]
#[repr(C)]
pub struct FreeTlb {
    pub input: FreeTlbIn,
    pub output: FreeTlbOut,
}

nix::ioctl_readwrite_bad!(
    free_tlb,
    request_code_none!(TENSTORRENT_IOCTL_MAGIC, 12),
    FreeTlb
);

#[derive(Debug, Default, Clone, Copy)]
#[repr(C)]
pub struct NocTlbConfig {
    pub addr: u64,
    pub x_end: u16,
    pub y_end: u16,
    pub x_start: u16,
    pub y_start: u16,
    pub noc: u8,
    pub mcast: u8,
    pub ordering: u8,
    pub linked: u8,
    pub static_vc: u8,
    pub reserved0: [u8; 3],
    pub reserved1: [u32; 2],
}

impl NocTlbConfig {
    /// Aim a window at `addr` on endpoint (x, y) of `noc`, unicast. `addr`
    /// must be a multiple of the window size.
    pub fn unicast(noc: u8, x: u16, y: u16, addr: u64) -> Self {
        Self {
            addr,
            x_end: x,
            y_end: y,
            noc,
            ordering: NOC_ORDERING_STRICT,
            ..Default::default()
        }
    }
}

#[derive(Default)]
#[repr(C)]
pub struct ConfigureTlbIn {
    pub id: u32,
    pub config: NocTlbConfig,
}

#[derive(Default)]
#[repr(C)]
pub struct ConfigureTlbOut {
    pub reserved: u64,
}

#[derive(Default)]
#[repr(C)]
pub struct ConfigureTlb {
    pub input: ConfigureTlbIn,
    pub output: ConfigureTlbOut,
}

nix::ioctl_readwrite_bad!(
    configure_tlb,
    request_code_none!(TENSTORRENT_IOCTL_MAGIC, 13),
    ConfigureTlb
);

#[cfg(test)]
mod tests {
    use super::*;

    // The driver consumes these structures byte for byte; a layout change is
    // an ABI break.
    #[test]
    fn struct_layouts_match_driver_abi() {
        assert_eq!(std::mem::size_of::<AllocateTlbIn>(), 16);
        assert_eq!(std::mem::size_of::<AllocateTlbOut>(), 32);
        assert_eq!(std::mem::size_of::<FreeTlbIn>(), 4);
        assert_eq!(std::mem::size_of::<NocTlbConfig>(), 32);
        assert_eq!(std::mem::size_of::<ConfigureTlbIn>(), 40);
    }

    #[test]
    fn unicast_config_zeroes_multicast_fields() {
        let config = NocTlbConfig::unicast(1, 8, 3, 0x4000_0000);
        assert_eq!(config.addr, 0x4000_0000);
        assert_eq!(config.x_end, 8);
        assert_eq!(config.y_end, 3);
        assert_eq!(config.noc, 1);
        assert_eq!(config.ordering, NOC_ORDERING_STRICT);
        assert_eq!((config.x_start, config.y_start), (0, 0));
        assert_eq!(config.mcast, 0);
        assert_eq!(config.linked, 0);
        assert_eq!(config.static_vc, 0);
    }
}
