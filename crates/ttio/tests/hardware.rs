// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]

//! NoC round-trip tests against real hardware.
//!
//! These tests require a physical device and a scratch region that is safe
//! to clobber, named through the environment:
//!
//!   TTIO_TEST_TARGET="<x>,<y>,<addr>"
//!
//! By default they are annotated with #[ignore] so they do not fail on
//! systems without hardware. To run them:
//!
//!   TTIO_TEST_TARGET=8,3,0x400030000000 \
//!       cargo test --features test_hardware --test hardware -- --ignored

use ttio::Device;

fn target_from_env() -> Option<(u16, u16, u64)> {
    let target = std::env::var("TTIO_TEST_TARGET").ok()?;
    let mut parts = target.split(',');

    let x = parts.next()?.trim().parse().ok()?;
    let y = parts.next()?.trim().parse().ok()?;
    let addr = parts.next()?.trim();
    let addr = match addr.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => addr.parse().ok()?,
    };

    Some((x, y, addr))
}

fn open_first_device() -> Option<Device> {
    let id = Device::scan().into_iter().next()?;
    let mut device = Device::new(format!("/dev/tenstorrent/{id}"));
    device.open().ok()?;
    Some(device)
}

#[test]
#[cfg_attr(
    not(feature = "test_hardware"),
    ignore = "Requires hardware and a TTIO_TEST_TARGET scratch region"
)]
fn word_round_trip() {
    let Some((x, y, addr)) = target_from_env() else {
        println!("TTIO_TEST_TARGET not set, skipping");
        return;
    };
    let Some(device) = open_first_device() else {
        println!("no device found, skipping");
        return;
    };

    let original = device.noc_read32(0, x, y, addr).unwrap();

    device.noc_write32(0, x, y, addr, 0xBEEF_CAFE).unwrap();
    assert_eq!(device.noc_read32(0, x, y, addr).unwrap(), 0xBEEF_CAFE);

    device.noc_write32(0, x, y, addr, original).unwrap();
}

#[test]
#[cfg_attr(
    not(feature = "test_hardware"),
    ignore = "Requires hardware and a TTIO_TEST_TARGET scratch region"
)]
fn block_round_trip_across_a_window_boundary() {
    let Some((x, y, addr)) = target_from_env() else {
        println!("TTIO_TEST_TARGET not set, skipping");
        return;
    };
    let Some(device) = open_first_device() else {
        println!("no device found, skipping");
        return;
    };

    let len = 256usize;
    let data: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();

    let original = device.noc_read(0, x, y, addr, len).unwrap();

    device.noc_write(0, x, y, addr, &data).unwrap();
    let readback = device.noc_read(0, x, y, addr, len).unwrap();
    assert_eq!(readback, data);

    device.noc_write(0, x, y, addr, &original).unwrap();
}
