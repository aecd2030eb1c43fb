// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::num::ParseIntError;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ttio::Device;

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Read a 32-bit word
    Read32 {
        x: u16,
        y: u16,
        #[arg(value_parser = parse_number)]
        addr: u64,
    },
    /// Write a 32-bit word
    Write32 {
        x: u16,
        y: u16,
        #[arg(value_parser = parse_number)]
        addr: u64,
        #[arg(value_parser = parse_word)]
        value: u32,
    },
    /// Read a block of memory and hex-dump it
    Read {
        x: u16,
        y: u16,
        #[arg(value_parser = parse_number)]
        addr: u64,
        #[arg(value_parser = parse_number)]
        size: u64,
    },
    /// Write the contents of a file
    Write {
        x: u16,
        y: u16,
        #[arg(value_parser = parse_number)]
        addr: u64,
        file: PathBuf,
    },
}

#[derive(Parser, Debug)]
struct CliOptions {
    /// Character device to open
    #[arg(long, default_value = "/dev/tenstorrent/0")]
    device: PathBuf,

    /// NoC to issue transactions on (0 or 1)
    #[arg(long, default_value_t = 0)]
    noc: u8,

    #[command(subcommand)]
    command: Command,
}

fn parse_number(value: &str) -> Result<u64, ParseIntError> {
    match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn parse_word(value: &str) -> Result<u32, ParseIntError> {
    match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn hex_dump(base: u64, data: &[u8]) {
    for (i, line) in data.chunks(16).enumerate() {
        print!("{:#018x}: ", base + i as u64 * 16);
        for byte in line {
            print!("{byte:02x} ");
        }
        println!();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliOptions::parse();

    let mut device = Device::new(&args.device);
    device.open()?;

    match args.command {
        Command::Read32 { x, y, addr } => {
            let value = device.noc_read32(args.noc, x, y, addr)?;
            println!("{value:#010x}");
        }
        Command::Write32 { x, y, addr, value } => {
            device.noc_write32(args.noc, x, y, addr, value)?;
        }
        Command::Read { x, y, addr, size } => {
            let data = device.noc_read(args.noc, x, y, addr, size as usize)?;
            hex_dump(addr, &data);
        }
        Command::Write { x, y, addr, file } => {
            let data = std::fs::read(&file)?;
            device.noc_write(args.noc, x, y, addr, &data)?;
            println!("wrote {} bytes to {addr:#x}", data.len());
        }
    }

    Ok(())
}
