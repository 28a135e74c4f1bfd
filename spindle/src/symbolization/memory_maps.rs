//! Memory mapping utilities for process address space analysis
//!
//! Parses `/proc/<pid>/maps` to find where a binary was loaded, which is needed
//! to translate runtime addresses of position-independent executables back to
//! the addresses recorded in their debug information.

use crate::domain::Pid;
use anyhow::{anyhow, Context, Result};
use log::info;
use std::fs;

/// Memory range of a loaded binary in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMapping {
    pub range: MemoryRange,
    /// Offset into the mapped file
    pub offset: u64,
    pub path: Option<String>,
}

/// Parse a single maps line: `start-end perms offset dev inode [pathname]`
///
/// # Errors
/// Returns an error if the address range or offset is not valid hex.
pub fn parse_mapping(line: &str) -> Result<MemoryMapping> {
    let mut fields = line.split_whitespace();
    let range = fields.next().context("Missing address range")?;
    let (start, end) = range
        .split_once('-')
        .with_context(|| format!("Malformed address range {range:?}"))?;
    let start = u64::from_str_radix(start, 16).context("Failed to parse range start")?;
    let end = u64::from_str_radix(end, 16).context("Failed to parse range end")?;

    let _perms = fields.next().context("Missing permissions")?;
    let offset = fields.next().context("Missing offset")?;
    let offset = u64::from_str_radix(offset, 16).context("Failed to parse offset")?;

    // dev and inode, then the path (which may contain spaces)
    let path = fields.nth(2).map(|first| {
        let rest: Vec<&str> = fields.collect();
        if rest.is_empty() {
            first.to_string()
        } else {
            format!("{first} {}", rest.join(" "))
        }
    });

    Ok(MemoryMapping {
        range: MemoryRange { start, end },
        offset,
        path,
    })
}

/// Read and parse every mapping of process `pid`
///
/// # Errors
/// Returns an error if the maps file cannot be read or a line is malformed.
pub fn read_memory_maps(pid: Pid) -> Result<Vec<MemoryMapping>> {
    let maps_path = format!("/proc/{}/maps", pid.0);
    let maps =
        fs::read_to_string(&maps_path).with_context(|| format!("Failed to read {maps_path}"))?;
    maps.lines().map(parse_mapping).collect()
}

/// Runtime address at which `binary_path` was mapped from file offset zero
///
/// # Errors
/// Returns an error if the maps cannot be read or no mapping of the binary
/// starts at offset zero.
pub fn find_load_base(pid: Pid, binary_path: &str) -> Result<u64> {
    let mappings = read_memory_maps(pid)?;
    let base = load_base_in(&mappings, binary_path)
        .ok_or_else(|| anyhow!("Could not find memory range for {binary_path} in {pid}"))?;
    info!("{binary_path} loaded at 0x{base:x} in {pid}");
    Ok(base)
}

fn load_base_in(mappings: &[MemoryMapping], binary_path: &str) -> Option<u64> {
    mappings
        .iter()
        .filter(|m| m.offset == 0 && m.path.as_deref() == Some(binary_path))
        .map(|m| m.range.start)
        .min()
}
