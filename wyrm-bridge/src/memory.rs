//! Memory utility functions over a [`Process`].
//!
//! All readers use little-endian layout; the pointer reader sizes itself to
//! the target's address width.

use crate::error::BridgeError;
use crate::process::Process;

/// Default byte cap for [`read_string`].
pub const DEFAULT_STRING_MAX: usize = 256;

/// Read a NUL-terminated string from `address`, reading at most `max_length`
/// bytes. Invalid UTF-8 is replaced.
pub fn read_string(
    process: &Process,
    address: u64,
    max_length: usize,
) -> Result<String, BridgeError> {
    let data = process.read_memory(address, max_length)?;
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    Ok(String::from_utf8_lossy(&data[..end]).into_owned())
}

/// Read a pointer-sized integer from `address`.
///
/// The pointer size (4 or 8 bytes) comes from the target.
pub fn read_pointer(process: &Process, address: u64) -> Result<u64, BridgeError> {
    let ptr_size = process.backend().address_byte_size() as usize;
    let data = process.read_memory(address, ptr_size)?;
    let mut value: u64 = 0;
    for (i, byte) in data.iter().enumerate().take(8) {
        value |= (*byte as u64) << (8 * i);
    }
    Ok(value)
}

/// Read an unsigned 8-bit integer.
pub fn read_u8(process: &Process, address: u64) -> Result<u8, BridgeError> {
    Ok(process.read_memory(address, 1)?[0])
}

/// Read an unsigned 16-bit little-endian integer.
pub fn read_u16(process: &Process, address: u64) -> Result<u16, BridgeError> {
    let data = process.read_memory(address, 2)?;
    Ok(u16::from_le_bytes([data[0], data[1]]))
}

/// Read an unsigned 32-bit little-endian integer.
pub fn read_u32(process: &Process, address: u64) -> Result<u32, BridgeError> {
    let data = process.read_memory(address, 4)?;
    Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

/// Read an unsigned 64-bit little-endian integer.
pub fn read_u64(process: &Process, address: u64) -> Result<u64, BridgeError> {
    let data = process.read_memory(address, 8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[..8]);
    Ok(u64::from_le_bytes(bytes))
}

/// Write an unsigned 8-bit integer.
pub fn write_u8(process: &Process, address: u64, value: u8) -> Result<(), BridgeError> {
    process.write_memory(address, &[value]).map(|_| ())
}

/// Write an unsigned 16-bit little-endian integer.
pub fn write_u16(process: &Process, address: u64, value: u16) -> Result<(), BridgeError> {
    process.write_memory(address, &value.to_le_bytes()).map(|_| ())
}

/// Write an unsigned 32-bit little-endian integer.
pub fn write_u32(process: &Process, address: u64, value: u32) -> Result<(), BridgeError> {
    process.write_memory(address, &value.to_le_bytes()).map(|_| ())
}

/// Write an unsigned 64-bit little-endian integer.
pub fn write_u64(process: &Process, address: u64, value: u64) -> Result<(), BridgeError> {
    process.write_memory(address, &value.to_le_bytes()).map(|_| ())
}

/// Search for `pattern` in a region of process memory.
///
/// Returns every address where the pattern starts, including overlapping
/// matches.
pub fn search_memory(
    process: &Process,
    start: u64,
    size: usize,
    pattern: &[u8],
) -> Result<Vec<u64>, BridgeError> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let data = process.read_memory(start, size)?;
    let mut matches = Vec::new();
    let mut offset = 0usize;
    while offset + pattern.len() <= data.len() {
        match data[offset..]
            .windows(pattern.len())
            .position(|window| window == pattern)
        {
            Some(idx) => {
                matches.push(start + (offset + idx) as u64);
                offset += idx + 1;
            }
            None => break,
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedBackend, ScriptedState};
    use std::sync::Arc;

    fn process_with(address: u64, bytes: &[u8]) -> Process {
        let backend = ScriptedBackend::new(ScriptedState::sample());
        backend.with_state(|s| s.map_memory(address, bytes.to_vec()));
        Process::new(Arc::new(backend))
    }

    #[test]
    fn read_string_stops_at_nul() {
        let p = process_with(0x5000, b"hello\0world");
        assert_eq!(read_string(&p, 0x5000, 11).unwrap(), "hello");
    }

    #[test]
    fn read_string_without_nul_takes_whole_window() {
        let p = process_with(0x5000, b"abcd");
        assert_eq!(read_string(&p, 0x5000, 4).unwrap(), "abcd");
    }

    #[test]
    fn fixed_width_reads_are_little_endian() {
        let p = process_with(0x5000, &[0x78, 0x56, 0x34, 0x12, 0, 0, 0, 0]);
        assert_eq!(read_u8(&p, 0x5000).unwrap(), 0x78);
        assert_eq!(read_u16(&p, 0x5000).unwrap(), 0x5678);
        assert_eq!(read_u32(&p, 0x5000).unwrap(), 0x1234_5678);
        assert_eq!(read_u64(&p, 0x5000).unwrap(), 0x1234_5678);
    }

    #[test]
    fn write_then_read_roundtrip() {
        let p = process_with(0x5000, &[0u8; 16]);
        write_u32(&p, 0x5000, 0xdead_beef).unwrap();
        assert_eq!(read_u32(&p, 0x5000).unwrap(), 0xdead_beef);
        write_u64(&p, 0x5008, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(read_u64(&p, 0x5008).unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn read_pointer_uses_target_width() {
        let p = process_with(0x5000, &[0x00, 0x10, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        // sample target is 64-bit
        assert_eq!(read_pointer(&p, 0x5000).unwrap(), 0x1_0000_1000);
    }

    #[test]
    fn search_memory_finds_all_matches() {
        let p = process_with(0x5000, b"abcabcab");
        let hits = search_memory(&p, 0x5000, 8, b"ab").unwrap();
        assert_eq!(hits, vec![0x5000, 0x5003, 0x5006]);
    }

    #[test]
    fn search_memory_overlapping_matches() {
        let p = process_with(0x5000, b"aaaa");
        let hits = search_memory(&p, 0x5000, 4, b"aa").unwrap();
        assert_eq!(hits, vec![0x5000, 0x5001, 0x5002]);
    }

    #[test]
    fn search_memory_empty_pattern_is_empty() {
        let p = process_with(0x5000, b"abc");
        assert!(search_memory(&p, 0x5000, 3, b"").unwrap().is_empty());
    }
}
