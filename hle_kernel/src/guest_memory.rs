//! Guest memory
//!
//! Flat simulated guest-addressable memory. The SVC layer reads handle
//! arrays out of it; tests stage them in. Values are little-endian, as
//! seen by the emulated CPU.
//!
//! Accesses that fall outside the region return `None`; the SVC layer
//! surfaces those as `InvalidAddress`.

use kernel_types::Handle;
use std::sync::Mutex;

/// Simulated flat guest memory region starting at address zero.
pub struct GuestMemory {
    data: Mutex<Vec<u8>>,
}

impl GuestMemory {
    /// Creates a zero-filled region of the given size in bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; size]),
        }
    }

    /// Returns the region size in bytes.
    pub fn size(&self) -> usize {
        self.data.lock().expect("guest memory poisoned").len()
    }

    /// Reads a little-endian u32. `None` if any byte is out of bounds.
    pub fn read_u32(&self, address: u64) -> Option<u32> {
        let data = self.data.lock().expect("guest memory poisoned");
        let start = usize::try_from(address).ok()?;
        let bytes = data.get(start..start.checked_add(4)?)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Writes a little-endian u32. `None` if any byte is out of bounds.
    pub fn write_u32(&self, address: u64, value: u32) -> Option<()> {
        let mut data = self.data.lock().expect("guest memory poisoned");
        let start = usize::try_from(address).ok()?;
        let bytes = data.get_mut(start..start.checked_add(4)?)?;
        bytes.copy_from_slice(&value.to_le_bytes());
        Some(())
    }

    /// Reads a contiguous array of `count` handles.
    ///
    /// All-or-nothing: `None` if any element is out of bounds.
    pub fn read_handles(&self, address: u64, count: usize) -> Option<Vec<Handle>> {
        let mut handles = Vec::with_capacity(count);
        for slot in 0..count {
            let raw = self.read_u32(address.checked_add((slot as u64) * 4)?)?;
            handles.push(Handle::from_raw(raw));
        }
        Some(handles)
    }

    /// Writes a contiguous handle array (test staging helper).
    pub fn write_handles(&self, address: u64, handles: &[Handle]) -> Option<()> {
        for (slot, handle) in handles.iter().enumerate() {
            self.write_u32(address.checked_add((slot as u64) * 4)?, handle.raw())?;
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_round_trip() {
        let memory = GuestMemory::new(64);
        memory.write_u32(8, 0xdead_beef).unwrap();
        assert_eq!(memory.read_u32(8), Some(0xdead_beef));
    }

    #[test]
    fn test_little_endian_layout() {
        let memory = GuestMemory::new(8);
        memory.write_u32(0, 0x0102_0304).unwrap();
        assert_eq!(memory.read_u32(0), Some(0x0102_0304));
        // Low byte first.
        assert_eq!(memory.read_u32(1), Some(0x0001_0203));
    }

    #[test]
    fn test_out_of_bounds_read() {
        let memory = GuestMemory::new(8);
        assert_eq!(memory.read_u32(8), None);
        // Straddling the end fails too.
        assert_eq!(memory.read_u32(6), None);
        assert_eq!(memory.read_u32(u64::MAX), None);
    }

    #[test]
    fn test_out_of_bounds_write() {
        let memory = GuestMemory::new(8);
        assert_eq!(memory.write_u32(6, 1), None);
        assert_eq!(memory.read_u32(0), Some(0));
    }

    #[test]
    fn test_handle_array_round_trip() {
        let memory = GuestMemory::new(64);
        let handles = vec![
            Handle::from_parts(1, 1),
            Handle::from_parts(2, 1),
            Handle::from_parts(3, 2),
        ];
        memory.write_handles(16, &handles).unwrap();
        assert_eq!(memory.read_handles(16, 3), Some(handles));
    }

    #[test]
    fn test_handle_array_all_or_nothing() {
        let memory = GuestMemory::new(16);
        // Room for two handles at offset 8, not three.
        assert_eq!(memory.read_handles(8, 3), None);
    }
}
