use crate::format::LoadError;

/// Value of every byte no text record has written.
pub const UNWRITTEN: u8 = 0xff;

/// Byte-addressable image of the target address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    bytes: Vec<u8>,
}

impl MemoryImage {
    /// Allocates `capacity` bytes filled with [`UNWRITTEN`].
    ///
    /// # Errors
    /// Returns `LoadError::AllocationFailure` when the buffer cannot be
    /// reserved.
    pub fn allocate(capacity: usize) -> Result<Self, LoadError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(capacity)?;
        bytes.resize(capacity, UNWRITTEN);
        Ok(Self { bytes })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// # Errors
    /// Returns `LoadError::AddressOutOfRange` when any byte of `data` would
    /// land outside the image. Nothing is written in that case.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), LoadError> {
        let range = self.range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// # Errors
    /// Returns `LoadError::AddressOutOfRange` when the window leaves the image.
    pub fn read(&self, address: u32, len: usize) -> Result<&[u8], LoadError> {
        let range = self.range(address, len)?;
        Ok(&self.bytes[range])
    }

    /// Mutable view of a three-byte word.
    ///
    /// # Errors
    /// Returns `LoadError::AddressOutOfRange` when the word leaves the image.
    pub fn word_mut(&mut self, address: u32) -> Result<&mut [u8; 3], LoadError> {
        let range = self.range(address, 3)?;
        let capacity = self.bytes.len();
        <&mut [u8; 3]>::try_from(&mut self.bytes[range]).map_err(|_| {
            LoadError::AddressOutOfRange {
                address: i64::from(address),
                capacity,
            }
        })
    }

    fn range(&self, address: u32, len: usize) -> Result<std::ops::Range<usize>, LoadError> {
        if len == 0 {
            return Ok(0..0);
        }
        let begin = address as usize;
        match begin.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(begin..end),
            Some(end) => Err(self.out_of_range(end as i64 - 1)),
            _ => Err(self.out_of_range(i64::from(address))),
        }
    }

    fn out_of_range(&self, address: i64) -> LoadError {
        LoadError::AddressOutOfRange {
            address,
            capacity: self.bytes.len(),
        }
    }
}
