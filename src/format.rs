use std::collections::TryReserveError;

use thiserror::Error;

/// Width of a header line including its terminator.
pub const HEADER_RECORD_SIZE: usize = 20;
/// Width of every address field in the record grammar.
pub const ADDR_SIZE: usize = 6;
/// Width of a byte or length field.
pub const BYTE_SIZE: usize = 2;
/// Half-bytes patched by one modification record.
pub const MODIFICATION_HALF_BYTES: u32 = 5;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to allocate the memory image: {0}")]
    AllocationFailure(#[from] TryReserveError),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("failed to decode {field} from hex string {text:?}")]
    AddressDecode { field: &'static str, text: String },
    #[error("program size {size:#08x} exceeds the memory capacity of {capacity} bytes")]
    ProgramTooLarge { size: u32, capacity: usize },
    #[error("address {address:#x} is outside the memory image of {capacity} bytes")]
    AddressOutOfRange { address: i64, capacity: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    /// True for failures of the address class: bad hex or an address that
    /// does not fit the image.
    #[must_use]
    pub fn is_address_error(&self) -> bool {
        matches!(
            self,
            Self::AddressDecode { .. } | Self::AddressOutOfRange { .. }
        )
    }
}

pub mod hex;
pub mod record;
