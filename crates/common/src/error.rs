//! Error related data structures to be shared and used.
//!
//! This module contains the [`Error`] enum, which is used to represent
//! errors that can occur within the dotmatrix domain.

use std::fmt::{self, Display, Formatter};

/// Top level enum for error handling within dotmatrix.
///
/// Most of the time, you will want to use the `CustomError` variant
/// to provide a more detailed error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The ROM image is truncated or its size is not a multiple
    /// of the 32 KB cartridge unit.
    RomSize,

    /// The 48 byte logo sequence in the cartridge header does not
    /// match the expected one.
    BadLogo,

    /// The header checksum stored at 0x014d does not match the one
    /// computed over the 0x0134-0x014c header range.
    BadHeaderChecksum,

    /// The CPU fetched one of the opcodes that are left undefined
    /// by the instruction set, execution cannot continue.
    BadOpcode { pc: u16, opcode: u8 },

    /// A host file operation (ROM or RAM image) failed.
    Io(String),

    InvalidParameter(String),
    CustomError(String),
}

impl Error {
    pub fn description(&self) -> String {
        match self {
            Error::RomSize => String::from("Invalid ROM size"),
            Error::BadLogo => String::from("Invalid logo sequence in cartridge header"),
            Error::BadHeaderChecksum => String::from("Invalid cartridge header checksum"),
            Error::BadOpcode { pc, opcode } => {
                format!("Undefined opcode 0x{:02x} at 0x{:04x}", opcode, pc)
            }
            Error::Io(message) => format!("I/O failure: {}", message),
            Error::InvalidParameter(message) => format!("Invalid parameter: {}", message),
            Error::CustomError(message) => String::from(message),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for Error {}
