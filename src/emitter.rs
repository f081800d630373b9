use std::io::Write;

use crate::format::{LoadError, ADDR_SIZE};
use crate::loader::LoadedProgram;

/// Tag that replaces `H` in the echoed header.
pub const ECHO_TAG: char = 'I';
/// Bytes per line of the relocated dump.
pub const BYTES_PER_LINE: usize = 32;

/// Echoes a shape-checked header line as the tag and the program name,
/// without a line break.
///
/// # Errors
/// Returns `LoadError::Io` when `output` fails.
pub fn write_header_echo<W: Write>(output: &mut W, line: &str) -> Result<(), LoadError> {
    let name = line.get(1..=ADDR_SIZE).unwrap_or_default();
    write!(output, "{ECHO_TAG}{name}")?;
    Ok(())
}

/// Writes the relocated start address, program size and relocated transfer
/// address, then the relocated window of the image as hex pairs.
///
/// A line break precedes every run of [`BYTES_PER_LINE`] bytes, the first
/// one included, and the output always ends with a line break.
///
/// # Errors
/// `AddressOutOfRange` when the window does not fit the image (nothing is
/// written in that case) and `Io` when `output` fails.
pub fn emit_program<W: Write>(output: &mut W, program: &LoadedProgram) -> Result<(), LoadError> {
    let bytes = program.relocated_bytes()?;
    write!(
        output,
        "{:06X}{:06X}{:06X}",
        program.load_address(),
        program.header.program_size,
        program.transfer_address
    )?;
    for (i, byte) in bytes.iter().enumerate() {
        if i % BYTES_PER_LINE == 0 {
            writeln!(output)?;
        }
        write!(output, "{byte:02X}")?;
    }
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
