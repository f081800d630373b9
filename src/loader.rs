use std::io::{BufRead, Write};

use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ConfigError, LoaderConfig};
use crate::emitter::{emit_program, write_header_echo};
use crate::format::record::{
    check_width, EndRecord, HeaderRecord, ModificationRecord, RecordLimits, TextRecord,
};
use crate::format::LoadError;
use crate::memory::MemoryImage;
use crate::reader::{RecordReader, MAX_LINE_LENGTH};
use crate::relocator::{Relocation, Relocator};

/// Bits of a modification field that hold the address.
pub const ADDRESS_MASK: u32 = 0x000f_ffff;
/// Largest address the six-digit output fields can carry.
pub const MAX_OUTPUT_ADDRESS: i64 = 0x00ff_ffff;

/// A program loaded into its image with every address field relocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedProgram {
    pub header: HeaderRecord,
    pub relocation: Relocation,
    /// Relocated transfer address.
    pub transfer_address: u32,
    pub image: MemoryImage,
}

impl LoadedProgram {
    #[must_use]
    pub fn load_address(&self) -> u32 {
        self.relocation.load_address
    }

    /// The `program_size` bytes of the image starting at the load address.
    ///
    /// # Errors
    /// Returns `LoadError::AddressOutOfRange` when that window leaves the image.
    pub fn relocated_bytes(&self) -> Result<&[u8], LoadError> {
        self.image
            .read(self.load_address(), self.header.program_size as usize)
    }
}

/// Loader settings after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loader {
    capacity: usize,
    limits: RecordLimits,
    relocator: Relocator,
    load_address: Option<u32>,
    seed: Option<u64>,
}

impl Loader {
    /// # Errors
    /// Returns `ConfigError` when `config` does not validate.
    pub fn new(config: &LoaderConfig) -> Result<Self, ConfigError> {
        let relocator = config.validate()?;
        Ok(Self {
            capacity: config.memory_capacity,
            limits: config.limits,
            relocator,
            load_address: config.load_address,
            seed: config.seed,
        })
    }

    #[must_use]
    pub fn relocator(&self) -> &Relocator {
        &self.relocator
    }

    /// Random source for load-address selection: seeded when a seed was
    /// configured, from OS entropy otherwise.
    #[must_use]
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => {
                info!("relocation seed {seed}");
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        }
    }

    /// Loads the program from `input`, relocates it and writes the result
    /// to `output`.
    ///
    /// # Errors
    /// Returns the first `LoadError` hit. Whatever was already written to
    /// `output`, such as the header echo, stays written.
    pub fn relocate<R, W, G>(
        &self,
        input: R,
        output: &mut W,
        rng: &mut G,
    ) -> Result<LoadedProgram, LoadError>
    where
        R: BufRead,
        W: Write,
        G: Rng,
    {
        let program = self.load(input, output, rng)?;
        emit_program(output, &program)?;
        Ok(program)
    }

    /// Runs header, text, modification and end processing. Only the header
    /// echo is written to `output`.
    ///
    /// # Errors
    /// Returns the first `LoadError` hit.
    pub fn load<R, W, G>(
        &self,
        input: R,
        output: &mut W,
        rng: &mut G,
    ) -> Result<LoadedProgram, LoadError>
    where
        R: BufRead,
        W: Write,
        G: Rng,
    {
        let line_limit = MAX_LINE_LENGTH.max(self.limits.text_record_size + 1);
        let mut reader = RecordReader::new(input).with_line_limit(line_limit);
        let header = read_header(&mut reader, output, self.capacity)?;

        let mut image = MemoryImage::allocate(self.capacity)?;
        let relocation = match self.load_address {
            Some(load_address) => Relocation::new(load_address, header.start_address),
            None => self.relocator.choose(rng, header.start_address),
        };
        info!(
            "loading {:?}: start {:#08x}, size {:#08x}, load address {:#08x}, delta {}",
            header.name,
            header.start_address,
            header.program_size,
            relocation.load_address,
            relocation.delta
        );

        let mut engine = RecordEngine::new(&mut image, relocation, self.limits);
        let end = engine.run(&mut reader)?;

        let transfer = relocation.apply(end.transfer_or(header.start_address));
        let transfer_address = checked_output_address(transfer, image.capacity())?;
        debug!("relocated transfer address {transfer_address:#08x}");

        Ok(LoadedProgram {
            header,
            relocation,
            transfer_address,
            image,
        })
    }
}

/// Reads and validates the header line, echoing it to `output` once its
/// shape is known to be right.
///
/// # Errors
/// `MalformedRecord` for a bad line (nothing is echoed), `AddressDecode`
/// for bad fields and `ProgramTooLarge` when the program cannot fit.
pub fn read_header<R: BufRead, W: Write>(
    reader: &mut RecordReader<R>,
    output: &mut W,
    capacity: usize,
) -> Result<HeaderRecord, LoadError> {
    let line = reader.header_line()?;
    HeaderRecord::check_shape(&line)?;
    write_header_echo(output, &line)?;
    let header = HeaderRecord::parse(&line)?;
    if header.program_size as usize > capacity {
        return Err(LoadError::ProgramTooLarge {
            size: header.program_size,
            capacity,
        });
    }
    Ok(header)
}

/// Applies text and modification records to an image until the end record.
///
/// Each stage hands the first token it does not own to the next stage.
#[derive(Debug)]
pub struct RecordEngine<'a> {
    image: &'a mut MemoryImage,
    relocation: Relocation,
    limits: RecordLimits,
}

impl<'a> RecordEngine<'a> {
    pub fn new(image: &'a mut MemoryImage, relocation: Relocation, limits: RecordLimits) -> Self {
        Self {
            image,
            relocation,
            limits,
        }
    }

    /// # Errors
    /// Returns the first `LoadError` hit by any stage.
    pub fn run<R: BufRead>(&mut self, reader: &mut RecordReader<R>) -> Result<EndRecord, LoadError> {
        let lookahead = self.load_text(reader)?;
        let lookahead = self.load_modifications(reader, lookahead)?;
        EndRecord::parse(&lookahead, &self.limits)
    }

    /// Writes text records into the image and returns the first token that
    /// is not one.
    ///
    /// # Errors
    /// `MalformedRecord` for an over-long token or end of input,
    /// `AddressDecode` for bad fields and `AddressOutOfRange` for bytes that
    /// would land outside the image.
    pub fn load_text<R: BufRead>(&mut self, reader: &mut RecordReader<R>) -> Result<String, LoadError> {
        loop {
            let token = reader.expect_token()?;
            check_width(&token, self.limits.text_record_size, "text")?;
            if !token.starts_with('T') {
                return Ok(token);
            }
            let text = TextRecord::parse(&token, &self.limits)?;
            trace!(
                "text record: {} bytes at {:#08x}",
                text.bytes.len(),
                text.start_offset
            );
            self.image.write(text.start_offset, &text.bytes)?;
        }
    }

    /// Patches modification records, starting with `lookahead`, and returns
    /// the first token that is not one.
    ///
    /// # Errors
    /// `MalformedRecord` for an over-long token or end of input,
    /// `AddressDecode` for bad fields and `AddressOutOfRange` for a field
    /// outside the image.
    pub fn load_modifications<R: BufRead>(
        &mut self,
        reader: &mut RecordReader<R>,
        lookahead: String,
    ) -> Result<String, LoadError> {
        let mut token = lookahead;
        while token.starts_with('M') {
            let modification = ModificationRecord::parse(&token, &self.limits)?;
            self.apply_modification(modification)?;
            token = reader.expect_token()?;
            check_width(&token, self.limits.modification_record_size, "modification")?;
        }
        Ok(token)
    }

    /// # Errors
    /// Returns `LoadError::AddressOutOfRange` when the field leaves the image.
    pub fn apply_modification(&mut self, modification: ModificationRecord) -> Result<u32, LoadError> {
        let word = self.image.word_mut(modification.start_offset)?;
        let before = *word;
        let patched = patch_address_field(word, self.relocation.delta);
        trace!(
            "modification at {:#08x}: {:02X?} -> {:02X?}",
            modification.start_offset,
            before,
            word
        );
        Ok(patched)
    }
}

/// Adds `delta` to the 20-bit address held in the low bits of a big-endian
/// three-byte word, modulo 2^20. The flag nibble in the top of `word[0]`
/// is left alone. Returns the new address.
pub fn patch_address_field(word: &mut [u8; 3], delta: i64) -> u32 {
    let address = u32::from_be_bytes([0, word[0], word[1], word[2]]) & ADDRESS_MASK;
    let moved = (i64::from(address) + delta).rem_euclid(i64::from(ADDRESS_MASK) + 1) as u32;
    word[0] = (word[0] & 0xf0) | (moved >> 16) as u8;
    word[1] = (moved >> 8) as u8;
    word[2] = moved as u8;
    moved
}

fn checked_output_address(address: i64, capacity: usize) -> Result<u32, LoadError> {
    if (0..=MAX_OUTPUT_ADDRESS).contains(&address) {
        Ok(address as u32)
    } else {
        Err(LoadError::AddressOutOfRange { address, capacity })
    }
}
