use std::collections::VecDeque;
use std::io::{BufRead, Read};

use log::trace;

use crate::format::{LoadError, HEADER_RECORD_SIZE};

/// Longest record line read, line feed included.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Pulls the header line and then whitespace-delimited record tokens from
/// a text stream, one line at a time.
#[derive(Debug)]
pub struct RecordReader<R> {
    input: R,
    pending: VecDeque<String>,
    line: String,
    line_limit: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            pending: VecDeque::new(),
            line: String::new(),
            line_limit: MAX_LINE_LENGTH,
        }
    }

    #[must_use]
    pub fn with_line_limit(mut self, line_limit: usize) -> Self {
        self.line_limit = line_limit.max(1);
        self
    }

    /// Reads the first line verbatim, without its line feed.
    ///
    /// # Errors
    /// Returns `MalformedRecord` when the stream is empty, starts with an
    /// empty line or its first line is too long to be a header, and `Io`
    /// when the stream cannot be read.
    pub fn header_line(&mut self) -> Result<String, LoadError> {
        // room for a stray carriage return so the length check reports it
        if self.read_bounded_line(HEADER_RECORD_SIZE + 1)? == 0 {
            return Err(LoadError::malformed("header record doesn't exist"));
        }
        let line = self.line.strip_suffix('\n').unwrap_or(&self.line);
        if line.is_empty() {
            return Err(LoadError::malformed("header record doesn't exist"));
        }
        trace!("header line: {line:?}");
        Ok(line.to_string())
    }

    /// Next whitespace-delimited token, or `None` at end of stream.
    ///
    /// # Errors
    /// Returns `MalformedRecord` for a line longer than the line limit and
    /// `Io` when the stream cannot be read.
    pub fn next_token(&mut self) -> Result<Option<String>, LoadError> {
        while self.pending.is_empty() {
            if self.read_bounded_line(self.line_limit)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(self.line.split_ascii_whitespace().map(str::to_string));
        }
        Ok(self.pending.pop_front())
    }

    /// Like [`Self::next_token`] but treats end of stream as a malformed
    /// program.
    ///
    /// # Errors
    /// Returns `MalformedRecord` at end of stream.
    pub fn expect_token(&mut self) -> Result<String, LoadError> {
        self.next_token()?
            .ok_or_else(|| LoadError::malformed("unexpected end of input before end record"))
    }

    fn read_bounded_line(&mut self, limit: usize) -> Result<usize, LoadError> {
        self.line.clear();
        let read = (&mut self.input)
            .take(limit as u64)
            .read_line(&mut self.line)?;
        if read == limit && !self.line.ends_with('\n') {
            return Err(LoadError::malformed(format!(
                "line is longer than {} characters",
                limit - 1
            )));
        }
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::RecordReader;
    use crate::format::LoadError;
    use std::io::Cursor;

    #[test]
    fn splits_header_then_tokens() {
        let input = "HPROG  001000000010\nT00100001AA  M000001\n\n\tE\n";
        let mut reader = RecordReader::new(Cursor::new(input));
        assert_eq!(reader.header_line().expect("header"), "HPROG  001000000010");
        assert_eq!(reader.expect_token().expect("t"), "T00100001AA");
        assert_eq!(reader.expect_token().expect("m"), "M000001");
        assert_eq!(reader.expect_token().expect("e"), "E");
        assert_eq!(reader.next_token().expect("eof"), None);
    }

    #[test]
    fn header_keeps_carriage_return() {
        let mut reader = RecordReader::new(Cursor::new("HPROG  001000000010\r\n"));
        assert_eq!(reader.header_line().expect("header"), "HPROG  001000000010\r");
    }

    #[test]
    fn empty_stream_has_no_header() {
        let mut reader = RecordReader::new(Cursor::new(""));
        let err = reader.header_line().expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }

    #[test]
    fn overlong_header_line_is_cut_off() {
        let line = format!("HPROG  001000000010{}", "0".repeat(100_000));
        let mut reader = RecordReader::new(Cursor::new(line));
        let err = reader.header_line().expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }

    #[test]
    fn overlong_token_line_is_cut_off() {
        let input = format!("HPROG  001000000010\nT{}\nE\n", "0".repeat(64));
        let mut reader = RecordReader::new(Cursor::new(input)).with_line_limit(32);
        reader.header_line().expect("header");
        let err = reader.next_token().expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }

    #[test]
    fn line_at_limit_with_line_feed_is_read() {
        let mut reader = RecordReader::new(Cursor::new("T000000\nE\n")).with_line_limit(8);
        assert_eq!(reader.expect_token().expect("t"), "T000000");
        assert_eq!(reader.expect_token().expect("e"), "E");
    }

    #[test]
    fn missing_tokens_are_malformed() {
        let mut reader = RecordReader::new(Cursor::new("   \n"));
        let err = reader.expect_token().expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }
}
