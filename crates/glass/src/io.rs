//! Pluggable program input and output.
//!
//! The `I.*` and `O.*` builtins talk to these traits rather than to the
//! process streams directly, so tests (and embedders) can run programs
//! against in-memory buffers. The default implementations buffer stdout and
//! flush when dropped, and read stdin through a buffered reader so `I.e`
//! can peek for end of input without consuming anything.
//!
//! Glass strings are byte sequences, so both sides of the interface work in
//! raw bytes.

use std::io::{self, BufRead as _, BufReader, BufWriter, Write as _};

/// Destination for `O.o` and `O.on` output.
pub trait OutputWriter {
    /// Writes raw bytes. Called once per builtin invocation; no separators
    /// or terminators are added by the runtime.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Default writer backed by buffered stdout.
///
/// Output is flushed when the writer is dropped, and on demand via
/// [`StdOutput::flush`].
#[derive(Debug)]
pub struct StdOutput {
    inner: BufWriter<io::Stdout>,
}

impl StdOutput {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: BufWriter::new(io::stdout()),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Default for StdOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputWriter for StdOutput {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }
}

impl Drop for StdOutput {
    fn drop(&mut self) {
        let _ = self.inner.flush();
    }
}

/// Writer that collects all output into a byte buffer.
///
/// Useful for testing or capturing program output programmatically.
#[derive(Debug, Default)]
pub struct CollectOutput(Vec<u8>);

impl CollectOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected bytes so far.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the writer and returns the collected bytes.
    #[must_use]
    pub fn into_output(self) -> Vec<u8> {
        self.0
    }
}

impl OutputWriter for CollectOutput {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.extend_from_slice(bytes);
        Ok(())
    }
}

/// Writer that discards all output.
#[derive(Debug, Default)]
pub struct NoOutput;

impl OutputWriter for NoOutput {
    fn write_bytes(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// Source for the `I.l`, `I.c`, and `I.e` builtins.
pub trait InputReader {
    /// Reads up to the next newline. Returns the line without its
    /// terminator, or `None` when the input is exhausted. The builtin adds
    /// the trailing `\n` itself.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Reads a single byte, or `None` at end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Whether the input is exhausted, without consuming anything.
    fn at_eof(&mut self) -> io::Result<bool>;
}

/// Default reader backed by buffered stdin.
#[derive(Debug)]
pub struct StdInput {
    inner: BufReader<io::Stdin>,
}

impl StdInput {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: BufReader::new(io::stdin()),
        }
    }
}

impl Default for StdInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputReader for StdInput {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.inner.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let buffered = self.inner.fill_buf()?;
        let Some(&byte) = buffered.first() else {
            return Ok(None);
        };
        self.inner.consume(1);
        Ok(Some(byte))
    }

    fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.inner.fill_buf()?.is_empty())
    }
}

/// Reader over an in-memory byte buffer, for tests and embedding.
#[derive(Debug, Default)]
pub struct SliceInput {
    data: Vec<u8>,
    pos: usize,
}

impl SliceInput {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl InputReader for SliceInput {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let rest = &self.data[self.pos..];
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(newline) => (&rest[..newline], newline + 1),
            None => (rest, rest.len()),
        };
        let line = line.to_vec();
        self.pos += consumed;
        Ok(Some(line))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let Some(&byte) = self.data.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        Ok(Some(byte))
    }

    fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.pos >= self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_input_reads_lines_and_bytes() {
        let mut input = SliceInput::new(&b"ab\ncd"[..]);
        assert_eq!(input.read_line().unwrap(), Some(b"ab".to_vec()));
        assert!(!input.at_eof().unwrap());
        assert_eq!(input.read_byte().unwrap(), Some(b'c'));
        assert_eq!(input.read_line().unwrap(), Some(b"d".to_vec()));
        assert!(input.at_eof().unwrap());
        assert_eq!(input.read_line().unwrap(), None);
        assert_eq!(input.read_byte().unwrap(), None);
    }

    #[test]
    fn collect_output_accumulates() {
        let mut out = CollectOutput::new();
        out.write_bytes(b"abc").unwrap();
        out.write_bytes(b"def").unwrap();
        assert_eq!(out.output(), b"abcdef");
    }
}
