//! Read-only byte streams with three backings: a file, a memory slice, or a
//! filter chained over another stream.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::buffer::{BUF_SIZE, Buffer};
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus, Stage};

enum Source {
    File(File),
    Memory,
    Filter { stage: Stage, chain: Box<Stream> },
}

pub struct Stream {
    source: Source,
    buffer: Buffer,
    /// Error latched by the byte-wise accessor; collected via `take_error`.
    error: Option<Error>,
    dead: bool,
}

impl Stream {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Stream> {
        Ok(Stream::from_file(File::open(path)?))
    }

    pub fn from_file(file: File) -> Stream {
        Stream {
            source: Source::File(file),
            buffer: Buffer::with_capacity(BUF_SIZE),
            error: None,
            dead: false,
        }
    }

    /// A constant-time-seekable stream over in-memory bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Stream {
        Stream {
            source: Source::Memory,
            buffer: Buffer::from_bytes(bytes),
            error: None,
            dead: false,
        }
    }

    /// Run `filter` over everything `upstream` produces.
    pub fn filtered(filter: impl Filter + 'static, upstream: Stream) -> Stream {
        Stream {
            source: Source::Filter {
                stage: Stage::new(filter),
                chain: Box::new(upstream),
            },
            buffer: Buffer::with_capacity(BUF_SIZE),
            error: None,
            dead: false,
        }
    }

    /// Top up the window from the backing source.
    fn fill(&mut self) -> Result<()> {
        if self.dead {
            return Err(Error::filter("stream", "read from dead stream"));
        }
        if self.buffer.at_eof() {
            return Ok(());
        }

        match &mut self.source {
            Source::Memory => Ok(()),
            Source::File(file) => {
                self.buffer.rewind()?;
                if self.buffer.space() == 0 {
                    self.buffer.grow()?;
                }
                let n = match file.read(self.buffer.writable()) {
                    Ok(n) => n,
                    Err(e) => {
                        self.dead = true;
                        return Err(e.into());
                    }
                };
                if n == 0 {
                    self.buffer.set_eof();
                }
                self.buffer.commit(n);
                Ok(())
            }
            Source::Filter { stage, chain } => {
                self.buffer.rewind()?;
                if self.buffer.space() == 0 {
                    self.buffer.grow()?;
                }
                let mut produced = false;
                loop {
                    let status = match stage.process(&mut chain.buffer, &mut self.buffer) {
                        Ok(status) => status,
                        Err(e) => {
                            self.dead = true;
                            return Err(e);
                        }
                    };
                    if stage.produced() {
                        produced = true;
                    }
                    match status {
                        FilterStatus::Done => return Ok(()),
                        FilterStatus::NeedInput => {
                            // The filter was already handed an exhausted
                            // chain and still wants more.
                            if chain.buffer.at_eof() && chain.buffer.remaining() == 0 {
                                self.dead = true;
                                return Err(Error::filter(
                                    "stream",
                                    "premature end of filtered stream",
                                ));
                            }
                            if let Err(e) = chain.fill() {
                                self.dead = true;
                                return Err(e);
                            }
                        }
                        FilterStatus::NeedOutput => {
                            if produced {
                                return Ok(());
                            }
                            if self.buffer.read_pos() > 0 {
                                self.buffer.rewind()?;
                            } else {
                                self.buffer.grow()?;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Read up to `out.len()` bytes; fewer only at end of stream.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < out.len() {
            let available = self.buffer.remaining().min(out.len() - filled);
            if available > 0 {
                out[filled..filled + available]
                    .copy_from_slice(&self.buffer.readable()[..available]);
                self.buffer.consume(available);
                filled += available;
                continue;
            }
            if self.buffer.at_eof() {
                break;
            }
            self.fill()?;
            if self.buffer.remaining() == 0 && self.buffer.at_eof() {
                break;
            }
        }
        Ok(filled)
    }

    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; BUF_SIZE];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    /// Byte-at-a-time accessor. Errors are latched into the stream; check
    /// `take_error` when `None` could mean either end of data or failure.
    pub fn read_byte(&mut self) -> Option<u8> {
        if self.buffer.remaining() == 0 && !self.buffer.at_eof() && self.error.is_none() {
            if let Err(e) = self.fill() {
                self.error = Some(e);
            }
        }
        if self.buffer.remaining() > 0 {
            let byte = self.buffer.readable()[0];
            self.buffer.consume(1);
            Some(byte)
        } else {
            None
        }
    }

    /// Collect the error latched by `read_byte`, if any.
    pub fn take_error(&mut self) -> Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Logical position: bytes handed out so far.
    pub fn tell(&mut self) -> Result<u64> {
        match &mut self.source {
            Source::File(file) => {
                let pos = file.stream_position()?;
                Ok(pos - self.buffer.remaining() as u64)
            }
            Source::Filter { stage, .. } => {
                Ok(stage.total_out() - self.buffer.remaining() as u64)
            }
            Source::Memory => Ok(self.buffer.read_pos() as u64),
        }
    }

    /// Seek. Files seek freely, memory seeks in constant time, filtered
    /// streams only seek forward (by decoding and discarding).
    pub fn seek(&mut self, pos: SeekFrom) -> Result<()> {
        let pos = match pos {
            SeekFrom::Current(delta) => {
                let cur = self.tell()? as i64;
                SeekFrom::Start((cur + delta).max(0) as u64)
            }
            other => other,
        };

        match &mut self.source {
            Source::File(file) => {
                file.seek(pos)?;
                self.buffer.reset();
                Ok(())
            }
            Source::Memory => {
                let cap = self.buffer.write_pos() as i64;
                let target = match pos {
                    SeekFrom::Start(n) => n as i64,
                    SeekFrom::End(d) => cap + d,
                    SeekFrom::Current(_) => unreachable!(),
                }
                .clamp(0, cap) as usize;
                let read = self.buffer.read_pos();
                if target >= read {
                    self.buffer.consume(target - read);
                } else {
                    self.buffer.unread(read - target);
                }
                Ok(())
            }
            Source::Filter { .. } => {
                let target = match pos {
                    SeekFrom::Start(n) => n,
                    _ => {
                        self.dead = true;
                        return Err(Error::filter("stream", "relative seek in filtered stream"));
                    }
                };
                let cur = self.tell()?;
                if target < cur {
                    self.dead = true;
                    return Err(Error::filter("stream", "backward seek in filtered stream"));
                }
                for _ in cur..target {
                    if self.read_byte().is_none() {
                        self.take_error()?;
                        break;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AsciiHexDecode, NullFilter};

    #[test]
    fn test_memory_stream_read_seek_tell() {
        let mut stream = Stream::from_bytes(b"0123456789".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(stream.tell().unwrap(), 4);

        stream.seek(SeekFrom::Start(8)).unwrap();
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");

        stream.seek(SeekFrom::End(-3)).unwrap();
        assert_eq!(stream.tell().unwrap(), 7);
        assert_eq!(stream.read_byte(), Some(b'7'));
    }

    #[test]
    fn test_filtered_stream() {
        let upstream = Stream::from_bytes(b"48656C6C6F>".to_vec());
        let mut stream = Stream::filtered(AsciiHexDecode::new(), upstream);
        assert_eq!(stream.read_to_end().unwrap(), b"Hello");
    }

    #[test]
    fn test_filtered_stream_forward_seek() {
        let upstream = Stream::from_bytes(b"48656C6C6F>".to_vec());
        let mut stream = Stream::filtered(AsciiHexDecode::new(), upstream);
        stream.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(stream.tell().unwrap(), 3);
        assert_eq!(stream.read_to_end().unwrap(), b"lo");
        assert!(stream.seek(SeekFrom::Start(0)).is_err());
    }

    #[test]
    fn test_filtered_stream_byte_accessor() {
        let upstream = Stream::from_bytes(b"414243>".to_vec());
        let mut stream = Stream::filtered(AsciiHexDecode::new(), upstream);
        assert_eq!(stream.read_byte(), Some(b'A'));
        assert_eq!(stream.read_byte(), Some(b'B'));
        assert_eq!(stream.read_byte(), Some(b'C'));
        assert_eq!(stream.read_byte(), None);
        assert!(stream.take_error().is_ok());
    }

    #[test]
    fn test_nested_filter_chain() {
        // null(4) over hex decode of "DEADBEEF55" keeps the first four bytes.
        let upstream = Stream::from_bytes(b"DEADBEEF55>".to_vec());
        let hex = Stream::filtered(AsciiHexDecode::new(), upstream);
        let mut stream = Stream::filtered(NullFilter::new(4), hex);
        assert_eq!(stream.read_to_end().unwrap(), [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_file_stream() {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abcdefgh").unwrap();
        let mut stream = Stream::from_file(tmp.reopen().unwrap());
        let mut buf = [0u8; 3];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
        assert_eq!(stream.tell().unwrap(), 3);
        stream.seek(SeekFrom::Start(6)).unwrap();
        assert_eq!(stream.read_to_end().unwrap(), b"gh");
    }
}
