//! Small byte-oriented filters: copy, fixed-length passthrough, ASCIIHex,
//! ASCII85 and run-length decoding.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus};

#[inline]
fn is_white(c: u8) -> bool {
    matches!(c, b'\n' | b'\r' | b'\t' | b' ' | 0 | 0x0c | 0x08 | 0x7f)
}

/// Copies input to output until input eof.
#[derive(Default)]
pub struct CopyFilter;

impl CopyFilter {
    pub fn new() -> Self {
        CopyFilter
    }
}

impl Filter for CopyFilter {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        loop {
            if input.remaining() == 0 {
                if input.at_eof() {
                    return Ok(FilterStatus::Done);
                }
                return Ok(FilterStatus::NeedInput);
            }
            if output.space() == 0 {
                return Ok(FilterStatus::NeedOutput);
            }
            let n = input.remaining().min(output.space());
            output.writable()[..n].copy_from_slice(&input.readable()[..n]);
            input.consume(n);
            output.commit(n);
        }
    }
}

/// Copies exactly `len` bytes (unbounded when `len` is negative), then
/// reports done.
pub struct NullFilter {
    len: i64,
    cur: i64,
}

impl NullFilter {
    pub fn new(len: i64) -> Self {
        NullFilter { len, cur: 0 }
    }
}

impl Filter for NullFilter {
    fn name(&self) -> &'static str {
        "null"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        let mut n = input.remaining().min(output.space());
        if self.len >= 0 {
            n = n.min((self.len - self.cur) as usize);
        }
        if n > 0 {
            output.writable()[..n].copy_from_slice(&input.readable()[..n]);
            input.consume(n);
            output.commit(n);
            self.cur += n as i64;
        }

        if self.len >= 0 && self.cur == self.len {
            return Ok(FilterStatus::Done);
        }
        if input.remaining() == 0 {
            if input.at_eof() {
                return Ok(FilterStatus::Done);
            }
            return Ok(FilterStatus::NeedInput);
        }
        if output.space() == 0 {
            return Ok(FilterStatus::NeedOutput);
        }
        Err(Error::filter("null", "stalled with no progress"))
    }
}

/// ASCIIHexDecode: two hex nibbles per output byte, whitespace skipped,
/// `>` terminates (a pending nibble is emitted as the high half).
#[derive(Default)]
pub struct AsciiHexDecode {
    odd: bool,
    acc: u8,
}

impl AsciiHexDecode {
    pub fn new() -> Self {
        AsciiHexDecode::default()
    }

    fn flush(&mut self, output: &mut Buffer) {
        if self.odd {
            output.push(self.acc << 4);
            self.odd = false;
        }
    }
}

#[inline]
fn from_hex(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 0xa),
        b'A'..=b'F' => Some(c - b'A' + 0xa),
        _ => None,
    }
}

impl Filter for AsciiHexDecode {
    fn name(&self) -> &'static str {
        "ahxd"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        loop {
            if input.remaining() == 0 {
                if input.at_eof() {
                    // Truncated stream: flush like an implicit '>'.
                    if self.odd && output.space() == 0 {
                        return Ok(FilterStatus::NeedOutput);
                    }
                    self.flush(output);
                    return Ok(FilterStatus::Done);
                }
                return Ok(FilterStatus::NeedInput);
            }
            if output.space() == 0 {
                return Ok(FilterStatus::NeedOutput);
            }

            let c = input.readable()[0];
            input.consume(1);

            if let Some(nibble) = from_hex(c) {
                if !self.odd {
                    self.acc = nibble;
                    self.odd = true;
                } else {
                    output.push((self.acc << 4) | nibble);
                    self.odd = false;
                }
            } else if c == b'>' {
                self.flush(output);
                return Ok(FilterStatus::Done);
            } else if !is_white(c) {
                return Err(Error::filter("ahxd", format!("bad data: 0x{c:02x}")));
            }
        }
    }
}

/// ASCII85Decode: groups of five base-85 digits produce four bytes; `z` is a
/// shorthand for four zero bytes; `~>` ends the stream.
#[derive(Default)]
pub struct Ascii85Decode {
    word: u32,
    count: u8,
}

impl Ascii85Decode {
    pub fn new() -> Self {
        Ascii85Decode::default()
    }

    /// Emit the partial final group, as after the `~>` marker.
    fn flush_tail(&mut self, output: &mut Buffer) -> Result<()> {
        match self.count {
            0 => {}
            1 => return Err(Error::filter("a85d", "partial final byte")),
            2 => {
                let word = self.word.wrapping_mul(85 * 85 * 85).wrapping_add(0xff_ffff);
                output.push((word >> 24) as u8);
            }
            3 => {
                let word = self.word.wrapping_mul(85 * 85).wrapping_add(0xffff);
                output.push((word >> 24) as u8);
                output.push((word >> 16) as u8);
            }
            4 => {
                let word = self.word.wrapping_mul(85).wrapping_add(0xff);
                output.push((word >> 24) as u8);
                output.push((word >> 16) as u8);
                output.push((word >> 8) as u8);
            }
            _ => unreachable!(),
        }
        self.count = 0;
        Ok(())
    }
}

impl Filter for Ascii85Decode {
    fn name(&self) -> &'static str {
        "a85d"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        loop {
            if input.remaining() == 0 {
                if input.at_eof() {
                    // Truncated stream: treat like an implicit '~>'.
                    if output.space() < self.count.saturating_sub(1) as usize {
                        return Ok(FilterStatus::NeedOutput);
                    }
                    self.flush_tail(output)?;
                    return Ok(FilterStatus::Done);
                }
                return Ok(FilterStatus::NeedInput);
            }

            let c = input.readable()[0];
            input.consume(1);

            match c {
                b'!'..=b'u' => {
                    if self.count == 4 {
                        if output.space() < 4 {
                            input.unread(1);
                            return Ok(FilterStatus::NeedOutput);
                        }
                        let word = self
                            .word
                            .wrapping_mul(85)
                            .wrapping_add(u32::from(c - b'!'));
                        output.push((word >> 24) as u8);
                        output.push((word >> 16) as u8);
                        output.push((word >> 8) as u8);
                        output.push(word as u8);
                        self.word = 0;
                        self.count = 0;
                    } else {
                        self.word = self
                            .word
                            .wrapping_mul(85)
                            .wrapping_add(u32::from(c - b'!'));
                        self.count += 1;
                    }
                }
                b'z' if self.count == 0 => {
                    if output.space() < 4 {
                        input.unread(1);
                        return Ok(FilterStatus::NeedOutput);
                    }
                    output.push(0);
                    output.push(0);
                    output.push(0);
                    output.push(0);
                }
                b'~' => {
                    if input.remaining() == 0 {
                        input.unread(1);
                        if input.at_eof() {
                            // '~' with no '>' at end of data.
                            return Err(Error::filter("a85d", "bad eod marker"));
                        }
                        return Ok(FilterStatus::NeedInput);
                    }
                    let d = input.readable()[0];
                    input.consume(1);
                    if d != b'>' {
                        return Err(Error::filter("a85d", "bad eod marker"));
                    }
                    if output.space() < self.count.saturating_sub(1) as usize {
                        input.unread(2);
                        return Ok(FilterStatus::NeedOutput);
                    }
                    self.flush_tail(output)?;
                    return Ok(FilterStatus::Done);
                }
                c if is_white(c) => {}
                c => {
                    return Err(Error::filter("a85d", format!("bad data: 0x{c:02x}")));
                }
            }
        }
    }
}

/// PDF RunLengthDecode: opcode 0..=127 copies `n + 1` literal bytes, 128 ends
/// the stream, 129..=255 repeats the next byte `257 - n` times.
#[derive(Default)]
pub struct RunLengthDecode;

impl RunLengthDecode {
    pub fn new() -> Self {
        RunLengthDecode
    }
}

impl Filter for RunLengthDecode {
    fn name(&self) -> &'static str {
        "rld"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        loop {
            if input.remaining() == 0 {
                if input.at_eof() {
                    return Ok(FilterStatus::Done);
                }
                return Ok(FilterStatus::NeedInput);
            }
            if output.space() == 0 {
                return Ok(FilterStatus::NeedOutput);
            }

            let op = input.readable()[0];
            input.consume(1);

            match op {
                128 => return Ok(FilterStatus::Done),
                0..=127 => {
                    let run = op as usize + 1;
                    if input.remaining() < run {
                        input.unread(1);
                        if input.at_eof() {
                            log::warn!("rld: truncated literal run");
                            return Ok(FilterStatus::Done);
                        }
                        return Ok(FilterStatus::NeedInput);
                    }
                    if output.space() < run {
                        input.unread(1);
                        return Ok(FilterStatus::NeedOutput);
                    }
                    output.writable()[..run].copy_from_slice(&input.readable()[..run]);
                    input.consume(run);
                    output.commit(run);
                }
                _ => {
                    let run = 257 - op as usize;
                    if input.remaining() == 0 {
                        input.unread(1);
                        if input.at_eof() {
                            log::warn!("rld: truncated back-reference run");
                            return Ok(FilterStatus::Done);
                        }
                        return Ok(FilterStatus::NeedInput);
                    }
                    if output.space() < run {
                        input.unread(1);
                        return Ok(FilterStatus::NeedOutput);
                    }
                    let byte = input.readable()[0];
                    input.consume(1);
                    for _ in 0..run {
                        output.push(byte);
                    }
                }
            }
        }
    }
}
