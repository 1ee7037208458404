//! CCITT Group 3 / Group 4 fax decoding.
//!
//! Bits are consumed MSB-first from a 32-bit register refilled a byte at a
//! time. Each decoded row lives in `dst` until an end-of-line condition
//! copies it out (inverted unless `BlackIs1`) and swaps it with the
//! reference row used by two-dimensional codes.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::fax_tables::{
    BLACK_BITS, BLACK_DECODE, CODE_H, CODE_P, CODE_UNCOMPRESSED, CODE_V0, CODE_VL1, CODE_VL2,
    CODE_VL3, CODE_VR1, CODE_VR2, CODE_VR3, CfdEntry, TWO_D_BITS, TWO_D_DECODE, WHITE_BITS,
    WHITE_DECODE,
};
use crate::filter::{Filter, FilterStatus};
use crate::object::Dict;

#[derive(Debug, Clone, Copy)]
pub struct FaxParams {
    /// Coding scheme: 0 = G3 one-dimensional, > 0 = G3 mixed with `k` rows
    /// per 1-D tag, < 0 = G4 two-dimensional only.
    pub k: i32,
    pub end_of_line: bool,
    pub encoded_byte_align: bool,
    pub columns: usize,
    /// 0 = unlimited.
    pub rows: usize,
    pub end_of_block: bool,
    pub black_is_1: bool,
}

impl Default for FaxParams {
    fn default() -> Self {
        FaxParams {
            k: 0,
            end_of_line: false,
            encoded_byte_align: false,
            columns: 1728,
            rows: 0,
            end_of_block: true,
            black_is_1: false,
        }
    }
}

impl FaxParams {
    pub fn from_dict(dict: Option<&Dict>) -> Self {
        let mut params = FaxParams::default();
        if let Some(dict) = dict {
            params.k = dict.get_int("K", params.k);
            params.end_of_line = dict.get_bool("EndOfLine", params.end_of_line);
            params.encoded_byte_align =
                dict.get_bool("EncodedByteAlign", params.encoded_byte_align);
            params.columns = dict.get_int("Columns", params.columns as i32).max(1) as usize;
            params.rows = dict.get_int("Rows", params.rows as i32).max(0) as usize;
            params.end_of_block = dict.get_bool("EndOfBlock", params.end_of_block);
            params.black_is_1 = dict.get_bool("BlackIs1", params.black_is_1);
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaxStage {
    /// Waiting for any code.
    Normal,
    /// A make-up code was consumed; a terminating code must follow.
    Makeup,
    /// A finished row is waiting for output space.
    Eol,
    /// Inside a horizontal code, first and second run.
    H1,
    H2,
}

enum Next {
    Decode,
    Eol,
    Rtc,
}

pub struct FaxDecode {
    k: i32,
    end_of_line: bool,
    encoded_byte_align: bool,
    columns: i32,
    rows: usize,
    end_of_block: bool,
    black_is_1: bool,

    stride: usize,
    row_index: usize,

    /// Bits already consumed from `word`; >= 8 means a refill is due.
    bidx: i32,
    word: u32,

    stage: FaxStage,
    /// Current x position, -1 before the first code of a row.
    a: i32,
    /// Current color, false = white.
    black: bool,
    /// Current dimension, 1 or 2.
    dim: u8,
    /// Consecutive EOL markers seen.
    eolc: u32,

    reference: Vec<u8>,
    dst: Vec<u8>,
}

#[inline]
fn get_bit(line: &[u8], x: i32) -> u8 {
    (line[(x >> 3) as usize] >> (7 - (x & 7))) & 1
}

const LEFT_MASK: [u8; 8] = [0xFF, 0x7F, 0x3F, 0x1F, 0x0F, 0x07, 0x03, 0x01];
const RIGHT_MASK: [u8; 8] = [0x00, 0x80, 0xC0, 0xE0, 0xF0, 0xF8, 0xFC, 0xFE];

fn set_bits(line: &mut [u8], x0: i32, x1: i32) {
    let x0 = x0.max(0);
    if x1 <= x0 {
        return;
    }
    let a0 = (x0 >> 3) as usize;
    let a1 = (x1 >> 3) as usize;
    let b0 = (x0 & 7) as usize;
    let b1 = (x1 & 7) as usize;

    if a0 == a1 {
        if b1 > 0 {
            line[a0] |= LEFT_MASK[b0] & RIGHT_MASK[b1];
        }
    } else {
        line[a0] |= LEFT_MASK[b0];
        for byte in &mut line[a0 + 1..a1] {
            *byte = 0xFF;
        }
        if b1 > 0 {
            line[a1] |= RIGHT_MASK[b1];
        }
    }
}

/// First changing element on `line` to the right of `x`.
fn find_changing(line: &[u8], x: i32, w: i32) -> i32 {
    let (start, color) = if x == -1 {
        (0, 0)
    } else {
        (x + 1, get_bit(line, x))
    };
    let mut x = start;
    while x < w {
        if get_bit(line, x) != color {
            break;
        }
        x += 1;
    }
    x
}

/// First changing element to the right of `x` whose left-side color is
/// `color`.
fn find_changing_color(line: &[u8], x: i32, w: i32, color: u8) -> i32 {
    let mut x = find_changing(line, x, w);
    if x < w && get_bit(line, x) != color {
        x = find_changing(line, x, w);
    }
    x
}

impl FaxDecode {
    pub fn new(params: FaxParams) -> Self {
        let columns = params.columns.max(1);
        let stride = ((columns - 1) >> 3) + 1;
        FaxDecode {
            k: params.k,
            end_of_line: params.end_of_line,
            encoded_byte_align: params.encoded_byte_align,
            columns: columns as i32,
            rows: params.rows,
            end_of_block: params.end_of_block,
            black_is_1: params.black_is_1,
            stride,
            row_index: 0,
            bidx: 32,
            word: 0,
            stage: FaxStage::Normal,
            a: -1,
            black: false,
            dim: if params.k < 0 { 2 } else { 1 },
            eolc: 0,
            reference: vec![0; stride],
            dst: vec![0; stride],
        }
    }

    #[inline]
    fn eat_bits(&mut self, nbits: i32) {
        self.word = if nbits >= 32 { 0 } else { self.word << nbits };
        self.bidx += nbits;
    }

    /// Top up the 32-bit register. Returns false when input ran dry first.
    fn fill_bits(&mut self, input: &mut Buffer) -> bool {
        while self.bidx >= 8 {
            if input.remaining() == 0 {
                return false;
            }
            let byte = input.readable()[0];
            input.consume(1);
            self.bidx -= 8;
            self.word |= u32::from(byte) << self.bidx;
        }
        true
    }

    fn get_code(&mut self, table: &[CfdEntry], width: u32) -> Result<i16> {
        let idx = (self.word >> (32 - width)) as usize;
        let entry = table[idx];
        if entry.nbits == 0 {
            return Err(Error::filter("faxd", "invalid code"));
        }
        self.eat_bits(i32::from(entry.nbits));
        Ok(entry.val)
    }

    fn get_run(&mut self) -> Result<i16> {
        if self.black {
            self.get_code(&BLACK_DECODE, BLACK_BITS)
        } else {
            self.get_code(&WHITE_DECODE, WHITE_BITS)
        }
    }

    /// Decode one 1-D run (also the runs inside a 2-D horizontal code).
    fn dec1d(&mut self) -> Result<()> {
        if self.a == -1 {
            self.a = 0;
        }

        let code = self.get_run()?;

        if i32::from(code) + self.a > self.columns {
            return Err(Error::filter("faxd", "run overflows row"));
        }

        if self.black {
            set_bits(&mut self.dst, self.a, self.a + i32::from(code));
        }
        self.a += i32::from(code);

        if code < 64 {
            self.black = !self.black;
            self.stage = match self.stage {
                FaxStage::H1 => FaxStage::H2,
                FaxStage::H2 => FaxStage::Normal,
                _ => FaxStage::Normal,
            };
        } else if !matches!(self.stage, FaxStage::H1 | FaxStage::H2) {
            self.stage = FaxStage::Makeup;
        }

        Ok(())
    }

    /// Decode one 2-D code.
    fn dec2d(&mut self) -> Result<()> {
        if matches!(self.stage, FaxStage::H1 | FaxStage::H2) {
            return self.dec1d();
        }

        let code = self.get_code(&TWO_D_DECODE, TWO_D_BITS)?;
        let not_black = u8::from(!self.black);

        match code {
            CODE_H => {
                self.stage = FaxStage::H1;
            }
            CODE_P => {
                let b1 = find_changing_color(&self.reference, self.a, self.columns, not_black);
                let b2 = if b1 >= self.columns {
                    self.columns
                } else {
                    find_changing(&self.reference, b1, self.columns)
                };
                if self.black {
                    set_bits(&mut self.dst, self.a, b2);
                }
                self.a = b2;
            }
            CODE_V0 | CODE_VR1 | CODE_VR2 | CODE_VR3 => {
                let delta = i32::from(code - CODE_V0);
                let mut b1 =
                    delta + find_changing_color(&self.reference, self.a, self.columns, not_black);
                if b1 >= self.columns {
                    b1 = self.columns;
                }
                if self.black {
                    set_bits(&mut self.dst, self.a, b1);
                }
                self.a = b1;
                self.black = !self.black;
            }
            CODE_VL1 | CODE_VL2 | CODE_VL3 => {
                let delta = i32::from(code - CODE_VL1) + 1;
                let mut b1 =
                    find_changing_color(&self.reference, self.a, self.columns, not_black) - delta;
                if b1 < 0 {
                    b1 = 0;
                }
                if self.black {
                    set_bits(&mut self.dst, self.a, b1);
                }
                self.a = b1;
                self.black = !self.black;
            }
            CODE_UNCOMPRESSED => {
                return Err(Error::filter("faxd", "uncompressed data"));
            }
            _ => {
                return Err(Error::filter("faxd", format!("invalid 2d code {code}")));
            }
        }

        Ok(())
    }

    /// Copy the finished row out, swap row buffers, reset per-row state.
    /// Returns NeedOutput (via Err-free Option) when the output lacks room.
    fn finish_row(&mut self, input: &mut Buffer, output: &mut Buffer) -> Option<FilterStatus> {
        if output.space() < self.stride {
            self.stage = FaxStage::Eol;
            return Some(FilterStatus::NeedOutput);
        }

        if self.black_is_1 {
            output.writable()[..self.stride].copy_from_slice(&self.dst);
        } else {
            for (out, src) in output.writable()[..self.stride].iter_mut().zip(&self.dst) {
                *out = src ^ 0xFF;
            }
        }
        output.commit(self.stride);

        std::mem::swap(&mut self.reference, &mut self.dst);
        self.dst.fill(0);

        self.stage = FaxStage::Normal;
        self.black = false;
        self.a = -1;
        self.row_index += 1;

        if !self.end_of_block && self.rows > 0 && self.row_index >= self.rows {
            self.push_back_unused(input);
            return Some(FilterStatus::Done);
        }

        // No EOL told us the next dimension; infer it from the row cadence.
        if self.k > 0 && self.eolc == 0 {
            self.dim = if self.row_index % self.k as usize == 0 { 1 } else { 2 };
        }

        // With EncodedByteAlign the padding between rows is mandatory.
        if self.encoded_byte_align {
            if self.end_of_line {
                self.eat_bits((12 - self.bidx) & 7);
            } else {
                self.eat_bits((8 - self.bidx) & 7);
            }
        }

        None
    }

    /// Hand whole unconsumed register bytes back to the caller.
    fn push_back_unused(&mut self, input: &mut Buffer) {
        if self.bidx < 32 {
            let n = ((32 - self.bidx) / 8) as usize;
            input.unread(n.min(input.read_pos()));
        }
    }
}

impl Filter for FaxDecode {
    fn name(&self) -> &'static str {
        "faxd"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        if self.stage == FaxStage::Eol
            && let Some(status) = self.finish_row(input, output)
        {
            return Ok(status);
        }

        loop {
            let mut next = Next::Decode;

            if !self.fill_bits(input) {
                if input.at_eof() {
                    if self.bidx > 31 {
                        if self.a > 0 {
                            next = Next::Eol;
                        } else {
                            next = Next::Rtc;
                        }
                    }
                    // Otherwise decode the zero-padded remainder.
                } else {
                    return Ok(FilterStatus::NeedInput);
                }
            }

            if matches!(next, Next::Decode) {
                if (self.word >> 20) == 0 {
                    // Hunting for the 1 bit that ends an EOL marker.
                    self.eat_bits(1);
                    continue;
                }

                if (self.word >> 20) == 1 {
                    self.eat_bits(12);
                    self.eolc += 1;

                    if self.k > 0 {
                        if self.a == -1 {
                            self.a = 0;
                        }
                        self.dim = if (self.word >> 31) == 1 { 1 } else { 2 };
                        self.eat_bits(1);
                    }
                } else if self.k > 0 && self.a == -1 {
                    // Start of a mixed-mode row without a preceding EOL.
                    self.a = 0;
                    self.dim = if (self.word >> 31) == 1 { 1 } else { 2 };
                    self.eat_bits(1);
                } else if self.dim == 1 {
                    self.eolc = 0;
                    self.dec1d()?;
                } else {
                    self.eolc = 0;
                    self.dec2d()?;
                }

                // No EOL check after a make-up code or inside an H code.
                if matches!(self.stage, FaxStage::Makeup | FaxStage::H1 | FaxStage::H2) {
                    continue;
                }

                if self.eolc > 0 || self.a >= self.columns {
                    if self.a > 0 {
                        next = Next::Eol;
                    } else if self.eolc == if self.k < 0 { 2 } else { 6 } {
                        next = Next::Rtc;
                    } else {
                        continue;
                    }
                } else {
                    continue;
                }
            }

            match next {
                Next::Eol => {
                    if let Some(status) = self.finish_row(input, output) {
                        return Ok(status);
                    }
                }
                Next::Rtc => {
                    self.push_back_unused(input);
                    return Ok(FilterStatus::Done);
                }
                Next::Decode => unreachable!(),
            }
        }
    }
}
