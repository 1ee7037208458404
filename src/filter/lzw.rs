//! LZW decoding over `weezl`.
//!
//! PDF LZW is the TIFF flavor: MSB-first, 8-bit symbols, 9..12-bit codes,
//! clear and end-of-data codes, and by default the "early change" convention
//! where the code width bumps one code early.

use weezl::{BitOrder, LzwStatus, decode::Decoder};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus};
use crate::object::Dict;

pub struct LzwDecode {
    decoder: Decoder,
}

impl LzwDecode {
    pub fn new(params: Option<&Dict>) -> Self {
        let early_change = params
            .map(|d| d.get_int("EarlyChange", 1) != 0)
            .unwrap_or(true);
        let decoder = if early_change {
            Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
        } else {
            Decoder::new(BitOrder::Msb, 8)
        };
        LzwDecode { decoder }
    }
}

impl Filter for LzwDecode {
    fn name(&self) -> &'static str {
        "lzwd"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        if input.remaining() == 0 && !input.at_eof() {
            return Ok(FilterStatus::NeedInput);
        }
        if output.space() == 0 {
            return Ok(FilterStatus::NeedOutput);
        }

        let result = self.decoder.decode_bytes(input.readable(), output.writable());
        input.consume(result.consumed_in);
        output.commit(result.consumed_out);

        match result.status {
            Ok(LzwStatus::Done) => Ok(FilterStatus::Done),
            Ok(LzwStatus::Ok) => {
                if output.space() == 0 {
                    Ok(FilterStatus::NeedOutput)
                } else {
                    Ok(FilterStatus::NeedInput)
                }
            }
            Ok(LzwStatus::NoProgress) => {
                if input.at_eof() {
                    // Truncated stream without an explicit end-of-data code.
                    Ok(FilterStatus::Done)
                } else if output.space() == 0 {
                    Ok(FilterStatus::NeedOutput)
                } else {
                    Ok(FilterStatus::NeedInput)
                }
            }
            Err(e) => Err(Error::filter("lzwd", e.to_string())),
        }
    }
}
