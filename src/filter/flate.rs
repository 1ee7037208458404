//! Deflate adapters over `flate2`'s low-level streaming API.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus};
use crate::object::Dict;

/// Parameters shared by the decoder and encoder.
#[derive(Debug, Clone, Copy)]
pub struct FlateParams {
    /// Raw deflate without the zlib wrapper (the `ZIP` extension key).
    pub zip: bool,
    /// Compression effort 0..=9; negative selects the default. Encode only.
    pub effort: i32,
}

impl Default for FlateParams {
    fn default() -> Self {
        FlateParams {
            zip: false,
            effort: -1,
        }
    }
}

impl FlateParams {
    pub fn from_dict(dict: Option<&Dict>) -> Self {
        let mut params = FlateParams::default();
        if let Some(dict) = dict {
            params.zip = dict.get_bool("ZIP", params.zip);
            params.effort = dict.get_int("Effort", params.effort);
        }
        params
    }
}

pub struct FlateDecode {
    z: Decompress,
}

impl FlateDecode {
    pub fn new(params: FlateParams) -> Self {
        FlateDecode {
            // A negative window size in zlib terms: no header to parse.
            z: Decompress::new(!params.zip),
        }
    }
}

impl Filter for FlateDecode {
    fn name(&self) -> &'static str {
        "flated"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        if input.remaining() == 0 && !input.at_eof() {
            return Ok(FilterStatus::NeedInput);
        }
        if output.space() == 0 {
            return Ok(FilterStatus::NeedOutput);
        }

        let flush = if input.at_eof() {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };

        let before_in = self.z.total_in();
        let before_out = self.z.total_out();
        let status = self
            .z
            .decompress(input.readable(), output.writable(), flush)
            .map_err(|e| Error::filter("flated", e.to_string()))?;
        input.consume((self.z.total_in() - before_in) as usize);
        output.commit((self.z.total_out() - before_out) as usize);

        match status {
            Status::StreamEnd => Ok(FilterStatus::Done),
            // The engine cannot advance; with input gone this is a truncated
            // but accepted stream.
            Status::BufError => {
                if input.remaining() == 0 && input.at_eof() {
                    Ok(FilterStatus::Done)
                } else if output.space() == 0 {
                    Ok(FilterStatus::NeedOutput)
                } else {
                    Ok(FilterStatus::NeedInput)
                }
            }
            Status::Ok => {
                if output.space() == 0 {
                    Ok(FilterStatus::NeedOutput)
                } else {
                    Ok(FilterStatus::NeedInput)
                }
            }
        }
    }
}

pub struct FlateEncode {
    z: Compress,
}

impl FlateEncode {
    pub fn new(params: FlateParams) -> Self {
        let level = if params.effort < 0 {
            Compression::default()
        } else {
            Compression::new(params.effort.min(9) as u32)
        };
        FlateEncode {
            z: Compress::new(level, !params.zip),
        }
    }
}

impl Filter for FlateEncode {
    fn name(&self) -> &'static str {
        "flatee"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        if input.remaining() == 0 && !input.at_eof() {
            return Ok(FilterStatus::NeedInput);
        }
        if output.space() == 0 {
            return Ok(FilterStatus::NeedOutput);
        }

        let flush = if input.at_eof() {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };

        let before_in = self.z.total_in();
        let before_out = self.z.total_out();
        let status = self
            .z
            .compress(input.readable(), output.writable(), flush)
            .map_err(|e| Error::filter("flatee", e.to_string()))?;
        input.consume((self.z.total_in() - before_in) as usize);
        output.commit((self.z.total_out() - before_out) as usize);

        match status {
            Status::StreamEnd => Ok(FilterStatus::Done),
            Status::Ok | Status::BufError => {
                if output.space() == 0 {
                    Ok(FilterStatus::NeedOutput)
                } else {
                    Ok(FilterStatus::NeedInput)
                }
            }
        }
    }
}
