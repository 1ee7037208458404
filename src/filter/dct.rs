//! JPEG (DCTDecode) adapter over the `jpeg-decoder` engine.
//!
//! The engine does not support suspended decoding, so the filter gathers the
//! whole stream first, decodes once, and then emits interleaved component
//! bytes row by row under output backpressure.

use std::io::Cursor;

use jpeg_decoder::{Decoder, PixelFormat};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus};
use crate::object::Dict;

#[derive(Debug, Clone, Copy, Default)]
pub struct DctParams {
    /// The PDF `ColorTransform` hint. Component-count colorspace guessing
    /// and the Adobe APP14 override happen inside the engine; the hint is
    /// only checked for contradictions.
    pub color_transform: Option<i32>,
}

impl DctParams {
    pub fn from_dict(dict: Option<&Dict>) -> Self {
        DctParams {
            color_transform: dict
                .and_then(|d| d.get("ColorTransform"))
                .and_then(|o| o.as_int()),
        }
    }
}

pub struct DctDecode {
    params: DctParams,
    compressed: Vec<u8>,
    pixels: Vec<u8>,
    emitted: usize,
    decoded: bool,
}

impl DctDecode {
    pub fn new(params: DctParams) -> Self {
        DctDecode {
            params,
            compressed: Vec::new(),
            pixels: Vec::new(),
            emitted: 0,
            decoded: false,
        }
    }
}

impl Filter for DctDecode {
    fn name(&self) -> &'static str {
        "dctd"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        if !self.decoded {
            let n = input.remaining();
            self.compressed.extend_from_slice(input.readable());
            input.consume(n);
            if !input.at_eof() {
                return Ok(FilterStatus::NeedInput);
            }

            let mut decoder = Decoder::new(Cursor::new(&self.compressed));
            self.pixels = decoder
                .decode()
                .map_err(|e| Error::filter("dctd", e.to_string()))?;
            if let Some(info) = decoder.info()
                && self.params.color_transform == Some(0)
                && info.pixel_format == PixelFormat::RGB24
            {
                log::warn!("dctd: engine applied a color transform despite ColorTransform 0");
            }
            self.compressed = Vec::new();
            self.decoded = true;
        }

        while self.emitted < self.pixels.len() {
            if output.space() == 0 {
                return Ok(FilterStatus::NeedOutput);
            }
            let n = output.space().min(self.pixels.len() - self.emitted);
            output.writable()[..n].copy_from_slice(&self.pixels[self.emitted..self.emitted + n]);
            output.commit(n);
            self.emitted += n;
        }
        Ok(FilterStatus::Done)
    }
}
