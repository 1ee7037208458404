//! JPEG-2000 (JPXDecode) adapter over the `jpeg2k` engine.
//!
//! The codestream cannot be decoded incrementally, so the filter buffers the
//! entire input, decodes once, and walks the image row-major with one output
//! byte per component per pixel.

use jpeg2k::Image;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus};

pub struct JpxDecode {
    compressed: Vec<u8>,
    /// Interleaved 8-bit samples after decode.
    samples: Vec<u8>,
    emitted: usize,
    decoded: bool,
}

impl JpxDecode {
    pub fn new() -> Self {
        JpxDecode {
            compressed: Vec::new(),
            samples: Vec::new(),
            emitted: 0,
            decoded: false,
        }
    }

    fn decode(&mut self) -> Result<()> {
        let image =
            Image::from_bytes(&self.compressed).map_err(|e| Error::filter("jpxd", e.to_string()))?;
        let components = image.components();
        if components.is_empty() {
            return Err(Error::filter("jpxd", "no image components"));
        }

        let width = components[0].width() as usize;
        let height = components[0].height() as usize;
        let precision = components[0].precision();
        for comp in &components[1..] {
            if comp.width() as usize != width || comp.height() as usize != height {
                return Err(Error::filter("jpxd", "components differ in geometry"));
            }
            if comp.precision() != precision {
                return Err(Error::filter("jpxd", "components differ in precision"));
            }
        }

        let mut samples = Vec::with_capacity(width * height * components.len());
        for y in 0..height {
            for x in 0..width {
                for comp in components {
                    let mut v = comp.data()[y * width + x];
                    if comp.is_signed() {
                        v += 1 << (precision - 1);
                    }
                    if precision > 8 {
                        v >>= precision - 8;
                    }
                    samples.push(v as u8);
                }
            }
        }
        self.samples = samples;
        self.compressed = Vec::new();
        Ok(())
    }
}

impl Default for JpxDecode {
    fn default() -> Self {
        JpxDecode::new()
    }
}

impl Filter for JpxDecode {
    fn name(&self) -> &'static str {
        "jpxd"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        if !self.decoded {
            let n = input.remaining();
            self.compressed.extend_from_slice(input.readable());
            input.consume(n);
            if !input.at_eof() {
                return Ok(FilterStatus::NeedInput);
            }
            self.decode()?;
            self.decoded = true;
        }

        while self.emitted < self.samples.len() {
            if output.space() == 0 {
                return Ok(FilterStatus::NeedOutput);
            }
            let n = output.space().min(self.samples.len() - self.emitted);
            output.writable()[..n].copy_from_slice(&self.samples[self.emitted..self.emitted + n]);
            output.commit(n);
            self.emitted += n;
        }
        Ok(FilterStatus::Done)
    }
}
