//! PNG/TIFF predictor decoding, applied after a decompression filter.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus};
use crate::object::Dict;

/// Most colors a row can carry; matches the per-component scratch arrays.
const MAX_COLORS: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct PredictorParams {
    pub predictor: i32,
    pub columns: usize,
    pub colors: usize,
    pub bits_per_component: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        PredictorParams {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl PredictorParams {
    pub fn from_dict(dict: Option<&Dict>) -> Self {
        let mut params = PredictorParams::default();
        if let Some(dict) = dict {
            params.predictor = dict.get_int("Predictor", params.predictor);
            params.columns = dict.get_int("Columns", params.columns as i32).max(1) as usize;
            params.colors = dict.get_int("Colors", params.colors as i32).max(1) as usize;
            params.bits_per_component =
                dict.get_int("BitsPerComponent", params.bits_per_component as i32).max(1) as usize;
        }
        params
    }
}

pub struct Predict {
    predictor: i32,
    columns: usize,
    colors: usize,
    bpc: usize,
    stride: usize,
    bpp: usize,
    /// Previous output row, zeroed before the first row. PNG variants only.
    reference: Vec<u8>,
}

impl Predict {
    pub fn new(params: PredictorParams) -> Result<Self> {
        let mut predictor = params.predictor;
        if !matches!(predictor, 1 | 2 | 10..=15) {
            log::warn!("invalid predictor: {predictor}");
            predictor = 1;
        }
        if params.colors > MAX_COLORS {
            return Err(Error::filter("predict", "too many colors"));
        }
        if !matches!(params.bits_per_component, 1 | 2 | 4 | 8) {
            return Err(Error::filter("predict", "unsupported bits per component"));
        }

        let stride = (params.bits_per_component * params.colors * params.columns).div_ceil(8);
        let bpp = (params.bits_per_component * params.colors).div_ceil(8);

        Ok(Predict {
            predictor,
            columns: params.columns,
            colors: params.colors,
            bpc: params.bits_per_component,
            stride,
            bpp,
            reference: if predictor >= 10 { vec![0; stride] } else { Vec::new() },
        })
    }

    fn decode_tiff(&self, row_in: &[u8], row_out: &mut [u8]) {
        let mut left = [0i32; MAX_COLORS];
        for i in 0..self.columns {
            for k in 0..self.colors {
                let a = get_component(row_in, i * self.colors + k, self.bpc);
                let b = (a + left[k]).rem_euclid(1 << self.bpc);
                put_component(row_out, i * self.colors + k, self.bpc, b);
                left[k] = b;
            }
        }
    }

    fn decode_png(&self, row_in: &[u8], row_out: &mut [u8], row_predictor: u8) {
        let mut left = [0i32; MAX_COLORS];
        let mut up_left = [0i32; MAX_COLORS];
        let mut k = 0usize;
        for i in 0..self.stride {
            let raw = row_in[i] as i32;
            let up = self.reference[i] as i32;
            let value = match row_predictor {
                0 => raw,
                1 => raw + left[k],
                2 => raw + up,
                3 => raw + (left[k] + up) / 2,
                4 => raw + paeth(left[k], up, up_left[k]),
                _ => raw,
            } as u8;
            row_out[i] = value;
            left[k] = value as i32;
            up_left[k] = up;
            k = (k + 1) % self.bpp;
        }
    }
}

#[inline]
fn get_component(buf: &[u8], x: usize, bpc: usize) -> i32 {
    (match bpc {
        1 => (buf[x / 8] >> (7 - (x % 8))) & 0x01,
        2 => (buf[x / 4] >> ((3 - (x % 4)) * 2)) & 0x03,
        4 => (buf[x / 2] >> ((1 - (x % 2)) * 4)) & 0x0f,
        _ => buf[x],
    }) as i32
}

#[inline]
fn put_component(buf: &mut [u8], x: usize, bpc: usize, value: i32) {
    let value = value as u8;
    match bpc {
        1 => buf[x / 8] |= value << (7 - (x % 8)),
        2 => buf[x / 4] |= value << ((3 - (x % 4)) * 2),
        4 => buf[x / 2] |= value << ((1 - (x % 2)) * 4),
        _ => buf[x] = value,
    }
}

#[inline]
fn paeth(a: i32, b: i32, c: i32) -> i32 {
    let pa = (b - c).abs();
    let pb = (a - c).abs();
    let pc = (b - c + a - c).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

impl Filter for Predict {
    fn name(&self) -> &'static str {
        "predict"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        let is_png = self.predictor >= 10;
        let row_cost = self.stride + usize::from(is_png);

        loop {
            if input.remaining() < row_cost {
                if input.at_eof() {
                    return Ok(FilterStatus::Done);
                }
                return Ok(FilterStatus::NeedInput);
            }
            if output.space() < self.stride {
                return Ok(FilterStatus::NeedOutput);
            }

            if self.predictor == 1 {
                let row = &input.readable()[..self.stride];
                output.writable()[..self.stride].copy_from_slice(row);
            } else if self.predictor == 2 {
                if self.bpc != 8 {
                    output.writable()[..self.stride].fill(0);
                }
                let row: Vec<u8> = input.readable()[..self.stride].to_vec();
                self.decode_tiff(&row, &mut output.writable()[..self.stride]);
            } else {
                // Each PNG row leads with its own filter-type byte.
                let row_predictor = input.readable()[0];
                let row: Vec<u8> = input.readable()[1..self.stride + 1].to_vec();
                input.consume(1);
                let mut out_row = vec![0u8; self.stride];
                self.decode_png(&row, &mut out_row, row_predictor);
                output.writable()[..self.stride].copy_from_slice(&out_row);
                self.reference.copy_from_slice(&out_row);
            }

            input.consume(self.stride);
            output.commit(self.stride);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Stage;

    fn decode(params: PredictorParams, input: &[u8]) -> Vec<u8> {
        let mut stage = Stage::new(Predict::new(params).unwrap());
        let mut inbuf = Buffer::from_bytes(input.to_vec());
        let mut collected = Vec::new();
        loop {
            let mut out = Buffer::with_capacity(64);
            let status = stage.process(&mut inbuf, &mut out).unwrap();
            collected.extend_from_slice(out.readable());
            match status {
                FilterStatus::Done => return collected,
                FilterStatus::NeedOutput => {}
                FilterStatus::NeedInput => return collected,
            }
        }
    }

    #[test]
    fn test_png_up() {
        let params = PredictorParams {
            predictor: 12,
            columns: 4,
            ..Default::default()
        };
        let data = [2, 1, 1, 1, 1, 2, 1, 1, 1, 1];
        assert_eq!(decode(params, &data), [1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_png_sub() {
        let params = PredictorParams {
            predictor: 11,
            columns: 4,
            ..Default::default()
        };
        let data = [1, 10, 1, 1, 1];
        assert_eq!(decode(params, &data), [10, 11, 12, 13]);
    }

    #[test]
    fn test_png_row_byte_overrides_declared() {
        // Declared Average, rows say None and Up.
        let params = PredictorParams {
            predictor: 13,
            columns: 2,
            ..Default::default()
        };
        let data = [0, 7, 9, 2, 1, 1];
        assert_eq!(decode(params, &data), [7, 9, 8, 10]);
    }

    #[test]
    fn test_tiff_differencing() {
        let params = PredictorParams {
            predictor: 2,
            columns: 3,
            ..Default::default()
        };
        assert_eq!(decode(params, &[1, 1, 1]), [1, 2, 3]);
    }

    #[test]
    fn test_tiff_wraps_modulo_bpc() {
        let params = PredictorParams {
            predictor: 2,
            columns: 2,
            ..Default::default()
        };
        assert_eq!(decode(params, &[200, 100]), [200, 44]);
    }

    #[test]
    fn test_invalid_predictor_downgrades_to_passthrough() {
        let params = PredictorParams {
            predictor: 7,
            columns: 3,
            ..Default::default()
        };
        assert_eq!(decode(params, &[5, 6, 7]), [5, 6, 7]);
    }

    #[test]
    fn test_paeth_roundtrip_row() {
        // Paeth with zero reference row degenerates to Sub.
        let params = PredictorParams {
            predictor: 14,
            columns: 3,
            ..Default::default()
        };
        let data = [4, 5, 1, 1];
        assert_eq!(decode(params, &data), [5, 6, 7]);
    }
}
