//! Huff/Cdic decompression for MOBI files.
//!
//! Huffman-compressed records are driven by a HUFF record holding a 256-entry
//! cache table and a 64-entry base table, plus up to 32 CDIC records holding
//! the symbol dictionaries. Dictionary symbols may themselves be compressed,
//! in which case decoding recurses (bounded by the dictionary limit).

use crate::error::{Error, Result};
use crate::mobi::bitreader::BitReader;

pub const CDICS_MAX: usize = 32;

const HUFF_HEADER_LEN: usize = 24;
const CDIC_HEADER_LEN: usize = 16;
const CACHE_DATA_LEN: usize = 256 * 4;
const BASE_TABLE_DATA_LEN: usize = 64 * 4;
/// Big-endian tables only.
const HUFF_RECORD_MIN_LEN: usize = HUFF_HEADER_LEN + CACHE_DATA_LEN + BASE_TABLE_DATA_LEN;
/// Big-endian tables plus their little-endian mirrors.
const HUFF_RECORD_FULL_LEN: usize =
    HUFF_HEADER_LEN + 2 * CACHE_DATA_LEN + 2 * BASE_TABLE_DATA_LEN;

/// Compressed symbols may nest; no legitimate file needs more levels than it
/// can have dictionaries.
const MAX_DEPTH: usize = CDICS_MAX;

#[inline]
fn be16(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}

#[inline]
fn be32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

#[inline]
fn le32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

#[derive(Default)]
pub struct HuffDicDecompressor {
    /// 256 entries: terminal flag (bit 7), code length (low 5 bits), and a
    /// payload in bits 8..32.
    cache: Vec<u32>,
    /// 32 (min, max) pairs indexed by code length.
    base_table: Vec<u32>,
    /// Code bit-width shared by every dictionary.
    code_length: u32,
    dicts: Vec<Vec<u8>>,
}

impl HuffDicDecompressor {
    pub fn new() -> Self {
        HuffDicDecompressor::default()
    }

    pub fn dict_count(&self) -> usize {
        self.dicts.len()
    }

    /// Load the HUFF record. Tables are stored big-endian; when the record
    /// also carries little-endian mirrors they are cross-checked.
    pub fn set_huff_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < HUFF_RECORD_MIN_LEN {
            return Err(Error::InvalidMobi("HUFF record too short".into()));
        }
        if &data[0..4] != b"HUFF" {
            return Err(Error::InvalidMobi("HUFF id mismatch".into()));
        }
        let hdr_len = be32(data, 4) as usize;
        let cache_offset = be32(data, 8) as usize;
        let base_table_offset = be32(data, 12) as usize;
        if hdr_len != HUFF_HEADER_LEN
            || cache_offset != HUFF_HEADER_LEN
            || base_table_offset != cache_offset + CACHE_DATA_LEN
        {
            return Err(Error::InvalidMobi("HUFF header layout mismatch".into()));
        }

        self.cache = (0..256).map(|i| be32(data, cache_offset + i * 4)).collect();
        self.base_table = (0..64)
            .map(|i| be32(data, base_table_offset + i * 4))
            .collect();

        if data.len() >= HUFF_RECORD_FULL_LEN {
            let cache_offset_le = be32(data, 16) as usize;
            let base_table_offset_le = be32(data, 20) as usize;
            if cache_offset_le + CACHE_DATA_LEN <= data.len()
                && base_table_offset_le + BASE_TABLE_DATA_LEN <= data.len()
            {
                let cache_ok = (0..256).all(|i| le32(data, cache_offset_le + i * 4) == self.cache[i]);
                let base_ok =
                    (0..64).all(|i| le32(data, base_table_offset_le + i * 4) == self.base_table[i]);
                if !cache_ok || !base_ok {
                    return Err(Error::InvalidMobi(
                        "HUFF little-endian mirror disagrees".into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Load one CDIC record. All CDICs of a file must agree on the code
    /// bit-width.
    pub fn add_cdic_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < CDIC_HEADER_LEN {
            return Err(Error::InvalidMobi("CDIC record too short".into()));
        }
        if &data[0..4] != b"CDIC" {
            return Err(Error::InvalidMobi("CDIC id mismatch".into()));
        }
        if be32(data, 4) as usize != CDIC_HEADER_LEN {
            return Err(Error::InvalidMobi("CDIC header length mismatch".into()));
        }
        let code_length = be32(data, 12);
        if code_length == 0 || code_length > 32 {
            return Err(Error::InvalidMobi(format!(
                "CDIC code length {code_length} out of range"
            )));
        }
        if self.code_length != 0 && code_length != self.code_length {
            return Err(Error::InvalidMobi(format!(
                "CDIC code length {} disagrees with {}",
                code_length, self.code_length
            )));
        }
        self.code_length = code_length;

        if self.dicts.len() == CDICS_MAX {
            return Err(Error::InvalidMobi("too many CDIC records".into()));
        }
        let size = data.len() - CDIC_HEADER_LEN;
        if (1u64 << code_length) <= size as u64 {
            return Err(Error::InvalidMobi("CDIC symbol table oversized".into()));
        }
        self.dicts.push(data[CDIC_HEADER_LEN..].to_vec());
        Ok(())
    }

    /// Decompress `src`, producing at most `capacity` bytes.
    pub fn decompress(&self, src: &[u8], capacity: usize) -> Result<Vec<u8>> {
        let mut dst = Vec::with_capacity(capacity.min(8192));
        self.decompress_into(src, &mut dst, capacity, 0)?;
        Ok(dst)
    }

    fn decompress_into(
        &self,
        src: &[u8],
        dst: &mut Vec<u8>,
        capacity: usize,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::InvalidMobi("symbol recursion too deep".into()));
        }
        if self.cache.is_empty() {
            return Err(Error::InvalidMobi("HUFF tables not loaded".into()));
        }

        let mut reader = BitReader::new(src);
        let mut bits_consumed = 0usize;

        loop {
            if bits_consumed > reader.bits_left() {
                return Err(Error::InvalidMobi("compressed data truncated".into()));
            }
            reader.eat(bits_consumed);
            if reader.bits_left() == 0 {
                break;
            }

            let bits = reader.peek(32);
            // Trailing zero padding inside the final byte.
            if reader.bits_left() < 8 && bits == 0 {
                break;
            }

            let v = self.cache[(bits >> 24) as usize];
            let mut code_len = v & 0x1F;
            if code_len == 0 {
                return Err(Error::InvalidMobi("HUFF cache entry with zero code length".into()));
            }
            let terminal = v & 0x80 != 0;

            let code = if terminal {
                (v >> 8).wrapping_sub(bits >> (32 - code_len))
            } else {
                // Walk the base table upward until the prefix fits.
                code_len -= 1;
                loop {
                    if code_len >= 32 {
                        return Err(Error::InvalidMobi("HUFF code longer than 32 bits".into()));
                    }
                    let base_val = self.base_table[(code_len * 2) as usize];
                    let candidate = bits >> (31 - code_len);
                    code_len += 1;
                    if base_val <= candidate {
                        break self.base_table[((code_len - 1) * 2 + 1) as usize]
                            .wrapping_sub(bits >> (32 - code_len));
                    }
                }
            };

            self.decode_one(code, dst, capacity, depth)?;
            bits_consumed = code_len as usize;
        }

        Ok(())
    }

    fn decode_one(&self, code: u32, dst: &mut Vec<u8>, capacity: usize, depth: usize) -> Result<()> {
        let dict_index = (code >> self.code_length) as usize;
        if dict_index >= self.dicts.len() {
            return Err(Error::InvalidMobi(format!(
                "dictionary index {dict_index} out of range"
            )));
        }
        let dict = &self.dicts[dict_index];
        let code = code & (((1u64 << self.code_length) - 1) as u32);

        let offset_pos = code as usize * 2;
        if offset_pos + 2 > dict.len() {
            return Err(Error::InvalidMobi("CDIC offset table truncated".into()));
        }
        let offset = be16(dict, offset_pos) as usize;
        if offset + 2 > dict.len() {
            return Err(Error::InvalidMobi(format!("CDIC offset {offset} out of range")));
        }

        let sym_len = be16(dict, offset);
        let start = offset + 2;

        if sym_len & 0x8000 == 0 {
            // The symbol is itself Huffman-compressed.
            let end = (start + sym_len as usize).min(dict.len());
            self.decompress_into(&dict[start..end], dst, capacity, depth + 1)
        } else {
            let len = (sym_len & 0x7FFF) as usize;
            if len > 127 {
                return Err(Error::InvalidMobi(format!("symbol length {len} too long")));
            }
            if start + len > dict.len() {
                return Err(Error::InvalidMobi("CDIC symbol truncated".into()));
            }
            if dst.len() + len > capacity {
                return Err(Error::InvalidMobi("decompressed record overflows capacity".into()));
            }
            dst.extend_from_slice(&dict[start..start + len]);
            Ok(())
        }
    }
}
