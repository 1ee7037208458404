//! PDB / PalmDoc / MOBI / EXTH header parsing.
//!
//! All multi-byte integers in the container are big-endian; headers are
//! parsed once into host-order structs and never written back.

use crate::error::{Error, Result};

pub const PDB_HEADER_LEN: usize = 78;
pub const PDB_RECORD_HEADER_LEN: usize = 8;
pub const PALMDOC_HEADER_LEN: usize = 16;
pub const MOBI_HEADER_LEN: usize = 232;

pub const MOBI_TYPE_CREATOR: &[u8; 8] = b"BOOKMOBI";
pub const PALMDOC_TYPE_CREATOR: &[u8; 8] = b"TEXtREAd";

pub const NULL_INDEX: u32 = 0xFFFF_FFFF;

#[inline]
fn be16(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}

#[inline]
fn be32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// First 78 bytes of a Palm database.
#[derive(Debug)]
pub struct PdbHeader {
    pub name: String,
    pub attributes: u16,
    pub version: u16,
    pub create_time: u32,
    pub modify_time: u32,
    pub backup_time: u32,
    pub modification_number: u32,
    /// Type and creator four-character codes, concatenated.
    pub type_creator: [u8; 8],
    pub num_records: u16,
}

impl PdbHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PDB_HEADER_LEN {
            return Err(Error::InvalidMobi("PDB header too short".into()));
        }

        let name_end = data[..32].iter().position(|&b| b == 0).unwrap_or(32);
        let name = String::from_utf8_lossy(&data[..name_end]).into_owned();

        let mut type_creator = [0u8; 8];
        type_creator.copy_from_slice(&data[60..68]);

        Ok(PdbHeader {
            name,
            attributes: be16(data, 32),
            version: be16(data, 34),
            create_time: be32(data, 36),
            modify_time: be32(data, 40),
            backup_time: be32(data, 44),
            modification_number: be32(data, 48),
            type_creator,
            num_records: be16(data, 76),
        })
    }

    pub fn is_mobi(&self) -> bool {
        &self.type_creator == MOBI_TYPE_CREATOR
    }

    pub fn is_palmdoc(&self) -> bool {
        &self.type_creator == PALMDOC_TYPE_CREATOR
    }
}

/// Per-record entry of the PDB record list.
#[derive(Debug, Clone, Copy)]
pub struct PdbRecord {
    pub offset: u32,
    /// deleted/dirty/busy/secret bits plus a four-bit category.
    pub attributes: u8,
    pub unique_id: u32,
}

impl PdbRecord {
    pub fn parse(data: &[u8]) -> Self {
        debug_assert!(data.len() >= PDB_RECORD_HEADER_LEN);
        PdbRecord {
            offset: be32(data, 0),
            attributes: data[4],
            unique_id: u32::from_be_bytes([0, data[5], data[6], data[7]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    PalmDoc,
    Huffman,
}

impl Compression {
    pub fn from_type(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            2 => Some(Compression::PalmDoc),
            17480 => Some(Compression::Huffman),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cp1252,
    Utf8,
    Unknown(u32),
}

impl Encoding {
    pub fn from_codepage(value: u32) -> Self {
        match value {
            1252 => Encoding::Cp1252,
            65001 => Encoding::Utf8,
            other => Encoding::Unknown(other),
        }
    }
}

/// The 16-byte header at the start of record 0.
#[derive(Debug)]
pub struct PalmDocHeader {
    pub compression: Compression,
    pub uncompressed_size: u32,
    pub record_count: u16,
    pub max_record_size: u16,
    /// MOBI files; PalmDoc-only files store a reading position instead.
    pub encryption: u16,
    pub current_position: u32,
}

impl PalmDocHeader {
    pub fn parse(data: &[u8], is_mobi: bool) -> Result<Self> {
        if data.len() < PALMDOC_HEADER_LEN {
            return Err(Error::InvalidMobi("record 0 too short".into()));
        }
        let compression_type = be16(data, 0);
        let compression = Compression::from_type(compression_type).ok_or_else(|| {
            Error::InvalidMobi(format!("unknown compression type {compression_type}"))
        })?;

        let (encryption, current_position) = if is_mobi {
            (be16(data, 12), 0)
        } else {
            (0, be32(data, 12))
        };

        Ok(PalmDocHeader {
            compression,
            uncompressed_size: be32(data, 4),
            record_count: be16(data, 8),
            max_record_size: be16(data, 10),
            encryption,
            current_position,
        })
    }
}

/// Document type carried in the MOBI header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    MobiBook,
    PalmDoc,
    Audio,
    News,
    NewsFeed,
    NewsMagazine,
    Pics,
    Word,
    Xls,
    Ppt,
    Text,
    Html,
    Unknown(u32),
}

impl DocType {
    pub fn from_code(value: u32) -> Self {
        match value {
            2 => DocType::MobiBook,
            3 => DocType::PalmDoc,
            4 => DocType::Audio,
            257 => DocType::News,
            258 => DocType::NewsFeed,
            259 => DocType::NewsMagazine,
            513 => DocType::Pics,
            514 => DocType::Word,
            515 => DocType::Xls,
            516 => DocType::Ppt,
            517 => DocType::Text,
            518 => DocType::Html,
            other => DocType::Unknown(other),
        }
    }
}

/// The MOBI sub-header following the PalmDoc header in record 0.
#[derive(Debug)]
pub struct MobiHeader {
    pub header_len: u32,
    pub doc_type: DocType,
    pub encoding: Encoding,
    pub unique_id: u32,
    pub format_version: u32,
    /// Index records: ortographic, inflection, names, keys, extra 0-5.
    /// `NULL_INDEX` marks "not present".
    pub index_records: [u32; 10],
    pub first_non_book_rec: u32,
    pub full_name_offset: u32,
    pub full_name_len: u32,
    pub locale: u32,
    pub input_dict_language: u32,
    pub output_dict_language: u32,
    pub min_format_version: u32,
    pub image_first_rec: u32,
    pub huffman_first_rec: u32,
    pub huffman_rec_count: u32,
    pub huffman_table_offset: u32,
    pub huffman_table_len: u32,
    pub exth_flags: u32,
    pub drm_offset: u32,
    pub drm_count: u32,
    pub drm_size: u32,
    pub drm_flags: u32,
    /// Only meaningful when `header_len >= 228`.
    pub extra_data_flags: u16,
    pub indx_rec: i32,
}

impl MobiHeader {
    /// Parse from the bytes following the PalmDoc header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::InvalidMobi("MOBI header too short".into()));
        }
        if &data[0..4] != b"MOBI" {
            return Err(Error::InvalidMobi("MOBI id mismatch".into()));
        }
        let header_len = be32(data, 4);
        if data.len() < MOBI_HEADER_LEN {
            return Err(Error::InvalidMobi("MOBI header truncated".into()));
        }

        let mut index_records = [NULL_INDEX; 10];
        for (i, slot) in index_records.iter_mut().enumerate() {
            *slot = be32(data, 24 + i * 4);
        }

        let extra_data_flags = if header_len >= 228 { be16(data, 226) } else { 0 };

        Ok(MobiHeader {
            header_len,
            doc_type: DocType::from_code(be32(data, 8)),
            encoding: Encoding::from_codepage(be32(data, 12)),
            unique_id: be32(data, 16),
            format_version: be32(data, 20),
            index_records,
            first_non_book_rec: be32(data, 64),
            full_name_offset: be32(data, 68),
            full_name_len: be32(data, 72),
            locale: be32(data, 76),
            input_dict_language: be32(data, 80),
            output_dict_language: be32(data, 84),
            min_format_version: be32(data, 88),
            image_first_rec: be32(data, 92),
            huffman_first_rec: be32(data, 96),
            huffman_rec_count: be32(data, 100),
            huffman_table_offset: be32(data, 104),
            huffman_table_len: be32(data, 108),
            exth_flags: be32(data, 112),
            drm_offset: be32(data, 148),
            drm_count: be32(data, 152),
            drm_size: be32(data, 156),
            drm_flags: be32(data, 160),
            extra_data_flags,
            indx_rec: be32(data, 228) as i32,
        })
    }

    /// Bit 6 flags an EXTH block after the MOBI header.
    pub fn has_exth(&self) -> bool {
        self.exth_flags & 0x40 != 0
    }

    /// Decompose `extra_data_flags`: trailer count and the multibyte flag.
    pub fn trailer_layout(&self) -> (usize, bool) {
        let mut flags = self.extra_data_flags;
        let multibyte = flags & 1 != 0;
        let mut trailers = 0;
        while flags > 1 {
            if flags & 2 != 0 {
                trailers += 1;
            }
            flags >>= 1;
        }
        (trailers, multibyte)
    }
}

/// One EXTH metadata record.
#[derive(Debug, Clone)]
pub struct ExthRecord {
    pub tag: u32,
    pub data: Vec<u8>,
}

/// The EXTH metadata block.
#[derive(Debug, Default)]
pub struct ExthHeader {
    pub records: Vec<ExthRecord>,
}

impl ExthHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 || &data[0..4] != b"EXTH" {
            return Err(Error::InvalidMobi("EXTH id mismatch".into()));
        }
        let total_len = be32(data, 4) as usize;
        let count = be32(data, 8) as usize;
        let limit = total_len.min(data.len());

        let mut records = Vec::new();
        let mut pos = 12;
        for _ in 0..count {
            if pos + 8 > limit {
                break;
            }
            let tag = be32(data, pos);
            let len = be32(data, pos + 4) as usize;
            if len < 8 || pos + len > limit {
                break;
            }
            records.push(ExthRecord {
                tag,
                data: data[pos + 8..pos + len].to_vec(),
            });
            pos += len;
        }
        Ok(ExthHeader { records })
    }

    pub fn get(&self, tag: u32) -> Option<&[u8]> {
        self.records
            .iter()
            .find(|r| r.tag == tag)
            .map(|r| r.data.as_slice())
    }
}
