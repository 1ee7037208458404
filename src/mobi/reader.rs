//! MOBI / PalmDoc document reader over a Palm database container.

use std::path::Path;

use crate::error::{Error, Result};
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::mobi::headers::{
    Compression, ExthHeader, MobiHeader, PALMDOC_HEADER_LEN, PDB_HEADER_LEN,
    PDB_RECORD_HEADER_LEN, PalmDocHeader, PdbHeader, PdbRecord,
};
use crate::mobi::huffcdic::{CDICS_MAX, HuffDicDecompressor};
use crate::mobi::palmdoc;

/// Upper bound on a single decompressed text record.
const RECORD_SCRATCH_LEN: usize = 6000;

/// Marks the end of the image record range.
const EOF_IMAGE_REC: [u8; 4] = [0xE9, 0x8E, 0x0D, 0x0A];

/// Structure records interleaved with images; known and skipped.
const NON_IMAGE_MAGIC: [&[u8; 4]; 6] = [b"FLIS", b"FCIS", b"FDST", b"DATP", b"SRCS", b"VIDE"];

/// Detect an image payload by magic bytes.
pub fn detect_image_type(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"\x89PNG") {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

fn is_eof_image_record(data: &[u8]) -> bool {
    data.len() == 4 && data == &EOF_IMAGE_REC
}

fn is_known_non_image_record(data: &[u8]) -> bool {
    NON_IMAGE_MAGIC.iter().any(|magic| data.starts_with(magic.as_slice()))
}

/// An image record payload with its detected media type.
#[derive(Debug, Clone)]
pub struct MobiImage {
    pub data: Vec<u8>,
    pub media_type: &'static str,
}

pub struct MobiDoc {
    source: Box<dyn ByteSource>,
    pdb: PdbHeader,
    records: Vec<PdbRecord>,
    /// Record start offsets plus a file-size sentinel, so that
    /// `offsets[i + 1] - offsets[i]` is record `i`'s size.
    offsets: Vec<u64>,
    palmdoc: PalmDocHeader,
    mobi: Option<MobiHeader>,
    exth: Option<ExthHeader>,
    full_name: Option<String>,
    trailers_count: usize,
    multibyte: bool,
    image_first_rec: usize,
    images: Vec<Option<MobiImage>>,
    huffdic: Option<HuffDicDecompressor>,
}

impl MobiDoc {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_source(Box::new(FileSource::new(file)?))
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_source(Box::new(MemorySource::new(data)))
    }

    pub fn from_source(source: Box<dyn ByteSource>) -> Result<Self> {
        let mut doc = Self::parse_container(source)?;
        doc.load_images();
        Ok(doc)
    }

    fn parse_container(source: Box<dyn ByteSource>) -> Result<Self> {
        let pdb = PdbHeader::parse(&source.read_at(0, PDB_HEADER_LEN)?)?;
        let is_mobi = if pdb.is_mobi() {
            true
        } else if pdb.is_palmdoc() {
            false
        } else {
            return Err(Error::InvalidMobi(format!(
                "unknown pdb type/creator {:?}",
                String::from_utf8_lossy(&pdb.type_creator)
            )));
        };
        if pdb.num_records < 1 {
            return Err(Error::InvalidMobi("no records".into()));
        }

        let num_records = pdb.num_records as usize;
        let list = source.read_at(
            PDB_HEADER_LEN as u64,
            PDB_RECORD_HEADER_LEN * num_records,
        )?;
        let records: Vec<PdbRecord> = list
            .chunks_exact(PDB_RECORD_HEADER_LEN)
            .map(PdbRecord::parse)
            .collect();

        // One extra offset as a sentinel makes record sizes a subtraction.
        let mut offsets: Vec<u64> = records.iter().map(|r| u64::from(r.offset)).collect();
        offsets.push(source.len());
        for i in 0..num_records {
            if offsets[i + 1] < offsets[i] {
                return Err(Error::InvalidMobi(format!(
                    "record {i} offset decreases"
                )));
            }
            // PDB records are nominally capped at 64 KiB; MOBI files break
            // that rule, so sizes stay unchecked.
        }

        let mut doc = MobiDoc {
            source,
            pdb,
            records,
            offsets,
            palmdoc: PalmDocHeader {
                compression: Compression::None,
                uncompressed_size: 0,
                record_count: 0,
                max_record_size: 0,
                encryption: 0,
                current_position: 0,
            },
            mobi: None,
            exth: None,
            full_name: None,
            trailers_count: 0,
            multibyte: false,
            image_first_rec: 0,
            images: Vec::new(),
            huffdic: None,
        };

        let record0 = doc.read_record(0)?;
        doc.palmdoc = PalmDocHeader::parse(&record0, is_mobi)?;
        if is_mobi && doc.palmdoc.encryption != 0 {
            return Err(Error::Unsupported("MOBI encryption".into()));
        }

        let rest = &record0[PALMDOC_HEADER_LEN..];
        if rest.is_empty() {
            // Bare PalmDoc file: no MOBI header, no images.
            if doc.palmdoc.compression == Compression::Huffman {
                return Err(Error::InvalidMobi(
                    "Huffman compression without a MOBI header".into(),
                ));
            }
            return Ok(doc);
        }

        let mobi = MobiHeader::parse(rest)?;

        if (mobi.image_first_rec as usize) < doc.record_count() && mobi.image_first_rec != 0 {
            doc.image_first_rec = mobi.image_first_rec as usize;
        }

        let (trailers, multibyte) = mobi.trailer_layout();
        doc.trailers_count = trailers;
        doc.multibyte = multibyte;

        // The full name lives in record 0, addressed from its start.
        let name_start = mobi.full_name_offset as usize;
        let name_end = name_start.saturating_add(mobi.full_name_len as usize);
        if mobi.full_name_len > 0 && name_end <= record0.len() {
            doc.full_name =
                Some(String::from_utf8_lossy(&record0[name_start..name_end]).into_owned());
        }

        if mobi.has_exth() {
            let exth_start = PALMDOC_HEADER_LEN + mobi.header_len as usize;
            if exth_start < record0.len() {
                match ExthHeader::parse(&record0[exth_start..]) {
                    Ok(exth) => doc.exth = Some(exth),
                    Err(e) => log::warn!("ignoring malformed EXTH block: {e}"),
                }
            }
        }

        if doc.palmdoc.compression == Compression::Huffman {
            if mobi.huffman_first_rec == 0
                || mobi.huffman_first_rec as usize >= doc.record_count()
            {
                return Err(Error::InvalidMobi("missing Huffman record".into()));
            }
            if mobi.huffman_rec_count < 1 {
                return Err(Error::InvalidMobi("no Huffman records declared".into()));
            }
            let cdics_count = (mobi.huffman_rec_count - 1) as usize;
            if cdics_count > CDICS_MAX {
                return Err(Error::InvalidMobi(format!(
                    "too many CDIC records ({cdics_count})"
                )));
            }
            let mut huffdic = HuffDicDecompressor::new();
            huffdic.set_huff_data(&doc.read_record(mobi.huffman_first_rec as usize)?)?;
            for i in 0..cdics_count {
                let rec = doc.read_record(mobi.huffman_first_rec as usize + 1 + i)?;
                huffdic.add_cdic_data(&rec)?;
            }
            doc.huffdic = Some(huffdic);
        }

        doc.mobi = Some(mobi);
        Ok(doc)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn record_size(&self, index: usize) -> usize {
        (self.offsets[index + 1] - self.offsets[index]) as usize
    }

    /// Read one raw record. Sizes are unbounded; each read gets its own
    /// allocation.
    pub fn read_record(&self, index: usize) -> Result<Vec<u8>> {
        if index >= self.record_count() {
            return Err(Error::InvalidMobi(format!(
                "record index {index} out of bounds"
            )));
        }
        Ok(self
            .source
            .read_at(self.offsets[index], self.record_size(index))?)
    }

    pub fn pdb(&self) -> &PdbHeader {
        &self.pdb
    }

    pub fn record_info(&self, index: usize) -> Option<&PdbRecord> {
        self.records.get(index)
    }

    pub fn is_mobi(&self) -> bool {
        self.mobi.is_some()
    }

    pub fn mobi_header(&self) -> Option<&MobiHeader> {
        self.mobi.as_ref()
    }

    pub fn exth(&self) -> Option<&ExthHeader> {
        self.exth.as_ref()
    }

    /// Book title from the MOBI full-name field.
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn compression(&self) -> Compression {
        self.palmdoc.compression
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.palmdoc.uncompressed_size
    }

    pub fn doc_record_count(&self) -> usize {
        self.palmdoc.record_count as usize
    }

    /// Per-record trailer bytes to strip before decompression: sized
    /// trailers (backwards base-128 lengths) and the multibyte tail.
    fn extra_data_size(&self, record: &[u8]) -> usize {
        let mut new_len = record.len();

        for _ in 0..self.trailers_count {
            if new_len < 4 {
                log::warn!("record too short for its trailer data");
                break;
            }
            let mut n = 0usize;
            for j in 0..4 {
                let v = record[new_len - 4 + j];
                if v & 0x80 != 0 {
                    n = 0;
                }
                n = (n << 7) | (v & 0x7F) as usize;
            }
            new_len = new_len.saturating_sub(n);
        }

        if self.multibyte && new_len > 0 {
            let n = (record[new_len - 1] & 3) as usize + 1;
            new_len = new_len.saturating_sub(n);
        }

        record.len() - new_len
    }

    /// Decompress the document text into one contiguous buffer.
    pub fn load_document(&self) -> Result<Vec<u8>> {
        let expected = self.palmdoc.uncompressed_size as usize;
        let mut doc = Vec::with_capacity(expected);

        for i in 1..=self.doc_record_count() {
            let record = self.read_record(i)?;
            let keep = record.len() - self.extra_data_size(&record);
            let data = &record[..keep];

            match self.palmdoc.compression {
                Compression::None => doc.extend_from_slice(data),
                Compression::PalmDoc => {
                    doc.extend(palmdoc::decompress(data, RECORD_SCRATCH_LEN)?)
                }
                Compression::Huffman => {
                    let huffdic = self
                        .huffdic
                        .as_ref()
                        .ok_or_else(|| Error::InvalidMobi("Huffman tables missing".into()))?;
                    doc.extend(huffdic.decompress(data, RECORD_SCRATCH_LEN)?)
                }
            }
        }

        if doc.len() != expected {
            log::warn!(
                "document size mismatch: got {} bytes, header declared {}",
                doc.len(),
                expected
            );
        }
        Ok(doc)
    }

    /// Scan the image-record range, keeping records that carry a known
    /// image format and skipping structure records.
    fn load_images(&mut self) {
        if self.image_first_rec == 0 {
            return;
        }
        for rec_no in self.image_first_rec..self.record_count() {
            let data = match self.read_record(rec_no) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("failed to read image record {rec_no}: {e}");
                    self.images.push(None);
                    continue;
                }
            };
            if is_eof_image_record(&data) {
                break;
            }
            if is_known_non_image_record(&data) {
                self.images.push(None);
                continue;
            }
            match detect_image_type(&data) {
                Some(media_type) => self.images.push(Some(MobiImage { data, media_type })),
                None => {
                    log::warn!("unknown image format in record {rec_no}");
                    self.images.push(None);
                }
            }
        }
    }

    /// Slots in the image-record range; `None` marks skipped records.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> Option<&MobiImage> {
        self.images.get(index).and_then(Option::as_ref)
    }

    pub fn valid_image_count(&self) -> usize {
        self.images.iter().flatten().count()
    }

    pub fn images(&self) -> impl Iterator<Item = &MobiImage> {
        self.images.iter().flatten()
    }
}
