//! MOBI container tests over synthetic Palm databases.

use folio::Error;
use folio::mobi::{Compression, DocType, MobiDoc};

const PDB_HEADER_LEN: usize = 78;
const MOBI_HEADER_LEN: usize = 232;

/// Assemble a Palm database from raw records.
fn build_pdb(type_creator: &[u8; 8], records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0u8; PDB_HEADER_LEN];
    out[..9].copy_from_slice(b"test book");
    out[60..68].copy_from_slice(type_creator);
    out[76..78].copy_from_slice(&(records.len() as u16).to_be_bytes());

    let mut offset = PDB_HEADER_LEN + 8 * records.len();
    for (i, record) in records.iter().enumerate() {
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.push(0);
        out.extend_from_slice(&[0, 0, i as u8]);
        offset += record.len();
    }
    for record in records {
        out.extend_from_slice(record);
    }
    out
}

#[derive(Default)]
struct Record0 {
    compression: u16,
    uncompressed_size: u32,
    record_count: u16,
    encryption: u16,
    image_first_rec: u32,
    huffman_first_rec: u32,
    huffman_rec_count: u32,
    extra_data_flags: u16,
    full_name: Option<&'static str>,
}

impl Record0 {
    fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.compression.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_be_bytes());
        out.extend_from_slice(&self.record_count.to_be_bytes());
        out.extend_from_slice(&4096u16.to_be_bytes());
        out.extend_from_slice(&self.encryption.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        let mut mobi = vec![0u8; MOBI_HEADER_LEN];
        mobi[0..4].copy_from_slice(b"MOBI");
        mobi[4..8].copy_from_slice(&(MOBI_HEADER_LEN as u32).to_be_bytes());
        mobi[8..12].copy_from_slice(&2u32.to_be_bytes()); // MobiBook
        mobi[12..16].copy_from_slice(&65001u32.to_be_bytes());
        if let Some(name) = self.full_name {
            let name_offset = 16 + MOBI_HEADER_LEN;
            mobi[68..72].copy_from_slice(&(name_offset as u32).to_be_bytes());
            mobi[72..76].copy_from_slice(&(name.len() as u32).to_be_bytes());
        }
        mobi[92..96].copy_from_slice(&self.image_first_rec.to_be_bytes());
        mobi[96..100].copy_from_slice(&self.huffman_first_rec.to_be_bytes());
        mobi[100..104].copy_from_slice(&self.huffman_rec_count.to_be_bytes());
        mobi[226..228].copy_from_slice(&self.extra_data_flags.to_be_bytes());
        out.extend_from_slice(&mobi);

        if let Some(name) = self.full_name {
            out.extend_from_slice(name.as_bytes());
        }
        out
    }
}

fn huff_record() -> Vec<u8> {
    let mut rec = Vec::new();
    rec.extend_from_slice(b"HUFF");
    rec.extend_from_slice(&24u32.to_be_bytes());
    rec.extend_from_slice(&24u32.to_be_bytes());
    rec.extend_from_slice(&(24u32 + 1024).to_be_bytes());
    rec.extend_from_slice(&0u32.to_be_bytes());
    rec.extend_from_slice(&0u32.to_be_bytes());
    // All cache slots: terminal, 3-bit code, code = 7 - (bits >> 29).
    let entry: u32 = (7 << 8) | 0x80 | 3;
    for _ in 0..256 {
        rec.extend_from_slice(&entry.to_be_bytes());
    }
    for _ in 0..64 {
        rec.extend_from_slice(&0u32.to_be_bytes());
    }
    rec
}

fn cdic_record() -> Vec<u8> {
    let mut rec = Vec::new();
    rec.extend_from_slice(b"CDIC");
    rec.extend_from_slice(&16u32.to_be_bytes());
    rec.extend_from_slice(&0u32.to_be_bytes());
    rec.extend_from_slice(&5u32.to_be_bytes());
    rec.extend_from_slice(&0u16.to_be_bytes());
    rec.extend_from_slice(&0u16.to_be_bytes());
    rec.extend_from_slice(&6u16.to_be_bytes());
    rec.extend_from_slice(&0x8001u16.to_be_bytes());
    rec.push(b'a');
    rec
}

#[test]
fn test_open_minimal_mobi() {
    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 5,
        record_count: 1,
        full_name: Some("A Tiny Book"),
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"BOOKMOBI", &[record0, b"Hello".to_vec()]);

    let doc = MobiDoc::from_bytes(file).unwrap();
    assert!(doc.is_mobi());
    assert_eq!(doc.compression(), Compression::None);
    assert_eq!(doc.pdb().name, "test book");
    assert_eq!(doc.full_name(), Some("A Tiny Book"));
    assert_eq!(doc.mobi_header().unwrap().doc_type, DocType::MobiBook);
    assert_eq!(doc.load_document().unwrap(), b"Hello");
}

#[test]
fn test_open_from_file() {
    use std::io::Write;
    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 5,
        record_count: 1,
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"BOOKMOBI", &[record0, b"Hello".to_vec()]);
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&file).unwrap();

    let doc = MobiDoc::open(tmp.path()).unwrap();
    assert_eq!(doc.load_document().unwrap(), b"Hello");
}

#[test]
fn test_palmdoc_compressed_document() {
    // 0xC1 encodes " A"; plain ASCII passes through.
    let compressed = {
        let mut rec = b"words".to_vec();
        rec.push(0xC1);
        rec
    };
    let record0 = Record0 {
        compression: 2,
        uncompressed_size: 7,
        record_count: 1,
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"BOOKMOBI", &[record0, compressed]);

    let doc = MobiDoc::from_bytes(file).unwrap();
    assert_eq!(doc.compression(), Compression::PalmDoc);
    assert_eq!(doc.load_document().unwrap(), b"words A");
}

#[test]
fn test_trailer_data_stripped() {
    // One sized trailer plus the multibyte flag (bits 0 and 1).
    // Record: "Hello" + multibyte tail (1 byte) + 2 junk bytes + 4 length
    // bytes declaring a 6-byte trailer.
    let mut record1 = b"Hello\x00".to_vec();
    record1.extend_from_slice(&[0xAA, 0xBB, 0x80, 0x80, 0x80, 0x06]);

    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 5,
        record_count: 1,
        extra_data_flags: 0b11,
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"BOOKMOBI", &[record0, record1]);

    let doc = MobiDoc::from_bytes(file).unwrap();
    assert_eq!(doc.load_document().unwrap(), b"Hello");
}

#[test]
fn test_huffman_document() {
    let record0 = Record0 {
        compression: 17480,
        uncompressed_size: 1,
        record_count: 1,
        huffman_first_rec: 2,
        huffman_rec_count: 2,
        ..Default::default()
    }
    .build();
    // Doc record: the 3-bit code `101`, zero-padded.
    let file = build_pdb(
        b"BOOKMOBI",
        &[record0, vec![0b1010_0000], huff_record(), cdic_record()],
    );

    let doc = MobiDoc::from_bytes(file).unwrap();
    assert_eq!(doc.compression(), Compression::Huffman);
    assert_eq!(doc.load_document().unwrap(), b"a");
}

#[test]
fn test_huffman_without_huff_record_is_rejected() {
    let record0 = Record0 {
        compression: 17480,
        uncompressed_size: 1,
        record_count: 1,
        huffman_first_rec: 0,
        huffman_rec_count: 0,
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"BOOKMOBI", &[record0, vec![0b1010_0000]]);
    assert!(matches!(
        MobiDoc::from_bytes(file),
        Err(Error::InvalidMobi(_))
    ));
}

#[test]
fn test_image_enumeration() {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend_from_slice(&[0u8; 16]);
    let flis = b"FLIS0123".to_vec();
    let eof = vec![0xE9, 0x8E, 0x0D, 0x0A];
    let never_scanned = b"JUNKJUNK".to_vec();

    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 3,
        record_count: 1,
        image_first_rec: 2,
        ..Default::default()
    }
    .build();
    let file = build_pdb(
        b"BOOKMOBI",
        &[record0, b"abc".to_vec(), png.clone(), flis, eof, never_scanned],
    );

    let doc = MobiDoc::from_bytes(file).unwrap();
    assert_eq!(doc.image_count(), 2);
    assert_eq!(doc.valid_image_count(), 1);
    let image = doc.image(0).unwrap();
    assert_eq!(image.media_type, "image/png");
    assert_eq!(image.data, png);
    assert!(doc.image(1).is_none());
}

#[test]
fn test_encrypted_mobi_is_distinguishable() {
    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 5,
        record_count: 1,
        encryption: 2,
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"BOOKMOBI", &[record0, b"Hello".to_vec()]);
    assert!(matches!(
        MobiDoc::from_bytes(file),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn test_unknown_container_rejected() {
    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 0,
        record_count: 0,
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"XXXXYYYY", &[record0]);
    assert!(matches!(
        MobiDoc::from_bytes(file),
        Err(Error::InvalidMobi(_))
    ));
}

#[test]
fn test_decreasing_offsets_rejected() {
    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 5,
        record_count: 1,
        ..Default::default()
    }
    .build();
    let mut file = build_pdb(b"BOOKMOBI", &[record0, b"Hello".to_vec()]);
    // Corrupt record 1's offset to point before record 0.
    file[PDB_HEADER_LEN + 8..PDB_HEADER_LEN + 12].copy_from_slice(&1u32.to_be_bytes());
    assert!(matches!(
        MobiDoc::from_bytes(file),
        Err(Error::InvalidMobi(_))
    ));
}

#[test]
fn test_bare_palmdoc_file() {
    // TEXtREAd record 0 carries only the 16-byte PalmDoc header.
    let mut record0 = Vec::new();
    record0.extend_from_slice(&2u16.to_be_bytes());
    record0.extend_from_slice(&0u16.to_be_bytes());
    record0.extend_from_slice(&4u32.to_be_bytes());
    record0.extend_from_slice(&1u16.to_be_bytes());
    record0.extend_from_slice(&4096u16.to_be_bytes());
    record0.extend_from_slice(&0u32.to_be_bytes()); // current position
    let file = build_pdb(b"TEXtREAd", &[record0, b"text".to_vec()]);

    let doc = MobiDoc::from_bytes(file).unwrap();
    assert!(!doc.is_mobi());
    assert_eq!(doc.compression(), Compression::PalmDoc);
    assert_eq!(doc.load_document().unwrap(), b"text");
}

#[test]
fn test_size_mismatch_still_returns_text() {
    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 100,
        record_count: 1,
        ..Default::default()
    }
    .build();
    let file = build_pdb(b"BOOKMOBI", &[record0, b"short".to_vec()]);
    let doc = MobiDoc::from_bytes(file).unwrap();
    // The mismatch is a warning; the decoded bytes still come back.
    assert_eq!(doc.load_document().unwrap(), b"short");
}

#[test]
fn test_record_sizes_from_sentinel() {
    let record0 = Record0 {
        compression: 1,
        uncompressed_size: 5,
        record_count: 1,
        ..Default::default()
    }
    .build();
    let record0_len = record0.len();
    let file = build_pdb(b"BOOKMOBI", &[record0, b"Hello".to_vec()]);

    let doc = MobiDoc::from_bytes(file).unwrap();
    assert_eq!(doc.record_count(), 2);
    assert_eq!(doc.record_size(0), record0_len);
    assert_eq!(doc.record_size(1), 5);
    assert_eq!(doc.read_record(1).unwrap(), b"Hello");
    assert!(doc.read_record(2).is_err());
}
