//! MOBI / PalmDoc container support.

pub mod bitreader;
pub mod headers;
pub mod huffcdic;
pub mod palmdoc;
mod reader;

pub use headers::{
    Compression, DocType, Encoding, ExthHeader, ExthRecord, MobiHeader, NULL_INDEX, PalmDocHeader,
    PdbHeader, PdbRecord,
};
pub use huffcdic::HuffDicDecompressor;
pub use reader::{MobiDoc, MobiImage, detect_image_type};
