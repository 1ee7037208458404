//! # folio
//!
//! Streaming decode filters for PDF content streams and a MOBI/PalmDoc
//! container reader.
//!
//! ## Filters
//!
//! Filters are synchronous state machines that move bytes between two
//! [`Buffer`] windows and report `NeedInput` / `NeedOutput` / `Done`:
//!
//! ```
//! use folio::{Buffer, FilterStatus, Stage, filter::AsciiHexDecode};
//!
//! let mut stage = Stage::new(AsciiHexDecode::new());
//! let mut input = Buffer::from_bytes(b"48656C6C6F>".to_vec());
//! let mut output = Buffer::with_capacity(64);
//! assert_eq!(stage.process(&mut input, &mut output)?, FilterStatus::Done);
//! assert_eq!(output.readable(), b"Hello");
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! Filters compose with [`Pipeline`], and [`Stream`] layers tell/seek
//! semantics over a file, a memory slice, or a filter chain.
//!
//! ## MOBI
//!
//! [`mobi::MobiDoc`] opens a Palm database, validates the PalmDoc/MOBI
//! headers, enumerates embedded images, and decompresses the document text
//! (plain, PalmDOC, or Huff/Cdic):
//!
//! ```no_run
//! let doc = folio::mobi::MobiDoc::open("book.mobi")?;
//! let text = doc.load_document()?;
//! # Ok::<(), folio::Error>(())
//! ```

pub mod buffer;
pub mod crypt;
pub mod error;
pub mod filter;
pub mod hash;
pub mod io;
pub mod mobi;
pub mod object;
pub mod pipeline;
pub mod stream;

pub use buffer::Buffer;
pub use error::{Error, Result};
pub use filter::{Filter, FilterStatus, Stage};
pub use hash::HashTable;
pub use object::{Dict, Object, parse_object};
pub use pipeline::Pipeline;
pub use stream::Stream;
