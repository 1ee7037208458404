//! Streaming filter contract and dispatcher.
//!
//! A filter is a synchronous state machine: each `process` call consumes zero
//! or more bytes from its input buffer, produces zero or more bytes into its
//! output buffer, and reports how it got stuck (or that it finished).
//! Suspension only ever happens at `process` boundaries.

mod basic;
pub mod crypt;
#[cfg(feature = "dct")]
mod dct;
mod fax;
mod fax_tables;
mod flate;
#[cfg(feature = "jpx")]
mod jpx;
mod lzw;
mod predict;

pub use basic::{Ascii85Decode, AsciiHexDecode, CopyFilter, NullFilter, RunLengthDecode};
pub use crypt::{AesCbcDecode, Arc4Filter};
#[cfg(feature = "dct")]
pub use dct::{DctDecode, DctParams};
pub use fax::{FaxDecode, FaxParams};
pub use flate::{FlateDecode, FlateEncode, FlateParams};
#[cfg(feature = "jpx")]
pub use jpx::JpxDecode;
pub use lzw::LzwDecode;
pub use predict::{Predict, PredictorParams};

use crate::buffer::Buffer;
use crate::error::Result;

/// Cooperative outcome of a `process` call. Format errors travel separately
/// through `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    /// Input exhausted (or a partial atomic unit pushed back); feed more.
    NeedInput,
    /// Output full while a unit is pending; drain it.
    NeedOutput,
    /// Stream complete. Further calls are a no-op.
    Done,
}

pub trait Filter {
    /// Codec tag used in error messages.
    fn name(&self) -> &'static str;

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus>;
}

/// Wraps a filter with the dispatcher contract: progress counters, a sticky
/// `done` flag, and eof propagation to the output buffer on completion or
/// failure.
pub struct Stage {
    filter: Box<dyn Filter>,
    done: bool,
    consumed: bool,
    produced: bool,
    total_out: u64,
}

impl Stage {
    pub fn new(filter: impl Filter + 'static) -> Self {
        Stage {
            filter: Box::new(filter),
            done: false,
            consumed: false,
            produced: false,
            total_out: 0,
        }
    }

    pub fn from_boxed(filter: Box<dyn Filter>) -> Self {
        Stage {
            filter,
            done: false,
            consumed: false,
            produced: false,
            total_out: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.filter.name()
    }

    /// `done` is sticky once `process` has returned `Done` or failed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Did the last call consume any input?
    pub fn consumed(&self) -> bool {
        self.consumed
    }

    /// Did the last call produce any output?
    pub fn produced(&self) -> bool {
        self.produced
    }

    /// Total bytes produced over the stage's lifetime.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    pub fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        if self.done {
            return Ok(FilterStatus::Done);
        }
        debug_assert!(!output.at_eof());

        let old_read = input.read_pos();
        let old_write = output.write_pos();

        let outcome = self.filter.process(input, output);

        // Filters may push unconsumed opcode or register bytes back, so the
        // read cursor is only monotone net of push-back.
        debug_assert!(output.write_pos() >= old_write);

        self.consumed = input.read_pos() > old_read;
        self.produced = output.write_pos() > old_write;
        self.total_out += (output.write_pos() - old_write) as u64;

        match outcome {
            Ok(FilterStatus::NeedInput) | Ok(FilterStatus::NeedOutput) => outcome,
            Ok(FilterStatus::Done) => {
                output.set_eof();
                self.done = true;
                outcome
            }
            Err(e) => {
                output.set_eof();
                self.done = true;
                Err(e)
            }
        }
    }
}
