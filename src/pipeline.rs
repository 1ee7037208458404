//! Two-filter composition.
//!
//! A `Pipeline` wires the head filter's output through an owned intermediate
//! buffer into the tail filter's input, alternating between the two whenever
//! one of them blocks. A pipeline is itself a `Filter`, so longer chains are
//! built by nesting.

use crate::buffer::{BUF_SIZE, Buffer};
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterStatus, Stage};

pub struct Pipeline {
    head: Stage,
    tail: Stage,
    mid: Buffer,
    /// Scheduler bit: the tail blocked on input, so prefer draining the head.
    tail_needs_input: bool,
}

impl Pipeline {
    pub fn new(head: impl Filter + 'static, tail: impl Filter + 'static) -> Self {
        Pipeline::with_capacity(head, tail, BUF_SIZE)
    }

    /// A pipeline with a custom intermediate buffer size (the buffer still
    /// grows on demand).
    pub fn with_capacity(
        head: impl Filter + 'static,
        tail: impl Filter + 'static,
        capacity: usize,
    ) -> Self {
        Pipeline {
            head: Stage::new(head),
            tail: Stage::new(tail),
            mid: Buffer::with_capacity(capacity),
            tail_needs_input: true,
        }
    }

    /// Fold a chain of filters into nested pipelines, first applied first.
    pub fn from_chain(mut filters: Vec<Box<dyn Filter>>) -> Option<Box<dyn Filter>> {
        let mut chain: Option<Box<dyn Filter>> = None;
        filters.reverse();
        while let Some(filter) = filters.pop() {
            chain = Some(match chain {
                None => filter,
                Some(head) => Box::new(Pipeline {
                    head: Stage::from_boxed(head),
                    tail: Stage::from_boxed(filter),
                    mid: Buffer::with_capacity(BUF_SIZE),
                    tail_needs_input: true,
                }),
            });
        }
        chain
    }
}

impl Filter for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn process(&mut self, input: &mut Buffer, output: &mut Buffer) -> Result<FilterStatus> {
        let mut run_head =
            !(self.mid.at_eof() || (self.tail_needs_input && self.head.produced()));
        let mut regrown = false;

        loop {
            if run_head {
                'head: loop {
                    match self.head.process(input, &mut self.mid)? {
                        FilterStatus::NeedInput => return Ok(FilterStatus::NeedInput),
                        FilterStatus::NeedOutput => {
                            if self.tail_needs_input && !self.head.produced() {
                                if regrown && !self.head.consumed() {
                                    return Err(Error::filter(
                                        "pipeline",
                                        "head filter makes no progress",
                                    ));
                                }
                                if self.mid.read_pos() > 0 {
                                    self.mid.rewind()?;
                                } else {
                                    self.mid.grow()?;
                                    regrown = true;
                                }
                                continue 'head;
                            }
                            break 'head;
                        }
                        FilterStatus::Done => break 'head,
                    }
                }
            }

            match self.tail.process(&mut self.mid, output)? {
                FilterStatus::NeedInput => {
                    if self.mid.at_eof() {
                        return Err(Error::filter("pipeline", "premature end of stream"));
                    }
                    self.tail_needs_input = true;
                    run_head = true;
                }
                FilterStatus::NeedOutput => {
                    self.tail_needs_input = false;
                    return Ok(FilterStatus::NeedOutput);
                }
                FilterStatus::Done => {
                    // The head may still hold end-of-data markers; drive it
                    // once so it can finish cleanly too.
                    if !self.head.is_done() {
                        match self.head.process(input, &mut self.mid) {
                            Ok(FilterStatus::Done) => {}
                            Ok(_) => log::warn!("pipeline: head filter not done"),
                            Err(e) => log::warn!("pipeline: head filter failed late: {e}"),
                        }
                    }
                    return Ok(FilterStatus::Done);
                }
            }
        }
    }
}
