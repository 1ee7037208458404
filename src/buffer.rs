//! Windowed byte buffer shared between filter stages.
//!
//! A `Buffer` is a contiguous region with two interior cursors: everything in
//! `read..write` is decoded-but-unconsumed data, everything in
//! `write..capacity` is free space. Producers append at `write`, consumers
//! advance `read`. The `eof` flag is sticky and means "no more bytes will
//! ever be written".

use crate::error::{Error, Result};

/// Default capacity used by pipelines and streams.
pub const BUF_SIZE: usize = 4096;

#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    read: usize,
    write: usize,
    /// Fixed-capacity window over caller-supplied bytes; cannot grow or rewind.
    fixed: bool,
    eof: bool,
}

impl Buffer {
    /// A growable, initially empty buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Buffer {
            data: vec![0; capacity.max(1)],
            read: 0,
            write: 0,
            fixed: false,
            eof: false,
        }
    }

    /// A fixed window over caller-supplied bytes. The whole range is readable
    /// and `eof` is set from construction: once the bytes are consumed there
    /// will never be more.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let data = bytes.into();
        let len = data.len();
        Buffer {
            data,
            read: 0,
            write: len,
            fixed: true,
            eof: true,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes available to a consumer.
    pub fn readable(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    /// Number of unconsumed bytes.
    pub fn remaining(&self) -> usize {
        self.write - self.read
    }

    /// Free space available to a producer.
    pub fn writable(&mut self) -> &mut [u8] {
        let write = self.write;
        &mut self.data[write..]
    }

    /// Number of free bytes at the tail.
    pub fn space(&self) -> usize {
        self.data.len() - self.write
    }

    /// Advance the read cursor after consuming `n` bytes.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.read += n;
    }

    /// Back the read cursor up by `n` bytes (opcode push-back).
    pub fn unread(&mut self, n: usize) {
        debug_assert!(n <= self.read);
        self.read -= n;
    }

    /// Retract the write cursor, discarding the last `n` unread bytes
    /// (padding removal).
    pub fn uncommit(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.write -= n;
    }

    /// Advance the write cursor after producing `n` bytes.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.space());
        self.write += n;
    }

    /// Append a single byte. Caller must have checked `space()`.
    pub fn push(&mut self, byte: u8) {
        debug_assert!(self.space() > 0);
        self.data[self.write] = byte;
        self.write += 1;
    }

    pub fn read_pos(&self) -> usize {
        self.read
    }

    pub fn write_pos(&self) -> usize {
        self.write
    }

    pub fn at_eof(&self) -> bool {
        self.eof
    }

    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    /// Forget all content and clear `eof` (used when a seek invalidates the
    /// window). Not permitted on fixed buffers.
    pub fn reset(&mut self) {
        debug_assert!(!self.fixed);
        self.read = 0;
        self.write = 0;
        self.eof = false;
    }

    /// Move unread bytes down to the front, reclaiming consumed space.
    /// Idempotent when the buffer is already rewound.
    pub fn rewind(&mut self) -> Result<()> {
        if self.fixed {
            return Err(Error::filter("buffer", "rewind of fixed buffer"));
        }
        if self.read > 0 {
            self.data.copy_within(self.read..self.write, 0);
            self.write -= self.read;
            self.read = 0;
        }
        Ok(())
    }

    /// Grow capacity by half, preserving cursor offsets.
    pub fn grow(&mut self) -> Result<()> {
        if self.fixed {
            return Err(Error::filter("buffer", "grow of fixed buffer"));
        }
        let new_cap = (self.data.len() * 3 / 2).max(self.data.len() + 1);
        self.data.resize(new_cap, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_is_eof() {
        let buf = Buffer::from_bytes(b"abc".to_vec());
        assert!(buf.at_eof());
        assert_eq!(buf.readable(), b"abc");
        assert_eq!(buf.space(), 0);
    }

    #[test]
    fn test_fixed_cannot_grow_or_rewind() {
        let mut buf = Buffer::from_bytes(b"abc".to_vec());
        buf.consume(1);
        assert!(buf.grow().is_err());
        assert!(buf.rewind().is_err());
    }

    #[test]
    fn test_rewind_shifts_unread() {
        let mut buf = Buffer::with_capacity(8);
        buf.writable()[..4].copy_from_slice(b"abcd");
        buf.commit(4);
        buf.consume(2);
        buf.rewind().unwrap();
        assert_eq!(buf.readable(), b"cd");
        assert_eq!(buf.read_pos(), 0);
        assert_eq!(buf.space(), 6);
        // idempotent
        buf.rewind().unwrap();
        assert_eq!(buf.readable(), b"cd");
    }

    #[test]
    fn test_grow_preserves_offsets() {
        let mut buf = Buffer::with_capacity(4);
        buf.writable()[..3].copy_from_slice(b"xyz");
        buf.commit(3);
        buf.consume(1);
        buf.grow().unwrap();
        assert_eq!(buf.capacity(), 6);
        assert_eq!(buf.readable(), b"yz");
    }
}
