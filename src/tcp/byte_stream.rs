use std::collections::VecDeque;
use std::io;
use std::io::{Read, Write};

/// Bounded in-order byte buffer with independent writer and reader halves.
///
/// The writer may close the stream to signal that nothing more is coming;
/// the reader sees `is_finished` once the remaining bytes are drained.
/// Both halves observe a sticky error latch.
#[derive(Debug)]
pub struct ByteStream {
    buffer: VecDeque<u8>,
    capacity: usize,
    closed: bool,
    error: bool,
    pushed: u64,
    popped: u64,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        ByteStream {
            buffer: VecDeque::new(),
            capacity,
            closed: false,
            error: false,
            pushed: 0,
            popped: 0,
        }
    }

    /// Push bytes into the stream, truncating to whatever fits.
    /// Ignored once the stream is closed. Returns the number accepted.
    pub fn push(&mut self, data: &[u8]) -> usize {
        if self.closed {
            return 0;
        }
        let to_write = data.len().min(self.available_capacity());
        self.buffer.extend(&data[..to_write]);
        self.pushed += to_write as u64;
        to_write
    }

    /// Consume up to N bytes from the stream
    pub fn read_bytes(&mut self, amount: usize) -> Vec<u8> {
        let out = self.peek(amount);
        self.pop(out.len());
        out
    }

    /// Peek at up to N bytes without consuming them
    pub fn peek(&self, amount: usize) -> Vec<u8> {
        let to_read = amount.min(self.buffer.len());
        self.buffer.iter().take(to_read).cloned().collect()
    }

    /// Discard up to N bytes from the front of the stream
    pub fn pop(&mut self, amount: usize) {
        let to_pop = amount.min(self.buffer.len());
        self.buffer.drain(0..to_pop);
        self.popped += to_pop as u64;
    }

    /// Signal that no more bytes will be pushed
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The stream is finished once it is closed and fully drained
    pub fn is_finished(&self) -> bool {
        self.closed && self.buffer.is_empty()
    }

    /// Latch an unrecoverable error onto the stream
    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    /// The remaining capacity in the underlying buffer
    pub fn available_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    /// The number of bytes buffered and not yet consumed
    pub fn bytes_buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Cumulative count of bytes ever pushed
    pub fn bytes_pushed(&self) -> u64 {
        self.pushed
    }

    /// Cumulative count of bytes ever popped
    pub fn bytes_popped(&self) -> u64 {
        self.popped
    }
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = buf.len().min(self.buffer.len());
        let drained: Vec<u8> = self.buffer.drain(0..to_read).collect();
        buf[..to_read].copy_from_slice(&drained);
        self.popped += to_read as u64;
        Ok(to_read)
    }
}

impl Write for ByteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "stream closed"));
        }
        Ok(self.push(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
