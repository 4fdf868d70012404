//! Byte ring buffer between the callback and the butler.
//!
//! `head` is where the producer writes next and `tail` where the consumer
//! reads next. `head == tail` always means empty, so the producer leaves at
//! least one byte of slack and the buffer never reports full at zero
//! pending bytes.
//!
//! The buffer itself carries no synchronization; it lives inside the
//! transfer mutex.

pub(crate) struct Fifo {
    buf: Vec<u8>,
    size: usize,
    head: usize,
    tail: usize,
}

impl Fifo {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            size: capacity,
            head: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Empty the ring and use the first `size` bytes of storage.
    pub fn reset(&mut self, size: usize) {
        debug_assert!(size <= self.buf.len());
        self.size = size.min(self.buf.len());
        self.head = 0;
        self.tail = 0;
    }

    /// Drop all pending bytes, keeping the current size.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Bytes written but not yet consumed.
    #[inline]
    pub fn pending(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.size - self.tail + self.head
        }
    }

    /// Room left for the producer, counting the slack byte.
    #[inline]
    pub fn free(&self) -> usize {
        self.size - self.pending()
    }

    /// Contiguous bytes a disk read may fill at `head`, at most `chunk`.
    ///
    /// With `head` ahead of `tail` the read runs to the end of the ring,
    /// unless `tail` sits at zero and wrapping would make the ring look
    /// empty; then a whole chunk must fit before the end. Behind `tail`
    /// a whole chunk plus the slack byte must fit.
    pub fn fill_window(&self, chunk: usize) -> Option<usize> {
        if self.head >= self.tail {
            let to_end = self.size - self.head;
            if self.tail == 0 && to_end <= chunk {
                None
            } else {
                Some(to_end.min(chunk))
            }
        } else if self.tail - self.head - 1 >= chunk {
            Some(chunk)
        } else {
            None
        }
    }

    /// Contiguous bytes a disk write should drain at `tail`, at most `chunk`.
    ///
    /// Drains once the ring wrapped or `chunk` bytes are pending. While
    /// `flushing`, any pending byte qualifies.
    pub fn drain_window(&self, chunk: usize, flushing: bool) -> Option<usize> {
        let pending = self.pending();
        if self.head < self.tail || pending >= chunk || (flushing && pending > 0) {
            let contiguous = if self.head < self.tail {
                self.size - self.tail
            } else {
                pending
            };
            Some(contiguous.min(chunk))
        } else {
            None
        }
    }

    pub fn advance_head(&mut self, n: usize) {
        debug_assert!(n < self.free());
        self.head += n;
        if self.head >= self.size {
            self.head -= self.size;
        }
    }

    pub fn advance_tail(&mut self, n: usize) {
        debug_assert!(n <= self.pending());
        self.tail += n;
        if self.tail >= self.size {
            self.tail -= self.size;
        }
    }

    pub fn slice(&self, at: usize, len: usize) -> &[u8] {
        &self.buf[at..at + len]
    }

    pub fn slice_mut(&mut self, at: usize, len: usize) -> &mut [u8] {
        &mut self.buf[at..at + len]
    }

    /// The next `len` pending bytes at `tail`, split where the ring wraps.
    pub fn pending_segments(&self, len: usize) -> (&[u8], &[u8]) {
        let first = len.min(self.size - self.tail);
        (
            &self.buf[self.tail..self.tail + first],
            &self.buf[..len - first],
        )
    }

    /// Writable `len` bytes at `head`, split where the ring wraps.
    pub fn free_segments(&mut self, len: usize) -> (&mut [u8], &mut [u8]) {
        let first = len.min(self.size - self.head);
        let (front, back) = self.buf.split_at_mut(self.head);
        (&mut back[..first], &mut front[..len - first])
    }
}
