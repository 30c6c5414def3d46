/// Extra bytes reserved whenever a [`GrowBuf`] has to reallocate.
pub const GROW_SLACK: usize = 512;

/// An append-only byte buffer which can be consumed from the front.
///
/// Used to accumulate partial, zero-terminated frames coming off a stream
/// transport, and to collect ad-hoc binary payloads (e.g: a search pattern).
///
/// Unlike a `Vec<u8>`, the capacity policy is explicit: when an append does
/// not fit, the storage is reallocated to exactly
/// `len + appended + GROW_SLACK` bytes. Capacity never shrinks.
#[derive(Debug)]
pub struct GrowBuf {
    data: Box<[u8]>,
    len: usize,
}

impl GrowBuf {
    /// Create an empty buffer with `capacity` bytes of storage.
    pub fn new(capacity: usize) -> GrowBuf {
        GrowBuf {
            data: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Number of valid bytes in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the allocated storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Append `bytes` to the end of the buffer, reallocating if required.
    pub fn push_slice(&mut self, bytes: &[u8]) {
        debug_assert!(self.len <= self.data.len());

        let end = self.len + bytes.len();
        if end > self.data.len() {
            let mut data = vec![0; end + GROW_SLACK].into_boxed_slice();
            data[..self.len].copy_from_slice(&self.data[..self.len]);
            self.data = data;
        }

        self.data[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Discard the first `count` bytes, shifting the remainder down to the
    /// start of the buffer.
    ///
    /// `count` is clamped to the current length.
    pub fn remove_front(&mut self, count: usize) {
        let count = count.min(self.len);
        self.data.copy_within(count..self.len, 0);
        self.len -= count;
    }

    /// Discard all data. Capacity is retained.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Index of the first occurrence of `byte`, if any.
    pub fn position(&self, byte: u8) -> Option<usize> {
        self.as_slice().iter().position(|&b| b == byte)
    }
}
