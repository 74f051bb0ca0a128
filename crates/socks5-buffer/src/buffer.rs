/// Fixed-capacity byte buffer with separate read/write cursors.
///
/// Mirrors the classic `bufferInit`/`bufferRead`/`bufferWrite` contract:
/// callers get raw read/write slices via `read_slice`/`write_slice`,
/// advance the matching cursor with `advance_read`/`advance_write`, and
/// the buffer compacts itself back to offset zero once fully drained.
pub struct Buffer {
    data: Box<[u8]>,
    read: usize,
    write: usize,
}

impl Buffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes available to read.
    pub fn pending_read(&self) -> usize {
        self.write - self.read
    }

    /// Bytes of free space available to write.
    pub fn free_space(&self) -> usize {
        self.data.len() - self.write
    }

    pub fn can_read(&self) -> bool {
        self.pending_read() > 0
    }

    pub fn can_write(&self) -> bool {
        self.free_space() > 0
    }

    /// The slice of bytes not yet consumed.
    pub fn read_slice(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    /// The writable tail of the buffer, starting at the write cursor.
    pub fn write_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.write..]
    }

    pub fn advance_read(&mut self, n: usize) {
        assert!(self.read + n <= self.write, "read cursor overrun");
        self.read += n;
        self.compact_if_drained();
    }

    pub fn advance_write(&mut self, n: usize) {
        assert!(self.write + n <= self.data.len(), "write cursor overrun");
        self.write += n;
    }

    /// Copies as much of `src` as fits; returns the number of bytes written.
    pub fn write(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.free_space());
        self.data[self.write..self.write + n].copy_from_slice(&src[..n]);
        self.advance_write(n);
        n
    }

    /// Copies as much pending data into `dst` as fits; returns bytes read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.pending_read());
        dst[..n].copy_from_slice(&self.data[self.read..self.read + n]);
        self.advance_read(n);
        n
    }

    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    fn compact_if_drained(&mut self) {
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let mut b = Buffer::new(6);
        assert_eq!(b.write(b"HOLA"), 4);
        assert_eq!(b.pending_read(), 4);
        let mut out = [0u8; 4];
        assert_eq!(b.read(&mut out), 4);
        assert_eq!(&out, b"HOLA");
    }

    #[test]
    fn auto_compacts_when_drained() {
        let mut b = Buffer::new(6);
        b.write(b"HOLA");
        let mut out = [0u8; 3];
        b.read(&mut out);
        assert_eq!(b.pending_read(), 1);
        let mut out2 = [0u8; 1];
        b.read(&mut out2);
        assert_eq!(b.pending_read(), 0);
        assert_eq!(b.free_space(), b.capacity());
    }

    #[test]
    fn write_truncates_to_free_space() {
        let mut b = Buffer::new(4);
        assert_eq!(b.write(b"HELLO"), 4);
        assert_eq!(b.free_space(), 0);
    }

    #[test]
    fn partial_drain_does_not_compact() {
        let mut b = Buffer::new(6);
        b.write(b"HOLA");
        let mut out = [0u8; 2];
        b.read(&mut out);
        assert_eq!(b.pending_read(), 2);
        assert_eq!(b.free_space(), 2);
    }
}
