/// Destination of emitted host code.
///
/// The size pass and the emission pass drive the emitter through the
/// same calls; only the sink differs, which is what keeps the measured
/// size and the written size in agreement.
pub trait CodeSink {
    /// Bytes emitted so far.
    fn offset(&self) -> usize;

    /// Host address of offset 0, or 0 while only measuring.
    fn base_addr(&self) -> u64;

    /// Append one little-endian 32-bit word.
    fn emit_u32(&mut self, val: u32);

    /// Whether bytes are really being written.
    fn is_writing(&self) -> bool {
        self.base_addr() != 0
    }
}

/// Sink for the size pass: counts, writes nothing.
#[derive(Debug, Default)]
pub struct SizeCounter {
    offset: usize,
}

impl SizeCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeSink for SizeCounter {
    #[inline]
    fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    fn base_addr(&self) -> u64 {
        0
    }

    #[inline]
    fn emit_u32(&mut self, _val: u32) {
        self.offset += 4;
    }
}

/// Sink for the emission pass, writing into a byte buffer that lives at
/// `base` in the host address space.
///
/// Writes past the end of the buffer are dropped and remembered; the
/// offset keeps advancing so the caller can see how far off the size
/// prediction was.
pub struct CodeWriter<'a> {
    buf: &'a mut [u8],
    base: u64,
    offset: usize,
    overflowed: bool,
}

impl<'a> CodeWriter<'a> {
    pub fn new(buf: &'a mut [u8], base: u64) -> Self {
        Self {
            buf,
            base,
            offset: 0,
            overflowed: false,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Written bytes (up to the current offset, clamped to capacity).
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.offset.min(self.buf.len())]
    }

    /// Read back a written word.
    pub fn read_u32(&self, offset: usize) -> u32 {
        let b = &self.buf[offset..offset + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}

impl CodeSink for CodeWriter<'_> {
    #[inline]
    fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    fn base_addr(&self) -> u64 {
        self.base
    }

    #[inline]
    fn emit_u32(&mut self, val: u32) {
        match self.buf.get_mut(self.offset..self.offset + 4) {
            Some(dst) => dst.copy_from_slice(&val.to_le_bytes()),
            None => self.overflowed = true,
        }
        self.offset += 4;
    }
}
