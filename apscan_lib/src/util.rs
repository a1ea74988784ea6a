/** ------------------------------------------------------------
 * Byte-level helpers shared by the decoders.
 * ------------------------------------------------------------- */

/**
 * Bounds-checked read cursor over a byte region
 *
 * Every read is checked against the region length. A read that would run
 * past the end returns `None` and leaves the position untouched, so callers
 * can stop at the first short field without ever indexing out of range.
 *
 * # Example
 *
 * ```ignore
 * use crate::util::ByteCursor;
 *
 * let mut cursor = ByteCursor::new(&[0x01, 0x02, 0x03]);
 * assert_eq!(cursor.read_u16_le(), Some(0x0201));
 * assert_eq!(cursor.read_u16_le(), None);
 * assert_eq!(cursor.read_u8(), Some(0x03));
 * ```
 */
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /**
     * Cursor over the first `limit` bytes only. A limit beyond the slice is
     * clamped to the slice, never trusted.
     */
    pub fn with_limit(bytes: &'a [u8], limit: usize) -> Self {
        let end = limit.min(bytes.len());
        Self::new(&bytes[..end])
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let slice = self.read_bytes(N)?;
        slice.try_into().ok()
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let value = self.peek_u8()?;
        self.pos += 1;
        Some(value)
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32_le(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.read_bytes(len).map(|_| ())
    }

    /**
     * Advance to the next multiple of `align`, measured from the start of
     * the region.
     */
    pub fn align_to(&mut self, align: usize) -> Option<()> {
        let padding = (align - self.pos % align) % align;
        self.skip(padding)
    }

    /// Everything not yet read, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let bytes: &[u8] = &[0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xff];
        let mut cursor = ByteCursor::new(bytes);

        assert_eq!(cursor.read_u16_le(), Some(0x1234));
        assert_eq!(cursor.read_u32_le(), Some(0x12345678));
        assert_eq!(cursor.read_u8(), Some(0xff));
        assert!(cursor.is_empty());
    }

    #[test]
    fn short_read_does_not_advance() {
        let bytes: &[u8] = &[1, 2, 3];
        let mut cursor = ByteCursor::new(bytes);
        cursor.skip(1).unwrap();

        assert_eq!(cursor.read_u32_le(), None);
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_bytes(2), Some(&[2u8, 3][..]));
        assert_eq!(cursor.read_u8(), None);
    }

    #[test]
    fn limit_is_clamped_to_slice() {
        let bytes: &[u8] = &[1, 2, 3, 4];

        let cursor = ByteCursor::with_limit(bytes, 2);
        assert_eq!(cursor.rest(), &[1, 2]);

        let cursor = ByteCursor::with_limit(bytes, 400);
        assert_eq!(cursor.remaining(), 4);
    }

    #[test]
    fn alignment_is_relative_to_region_start() {
        let bytes = [0u8; 16];
        let mut cursor = ByteCursor::new(&bytes);
        cursor.skip(3).unwrap();
        cursor.align_to(4).unwrap();
        assert_eq!(cursor.position(), 4);
        cursor.align_to(4).unwrap();
        assert_eq!(cursor.position(), 4);
        cursor.skip(1).unwrap();
        cursor.align_to(8).unwrap();
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn signed_read() {
        let bytes = (-67i32).to_le_bytes();
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(cursor.read_i32_le(), Some(-67));
    }
}
