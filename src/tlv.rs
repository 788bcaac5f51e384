//! BER-TLV encoding (ISO 7816-4:2020 sec.7.4.3)
//!
//! The encoder writes into its buffer from the end toward the beginning.
//! Nested data objects are emitted children-first, so by the time a
//! header is written the length of its value is already known, with no
//! patching pass. A dry run (no buffer) counts the bytes a structure
//! needs; handlers run the dry pass, size a buffer, then run the real
//! pass into it.

use crate::error::{Result, UiccError};

const TAG_LEN_MAX: usize = 4;

/// A BER-TLV tag, stored as its wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    buf: [u8; TAG_LEN_MAX],
    len: u8,
}

impl Tag {
    /// Build a tag from its numeric value, e.g. `0x62` or `0x5F2D`.
    pub fn new(tag: u32) -> Self {
        let be = tag.to_be_bytes();
        let skip = be.iter().take_while(|&&b| b == 0).count().min(TAG_LEN_MAX - 1);
        let len = TAG_LEN_MAX - skip;
        let mut buf = [0u8; TAG_LEN_MAX];
        buf[..len].copy_from_slice(&be[skip..]);
        Tag {
            buf,
            len: len as u8,
        }
    }

    /// Wire bytes of the tag.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..usize::from(self.len)]
    }
}

/// Encode a BER length field (short or long form) into `out`.
fn encode_len(len: usize, out: &mut [u8; 5]) -> usize {
    if len < 0x80 {
        out[0] = len as u8;
        1
    } else if len <= 0xFF {
        out[0] = 0x81;
        out[1] = len as u8;
        2
    } else if len <= 0xFFFF {
        out[0] = 0x82;
        out[1..3].copy_from_slice(&(len as u16).to_be_bytes());
        3
    } else if len <= 0xFF_FFFF {
        out[0] = 0x83;
        out[1..4].copy_from_slice(&(len as u32).to_be_bytes()[1..]);
        4
    } else {
        out[0] = 0x84;
        out[1..5].copy_from_slice(&(len as u32).to_be_bytes());
        5
    }
}

/// Backward BER-TLV encoder.
///
/// `data` prepends value bytes, `hdr` closes the pending value with a
/// length field and tag, and a `nstd_start`/`nstd_end` pair turns
/// everything emitted in between into the pending value of the enclosing
/// scope. Without a buffer the encoder only counts.
#[derive(Debug)]
pub struct Encoder<'a> {
    buf: Option<&'a mut [u8]>,
    written: usize,
    val_len: usize,
    scopes: Vec<usize>,
}

impl<'a> Encoder<'a> {
    /// Counting encoder for the dry pass.
    pub fn dry() -> Encoder<'static> {
        Encoder {
            buf: None,
            written: 0,
            val_len: 0,
            scopes: Vec::new(),
        }
    }

    /// Encoder writing into `buf`, which must hold exactly the byte count
    /// the dry pass reported.
    pub fn real(buf: &'a mut [u8]) -> Self {
        Encoder {
            buf: Some(buf),
            written: 0,
            val_len: 0,
            scopes: Vec::new(),
        }
    }

    /// Total bytes emitted so far.
    pub fn len(&self) -> usize {
        self.written
    }

    /// True if nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    fn prepend(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(buf) = &mut self.buf {
            let end = buf
                .len()
                .checked_sub(self.written)
                .ok_or(UiccError::BufferTooShort)?;
            let start = end.checked_sub(bytes.len()).ok_or(UiccError::BufferTooShort)?;
            buf[start..end].copy_from_slice(bytes);
        }
        self.written += bytes.len();
        Ok(())
    }

    /// Prepend raw value bytes.
    pub fn data(&mut self, bytes: &[u8]) -> Result<()> {
        self.prepend(bytes)?;
        self.val_len += bytes.len();
        Ok(())
    }

    /// Close the pending value: prepend its length field and `tag`.
    pub fn hdr(&mut self, tag: &Tag) -> Result<()> {
        let mut len_field = [0u8; 5];
        let n = encode_len(self.val_len, &mut len_field);
        self.prepend(&len_field[..n])?;
        self.prepend(tag.bytes())?;
        self.val_len = 0;
        Ok(())
    }

    /// Open a nested scope.
    pub fn nstd_start(&mut self) {
        self.scopes.push(self.written);
        self.val_len = 0;
    }

    /// Close the innermost scope; its whole extent becomes the pending
    /// value of the enclosing scope.
    pub fn nstd_end(&mut self) -> Result<()> {
        let start = self
            .scopes
            .pop()
            .ok_or(UiccError::BadParameters("no open TLV scope"))?;
        self.val_len = self.written - start;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_sample(enc: &mut Encoder<'_>) -> Result<()> {
        // 6F [ 62 [ 83 02 6F 07, 88 01 07 ] ]
        enc.nstd_start();
        enc.nstd_start();
        enc.data(&[0x07])?;
        enc.hdr(&Tag::new(0x88))?;
        enc.data(&[0x6F, 0x07])?;
        enc.hdr(&Tag::new(0x83))?;
        enc.nstd_end()?;
        enc.hdr(&Tag::new(0x62))?;
        enc.nstd_end()?;
        enc.hdr(&Tag::new(0x6F))
    }

    #[test]
    fn test_nested_encode_two_pass() {
        let mut dry = Encoder::dry();
        encode_sample(&mut dry).unwrap();
        let mut buf = vec![0u8; dry.len()];
        let mut real = Encoder::real(&mut buf);
        encode_sample(&mut real).unwrap();
        assert_eq!(real.len(), buf.len());
        // Later-emitted siblings land earlier in the buffer.
        assert_eq!(
            buf,
            vec![0x6F, 0x09, 0x62, 0x07, 0x83, 0x02, 0x6F, 0x07, 0x88, 0x01, 0x07]
        );
    }

    #[test]
    fn test_empty_template() {
        let mut dry = Encoder::dry();
        dry.nstd_start();
        dry.nstd_end().unwrap();
        dry.hdr(&Tag::new(0x64)).unwrap();
        assert_eq!(dry.len(), 2);

        let mut buf = vec![0u8; 2];
        let mut real = Encoder::real(&mut buf);
        real.nstd_start();
        real.nstd_end().unwrap();
        real.hdr(&Tag::new(0x64)).unwrap();
        assert_eq!(buf, vec![0x64, 0x00]);
    }

    #[test]
    fn test_long_form_length() {
        let value = vec![0xAB; 200];
        let mut dry = Encoder::dry();
        dry.data(&value).unwrap();
        dry.hdr(&Tag::new(0x53)).unwrap();
        assert_eq!(dry.len(), 200 + 3);

        let mut buf = vec![0u8; dry.len()];
        let mut real = Encoder::real(&mut buf);
        real.data(&value).unwrap();
        real.hdr(&Tag::new(0x53)).unwrap();
        assert_eq!(&buf[..3], &[0x53, 0x81, 200]);
        assert_eq!(&buf[3..], value.as_slice());
    }

    #[test]
    fn test_buffer_too_short() {
        let mut buf = vec![0u8; 2];
        let mut enc = Encoder::real(&mut buf);
        assert!(matches!(
            enc.data(&[1, 2, 3]),
            Err(UiccError::BufferTooShort)
        ));
    }

    #[test]
    fn test_multi_byte_tag() {
        assert_eq!(Tag::new(0x5F2D).bytes(), &[0x5F, 0x2D]);
        assert_eq!(Tag::new(0x62).bytes(), &[0x62]);
        assert_eq!(Tag::new(0).bytes(), &[0]);
    }

    #[test]
    fn test_unbalanced_scope_rejected() {
        let mut enc = Encoder::dry();
        assert!(matches!(
            enc.nstd_end(),
            Err(UiccError::BadParameters(_))
        ));
    }
}
