//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use crate::command::Align;
use crate::encoding::convert_to_gbk;

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers.
/// Text is converted to GBK when the buffer is built.
pub struct EscPosBuilder {
    buf: Vec<u8>,
}

impl EscPosBuilder {
    /// Create a new builder, starting with printer initialization (ESC @)
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self { buf }
    }

    // === Text Output ===

    /// Write raw text (GBK encoded on build)
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Print and feed n lines (ESC d n)
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    /// Set justification (ESC a n)
    pub fn align(&mut self, align: Align) -> &mut Self {
        let n = match align {
            Align::Left => 0x00,
            Align::Center => 0x01,
            Align::Right => 0x02,
        };
        self.buf.extend_from_slice(&[0x1B, 0x61, n]);
        self
    }

    // === Text Style ===

    /// Toggle emphasized text (ESC E n)
    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, u8::from(on)]);
        self
    }

    /// Character height multiplier 1-8, normal width (GS ! n)
    pub fn char_height(&mut self, height: u8) -> &mut Self {
        let n = height.clamp(1, 8) - 1;
        self.buf.extend_from_slice(&[0x1D, 0x21, n]);
        self
    }

    // === Paper Control ===

    /// Cut paper (GS V 0, full cut)
    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]);
        self
    }

    // === Build ===

    /// Build the final byte buffer with GBK encoding
    pub fn build(self) -> Vec<u8> {
        convert_to_gbk(&self.buf)
    }

    /// Build without GBK conversion (for debugging or ASCII-only content)
    pub fn build_raw(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new()
    }
}
