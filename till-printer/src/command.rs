//! Printer-neutral formatting commands
//!
//! Receipt renderers produce a `Vec<FormatCommand>`; [`encode`] turns it into
//! ESC/POS bytes right before transmission.

use serde::{Deserialize, Serialize};

use crate::escpos::EscPosBuilder;

/// Lines fed before the cutter so the last line clears the blade
const CUT_FEED_LINES: u8 = 3;

/// Text justification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Style change; `None` fields keep the printer's current setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    pub align: Option<Align>,
    pub bold: Option<bool>,
    /// Character height multiplier (1 = normal)
    pub height: Option<u8>,
}

impl Style {
    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn height(mut self, height: u8) -> Self {
        self.height = Some(height);
        self
    }
}

/// One formatting instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatCommand {
    SetStyle(Style),
    Text(String),
    Cut,
}

impl FormatCommand {
    pub fn style(style: Style) -> Self {
        Self::SetStyle(style)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// Encode a command sequence as ESC/POS bytes
pub fn encode(commands: &[FormatCommand]) -> Vec<u8> {
    let mut b = EscPosBuilder::new();

    for command in commands {
        match command {
            FormatCommand::SetStyle(style) => {
                if let Some(align) = style.align {
                    b.align(align);
                }
                if let Some(bold) = style.bold {
                    b.bold(bold);
                }
                if let Some(height) = style.height {
                    b.char_height(height);
                }
            }
            FormatCommand::Text(text) => {
                b.text(text);
            }
            FormatCommand::Cut => {
                b.feed(CUT_FEED_LINES).cut();
            }
        }
    }

    b.build()
}

/// Text-only view of a command sequence (what ends up on paper, unstyled)
pub fn plain_text(commands: &[FormatCommand]) -> String {
    commands
        .iter()
        .filter_map(|c| match c {
            FormatCommand::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}
