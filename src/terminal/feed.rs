//! Incremental bridge from a session buffer to a parser

use crate::buffer::CircularByteBuffer;

use super::parser::AnsiTerminalParser;

/// Outcome of one [`TerminalFeed::pump`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Bytes handed to the parser
    pub fed: usize,
    /// Bytes lost because the reader fell behind the buffer
    pub skipped: u64,
}

/// A parser plus its read position in one buffer
///
/// A consumer that falls behind resumes from the oldest retained byte. The
/// resulting screen may then be inconsistent until the child redraws.
#[derive(Debug)]
pub struct TerminalFeed {
    parser: AnsiTerminalParser,
    position: u64,
}

impl TerminalFeed {
    /// Wrap a parser, starting at buffer position zero
    #[must_use]
    pub const fn new(parser: AnsiTerminalParser) -> Self {
        Self {
            parser,
            position: 0,
        }
    }

    /// Feed everything written since the last pump
    pub fn pump(&mut self, buffer: &CircularByteBuffer) -> PumpReport {
        let delta = buffer.read_since(self.position);
        self.position = delta.position;
        if delta.skipped > 0 {
            log::debug!("terminal feed skipped {} bytes", delta.skipped);
        }
        self.parser.feed(&delta.bytes);
        PumpReport {
            fed: delta.bytes.len(),
            skipped: delta.skipped,
        }
    }

    /// Current read position
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Parsed screen
    #[must_use]
    pub const fn parser(&self) -> &AnsiTerminalParser {
        &self.parser
    }

    /// Parsed screen, mutably (for resize)
    pub fn parser_mut(&mut self) -> &mut AnsiTerminalParser {
        &mut self.parser
    }
}
