//! Terminal cell and style types

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Style attributes carried by a cell
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CellFlags: u8 {
        /// SGR 1
        const BOLD = 0b0000_0001;
        /// SGR 2
        const DIM = 0b0000_0010;
        /// SGR 3
        const ITALIC = 0b0000_0100;
        /// SGR 4
        const UNDERLINE = 0b0000_1000;
        /// SGR 7
        const INVERSE = 0b0001_0000;
        /// SGR 9
        const STRIKETHROUGH = 0b0010_0000;
    }
}

/// Foreground or background colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    /// Terminal default
    #[default]
    Default,
    /// Palette index: 0-7 normal, 8-15 bright, 16-255 extended
    Indexed(u8),
    /// 24-bit colour
    Rgb(u8, u8, u8),
}

impl Color {
    /// Palette black
    pub const BLACK: Self = Self::Indexed(0);
    /// Palette red
    pub const RED: Self = Self::Indexed(1);
    /// Palette green
    pub const GREEN: Self = Self::Indexed(2);
    /// Palette yellow
    pub const YELLOW: Self = Self::Indexed(3);
    /// Palette blue
    pub const BLUE: Self = Self::Indexed(4);
    /// Palette magenta
    pub const MAGENTA: Self = Self::Indexed(5);
    /// Palette cyan
    pub const CYAN: Self = Self::Indexed(6);
    /// Palette white
    pub const WHITE: Self = Self::Indexed(7);
}

/// Current drawing style applied to printed characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pen {
    /// Foreground colour
    pub fg: Color,
    /// Background colour
    pub bg: Color,
    /// Attribute flags
    pub flags: CellFlags,
}

/// One character position on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Displayed codepoint, space when blank
    pub ch: char,
    /// Foreground colour
    pub fg: Color,
    /// Background colour
    pub bg: Color,
    /// Attribute flags
    pub flags: CellFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            flags: CellFlags::empty(),
        }
    }
}

impl Cell {
    /// A character drawn with the given pen
    #[must_use]
    pub const fn new(ch: char, pen: &Pen) -> Self {
        Self {
            ch,
            fg: pen.fg,
            bg: pen.bg,
            flags: pen.flags,
        }
    }

    /// An erased cell: blank, keeping only the pen's background
    #[must_use]
    pub const fn blank(pen: &Pen) -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: pen.bg,
            flags: CellFlags::empty(),
        }
    }

    /// SGR bold set
    #[must_use]
    pub const fn bold(&self) -> bool {
        self.flags.contains(CellFlags::BOLD)
    }

    /// SGR italic set
    #[must_use]
    pub const fn italic(&self) -> bool {
        self.flags.contains(CellFlags::ITALIC)
    }

    /// SGR underline set
    #[must_use]
    pub const fn underline(&self) -> bool {
        self.flags.contains(CellFlags::UNDERLINE)
    }
}
