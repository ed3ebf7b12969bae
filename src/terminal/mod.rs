//! Terminal emulation: cells, grid, ANSI parser and buffer feed

pub mod cell;
pub mod feed;
pub mod grid;
pub mod parser;

pub use cell::{Cell, CellFlags, Color, Pen};
pub use feed::{PumpReport, TerminalFeed};
pub use grid::{Grid, Row, row_to_string};
pub use parser::{AnsiTerminalParser, Cursor};
