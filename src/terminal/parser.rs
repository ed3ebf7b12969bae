//! Byte-wise ANSI/VT100 parser maintaining a cell grid
//!
//! The parser walks Ground / Escape / CSI / OSC sub-states one byte at a time,
//! so input may be split at any boundary, including inside a UTF-8 sequence or
//! an escape sequence. Unrecognised sequences are consumed to their final byte
//! and dropped. The only way back to a clean state is [`AnsiTerminalParser::reset`].
//!
//! Not thread-safe: exactly one consumer drives a parser.

use std::collections::VecDeque;

use super::cell::{Cell, CellFlags, Color, Pen};
use super::grid::{Grid, Row, row_to_string};

const MAX_PARAMS: usize = 32;
const MAX_OSC_BYTES: usize = 4096;
const TAB_WIDTH: usize = 8;
const REPLACEMENT: char = '\u{FFFD}';

/// Cursor position and visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Zero-based row
    pub row: usize,
    /// Zero-based column
    pub col: usize,
    /// DECTCEM state
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    OscString,
    /// DCS, SOS, PM and APC bodies, dropped up to the terminator
    StringIgnore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveScreen {
    Primary,
    Alternate,
}

#[derive(Debug, Clone, Copy)]
struct SavedCursor {
    row: usize,
    col: usize,
    pen: Pen,
    wrap_pending: bool,
}

enum Utf8Step {
    Pending,
    Char(char),
    Invalid,
    /// Sequence broken by a non-continuation byte, which must be reprocessed
    InvalidReprocess,
}

#[derive(Default)]
struct Utf8Decoder {
    buf: [u8; 4],
    len: usize,
    need: usize,
}

impl Utf8Decoder {
    fn is_pending(&self) -> bool {
        self.need > 0
    }

    fn reset(&mut self) {
        self.len = 0;
        self.need = 0;
    }

    fn push(&mut self, byte: u8) -> Utf8Step {
        if self.need == 0 {
            self.need = match byte {
                0xC2..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF4 => 4,
                _ => return Utf8Step::Invalid,
            };
            self.buf[0] = byte;
            self.len = 1;
            return Utf8Step::Pending;
        }

        if byte & 0xC0 != 0x80 {
            self.reset();
            return Utf8Step::InvalidReprocess;
        }

        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < self.need {
            return Utf8Step::Pending;
        }

        let step = match std::str::from_utf8(&self.buf[..self.len]) {
            Ok(s) => s.chars().next().map_or(Utf8Step::Invalid, Utf8Step::Char),
            Err(_) => Utf8Step::Invalid,
        };
        self.reset();
        step
    }
}

/// ANSI/VT100 terminal emulator state
pub struct AnsiTerminalParser {
    primary: Grid,
    alternate: Grid,
    active: ActiveScreen,
    scrollback: VecDeque<Row>,
    scrollback_limit: usize,

    cursor: Cursor,
    pen: Pen,
    wrap_pending: bool,
    saved: Option<SavedCursor>,
    alt_saved: Option<SavedCursor>,
    scroll_top: usize,
    scroll_bottom: usize,
    title: String,

    state: State,
    utf8: Utf8Decoder,
    params: Vec<u16>,
    // true where the parameter followed a `:` separator
    subparams: Vec<bool>,
    current_param: Option<u32>,
    current_is_sub: bool,
    private_marker: Option<u8>,
    intermediates: Vec<u8>,
    osc: Vec<u8>,
}

impl AnsiTerminalParser {
    /// Parser for a `cols` x `rows` screen keeping up to `scrollback_limit` history rows
    #[must_use]
    pub fn new(cols: usize, rows: usize, scrollback_limit: usize) -> Self {
        let primary = Grid::new(cols, rows);
        let rows = primary.rows();
        Self {
            alternate: Grid::new(cols, rows),
            primary,
            active: ActiveScreen::Primary,
            scrollback: VecDeque::new(),
            scrollback_limit,
            cursor: Cursor {
                row: 0,
                col: 0,
                visible: true,
            },
            pen: Pen::default(),
            wrap_pending: false,
            saved: None,
            alt_saved: None,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            title: String::new(),
            state: State::Ground,
            utf8: Utf8Decoder::default(),
            params: Vec::new(),
            subparams: Vec::new(),
            current_param: None,
            current_is_sub: false,
            private_marker: None,
            intermediates: Vec::new(),
            osc: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read-only view
    // ------------------------------------------------------------------

    /// Active screen grid
    #[must_use]
    pub fn grid(&self) -> &Grid {
        match self.active {
            ActiveScreen::Primary => &self.primary,
            ActiveScreen::Alternate => &self.alternate,
        }
    }

    /// Screen width
    #[must_use]
    pub fn cols(&self) -> usize {
        self.primary.cols()
    }

    /// Screen height
    #[must_use]
    pub fn rows(&self) -> usize {
        self.primary.rows()
    }

    /// Cell on the active screen
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.grid().cell(row, col)
    }

    /// Cursor state
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Style applied to the next printed character
    #[must_use]
    pub const fn pen(&self) -> Pen {
        self.pen
    }

    /// True while the alternate screen is shown
    #[must_use]
    pub fn is_alternate_screen(&self) -> bool {
        self.active == ActiveScreen::Alternate
    }

    /// Scroll region as inclusive zero-based `(top, bottom)`
    #[must_use]
    pub const fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    /// Last title set with OSC 0 or OSC 2
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Text of one active-screen row without trailing blanks
    #[must_use]
    pub fn row_text(&self, row: usize) -> Option<String> {
        self.grid().row_text(row)
    }

    /// Whole active screen as text, one line per row
    #[must_use]
    pub fn screen_text(&self) -> String {
        (0..self.rows())
            .filter_map(|row| self.row_text(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of rows in scrollback
    #[must_use]
    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    /// Scrollback rows, oldest first
    pub fn scrollback(&self) -> impl Iterator<Item = &[Cell]> {
        self.scrollback.iter().map(Vec::as_slice)
    }

    /// Scrollback as text lines, oldest first
    #[must_use]
    pub fn scrollback_text(&self) -> Vec<String> {
        self.scrollback().map(row_to_string).collect()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Return to the power-on state, keeping size and scrollback limit
    pub fn reset(&mut self) {
        *self = Self::new(self.cols(), self.rows(), self.scrollback_limit);
    }

    /// Change the screen size; the cursor is clamped and the scroll region reset
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let rows = rows.max(1);
        let overflow = (self.cursor.row + 1).saturating_sub(rows);
        if overflow > 0 {
            let removed = self.primary.take_top(overflow);
            self.push_scrollback(removed);
            self.alternate.take_top(overflow);
            self.cursor.row -= overflow;
        }
        self.primary.resize(cols, rows);
        self.alternate.resize(cols, rows);
        self.scroll_top = 0;
        self.scroll_bottom = self.rows() - 1;
        self.cursor.row = self.cursor.row.min(self.rows() - 1);
        self.cursor.col = self.cursor.col.min(self.cols() - 1);
        self.wrap_pending = false;
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Consume a chunk of raw output
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.advance(byte);
        }
    }

    fn advance(&mut self, byte: u8) {
        match self.state {
            State::Ground => self.ground(byte),
            State::Escape => self.escape(byte),
            State::EscapeIntermediate => self.escape_intermediate(byte),
            State::CsiEntry | State::CsiParam => self.csi_param(byte),
            State::CsiIntermediate => self.csi_intermediate(byte),
            State::CsiIgnore => self.csi_ignore(byte),
            State::OscString => self.osc_string(byte),
            State::StringIgnore => self.string_ignore(byte),
        }
    }

    fn ground(&mut self, byte: u8) {
        if self.utf8.is_pending() || byte >= 0x80 {
            match self.utf8.push(byte) {
                Utf8Step::Pending => {}
                Utf8Step::Char(ch) => self.print(ch),
                Utf8Step::Invalid => self.print(REPLACEMENT),
                Utf8Step::InvalidReprocess => {
                    self.print(REPLACEMENT);
                    self.advance(byte);
                }
            }
            return;
        }

        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F | 0x7F => self.execute(byte),
            _ => self.print(byte as char),
        }
    }

    /// C0 controls; valid in every state except string bodies
    fn execute(&mut self, byte: u8) {
        match byte {
            0x08 => {
                self.cursor.col = self.cursor.col.saturating_sub(1);
                self.wrap_pending = false;
            }
            0x09 => {
                let next = (self.cursor.col / TAB_WIDTH + 1) * TAB_WIDTH;
                self.cursor.col = next.min(self.cols() - 1);
                self.wrap_pending = false;
            }
            0x0A..=0x0C => self.linefeed(),
            0x0D => {
                self.cursor.col = 0;
                self.wrap_pending = false;
            }
            0x18 | 0x1A => self.state = State::Ground,
            // BEL, SO/SI, DEL and the rest have no grid effect
            _ => {}
        }
    }

    fn enter_escape(&mut self) {
        self.state = State::Escape;
        self.params.clear();
        self.subparams.clear();
        self.current_param = None;
        self.current_is_sub = false;
        self.private_marker = None;
        self.intermediates.clear();
    }

    fn escape(&mut self, byte: u8) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => self.execute(byte),
            b'[' => self.state = State::CsiEntry,
            b']' => {
                self.osc.clear();
                self.state = State::OscString;
            }
            b'P' | b'X' | b'^' | b'_' => self.state = State::StringIgnore,
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = State::EscapeIntermediate;
            }
            _ => {
                self.esc_dispatch(byte);
                self.state = State::Ground;
            }
        }
    }

    fn escape_intermediate(&mut self, byte: u8) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => self.execute(byte),
            0x20..=0x2F => self.intermediates.push(byte),
            // Charset designations and friends: consumed, no effect
            _ => self.state = State::Ground,
        }
    }

    fn esc_dispatch(&mut self, byte: u8) {
        match byte {
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            b'D' => self.linefeed(),
            b'E' => {
                self.linefeed();
                self.cursor.col = 0;
            }
            b'M' => self.reverse_index(),
            b'c' => self.reset(),
            _ => {}
        }
    }

    fn csi_param(&mut self, byte: u8) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => self.execute(byte),
            b'0'..=b'9' => {
                self.state = State::CsiParam;
                let digit = u32::from(byte - b'0');
                let value = self.current_param.unwrap_or(0) * 10 + digit;
                self.current_param = Some(value.min(u32::from(u16::MAX)));
            }
            b';' | b':' => {
                self.state = State::CsiParam;
                self.push_param();
                self.current_is_sub = byte == b':';
            }
            0x3C..=0x3F => {
                if self.state == State::CsiEntry {
                    self.private_marker = Some(byte);
                    self.state = State::CsiParam;
                } else {
                    self.state = State::CsiIgnore;
                }
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = State::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.finish_params();
                self.csi_dispatch(byte);
                self.state = State::Ground;
            }
            _ => {}
        }
    }

    fn csi_intermediate(&mut self, byte: u8) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => self.execute(byte),
            0x20..=0x2F => self.intermediates.push(byte),
            0x30..=0x3F => self.state = State::CsiIgnore,
            0x40..=0x7E => {
                self.finish_params();
                self.csi_dispatch(byte);
                self.state = State::Ground;
            }
            _ => {}
        }
    }

    fn csi_ignore(&mut self, byte: u8) {
        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1F => self.execute(byte),
            0x40..=0x7E => self.state = State::Ground,
            _ => {}
        }
    }

    fn osc_string(&mut self, byte: u8) {
        match byte {
            0x07 => {
                self.osc_dispatch();
                self.state = State::Ground;
            }
            0x1B => {
                // ESC \ (ST) lands in Escape, where the backslash is a no-op
                self.osc_dispatch();
                self.enter_escape();
            }
            0x18 | 0x1A => self.state = State::Ground,
            0x00..=0x1F => {}
            _ => {
                if self.osc.len() < MAX_OSC_BYTES {
                    self.osc.push(byte);
                }
            }
        }
    }

    fn string_ignore(&mut self, byte: u8) {
        match byte {
            0x1B => self.enter_escape(),
            0x07 | 0x18 | 0x1A => self.state = State::Ground,
            _ => {}
        }
    }

    fn push_param(&mut self) {
        if self.params.len() < MAX_PARAMS {
            self.params.push(self.current_param.take().unwrap_or(0) as u16);
            self.subparams.push(self.current_is_sub);
        }
        self.current_param = None;
        self.current_is_sub = false;
    }

    fn finish_params(&mut self) {
        if self.current_param.is_some() || !self.params.is_empty() {
            self.push_param();
        }
    }

    /// Parameter `index`, with 0 or missing mapped to `default`
    fn param(&self, index: usize, default: u16) -> usize {
        match self.params.get(index) {
            Some(&0) | None => usize::from(default),
            Some(&value) => usize::from(value),
        }
    }

    fn osc_dispatch(&mut self) {
        let text = String::from_utf8_lossy(&self.osc);
        if let Some((kind, value)) = text.split_once(';') {
            if kind == "0" || kind == "2" {
                self.title = value.to_string();
            }
        }
        self.osc.clear();
    }

    // ------------------------------------------------------------------
    // CSI dispatch
    // ------------------------------------------------------------------

    fn csi_dispatch(&mut self, action: u8) {
        match self.private_marker {
            Some(b'?') => {
                match action {
                    b'h' => self.set_private_modes(true),
                    b'l' => self.set_private_modes(false),
                    _ => {}
                }
                return;
            }
            Some(_) => return,
            None => {}
        }
        if !self.intermediates.is_empty() {
            return;
        }

        match action {
            b'A' => self.move_up(self.param(0, 1)),
            b'B' | b'e' => self.move_down(self.param(0, 1)),
            b'C' | b'a' => self.move_to(self.cursor.row, self.cursor.col + self.param(0, 1)),
            b'D' => {
                let col = self.cursor.col.saturating_sub(self.param(0, 1));
                self.move_to(self.cursor.row, col);
            }
            b'E' => {
                self.move_down(self.param(0, 1));
                self.cursor.col = 0;
            }
            b'F' => {
                self.move_up(self.param(0, 1));
                self.cursor.col = 0;
            }
            b'G' | b'`' => self.move_to(self.cursor.row, self.param(0, 1) - 1),
            b'H' | b'f' => self.move_to(self.param(0, 1) - 1, self.param(1, 1) - 1),
            b'd' => self.move_to(self.param(0, 1) - 1, self.cursor.col),
            b'J' => self.erase_in_display(self.param(0, 0)),
            b'K' => self.erase_in_line(self.param(0, 0)),
            b'm' => self.select_graphic_rendition(),
            b'r' => self.set_scroll_region(),
            b'S' => self.scroll_up(self.param(0, 1)),
            b'T' => self.scroll_down(self.param(0, 1)),
            b'L' => self.insert_lines(self.param(0, 1)),
            b'M' => self.delete_lines(self.param(0, 1)),
            b'@' => {
                let blank = Cell::blank(&self.pen);
                let (row, col) = (self.cursor.row, self.cursor.col);
                let n = self.param(0, 1);
                self.grid_mut().insert_cells(row, col, n, blank);
            }
            b'P' => {
                let blank = Cell::blank(&self.pen);
                let (row, col) = (self.cursor.row, self.cursor.col);
                let n = self.param(0, 1);
                self.grid_mut().delete_cells(row, col, n, blank);
            }
            b'X' => {
                let blank = Cell::blank(&self.pen);
                let (row, col) = (self.cursor.row, self.cursor.col);
                let n = self.param(0, 1);
                self.grid_mut().clear_span(row, col, col + n, blank);
            }
            b's' => self.save_cursor(),
            b'u' => self.restore_cursor(),
            _ => {}
        }
    }

    fn set_private_modes(&mut self, enable: bool) {
        let modes: Vec<u16> = self.params.clone();
        for mode in modes {
            match mode {
                25 => self.cursor.visible = enable,
                1049 => {
                    if enable {
                        self.alt_saved = Some(self.saved_cursor());
                        self.enter_alternate_screen();
                    } else {
                        self.leave_alternate_screen();
                        if let Some(saved) = self.alt_saved.take() {
                            self.apply_saved(saved);
                        }
                    }
                }
                47 | 1047 => {
                    if enable {
                        self.enter_alternate_screen();
                    } else {
                        self.leave_alternate_screen();
                    }
                }
                _ => {}
            }
        }
    }

    fn enter_alternate_screen(&mut self) {
        if self.active == ActiveScreen::Alternate {
            return;
        }
        self.active = ActiveScreen::Alternate;
        let rows = self.rows();
        self.alternate.clear_rows(0, rows, Cell::default());
        self.wrap_pending = false;
    }

    fn leave_alternate_screen(&mut self) {
        self.active = ActiveScreen::Primary;
        self.wrap_pending = false;
    }

    fn select_graphic_rendition(&mut self) {
        if self.params.is_empty() {
            self.pen = Pen::default();
            return;
        }

        let mut groups = self.sgr_groups().into_iter();
        while let Some((code, subs)) = groups.next() {
            if !subs.is_empty() {
                self.colon_sgr(code, &subs);
                continue;
            }
            match code {
                0 => self.pen = Pen::default(),
                1 => self.pen.flags.insert(CellFlags::BOLD),
                2 => self.pen.flags.insert(CellFlags::DIM),
                3 => self.pen.flags.insert(CellFlags::ITALIC),
                4 | 21 => self.pen.flags.insert(CellFlags::UNDERLINE),
                7 => self.pen.flags.insert(CellFlags::INVERSE),
                9 => self.pen.flags.insert(CellFlags::STRIKETHROUGH),
                22 => self.pen.flags.remove(CellFlags::BOLD | CellFlags::DIM),
                23 => self.pen.flags.remove(CellFlags::ITALIC),
                24 => self.pen.flags.remove(CellFlags::UNDERLINE),
                27 => self.pen.flags.remove(CellFlags::INVERSE),
                29 => self.pen.flags.remove(CellFlags::STRIKETHROUGH),
                30..=37 => self.pen.fg = Color::Indexed((code - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(&mut groups.by_ref().map(|g| g.0)) {
                        self.pen.fg = color;
                    }
                }
                39 => self.pen.fg = Color::Default,
                40..=47 => self.pen.bg = Color::Indexed((code - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(&mut groups.by_ref().map(|g| g.0)) {
                        self.pen.bg = color;
                    }
                }
                49 => self.pen.bg = Color::Default,
                90..=97 => self.pen.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.pen.bg = Color::Indexed((code - 100 + 8) as u8),
                _ => {}
            }
        }
    }

    /// Parameters grouped with their `:` sub-parameters
    fn sgr_groups(&self) -> Vec<(u16, Vec<u16>)> {
        let mut groups: Vec<(u16, Vec<u16>)> = Vec::new();
        for (&value, &is_sub) in self.params.iter().zip(&self.subparams) {
            match groups.last_mut() {
                Some((_, subs)) if is_sub => subs.push(value),
                _ => groups.push((value, Vec::new())),
            }
        }
        groups
    }

    /// SGR in colon form, e.g. `38:2::r:g:b` or `4:3`
    fn colon_sgr(&mut self, code: u16, subs: &[u16]) {
        match code {
            38 => {
                if let Some(color) = colon_color(subs) {
                    self.pen.fg = color;
                }
            }
            48 => {
                if let Some(color) = colon_color(subs) {
                    self.pen.bg = color;
                }
            }
            4 if subs[0] == 0 => self.pen.flags.remove(CellFlags::UNDERLINE),
            4 => self.pen.flags.insert(CellFlags::UNDERLINE),
            // Unknown colon groups are skipped whole
            _ => {}
        }
    }

    fn set_scroll_region(&mut self) {
        let rows = self.rows();
        let top = self.param(0, 1) - 1;
        let bottom = match self.params.get(1) {
            Some(&v) if v > 0 => usize::from(v).min(rows),
            _ => rows,
        } - 1;
        if top >= bottom {
            return;
        }
        self.scroll_top = top;
        self.scroll_bottom = bottom;
        self.move_to(0, 0);
    }

    // ------------------------------------------------------------------
    // Grid operations
    // ------------------------------------------------------------------

    fn grid_mut(&mut self) -> &mut Grid {
        match self.active {
            ActiveScreen::Primary => &mut self.primary,
            ActiveScreen::Alternate => &mut self.alternate,
        }
    }

    fn print(&mut self, ch: char) {
        if self.wrap_pending {
            self.cursor.col = 0;
            self.linefeed();
        }
        let cell = Cell::new(ch, &self.pen);
        let (row, col) = (self.cursor.row, self.cursor.col);
        self.grid_mut().set(row, col, cell);
        if col + 1 >= self.cols() {
            self.wrap_pending = true;
        } else {
            self.cursor.col += 1;
        }
    }

    fn linefeed(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows() {
            self.cursor.row += 1;
        }
    }

    fn reverse_index(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    /// Scroll the region up; rows leaving the top go to scrollback on the primary screen only
    fn scroll_up(&mut self, n: usize) {
        let blank = Cell::blank(&self.pen);
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let removed = self.grid_mut().scroll_up(top, bottom, n, blank);
        if self.active == ActiveScreen::Primary {
            self.push_scrollback(removed);
        }
    }

    fn scroll_down(&mut self, n: usize) {
        let blank = Cell::blank(&self.pen);
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        self.grid_mut().scroll_down(top, bottom, n, blank);
    }

    fn insert_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let blank = Cell::blank(&self.pen);
        let bottom = self.scroll_bottom;
        self.grid_mut().scroll_down(row, bottom, n, blank);
        self.cursor.col = 0;
        self.wrap_pending = false;
    }

    fn delete_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let blank = Cell::blank(&self.pen);
        let bottom = self.scroll_bottom;
        self.grid_mut().scroll_up(row, bottom, n, blank);
        self.cursor.col = 0;
        self.wrap_pending = false;
    }

    fn push_scrollback(&mut self, rows: Vec<Row>) {
        if self.scrollback_limit == 0 {
            return;
        }
        for row in rows {
            if self.scrollback.len() == self.scrollback_limit {
                self.scrollback.pop_front();
            }
            self.scrollback.push_back(row);
        }
    }

    fn erase_in_display(&mut self, mode: usize) {
        let blank = Cell::blank(&self.pen);
        let (row, col) = (self.cursor.row, self.cursor.col);
        let (rows, cols) = (self.rows(), self.cols());
        match mode {
            0 => {
                let grid = self.grid_mut();
                grid.clear_span(row, col, cols, blank);
                grid.clear_rows(row + 1, rows, blank);
            }
            1 => {
                let grid = self.grid_mut();
                grid.clear_rows(0, row, blank);
                grid.clear_span(row, 0, col + 1, blank);
            }
            2 => self.grid_mut().clear_rows(0, rows, blank),
            3 => self.scrollback.clear(),
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: usize) {
        let blank = Cell::blank(&self.pen);
        let (row, col) = (self.cursor.row, self.cursor.col);
        let cols = self.cols();
        let grid = self.grid_mut();
        match mode {
            0 => grid.clear_span(row, col, cols, blank),
            1 => grid.clear_span(row, 0, col + 1, blank),
            2 => grid.clear_span(row, 0, cols, blank),
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    fn move_to(&mut self, row: usize, col: usize) {
        self.cursor.row = row.min(self.rows() - 1);
        self.cursor.col = col.min(self.cols() - 1);
        self.wrap_pending = false;
    }

    fn move_up(&mut self, n: usize) {
        let floor = if self.cursor.row >= self.scroll_top {
            self.scroll_top
        } else {
            0
        };
        let row = self.cursor.row.saturating_sub(n).max(floor);
        self.move_to(row, self.cursor.col);
    }

    fn move_down(&mut self, n: usize) {
        let ceiling = if self.cursor.row <= self.scroll_bottom {
            self.scroll_bottom
        } else {
            self.rows() - 1
        };
        let row = (self.cursor.row + n).min(ceiling);
        self.move_to(row, self.cursor.col);
    }

    fn saved_cursor(&self) -> SavedCursor {
        SavedCursor {
            row: self.cursor.row,
            col: self.cursor.col,
            pen: self.pen,
            wrap_pending: self.wrap_pending,
        }
    }

    fn save_cursor(&mut self) {
        self.saved = Some(self.saved_cursor());
    }

    fn restore_cursor(&mut self) {
        match self.saved {
            Some(saved) => self.apply_saved(saved),
            None => {
                self.move_to(0, 0);
                self.pen = Pen::default();
            }
        }
    }

    fn apply_saved(&mut self, saved: SavedCursor) {
        self.move_to(saved.row, saved.col);
        self.pen = saved.pen;
        self.wrap_pending = saved.wrap_pending;
    }
}

/// Colour from colon sub-parameters: `5:n`, `2:cs:r:g:b` or `2:r:g:b`
fn colon_color(subs: &[u16]) -> Option<Color> {
    let channel = |v: u16| v.min(255) as u8;
    match subs {
        [5, n, ..] => Some(Color::Indexed(channel(*n))),
        [2, _, r, g, b, ..] | [2, r, g, b] => Some(Color::Rgb(channel(*r), channel(*g), channel(*b))),
        _ => None,
    }
}

/// Parse the tail of SGR 38/48: `5;n` or `2;r;g;b`
fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<Color> {
    match iter.next()? {
        5 => iter.next().map(|n| Color::Indexed(n.min(255) as u8)),
        2 => {
            let r = iter.next()?.min(255) as u8;
            let g = iter.next()?.min(255) as u8;
            let b = iter.next()?.min(255) as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

impl std::fmt::Debug for AnsiTerminalParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiTerminalParser")
            .field("cols", &self.cols())
            .field("rows", &self.rows())
            .field("cursor", &self.cursor)
            .field("alternate", &self.is_alternate_screen())
            .field("scrollback", &self.scrollback.len())
            .field("state", &self.state)
            .finish()
    }
}
