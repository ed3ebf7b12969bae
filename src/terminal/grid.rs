//! Fixed-size cell grid
//!
//! Every index is clamped here so the parser can never write outside the
//! grid, whatever sequence it receives.

use super::cell::Cell;

/// One grid row
pub type Row = Vec<Cell>;

/// A `rows` x `cols` array of cells
#[derive(Debug, Clone)]
pub struct Grid {
    cols: usize,
    lines: Vec<Row>,
}

impl Grid {
    /// Blank grid of the given size (each dimension at least one)
    #[must_use]
    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.max(1);
        Self {
            cols,
            lines: vec![vec![Cell::default(); cols]; rows.max(1)],
        }
    }

    /// Width in cells
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Height in rows
    #[must_use]
    pub fn rows(&self) -> usize {
        self.lines.len()
    }

    /// Cell at a position, `None` outside the grid
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.lines.get(row).and_then(|line| line.get(col))
    }

    /// Whole row, `None` outside the grid
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.lines.get(row).map(Vec::as_slice)
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if let Some(slot) = self.lines.get_mut(row).and_then(|line| line.get_mut(col)) {
            *slot = cell;
        }
    }

    /// Fill `[from, to)` of a row with `blank`
    pub(crate) fn clear_span(&mut self, row: usize, from: usize, to: usize, blank: Cell) {
        let cols = self.cols;
        if let Some(line) = self.lines.get_mut(row) {
            let to = to.min(cols);
            if from < to {
                line[from..to].fill(blank);
            }
        }
    }

    pub(crate) fn clear_rows(&mut self, from: usize, to: usize, blank: Cell) {
        for row in from..to.min(self.rows()) {
            self.clear_span(row, 0, self.cols, blank);
        }
    }

    /// Scroll `[top, bottom]` up by `n`, returning the rows that left the top
    pub(crate) fn scroll_up(&mut self, top: usize, bottom: usize, n: usize, blank: Cell) -> Vec<Row> {
        let bottom = bottom.min(self.rows() - 1);
        if top > bottom {
            return Vec::new();
        }
        let n = n.min(bottom - top + 1);
        let removed: Vec<Row> = self.lines.drain(top..top + n).collect();
        let fresh = vec![blank; self.cols];
        for _ in 0..n {
            self.lines.insert(bottom + 1 - n, fresh.clone());
        }
        removed
    }

    /// Scroll `[top, bottom]` down by `n`; rows pushed past `bottom` are lost
    pub(crate) fn scroll_down(&mut self, top: usize, bottom: usize, n: usize, blank: Cell) {
        let bottom = bottom.min(self.rows() - 1);
        if top > bottom {
            return;
        }
        let n = n.min(bottom - top + 1);
        self.lines.drain(bottom + 1 - n..=bottom);
        let fresh = vec![blank; self.cols];
        for _ in 0..n {
            self.lines.insert(top, fresh.clone());
        }
    }

    /// Insert `n` blanks at `col`, shifting the rest of the row right
    pub(crate) fn insert_cells(&mut self, row: usize, col: usize, n: usize, blank: Cell) {
        let cols = self.cols;
        if let Some(line) = self.lines.get_mut(row) {
            if col >= cols {
                return;
            }
            let n = n.min(cols - col);
            line.truncate(cols - n);
            for _ in 0..n {
                line.insert(col, blank);
            }
        }
    }

    /// Delete `n` cells at `col`, pulling the rest of the row left
    pub(crate) fn delete_cells(&mut self, row: usize, col: usize, n: usize, blank: Cell) {
        let cols = self.cols;
        if let Some(line) = self.lines.get_mut(row) {
            if col >= cols {
                return;
            }
            let n = n.min(cols - col);
            line.drain(col..col + n);
            line.resize(cols, blank);
        }
    }

    /// Remove `n` rows from the top, returning them
    pub(crate) fn take_top(&mut self, n: usize) -> Vec<Row> {
        let n = n.min(self.rows().saturating_sub(1));
        let removed: Vec<Row> = self.lines.drain(..n).collect();
        let fresh = vec![Cell::default(); self.cols];
        self.lines.extend(std::iter::repeat_n(fresh, n));
        removed
    }

    pub(crate) fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        for line in &mut self.lines {
            line.resize(cols, Cell::default());
        }
        self.lines.resize(rows, vec![Cell::default(); cols]);
        self.cols = cols;
    }

    /// Row text with trailing blanks removed
    #[must_use]
    pub fn row_text(&self, row: usize) -> Option<String> {
        self.row(row).map(row_to_string)
    }
}

/// Render a row of cells as text, trimming trailing blanks
#[must_use]
pub fn row_to_string(cells: &[Cell]) -> String {
    let text: String = cells.iter().map(|cell| cell.ch).collect();
    text.trim_end_matches(' ').to_string()
}
