//! ANSI parser and buffer feed behaviour

use kodegen_claude_director::terminal::{AnsiTerminalParser, CellFlags, Color, TerminalFeed};
use kodegen_claude_director::CircularByteBuffer;

fn parser(cols: usize, rows: usize) -> AnsiTerminalParser {
    AnsiTerminalParser::new(cols, rows, 100)
}

#[test]
fn styled_cells_serialize_with_their_flags() {
    let mut term = parser(10, 2);
    term.feed(b"\x1b[1;3;31mX");
    let cell = *term.cell(0, 0).unwrap();

    let json = serde_json::to_string(&cell).unwrap();
    let back: kodegen_claude_director::Cell = serde_json::from_str(&json).unwrap();

    assert_eq!(back, cell);
    assert!(back.flags.contains(CellFlags::BOLD | CellFlags::ITALIC));
    assert_eq!(back.fg, Color::Indexed(1));
}

#[test]
fn sgr_colours_apply_until_reset() {
    let mut term = parser(80, 24);
    term.feed(b"\x1b[31mHELLO\x1b[0m world");

    for col in 0..5 {
        let cell = term.cell(0, col).unwrap();
        assert_eq!(cell.fg, Color::RED);
    }
    assert_eq!(term.cell(0, 0).unwrap().ch, 'H');
    assert_eq!(term.cell(0, 6).unwrap().fg, Color::Default);
    assert_eq!(term.row_text(0).unwrap(), "HELLO world");
    assert_eq!(term.cursor().col, 11);
}

#[test]
fn extended_colours_and_attributes() {
    let mut term = parser(20, 2);
    term.feed(b"\x1b[1;4;38;5;208;48;2;10;20;30mX\x1b[22;24mY");

    let x = term.cell(0, 0).unwrap();
    assert!(x.flags.contains(CellFlags::BOLD | CellFlags::UNDERLINE));
    assert_eq!(x.fg, Color::Indexed(208));
    assert_eq!(x.bg, Color::Rgb(10, 20, 30));

    let y = term.cell(0, 1).unwrap();
    assert!(y.flags.is_empty());
    assert_eq!(y.fg, Color::Indexed(208));

    term.feed(b"\x1b[92mZ");
    assert_eq!(term.cell(0, 2).unwrap().fg, Color::Indexed(10));
}

#[test]
fn clear_screen_and_home() {
    let mut term = parser(10, 3);
    term.feed(b"abc\r\ndef\r\nghi");
    term.feed(b"\x1b[2J\x1b[H");

    assert_eq!(term.screen_text(), "\n\n");
    let cursor = term.cursor();
    assert_eq!((cursor.row, cursor.col), (0, 0));
    // 2J does not touch history
    assert_eq!(term.scrollback_len(), 0);
}

#[test]
fn cursor_position_is_one_based_and_clamped() {
    let mut term = parser(10, 5);
    term.feed(b"\x1b[3;4H*");
    assert_eq!(term.cell(2, 3).unwrap().ch, '*');

    term.feed(b"\x1b[99;99H");
    let cursor = term.cursor();
    assert_eq!((cursor.row, cursor.col), (4, 9));

    term.feed(b"\x1b[0;0H");
    let cursor = term.cursor();
    assert_eq!((cursor.row, cursor.col), (0, 0));
}

#[test]
fn long_line_wraps_to_next_row() {
    let mut term = parser(5, 3);
    term.feed(b"abcdefg");
    assert_eq!(term.row_text(0).unwrap(), "abcde");
    assert_eq!(term.row_text(1).unwrap(), "fg");
    assert_eq!(term.cursor().row, 1);
}

#[test]
fn last_column_defers_wrap() {
    let mut term = parser(5, 3);
    term.feed(b"abcde");
    assert_eq!(term.cursor().row, 0);
    assert_eq!(term.cursor().col, 4);
    term.feed(b"\r\n");
    assert_eq!(term.cursor().row, 1);
    assert_eq!(term.row_text(1).unwrap(), "");
}

#[test]
fn scrolling_pushes_rows_into_scrollback() {
    let mut term = parser(10, 3);
    term.feed(b"one\r\ntwo\r\nthree\r\nfour\r\nfive");

    assert_eq!(term.screen_text(), "three\nfour\nfive");
    assert_eq!(term.scrollback_text(), vec!["one", "two"]);
}

#[test]
fn scrollback_is_bounded() {
    let mut term = AnsiTerminalParser::new(10, 2, 3);
    for i in 0..10 {
        term.feed(format!("{i}\r\n").as_bytes());
    }
    assert_eq!(term.scrollback_len(), 3);
    assert_eq!(term.scrollback_text(), vec!["6", "7", "8"]);
}

#[test]
fn scroll_region_confines_scrolling() {
    let mut term = parser(10, 5);
    term.feed(b"top\x1b[5;1Hbottom");
    term.feed(b"\x1b[2;4r");
    assert_eq!(term.scroll_region(), (1, 3));

    term.feed(b"\x1b[2;1Ha\r\nb\r\nc\r\nd");
    assert_eq!(term.row_text(0).unwrap(), "top");
    assert_eq!(term.row_text(1).unwrap(), "b");
    assert_eq!(term.row_text(2).unwrap(), "c");
    assert_eq!(term.row_text(3).unwrap(), "d");
    assert_eq!(term.row_text(4).unwrap(), "bottom");
    // The region's top row goes to history even with a top margin
    assert_eq!(term.scrollback_text(), vec!["a"]);
}

#[test]
fn alternate_screen_is_separate_and_has_no_scrollback() {
    let mut term = parser(10, 2);
    term.feed(b"shell");
    term.feed(b"\x1b[?1049h");
    assert!(term.is_alternate_screen());
    assert_eq!(term.screen_text(), "\n");

    term.feed(b"a\r\nb\r\nc\r\nd");
    assert_eq!(term.scrollback_len(), 0);

    term.feed(b"\x1b[?1049l");
    assert!(!term.is_alternate_screen());
    assert_eq!(term.row_text(0).unwrap(), "shell");
    assert_eq!(term.cursor().col, 5);
}

#[test]
fn cursor_visibility_mode() {
    let mut term = parser(10, 2);
    term.feed(b"\x1b[?25l");
    assert!(!term.cursor().visible);
    term.feed(b"\x1b[?25h");
    assert!(term.cursor().visible);
}

#[test]
fn utf8_split_across_chunks() {
    let mut term = parser(10, 2);
    let text = "é✓🦀".as_bytes();
    for byte in text {
        term.feed(&[*byte]);
    }
    assert_eq!(term.row_text(0).unwrap(), "é✓🦀");
}

#[test]
fn invalid_utf8_becomes_replacement_character() {
    let mut term = parser(10, 2);
    term.feed(b"a\xffb\xc3(");
    assert_eq!(term.row_text(0).unwrap(), "a\u{fffd}b\u{fffd}(");
}

#[test]
fn unknown_sequences_are_consumed_silently() {
    let mut term = parser(20, 2);
    term.feed(b"\x1b[>5;1zA\x1b(BB\x1bPsome dcs\x1b\\C\x1b[?2004hD\x1b[5 qE");
    assert_eq!(term.row_text(0).unwrap(), "ABCDE");
}

#[test]
fn erase_in_line_modes() {
    let mut term = parser(10, 1);
    term.feed(b"0123456789\x1b[5G\x1b[K");
    assert_eq!(term.row_text(0).unwrap(), "0123");

    term.feed(b"\r0123456789\x1b[5G\x1b[1K");
    assert_eq!(term.row_text(0).unwrap(), "     56789");

    term.feed(b"\x1b[2K");
    assert_eq!(term.row_text(0).unwrap(), "");
}

#[test]
fn insert_and_delete_characters() {
    let mut term = parser(10, 1);
    term.feed(b"abcdef\x1b[3G\x1b[2@");
    assert_eq!(term.row_text(0).unwrap(), "ab  cdef");
    term.feed(b"\x1b[3P");
    assert_eq!(term.row_text(0).unwrap(), "abdef");
}

#[test]
fn backspace_tab_and_carriage_return() {
    let mut term = parser(20, 1);
    term.feed(b"ab\x08c\tX\rZ");
    assert_eq!(term.row_text(0).unwrap(), "Zc      X");
}

#[test]
fn osc_sets_title() {
    let mut term = parser(20, 1);
    term.feed(b"\x1b]0;first\x07");
    assert_eq!(term.title(), "first");
    term.feed(b"\x1b]2;second\x1b\\after");
    assert_eq!(term.title(), "second");
    assert_eq!(term.row_text(0).unwrap(), "after");
}

#[test]
fn resize_clamps_cursor_and_keeps_content() {
    let mut term = parser(10, 4);
    term.feed(b"one\r\ntwo\r\nthree\r\nfour");
    term.resize(5, 2);

    assert_eq!((term.cols(), term.rows()), (5, 2));
    let cursor = term.cursor();
    assert!(cursor.row < 2 && cursor.col < 5);
    assert_eq!(term.row_text(1).unwrap(), "four");
    assert_eq!(term.scroll_region(), (0, 1));
}

#[test]
fn full_reset_clears_screen() {
    let mut term = parser(10, 2);
    term.feed(b"\x1b[31mtext\x1bc");
    assert_eq!(term.screen_text(), "\n");
    assert_eq!(term.pen().fg, Color::Default);
}

#[test]
fn feed_pumps_only_new_bytes() {
    let buffer = CircularByteBuffer::new(1024);
    let mut feed = TerminalFeed::new(parser(20, 3));

    buffer.write(b"hello ");
    assert_eq!(feed.pump(&buffer).fed, 6);
    buffer.write(b"world");
    let report = feed.pump(&buffer);
    assert_eq!(report.fed, 5);
    assert_eq!(report.skipped, 0);
    assert_eq!(feed.pump(&buffer).fed, 0);

    assert_eq!(feed.parser().row_text(0).unwrap(), "hello world");
    assert_eq!(feed.position(), 11);
}

#[test]
fn feed_that_falls_behind_reports_the_gap() {
    let buffer = CircularByteBuffer::new(8);
    let mut feed = TerminalFeed::new(parser(20, 3));

    buffer.write(b"0123456789abcdef");
    let report = feed.pump(&buffer);
    assert_eq!(report.skipped, 8);
    assert_eq!(report.fed, 8);
    assert_eq!(feed.parser().row_text(0).unwrap(), "89abcdef");
}
