use crate::cursor::Cursor;

/// Skips whitespace and `#`-to-end-of-line comments (spec.md §4.1).
pub fn skip_whitespace_and_comments(cursor: &mut Cursor<'_>) {
    loop {
        match cursor.current() {
            b' ' | b'\t' | b'\n' | b'\r' => {
                cursor.advance();
            }
            b'#' => {
                while !cursor.is_at_end() && cursor.current() != b'\n' {
                    cursor.advance();
                }
            }
            _ => break,
        }
    }
}
