//! Indent guide computation.

use vellum_text::TextBuffer;

/// Visual width of a line's leading whitespace; `None` for blank lines
/// (empty or whitespace-only).
fn indent_width(content: &str, tab_size: usize) -> Option<usize> {
    let mut width = 0usize;
    for c in content.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width = width - (width % tab_size) + tab_size,
            _ => return Some(width),
        }
    }
    None
}

/// Guide count per line in `[start_line, end_line]`.
///
/// Content lines carry `ceil(indent / tab_size)` guides. Blank lines are
/// sandwiched between the nearest content lines above and below and take the
/// smaller side; off-side languages treat the region below as significant
/// and use `ceil` instead of `1 + floor` in the below-smaller case.
pub fn lines_indent_guides(
    buffer: &TextBuffer,
    tab_size: usize,
    off_side: bool,
    start_line: usize,
    end_line: usize,
) -> Vec<usize> {
    let tab_size = tab_size.max(1);
    let line_count = buffer.line_count();
    let mut result = Vec::with_capacity(end_line.saturating_sub(start_line) + 1);

    for line in start_line..=end_line.min(line_count) {
        let content = buffer.line_content(line).unwrap_or_default();
        match indent_width(content, tab_size) {
            Some(indent) => result.push(indent.div_ceil(tab_size)),
            None => {
                let above = nearest_content_above(buffer, tab_size, line);
                let below = nearest_content_below(buffer, tab_size, line);
                result.push(whitespace_line_guides(above, below, tab_size, off_side));
            }
        }
    }
    result
}

fn whitespace_line_guides(
    above: Option<usize>,
    below: Option<usize>,
    tab_size: usize,
    off_side: bool,
) -> usize {
    let (Some(above), Some(below)) = (above, below) else {
        return 0;
    };
    if above < below {
        1 + above / tab_size
    } else if above == below {
        below.div_ceil(tab_size)
    } else if off_side {
        below.div_ceil(tab_size)
    } else {
        1 + below / tab_size
    }
}

fn nearest_content_above(buffer: &TextBuffer, tab_size: usize, line: usize) -> Option<usize> {
    (1..line)
        .rev()
        .find_map(|l| indent_width(buffer.line_content(l).ok()?, tab_size))
}

fn nearest_content_below(buffer: &TextBuffer, tab_size: usize, line: usize) -> Option<usize> {
    (line + 1..=buffer.line_count())
        .find_map(|l| indent_width(buffer.line_content(l).ok()?, tab_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_text::Eol;

    fn buffer(text: &str) -> TextBuffer {
        TextBuffer::new(text, Eol::Lf)
    }

    #[test]
    fn content_lines_round_up() {
        let b = buffer("top\n    four\n      six\n\t\ttabs");
        assert_eq!(lines_indent_guides(&b, 4, false, 1, 4), vec![0, 1, 2, 2]);
    }

    #[test]
    fn blank_lines_take_the_smaller_side() {
        let b = buffer("fn f() {\n    a\n\n    b\n}");
        // Blank line 3 sits between indent 4 and indent 4.
        assert_eq!(lines_indent_guides(&b, 4, false, 3, 3), vec![1]);
    }

    #[test]
    fn blank_line_between_different_indents() {
        let b = buffer("        deep\n\nshallow");
        // above = 8, below = 0: below is smaller, 1 + floor(0/4) = 1.
        assert_eq!(lines_indent_guides(&b, 4, false, 2, 2), vec![1]);
        // Off-side rule: ceil(0/4) = 0.
        assert_eq!(lines_indent_guides(&b, 4, true, 2, 2), vec![0]);
    }

    #[test]
    fn blank_edges_have_no_guides() {
        let b = buffer("\n    x\n");
        assert_eq!(lines_indent_guides(&b, 4, false, 1, 3), vec![0, 1, 0]);
    }

    #[test]
    fn tabs_expand_to_tab_stops() {
        let b = buffer(" \tx");
        // One space then tab lands at width 4.
        assert_eq!(lines_indent_guides(&b, 4, false, 1, 1), vec![1]);
    }
}
