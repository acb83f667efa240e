//! Delimiter scanner for LaTeX-style documents.
//!
//! Commands are located by name and their argument is read with balanced-brace
//! matching, so `\txt{a {b} c}` yields `a {b} c`. Escaped delimiters (`\{`, `\}`)
//! and `%` comments are skipped while counting. An argument that never closes is
//! reported as a [`ScanError`] and skipped; scanning resumes right after the command
//! name so anything nested inside it is still found.
//!
//! Table environments are scanned in two levels: the `\begin{..}`/`\end{..}` span
//! first, then its body is split on `\\` (rows) and `&` (cells). Separators inside
//! braces, math or nested environments do not split.

use std::ops::Range;

use tracing::debug;

use crate::command::CommandKind;
use crate::error::ScanError;

/// Table-like environments and the number of mandatory arguments before their body.
const TABLE_ENVIRONMENTS: [(&str, usize); 4] = [
    ("tabular", 1),
    ("tabular*", 2),
    ("tabularx", 2),
    ("longtable", 1),
];

/// One occurrence of a recognised command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpan {
    pub command: CommandKind,
    /// From the backslash up to and including the closing brace.
    pub span: Range<usize>,
    /// The argument, without its braces.
    pub content: Range<usize>,
}

/// One cell of a table environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub row: usize,
    pub column: usize,
    /// Cell text between separators, untrimmed.
    pub range: Range<usize>,
}

/// Finds commands and table cells in one document, skipping `%` comments.
///
/// Problems such as an unterminated argument are collected rather than returned;
/// read them with [`Scanner::into_errors`].
pub struct Scanner<'a> {
    input: &'a str,
    comments: Vec<Range<usize>>,
    errors: Vec<ScanError>,
}

impl<'a> Scanner<'a> {
    /// Scanner over `input`. Comment ranges are located once, up front.
    pub fn new(input: &'a str) -> Self {
        Scanner {
            input,
            comments: comment_ranges(input),
            errors: Vec::new(),
        }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Errors recovered so far.
    pub fn errors(&self) -> &[ScanError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ScanError> {
        self.errors
    }

    /// Whether `pos` falls inside a `%` comment.
    pub fn is_comment(&self, pos: usize) -> bool {
        in_ranges(&self.comments, pos)
    }

    /// Find every occurrence of `command`, in document order.
    pub fn find_commands(&mut self, command: CommandKind) -> Vec<CommandSpan> {
        let needle = format!("\\{}", command.name());
        let bytes = self.input.as_bytes();
        let mut spans = Vec::new();
        let mut from = 0;

        while let Some(found) = self.input[from..].find(&needle) {
            let start = from + found;
            let name_end = start + needle.len();
            from = name_end;

            if self.is_comment(start) || is_escaped(bytes, start) {
                continue;
            }
            // `\item` must not match `\itemize`
            if bytes.get(name_end).is_some_and(|b| b.is_ascii_alphabetic()) {
                continue;
            }
            if let Some(span) = self.read_argument(command, start, name_end) {
                spans.push(span);
            }
        }

        debug!(command = %command, count = spans.len(), "scanned command");
        spans
    }

    fn read_argument(
        &mut self,
        command: CommandKind,
        start: usize,
        name_end: usize,
    ) -> Option<CommandSpan> {
        let bytes = self.input.as_bytes();
        let mut pos = name_end;
        if command.allows_star() && bytes.get(pos) == Some(&b'*') {
            pos += 1;
        }
        // A bare argument keeps the whitespace after the name (or label) so the
        // fragment can restore it.
        let mut bare_start = pos;
        pos = skip_whitespace(bytes, pos);

        if bytes.get(pos) == Some(&b'[') {
            match find_closing_bracket(bytes, pos) {
                Some(close) => {
                    bare_start = close + 1;
                    pos = skip_whitespace(bytes, close + 1);
                }
                None => {
                    self.errors.push(ScanError::UnterminatedCommand {
                        command,
                        offset: start,
                    });
                    return None;
                }
            }
        }

        match bytes.get(pos) {
            Some(b'{') => match find_closing_brace(bytes, pos) {
                Some(close) => Some(CommandSpan {
                    command,
                    span: start..close + 1,
                    content: pos + 1..close,
                }),
                None => {
                    self.errors.push(ScanError::UnterminatedCommand {
                        command,
                        offset: start,
                    });
                    None
                }
            },
            _ if command.allows_bare_argument() => {
                let end = self.bare_argument_end(bare_start);
                Some(CommandSpan {
                    command,
                    span: start..end,
                    content: bare_start..end,
                })
            }
            _ => None,
        }
    }

    /// End of an unbraced argument: the end of line, a comment, the next `\item`,
    /// `\begin` or `\end`, or a brace closing an enclosing group.
    fn bare_argument_end(&self, from: usize) -> usize {
        let bytes = self.input.as_bytes();
        let mut depth = 0usize;
        let mut pos = from;
        while pos < bytes.len() {
            match bytes[pos] {
                b'\n' if depth == 0 => break,
                b'%' => break,
                b'{' => depth += 1,
                b'}' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                b'\\' => {
                    if depth == 0
                        && ["item", "begin", "end"]
                            .iter()
                            .any(|word| control_word_is(bytes, pos, word))
                    {
                        break;
                    }
                    pos += 2;
                    continue;
                }
                _ => {}
            }
            pos += 1;
        }
        pos.min(bytes.len())
    }

    /// Find every cell of every table environment. Cells are grouped by environment,
    /// outer environments before the tables nested in them.
    pub fn find_table_cells(&mut self) -> Vec<TableCell> {
        let bytes = self.input.as_bytes();
        let mut cells = Vec::new();
        let mut from = 0;

        while let Some(found) = self.input[from..].find("\\begin{") {
            let start = from + found;
            let name_start = start + "\\begin{".len();
            from = name_start;
            if self.is_comment(start) || is_escaped(bytes, start) {
                continue;
            }
            let Some(name_len) = self.input[name_start..].find('}') else {
                continue;
            };
            let name = &self.input[name_start..name_start + name_len];
            let Some(&(_, arg_count)) = TABLE_ENVIRONMENTS.iter().find(|(env, _)| *env == name)
            else {
                continue;
            };

            let mut body_start = name_start + name_len + 1;
            body_start = skip_whitespace(bytes, body_start);
            if bytes.get(body_start) == Some(&b'[') {
                match find_closing_bracket(bytes, body_start) {
                    Some(close) => body_start = skip_whitespace(bytes, close + 1),
                    None => continue,
                }
            }
            let mut arguments_ok = true;
            for _ in 0..arg_count {
                match (bytes.get(body_start), find_closing_brace(bytes, body_start)) {
                    (Some(b'{'), Some(close)) => body_start = close + 1,
                    _ => {
                        arguments_ok = false;
                        break;
                    }
                }
                body_start = skip_whitespace(bytes, body_start);
            }
            if !arguments_ok {
                continue;
            }

            match self.find_environment_end(name, body_start) {
                // `from` stays at the body so nested tables are scanned on their own
                Some((end_start, _)) => cells.extend(self.split_cells(body_start..end_start)),
                None => self.errors.push(ScanError::UnterminatedEnvironment {
                    environment: name.to_string(),
                    offset: start,
                }),
            }
        }

        debug!(count = cells.len(), "scanned table cells");
        cells
    }

    /// Locate the `\end{name}` matching a `\begin{name}` whose body starts at `from`.
    /// Returns the range of the end tag.
    pub fn find_environment_end(&self, name: &str, from: usize) -> Option<(usize, usize)> {
        let bytes = self.input.as_bytes();
        let begin_tag = format!("\\begin{{{}}}", name);
        let end_tag = format!("\\end{{{}}}", name);
        let mut depth = 0usize;
        let mut pos = from;

        while pos < bytes.len() {
            let rest = &self.input[pos..];
            let next_begin = rest.find(&begin_tag);
            let next_end = rest.find(&end_tag)?;
            match next_begin {
                Some(begin) if begin < next_end => {
                    let at = pos + begin;
                    if !self.is_comment(at) && !is_escaped(bytes, at) {
                        depth += 1;
                    }
                    pos = at + begin_tag.len();
                }
                _ => {
                    let at = pos + next_end;
                    pos = at + end_tag.len();
                    if self.is_comment(at) || is_escaped(bytes, at) {
                        continue;
                    }
                    if depth == 0 {
                        return Some((at, pos));
                    }
                    depth -= 1;
                }
            }
        }
        None
    }

    fn split_cells(&self, body: Range<usize>) -> Vec<TableCell> {
        let bytes = self.input.as_bytes();
        let mut cells = Vec::new();
        let (mut row, mut column) = (0, 0);
        let mut cell_start = body.start;
        let mut depth = 0usize;
        let mut in_math = false;
        let mut pos = body.start;

        while pos < body.end {
            match bytes[pos] {
                b'%' => {
                    pos = line_end(bytes, pos).min(body.end);
                    continue;
                }
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'$' => {
                    in_math = !in_math;
                    if bytes.get(pos + 1) == Some(&b'$') {
                        pos += 1;
                    }
                }
                b'&' if depth == 0 && !in_math => {
                    cells.push(TableCell {
                        row,
                        column,
                        range: cell_start..pos,
                    });
                    column += 1;
                    cell_start = pos + 1;
                }
                b'\\' => {
                    match bytes.get(pos + 1) {
                        Some(b'\\') if depth == 0 && !in_math => {
                            cells.push(TableCell {
                                row,
                                column,
                                range: cell_start..pos,
                            });
                            row += 1;
                            column = 0;
                            pos += 2;
                            // `\\[4pt]` spacing belongs to the separator
                            let after = skip_whitespace(bytes, pos);
                            if bytes.get(after) == Some(&b'[') {
                                if let Some(close) = find_closing_bracket(bytes, after) {
                                    pos = close + 1;
                                }
                            }
                            cell_start = pos;
                            continue;
                        }
                        Some(b'(') | Some(b'[') => in_math = true,
                        Some(b')') | Some(b']') => in_math = false,
                        _ if control_word_is(bytes, pos, "begin") => {
                            if let Some(end) = self.skip_nested_environment(pos) {
                                pos = end.min(body.end);
                                continue;
                            }
                        }
                        _ => {}
                    }
                    pos += 2;
                    continue;
                }
                _ => {}
            }
            pos += 1;
        }

        cells.push(TableCell {
            row,
            column,
            range: cell_start..body.end,
        });
        cells
    }

    /// End offset of the environment opened by the `\begin` at `at`.
    fn skip_nested_environment(&self, at: usize) -> Option<usize> {
        let name_start = at + "\\begin{".len();
        let name_len = self.input.get(name_start..)?.find('}')?;
        let name = &self.input[name_start..name_start + name_len];
        self.find_environment_end(name, name_start + name_len + 1)
            .map(|(_, end)| end)
    }
}

/// Whether the byte at `pos` is preceded by an odd number of backslashes.
pub fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let backslashes = bytes[..pos]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    backslashes % 2 == 1
}

/// Whether a control word `\word` (not followed by another letter) starts at `pos`.
pub fn control_word_is(bytes: &[u8], pos: usize, word: &str) -> bool {
    let end = pos + 1 + word.len();
    bytes.get(pos) == Some(&b'\\')
        && bytes.get(pos + 1..end) == Some(word.as_bytes())
        && !bytes.get(end).is_some_and(|b| b.is_ascii_alphabetic())
}

/// Index of the `}` closing the `{` at `open`, skipping escapes, nested groups and comments.
pub fn find_closing_brace(bytes: &[u8], open: usize) -> Option<usize> {
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut pos = open;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => {
                pos += 2;
                continue;
            }
            b'%' => {
                pos = line_end(bytes, pos);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Index of the `]` closing the `[` at `open`. Brackets inside braces do not count.
pub fn find_closing_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let mut braces = 0usize;
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => {
                pos += 2;
                continue;
            }
            b'{' => braces += 1,
            b'}' => braces = braces.saturating_sub(1),
            b']' if braces == 0 => return Some(pos),
            _ => {}
        }
        pos += 1;
    }
    None
}

/// First unescaped occurrence of `needle` at or after `from`.
pub fn find_unescaped(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    let mut pos = from;
    while pos + needle.len() <= bytes.len() {
        if bytes[pos] == b'\\' {
            pos += 2;
            continue;
        }
        if &bytes[pos..pos + needle.len()] == needle {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// Ranges of `%` comments, each running to (not including) the end of its line.
pub fn comment_ranges(input: &str) -> Vec<Range<usize>> {
    let bytes = input.as_bytes();
    let mut ranges = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'%' => {
                let end = line_end(bytes, pos);
                ranges.push(pos..end);
                pos = end;
            }
            _ => pos += 1,
        }
    }
    ranges
}

/// Whether `pos` lies inside one of the sorted, disjoint `ranges`.
pub fn in_ranges(ranges: &[Range<usize>], pos: usize) -> bool {
    let idx = ranges.partition_point(|range| range.end <= pos);
    ranges.get(idx).is_some_and(|range| range.contains(&pos))
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

/// Offset of the newline ending the line that contains `from`, or the input length.
pub fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| from + offset)
}
