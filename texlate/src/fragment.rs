//! Fragment extraction.
//!
//! Runs the scanner once per command family, in [`FragmentKind::EXTRACTION_ORDER`],
//! and collects the translatable text runs. Translations are later mapped back onto
//! fragments by position in this list, so the order must be reproducible: families
//! in fixed order, and by start offset within a family.
//!
//! When a command's argument contains inline-text commands (`\txt`, `\textbf`,
//! `\textit`), those are cut out of it. The text around them becomes separate runs
//! and each inner command yields its own fragment, so no text is extracted twice.

use std::ops::Range;

use tracing::debug;

use crate::command::FragmentKind;
use crate::error::ScanError;
use crate::scanner::{
    CommandSpan, Scanner, TableCell, control_word_is, find_closing_brace, find_unescaped,
};

/// Structural commands that may open a table cell without making it mixed markup.
const TABLE_RULES: [&str; 4] = ["hline", "toprule", "midrule", "bottomrule"];

/// Characters that mark a table cell as containing markup.
const MARKUP_CHARS: [char; 9] = ['\\', '$', '{', '}', '^', '_', '%', '#', '~'];

/// A single translatable span of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    /// Untrimmed run in the original document. Never shifts.
    pub byte_range: Range<usize>,
    /// The run with surrounding whitespace removed.
    pub raw_content: String,
    pub leading_space: String,
    pub trailing_space: String,
}

impl Fragment {
    /// Build a fragment from an untrimmed run, or `None` if it is only whitespace.
    pub fn from_run(kind: FragmentKind, input: &str, range: Range<usize>) -> Option<Self> {
        let text = &input[range.clone()];
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let leading = text.len() - text.trim_start().len();
        let trailing = leading + trimmed.len();
        Some(Fragment {
            kind,
            byte_range: range,
            raw_content: trimmed.to_string(),
            leading_space: text[..leading].to_string(),
            trailing_space: text[trailing..].to_string(),
        })
    }

    /// Byte range of `raw_content` in the original document.
    pub fn content_range(&self) -> Range<usize> {
        let start = self.byte_range.start + self.leading_space.len();
        start..start + self.raw_content.len()
    }

    /// The text that replaces `byte_range` when `translated` is substituted.
    pub fn render(&self, translated: &str) -> String {
        let mut out = String::with_capacity(
            self.leading_space.len() + translated.len() + self.trailing_space.len(),
        );
        out.push_str(&self.leading_space);
        out.push_str(translated);
        out.push_str(&self.trailing_space);
        out
    }

    fn overlaps(&self, other: &Range<usize>) -> bool {
        self.byte_range.start < other.end && other.start < self.byte_range.end
    }
}

/// Result of extracting fragments from one document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fragments: Vec<Fragment>,
    /// Occurrences that were skipped while scanning.
    pub errors: Vec<ScanError>,
}

impl Extraction {
    /// Nothing to translate; only number formatting can change the document.
    pub fn is_noop(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.fragments.iter().map(|f| f.raw_content.clone()).collect()
    }
}

/// Extract every translatable fragment of `input`.
pub fn extract_fragments(input: &str) -> Extraction {
    let mut scanner = Scanner::new(input);

    let mut inline_spans: Vec<CommandSpan> = FragmentKind::InlineText
        .commands()
        .iter()
        .flat_map(|command| scanner.find_commands(*command))
        .collect();
    inline_spans.sort_by_key(|span| span.span.start);

    let mut fragments: Vec<Fragment> = Vec::new();
    // accepted ranges, sorted by start and pairwise disjoint
    let mut taken: Vec<Range<usize>> = Vec::new();
    for kind in FragmentKind::EXTRACTION_ORDER {
        let mut family = match kind {
            FragmentKind::InlineText => command_fragments(kind, input, &inline_spans, &inline_spans),
            FragmentKind::TableCell => scanner
                .find_table_cells()
                .iter()
                .flat_map(|cell| cell_fragments(input, cell, &inline_spans))
                .collect(),
            _ => {
                let spans: Vec<CommandSpan> = kind
                    .commands()
                    .iter()
                    .flat_map(|command| scanner.find_commands(*command))
                    .collect();
                command_fragments(kind, input, &spans, &inline_spans)
            }
        };
        family.sort_by_key(|fragment| fragment.byte_range.start);

        let before = fragments.len();
        for fragment in family {
            let slot = taken.partition_point(|kept| kept.start < fragment.byte_range.start);
            let clash = (slot > 0 && fragment.overlaps(&taken[slot - 1]))
                || taken.get(slot).is_some_and(|next| fragment.overlaps(next));
            if clash {
                debug!(range = ?fragment.byte_range, kind = %kind, "dropping overlapping fragment");
                continue;
            }
            taken.insert(slot, fragment.byte_range.clone());
            fragments.push(fragment);
        }
        debug!(kind = %kind, count = fragments.len() - before, "extracted fragments");
    }

    Extraction {
        fragments,
        errors: scanner.into_errors(),
    }
}

fn command_fragments(
    kind: FragmentKind,
    input: &str,
    spans: &[CommandSpan],
    inline_spans: &[CommandSpan],
) -> Vec<Fragment> {
    spans
        .iter()
        .flat_map(|span| text_runs(span.content.clone(), inline_spans))
        .filter_map(|run| Fragment::from_run(kind, input, run))
        .filter(|fragment| has_translatable_text(&fragment.raw_content))
        .collect()
}

fn cell_fragments(input: &str, cell: &TableCell, inline_spans: &[CommandSpan]) -> Vec<Fragment> {
    let start = skip_table_rules(input, cell.range.clone());
    let runs = text_runs(start..cell.range.end, inline_spans);

    let mixed = runs
        .iter()
        .any(|run| input[run.clone()].contains(MARKUP_CHARS.as_slice()));
    if mixed {
        debug!(row = cell.row, column = cell.column, "skipping mixed-markup cell");
        return Vec::new();
    }

    runs.into_iter()
        .filter_map(|run| Fragment::from_run(FragmentKind::TableCell, input, run))
        .filter(|fragment| has_translatable_text(&fragment.raw_content))
        .collect()
}

/// Split `content` into the runs left after removing the inline-text commands it contains.
/// `inline_spans` must be sorted by start.
fn text_runs(content: Range<usize>, inline_spans: &[CommandSpan]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut cursor = content.start;
    let first = inline_spans.partition_point(|inner| inner.span.start < content.start);
    for inner in &inline_spans[first..] {
        let span = &inner.span;
        if span.start >= content.end {
            break;
        }
        if span.start < cursor || span.end > content.end {
            continue;
        }
        runs.push(cursor..span.start);
        cursor = span.end;
    }
    runs.push(cursor..content.end);
    runs
}

/// Offset after any `\hline`-style rules (and `\cline{..}`) that open a cell.
fn skip_table_rules(input: &str, range: Range<usize>) -> usize {
    let bytes = input.as_bytes();
    let mut pos = range.start;
    loop {
        let mut next = pos;
        while next < range.end && bytes[next].is_ascii_whitespace() {
            next += 1;
        }
        if let Some(rule) = TABLE_RULES
            .iter()
            .find(|rule| control_word_is(bytes, next, rule))
        {
            pos = next + 1 + rule.len();
        } else if control_word_is(bytes, next, "cline") {
            match find_closing_brace(bytes, next + "\\cline".len()) {
                Some(close) if close < range.end => pos = close + 1,
                _ => return pos,
            }
        } else {
            return pos;
        }
    }
}

/// Whether `text` has an alphabetic character outside math and command names or
/// their braced arguments.
pub fn has_translatable_text(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'$' => {
                let display = bytes.get(pos + 1) == Some(&b'$');
                let delimiter: &[u8] = if display { b"$$" } else { b"$" };
                pos += delimiter.len();
                match find_unescaped(bytes, pos, delimiter) {
                    Some(close) => pos = close + delimiter.len(),
                    None => return false,
                }
            }
            b'\\' => {
                pos += 1;
                if bytes.get(pos).is_some_and(|b| b.is_ascii_alphabetic()) {
                    while bytes.get(pos).is_some_and(|b| b.is_ascii_alphabetic()) {
                        pos += 1;
                    }
                    while bytes.get(pos) == Some(&b'{') {
                        match find_closing_brace(bytes, pos) {
                            Some(close) => pos = close + 1,
                            None => break,
                        }
                    }
                } else {
                    // control symbol; the symbol may be multi-byte
                    pos += text[pos..].chars().next().map_or(1, char::len_utf8);
                }
            }
            _ => {
                let Some(c) = text[pos..].chars().next() else {
                    break;
                };
                if c.is_alphabetic() {
                    return true;
                }
                pos += c.len_utf8();
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    fn raw(extraction: &Extraction) -> Vec<&str> {
        extraction
            .fragments
            .iter()
            .map(|f| f.raw_content.as_str())
            .collect()
    }

    #[test]
    fn test_sibling_commands_are_separate_fragments() {
        let input = r"\txt{A }\textbf{B}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["A", "B"]);
        assert_eq!(extraction.fragments[0].trailing_space, " ");
        assert_eq!(&input[extraction.fragments[0].byte_range.clone()], "A ");
    }

    #[test]
    fn test_nested_inline_command_is_not_duplicated() {
        let input = r"\txt{Before \textbf{bold} after}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["Before", "bold", "after"]);
        assert!(extraction.fragments.iter().all(|f| f.kind == FragmentKind::InlineText));
    }

    #[test]
    fn test_doubly_nested_inline_commands() {
        let input = r"\txt{a \textbf{b \textit{c} d} e}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_whitespace_is_captured() {
        let input = "\\txt{  hello\t}";
        let fragment = &extract_fragments(input).fragments[0];
        assert_eq!(fragment.raw_content, "hello");
        assert_eq!(fragment.leading_space, "  ");
        assert_eq!(fragment.trailing_space, "\t");
        assert_eq!(&input[fragment.content_range()], "hello");
        assert_eq!(fragment.render("hallo"), "  hallo\t");
    }

    #[test]
    fn test_family_order() {
        let input = "\\section{Results}\n\\begin{itemize}\\item{Point}\\end{itemize}\n\\caption{Figure}\n\\txt{Body}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["Body", "Results", "Figure", "Point"]);
        let kinds: Vec<FragmentKind> = extraction.fragments.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FragmentKind::InlineText,
                FragmentKind::Header,
                FragmentKind::Caption,
                FragmentKind::ListItem
            ]
        );
    }

    #[test]
    fn test_header_around_inline_command() {
        let input = r"\section{Load \txt{case} one}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["case", "Load", "one"]);
        assert_eq!(extraction.fragments[1].kind, FragmentKind::Header);
    }

    #[test]
    fn test_caption_holding_only_inline_command() {
        let extraction = extract_fragments(r"\caption{\txt{Stress}}");
        assert_eq!(raw(&extraction), vec!["Stress"]);
        assert_eq!(extraction.fragments[0].kind, FragmentKind::InlineText);
    }

    #[test]
    fn test_identical_fragments_keep_their_own_slots() {
        let input = r"\txt{Hello} and \txt{Hello}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["Hello", "Hello"]);
        assert_ne!(
            extraction.fragments[0].byte_range,
            extraction.fragments[1].byte_range
        );
    }

    #[test]
    fn test_math_only_content_is_noop() {
        let extraction = extract_fragments(r"\txt{$3.14$}");
        assert!(extraction.is_noop());
    }

    #[test]
    fn test_math_only_table_cell_skipped() {
        let input = r"\begin{tabular}{ll}$x=y$ & Length\\\end{tabular}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["Length"]);
        assert_eq!(extraction.fragments[0].kind, FragmentKind::TableCell);
    }

    #[test]
    fn test_mixed_markup_cell_skipped() {
        let input = r"\begin{tabular}{l}Area $A$ \\ Plain words\end{tabular}";
        assert_eq!(raw(&extract_fragments(input)), vec!["Plain words"]);
    }

    #[test]
    fn test_cell_with_inline_command_and_plain_rest() {
        let input = r"\begin{tabular}{l}\txt{Mass} in kg\end{tabular}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["Mass", "in kg"]);
        assert_eq!(extraction.fragments[1].kind, FragmentKind::TableCell);
    }

    #[test]
    fn test_rule_commands_do_not_make_cells_mixed() {
        let input = "\\begin{tabular}{l}\n\\toprule\nForce \\\\\n\\hline \\cline{1-2} Moment\n\\end{tabular}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec!["Force", "Moment"]);
    }

    #[test]
    fn test_numeric_cell_is_not_translatable() {
        let input = r"\begin{tabular}{ll}12 & 3.5\end{tabular}";
        assert!(extract_fragments(input).is_noop());
    }

    #[test]
    fn test_scan_errors_are_collected() {
        let extraction = extract_fragments(r"\txt{fine} \section{broken");
        assert_eq!(raw(&extraction), vec!["fine"]);
        assert_eq!(extraction.errors.len(), 1);
    }

    #[test]
    fn test_reproducible_order() {
        let input = r"\txt{One} \section{Two} \txt{Three}";
        assert_eq!(extract_fragments(input).fragments, extract_fragments(input).fragments);
    }

    #[test]
    fn test_has_translatable_text() {
        assert!(has_translatable_text("Hello"));
        assert!(has_translatable_text("Force \\unit{kN} applied"));
        assert!(has_translatable_text("Ünïcode"));
        assert!(!has_translatable_text("$x + y$"));
        assert!(!has_translatable_text("\\unit{kN}"));
        assert!(!has_translatable_text("12.5 = 3"));
        assert!(!has_translatable_text("$$a$$"));
        assert!(has_translatable_text("costs \\$5 each"));
    }

    #[test]
    fn test_control_symbol_before_non_ascii() {
        assert!(!has_translatable_text(r"20 \° 5"));
        assert!(has_translatable_text(r"\°C warm"));
        assert!(!has_translatable_text(r"\é"));

        let extraction = extract_fragments(r"\txt{20 \° C} \section{Temp \€}");
        assert_eq!(raw(&extraction), vec![r"20 \° C", r"Temp \€"]);
    }

    #[test]
    fn test_overlap_checked_against_neighbours_only() {
        let input = r"\caption{A} \section{Intro \caption{Fig}} \caption{Z}";
        let extraction = extract_fragments(input);
        assert_eq!(raw(&extraction), vec![r"Intro \caption{Fig}", "A", "Z"]);
    }

    #[test]
    fn test_text_runs_ignore_spans_outside_content() {
        let span = |start: usize, end: usize| CommandSpan {
            command: CommandKind::Txt,
            span: start..end,
            content: start + 5..end - 1,
        };
        let spans = vec![span(0, 8), span(12, 20), span(22, 30), span(40, 48)];
        assert_eq!(text_runs(10..35, &spans), vec![10..12, 20..22, 30..35]);
        assert_eq!(text_runs(31..39, &spans), vec![31..39]);
    }
}
