//! Locale-specific number formatting.
//!
//! For languages written with a decimal comma, decimal points inside math are
//! converted: `$3.14$` becomes `$3,14$`. Only math zones are touched (`$..$`,
//! `$$..$$`, `\(..\)`, `\[..\]` and the numbered-equation environments). Inside a
//! zone, reference annotations (`\tag`, `\label`, `\ref`, `\eqref`) and text
//! commands keep their punctuation. A `.` is converted only between two digits,
//! so formatting an already formatted document changes nothing.

use std::collections::HashSet;
use std::ops::Range;

use icu_locale::Locale;
use tracing::debug;

use crate::scanner::{Scanner, control_word_is, find_closing_brace, find_unescaped, line_end};

/// Languages that write decimals with a comma.
pub const DEFAULT_DECIMAL_COMMA_LANGUAGES: [&str; 27] = [
    "nl", "de", "fr", "es", "it", "pt", "ru", "pl", "cs", "sk", "sv", "da", "nb", "nn", "fi",
    "tr", "id", "ro", "hu", "uk", "el", "bg", "hr", "sl", "et", "lv", "lt",
];

const MATH_ENVIRONMENTS: [&str; 16] = [
    "equation",
    "equation*",
    "align",
    "align*",
    "gather",
    "gather*",
    "multline",
    "multline*",
    "eqnarray",
    "eqnarray*",
    "flalign",
    "flalign*",
    "alignat",
    "alignat*",
    "displaymath",
    "math",
];

/// Commands inside math whose argument is left untouched.
const PROTECTED_COMMANDS: [&str; 10] = [
    "tag", "label", "ref", "eqref", "text", "txt", "textbf", "textit", "mbox", "textrm",
];

#[derive(Debug, Clone)]
pub struct LocaleFormatter {
    decimal_comma_languages: HashSet<String>,
}

impl Default for LocaleFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMAL_COMMA_LANGUAGES)
    }
}

impl LocaleFormatter {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        LocaleFormatter {
            decimal_comma_languages: languages
                .into_iter()
                .map(|language| language.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Whether `locale` (a BCP 47 tag such as `nl`, `de-AT` or `fr_CA`) writes decimals
    /// with a comma. Tags that do not parse never do.
    pub fn uses_decimal_comma(&self, locale: &str) -> bool {
        language_of(locale).is_some_and(|language| self.decimal_comma_languages.contains(&language))
    }

    /// Format numbers in `document` for `locale`. Other locales get the document back as is.
    pub fn format(&self, document: &str, locale: &str) -> String {
        if !self.uses_decimal_comma(locale) {
            return document.to_string();
        }
        convert_decimal_separators(document)
    }
}

/// The lowercase language subtag of a locale tag.
pub fn language_of(locale: &str) -> Option<String> {
    let parsed: Locale = locale.replace('_', "-").parse().ok()?;
    Some(parsed.id.language.as_str().to_lowercase())
}

/// Replace decimal points with commas inside every math zone of `document`.
pub fn convert_decimal_separators(document: &str) -> String {
    let bytes = document.as_bytes();
    let mut positions = Vec::new();
    for zone in math_zones(document) {
        positions.extend(decimal_points(bytes, zone));
    }
    debug!(count = positions.len(), "converting decimal separators");

    let mut out = String::with_capacity(document.len());
    let mut cursor = 0;
    for pos in positions {
        out.push_str(&document[cursor..pos]);
        out.push(',');
        cursor = pos + 1;
    }
    out.push_str(&document[cursor..]);
    out
}

/// Content ranges of the math zones of `document`, without their delimiters.
pub fn math_zones(document: &str) -> Vec<Range<usize>> {
    let scanner = Scanner::new(document);
    let bytes = document.as_bytes();
    let mut zones = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'%' => pos = line_end(bytes, pos),
            b'$' => {
                let delimiter: &[u8] = if bytes.get(pos + 1) == Some(&b'$') {
                    b"$$"
                } else {
                    b"$"
                };
                let start = pos + delimiter.len();
                match find_unescaped(bytes, start, delimiter) {
                    Some(end) => {
                        zones.push(start..end);
                        pos = end + delimiter.len();
                    }
                    None => break,
                }
            }
            b'\\' => match bytes.get(pos + 1) {
                Some(b'(') | Some(b'[') => {
                    let closing: &[u8] = if bytes[pos + 1] == b'(' { b"\\)" } else { b"\\]" };
                    let start = pos + 2;
                    match find_unescaped_delimiter(bytes, start, closing) {
                        Some(end) => {
                            zones.push(start..end);
                            pos = end + 2;
                        }
                        None => break,
                    }
                }
                _ if control_word_is(bytes, pos, "begin") => {
                    let name_start = pos + "\\begin{".len();
                    let environment = document
                        .get(name_start..)
                        .and_then(|rest| rest.find('}'))
                        .map(|len| &document[name_start..name_start + len]);
                    match environment {
                        Some(name) if MATH_ENVIRONMENTS.contains(&name) => {
                            let start = name_start + name.len() + 1;
                            match scanner.find_environment_end(name, start) {
                                Some((end, after)) => {
                                    zones.push(start..end);
                                    pos = after;
                                }
                                None => break,
                            }
                        }
                        _ => pos += 2,
                    }
                }
                _ => pos += 2,
            },
            _ => pos += 1,
        }
    }
    zones
}

/// `\)` and `\]` are themselves backslash sequences, so they cannot be searched for
/// with the escape-skipping helper.
fn find_unescaped_delimiter(bytes: &[u8], from: usize, closing: &[u8]) -> Option<usize> {
    let mut pos = from;
    while pos + 1 < bytes.len() {
        if bytes[pos] == b'\\' {
            if bytes[pos + 1] == closing[1] {
                return Some(pos);
            }
            pos += 2;
            continue;
        }
        pos += 1;
    }
    None
}

/// Positions of convertible decimal points inside `zone`, skipping protected commands.
fn decimal_points(bytes: &[u8], zone: Range<usize>) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut pos = zone.start;
    while pos < zone.end {
        match bytes[pos] {
            b'\\' => {
                match PROTECTED_COMMANDS
                    .iter()
                    .find(|name| control_word_is(bytes, pos, name))
                {
                    Some(name) => {
                        let mut open = pos + 1 + name.len();
                        if bytes.get(open) == Some(&b'*') {
                            open += 1;
                        }
                        while bytes.get(open).is_some_and(|b| b.is_ascii_whitespace()) {
                            open += 1;
                        }
                        pos = match find_closing_brace(bytes, open) {
                            Some(close) if close < zone.end => close + 1,
                            Some(_) | None => open,
                        };
                    }
                    None => pos += 2,
                }
                continue;
            }
            b'.' if pos > zone.start
                && pos + 1 < zone.end
                && bytes[pos - 1].is_ascii_digit()
                && bytes[pos + 1].is_ascii_digit() =>
            {
                positions.push(pos);
            }
            _ => {}
        }
        pos += 1;
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nl(document: &str) -> String {
        LocaleFormatter::default().format(document, "nl")
    }

    #[test]
    fn test_inline_math_inside_text_command() {
        assert_eq!(nl(r"\txt{$3.14$}"), r"\txt{$3,14$}");
    }

    #[test]
    fn test_text_outside_math_untouched() {
        assert_eq!(nl(r"\txt{Version 2.5 of} $1.5$"), r"\txt{Version 2.5 of} $1,5$");
    }

    #[test]
    fn test_display_math_and_brackets() {
        assert_eq!(nl(r"$$0.5$$ \(1.25\) \[2.75\]"), r"$$0,5$$ \(1,25\) \[2,75\]");
    }

    #[test]
    fn test_equation_environment_with_tag_and_label() {
        let input = "\\begin{equation}\nF = 9.81 \\cdot m \\tag{3.2} \\label{eq:1.1}\n\\end{equation}";
        let expected =
            "\\begin{equation}\nF = 9,81 \\cdot m \\tag{3.2} \\label{eq:1.1}\n\\end{equation}";
        assert_eq!(nl(input), expected);
    }

    #[test]
    fn test_text_inside_math_untouched() {
        assert_eq!(nl(r"$x = 1.5 \text{ see 2.3}$"), r"$x = 1,5 \text{ see 2.3}$");
    }

    #[test]
    fn test_sentence_full_stop_not_converted() {
        assert_eq!(nl(r"$a = b.$ End."), r"$a = b.$ End.");
    }

    #[test]
    fn test_escaped_dollar_is_not_a_zone() {
        assert_eq!(nl(r"costs \$1.50 or $2.5$"), r"costs \$1.50 or $2,5$");
    }

    #[test]
    fn test_comment_outside_math_ignored() {
        let input = "% price $ 1.5\n$0.1$";
        assert_eq!(nl(input), "% price $ 1.5\n$0,1$");
    }

    #[test]
    fn test_multiple_separators_in_one_number_run() {
        assert_eq!(nl("$1.2.3$"), "$1,2,3$");
    }

    #[test]
    fn test_idempotent() {
        let input = "$3.14$ \\begin{align}x &= 0.5 \\tag{1.1}\\end{align}";
        let once = nl(input);
        assert_eq!(nl(&once), once);
    }

    #[test]
    fn test_point_decimal_locale_unchanged() {
        let formatter = LocaleFormatter::default();
        assert_eq!(formatter.format("$3.14$", "en"), "$3.14$");
        assert_eq!(formatter.format("$3.14$", "not-a-real-language"), "$3.14$");
    }

    #[test]
    fn test_baltic_languages_use_decimal_comma() {
        let formatter = LocaleFormatter::default();
        assert_eq!(formatter.format("$1.5$", "lt"), "$1,5$");
        assert_eq!(formatter.format("$1.5$", "lv-LV"), "$1,5$");
        assert_eq!(formatter.format("$1.5$", "et"), "$1,5$");
    }

    #[test]
    fn test_region_and_underscore_tags() {
        let formatter = LocaleFormatter::default();
        assert!(formatter.uses_decimal_comma("de-AT"));
        assert!(formatter.uses_decimal_comma("fr_CA"));
        assert!(formatter.uses_decimal_comma("NL"));
        assert!(!formatter.uses_decimal_comma("en-GB"));
        assert!(!formatter.uses_decimal_comma(""));
    }

    #[test]
    fn test_custom_language_set() {
        let formatter = LocaleFormatter::new(["en"]);
        assert_eq!(formatter.format("$3.14$", "en"), "$3,14$");
        assert_eq!(formatter.format("$3.14$", "nl"), "$3.14$");
    }

    #[test]
    fn test_unterminated_math_leaves_rest_alone() {
        assert_eq!(nl("$1.5$ and $2.5"), "$1,5$ and $2.5");
    }

    #[test]
    fn test_math_zones() {
        let input = r"a $x$ b \(y\) \begin{gather}z\end{gather}";
        let zones: Vec<&str> = math_zones(input).into_iter().map(|z| &input[z]).collect();
        assert_eq!(zones, vec!["x", "y", "z"]);
    }
}
