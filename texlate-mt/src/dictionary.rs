//! Phrase dictionary.
//!
//! A dictionary is a CSV table whose header row lists language codes and whose
//! other rows hold one phrase in each language:
//!
//! ```text
//! en,nl,de
//! Results,Resultaten,Ergebnisse
//! Load case **,Belastingsgeval **,Lastfall **
//! kN,-,-
//! ```
//!
//! `-` means "keep the source text" for that language and an empty cell means the
//! phrase has no translation there. `**` is a wildcard (see [`crate::pattern`]);
//! every filled cell of a row must carry the same number of them. Rows that break these rules are skipped with a [`LoadDiagnostic`].
//!
//! A loaded [`Dictionary`] is immutable and can be shared between any number of
//! translations. [`Dictionary::resolver`] builds the lookup for one language pair.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{LoadDiagnostic, MtError, MtResult};
use crate::pattern::{WildcardPattern, wildcard_count};
use crate::translator::normalize_locale;

/// Cell value meaning "not applicable, keep the source text".
pub const KEEP_SOURCE: &str = "-";

/// Where a dictionary is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionarySource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for DictionarySource {
    fn from(path: PathBuf) -> Self {
        DictionarySource::Path(path)
    }
}

impl From<&Path> for DictionarySource {
    fn from(path: &Path) -> Self {
        DictionarySource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for DictionarySource {
    fn from(bytes: Vec<u8>) -> Self {
        DictionarySource::Bytes(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DictionaryRow {
    /// 1-based line in the source file
    line: u64,
    cells: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    languages: Vec<String>,
    rows: Vec<DictionaryRow>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl Dictionary {
    /// Load a dictionary from a file or from bytes already in memory.
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - The table, with any skipped rows in [`Dictionary::diagnostics`]
    /// * `Err(MtError)` - The source could not be read or is not CSV
    ///
    /// # Example
    ///
    /// ```ignore
    /// let dictionary = Dictionary::load(&DictionarySource::from(Path::new("terms.csv")))?;
    /// let resolver = dictionary.resolver("en", "nl");
    /// ```
    pub fn load(source: &DictionarySource) -> MtResult<Self> {
        match source {
            DictionarySource::Path(path) => Self::from_path(path),
            DictionarySource::Bytes(bytes) => Self::from_reader(bytes.as_slice()),
        }
    }

    /// Read the dictionary file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> MtResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            MtError::DictionaryError(format!("Cannot open {}: {}", path.display(), e))
        })?;
        Self::from_reader(file)
    }

    /// Read a dictionary table. Only unreadable input is an error; bad rows are
    /// skipped and reported through [`Dictionary::diagnostics`].
    pub fn from_reader<R: Read>(reader: R) -> MtResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = csv_reader.records();
        let mut dictionary = Dictionary::default();

        let header = match records.next() {
            Some(record) => record?,
            None => {
                warn!("dictionary is empty");
                dictionary.diagnostics.push(LoadDiagnostic::EmptyHeader);
                return Ok(dictionary);
            }
        };
        dictionary.languages = header.iter().map(|code| code.to_lowercase()).collect();
        if dictionary.languages.iter().all(|code| code.is_empty()) {
            warn!("dictionary header has no language codes");
            dictionary.languages.clear();
            dictionary.diagnostics.push(LoadDiagnostic::EmptyHeader);
            return Ok(dictionary);
        }

        for record in records {
            let record = record?;
            let line = record.position().map_or(0, |position| position.line());
            let cells: Vec<String> = record.iter().map(str::to_string).collect();

            if let Some(diagnostic) = dictionary.validate_row(line, &cells) {
                warn!(%diagnostic, "skipping dictionary row");
                dictionary.diagnostics.push(diagnostic);
                continue;
            }
            dictionary.rows.push(DictionaryRow { line, cells });
        }

        debug!(
            languages = ?dictionary.languages,
            rows = dictionary.rows.len(),
            skipped = dictionary.diagnostics.len(),
            "loaded dictionary"
        );
        Ok(dictionary)
    }

    fn validate_row(&self, line: u64, cells: &[String]) -> Option<LoadDiagnostic> {
        if cells.len() != self.languages.len() {
            return Some(LoadDiagnostic::MalformedRow {
                line,
                expected: self.languages.len(),
                found: cells.len(),
            });
        }

        let counts: Vec<usize> = cells
            .iter()
            .filter(|cell| !cell.is_empty() && cell.as_str() != KEEP_SOURCE)
            .map(|cell| wildcard_count(cell))
            .collect();
        if counts.windows(2).any(|pair| pair[0] != pair[1]) {
            return Some(LoadDiagnostic::WildcardMismatch { line, counts });
        }
        None
    }

    /// Language codes from the header row, lowercased.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Problems found while loading.
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    /// Number of rows that passed validation.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column for `locale`: an exact header match, else the first column with the
    /// same language (`nl-BE` falls back to `nl`).
    pub fn column(&self, locale: &str) -> Option<usize> {
        let wanted = locale.trim().to_lowercase();
        self.languages
            .iter()
            .position(|code| *code == wanted)
            .or_else(|| {
                let language = normalize_locale(&wanted);
                self.languages
                    .iter()
                    .position(|code| normalize_locale(code) == language)
            })
    }

    /// Build the lookup for one language pair.
    ///
    /// A language that is not a column gives an empty resolver carrying a
    /// [`LoadDiagnostic::ColumnNotFound`], so every fragment goes to the backend.
    pub fn resolver(&self, source_locale: &str, target_locale: &str) -> PhraseResolver {
        let mut resolver = PhraseResolver::default();

        let (source, target) = match (self.column(source_locale), self.column(target_locale)) {
            (Some(source), Some(target)) => (source, target),
            (source, _) => {
                let missing = if source.is_none() {
                    source_locale
                } else {
                    target_locale
                };
                warn!(language = missing, "language is not a dictionary column");
                resolver
                    .diagnostics
                    .push(LoadDiagnostic::ColumnNotFound(missing.to_string()));
                return resolver;
            }
        };

        let mut first_lines: HashMap<String, u64> = HashMap::new();
        for row in &self.rows {
            let source_text = row.cells[source].as_str();
            let target_text = row.cells[target].as_str();
            if source_text.is_empty() || source_text == KEEP_SOURCE || target_text.is_empty() {
                continue;
            }
            let target_text = if target_text == KEEP_SOURCE {
                source_text
            } else {
                target_text
            };

            if wildcard_count(source_text) == 0 {
                match resolver.exact.entry(source_text.to_string()) {
                    Entry::Vacant(slot) => {
                        slot.insert(target_text.to_string());
                        first_lines.insert(source_text.to_string(), row.line);
                    }
                    Entry::Occupied(_) => {
                        let diagnostic = LoadDiagnostic::DuplicateEntry {
                            line: row.line,
                            first_line: first_lines.get(source_text).copied().unwrap_or(0),
                            source_text: source_text.to_string(),
                        };
                        debug!(%diagnostic, "duplicate dictionary entry");
                        resolver.diagnostics.push(diagnostic);
                    }
                }
                continue;
            }

            match (
                WildcardPattern::compile(source_text),
                WildcardPattern::compile(target_text),
            ) {
                (Ok(source_pattern), Ok(target_pattern)) => {
                    resolver.wildcards.push(WildcardEntry {
                        line: row.line,
                        source: source_pattern,
                        target: target_pattern,
                    });
                }
                (source_result, _) => {
                    let pattern = if source_result.is_err() {
                        source_text
                    } else {
                        target_text
                    };
                    let diagnostic = LoadDiagnostic::AdjacentWildcards {
                        line: row.line,
                        pattern: pattern.to_string(),
                    };
                    warn!(%diagnostic, "skipping wildcard entry");
                    resolver.diagnostics.push(diagnostic);
                }
            }
        }

        debug!(
            source = source_locale,
            target = target_locale,
            exact = resolver.exact.len(),
            wildcards = resolver.wildcards.len(),
            "built phrase resolver"
        );
        resolver
    }
}

impl FromStr for Dictionary {
    type Err = MtError;

    fn from_str(text: &str) -> MtResult<Self> {
        Self::from_reader(text.as_bytes())
    }
}

#[derive(Debug, Clone)]
struct WildcardEntry {
    line: u64,
    source: WildcardPattern,
    target: WildcardPattern,
}

/// Exact and wildcard lookup for one language pair.
#[derive(Debug, Clone, Default)]
pub struct PhraseResolver {
    exact: HashMap<String, String>,
    /// In file order; the first match wins
    wildcards: Vec<WildcardEntry>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl PhraseResolver {
    /// Translation of `text`, or `None` if the dictionary has nothing for it.
    pub fn resolve(&self, text: &str) -> Option<String> {
        if let Some(translation) = self.exact.get(text) {
            return Some(translation.clone());
        }
        self.wildcards.iter().find_map(|entry| {
            let captures = entry.source.captures(text)?;
            debug!(line = entry.line, pattern = %entry.source, "wildcard match");
            Some(entry.target.fill(&captures))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len()
    }

    /// Problems found while building this resolver.
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary(text: &str) -> Dictionary {
        text.parse().unwrap()
    }

    #[test]
    fn test_exact_lookup() {
        let dict = dictionary("en,nl\nHello,Hallo\nResults,Resultaten\n");
        assert_eq!(dict.languages(), ["en", "nl"]);
        assert_eq!(dict.len(), 2);
        let resolver = dict.resolver("en", "nl");
        assert_eq!(resolver.resolve("Hello").as_deref(), Some("Hallo"));
        assert_eq!(resolver.resolve("Goodbye"), None);
    }

    #[test]
    fn test_reverse_direction() {
        let resolver = dictionary("en,nl\nHello,Hallo\n").resolver("nl", "en");
        assert_eq!(resolver.resolve("Hallo").as_deref(), Some("Hello"));
    }

    #[test]
    fn test_keep_source_cell() {
        let resolver = dictionary("en,nl,de\nkN,-,kN\n").resolver("en", "nl");
        assert_eq!(resolver.resolve("kN").as_deref(), Some("kN"));
    }

    #[test]
    fn test_keep_source_in_source_column_excludes_row() {
        let resolver = dictionary("en,nl\n-,Alleen\n").resolver("en", "nl");
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_wildcard_round_trip() {
        let resolver = dictionary("en,nl\nX ** Y,A ** B\n").resolver("en", "nl");
        assert_eq!(resolver.resolve("X hello Y").as_deref(), Some("A hello B"));
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let dict = dictionary("en,nl\nLoad case **,Belastingsgeval **\nLoad case 1,Eerste belastingsgeval\n");
        let resolver = dict.resolver("en", "nl");
        assert_eq!(
            resolver.resolve("Load case 1").as_deref(),
            Some("Eerste belastingsgeval")
        );
        assert_eq!(
            resolver.resolve("Load case 2").as_deref(),
            Some("Belastingsgeval 2")
        );
    }

    #[test]
    fn test_first_wildcard_in_file_order_wins() {
        let dict = dictionary("en,nl\n** beam,balk **\nSteel **,Staal **\n");
        let resolver = dict.resolver("en", "nl");
        assert_eq!(resolver.resolve("Steel beam").as_deref(), Some("balk Steel"));
    }

    #[test]
    fn test_mismatched_wildcards_are_inert() {
        let dict = dictionary("en,nl\nX ** Y,A B\nHello,Hallo\n");
        assert_eq!(dict.len(), 1);
        assert_eq!(
            dict.diagnostics(),
            [LoadDiagnostic::WildcardMismatch {
                line: 2,
                counts: vec![1, 0]
            }]
        );
        assert_eq!(dict.resolver("en", "nl").resolve("X hello Y"), None);
    }

    #[test]
    fn test_keep_source_cells_do_not_count_wildcards() {
        let dict = dictionary("en,nl,de\nLoad **,-,Last **\n");
        assert!(dict.diagnostics().is_empty());
        let resolver = dict.resolver("en", "nl");
        assert_eq!(resolver.resolve("Load 3").as_deref(), Some("Load 3"));
    }

    #[test]
    fn test_malformed_row_skipped() {
        let dict = dictionary("en,nl\nHello\nResults,Resultaten\n");
        assert_eq!(dict.len(), 1);
        assert_eq!(
            dict.diagnostics(),
            [LoadDiagnostic::MalformedRow {
                line: 2,
                expected: 2,
                found: 1
            }]
        );
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let dict = dictionary("en,nl\nHello,Hallo\nHello,Hoi\n");
        let resolver = dict.resolver("en", "nl");
        assert_eq!(resolver.resolve("Hello").as_deref(), Some("Hallo"));
        assert_eq!(
            resolver.diagnostics(),
            [LoadDiagnostic::DuplicateEntry {
                line: 3,
                first_line: 2,
                source_text: "Hello".to_string()
            }]
        );
    }

    #[test]
    fn test_adjacent_wildcards_skipped() {
        let dict = dictionary("en,nl\n**** end,**** eind\n");
        let resolver = dict.resolver("en", "nl");
        assert!(resolver.is_empty());
        assert!(matches!(
            resolver.diagnostics(),
            [LoadDiagnostic::AdjacentWildcards { line: 2, .. }]
        ));
    }

    #[test]
    fn test_missing_column_gives_empty_resolver() {
        let resolver = dictionary("en,nl\nHello,Hallo\n").resolver("en", "not-a-real-language");
        assert!(resolver.is_empty());
        assert_eq!(
            resolver.diagnostics(),
            [LoadDiagnostic::ColumnNotFound("not-a-real-language".to_string())]
        );
        assert_eq!(resolver.resolve("Hello"), None);
    }

    #[test]
    fn test_region_falls_back_to_language_column() {
        let dict = dictionary("EN,NL\nHello,Hallo\n");
        assert_eq!(dict.column("nl-BE"), Some(1));
        assert_eq!(dict.column("en"), Some(0));
        assert_eq!(dict.column("de"), None);
    }

    #[test]
    fn test_cells_are_trimmed_and_quoted() {
        let dict = dictionary("en , nl\n\"Load, static\",\"Last, statisch\" \n");
        let resolver = dict.resolver("en", "nl");
        assert_eq!(
            resolver.resolve("Load, static").as_deref(),
            Some("Last, statisch")
        );
    }

    #[test]
    fn test_empty_input() {
        let dict = dictionary("");
        assert!(dict.is_empty());
        assert_eq!(dict.diagnostics(), [LoadDiagnostic::EmptyHeader]);
        assert!(dict.resolver("en", "nl").is_empty());
    }

    #[test]
    fn test_load_from_bytes() {
        let source = DictionarySource::from(b"en,nl\nHello,Hallo\n".to_vec());
        let dict = Dictionary::load(&source).unwrap();
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let source = DictionarySource::from(PathBuf::from("/nonexistent/dictionary.csv"));
        assert!(matches!(
            Dictionary::load(&source),
            Err(MtError::DictionaryError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("texlate-dict-{}.csv", std::process::id()));
        std::fs::write(&path, "en,de\nResults,Ergebnisse\n").unwrap();
        let dict = Dictionary::from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(
            dict.resolver("en", "de").resolve("Results").as_deref(),
            Some("Ergebnisse")
        );
    }
}
