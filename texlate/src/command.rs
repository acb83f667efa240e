//! The closed set of markup commands whose content is translatable.

use std::fmt;

/// A recognised markup command carrying human-language text in its braced argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Txt,
    TextBf,
    TextIt,
    Title,
    Section,
    Subsection,
    Subsubsection,
    Caption,
    Item,
}

impl CommandKind {
    /// Command name without the leading backslash.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Txt => "txt",
            CommandKind::TextBf => "textbf",
            CommandKind::TextIt => "textit",
            CommandKind::Title => "title",
            CommandKind::Section => "section",
            CommandKind::Subsection => "subsection",
            CommandKind::Subsubsection => "subsubsection",
            CommandKind::Caption => "caption",
            CommandKind::Item => "item",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FragmentKind::EXTRACTION_ORDER
            .iter()
            .flat_map(|kind| kind.commands())
            .copied()
            .find(|command| command.name() == name)
    }

    /// The fragment family this command belongs to.
    pub fn family(&self) -> FragmentKind {
        match self {
            CommandKind::Txt | CommandKind::TextBf | CommandKind::TextIt => {
                FragmentKind::InlineText
            }
            CommandKind::Title
            | CommandKind::Section
            | CommandKind::Subsection
            | CommandKind::Subsubsection => FragmentKind::Header,
            CommandKind::Caption => FragmentKind::Caption,
            CommandKind::Item => FragmentKind::ListItem,
        }
    }

    /// Whether the command may be written as `\name*{...}`.
    pub fn allows_star(&self) -> bool {
        matches!(self.family(), FragmentKind::Header)
    }

    /// Whether the command may appear without braces, taking the rest of the line.
    pub fn allows_bare_argument(&self) -> bool {
        matches!(self, CommandKind::Item)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\{}", self.name())
    }
}

/// Family of a translatable fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    InlineText,
    Header,
    Caption,
    ListItem,
    TableCell,
}

impl FragmentKind {
    /// Families in the order the extractor visits them. Fragment order, and thus the
    /// positional mapping of translations back onto fragments, depends on it.
    pub const EXTRACTION_ORDER: [FragmentKind; 5] = [
        FragmentKind::InlineText,
        FragmentKind::Header,
        FragmentKind::Caption,
        FragmentKind::ListItem,
        FragmentKind::TableCell,
    ];

    /// Commands scanned for this family. Table cells come from environments, not commands.
    pub fn commands(&self) -> &'static [CommandKind] {
        match self {
            FragmentKind::InlineText => &[CommandKind::Txt, CommandKind::TextBf, CommandKind::TextIt],
            FragmentKind::Header => &[
                CommandKind::Title,
                CommandKind::Section,
                CommandKind::Subsection,
                CommandKind::Subsubsection,
            ],
            FragmentKind::Caption => &[CommandKind::Caption],
            FragmentKind::ListItem => &[CommandKind::Item],
            FragmentKind::TableCell => &[],
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FragmentKind::InlineText => "inline text",
            FragmentKind::Header => "header",
            FragmentKind::Caption => "caption",
            FragmentKind::ListItem => "list item",
            FragmentKind::TableCell => "table cell",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_maps_back_to_its_family() {
        for kind in FragmentKind::EXTRACTION_ORDER {
            for command in kind.commands() {
                assert_eq!(command.family(), kind);
                assert_eq!(CommandKind::from_name(command.name()), Some(*command));
            }
        }
    }

    #[test]
    fn test_unknown_command_name() {
        assert_eq!(CommandKind::from_name("emph"), None);
        assert_eq!(CommandKind::from_name(""), None);
    }

    #[test]
    fn test_star_and_bare_forms() {
        assert!(CommandKind::Section.allows_star());
        assert!(!CommandKind::Txt.allows_star());
        assert!(CommandKind::Item.allows_bare_argument());
        assert!(!CommandKind::Caption.allows_bare_argument());
    }

    #[test]
    fn test_display() {
        assert_eq!(CommandKind::TextBf.to_string(), "\\textbf");
        assert_eq!(FragmentKind::TableCell.to_string(), "table cell");
    }
}
