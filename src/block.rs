/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    Text(String),
    Bold(Vec<Span>),
    Italic(Vec<Span>),
}

impl Span {
    /// Concatenated text of a span run with all emphasis removed.
    pub fn plain_text(spans: &[Span]) -> String {
        let mut out = String::new();
        for span in spans {
            span.push_plain(&mut out);
        }
        out
    }

    fn push_plain(&self, out: &mut String) {
        match self {
            Span::Text(text) => out.push_str(text),
            Span::Bold(inner) | Span::Italic(inner) => {
                for span in inner {
                    span.push_plain(out);
                }
            }
        }
    }
}

/// Marker style of a list run. Numbering is regenerated at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Numbered,
}

/// Block-level elements parsed from the input text
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        content: Vec<Span>,
    },
    Paragraph {
        content: Vec<Span>,
    },
    /// A homogeneous run of list items
    List {
        kind: ListKind,
        items: Vec<Vec<Span>>,
    },
    /// Fixed vertical gap, one per blank input line
    Spacer {
        height_pt: f64,
    },
    /// A level-2 heading or label line followed by the blocks belonging to it.
    ///
    /// Kept on one page when it fits; the paginator unwraps it otherwise.
    /// Never nested.
    Section(Vec<Block>),
}

impl Block {
    /// Short name of the block variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Block::Heading { level: 1, .. } => "Heading1",
            Block::Heading { .. } => "Heading2",
            Block::Paragraph { .. } => "Paragraph",
            Block::List {
                kind: ListKind::Bullet,
                ..
            } => "BulletList",
            Block::List {
                kind: ListKind::Numbered,
                ..
            } => "NumberedList",
            Block::Spacer { .. } => "Spacer",
            Block::Section(_) => "Section",
        }
    }

    /// Plain text of the block, one line per paragraph-like unit.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { content, .. } | Block::Paragraph { content } => {
                Span::plain_text(content)
            }
            Block::List { items, .. } => items
                .iter()
                .map(|item| Span::plain_text(item))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Spacer { .. } => String::new(),
            Block::Section(blocks) => blocks
                .iter()
                .map(Block::plain_text)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Leaf blocks in document order, looking through a section wrapper.
    pub fn flatten(blocks: &[Block]) -> Vec<&Block> {
        let mut out = Vec::new();
        for block in blocks {
            match block {
                Block::Section(inner) => out.extend(inner.iter()),
                other => out.push(other),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Span {
        Span::Text(s.to_string())
    }

    #[test]
    fn plain_text_strips_emphasis() {
        let spans = vec![
            Span::Bold(vec![text("bold")]),
            text(" and "),
            Span::Italic(vec![text("italic")]),
        ];
        assert_eq!(Span::plain_text(&spans), "bold and italic");
    }

    #[test]
    fn flatten_looks_through_sections() {
        let heading = Block::Heading {
            level: 2,
            content: vec![text("Agenda")],
        };
        let spacer = Block::Spacer { height_pt: 6.0 };
        let para = Block::Paragraph {
            content: vec![text("Closing")],
        };
        let blocks = vec![
            Block::Section(vec![heading.clone(), spacer.clone()]),
            para.clone(),
        ];

        assert_eq!(Block::flatten(&blocks), vec![&heading, &spacer, &para]);
    }

    #[test]
    fn kind_names() {
        let list = Block::List {
            kind: ListKind::Numbered,
            items: vec![vec![text("one")]],
        };
        assert_eq!(list.kind_name(), "NumberedList");
        assert_eq!(Block::Spacer { height_pt: 1.0 }.kind_name(), "Spacer");
    }
}
