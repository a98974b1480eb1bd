use once_cell::sync::Lazy;
use regex::Regex;

use crate::block::{Block, ListKind, Span};
use crate::inline;

static BULLET_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*]\s+(.*)").expect("valid bullet regex"));
static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s+(.*)").expect("valid numbered regex"));
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\r\n|[\n\r\x0B\x0C\x1C\x1D\x1E\x{85}\x{2028}\x{2029}]")
        .expect("valid line-break regex")
});

/// Parse text into a list of blocks, one spacer of `spacer_height_pt` per
/// blank line.
pub fn parse(text: &str, spacer_height_pt: f64) -> Vec<Block> {
    let lines = split_lines(text);
    let mut state = ParseState {
        spacer_height_pt,
        ..ParseState::default()
    };

    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1).copied().unwrap_or("");
        process_line(line, next, &mut state);
    }

    state.flush_list();
    state.close_section();
    state.blocks
}

/// Split on every Unicode line boundary, `\r\n` counting as one. A trailing
/// break does not start an extra line.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<&str> = LINE_BREAK.split(text).collect();
    if LINE_BREAK.find_iter(text).last().is_some_and(|m| m.end() == text.len()) {
        lines.pop();
    }
    lines
}

#[derive(Default)]
struct ParseState {
    blocks: Vec<Block>,
    spacer_height_pt: f64,

    // Open list run, items already resolved to spans
    list: Option<(ListKind, Vec<Vec<Span>>)>,

    // Open section; its first block is the heading or label
    section: Option<Vec<Block>>,
}

impl ParseState {
    /// The section if one is open, else the top level.
    fn container(&mut self) -> &mut Vec<Block> {
        match self.section {
            Some(ref mut section) => section,
            None => &mut self.blocks,
        }
    }

    fn flush_list(&mut self) {
        if let Some((kind, items)) = self.list.take() {
            self.container().push(Block::List { kind, items });
        }
    }

    /// Emit the open section. A section holding only its heading is inlined.
    fn close_section(&mut self) {
        let Some(mut section) = self.section.take() else {
            return;
        };
        if section.len() > 1 {
            self.blocks.push(Block::Section(section));
        } else {
            self.blocks.append(&mut section);
        }
    }

    fn open_section(&mut self, first: Block) {
        self.flush_list();
        self.close_section();
        self.section = Some(vec![first]);
    }

    fn push_item(&mut self, kind: ListKind, content: Vec<Span>) {
        if !matches!(self.list, Some((open, _)) if open == kind) {
            self.flush_list();
            self.list = Some((kind, Vec::new()));
        }
        if let Some((_, items)) = self.list.as_mut() {
            items.push(content);
        }
    }
}

fn process_line(line: &str, next: &str, state: &mut ParseState) {
    // Blank lines keep the list and section open
    if line.trim().is_empty() {
        state.flush_list();
        let height_pt = state.spacer_height_pt;
        state.container().push(Block::Spacer { height_pt });
        return;
    }

    if let Some(rest) = line.strip_prefix("# ") {
        state.flush_list();
        state.close_section();
        state.blocks.push(Block::Heading {
            level: 1,
            content: inline::parse(rest.trim()),
        });
        return;
    }

    if let Some(rest) = line.strip_prefix("## ") {
        state.open_section(Block::Heading {
            level: 2,
            content: inline::parse(rest.trim()),
        });
        return;
    }

    // A label line introducing a list starts a section of its own
    if is_label(line, next) {
        state.open_section(Block::Paragraph {
            content: inline::parse(line.trim()),
        });
        return;
    }

    if let Some(caps) = BULLET_ITEM.captures(line) {
        state.push_item(ListKind::Bullet, inline::parse(caps[1].trim()));
        return;
    }

    if let Some(caps) = NUMBERED_ITEM.captures(line) {
        state.push_item(ListKind::Numbered, inline::parse(caps[1].trim()));
        return;
    }

    state.flush_list();
    let content = inline::parse_line(line);
    state.container().push(Block::Paragraph { content });
}

fn is_label(line: &str, next: &str) -> bool {
    let next = next.trim();
    line.trim().ends_with(':') && (BULLET_ITEM.is_match(next) || NUMBERED_ITEM.is_match(next))
}
