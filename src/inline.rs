//! Inline markup: whitespace preservation and `**bold**` / `*italic*` emphasis.
//!
//! Emphasis is resolved in two passes over the line, bold first, so the first
//! `**` pairs win over single `*`. Matching is non-greedy. Each pass splits
//! the text into open and close tokens around its matches, and the tokens are
//! then folded into a span tree.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::block::Span;

/// Non-breaking space, emitted for all but the last space of a run.
pub const NBSP: char = '\u{00A0}';

/// Stands in for a token of an earlier pass while a later pass matches.
/// Tokens are recovered by position, never by this character.
const PLACEHOLDER: char = '\u{FFFC}';

static SPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" {2,}").expect("valid space-run regex"));
static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").expect("valid italic regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Bold,
    Italic,
}

#[derive(Debug)]
enum Token {
    Text(String),
    Open(Emphasis),
    Close(Emphasis),
}

/// Resolve inline markup of an already trimmed piece of text.
pub fn parse(text: &str) -> Vec<Span> {
    emphasize(&preserve_spaces(text))
}

/// Resolve inline markup of a whole input line.
///
/// Surrounding whitespace is trimmed after space runs have been rewritten, so
/// indentation and trailing runs survive as non-breaking spaces.
pub fn parse_line(line: &str) -> Vec<Span> {
    let spaced = preserve_spaces(line);
    emphasize(spaced.trim_matches(|c: char| c.is_whitespace() && c != NBSP))
}

/// Rewrite every run of `n >= 2` spaces into `n - 1` non-breaking spaces and
/// one ordinary space.
pub fn preserve_spaces(text: &str) -> String {
    SPACE_RUN
        .replace_all(text, |caps: &Captures| {
            let run = caps[0].len();
            let mut out: String = std::iter::repeat_n(NBSP, run - 1).collect();
            out.push(' ');
            out
        })
        .into_owned()
}

fn emphasize(text: &str) -> Vec<Span> {
    let tokens = vec![Token::Text(text.to_string())];
    let tokens = mark_pairs(tokens, &BOLD, "**", Emphasis::Bold);
    let tokens = mark_pairs(tokens, &ITALIC, "*", Emphasis::Italic);
    build_spans(tokens)
}

/// Run one emphasis pass over the text of `tokens`, splitting every match into
/// an open token, its inner text and a close token.
///
/// Tokens from earlier passes take part in matching as one placeholder
/// character each and are put back by byte offset.
fn mark_pairs(tokens: Vec<Token>, pattern: &Regex, delim: &str, kind: Emphasis) -> Vec<Token> {
    let mut haystack = String::new();
    let mut cuts: Vec<(usize, usize, Token)> = Vec::new();
    for token in tokens {
        match token {
            Token::Text(text) => haystack.push_str(&text),
            token => {
                let at = haystack.len();
                haystack.push(PLACEHOLDER);
                cuts.push((at, haystack.len(), token));
            }
        }
    }
    for m in pattern.find_iter(&haystack) {
        cuts.push((m.start(), m.start() + delim.len(), Token::Open(kind)));
        cuts.push((m.end() - delim.len(), m.end(), Token::Close(kind)));
    }
    cuts.sort_by_key(|(start, _, _)| *start);

    let mut out = Vec::new();
    let mut pos = 0;
    for (start, end, token) in cuts {
        if start > pos {
            out.push(Token::Text(haystack[pos..start].to_string()));
        }
        out.push(token);
        pos = end;
    }
    if pos < haystack.len() {
        out.push(Token::Text(haystack[pos..].to_string()));
    }
    out
}

/// Fold tokens into a span tree.
///
/// Pairs from the two passes can cross (`**a *b** c*`); closing an outer pair
/// closes the inner one and reopens it afterwards.
fn build_spans(tokens: Vec<Token>) -> Vec<Span> {
    let mut root = Vec::new();
    let mut stack: Vec<(Emphasis, Vec<Span>)> = Vec::new();
    let mut buf = String::new();

    for token in tokens {
        match token {
            Token::Text(text) => buf.push_str(&text),
            Token::Open(kind) => {
                flush_text(&mut buf, &mut stack, &mut root);
                stack.push((kind, Vec::new()));
            }
            Token::Close(kind) => {
                flush_text(&mut buf, &mut stack, &mut root);
                close(kind, &mut stack, &mut root);
            }
        }
    }
    flush_text(&mut buf, &mut stack, &mut root);
    while let Some((kind, children)) = stack.pop() {
        push_span(wrap(kind, children), &mut stack, &mut root);
    }
    root
}

fn close(kind: Emphasis, stack: &mut Vec<(Emphasis, Vec<Span>)>, root: &mut Vec<Span>) {
    if !stack.iter().any(|(open, _)| *open == kind) {
        return;
    }
    let mut reopen = Vec::new();
    while let Some((open, children)) = stack.pop() {
        push_span(wrap(open, children), stack, root);
        if open == kind {
            break;
        }
        reopen.push(open);
    }
    for open in reopen.into_iter().rev() {
        stack.push((open, Vec::new()));
    }
}

fn flush_text(
    buf: &mut String,
    stack: &mut Vec<(Emphasis, Vec<Span>)>,
    root: &mut Vec<Span>,
) {
    if buf.is_empty() {
        return;
    }
    let text = Span::Text(std::mem::take(buf));
    push_span(Some(text), stack, root);
}

fn push_span(
    span: Option<Span>,
    stack: &mut [(Emphasis, Vec<Span>)],
    root: &mut Vec<Span>,
) {
    let Some(span) = span else {
        return;
    };
    match stack.last_mut() {
        Some((_, children)) => children.push(span),
        None => root.push(span),
    }
}

fn wrap(kind: Emphasis, children: Vec<Span>) -> Option<Span> {
    if children.is_empty() {
        return None;
    }
    Some(match kind {
        Emphasis::Bold => Span::Bold(children),
        Emphasis::Italic => Span::Italic(children),
    })
}
