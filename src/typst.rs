use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_as_lib::{TypstEngine, TypstTemplateMainFile};
use typst_library::foundations::{Dict, IntoValue};
use typst_library::layout::PagedDocument;
use typst_pdf::PdfOptions;

use crate::block::{Block, ListKind, Span};
use crate::config::Config;
use crate::error::Error;
use crate::paginate::{Measure, Page, Region, Render};

/// Line pitch is one em of text plus this much leading.
const LEADING_EM: f64 = 0.25;

/// Font and spacing values the markup is generated from
#[derive(Debug, Clone)]
struct Style {
    family: String,
    body_size: f64,
    h1_size: f64,
    h2_size: f64,
    h2_space: f64,
    list_indent: f64,
}

impl Style {
    fn new(config: &Config) -> Self {
        Self {
            family: config.font.family.clone(),
            body_size: config.font.body_size,
            h1_size: config.font.h1_size,
            h2_size: config.font.h2_size,
            h2_space: config.layout.h2_space,
            list_indent: config.layout.list_indent,
        }
    }
}

/// Text and paragraph settings shared by measurement and rendering.
///
/// Lines are exactly one em tall and block spacing is zero, so a sequence of
/// blocks is as tall as the sum of its parts.
fn emit_preamble(style: &Style, out: &mut String) {
    out.push_str("#set text(font: ");
    push_string_literal(&style.family, out);
    let _ = writeln!(
        out,
        ", size: {}pt, top-edge: 1em, bottom-edge: 0em)",
        style.body_size
    );
    let _ = writeln!(out, "#set par(leading: {LEADING_EM}em, spacing: 0pt)");
    out.push_str("#set block(spacing: 0pt)\n\n");
}

fn emit_block(block: &Block, style: &Style, out: &mut String) {
    match block {
        Block::Heading { level: 1, content } => {
            let _ = write!(
                out,
                "#block(width: 100%, inset: (bottom: {}pt))[#align(center)[#text(size: {}pt, weight: \"bold\")[",
                style.h1_size * LEADING_EM,
                style.h1_size
            );
            spans_to_typst(content, out);
            out.push_str("]]]\n");
        }
        Block::Heading { content, .. } => {
            let _ = write!(
                out,
                "#block(width: 100%, inset: (top: {}pt, bottom: {}pt))[#text(size: {}pt, weight: \"bold\")[",
                style.h2_space,
                style.h2_space + style.h2_size * LEADING_EM,
                style.h2_size
            );
            spans_to_typst(content, out);
            out.push_str("]]\n");
        }
        Block::Paragraph { content } => {
            let _ = write!(
                out,
                "#block(width: 100%, inset: (bottom: {}pt))[",
                style.body_size * LEADING_EM
            );
            spans_to_typst(content, out);
            out.push_str("]\n");
        }
        Block::List { kind, items } => {
            let _ = write!(
                out,
                "#block(width: 100%, inset: (bottom: {}pt))[",
                style.body_size * LEADING_EM
            );
            list_to_typst(*kind, items, style, out);
            out.push_str("]\n");
        }
        Block::Spacer { height_pt } => {
            let _ = writeln!(out, "#block(width: 100%, height: {height_pt}pt)");
        }
        Block::Section(blocks) => {
            for block in blocks {
                emit_block(block, style, out);
            }
        }
    }
}

fn list_to_typst(kind: ListKind, items: &[Vec<Span>], style: &Style, out: &mut String) {
    let func = match kind {
        ListKind::Bullet => "#list(",
        ListKind::Numbered => "#enum(numbering: \"1.\", ",
    };
    out.push_str(func);
    let _ = write!(
        out,
        "indent: 0pt, body-indent: {}pt, spacing: {}pt",
        style.list_indent,
        style.body_size * LEADING_EM
    );
    for item in items {
        out.push_str(", [");
        spans_to_typst(item, out);
        out.push(']');
    }
    out.push(')');
}

fn spans_to_typst(spans: &[Span], out: &mut String) {
    for span in spans {
        span_to_typst(span, out);
    }
}

fn span_to_typst(span: &Span, out: &mut String) {
    match span {
        // String literals keep markup characters in the text inert
        Span::Text(text) => {
            out.push('#');
            push_string_literal(text, out);
        }
        Span::Bold(inner) => {
            out.push_str("#strong[");
            spans_to_typst(inner, out);
            out.push(']');
        }
        Span::Italic(inner) => {
            out.push_str("#emph[");
            spans_to_typst(inner, out);
            out.push(']');
        }
    }
}

fn push_string_literal(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

/// Measurement document. The block markup and width come in through
/// `sys.inputs`, so one engine serves every measurement.
const MEASURE_MAIN: &str = "#set page(width: sys.inputs.width * 1pt, height: auto, margin: 0pt)
#eval(sys.inputs.block, mode: \"markup\")
";

fn font_options() -> TypstKitFontOptions {
    TypstKitFontOptions::new()
        .include_embedded_fonts(true)
        .include_system_fonts(false)
}

/// Compile Typst markup, resolving files relative to `root`.
fn compile_document(markup: String, root: Option<&Path>) -> Result<PagedDocument, Error> {
    let builder = TypstEngine::builder()
        .main_file(markup)
        .search_fonts_with(font_options());
    let engine = match root {
        Some(root) => builder.with_file_system_resolver(root).build(),
        None => builder.build(),
    };

    engine
        .compile()
        .output
        .map_err(|e| Error::Compile(format!("{:?}", e)))
}

/// Template file name and the directory it is resolved from.
fn split_template(template: &Path) -> Result<(PathBuf, String), Error> {
    if !template.is_file() {
        return Err(Error::TemplateNotFound(template.to_path_buf()));
    }
    let name = template
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::TemplateNotFound(template.to_path_buf()))?;
    let root = match template.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((root, name))
}

/// Natural size of the template's first page, in points.
pub fn template_size(template: &Path) -> Result<(f64, f64), Error> {
    let (root, name) = split_template(template)?;
    let mut markup = String::from("#set page(width: auto, height: auto, margin: 0pt)\n#image(");
    push_string_literal(&name, &mut markup);
    markup.push_str(")\n");

    let doc = compile_document(markup, Some(&root))?;
    let size = doc
        .pages
        .first()
        .map(|page| page.frame.size())
        .ok_or_else(|| Error::Compile(format!("template {} has no pages", template.display())))?;
    debug!(width = size.x.to_pt(), height = size.y.to_pt(), "template size");
    Ok((size.x.to_pt(), size.y.to_pt()))
}

/// Measures blocks by laying them out with Typst on a page of automatic
/// height. Fonts are loaded once per measure and results are cached by width
/// and generated markup.
pub struct TypstMeasure {
    style: Style,
    engine: TypstEngine<TypstTemplateMainFile>,
    cache: RefCell<HashMap<(u64, String), f64>>,
}

impl TypstMeasure {
    pub fn new(config: &Config) -> Self {
        let engine = TypstEngine::builder()
            .main_file(MEASURE_MAIN)
            .search_fonts_with(font_options())
            .build();
        Self {
            style: Style::new(config),
            engine,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn markup(&self, block: &Block) -> String {
        let mut out = String::new();
        emit_preamble(&self.style, &mut out);
        emit_block(block, &self.style, &mut out);
        out
    }
}

impl Measure for TypstMeasure {
    fn measure(&self, block: &Block, width_pt: f64) -> Result<f64, Error> {
        let key = (width_pt.to_bits(), self.markup(block));
        if let Some(height) = self.cache.borrow().get(&key) {
            return Ok(*height);
        }

        let mut inputs = Dict::new();
        inputs.insert("width".into(), width_pt.into_value());
        inputs.insert("block".into(), key.1.as_str().into_value());
        let doc: PagedDocument = self
            .engine
            .compile_with_input(inputs)
            .output
            .map_err(|e| Error::Compile(format!("{:?}", e)))?;
        let height = doc
            .pages
            .first()
            .map(|page| page.frame.size().y.to_pt())
            .unwrap_or(0.0);
        self.cache.borrow_mut().insert(key, height);
        Ok(height)
    }
}

/// Collects pages into one Typst document with the template as background
/// of every page.
pub struct TypstRenderer {
    style: Style,
    template_root: Option<PathBuf>,
    markup: String,
    pages: usize,
}

impl TypstRenderer {
    pub fn new(
        config: &Config,
        page_width_pt: f64,
        page_height_pt: f64,
        template: Option<&Path>,
    ) -> Result<Self, Error> {
        let style = Style::new(config);
        let mut markup = String::new();
        let _ = write!(
            markup,
            "#set page(width: {page_width_pt}pt, height: {page_height_pt}pt, margin: 0pt"
        );

        let template_root = match template {
            Some(template) => {
                let (root, name) = split_template(template)?;
                markup.push_str(", background: image(");
                push_string_literal(&name, &mut markup);
                markup.push_str(", width: 100%, height: 100%)");
                Some(root)
            }
            None => None,
        };
        markup.push_str(")\n");
        emit_preamble(&style, &mut markup);

        Ok(Self {
            style,
            template_root,
            markup,
            pages: 0,
        })
    }

    /// Number of pages rendered so far.
    pub fn page_count(&self) -> usize {
        self.pages
    }

    pub fn into_markup(self) -> String {
        self.markup
    }

    /// Compile the collected pages to PDF bytes.
    pub fn finish(self) -> Result<Vec<u8>, Error> {
        let doc = compile_document(self.markup, self.template_root.as_deref())?;
        debug!(pages = doc.pages.len(), "compiled document");
        typst_pdf::pdf(&doc, &PdfOptions::default())
            .map_err(|e| Error::Pdf(format!("{:?}", e)))
    }
}

impl Render for TypstRenderer {
    fn render(&mut self, page: &Page, region: &Region) {
        if self.pages > 0 {
            self.markup.push_str("#pagebreak()\n");
        }
        let _ = writeln!(
            self.markup,
            "#place(top + left, dx: {}pt, dy: {}pt)[#block(width: {}pt, height: {}pt, breakable: false)[",
            region.left_pt, region.top_pt, region.area.width_pt, region.area.height_pt
        );
        for block in &page.blocks {
            emit_block(block, &self.style, &mut self.markup);
        }
        self.markup.push_str("]]\n");
        self.pages += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginate::ContentArea;
    use crate::parser;

    fn style() -> Style {
        Style::new(&Config::default())
    }

    fn block_markup(input: &str) -> String {
        let mut out = String::new();
        for block in parser::parse(input, 6.0) {
            emit_block(&block, &style(), &mut out);
        }
        out
    }

    #[test]
    fn paragraph() {
        assert_eq!(
            block_markup("Hello world"),
            "#block(width: 100%, inset: (bottom: 3pt))[#\"Hello world\"]\n"
        );
    }

    #[test]
    fn bold_and_italic() {
        assert_eq!(
            block_markup("**bold** and *italic*"),
            "#block(width: 100%, inset: (bottom: 3pt))[#strong[#\"bold\"]#\" and \"#emph[#\"italic\"]]\n"
        );
    }

    #[test]
    fn heading_one_is_centered() {
        assert_eq!(
            block_markup("# Minutes"),
            "#block(width: 100%, inset: (bottom: 4pt))[#align(center)[#text(size: 16pt, weight: \"bold\")[#\"Minutes\"]]]\n"
        );
    }

    #[test]
    fn heading_two_has_space_around() {
        assert_eq!(
            block_markup("## Agenda"),
            "#block(width: 100%, inset: (top: 6pt, bottom: 9.5pt))[#text(size: 14pt, weight: \"bold\")[#\"Agenda\"]]\n"
        );
    }

    #[test]
    fn bullet_list() {
        assert_eq!(
            block_markup("- one\n- two"),
            "#block(width: 100%, inset: (bottom: 3pt))[#list(indent: 0pt, body-indent: 12pt, spacing: 3pt, [#\"one\"], [#\"two\"])]\n"
        );
    }

    #[test]
    fn numbered_list() {
        assert_eq!(
            block_markup("1. one"),
            "#block(width: 100%, inset: (bottom: 3pt))[#enum(numbering: \"1.\", indent: 0pt, body-indent: 12pt, spacing: 3pt, [#\"one\"])]\n"
        );
    }

    #[test]
    fn spacer() {
        assert_eq!(block_markup("\n"), "#block(width: 100%, height: 6pt)\n");
    }

    #[test]
    fn markup_characters_are_inert() {
        assert_eq!(
            block_markup("a #b $c$ \"q\" \\ <d> [e] _f_ // g"),
            "#block(width: 100%, inset: (bottom: 3pt))[#\"a #b $c$ \\\"q\\\" \\\\ <d> [e] _f_ // g\"]\n"
        );
    }

    #[test]
    fn non_breaking_spaces_pass_through() {
        assert_eq!(
            block_markup("a   b"),
            "#block(width: 100%, inset: (bottom: 3pt))[#\"a\u{a0}\u{a0} b\"]\n"
        );
    }

    #[test]
    fn section_emits_children_in_order() {
        assert_eq!(
            block_markup("## A\n- x"),
            format!("{}{}", block_markup("## A"), block_markup("- x"))
        );
    }

    #[test]
    fn renderer_places_each_page_in_region() {
        let config = Config::default();
        let region = Region {
            left_pt: 50.0,
            top_pt: 120.0,
            area: ContentArea::new(495.0, 622.0).unwrap(),
        };
        let mut renderer = TypstRenderer::new(&config, 595.0, 842.0, None).unwrap();
        for number in 1..=2 {
            let page = Page {
                number,
                blocks: parser::parse("text", 6.0),
                used_height_pt: 15.0,
            };
            renderer.render(&page, &region);
        }

        let markup = renderer.into_markup();
        assert!(markup.starts_with("#set page(width: 595pt, height: 842pt, margin: 0pt)\n"));
        assert_eq!(markup.matches("#pagebreak()").count(), 1);
        assert_eq!(
            markup
                .matches("#place(top + left, dx: 50pt, dy: 120pt)[#block(width: 495pt, height: 622pt, breakable: false)[")
                .count(),
            2
        );
    }

    #[test]
    fn missing_template_is_reported() {
        let missing = Path::new("/nonexistent/template.pdf");
        assert!(matches!(
            TypstRenderer::new(&Config::default(), 595.0, 842.0, Some(missing)),
            Err(Error::TemplateNotFound(_))
        ));
        assert!(matches!(template_size(missing), Err(Error::TemplateNotFound(_))));
    }

    const LONG: &str = "A paragraph long enough to wrap onto several lines when the \
                        content area is narrow, and onto fewer when it is wide.";

    #[test]
    fn section_measures_as_sum_of_parts() {
        let measure = TypstMeasure::new(&Config::default());
        let text = format!("## Agenda\n- one\n- two\n\n{LONG}");
        let blocks = parser::parse(&text, 6.0);
        let parts: Vec<Block> = Block::flatten(&blocks).into_iter().cloned().collect();

        let heights: Vec<f64> = parts
            .iter()
            .map(|block| measure.measure(block, 300.0).unwrap())
            .collect();
        assert!(heights.iter().all(|height| *height > 0.0));

        let whole = measure.measure(&Block::Section(parts), 300.0).unwrap();
        let sum: f64 = heights.iter().sum();
        assert!((whole - sum).abs() < 0.01, "section {whole} != parts {sum}");
    }

    #[test]
    fn spacer_measures_its_own_height() {
        let measure = TypstMeasure::new(&Config::default());
        let height = measure
            .measure(&Block::Spacer { height_pt: 6.0 }, 300.0)
            .unwrap();
        assert!((height - 6.0).abs() < 0.01);
    }

    #[test]
    fn measurement_is_cached_per_width() {
        let measure = TypstMeasure::new(&Config::default());
        let block = &parser::parse(LONG, 6.0)[0];

        let narrow = measure.measure(block, 100.0).unwrap();
        let wide = measure.measure(block, 400.0).unwrap();
        assert!(narrow > wide);
        assert_eq!(measure.measure(block, 100.0).unwrap(), narrow);
        assert_eq!(measure.cache.borrow().len(), 2);
    }

    #[test]
    fn invalid_markup_fails_to_compile() {
        assert!(matches!(
            compile_document("#no-such-function()".to_string(), None),
            Err(Error::Compile(_))
        ));
    }

    #[test]
    fn rendered_document_compiles_to_one_page_per_render() {
        let config = Config::default();
        let region = config.page.region(595.0, 842.0).unwrap();
        let mut renderer = TypstRenderer::new(&config, 595.0, 842.0, None).unwrap();
        for number in 1..=3 {
            let text = format!("## Part {number}\n- **a**\n- *b*\n{LONG}");
            let page = Page {
                number,
                blocks: parser::parse(&text, 6.0),
                used_height_pt: 0.0,
            };
            renderer.render(&page, &region);
        }

        let doc = compile_document(renderer.into_markup(), None).unwrap();
        assert_eq!(doc.pages.len(), 3);
        let size = doc.pages[0].frame.size();
        assert!((size.x.to_pt() - 595.0).abs() < 0.01);
        assert!((size.y.to_pt() - 842.0).abs() < 0.01);
    }

    #[test]
    fn finish_produces_pdf_bytes() {
        let config = Config::default();
        let region = config.page.region(595.0, 842.0).unwrap();
        let mut renderer = TypstRenderer::new(&config, 595.0, 842.0, None).unwrap();
        let page = Page {
            number: 1,
            blocks: parser::parse("# Minutes\nBody text", 6.0),
            used_height_pt: 0.0,
        };
        renderer.render(&page, &region);

        let bytes = renderer.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
