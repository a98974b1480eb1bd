mod block;
mod config;
mod error;
mod estimate;
mod inline;
mod paginate;
mod parser;
mod typst;

pub use block::{Block, ListKind, Span};
pub use config::{Config, FontConfig, LayoutConfig, PageConfig};
pub use error::Error;
pub use estimate::EstimateMeasure;
pub use inline::NBSP;
pub use paginate::{
    ContentArea, Measure, Page, Region, Render, measure_blocks, paginate, paginate_with,
};
pub use typst::{TypstMeasure, TypstRenderer, template_size};

use std::path::Path;

use tracing::debug;

/// Length of the per-page text sample logged at debug level.
const SAMPLE_CHARS: usize = 140;

/// Which measurement service backs pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeasureKind {
    /// Lay each block out with Typst
    #[default]
    Typst,
    /// Estimate heights from text length
    Estimate,
}

/// A finished PDF and the number of pages in it.
#[derive(Debug)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

/// Parse text into blocks using the default spacer height.
pub fn parse(text: &str) -> Vec<Block> {
    parse_with_config(text, &Config::compiled_default())
}

/// Parse text into blocks with custom config.
pub fn parse_with_config(text: &str, config: &Config) -> Vec<Block> {
    parser::parse(text, config.layout.spacer_height)
}

/// Resolve inline markup of one line of text.
pub fn format_inline(line: &str) -> Vec<Span> {
    inline::parse_line(line)
}

/// Lay text out onto pages and return the Typst source of the document.
pub fn text_to_typst(
    text: &str,
    config: &Config,
    template: Option<&Path>,
    measure: MeasureKind,
) -> Result<String, Error> {
    let renderer = layout(text, config, template, measure)?;
    Ok(renderer.into_markup())
}

/// Lay text out onto pages over `template` and compile them to PDF.
pub fn text_to_pdf(
    text: &str,
    config: &Config,
    template: Option<&Path>,
    measure: MeasureKind,
) -> Result<PdfOutput, Error> {
    let renderer = layout(text, config, template, measure)?;
    let pages = renderer.page_count();
    let bytes = renderer.finish()?;
    Ok(PdfOutput { bytes, pages })
}

fn layout(
    text: &str,
    config: &Config,
    template: Option<&Path>,
    measure: MeasureKind,
) -> Result<TypstRenderer, Error> {
    let (page_width, page_height) = match template {
        Some(template) => typst::template_size(template)?,
        None => (config.page.width, config.page.height),
    };
    // Geometry is validated before any parsing happens
    let region = config.page.region(page_width, page_height)?;

    let blocks = parse_with_config(text, config);
    debug!(blocks = blocks.len(), "parsed input");
    for (i, block) in blocks.iter().take(10).enumerate() {
        debug!("  {}: {}", i + 1, block.kind_name());
    }

    let measure: Box<dyn Measure> = match measure {
        MeasureKind::Typst => Box::new(TypstMeasure::new(config)),
        MeasureKind::Estimate => Box::new(EstimateMeasure::new(config)),
    };
    let mut renderer = TypstRenderer::new(config, page_width, page_height, template)?;
    paginate_with(blocks, region.area, measure.as_ref(), |page| {
        debug!(page = page.number, sample = %page_sample(&page), "page text");
        renderer.render(&page, &region);
    });

    debug!(pages = renderer.page_count(), "paginated");
    if renderer.page_count() == 0 {
        return Err(Error::NoContent);
    }
    Ok(renderer)
}

fn page_sample(page: &Page) -> String {
    let text = page
        .blocks
        .iter()
        .map(Block::plain_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    text.chars().take(SAMPLE_CHARS).collect()
}
