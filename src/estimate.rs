//! Engine-free height estimate.
//!
//! Assumes an average glyph advance of half the font size and a line pitch of
//! 1.25 times the font size, the same pitch the Typst markup uses. Good enough
//! for dry runs; the Typst measurement is authoritative.

use crate::block::{Block, Span};
use crate::config::Config;
use crate::error::Error;
use crate::paginate::Measure;

const ADVANCE_EM: f64 = 0.5;
const PITCH_EM: f64 = 1.25;

#[derive(Debug, Clone)]
pub struct EstimateMeasure {
    body_size: f64,
    h1_size: f64,
    h2_size: f64,
    h2_space: f64,
    list_indent: f64,
}

impl EstimateMeasure {
    pub fn new(config: &Config) -> Self {
        Self {
            body_size: config.font.body_size,
            h1_size: config.font.h1_size,
            h2_size: config.font.h2_size,
            h2_space: config.layout.h2_space,
            list_indent: config.layout.list_indent,
        }
    }

    fn text_height(&self, spans: &[Span], size: f64, width_pt: f64) -> f64 {
        let chars = Span::plain_text(spans).chars().count();
        let per_line = ((width_pt / (size * ADVANCE_EM)).floor() as usize).max(1);
        let lines = chars.div_ceil(per_line).max(1);
        lines as f64 * size * PITCH_EM
    }

    fn height(&self, block: &Block, width_pt: f64) -> f64 {
        match block {
            Block::Heading { level: 1, content } => {
                self.text_height(content, self.h1_size, width_pt)
            }
            Block::Heading { content, .. } => {
                self.text_height(content, self.h2_size, width_pt) + 2.0 * self.h2_space
            }
            Block::Paragraph { content } => self.text_height(content, self.body_size, width_pt),
            Block::List { items, .. } => {
                let item_width = (width_pt - self.list_indent).max(self.body_size);
                items
                    .iter()
                    .map(|item| self.text_height(item, self.body_size, item_width))
                    .sum()
            }
            Block::Spacer { height_pt } => *height_pt,
            Block::Section(blocks) => blocks.iter().map(|b| self.height(b, width_pt)).sum(),
        }
    }
}

impl Measure for EstimateMeasure {
    fn measure(&self, block: &Block, width_pt: f64) -> Result<f64, Error> {
        Ok(self.height(block, width_pt))
    }
}
