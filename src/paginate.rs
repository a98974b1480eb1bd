//! Greedy single-pass pagination over a queue of blocks.
//!
//! A section at the head of a fresh page is kept whole when its measured height
//! fits the page, otherwise it is unwrapped in place and its blocks are fitted
//! one by one. Blocks are never reordered. A block taller than an empty page is
//! placed anyway and overflows.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::block::Block;
use crate::error::Error;

/// Width and height of the area a page's blocks are laid out in, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentArea {
    pub width_pt: f64,
    pub height_pt: f64,
}

impl ContentArea {
    /// Fails when either side is not a positive, finite length.
    pub fn new(width_pt: f64, height_pt: f64) -> Result<Self, Error> {
        let valid = |len: f64| len.is_finite() && len > 0.0;
        if !valid(width_pt) || !valid(height_pt) {
            return Err(Error::InvalidContentArea {
                width_pt,
                height_pt,
            });
        }
        Ok(Self {
            width_pt,
            height_pt,
        })
    }
}

/// Content area positioned on the page, measured from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub left_pt: f64,
    pub top_pt: f64,
    pub area: ContentArea,
}

/// Blocks assigned to one output page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub blocks: Vec<Block>,
    /// Sum of the measured heights of `blocks`; exceeds the capacity only for
    /// an oversized single block.
    pub used_height_pt: f64,
}

/// Measurement capability: the vertical space a block occupies at a width.
///
/// Must be deterministic for a given block and width; the paginator may ask
/// for the same block more than once.
pub trait Measure {
    fn measure(&self, block: &Block, width_pt: f64) -> Result<f64, Error>;
}

impl<F> Measure for F
where
    F: Fn(&Block, f64) -> Result<f64, Error>,
{
    fn measure(&self, block: &Block, width_pt: f64) -> Result<f64, Error> {
        self(block, width_pt)
    }
}

/// Rendering capability, invoked once per produced page in document order.
pub trait Render {
    fn render(&mut self, page: &Page, region: &Region);
}

/// Total height of `blocks` stacked at `width_pt`.
///
/// Stops summing once the total exceeds `cap_pt`, so the result is only exact
/// up to the cap. Any measurement failure yields `f64::INFINITY`.
pub fn measure_blocks<M>(measure: &M, blocks: &[Block], width_pt: f64, cap_pt: Option<f64>) -> f64
where
    M: Measure + ?Sized,
{
    let mut total = 0.0;
    for block in blocks {
        total += measure_block(measure, block, width_pt);
        if cap_pt.is_some_and(|cap| total > cap) {
            return total;
        }
    }
    total
}

fn measure_block<M>(measure: &M, block: &Block, width_pt: f64) -> f64
where
    M: Measure + ?Sized,
{
    match measure.measure(block, width_pt) {
        Ok(height) => height,
        Err(err) => {
            debug!(kind = block.kind_name(), %err, "measurement failed, treating as overflow");
            f64::INFINITY
        }
    }
}

/// Split `blocks` into pages of `area`.
pub fn paginate<M>(blocks: Vec<Block>, area: ContentArea, measure: &M) -> Vec<Page>
where
    M: Measure + ?Sized,
{
    let mut pages = Vec::new();
    paginate_with(blocks, area, measure, |page| pages.push(page));
    pages
}

/// Split `blocks` into pages of `area`, handing each page to `on_page` as soon
/// as it is complete.
pub fn paginate_with<M, F>(blocks: Vec<Block>, area: ContentArea, measure: &M, mut on_page: F)
where
    M: Measure + ?Sized,
    F: FnMut(Page),
{
    let mut queue: VecDeque<Block> = blocks.into();
    let mut number = 0;

    while !queue.is_empty() {
        number += 1;
        let mut page = Page {
            number,
            blocks: Vec::new(),
            used_height_pt: 0.0,
        };

        if let Some(Block::Section(section)) = queue.front() {
            let height = measure_blocks(measure, section, area.width_pt, Some(area.height_pt));
            if height <= area.height_pt {
                debug!(page = number, height, "section kept together");
                page.used_height_pt = height;
                page.blocks.extend(queue.pop_front());
            } else if let Some(Block::Section(section)) = queue.pop_front() {
                debug!(page = number, height, "section taller than a page, unwrapping");
                for block in section.into_iter().rev() {
                    queue.push_front(block);
                }
            }
        }

        fill_page(&mut page, &mut queue, area, measure);
        debug!(
            page = page.number,
            blocks = page.blocks.len(),
            used = page.used_height_pt,
            "page complete"
        );
        on_page(page);
    }
}

/// Move blocks from the front of `queue` onto `page` while they fit.
fn fill_page<M>(page: &mut Page, queue: &mut VecDeque<Block>, area: ContentArea, measure: &M)
where
    M: Measure + ?Sized,
{
    while let Some(block) = queue.front() {
        let remaining = area.height_pt - page.used_height_pt;
        let height = match block {
            Block::Section(section) => {
                measure_blocks(measure, section, area.width_pt, Some(remaining))
            }
            other => measure_block(measure, other, area.width_pt),
        };

        if height <= remaining {
            page.used_height_pt += height;
            page.blocks.extend(queue.pop_front());
            continue;
        }

        // Nothing smaller will come along for this block, so overflow the page
        if page.blocks.is_empty() {
            warn!(
                page = page.number,
                kind = block.kind_name(),
                height,
                capacity = area.height_pt,
                "block taller than the page, placing it anyway"
            );
            page.used_height_pt += height;
            page.blocks.extend(queue.pop_front());
        }
        break;
    }
}
