use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::Error;
use crate::paginate::{ContentArea, Region};

static DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub page: PageConfig,
    pub font: FontConfig,
    pub layout: LayoutConfig,
}

/// Page geometry in points. `width`/`height` apply only when there is no
/// template to take the size from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageConfig {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for PageConfig {
    fn default() -> Self {
        // A4
        Self {
            width: 595.0,
            height: 842.0,
            left: 50.0,
            right: 50.0,
            top: 120.0,
            bottom: 100.0,
        }
    }
}

impl PageConfig {
    /// The area left for content on a page of the given size after margins.
    pub fn region(&self, page_width_pt: f64, page_height_pt: f64) -> Result<Region, Error> {
        let area = ContentArea::new(
            page_width_pt - self.left - self.right,
            page_height_pt - self.top - self.bottom,
        )?;
        Ok(Region {
            left_pt: self.left,
            top_pt: self.top,
            area,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FontConfig {
    pub family: String,
    pub body_size: f64,
    pub h1_size: f64,
    pub h2_size: f64,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "Libertinus Serif".to_string(),
            body_size: 12.0,
            h1_size: 16.0,
            h2_size: 14.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Height of the gap emitted for each blank line
    pub spacer_height: f64,
    pub list_indent: f64,
    /// Space above and below a level-2 heading
    pub h2_space: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacer_height: 6.0,
            list_indent: 12.0,
            h2_space: 6.0,
        }
    }
}

impl Config {
    /// The defaults bundled with the crate.
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Load config from a TOML file, or return the compiled defaults if the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                return Ok(Self::compiled_default());
            }
            Err(source) => {
                return Err(Error::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
