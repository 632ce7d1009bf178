//! Format adapters: each turns one play file into a registry, raw scenes per
//! act and the text counts the statistics need.

pub mod plain_text;
pub mod tei;
pub mod word;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use crate::core::config::InputFormat;
use crate::core::state::CharacterRegistry;
use crate::services::dialect::Dialect;
use crate::services::features::TextMetrics;
use crate::services::segmenter::RawScene;

pub const OLD_ORTHOGRAPHY_MARKER: char = 'Ѣ';

/// Title, author and date found in the document itself (TEI header).
#[derive(Debug, Clone, PartialEq)]
pub struct Bibliography {
    pub title: String,
    pub author: String,
    pub creation_date: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPlay {
    pub registry: CharacterRegistry,
    pub acts: Vec<Vec<RawScene>>,
    pub metrics: TextMetrics,
    pub bibliography: Option<Bibliography>,
}

pub fn is_old_orthography(text: &str) -> bool {
    text.contains(OLD_ORTHOGRAPHY_MARKER)
}

/// Format of a play file: by extension, and for XML by the cast markup.
pub fn detect_format(path: &str, content: &[u8]) -> Option<InputFormat> {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_lowercase();
    match extension.as_str() {
        "txt" => Some(InputFormat::Txt),
        "docx" => Some(InputFormat::Word),
        "xml" => {
            let text = String::from_utf8_lossy(content);
            if text.to_lowercase().contains("<castitem") {
                Some(InputFormat::FrenchTei)
            } else {
                Some(InputFormat::RussianTei)
            }
        }
        _ => None,
    }
}

pub fn parse(content: &[u8], dialect: &Dialect) -> Result<ParsedPlay> {
    match dialect.format {
        InputFormat::Word => word::parse(content, dialect),
        format => {
            let text = std::str::from_utf8(content).context("play text is not valid UTF-8")?;
            match format {
                InputFormat::Txt => plain_text::parse(text, dialect),
                InputFormat::FrenchTei => tei::parse_french(text, dialect),
                _ => tei::parse_russian(text, dialect),
            }
        }
    }
}
