use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InputFormat {
    /// Hand-tagged plain text (Russian corpus)
    Txt,
    /// TEI XML with div1/div2 and castItem (French corpus)
    FrenchTei,
    /// TEI XML with div and person (Russian corpus)
    RussianTei,
    /// Word transcripts (.docx)
    Word,
}

impl InputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            InputFormat::Txt => "txt",
            InputFormat::FrenchTei | InputFormat::RussianTei => "xml",
            InputFormat::Word => "docx",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub metadata_path: Option<String>,

    /// Take title/author/date from the metadata table instead of the TEI header.
    #[serde(default)]
    pub custom_metadata: bool,

    /// Forces one format for every file; otherwise it is inferred per file.
    #[serde(default)]
    pub format: Option<InputFormat>,

    #[serde(default)]
    pub dialect: DialectOverrides,
}

/// Optional replacements for the built-in dialect tables.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DialectOverrides {
    pub name_pattern: Option<String>,
    pub cast_line_pattern: Option<String>,
    pub carry_over_phrases: Option<Vec<String>>,
    pub exclusion_markers: Option<Vec<String>>,
}

fn default_input() -> String {
    "input".to_string()
}
fn default_output() -> String {
    "output".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: default_input(),
            output_folder: default_output(),
            metadata_path: None,
            custom_metadata: false,
            format: None,
            dialect: DialectOverrides::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        if !Path::new(&self.input_folder).is_dir() {
            anyhow::bail!("input folder '{}' is not a directory", self.input_folder);
        }
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    /// Plain text and Word plays always need the table for their act counts.
    pub fn requires_metadata(&self, format: InputFormat) -> bool {
        match format {
            InputFormat::Txt | InputFormat::Word => true,
            InputFormat::FrenchTei | InputFormat::RussianTei => self.custom_metadata,
        }
    }
}
