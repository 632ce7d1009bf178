use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::core::error::PlayError;

/// One row of the tab-delimited metadata table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayMetadata {
    pub index: String,
    pub title: String,
    pub last_name: String,
    pub first_name: Option<String>,
    pub creation_date: Value,
    pub num_acts: Option<usize>,
    pub free_iambs: Option<bool>,
}

impl PlayMetadata {
    /// "Last, First", or just the last name when the first name is missing.
    pub fn author(&self) -> String {
        let last = self.last_name.replace('\u{a0}', "");
        match &self.first_name {
            Some(first) => format!("{}, {}", last, first.replace('\u{a0}', ""))
                .trim()
                .to_string(),
            None => last.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    rows: HashMap<String, PlayMetadata>,
}

impl MetadataTable {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata table {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let header: Vec<&str> = lines
            .next()
            .context("metadata table is empty")?
            .split('\t')
            .map(str::trim)
            .collect();

        let column = |name: &str| header.iter().position(|h| *h == name);
        let index_col = column("index").context("metadata table has no 'index' column")?;
        let title_col = column("title");
        let last_col = column("last_name");
        let first_col = column("first_name");
        let date_col = column("creation_date").or_else(|| column("date"));
        let acts_col = column("num_acts");
        let iambs_col = column("free_iambs");

        let mut rows = HashMap::new();
        for (line_no, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let field = |col: Option<usize>| {
                col.and_then(|c| fields.get(c).copied())
                    .filter(|value| !value.is_empty())
            };

            let index = field(Some(index_col))
                .with_context(|| format!("row {} has no index", line_no + 2))?
                .to_string();
            let num_acts = match field(acts_col) {
                Some(raw) => Some(parse_count(raw).with_context(|| {
                    format!("row {}: invalid num_acts '{}'", line_no + 2, raw)
                })?),
                None => None,
            };

            let row = PlayMetadata {
                index: index.clone(),
                title: field(title_col).unwrap_or_default().to_string(),
                last_name: field(last_col).unwrap_or_default().to_string(),
                first_name: field(first_col).map(str::to_string),
                creation_date: field(date_col).map(date_value).unwrap_or(Value::Null),
                num_acts,
                free_iambs: field(iambs_col).map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true")),
            };
            rows.insert(index, row);
        }
        Ok(Self { rows })
    }

    pub fn get(&self, index: &str) -> Result<&PlayMetadata, PlayError> {
        self.rows.get(index).ok_or_else(|| PlayError::MissingMetadata {
            index: index.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Spreadsheet exports write integer columns as "5.0".
fn parse_count(raw: &str) -> Result<usize> {
    if let Ok(n) = raw.parse::<usize>() {
        return Ok(n);
    }
    let float: f64 = raw.parse()?;
    if float.fract() != 0.0 || float < 0.0 {
        anyhow::bail!("not a whole number");
    }
    Ok(float as usize)
}

/// Years become numbers; anything else stays a string, empty becomes null.
pub fn date_value(raw: &str) -> Value {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(year) => Value::from(year),
        Err(_) if raw.is_empty() => Value::Null,
        Err(_) => Value::from(raw),
    }
}
