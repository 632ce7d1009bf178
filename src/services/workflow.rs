use crate::core::config::{Config, InputFormat};
use crate::core::io::Storage;
use crate::core::metadata::{MetadataTable, PlayMetadata};
use crate::core::state::{CharacterRegistry, PlaySummary};
use crate::services::dialect::Dialect;
use crate::services::features::{self, PlayFeatures};
use crate::services::ingest::{self, Bibliography};
use crate::services::pipeline::ScenePipeline;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Everything written for one play.
#[derive(Debug, Clone, Serialize)]
pub struct PlayData {
    /// Metadata index, also the output file stem.
    #[serde(skip)]
    pub index: String,
    pub title: String,
    pub author: String,
    pub creation_date: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_iambs: Option<bool>,
    pub characters: CharacterRegistry,
    pub play_summary: PlaySummary,
    pub metadata: PlayFeatures,
}

/// Runs a single play from raw bytes to `PlayData`.
pub struct PlayProcessor<'a> {
    config: &'a Config,
    table: Option<&'a MetadataTable>,
}

impl<'a> PlayProcessor<'a> {
    pub fn new(config: &'a Config, table: Option<&'a MetadataTable>) -> Self {
        Self { config, table }
    }

    pub fn format_of(&self, path: &str, content: &[u8]) -> Option<InputFormat> {
        self.config
            .format
            .or_else(|| ingest::detect_format(path, content))
    }

    pub fn process(&self, path: &str, content: &[u8]) -> Result<PlayData> {
        let format = self
            .format_of(path, content)
            .with_context(|| format!("cannot tell the format of {}", path))?;
        let old_orthography = format == InputFormat::Txt
            && ingest::is_old_orthography(&String::from_utf8_lossy(content));
        let dialect =
            Dialect::for_format(format, old_orthography).with_overrides(&self.config.dialect)?;

        let play = ingest::parse(content, &dialect)
            .with_context(|| format!("failed to read play {}", path))?;

        let index = metadata_index(path, format);
        let row = self.metadata_row(&index, format)?;

        let output = ScenePipeline::new(&play.registry, &dialect)
            .run(play.acts, row.and_then(|r| r.num_acts))?;
        if !output.mismatches.is_empty() {
            info!(
                "{}: {} scenes with speakers outside their cast",
                index,
                output.mismatches.len()
            );
        }

        let free_iambs = row.and_then(|r| r.free_iambs);
        let metadata = features::compute(
            &output.summary,
            &play.registry,
            &play.metrics,
            free_iambs.unwrap_or(false),
        );

        let use_table = self.config.requires_metadata(format);
        let bibliography = match (row, play.bibliography) {
            (Some(row), _) if use_table => from_row(row),
            (_, Some(bibliography)) => bibliography,
            (Some(row), None) => from_row(row),
            (None, None) => {
                warn!("{}: no title or author found", index);
                Bibliography {
                    title: index.clone(),
                    author: String::new(),
                    creation_date: Value::Null,
                }
            }
        };

        Ok(PlayData {
            index,
            title: bibliography.title,
            author: bibliography.author,
            creation_date: bibliography.creation_date,
            free_iambs,
            characters: play.registry,
            play_summary: output.summary,
            metadata,
        })
    }

    fn metadata_row(&self, index: &str, format: InputFormat) -> Result<Option<&'a PlayMetadata>> {
        if !self.config.requires_metadata(format) {
            return Ok(self.table.and_then(|table| table.get(index).ok()));
        }
        let table = self.table.with_context(|| {
            format!("{:?} plays need a metadata table (--metadata)", format)
        })?;
        Ok(Some(table.get(index)?))
    }
}

fn from_row(row: &PlayMetadata) -> Bibliography {
    Bibliography {
        title: row.title.clone(),
        author: row.author(),
        creation_date: row.creation_date.clone(),
    }
}

/// File stem; Word transcripts are indexed with an `F_` prefix.
pub fn metadata_index(path: &str, format: InputFormat) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match format {
        InputFormat::Word => format!("F_{}", stem.trim_start_matches("F_")),
        _ => stem,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Written output files.
    pub processed: Vec<String>,
    /// File name and reason of every play that failed.
    pub failed: Vec<(String, String)>,
}

pub struct BatchRunner<S: Storage> {
    config: Config,
    table: Option<MetadataTable>,
    storage: S,
}

impl<S: Storage> BatchRunner<S> {
    pub fn new(config: Config, table: Option<MetadataTable>, storage: S) -> Self {
        Self {
            config,
            table,
            storage,
        }
    }

    fn is_play_file(&self, path: &str) -> bool {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());
        match (self.config.format, extension.as_deref()) {
            (_, None) => false,
            (Some(format), Some(ext)) => ext == format.extension(),
            (None, Some(_)) => ingest::detect_format(path, b"").is_some(),
        }
    }

    pub fn run(&self) -> Result<BatchReport> {
        let entries: Vec<String> = self
            .storage
            .list(&self.config.input_folder)?
            .into_iter()
            .filter(|path| self.is_play_file(path))
            .collect();
        info!("Found {} plays in {}", entries.len(), self.config.input_folder);

        let processor = PlayProcessor::new(&self.config, self.table.as_ref());
        let mut report = BatchReport::default();

        let pb = ProgressBar::new(entries.len() as u64);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"));

        for path in &entries {
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());

            match self.process_file(&processor, path) {
                Ok(written) => {
                    info!("{} -> {}", name, written);
                    report.processed.push(written);
                }
                Err(e) => {
                    error!("Skipping {}: {:#}", name, e);
                    report.failed.push((name, format!("{:#}", e)));
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("Plays processed");

        Ok(report)
    }

    fn process_file(&self, processor: &PlayProcessor, path: &str) -> Result<String> {
        let content = self.storage.read(path)?;
        let data = processor.process(path, &content)?;
        let json = serde_json::to_string_pretty(&data)?;

        let out = Path::new(&self.config.output_folder).join(format!("{}.json", data.index));
        let out = out.to_string_lossy().to_string();
        self.storage.write(&out, json.as_bytes())?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PlayError;
    use crate::core::io::NativeStorage;
    use std::fs;

    fn play_error(err: &anyhow::Error) -> Option<&PlayError> {
        err.downcast_ref::<PlayError>()
    }

    const PLAY: &str = "ГОРЕ ОТ УМА
ДЕЙСТВУЮЩИЕ ЛИЦА
ФАМУСОВ <alternative_name ХОЗЯИН>
ЛИЗА
СЛУГИ <collective_number 3>
ДЕЙСТВИЕ 1
ЯВЛЕНИЕ 1
<cast ЛИЗА, ФАМУСОВ>
ЛИЗА светает!<end_verse_line> ах! <stage>уходит</stage> как скоро ночь<end_verse_line>
ХОЗЯИН лиза!<end_verse_line>
ЯВЛЕНИЕ 2
<cast ЛИЗА, СЛУГИ>
СЛУГИ идем<end_verse_line>
";

    const TABLE: &str = "index\ttitle\tlast_name\tfirst_name\tcreation_date\tnum_acts\tfree_iambs
gore\tГоре от ума\tГрибоедов\tАлександр\t1824\t1\t0
broken\tБез имени\tАноним\t\t1800\t1\t0
";

    fn config(dir: &Path) -> Config {
        Config {
            input_folder: dir.join("input").to_string_lossy().to_string(),
            output_folder: dir.join("output").to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_process_plain_text() -> Result<()> {
        let table = MetadataTable::parse(TABLE)?;
        let config = Config::default();
        let data = PlayProcessor::new(&config, Some(&table)).process("plays/gore.txt", PLAY.as_bytes())?;

        assert_eq!(data.index, "gore");
        assert_eq!(data.title, "Горе от ума");
        assert_eq!(data.author, "Грибоедов, Александр");
        assert_eq!(data.free_iambs, Some(false));
        // ФАМУСОВ, ЛИЗА and three servants
        assert_eq!(data.metadata.speakers.num_present_characters, 5);

        let json: Value = serde_json::from_str(&serde_json::to_string_pretty(&data)?)?;
        assert_eq!(json["creation_date"], 1824);
        assert_eq!(json["play_summary"]["act_1"]["1_regular"]["ФАМУСОВ"], 1);
        assert_eq!(json["play_summary"]["act_1"]["2_regular"]["num_speakers"], 1);
        assert_eq!(json["metadata"]["num_present_characters"], 5);
        assert!(json.get("index").is_none());
        Ok(())
    }

    #[test]
    fn test_missing_metadata_row() -> Result<()> {
        let table = MetadataTable::parse(TABLE)?;
        let config = Config::default();
        let err = PlayProcessor::new(&config, Some(&table))
            .process("plays/unknown.txt", PLAY.as_bytes())
            .unwrap_err();
        assert_eq!(
            play_error(&err),
            Some(&PlayError::MissingMetadata {
                index: "unknown".to_string()
            })
        );

        assert!(PlayProcessor::new(&config, None)
            .process("plays/gore.txt", PLAY.as_bytes())
            .is_err());
        Ok(())
    }

    #[test]
    fn test_metadata_index() {
        assert_eq!(metadata_index("in/gore.txt", InputFormat::Txt), "gore");
        assert_eq!(metadata_index("in/avare.docx", InputFormat::Word), "F_avare");
        assert_eq!(metadata_index("in/F_avare.docx", InputFormat::Word), "F_avare");
    }

    #[test]
    fn test_batch_isolates_failures() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config(dir.path());
        fs::create_dir_all(&config.input_folder)?;
        let input = Path::new(&config.input_folder);
        fs::write(input.join("gore.txt"), PLAY)?;
        fs::write(
            input.join("broken.txt"),
            PLAY.replace("СЛУГИ идем", "ЧАЦКИЙ идем"),
        )?;
        fs::write(input.join("notes.md"), "not a play")?;

        let runner = BatchRunner::new(config.clone(), Some(MetadataTable::parse(TABLE)?), NativeStorage::new());
        let report = runner.run()?;

        assert_eq!(report.processed.len(), 1);
        assert!(report.processed[0].ends_with("gore.json"));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken.txt");
        assert!(report.failed[0].1.contains("ЧАЦКИЙ"));

        let output = Path::new(&config.output_folder);
        assert!(output.join("gore.json").exists());
        assert!(!output.join("broken.json").exists());

        let written: Value = serde_json::from_str(&fs::read_to_string(output.join("gore.json"))?)?;
        assert_eq!(written["title"], "Горе от ума");
        assert_eq!(written["characters"]["СЛУГИ"]["collective_number"], 3);
        Ok(())
    }
}
