//! Word transcripts: a "LES ACTEURS" block, then acts and scenes where every
//! scene lists the characters on stage one per line.

use anyhow::{Context, Result};
use roxmltree::Document;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::core::error::PlayError;
use crate::services::dialect::Dialect;
use crate::services::features::TextMetrics;
use crate::services::ingest::ParsedPlay;
use crate::services::registry::{build_registry, parse_actor_line};
use crate::services::segmenter::RawScene;

const ACTORS_HEADING: &str = "LES ACTEURS";
const SILENT_MARKER: &str = "МОЛЧИТ";
const NOISE: [char; 4] = ['-', '–', '*', '/'];

pub fn parse(content: &[u8], dialect: &Dialect) -> Result<ParsedPlay> {
    let text = document_text(content)?;
    parse_text(&text, dialect)
}

/// Paragraph texts of `word/document.xml`, one per line.
pub fn document_text(content: &[u8]) -> Result<String> {
    let mut archive =
        ZipArchive::new(Cursor::new(content)).context("DOCX is not a valid ZIP archive")?;
    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX missing word/document.xml")?
        .read_to_string(&mut document_xml)
        .context("failed to read word/document.xml")?;

    let doc = Document::parse(&document_xml).context("failed to parse DOCX XML")?;
    let paragraphs: Vec<String> = doc
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "p")
        .map(|paragraph| {
            paragraph
                .descendants()
                .filter(|node| node.is_element() && node.tag_name().name() == "t")
                .filter_map(|node| node.text())
                .collect::<String>()
        })
        .collect();
    Ok(paragraphs.join("\n"))
}

pub fn parse_text(text: &str, dialect: &Dialect) -> Result<ParsedPlay> {
    let text = text.replace("\n\n", "\n");
    let act_marker = dialect.markers.act.as_str();
    let first_act = format!("{} 1", act_marker);

    // "LES ACTEURS" itself contains the act marker
    let start = text
        .find(&first_act)
        .ok_or_else(|| PlayError::Malformed(format!("no '{}' heading", first_act)))?;
    let listing_start = text
        .find(ACTORS_HEADING)
        .map(|pos| pos + ACTORS_HEADING.len())
        .filter(|pos| *pos <= start)
        .ok_or_else(|| PlayError::Malformed(format!("no '{}' block", ACTORS_HEADING)))?;
    let registry = build_registry(text[listing_start..start].lines().filter_map(parse_actor_line))?;

    let acts = text[start..]
        .split(act_marker)
        .filter(|act| !is_noise(act))
        .map(|act| {
            act.split(dialect.markers.scene.as_str())
                .skip(1)
                .map(|chunk| scene_from_listing(chunk.trim()))
                .collect()
        })
        .collect();

    Ok(ParsedPlay {
        registry,
        acts,
        metrics: TextMetrics::default(),
        bibliography: None,
    })
}

fn is_noise(text: &str) -> bool {
    text.trim().chars().all(|c| matches!(c, '-' | '–' | '/'))
}

/// One scene: its heading line and the names on stage, silent ones marked.
pub fn scene_from_listing(chunk: &str) -> RawScene {
    let heading = chunk.lines().next().unwrap_or_default().to_string();
    let mut present = Vec::new();
    let mut speaking = Vec::new();
    for line in chunk.lines() {
        let (name, silent) = clean_name(line);
        if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if !silent {
            speaking.push(name.clone());
        }
        present.push(name);
    }
    RawScene {
        heading,
        cast_text: Some(present.join("\n")),
        cues: speaking,
        ..Default::default()
    }
}

fn clean_name(line: &str) -> (String, bool) {
    let name: String = line.chars().filter(|c| !NOISE.contains(c)).collect();
    let upper = name.to_uppercase();
    if upper.contains(SILENT_MARKER) {
        (upper.replace(SILENT_MARKER, "").trim().to_string(), true)
    } else {
        (name.trim().to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::SceneStatus;
    use crate::services::pipeline::ScenePipeline;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const PARAGRAPHS: [&str; 21] = [
        "L'AVARE",
        "LES ACTEURS",
        "HARPAGON",
        "CLEANTE",
        "VALETS 2",
        "-",
        "ACTE 1",
        "SCENE 1",
        "HARPAGON",
        "CLEANTE молчит",
        "SCENE 2 *",
        "HARPAGON",
        "– CLEANTE",
        "SCENE",
        "HARPAGON",
        "CLEANTE",
        "VALETS",
        "",
        "ACTE 2",
        "SCENE 1",
        "VALETS",
    ];

    fn docx(paragraphs: &[&str]) -> Result<Vec<u8>> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("word/document.xml", SimpleFileOptions::default())?;
        writer.write_all(xml.as_bytes())?;
        Ok(writer.finish()?.into_inner())
    }

    #[test]
    fn test_document_text() -> Result<()> {
        let text = document_text(&docx(&["ACTE 1", "SCENE 1", "HARPAGON"])?)?;
        assert_eq!(text, "ACTE 1\nSCENE 1\nHARPAGON");
        assert!(document_text(b"not a zip").is_err());
        Ok(())
    }

    #[test]
    fn test_scene_listing() {
        let scene = scene_from_listing("2 *\nHARPAGON\nCLEANTE МОЛЧИТ\n/");
        assert_eq!(scene.heading, "2 *");
        assert_eq!(scene.cast_text.as_deref(), Some("HARPAGON\nCLEANTE"));
        assert_eq!(scene.cues, vec!["HARPAGON"]);
    }

    #[test]
    fn test_parse_play() -> Result<()> {
        let dialect = Dialect::word();
        let play = parse(&docx(&PARAGRAPHS)?, &dialect)?;

        assert_eq!(play.registry.names().collect::<Vec<_>>(), vec!["HARPAGON", "CLEANTE", "VALETS"]);
        assert_eq!(
            play.registry.get("VALETS").and_then(|c| c.collective_number),
            Some(2)
        );
        assert_eq!(play.acts.len(), 2);

        let output = ScenePipeline::new(&play.registry, &dialect).run(play.acts, Some(2))?;
        let scenes: Vec<_> = output.summary.scenes().collect();
        assert_eq!(scenes.len(), 4);

        assert_eq!(scenes[0].label(), "1_regular");
        assert_eq!(scenes[0].record.count("CLEANTE"), Some(0));
        assert_eq!(scenes[0].record.perc_non_speakers, 50.0);
        assert_eq!(scenes[1].label(), "2_no_change");
        assert_eq!(scenes[2].label(), "2.1_extra");
        // VALETS speak as two
        assert_eq!(scenes[2].record.num_speakers, 4);
        assert_eq!(scenes[3].record.count("VALETS"), Some(1));
        assert_eq!(scenes[3].status, SceneStatus::Regular);
        Ok(())
    }

    #[test]
    fn test_missing_first_act() {
        let err = parse_text("LES ACTEURS\nHARPAGON\n", &Dialect::word()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlayError>(),
            Some(PlayError::Malformed(_))
        ));
    }
}
