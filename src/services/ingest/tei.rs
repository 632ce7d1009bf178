//! TEI XML plays. French files use `div1`/`div2` and `castItem`; Russian
//! (DraCor-style) files use nested `div` and `person`. Element names are
//! compared case-insensitively.

use anyhow::{Context, Result};
use roxmltree::{Document, Node, ParsingOptions};
use serde_json::Value;

use crate::core::error::PlayError;
use crate::core::metadata::date_value;
use crate::core::state::Character;
use crate::services::dialect::{CastLocation, Dialect, StageSource};
use crate::services::features::{SceneLinks, StageMetrics, TextMetrics, VerseMetrics};
use crate::services::ingest::{Bibliography, ParsedPlay};
use crate::services::registry::build_registry;
use crate::services::segmenter::RawScene;
use crate::utils::text::count_word_tokens;

const SCENE_TYPES: [&str; 3] = ["scene", "extra_scene", "complex_scene"];
const RHYME_LOOKBACK: usize = 10;

/// Line parts that continue a verse line started earlier.
const FRENCH_CONTINUATION_PARTS: [&str; 2] = ["m", "i"];
const RUSSIAN_CONTINUATION_PARTS: [&str; 2] = ["M", "F"];

fn is(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.descendants().filter(move |n| is(n, name))
}

fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn xml_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((roxmltree::NS_XML_URI, "id"))
        .or_else(|| node.attribute("id"))
}

fn collective_number(node: Node) -> Option<u32> {
    elements(node, "collective_number")
        .next()
        .and_then(|n| text_of(n).parse().ok())
}

fn parse_document(text: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options).context("failed to parse TEI XML")
}

/// Scene elements of every act, in document order.
fn scene_elements<'a, 'input>(
    root: Node<'a, 'input>,
    dialect: &'a Dialect,
) -> Vec<Vec<Node<'a, 'input>>> {
    elements(root, &dialect.markers.act)
        .filter(|act| act.attribute("type") == Some("act"))
        .map(|act| {
            elements(act, &dialect.markers.scene)
                .filter(|scene| {
                    scene
                        .attribute("type")
                        .is_some_and(|kind| SCENE_TYPES.contains(&kind))
                })
                .collect()
        })
        .collect()
}

fn raw_scene(scene: Node, dialect: &Dialect) -> RawScene {
    let cast_text = match &dialect.cast_location {
        CastLocation::AnnotationOrStage {
            stage: StageSource::FirstStage,
        } => elements(scene, "stage").next().map(text_of),
        _ => Some(leading_text(scene)),
    };
    RawScene {
        heading: scene.attribute("type").unwrap_or_default().to_string(),
        annotation: scene.attribute("cast").map(str::to_string),
        cast_text,
        body: String::new(),
        cues: elements(scene, "sp")
            .filter_map(|sp| sp.attribute("who"))
            .map(str::to_string)
            .collect(),
    }
}

/// Text of a scene up to its first speech.
fn leading_text(scene: Node) -> String {
    let mut text = String::new();
    for node in scene.descendants().skip(1) {
        if is(&node, "sp") {
            break;
        }
        if let Some(chunk) = node.text().filter(|_| node.is_text()) {
            text.push_str(chunk);
        }
    }
    text.trim().to_string()
}

fn verse_lines(root: Node, continuation_parts: &[&str]) -> u32 {
    elements(root, "l")
        .filter(|line| {
            !line
                .attribute("part")
                .is_some_and(|part| {
                    continuation_parts
                        .iter()
                        .any(|cont| cont.eq_ignore_ascii_case(part))
                })
        })
        .count() as u32
}

pub fn parse_french(text: &str, dialect: &Dialect) -> Result<ParsedPlay> {
    let doc = parse_document(text)?;
    let root = doc.root_element();

    let registry = build_registry(elements(root, "castItem").filter_map(|item| {
        let role = elements(item, "role").next()?;
        let name = text_of(role);
        if name.is_empty() {
            return None;
        }
        Some(
            Character::new(name)
                .with_aliases(xml_id(role))
                .with_collective_number(collective_number(item)),
        )
    }))?;

    let scenes = scene_elements(root, dialect);
    if scenes.is_empty() {
        return Err(PlayError::Malformed("no act divisions".to_string()).into());
    }
    let acts = scenes
        .into_iter()
        .map(|scenes| scenes.into_iter().map(|s| raw_scene(s, dialect)).collect())
        .collect();

    let metrics = TextMetrics {
        verse: Some(VerseMetrics {
            total_utterances: Some(elements(root, "sp").count() as u32),
            verse_lines: verse_lines(root, &FRENCH_CONTINUATION_PARTS),
            scene_links: None,
        }),
        stage: None,
    };

    Ok(ParsedPlay {
        registry,
        acts,
        metrics,
        bibliography: french_bibliography(root),
    })
}

fn french_bibliography(root: Node) -> Option<Bibliography> {
    let title = elements(root, "titlePart").next().map(text_of)?;
    let author = elements(root, "docAuthor")
        .next()
        .and_then(xml_id)
        .unwrap_or_default()
        .to_string();
    let creation_date = elements(root, "docDate")
        .next()
        .map(|date| date_value(&text_of(date).replace('.', "")))
        .unwrap_or(Value::Null);
    Some(Bibliography {
        title,
        author,
        creation_date,
    })
}

pub fn parse_russian(text: &str, dialect: &Dialect) -> Result<ParsedPlay> {
    let doc = parse_document(text)?;
    let root = doc.root_element();

    let registry = build_registry(elements(root, "person").filter_map(|person| {
        let name = text_of(elements(person, "persName").next()?);
        if name.is_empty() {
            return None;
        }
        Some(
            Character::new(name)
                .with_aliases(xml_id(person))
                .with_collective_number(collective_number(person)),
        )
    }))?;

    let scenes = scene_elements(root, dialect);
    if scenes.is_empty() {
        return Err(PlayError::Malformed("no act divisions".to_string()).into());
    }
    let all_scenes: Vec<Node> = scenes.iter().flatten().copied().collect();
    let stages: Vec<Node> = elements(root, "stage").collect();

    let metrics = TextMetrics {
        verse: Some(VerseMetrics {
            total_utterances: Some(elements(root, "sp").count() as u32),
            verse_lines: verse_lines(root, &RUSSIAN_CONTINUATION_PARTS),
            scene_links: Some(russian_scene_links(text, &all_scenes)),
        }),
        stage: Some(StageMetrics {
            count: stages.len() as u32,
            word_tokens: stages.iter().map(|s| count_word_tokens(&text_of(*s))).sum(),
            verse_splitting: verse_splitting_stages(root),
        }),
    };

    let acts = scenes
        .into_iter()
        .map(|scenes| scenes.into_iter().map(|s| raw_scene(s, dialect)).collect())
        .collect();

    Ok(ParsedPlay {
        registry,
        acts,
        metrics,
        bibliography: russian_bibliography(root),
    })
}

fn russian_scene_links(source: &str, scenes: &[Node]) -> SceneLinks {
    let mut links = SceneLinks {
        open: Some(0),
        scenes: Some(scenes.len()),
        ..SceneLinks::default()
    };
    for scene in scenes {
        let lines: Vec<Node> = elements(*scene, "l").collect();
        let Some(last) = lines.last() else {
            continue;
        };
        let split = last
            .attribute("part")
            .is_some_and(|part| part.contains('M') || part.contains('I'));
        let rhyme = lines[lines.len().saturating_sub(RHYME_LOOKBACK)..]
            .iter()
            .any(|line| source[line.range()].contains("interscene"));

        if split {
            links.split_verse += 1;
        }
        if rhyme {
            links.split_rhymes += 1;
        }
        if split && rhyme {
            links.both += 1;
        }
        if split || rhyme {
            links.open = links.open.map(|open| open + 1);
        }
    }
    links
}

/// Stage directions inside a verse line, including those between the parts
/// of a line split across speakers.
fn verse_splitting_stages(root: Node) -> u32 {
    let lines: Vec<Node> = elements(root, "l").collect();
    let stages: Vec<Node> = elements(root, "stage").collect();

    let starts: Vec<usize> = lines
        .iter()
        .filter(|line| matches!(line.attribute("part"), None | Some("I")))
        .map(|line| line.range().start)
        .collect();

    let mut total = 0;
    for (index, start) in starts.iter().enumerate() {
        let next = starts.get(index + 1).copied().unwrap_or(usize::MAX);
        let Some(end) = lines
            .iter()
            .filter(|line| (*start..next).contains(&line.range().start))
            .map(|line| line.range().end)
            .max()
        else {
            continue;
        };
        total += stages
            .iter()
            .filter(|stage| stage.range().start > *start && stage.range().end <= end)
            .count() as u32;
    }
    total
}

fn russian_bibliography(root: Node) -> Option<Bibliography> {
    let title = elements(root, "title")
        .find(|t| t.attribute("type") == Some("main"))
        .map(text_of)?;
    let author = elements(root, "author").next().map(text_of).unwrap_or_default();
    let dated = |kind: &str| {
        elements(root, "date")
            .find(|d| d.attribute("type") == Some(kind))
            .and_then(|d| d.attribute("when"))
            .map(date_value)
    };
    let creation_date = dated("written")
        .or_else(|| dated("premiere"))
        .unwrap_or(Value::Null);
    Some(Bibliography {
        title,
        author,
        creation_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::SceneStatus;
    use crate::services::pipeline::ScenePipeline;

    const FRENCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader/>
  <text>
    <front>
      <titlePart type="main">L'Étourdi</titlePart>
      <docAuthor id="MOLIERE">Molière</docAuthor>
      <docDate when="1655">1655.</docDate>
      <castList>
        <castItem><role xml:id="filipin">FILIPIN</role></castItem>
        <castItem><role xml:id="oronte">ORONTE</role></castItem>
        <castItem><role xml:id="celie">CELIE</role></castItem>
        <castItem><role xml:id="valets">VALETS</role><collective_number>2</collective_number></castItem>
      </castList>
    </front>
    <body>
      <div1 type="act" n="1">
        <div2 type="scene" n="1">
          <head>SCENE PREMIERE.</head>
          <stage>Filipin, Oronte, Celie.</stage>
          <sp who="filipin"><l>Un vers entier.</l></sp>
          <sp who="oronte"><l part="I">Début</l></sp>
          <sp who="celie"><l part="F">fin.</l></sp>
        </div2>
        <div2 type="scene" n="2">
          <head>SCENE II.</head>
          <stage>Les mêmes, excepté Oronte.</stage>
          <sp who="filipin, celie"><l>Ensemble.</l></sp>
        </div2>
        <div2 type="extra_scene" cast="filipin, valets">
          <sp who="valets"><l>Nous voici.</l></sp>
        </div2>
      </div1>
    </body>
  </text>
</TEI>"#;

    const RUSSIAN: &str = r##"<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt>
        <title type="main">Горе от ума</title>
        <author>Грибоедов, Александр Сергеевич</author>
      </titleStmt>
    </fileDesc>
    <profileDesc>
      <particDesc>
        <listPerson>
          <person xml:id="famusov"><persName>Фамусов</persName></person>
          <person xml:id="liza"><persName>Лиза</persName></person>
          <person xml:id="sofia"><persName>Софья</persName></person>
        </listPerson>
      </particDesc>
    </profileDesc>
  </teiHeader>
  <standOff><listEvent><event type="premiere" when="1831"/></listEvent></standOff>
  <text>
    <front><docDate><date type="written" when="1824"/></docDate></front>
    <body>
      <div type="act">
        <div type="scene">
          <stage>Лиза и Софья.</stage>
          <sp who="#liza"><l>Светает!.. <stage>вздыхает</stage> Ах!</l></sp>
          <sp who="#sofia #liza"><l part="I">Который час?</l></sp>
          <stage>Часы бьют.</stage>
          <sp who="#liza"><l part="F" rhyme="interscene">Седьмой.</l></sp>
        </div>
        <div type="scene">
          <stage>Те же и Фамусов.</stage>
          <sp who="#famusov"><l part="I">Ну что?</l></sp>
        </div>
      </div>
    </body>
  </text>
</TEI>"##;

    #[test]
    fn test_french_play() -> Result<()> {
        let dialect = Dialect::french_tei();
        let play = parse_french(FRENCH, &dialect)?;

        assert_eq!(play.registry.len(), 4);
        assert_eq!(play.registry.resolve("valets"), Some("VALETS"));
        assert_eq!(
            play.registry.get("VALETS").and_then(|c| c.collective_number),
            Some(2)
        );
        assert_eq!(
            play.bibliography,
            Some(Bibliography {
                title: "L'Étourdi".to_string(),
                author: "MOLIERE".to_string(),
                creation_date: Value::from(1655),
            })
        );
        assert_eq!(
            play.acts[0][1].cast_text.as_deref(),
            Some("SCENE II.\n          Les mêmes, excepté Oronte.")
        );

        let verse = play.metrics.verse.as_ref().unwrap();
        assert_eq!(verse.total_utterances, Some(5));
        assert_eq!(verse.verse_lines, 4);
        assert!(verse.scene_links.is_none());
        assert!(play.metrics.stage.is_none());

        let output = ScenePipeline::new(&play.registry, &dialect).run(play.acts, Some(1))?;
        let scenes: Vec<_> = output.summary.scenes().collect();
        assert_eq!(
            scenes[0].record.characters().collect::<Vec<_>>(),
            vec!["FILIPIN", "ORONTE", "CELIE"]
        );
        assert_eq!(
            scenes[1].record.characters().collect::<Vec<_>>(),
            vec!["FILIPIN", "CELIE"]
        );
        assert_eq!(scenes[1].record.count("CELIE"), Some(1));
        assert_eq!(scenes[2].label(), "2.1_extra");
        assert_eq!(
            scenes[2].record.characters().collect::<Vec<_>>(),
            vec!["FILIPIN", "VALETS"]
        );
        assert!(output.mismatches.is_empty());
        Ok(())
    }

    #[test]
    fn test_russian_play() -> Result<()> {
        let dialect = Dialect::russian_tei();
        let play = parse_russian(RUSSIAN, &dialect)?;

        assert_eq!(play.registry.resolve("famusov"), Some("Фамусов"));
        let bibliography = play.bibliography.clone().unwrap();
        assert_eq!(bibliography.title, "Горе от ума");
        assert_eq!(bibliography.creation_date, Value::from(1824));

        let verse = play.metrics.verse.as_ref().unwrap();
        assert_eq!(verse.total_utterances, Some(4));
        // the closing part "F" does not start a new line
        assert_eq!(verse.verse_lines, 3);
        let links = verse.scene_links.as_ref().unwrap();
        assert_eq!(links.scenes, Some(2));
        assert_eq!(links.split_rhymes, 1);
        assert_eq!(links.split_verse, 1);
        assert_eq!(links.both, 0);
        assert_eq!(links.open, Some(2));

        let stage = play.metrics.stage.as_ref().unwrap();
        assert_eq!(stage.count, 4);
        assert_eq!(stage.word_tokens, 10);
        // inside the first line, and between the two parts of the split line
        assert_eq!(stage.verse_splitting, 2);

        let output = ScenePipeline::new(&play.registry, &dialect).run(play.acts, None)?;
        let scenes: Vec<_> = output.summary.scenes().collect();
        assert_eq!(scenes[0].record.count("Лиза"), Some(3));
        assert_eq!(scenes[0].record.count("Софья"), Some(1));
        assert_eq!(
            scenes[1].record.characters().collect::<Vec<_>>(),
            vec!["Фамусов", "Лиза", "Софья"]
        );
        assert_eq!(scenes[1].status, SceneStatus::Regular);
        Ok(())
    }

    #[test]
    fn test_russian_without_acts_is_malformed() {
        let err = parse_russian("<TEI><text><body/></text></TEI>", &Dialect::russian_tei())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlayError>(),
            Some(PlayError::Malformed(_))
        ));
    }
}
