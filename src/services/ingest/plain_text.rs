//! Hand-tagged plain text: a dramatis personae block, `<cast …>` lists opening
//! each scene, `<stage>` directions and verse-line end tags.

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::error::{PlayError, PlayResult};
use crate::services::dialect::Dialect;
use crate::services::features::{SceneLinks, StageMetrics, TextMetrics, VerseMetrics};
use crate::services::ingest::{is_old_orthography, ParsedPlay};
use crate::services::registry::parse_cast_listing;
use crate::services::segmenter::{split_acts, split_scenes, RawScene};
use crate::utils::text::{count_word_tokens, remove_numbers, PUNCTUATION};

const END_VERSE: &str = "<end_verse_line>";
const END_VERSE_RHYME: &str = "<end_verse_line_interscene_rhyme>";
const STAGE_OPEN: &str = "<stage>";
const STAGE_PATTERN: &str = r"(?s)<stage>(.*?)</stage>";
const STAGE_PLACEHOLDER: &str = "STAGE";
const CAST_OPEN: &str = "<cast ";
const CAST_HEADING_WORD: &str = "ЛИЦА";

/// Markup that is neither speech nor stage text.
const LAYOUT_TAGS: [&str; 7] = [
    "extra_SCENE",
    "cast",
    "no_change_SCENE",
    "intermedia",
    "stage separator",
    "speaker_clarification",
    "speaking_character_no_utterance",
];

/// Scene headings and upper-case speaker names.
const ENTITY_PATTERN: &str = r"ЯВЛЕНІЕ +\w+|ЯВЛЕНИЕ +\w+|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+";

pub fn parse(text: &str, dialect: &Dialect) -> Result<ParsedPlay> {
    let (cast_text, play_text) = split_cast(text, is_old_orthography(text), &dialect.markers.act)?;
    let cast_pattern = dialect
        .cast_line_pattern
        .as_ref()
        .context("plain-text dialect has no cast line pattern")?;
    let registry = parse_cast_listing(cast_text, cast_pattern)?;

    let acts = split_acts(play_text, dialect)
        .into_iter()
        .map(|act| {
            split_scenes(act, dialect)
                .iter()
                .map(|chunk| scene_from_chunk(chunk))
                .collect()
        })
        .collect();

    let metrics = measure(play_text, cast_text, dialect)?;
    Ok(ParsedPlay {
        registry,
        acts,
        metrics,
        bibliography: None,
    })
}

/// Splits a play into its dramatis personae block and the text from the
/// first act marker on.
pub fn split_cast<'a>(
    text: &'a str,
    old_orthography: bool,
    act_marker: &str,
) -> PlayResult<(&'a str, &'a str)> {
    let acting = if old_orthography {
        "ДѢЙСТВУЮЩІЕ"
    } else {
        "ДЕЙСТВУЮЩИЕ"
    };
    let headings = [
        format!("{} ЛИЦА", acting),
        format!("{} <ЛИЦА>", acting),
        format!("<{}> ЛИЦА", acting),
        "ДѢЙСТВУЮЩIЯ ЛИЦА".to_string(),
    ];
    let start = headings
        .iter()
        .find_map(|heading| text.find(heading.as_str()))
        .ok_or_else(|| PlayError::Malformed("no dramatis personae heading".to_string()))?;
    let end = text
        .find(act_marker)
        .ok_or_else(|| PlayError::Malformed(format!("no '{}' marker", act_marker)))?;
    if end < start {
        return Err(PlayError::Malformed(
            "first act starts before the dramatis personae".to_string(),
        ));
    }

    let block = &text[start..end];
    let cast = block
        .find(CAST_HEADING_WORD)
        .map(|pos| &block[pos + CAST_HEADING_WORD.len()..])
        .and_then(|rest| rest.split(CAST_HEADING_WORD).next())
        .unwrap_or_default();
    Ok((cast, &text[end..]))
}

/// Heading before `<cast `, the list inside it and the scene text after it.
pub fn scene_from_chunk(chunk: &str) -> RawScene {
    let Some(start) = chunk.find(CAST_OPEN) else {
        return RawScene {
            heading: chunk.to_string(),
            body: chunk.to_string(),
            ..Default::default()
        };
    };
    let rest = &chunk[start + CAST_OPEN.len()..];
    let (listing, body) = match rest.find('>') {
        Some(end) => (&rest[..end], &rest[end + 1..]),
        None => (rest, ""),
    };
    RawScene {
        heading: chunk[..start].to_string(),
        cast_text: Some(listing.trim().to_string()),
        body: body.to_string(),
        ..Default::default()
    }
}

/// Compiled patterns of the tag markup.
struct Markup {
    entities: Regex,
    verse_end: Regex,
    stage: Regex,
}

impl Markup {
    fn new() -> Result<Self> {
        let verse_end = format!(
            "{}|{}",
            regex::escape(END_VERSE_RHYME),
            regex::escape(END_VERSE)
        );
        Ok(Self {
            entities: Regex::new(ENTITY_PATTERN).context("invalid entity pattern")?,
            verse_end: Regex::new(&verse_end).context("invalid verse end pattern")?,
            stage: Regex::new(STAGE_PATTERN).context("invalid stage pattern")?,
        })
    }

    /// Contents of every `<stage>…</stage>` pair, in order.
    fn stage_directions<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.stage
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect()
    }

    fn mask_stage_directions(&self, text: &str) -> String {
        let placeholder = format!(" {} ", STAGE_PLACEHOLDER);
        self.stage
            .replace_all(text, placeholder.as_str())
            .into_owned()
    }
}

fn measure(play_text: &str, cast_text: &str, dialect: &Dialect) -> Result<TextMetrics> {
    let markup = Markup::new()?;
    let verse_lines = (play_text.matches(END_VERSE).count()
        + play_text.matches(END_VERSE_RHYME).count()) as u32;

    let directions: Vec<&str> = markup
        .stage_directions(play_text)
        .into_iter()
        .chain(markup.stage_directions(cast_text))
        .collect();

    Ok(TextMetrics {
        verse: Some(VerseMetrics {
            total_utterances: None,
            verse_lines,
            scene_links: Some(scene_links(play_text, dialect, &markup)),
        }),
        stage: Some(StageMetrics {
            count: (play_text.matches(STAGE_OPEN).count() + cast_text.matches(STAGE_OPEN).count())
                as u32,
            word_tokens: directions.iter().map(|d| count_word_tokens(d)).sum(),
            verse_splitting: verse_splitting_directions(play_text, &markup),
        }),
    })
}

fn blank_out(text: &str, entities: &Regex) -> String {
    let found: Vec<String> = entities
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    let mut line: String = text
        .chars()
        .map(|c| {
            if PUNCTUATION.contains(c) || c == '\n' || c == '\t' {
                ' '
            } else {
                c
            }
        })
        .collect();
    for tag in LAYOUT_TAGS {
        line = line.replace(tag, " ");
    }
    for entity in &found {
        line = line.replace(entity.as_str(), " ");
    }
    line
}

fn strip_edge_placeholders(line: &str) -> &str {
    let mut line = line.trim();
    loop {
        if let Some(rest) = line.strip_suffix(STAGE_PLACEHOLDER) {
            line = rest.trim();
        } else if let Some(rest) = line.strip_prefix(STAGE_PLACEHOLDER) {
            line = rest.trim();
        } else {
            return line;
        }
    }
}

/// Stage directions standing inside a verse line rather than at its edges.
fn verse_splitting_directions(play_text: &str, markup: &Markup) -> u32 {
    markup
        .verse_end
        .split(play_text)
        .map(|line| {
            let masked = markup.mask_stage_directions(&remove_numbers(line));
            let cleaned = blank_out(&masked, &markup.entities);
            strip_edge_placeholders(&cleaned)
                .matches(STAGE_PLACEHOLDER)
                .count() as u32
        })
        .sum()
}

fn ends_verse_line(text: &str) -> bool {
    text.ends_with(END_VERSE) || text.ends_with(END_VERSE_RHYME)
}

/// Scenes whose last verse line or rhyme continues into the next scene.
fn scene_links(play_text: &str, dialect: &Dialect, markup: &Markup) -> SceneLinks {
    let mut links = SceneLinks::default();
    for scene in split_scenes(play_text, dialect) {
        if scene.contains(END_VERSE_RHYME) {
            links.split_rhymes += 1;
        }
        let mut cleaned = markup
            .mask_stage_directions(&remove_numbers(&scene))
            .trim()
            .to_string();
        if ends_verse_line(&cleaned) {
            continue;
        }
        cleaned.retain(|c| {
            !((PUNCTUATION.contains(c) && !matches!(c, '_' | '<' | '>')) || c == '\n' || c == '\t')
        });
        cleaned = cleaned.replace(STAGE_PLACEHOLDER, "");
        for entity in markup.entities.find_iter(&scene) {
            cleaned = cleaned.replace(entity.as_str(), "");
        }
        if !ends_verse_line(cleaned.trim()) {
            links.split_verse += 1;
            if cleaned.contains(END_VERSE_RHYME) {
                links.both += 1;
            }
        }
    }
    links
}
