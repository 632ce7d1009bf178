//! Per-format capability objects.
//!
//! Every input format runs the same scene pipeline; what differs between
//! them (boundary words, "same as before" phrases, exclusion words, how a
//! speaker cue looks, where a scene's cast is written) lives in a [`Dialect`]
//! value that is built once at the entry point and only borrowed afterwards.

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::config::{DialectOverrides, InputFormat};

/// Speaker-name pattern of the hand-tagged Russian texts.
pub const RUSSIAN_CUE_PATTERN: &str = r"[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+\w[А-Я+Ѣ+І]|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+ [А-Я+Ѣ+І] |[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+ [А-Я+Ѣ+І]";

/// Character-name pattern for lines of the dramatis personae.
pub const RUSSIAN_CAST_LINE_PATTERN: &str = r"[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+ [А-Я+Ѣ+І] |[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+|[А-Я+Ѣ+І]+.\w[А-Я+Ѣ+І]+";

/// Where the resolver finds the text that declares a scene's cast.
#[derive(Debug, Clone, PartialEq)]
pub enum CastLocation {
    /// The scene carries a delimited list of names (`<cast A, B>`, Word lines).
    ExplicitList { separator: String },
    /// Extra and complex scenes carry a `cast` annotation; regular scenes
    /// declare their cast in the stage text after the heading.
    AnnotationOrStage { stage: StageSource },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageSource {
    /// Everything between the scene heading and the first speech.
    LeadingText,
    /// The first stage direction of the scene.
    FirstStage,
}

/// How a canonical name is recognised inside a cast substring.
#[derive(Debug, Clone, PartialEq)]
pub enum NameMatching {
    Substring,
    /// A single occurrence of a surname-like name followed by a case ending
    /// belongs to a different character (e.g. the wife "Фамусова").
    InflectionAware { surname_suffixes: Vec<String> },
}

#[derive(Debug, Clone)]
pub enum CueSource {
    /// Speaker names are found in the scene body by a regex; the first
    /// capture group is the name when the pattern has one.
    NamePattern(Regex),
    /// Speaker ids come pre-extracted from `who`-like attributes.
    SpeakerAttribute {
        separator: Option<char>,
        id_prefix: Option<char>,
    },
}

/// How the syntactic scene status is read from a scene heading.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusRule {
    /// Inline tags: `<no_change_SCENE>` and the `SCENE>` suffix of `<extra_SCENE>`.
    Tags { extra: String, no_change: String },
    /// Word transcripts: "SCENE 3" is regular, "SCENE 3 *" is no_change and
    /// an unnumbered heading is extra.
    NumberedHeading { no_change_flag: char },
    /// TEI: the `type` attribute of the scene element.
    DivType,
}

#[derive(Debug, Clone)]
pub struct BoundaryMarkers {
    pub act: String,
    pub scene: String,
    pub extra_scene: Option<String>,
    /// `<scene>`, bare `scene` or the extra-scene marker, leftmost first.
    pub scene_boundary: Regex,
}

impl BoundaryMarkers {
    pub fn new(act: &str, scene: &str, extra_scene: Option<&str>) -> Self {
        let mut alternatives = vec![regex::escape(&format!("<{}>", scene)), regex::escape(scene)];
        alternatives.extend(extra_scene.map(regex::escape));
        Self {
            act: act.to_string(),
            scene: scene.to_string(),
            extra_scene: extra_scene.map(str::to_string),
            scene_boundary: Regex::new(&alternatives.join("|")).expect("escaped boundary markers"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dialect {
    pub format: InputFormat,
    pub markers: BoundaryMarkers,
    pub status_rule: StatusRule,
    pub cast_location: CastLocation,
    pub name_matching: NameMatching,
    pub cue_source: CueSource,
    pub cast_line_pattern: Option<Regex>,
    pub carry_over_phrases: Vec<String>,
    pub exclusion_markers: Vec<String>,
    /// Use the speakers as the cast when a scene declares none.
    pub infer_cast_from_speakers: bool,
    /// Count a speaking collective character with its collective number.
    pub weight_speakers_by_collective_number: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Dialect {
    pub fn plain_text(old_orthography: bool) -> Self {
        let (act, scene) = if old_orthography {
            ("ДѢЙСТВІЕ", "ЯВЛЕНІЕ")
        } else {
            ("ДЕЙСТВИЕ", "ЯВЛЕНИЕ")
        };
        Self {
            format: InputFormat::Txt,
            markers: BoundaryMarkers::new(act, scene, Some("<extra")),
            status_rule: StatusRule::Tags {
                extra: "SCENE>".to_string(),
                no_change: "<no_change_SCENE>".to_string(),
            },
            cast_location: CastLocation::ExplicitList {
                separator: ", ".to_string(),
            },
            name_matching: NameMatching::Substring,
            cue_source: CueSource::NamePattern(
                Regex::new(RUSSIAN_CUE_PATTERN).expect("built-in cue pattern"),
            ),
            cast_line_pattern: Some(
                Regex::new(RUSSIAN_CAST_LINE_PATTERN).expect("built-in cast pattern"),
            ),
            carry_over_phrases: Vec::new(),
            exclusion_markers: Vec::new(),
            infer_cast_from_speakers: false,
            weight_speakers_by_collective_number: false,
        }
    }

    pub fn french_tei() -> Self {
        Self {
            format: InputFormat::FrenchTei,
            markers: BoundaryMarkers::new("div1", "div2", None),
            status_rule: StatusRule::DivType,
            cast_location: CastLocation::AnnotationOrStage {
                stage: StageSource::LeadingText,
            },
            name_matching: NameMatching::Substring,
            cue_source: CueSource::SpeakerAttribute {
                separator: Some(','),
                id_prefix: None,
            },
            cast_line_pattern: None,
            carry_over_phrases: strings(&["précédent", "precedent", "même"]),
            exclusion_markers: strings(&["excepté", "moins"]),
            infer_cast_from_speakers: true,
            weight_speakers_by_collective_number: false,
        }
    }

    pub fn russian_tei() -> Self {
        Self {
            format: InputFormat::RussianTei,
            markers: BoundaryMarkers::new("div", "div", None),
            status_rule: StatusRule::DivType,
            cast_location: CastLocation::AnnotationOrStage {
                stage: StageSource::FirstStage,
            },
            name_matching: NameMatching::InflectionAware {
                surname_suffixes: strings(&["ин", "ов", "ев", "аф"]),
            },
            cue_source: CueSource::SpeakerAttribute {
                separator: None,
                id_prefix: Some('#'),
            },
            cast_line_pattern: None,
            carry_over_phrases: strings(&["те же", "прежние", "те ж", "тот же", "та же"]),
            exclusion_markers: Vec::new(),
            infer_cast_from_speakers: true,
            weight_speakers_by_collective_number: false,
        }
    }

    pub fn word() -> Self {
        Self {
            format: InputFormat::Word,
            markers: BoundaryMarkers::new("ACTE", "SCENE", None),
            status_rule: StatusRule::NumberedHeading { no_change_flag: '*' },
            cast_location: CastLocation::ExplicitList {
                separator: "\n".to_string(),
            },
            name_matching: NameMatching::Substring,
            cue_source: CueSource::SpeakerAttribute {
                separator: None,
                id_prefix: None,
            },
            cast_line_pattern: None,
            carry_over_phrases: Vec::new(),
            exclusion_markers: Vec::new(),
            infer_cast_from_speakers: false,
            weight_speakers_by_collective_number: true,
        }
    }

    /// Built-in dialect for a format; plain text depends on the orthography.
    pub fn for_format(format: InputFormat, old_orthography: bool) -> Self {
        match format {
            InputFormat::Txt => Self::plain_text(old_orthography),
            InputFormat::FrenchTei => Self::french_tei(),
            InputFormat::RussianTei => Self::russian_tei(),
            InputFormat::Word => Self::word(),
        }
    }

    pub fn with_overrides(mut self, overrides: &DialectOverrides) -> Result<Self> {
        if let Some(pattern) = &overrides.name_pattern {
            self = self.with_name_pattern(pattern)?;
        }
        if let Some(pattern) = &overrides.cast_line_pattern {
            self = self.with_cast_line_pattern(pattern)?;
        }
        if let Some(phrases) = &overrides.carry_over_phrases {
            self.carry_over_phrases = phrases.clone();
        }
        if let Some(markers) = &overrides.exclusion_markers {
            self.exclusion_markers = markers.clone();
        }
        Ok(self)
    }

    /// Replaces the speaker-cue pattern of a free-text dialect.
    pub fn with_name_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("invalid name pattern '{}'", pattern))?;
        if let CueSource::NamePattern(_) = self.cue_source {
            self.cue_source = CueSource::NamePattern(regex);
        }
        Ok(self)
    }

    pub fn with_cast_line_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("invalid cast line pattern '{}'", pattern))?;
        self.cast_line_pattern = Some(regex);
        Ok(self)
    }

    /// The carry-over phrase present in `cast_text`, if any.
    pub fn carry_over_in(&self, cast_text: &str) -> Option<&str> {
        self.carry_over_phrases
            .iter()
            .find(|phrase| cast_text.contains(phrase.as_str()))
            .map(String::as_str)
    }
}
