//! Speaker cues → canonical speakers → per-character utterance counts.

use crate::core::error::{PlayError, PlayResult};
use crate::core::state::CharacterRegistry;
use crate::services::dialect::{CueSource, Dialect};
use crate::services::pipeline::SceneContext;
use crate::services::segmenter::Scene;

/// One speaker of one cue: the token as written and the character it names.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub token: String,
    pub speaker: String,
}

/// Raw speaker tokens of a scene in textual order; multi-speaker cues are
/// expanded to one token per speaker.
pub fn locate_cues(scene: &Scene, dialect: &Dialect) -> Vec<String> {
    match &dialect.cue_source {
        CueSource::NamePattern(pattern) => pattern
            .captures_iter(&scene.raw.body)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|token| !token.is_empty())
            .collect(),
        CueSource::SpeakerAttribute {
            separator,
            id_prefix,
        } => scene
            .raw
            .cues
            .iter()
            .flat_map(|who| expand_speakers(who, *separator, *id_prefix))
            .collect(),
    }
}

fn expand_speakers(who: &str, separator: Option<char>, id_prefix: Option<char>) -> Vec<String> {
    let parts: Vec<&str> = match (separator, id_prefix) {
        (Some(separator), _) => who.split(separator).collect(),
        (None, Some(_)) => who.split_whitespace().collect(),
        (None, None) => vec![who],
    };
    parts
        .into_iter()
        .map(str::trim)
        .map(|part| match id_prefix {
            Some(prefix) => part.trim_start_matches(prefix),
            None => part,
        })
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves every cue token; an unregistered token fails the play.
pub fn attribute(scene: &Scene, ctx: &SceneContext) -> PlayResult<Vec<Utterance>> {
    locate_cues(scene, ctx.dialect)
        .into_iter()
        .map(|token| match ctx.registry.resolve(&token) {
            Some(speaker) => Ok(Utterance {
                speaker: speaker.to_string(),
                token,
            }),
            None => Err(PlayError::UnknownSpeaker {
                name: token,
                scene: ctx.scene_label(scene),
            }),
        })
        .collect()
}

pub fn distinct_speakers(utterances: &[Utterance]) -> Vec<String> {
    let mut speakers: Vec<String> = Vec::new();
    for utterance in utterances {
        if !speakers.contains(&utterance.speaker) {
            speakers.push(utterance.speaker.clone());
        }
    }
    speakers
}

/// Utterance count for every cast member, in cast order.
///
/// Tokens equal to the canonical name are counted first; only when there are
/// none do the alias tokens count. A one-member cast always gets one utterance.
pub fn count_utterances(
    cast: &[String],
    utterances: &[Utterance],
    registry: &CharacterRegistry,
) -> Vec<(String, u32)> {
    if let [only] = cast {
        return vec![(only.clone(), 1)];
    }
    let occurrences = |token: &str| utterances.iter().filter(|u| u.token == token).count() as u32;

    cast.iter()
        .map(|name| {
            let mut count = occurrences(name);
            if count == 0 {
                if let Some(character) = registry.get(name) {
                    count = character
                        .alternative_names
                        .iter()
                        .map(|alias| occurrences(alias))
                        .sum();
                }
            }
            (name.clone(), count)
        })
        .collect()
}
