//! Play-level statistics computed from the summary and raw text metrics.
//!
//! Speaker features follow Iarkho's speech-distribution method; verse and
//! stage-direction features need counts only an adapter can take from the
//! text, passed in as [`TextMetrics`]. Every ratio whose denominator is zero
//! is serialized as `null`.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::core::state::{CharacterRegistry, PlaySummary, SceneStatus};
use crate::services::merger::{merge_no_change, MergeResult};
use crate::utils::text::{percentage, ratio, round_to};

/// Scaling applied to free-iamb verse line counts.
pub const FREE_IAMBS_SCALE: f64 = 0.796;

/// Raw counts taken from the play text by a format adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMetrics {
    pub verse: Option<VerseMetrics>,
    pub stage: Option<StageMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerseMetrics {
    /// Speech count from the markup; the summary total is used when absent.
    pub total_utterances: Option<u32>,
    pub verse_lines: u32,
    pub scene_links: Option<SceneLinks>,
}

/// Scenes tied to the next one by a shared verse line or rhyme.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLinks {
    pub split_verse: u32,
    pub split_rhymes: u32,
    pub both: u32,
    /// Counted directly by some adapters; otherwise split + rhymes - both.
    pub open: Option<u32>,
    /// Denominator for the percentages; the Iarkho scene count when absent.
    pub scenes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageMetrics {
    pub count: u32,
    pub word_tokens: u32,
    pub verse_splitting: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayFeatures {
    #[serde(flatten)]
    pub speakers: SpeakerFeatures,
    #[serde(flatten)]
    pub verse: Option<VerseFeatures>,
    #[serde(flatten)]
    pub stage: Option<StageFeatures>,
    #[serde(flatten)]
    pub discontinuity: DiscontinuityFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerFeatures {
    pub num_present_characters: u32,
    pub num_scenes_text: usize,
    pub num_scenes_iarkho: usize,
    pub speech_distribution: Vec<(u32, usize)>,
    pub percentage_monologues: Option<f64>,
    pub percentage_duologues: Option<f64>,
    pub percentage_non_duologues: Option<f64>,
    pub percentage_above_two_speakers: Option<f64>,
    pub av_percentage_non_speakers: Option<f64>,
    pub sigma_iarkho: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerseFeatures {
    pub total_utterances: u32,
    pub num_verse_lines: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescaled_num_verse_lines: Option<f64>,
    pub dialogue_vivacity: Option<f64>,
    #[serde(flatten)]
    pub scene_links: Option<SceneLinkFeatures>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneLinkFeatures {
    pub num_scenes_with_split_verse_lines: u32,
    pub num_scenes_with_split_rhymes: u32,
    pub percentage_scene_split_verse: Option<f64>,
    pub percentage_scene_split_rhymes: Option<f64>,
    pub num_scenes_with_split_rhymes_verses: u32,
    pub num_open_scenes: u32,
    pub percentage_open_scenes: Option<f64>,
    pub percentage_scenes_rhymes_split_verse: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFeatures {
    pub num_stage_directions: u32,
    pub stage_directions_frequency: Option<f64>,
    pub num_word_tokens_in_stage_directions: u32,
    pub average_length_of_stage_direction: Option<f64>,
    pub num_verse_splitting_stage_directions: u32,
    pub degree_of_verse_prose_interaction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscontinuityFeatures {
    pub number_scenes_with_discontinuous_change_characters: u32,
    pub percentage_scenes_with_discontinuous_change_characters: Option<f64>,
}

pub fn compute(
    summary: &PlaySummary,
    registry: &CharacterRegistry,
    metrics: &TextMetrics,
    free_iambs: bool,
) -> PlayFeatures {
    let speakers = speaker_features(summary, registry);
    let iarkho_scenes = speakers.num_scenes_iarkho;

    let verse = metrics
        .verse
        .as_ref()
        .map(|verse| verse_features(summary, verse, free_iambs, iarkho_scenes));
    let verse_lines = verse
        .as_ref()
        .map(|v| v.rescaled_num_verse_lines.unwrap_or(v.num_verse_lines as f64))
        .unwrap_or(0.0);
    let stage = metrics
        .stage
        .as_ref()
        .map(|stage| stage_features(stage, verse_lines));

    PlayFeatures {
        speakers,
        verse,
        stage,
        discontinuity: discontinuity(summary, iarkho_scenes),
    }
}

fn speaker_features(summary: &PlaySummary, registry: &CharacterRegistry) -> SpeakerFeatures {
    let merged = merge_no_change(summary);
    let distribution = speech_distribution(&merged);
    let total_scenes: usize = distribution.iter().map(|(_, scenes)| scenes).sum();
    let share = |keep: fn(u32) -> bool| {
        let scenes: usize = distribution
            .iter()
            .filter(|(speakers, _)| keep(*speakers))
            .map(|(_, scenes)| scenes)
            .sum();
        percentage(scenes as f64, total_scenes as f64, 2)
    };

    let av_percentage_non_speakers = if merged.perc_non_speakers.is_empty() {
        None
    } else {
        let sum: f64 = merged.perc_non_speakers.iter().sum();
        Some(round_to(sum / merged.perc_non_speakers.len() as f64, 3))
    };

    SpeakerFeatures {
        num_present_characters: present_characters(summary, registry),
        num_scenes_text: summary
            .scenes()
            .filter(|s| s.status != SceneStatus::Extra)
            .count(),
        num_scenes_iarkho: summary
            .scenes()
            .filter(|s| s.status != SceneStatus::NoChange)
            .count(),
        percentage_monologues: share(|n| n == 1),
        percentage_duologues: share(|n| n == 2),
        percentage_non_duologues: share(|n| n != 2),
        percentage_above_two_speakers: share(|n| n > 2),
        av_percentage_non_speakers,
        sigma_iarkho: sigma_iarkho(&distribution),
        speech_distribution: distribution,
    }
}

/// Characters appearing in at least one scene, collective characters counted
/// with their collective number.
pub fn present_characters(summary: &PlaySummary, registry: &CharacterRegistry) -> u32 {
    let on_stage: HashSet<&str> = summary
        .scenes()
        .flat_map(|scene| scene.record.characters())
        .collect();
    registry
        .iter()
        .filter(|character| {
            on_stage.contains(character.name.as_str())
                || character
                    .alternative_names
                    .iter()
                    .any(|alias| on_stage.contains(alias.as_str()))
        })
        .map(|character| character.headcount())
        .sum()
}

/// (number of speakers, number of scenes) pairs sorted by speaker count.
pub fn speech_distribution(merged: &MergeResult) -> Vec<(u32, usize)> {
    let mut counted: BTreeMap<u32, usize> = BTreeMap::new();
    for speakers in &merged.speakers {
        *counted.entry(*speakers).or_default() += 1;
    }
    counted.into_iter().collect()
}

/// Weighted standard deviation of the speaker counts.
pub fn sigma_iarkho(distribution: &[(u32, usize)]) -> Option<f64> {
    let total: f64 = distribution.iter().map(|(_, w)| *w as f64).sum();
    if total == 0.0 {
        return None;
    }
    let mean = distribution
        .iter()
        .map(|(v, w)| *v as f64 * *w as f64)
        .sum::<f64>()
        / total;
    let variance = distribution
        .iter()
        .map(|(v, w)| (*v as f64 - mean).powi(2) * *w as f64)
        .sum::<f64>()
        / total;
    Some(round_to(variance.sqrt(), 3))
}

fn verse_features(
    summary: &PlaySummary,
    verse: &VerseMetrics,
    free_iambs: bool,
    iarkho_scenes: usize,
) -> VerseFeatures {
    let total_utterances = verse
        .total_utterances
        .unwrap_or_else(|| summary.scenes().map(|s| s.record.num_utterances).sum());
    let rescaled = free_iambs.then(|| (verse.verse_lines as f64 * FREE_IAMBS_SCALE).floor());
    let lines = rescaled.unwrap_or(verse.verse_lines as f64);

    let scene_links = verse.scene_links.as_ref().map(|links| {
        let scenes = links.scenes.unwrap_or(iarkho_scenes) as f64;
        let open = links
            .open
            .unwrap_or((links.split_verse + links.split_rhymes).saturating_sub(links.both));
        SceneLinkFeatures {
            num_scenes_with_split_verse_lines: links.split_verse,
            num_scenes_with_split_rhymes: links.split_rhymes,
            percentage_scene_split_verse: percentage(links.split_verse as f64, scenes, 3),
            percentage_scene_split_rhymes: percentage(links.split_rhymes as f64, scenes, 3),
            num_scenes_with_split_rhymes_verses: links.both,
            num_open_scenes: open,
            percentage_open_scenes: percentage(open as f64, scenes, 3),
            percentage_scenes_rhymes_split_verse: percentage(links.both as f64, scenes, 3),
        }
    });

    VerseFeatures {
        total_utterances,
        num_verse_lines: verse.verse_lines,
        rescaled_num_verse_lines: rescaled,
        dialogue_vivacity: ratio(total_utterances as f64, lines),
        scene_links,
    }
}

fn stage_features(stage: &StageMetrics, verse_lines: f64) -> StageFeatures {
    StageFeatures {
        num_stage_directions: stage.count,
        stage_directions_frequency: percentage(stage.count as f64, verse_lines, 3),
        num_word_tokens_in_stage_directions: stage.word_tokens,
        average_length_of_stage_direction: ratio(stage.word_tokens as f64, stage.count as f64),
        num_verse_splitting_stage_directions: stage.verse_splitting,
        degree_of_verse_prose_interaction: percentage(stage.verse_splitting as f64, verse_lines, 3),
    }
}

/// Transitions, across act boundaries too, where no character of one scene
/// stays on stage in the next.
fn discontinuity(summary: &PlaySummary, iarkho_scenes: usize) -> DiscontinuityFeatures {
    let mut count = 0;
    let mut previous: Option<HashSet<&str>> = None;
    for scene in summary.scenes() {
        let current: HashSet<&str> = scene.record.characters().collect();
        if let Some(previous) = &previous {
            if previous.is_disjoint(&current) {
                count += 1;
            }
        }
        previous = Some(current);
    }
    DiscontinuityFeatures {
        number_scenes_with_discontinuous_change_characters: count,
        percentage_scenes_with_discontinuous_change_characters: percentage(
            count as f64,
            iarkho_scenes as f64,
            3,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{ActSummary, Character, SceneEntry, SceneNumber, SceneRecord};

    fn entry(number: SceneNumber, status: SceneStatus, counts: &[(&str, u32)]) -> SceneEntry {
        let counts: Vec<(String, u32)> = counts.iter().map(|(n, c)| (n.to_string(), *c)).collect();
        let speakers = counts.iter().filter(|(_, c)| *c > 0).count();
        SceneEntry {
            number,
            status,
            record: SceneRecord {
                num_utterances: counts.iter().map(|(_, c)| c).sum(),
                num_speakers: speakers as u32,
                perc_non_speakers: round_to(
                    (counts.len() - speakers) as f64 / counts.len() as f64 * 100.0,
                    3,
                ),
                counts,
            },
        }
    }

    fn registry() -> CharacterRegistry {
        let mut registry = CharacterRegistry::new();
        registry
            .insert(
                Character::new("CHORUS OF ELDERS")
                    .with_aliases(["CHORUS", "ELDERS"])
                    .with_collective_number(Some(3)),
            )
            .unwrap();
        registry.insert(Character::new("CREON")).unwrap();
        registry.insert(Character::new("ANTIGONE")).unwrap();
        registry.insert(Character::new("GUARD")).unwrap();
        registry
    }

    fn summary() -> PlaySummary {
        let mut first = ActSummary::new(1);
        first.scenes = vec![
            entry(
                SceneNumber::main(1),
                SceneStatus::Regular,
                &[("CHORUS OF ELDERS", 1), ("CREON", 2)],
            ),
            entry(
                SceneNumber::extra(1, 1),
                SceneStatus::Extra,
                &[("CREON", 1), ("ANTIGONE", 1), ("CHORUS OF ELDERS", 0)],
            ),
            entry(
                SceneNumber::main(2),
                SceneStatus::NoChange,
                &[("CREON", 0), ("ANTIGONE", 1), ("CHORUS OF ELDERS", 1)],
            ),
        ];
        let mut second = ActSummary::new(2);
        second.scenes = vec![entry(SceneNumber::main(1), SceneStatus::Regular, &[("GUARD", 1)])];
        PlaySummary {
            acts: vec![first, second],
        }
    }

    #[test]
    fn test_present_characters_weighted_by_collective_number() {
        assert_eq!(present_characters(&summary(), &registry()), 6);
    }

    #[test]
    fn test_speaker_features() {
        let features = compute(&summary(), &registry(), &TextMetrics::default(), false);
        let speakers = &features.speakers;
        assert_eq!(speakers.num_scenes_text, 3);
        assert_eq!(speakers.num_scenes_iarkho, 3);
        // merged pair (1.1 + 2) has 3 speakers; 1 and act 2's scene stay
        assert_eq!(speakers.speech_distribution, vec![(1, 1), (2, 1), (3, 1)]);
        assert_eq!(speakers.percentage_monologues, Some(33.33));
        assert_eq!(speakers.percentage_duologues, Some(33.33));
        assert_eq!(speakers.percentage_non_duologues, Some(66.67));
        assert_eq!(speakers.percentage_above_two_speakers, Some(33.33));
        assert_eq!(speakers.av_percentage_non_speakers, Some(0.0));
        assert_eq!(speakers.sigma_iarkho, Some(0.816));
        assert!(features.verse.is_none());
        assert!(features.stage.is_none());
    }

    #[test]
    fn test_discontinuity_crosses_acts() {
        let features = compute(&summary(), &registry(), &TextMetrics::default(), false);
        assert_eq!(
            features
                .discontinuity
                .number_scenes_with_discontinuous_change_characters,
            1
        );
        assert_eq!(
            features
                .discontinuity
                .percentage_scenes_with_discontinuous_change_characters,
            Some(33.333)
        );
    }

    #[test]
    fn test_verse_and_stage_features() {
        let metrics = TextMetrics {
            verse: Some(VerseMetrics {
                total_utterances: None,
                verse_lines: 100,
                scene_links: Some(SceneLinks {
                    split_verse: 2,
                    split_rhymes: 1,
                    both: 1,
                    open: None,
                    scenes: None,
                }),
            }),
            stage: Some(StageMetrics {
                count: 4,
                word_tokens: 10,
                verse_splitting: 2,
            }),
        };
        let features = compute(&summary(), &registry(), &metrics, true);

        let verse = features.verse.unwrap();
        assert_eq!(verse.total_utterances, 8);
        assert_eq!(verse.rescaled_num_verse_lines, Some(79.0));
        assert_eq!(verse.dialogue_vivacity, Some(0.101));
        let links = verse.scene_links.unwrap();
        assert_eq!(links.num_open_scenes, 2);
        assert_eq!(links.percentage_open_scenes, Some(66.667));

        let stage = features.stage.unwrap();
        assert_eq!(stage.stage_directions_frequency, Some(5.063));
        assert_eq!(stage.average_length_of_stage_direction, Some(2.5));
        assert_eq!(stage.degree_of_verse_prose_interaction, Some(2.532));
    }

    #[test]
    fn test_zero_denominators_serialize_as_null() {
        let metrics = TextMetrics {
            verse: Some(VerseMetrics {
                total_utterances: Some(0),
                verse_lines: 0,
                scene_links: None,
            }),
            stage: Some(StageMetrics::default()),
        };
        let features = compute(&PlaySummary::default(), &registry(), &metrics, false);
        let json = serde_json::to_value(&features).unwrap();
        assert!(json["dialogue_vivacity"].is_null());
        assert!(json["average_length_of_stage_direction"].is_null());
        assert!(json["sigma_iarkho"].is_null());
        assert!(json["percentage_scenes_with_discontinuous_change_characters"].is_null());
        assert!(json.get("rescaled_num_verse_lines").is_none());
        assert!(json.get("num_open_scenes").is_none());
        assert_eq!(json["num_present_characters"], 0);
    }
}
