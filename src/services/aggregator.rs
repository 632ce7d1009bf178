use log::warn;
use std::collections::HashSet;

use crate::core::error::{CastMismatch, PlayError, PlayResult};
use crate::core::state::{SceneEntry, SceneRecord, SceneStatus};
use crate::services::attributor::{count_utterances, distinct_speakers, Utterance};
use crate::services::pipeline::SceneContext;
use crate::services::resolver::ResolvedCast;
use crate::services::segmenter::Scene;
use crate::utils::text::{excerpt, round_to};

const EXCERPT_CHARS: usize = 70;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneOutcome {
    pub entry: SceneEntry,
    /// Final cast, handed to the next scene as its previous cast.
    pub cast: Vec<String>,
    pub mismatch: Option<CastMismatch>,
}

/// Builds the scene record and applies status pass 2.
pub fn aggregate(
    scene: &Scene,
    resolved: ResolvedCast,
    utterances: &[Utterance],
    ctx: &SceneContext,
) -> PlayResult<SceneOutcome> {
    let speakers = distinct_speakers(utterances);
    let declared = !resolved.present.is_empty();
    let cast = if !declared && ctx.dialect.infer_cast_from_speakers {
        speakers.clone()
    } else {
        resolved.present
    };
    if cast.is_empty() {
        return Err(PlayError::EmptySceneCast {
            scene: ctx.scene_label(scene),
        });
    }

    let mismatch = if declared {
        check_speakers(scene, &cast, &speakers, ctx)
    } else {
        None
    };

    let counts = count_utterances(&cast, utterances, ctx.registry);
    let record = build_record(counts, ctx);

    let status = if !ctx.previous_cast.is_empty() && same_members(&cast, ctx.previous_cast) {
        SceneStatus::NoChange
    } else {
        scene.status
    };

    Ok(SceneOutcome {
        entry: SceneEntry {
            number: scene.number,
            status,
            record,
        },
        cast,
        mismatch,
    })
}

fn check_speakers(
    scene: &Scene,
    cast: &[String],
    speakers: &[String],
    ctx: &SceneContext,
) -> Option<CastMismatch> {
    let unlisted: Vec<String> = speakers
        .iter()
        .filter(|speaker| !cast.contains(speaker))
        .cloned()
        .collect();
    if unlisted.is_empty() {
        return None;
    }
    let opening = format!(
        "{} {}",
        scene.raw.cast_text.as_deref().unwrap_or_default(),
        scene.raw.body
    );
    let mismatch = CastMismatch {
        scene: ctx.scene_label(scene),
        unlisted_speakers: unlisted,
        cast: cast.to_vec(),
        excerpt: excerpt(&opening, EXCERPT_CHARS),
    };
    warn!("{}", mismatch);
    Some(mismatch)
}

fn build_record(counts: Vec<(String, u32)>, ctx: &SceneContext) -> SceneRecord {
    let present = counts.len();
    let speaking: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, _)| name.as_str())
        .collect();

    let num_speakers = if ctx.dialect.weight_speakers_by_collective_number {
        speaking
            .iter()
            .map(|name| ctx.registry.get(name).map_or(1, |c| c.headcount()))
            .sum()
    } else {
        speaking.len() as u32
    };
    let perc_non_speakers = round_to(
        (present - speaking.len()) as f64 / present as f64 * 100.0,
        3,
    );

    SceneRecord {
        num_utterances: counts.iter().map(|(_, count)| count).sum(),
        num_speakers,
        perc_non_speakers,
        counts,
    }
}

fn same_members(left: &[String], right: &[String]) -> bool {
    let left: HashSet<&String> = left.iter().collect();
    let right: HashSet<&String> = right.iter().collect();
    left == right
}
