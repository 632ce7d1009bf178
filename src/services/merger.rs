//! Folding of no_change scenes into their predecessor for speaker statistics.

use std::collections::HashSet;

use crate::core::state::{PlaySummary, SceneRecord, SceneStatus};
use crate::utils::text::round_to;

#[derive(Debug, Clone, PartialEq)]
pub struct MergedPair {
    pub act: String,
    pub dropped: String,
    pub merged_into: String,
}

/// Speaker counts and non-speaker percentages, merged figures first, then one
/// entry per scene of the reduced summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    pub pairs: Vec<MergedPair>,
    pub speakers: Vec<u32>,
    pub perc_non_speakers: Vec<f64>,
}

pub fn merge_no_change(summary: &PlaySummary) -> MergeResult {
    let mut reduced = summary.clone();
    let mut result = MergeResult::default();

    for act in &summary.acts {
        for (index, scene) in act.scenes.iter().enumerate() {
            if scene.status != SceneStatus::NoChange || index == 0 {
                continue;
            }
            let previous = &act.scenes[index - 1];
            let (speaking, perc) = merged_figures(&previous.record, &scene.record);
            result.speakers.push(speaking);
            result.perc_non_speakers.push(perc);
            result.pairs.push(MergedPair {
                act: act.label.clone(),
                dropped: scene.label(),
                merged_into: previous.label(),
            });
        }
    }

    for pair in &result.pairs {
        if let Some(act) = reduced.acts.iter_mut().find(|a| a.label == pair.act) {
            act.scenes
                .retain(|s| s.label() != pair.dropped && s.label() != pair.merged_into);
        }
    }
    for scene in reduced.scenes() {
        result.speakers.push(scene.record.num_speakers);
        result
            .perc_non_speakers
            .push(round_to(scene.record.perc_non_speakers, 3));
    }
    result
}

// Speaking in either scene counts as speaking; silent only if silent in one
// and speaking in neither.
fn merged_figures(previous: &SceneRecord, current: &SceneRecord) -> (u32, f64) {
    let mut speaking: HashSet<&str> = HashSet::new();
    let mut silent: HashSet<&str> = HashSet::new();
    for record in [previous, current] {
        for (name, count) in &record.counts {
            if *count > 0 {
                speaking.insert(name.as_str());
            } else {
                silent.insert(name.as_str());
            }
        }
    }
    let non_speaking = silent.difference(&speaking).count();
    let total = non_speaking + speaking.len();
    let perc = if total == 0 {
        0.0
    } else {
        round_to(non_speaking as f64 / total as f64 * 100.0, 3)
    };
    (speaking.len() as u32, perc)
}
