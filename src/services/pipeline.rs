use log::debug;

use crate::core::error::{CastMismatch, PlayResult};
use crate::core::state::{ActSummary, CharacterRegistry, PlaySummary};
use crate::services::aggregator::aggregate;
use crate::services::attributor::attribute;
use crate::services::dialect::Dialect;
use crate::services::resolver::resolve_cast;
use crate::services::segmenter::{check_act_count, number_scenes, RawScene, Scene};

/// Everything a scene stage may read: the play's registry, the dialect and the
/// cast of the scene before it in the same act.
#[derive(Debug, Clone, Copy)]
pub struct SceneContext<'a> {
    pub registry: &'a CharacterRegistry,
    pub dialect: &'a Dialect,
    pub act: &'a str,
    pub previous_cast: &'a [String],
}

impl<'a> SceneContext<'a> {
    pub fn new(registry: &'a CharacterRegistry, dialect: &'a Dialect, act: &'a str) -> Self {
        Self {
            registry,
            dialect,
            act,
            previous_cast: &[],
        }
    }

    pub fn with_previous(mut self, previous_cast: &'a [String]) -> Self {
        self.previous_cast = previous_cast;
        self
    }

    /// "act_2/3.1_extra", used in errors and warnings.
    pub fn scene_label(&self, scene: &Scene) -> String {
        format!("{}/{}_{}", self.act, scene.number, scene.status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub summary: PlaySummary,
    pub mismatches: Vec<CastMismatch>,
}

pub struct ScenePipeline<'a> {
    registry: &'a CharacterRegistry,
    dialect: &'a Dialect,
}

impl<'a> ScenePipeline<'a> {
    pub fn new(registry: &'a CharacterRegistry, dialect: &'a Dialect) -> Self {
        Self { registry, dialect }
    }

    pub fn run(
        &self,
        acts: Vec<Vec<RawScene>>,
        expected_acts: Option<usize>,
    ) -> PlayResult<PipelineOutput> {
        check_act_count(expected_acts, acts.len())?;

        let mut output = PipelineOutput::default();
        for (index, raw_scenes) in acts.into_iter().enumerate() {
            let act = self.run_act(index + 1, raw_scenes, &mut output.mismatches)?;
            output.summary.acts.push(act);
        }
        Ok(output)
    }

    pub fn run_act(
        &self,
        number: usize,
        raw_scenes: Vec<RawScene>,
        mismatches: &mut Vec<CastMismatch>,
    ) -> PlayResult<ActSummary> {
        let mut act = ActSummary::new(number);
        let mut previous: Vec<String> = Vec::new();

        for scene in number_scenes(raw_scenes, self.dialect) {
            let outcome = {
                let ctx = SceneContext::new(self.registry, self.dialect, &act.label)
                    .with_previous(&previous);
                let resolved = resolve_cast(&scene, &ctx)?;
                let utterances = attribute(&scene, &ctx)?;
                aggregate(&scene, resolved, &utterances, &ctx)?
            };
            debug!(
                "{}/{}: {} present, {} speaking",
                act.label,
                outcome.entry.label(),
                outcome.cast.len(),
                outcome.entry.record.num_speakers
            );
            if let Some(mismatch) = outcome.mismatch {
                mismatches.push(mismatch);
            }
            previous = outcome.cast;
            act.scenes.push(outcome.entry);
        }
        Ok(act)
    }
}
