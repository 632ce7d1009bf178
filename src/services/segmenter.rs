//! Act/scene segmentation, syntactic scene status and hierarchical numbering.

use crate::core::error::{PlayError, PlayResult};
use crate::core::state::{SceneNumber, SceneStatus};
use crate::services::dialect::{Dialect, StatusRule};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawScene {
    /// Text the status rule inspects: the scene heading or the TEI `type`.
    pub heading: String,
    pub annotation: Option<String>,
    /// Cast declaration: a `<cast …>` list, Word name lines or TEI stage text.
    pub cast_text: Option<String>,
    /// Scene text after the cast declaration; speaker cues are searched here.
    pub body: String,
    pub cues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub number: SceneNumber,
    pub status: SceneStatus,
    pub complex: bool,
    pub raw: RawScene,
}

/// Main counter starts at 0, extra sub-counter at 1.
#[derive(Debug, Clone)]
pub struct SceneNumberer {
    main: u32,
    extra: u32,
}

impl SceneNumberer {
    pub fn new() -> Self {
        Self { main: 0, extra: 1 }
    }

    pub fn next(&mut self, status: SceneStatus) -> SceneNumber {
        match status {
            SceneStatus::Extra => {
                let number = SceneNumber::extra(self.main, self.extra);
                self.extra += 1;
                number
            }
            SceneStatus::Regular | SceneStatus::NoChange => {
                self.main += 1;
                self.extra = 1;
                SceneNumber::main(self.main)
            }
        }
    }
}

impl Default for SceneNumberer {
    fn default() -> Self {
        Self::new()
    }
}

/// Status pass 1: what the markup says. The second flag marks complex scenes.
pub fn syntactic_status(rule: &StatusRule, heading: &str) -> (SceneStatus, bool) {
    match rule {
        StatusRule::Tags { extra, no_change } => {
            if heading.contains(no_change.as_str()) {
                (SceneStatus::NoChange, false)
            } else if heading.contains(extra.as_str()) {
                (SceneStatus::Extra, false)
            } else {
                (SceneStatus::Regular, false)
            }
        }
        StatusRule::NumberedHeading { no_change_flag } => {
            let heading = heading.trim_start();
            let mut chars = heading.chars();
            match chars.next() {
                Some(first) if first.is_ascii_digit() => {
                    if chars.take(4).any(|c| c == *no_change_flag) {
                        (SceneStatus::NoChange, false)
                    } else {
                        (SceneStatus::Regular, false)
                    }
                }
                _ => (SceneStatus::Extra, false),
            }
        }
        StatusRule::DivType => {
            let status = if heading.contains("extra") {
                SceneStatus::Extra
            } else {
                SceneStatus::Regular
            };
            (status, heading.contains("complex"))
        }
    }
}

pub fn number_scenes(raw_scenes: Vec<RawScene>, dialect: &Dialect) -> Vec<Scene> {
    let mut numberer = SceneNumberer::new();
    raw_scenes
        .into_iter()
        .map(|raw| {
            let (status, complex) = syntactic_status(&dialect.status_rule, &raw.heading);
            Scene {
                number: numberer.next(status),
                status,
                complex,
                raw,
            }
        })
        .collect()
}

pub fn check_act_count(expected: Option<usize>, found: usize) -> PlayResult<()> {
    match expected {
        Some(expected) if expected != found => {
            Err(PlayError::StructureMismatch { expected, found })
        }
        _ => Ok(()),
    }
}

pub fn split_acts<'a>(text: &'a str, dialect: &Dialect) -> Vec<&'a str> {
    text.split(dialect.markers.act.as_str()).skip(1).collect()
}

// Bracketed `<ЯВЛЕНИЕ>` markers split like printed ones.
pub fn split_scenes(act: &str, dialect: &Dialect) -> Vec<String> {
    dialect
        .markers
        .scene_boundary
        .split(act)
        .skip(1)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(heading: &str) -> RawScene {
        RawScene {
            heading: heading.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_numbering_policy() {
        let dialect = Dialect::french_tei();
        let scenes = number_scenes(
            vec![
                raw("scene"),
                raw("extra_scene"),
                raw("extra_scene"),
                raw("scene"),
                raw("complex_scene"),
                raw("extra_scene"),
            ],
            &dialect,
        );
        let labels: Vec<String> = scenes.iter().map(|s| s.number.to_string()).collect();
        assert_eq!(labels, vec!["1", "1.1", "1.2", "2", "3", "3.1"]);
        assert!(scenes[4].complex);
        assert_eq!(scenes[4].status, SceneStatus::Regular);
    }

    #[test]
    fn test_main_numbers_never_decrease() {
        let dialect = Dialect::french_tei();
        let headings = ["extra_scene", "scene", "extra_scene", "scene", "scene", "extra_scene"];
        let scenes = number_scenes(headings.iter().map(|h| raw(h)).collect(), &dialect);
        for pair in scenes.windows(2) {
            assert!(pair[0].number.main <= pair[1].number.main);
        }
        // an act opening with an extra scene hangs it off scene 0
        assert_eq!(scenes[0].number.to_string(), "0.1");
    }

    #[test]
    fn test_extra_counter_resets_after_non_extra() {
        let mut numberer = SceneNumberer::new();
        numberer.next(SceneStatus::Regular);
        numberer.next(SceneStatus::Extra);
        numberer.next(SceneStatus::Extra);
        numberer.next(SceneStatus::NoChange);
        assert_eq!(numberer.next(SceneStatus::Extra), SceneNumber::extra(2, 1));
    }

    #[test]
    fn test_tag_status() {
        let rule = Dialect::plain_text(false).status_rule;
        assert_eq!(syntactic_status(&rule, " 2 <no_change_SCENE> ").0, SceneStatus::NoChange);
        assert_eq!(syntactic_status(&rule, "_SCENE> ").0, SceneStatus::Extra);
        assert_eq!(syntactic_status(&rule, " 3 ").0, SceneStatus::Regular);
    }

    #[test]
    fn test_numbered_heading_status() {
        let rule = Dialect::word().status_rule;
        assert_eq!(syntactic_status(&rule, "3").0, SceneStatus::Regular);
        assert_eq!(syntactic_status(&rule, "3 *").0, SceneStatus::NoChange);
        assert_eq!(syntactic_status(&rule, "").0, SceneStatus::Extra);
    }

    #[test]
    fn test_act_count_check() {
        assert!(check_act_count(None, 3).is_ok());
        assert!(check_act_count(Some(3), 3).is_ok());
        assert_eq!(
            check_act_count(Some(5), 3),
            Err(PlayError::StructureMismatch {
                expected: 5,
                found: 3
            })
        );
    }

    #[test]
    fn test_free_text_splitting() {
        let dialect = Dialect::plain_text(false);
        let text = "ДЕЙСТВИЕ I ЯВЛЕНИЕ 1 a <extra_SCENE> b ДЕЙСТВИЕ II <ЯВЛЕНИЕ> 1 c";
        let acts = split_acts(text, &dialect);
        assert_eq!(acts.len(), 2);

        let first = split_scenes(acts[0], &dialect);
        assert_eq!(first, vec![" 1 a ", "_SCENE> b "]);
        let second = split_scenes(acts[1], &dialect);
        assert_eq!(second, vec![" 1 c"]);
    }
}
