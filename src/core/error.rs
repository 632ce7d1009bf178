use thiserror::Error;

/// Failures that abort the processing of a single play.
///
/// A batch never stops on one of these: the runner logs the error, skips the
/// play and moves on to the next file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayError {
    #[error("expected {expected} acts but found {found}")]
    StructureMismatch { expected: usize, found: usize },

    #[error("speaker '{name}' in scene {scene} is not a registered character or alias")]
    UnknownSpeaker { name: String, scene: String },

    #[error("cast of scene {scene} names '{name}', which is not a registered character or alias")]
    UnknownCastName { name: String, scene: String },

    #[error("scene {scene} has an empty cast")]
    EmptySceneCast { scene: String },

    #[error("alias '{alias}' is claimed by both '{first}' and '{second}'")]
    AmbiguousAlias {
        alias: String,
        first: String,
        second: String,
    },

    #[error("no metadata row for play '{index}'")]
    MissingMetadata { index: String },

    #[error("malformed play text: {0}")]
    Malformed(String),
}

pub type PlayResult<T> = std::result::Result<T, PlayError>;

/// Non-fatal: characters speak in a scene without being part of its cast.
#[derive(Debug, Clone, PartialEq)]
pub struct CastMismatch {
    pub scene: String,
    pub unlisted_speakers: Vec<String>,
    pub cast: Vec<String>,
    pub excerpt: String,
}

impl std::fmt::Display for CastMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scene {}: speak but do not appear in scene cast: [{}]; listed cast: [{}]; beginning of the scene: {}",
            self.scene,
            self.unlisted_speakers.join(", "),
            self.cast.join(", "),
            self.excerpt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = PlayError::UnknownSpeaker {
            name: "NOBODY".to_string(),
            scene: "act_1/2_regular".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("NOBODY"));
        assert!(msg.contains("act_1/2_regular"));

        let err = PlayError::StructureMismatch { expected: 5, found: 3 };
        assert_eq!(err.to_string(), "expected 5 acts but found 3");
    }

    #[test]
    fn test_cast_mismatch_display() {
        let warning = CastMismatch {
            scene: "act_2/3_regular".to_string(),
            unlisted_speakers: vec!["ORONTE".to_string()],
            cast: vec!["FILIPIN".to_string(), "CELIE".to_string()],
            excerpt: "SCENE III".to_string(),
        };
        let text = warning.to_string();
        assert!(text.contains("[ORONTE]"));
        assert!(text.contains("FILIPIN, CELIE"));
    }
}
