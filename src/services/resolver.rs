//! Scene cast resolution: which characters are on stage in a scene.

use crate::core::error::{PlayError, PlayResult};
use crate::core::state::SceneStatus;
use crate::services::dialect::{CastLocation, NameMatching};
use crate::services::pipeline::SceneContext;
use crate::services::segmenter::Scene;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedCast {
    /// Canonical names in declaration order, carried-over names last.
    pub present: Vec<String>,
    pub excluded: Vec<String>,
}

pub fn resolve_cast(scene: &Scene, ctx: &SceneContext) -> PlayResult<ResolvedCast> {
    match &ctx.dialect.cast_location {
        CastLocation::ExplicitList { separator } => resolve_listed(scene, separator, ctx),
        CastLocation::AnnotationOrStage { .. } => Ok(resolve_described(scene, ctx)),
    }
}

fn resolve_listed(scene: &Scene, separator: &str, ctx: &SceneContext) -> PlayResult<ResolvedCast> {
    let listing = scene.raw.cast_text.as_deref().unwrap_or_default();
    let mut present: Vec<String> = Vec::new();
    for token in listing.split(separator).map(str::trim).filter(|t| !t.is_empty()) {
        let canonical = ctx
            .registry
            .resolve(token)
            .ok_or_else(|| PlayError::UnknownCastName {
                name: token.to_string(),
                scene: ctx.scene_label(scene),
            })?;
        if !present.iter().any(|name| name == canonical) {
            present.push(canonical.to_string());
        }
    }
    Ok(ResolvedCast {
        present,
        excluded: Vec::new(),
    })
}

fn resolve_described(scene: &Scene, ctx: &SceneContext) -> ResolvedCast {
    let source = if scene.status == SceneStatus::Extra || scene.complex {
        scene.raw.annotation.as_deref()
    } else {
        scene.raw.cast_text.as_deref()
    };
    let mut text = source.unwrap_or_default().to_lowercase();

    let mut excluded = Vec::new();
    let marker = ctx
        .dialect
        .exclusion_markers
        .iter()
        .find_map(|marker| text.find(&marker.to_lowercase()));
    if let Some(pos) = marker {
        excluded = match_names(&text[pos..], ctx);
        text.truncate(pos);
    }

    let mut present = match_names(&text, ctx);
    if ctx.dialect.carry_over_in(&text).is_some() {
        for name in ctx.previous_cast {
            if !excluded.contains(name) && !present.contains(name) {
                present.push(name.clone());
            }
        }
    }
    ResolvedCast { present, excluded }
}

/// Canonical names found in `text`, ordered by first occurrence.
pub fn match_names(text: &str, ctx: &SceneContext) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    for name in ctx.registry.names() {
        let needle = name.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let Some(pos) = text.find(&needle) else {
            continue;
        };
        let accepted = match &ctx.dialect.name_matching {
            NameMatching::Substring => true,
            NameMatching::InflectionAware { surname_suffixes } => {
                accept_inflected(text, &needle, pos, surname_suffixes)
            }
        };
        if accepted {
            found.push((pos, name));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, name)| name.to_string()).collect()
}

// "фамусов" inside "фамусова" or "фамусовы" is another character.
fn accept_inflected(text: &str, needle: &str, pos: usize, suffixes: &[String]) -> bool {
    if text.matches(needle).count() >= 2 {
        return true;
    }
    if !suffixes.iter().any(|suffix| needle.ends_with(suffix.as_str())) {
        return true;
    }
    let after = &text[pos + needle.len()..];
    let next = after.chars().next();
    let third = after.chars().nth(2);
    next != Some('а') && third != Some('я')
}
