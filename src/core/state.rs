use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::core::error::{PlayError, PlayResult};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Character {
    pub name: String,
    pub alternative_names: Vec<String>,
    pub collective_number: Option<u32>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternative_names = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collective_number(mut self, number: Option<u32>) -> Self {
        self.collective_number = number;
        self
    }

    pub fn headcount(&self) -> u32 {
        self.collective_number.unwrap_or(1)
    }
}

/// Dramatis personae of one play: canonical names in cast order plus the
/// alias → canonical reverse table.
#[derive(Debug, Clone, Default)]
pub struct CharacterRegistry {
    characters: Vec<Character>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a character. A repeated canonical name replaces the earlier entry
    /// in place.
    ///
    /// Aliases and canonical names stay disjoint across characters, so every
    /// token resolves to exactly one character.
    pub fn insert(&mut self, character: Character) -> PlayResult<()> {
        for alias in &character.alternative_names {
            if alias == &character.name {
                continue;
            }
            let owner = self
                .aliases
                .get(alias)
                .or_else(|| self.get(alias).map(|other| &other.name));
            if let Some(owner) = owner {
                if owner != &character.name {
                    return Err(PlayError::AmbiguousAlias {
                        alias: alias.clone(),
                        first: owner.clone(),
                        second: character.name.clone(),
                    });
                }
            }
        }
        if let Some(owner) = self.aliases.get(&character.name) {
            if owner != &character.name {
                return Err(PlayError::AmbiguousAlias {
                    alias: character.name.clone(),
                    first: owner.clone(),
                    second: character.name.clone(),
                });
            }
        }

        match self.index.get(&character.name) {
            Some(&pos) => {
                let previous = std::mem::take(&mut self.characters[pos].alternative_names);
                for alias in previous {
                    self.aliases.remove(&alias);
                }
                self.register_aliases(&character);
                self.characters[pos] = character;
            }
            None => {
                self.register_aliases(&character);
                self.index
                    .insert(character.name.clone(), self.characters.len());
                self.characters.push(character);
            }
        }
        Ok(())
    }

    fn register_aliases(&mut self, character: &Character) {
        for alias in &character.alternative_names {
            self.aliases.insert(alias.clone(), character.name.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Character> {
        self.index.get(name).map(|&pos| &self.characters[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn canonical_for_alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Direct canonical match first, alias lookup second.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        match self.index.get(token) {
            Some(&pos) => Some(self.characters[pos].name.as_str()),
            None => self.canonical_for_alias(token),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.characters.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

struct CharacterEntry<'a>(&'a Character);

impl Serialize for CharacterEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Character", 2)?;
        if self.0.alternative_names.is_empty() {
            state.serialize_field("alternative_names", &None::<Vec<String>>)?;
        } else {
            state.serialize_field("alternative_names", &self.0.alternative_names)?;
        }
        state.serialize_field("collective_number", &self.0.collective_number)?;
        state.end()
    }
}

impl Serialize for CharacterRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.characters.len()))?;
        for character in &self.characters {
            map.serialize_entry(&character.name, &CharacterEntry(character))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneStatus {
    Regular,
    Extra,
    NoChange,
}

impl SceneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneStatus::Regular => "regular",
            SceneStatus::Extra => "extra",
            SceneStatus::NoChange => "no_change",
        }
    }
}

impl fmt::Display for SceneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "3" for a main scene, "3.1" for the first extra scene after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneNumber {
    pub main: u32,
    pub extra: Option<u32>,
}

impl SceneNumber {
    pub fn main(main: u32) -> Self {
        Self { main, extra: None }
    }

    pub fn extra(main: u32, extra: u32) -> Self {
        Self {
            main,
            extra: Some(extra),
        }
    }
}

impl fmt::Display for SceneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.extra {
            Some(extra) => write!(f, "{}.{}", self.main, extra),
            None => write!(f, "{}", self.main),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneRecord {
    pub counts: Vec<(String, u32)>,
    pub num_utterances: u32,
    pub num_speakers: u32,
    pub perc_non_speakers: f64,
}

impl SceneRecord {
    pub fn characters(&self) -> impl Iterator<Item = &str> {
        self.counts.iter().map(|(name, _)| name.as_str())
    }

    pub fn count(&self, name: &str) -> Option<u32> {
        self.counts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, count)| *count)
    }
}

impl Serialize for SceneRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len() + 3))?;
        for (name, count) in &self.counts {
            map.serialize_entry(name, count)?;
        }
        map.serialize_entry("num_utterances", &self.num_utterances)?;
        map.serialize_entry("num_speakers", &self.num_speakers)?;
        map.serialize_entry("perc_non_speakers", &self.perc_non_speakers)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntry {
    pub number: SceneNumber,
    pub status: SceneStatus,
    pub record: SceneRecord,
}

impl SceneEntry {
    pub fn label(&self) -> String {
        format!("{}_{}", self.number, self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActSummary {
    pub label: String,
    pub scenes: Vec<SceneEntry>,
}

impl ActSummary {
    pub fn new(number: usize) -> Self {
        Self {
            label: format!("act_{}", number),
            scenes: Vec::new(),
        }
    }
}

impl Serialize for ActSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scenes.len()))?;
        for scene in &self.scenes {
            map.serialize_entry(&scene.label(), &scene.record)?;
        }
        map.end()
    }
}

/// Act → scene → record, in textual order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaySummary {
    pub acts: Vec<ActSummary>,
}

impl PlaySummary {
    pub fn scenes(&self) -> impl Iterator<Item = &SceneEntry> {
        self.acts.iter().flat_map(|act| act.scenes.iter())
    }

    pub fn scene_count(&self) -> usize {
        self.acts.iter().map(|act| act.scenes.len()).sum()
    }
}

impl Serialize for PlaySummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.acts.len()))?;
        for act in &self.acts {
            map.serialize_entry(&act.label, act)?;
        }
        map.end()
    }
}
