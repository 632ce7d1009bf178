use log::debug;
use regex::Regex;

use crate::core::error::PlayResult;
use crate::core::state::{Character, CharacterRegistry};

const ALTERNATIVE_NAME_TAG: &str = "<alternative_name";
const COLLECTIVE_NUMBER_TAG: &str = "<collective_number ";

pub fn build_registry<I>(characters: I) -> PlayResult<CharacterRegistry>
where
    I: IntoIterator<Item = Character>,
{
    let mut registry = CharacterRegistry::new();
    for character in characters {
        if registry.contains(&character.name) {
            debug!("cast listing names '{}' twice; keeping the later entry", character.name);
        }
        registry.insert(character)?;
    }
    Ok(registry)
}

/// Parses one dramatis personae line of a hand-tagged text.
///
/// The first match of `name_pattern` is the canonical name; the line may carry
/// `<alternative_name A, B>` and `<collective_number N>` annotations.
pub fn parse_cast_line(line: &str, name_pattern: &Regex) -> Option<Character> {
    let name = name_pattern.find(line)?.as_str().trim();
    if name.is_empty() {
        return None;
    }
    Some(
        Character::new(name)
            .with_aliases(alternative_names(line))
            .with_collective_number(collective_number(line)),
    )
}

fn alternative_names(line: &str) -> Vec<String> {
    let Some(start) = line.find(ALTERNATIVE_NAME_TAG) else {
        return Vec::new();
    };
    let rest = &line[start + ALTERNATIVE_NAME_TAG.len()..];
    let end = rest.find('>').unwrap_or(rest.len());
    rest[..end]
        .split(',')
        .map(str::trim)
        .filter(|alias| !alias.is_empty())
        .map(str::to_string)
        .collect()
}

// The last annotation wins when a line carries several.
fn collective_number(line: &str) -> Option<u32> {
    let start = line.rfind(COLLECTIVE_NUMBER_TAG)? + COLLECTIVE_NUMBER_TAG.len();
    let digits: String = line[start..]
        .chars()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn parse_cast_listing(cast_text: &str, name_pattern: &Regex) -> PlayResult<CharacterRegistry> {
    build_registry(
        cast_text
            .lines()
            .filter_map(|line| parse_cast_line(line, name_pattern)),
    )
}

/// Parses one line of a Word "LES ACTEURS" block: a name with an optional
/// digit giving the collective number.
pub fn parse_actor_line(line: &str) -> Option<Character> {
    let line = line.trim();
    if line.is_empty() || line.chars().all(|c| matches!(c, '-' | '–' | '/' | '\u{a0}')) {
        return None;
    }
    let digits: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Some(Character::new(line));
    }
    let name = line.replacen(&digits, "", 1).trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some(Character::new(name).with_collective_number(digits.parse().ok()))
}
