/// Characters treated as punctuation when counting word tokens.
pub const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~—";

pub fn strip_punctuation(text: &str) -> String {
    text.chars()
        .filter(|c| !PUNCTUATION.contains(*c) && *c != '\n' && *c != '\t')
        .collect()
}

pub fn count_word_tokens(text: &str) -> u32 {
    strip_punctuation(text).split_whitespace().count() as u32
}

pub fn remove_numbers(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_digit()).collect()
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// At most `max_chars` characters from the start of `text`, whitespace collapsed.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    normalize_whitespace(text).chars().take(max_chars).collect()
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `numerator / denominator * 100` rounded to `places`, or `None` for a zero denominator.
pub fn percentage(numerator: f64, denominator: f64, places: i32) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(round_to(numerator / denominator * 100.0, places))
    }
}

/// `numerator / denominator` rounded to 3 decimals, or `None` for a zero denominator.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(round_to(numerator / denominator, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaning_helpers() {
        assert_eq!(strip_punctuation("Входит, — Лиза.\n"), "Входит  Лиза");
        assert_eq!(remove_numbers("ЯВЛЕНИЕ 12"), "ЯВЛЕНИЕ ");
        assert_eq!(count_word_tokens(" Уходит, — в дверь. "), 3);
        assert_eq!(excerpt("  SCENE   II.\n Filipin ", 10), "SCENE II. ");
    }

    #[test]
    fn test_rounding_and_zero_denominators() {
        assert_eq!(round_to(33.33333, 3), 33.333);
        assert_eq!(percentage(1.0, 3.0, 2), Some(33.33));
        assert_eq!(percentage(1.0, 0.0, 2), None);
        assert_eq!(ratio(10.0, 4.0), Some(2.5));
        assert_eq!(ratio(1.0, 0.0), None);
    }
}
