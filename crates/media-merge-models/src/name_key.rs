use std::collections::HashMap;

const DROPPED_WORDS: [&str; 2] = ["chapter", "part"];
const DROPPED_PREFIXES: [&str; 3] = ["the ", "national lampoons ", "monty pythons "];

/// Memoized title normalization used to compare names across servers
///
/// Owned by whoever needs it; call [`NameKeyCache::clear`] when the titles it
/// has seen are no longer relevant.
#[derive(Debug, Default)]
pub struct NameKeyCache {
    keys: HashMap<String, String>,
}

impl NameKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized comparison key for `name`
    pub fn name_key(&mut self, name: &str) -> String {
        if let Some(key) = self.keys.get(name) {
            return key.clone();
        }
        let key = normalize(name);
        self.keys.insert(name.to_string(), key.clone());
        key
    }

    pub fn same_title(&mut self, lhs: &str, rhs: &str) -> bool {
        self.name_key(lhs) == self.name_key(rhs)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

fn normalize(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == ' ' { c } else { ' ' })
        .collect();

    let mut joined = cleaned
        .split_whitespace()
        .filter(|word| !DROPPED_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ");

    for prefix in DROPPED_PREFIXES {
        if let Some(rest) = joined.strip_prefix(prefix) {
            joined = rest.to_string();
        }
    }

    joined
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| match roman_value(word) {
            Some(value) => value.to_string(),
            None => word.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value of a canonically written lowercase Roman numeral
fn roman_value(word: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut previous = 0u32;
    for c in word.chars().rev() {
        let value = match c {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        };
        if value < previous {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            previous = value;
        }
    }

    if total == 0 || to_roman(total) != word {
        return None;
    }
    Some(total)
}

fn to_roman(mut value: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (amount, digits) in TABLE {
        while value >= amount {
            out.push_str(digits);
            value -= amount;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_and_case_are_ignored() {
        let mut cache = NameKeyCache::new();
        assert_eq!(cache.name_key("Alien: Resurrection"), "alien resurrection");
        assert!(cache.same_title("Alien: Resurrection", "alien resurrection"));
    }

    #[test]
    fn test_leading_article_and_part_are_dropped() {
        let mut cache = NameKeyCache::new();
        assert_eq!(cache.name_key("The Godfather: Part II"), "godfather 2");
        assert!(cache.same_title("Godfather 2", "The Godfather Part II"));
    }

    #[test]
    fn test_roman_numerals_must_be_canonical() {
        assert_eq!(roman_value("iv"), Some(4));
        assert_eq!(roman_value("xiv"), Some(14));
        assert_eq!(roman_value("iiii"), None);
        assert_eq!(roman_value("heat"), None);
    }

    #[test]
    fn test_cache_memoizes_and_clears() {
        let mut cache = NameKeyCache::new();
        cache.name_key("Rocky IV");
        cache.name_key("Rocky IV");
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
