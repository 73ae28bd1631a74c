//! Birth/survival rule tables for Life-like automata.

use std::fmt;
use std::str::FromStr;

use crate::automaton::grid::NEIGHBORS;
use crate::error::{ConfigError, RuleKind};

/// Membership table over neighbor counts `0..=8`.
pub type CountTable = [bool; NEIGHBORS + 1];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleSet {
    birth: CountTable,
    survive: CountTable,
}

/// Parse a digit string into a count table.
///
/// Non-digit characters are ignored and repeated digits are harmless. A `9`
/// can never match an 8-neighbor count and is rejected.
pub fn parse_counts(digits: &str, kind: RuleKind) -> Result<CountTable, ConfigError> {
    let mut table = [false; NEIGHBORS + 1];
    for digit in digits.chars().filter_map(|c| c.to_digit(10)) {
        let slot = table
            .get_mut(digit as usize)
            .ok_or(ConfigError::NeighborCountOutOfRange { kind, digit })?;
        *slot = true;
    }
    Ok(table)
}

impl RuleSet {
    pub fn parse(birth: &str, survive: &str) -> Result<Self, ConfigError> {
        Ok(RuleSet {
            birth: parse_counts(birth, RuleKind::Birth)?,
            survive: parse_counts(survive, RuleKind::Survive)?,
        })
    }

    /// Conway's Life, B3/S23.
    pub fn conway() -> Self {
        let mut birth = [false; NEIGHBORS + 1];
        let mut survive = [false; NEIGHBORS + 1];
        birth[3] = true;
        survive[2] = true;
        survive[3] = true;
        RuleSet { birth, survive }
    }

    #[inline]
    pub fn births_on(&self, count: usize) -> bool {
        self.birth[count]
    }

    #[inline]
    pub fn survives_on(&self, count: usize) -> bool {
        self.survive[count]
    }

    /// Next state of a cell with `count` live neighbors.
    #[inline]
    pub fn next_state(&self, alive: bool, count: usize) -> bool {
        if alive {
            self.survive[count]
        } else {
            self.birth[count]
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet::conway()
    }
}

/// Accepts `B3/S23` style notation, case-insensitive.
impl FromStr for RuleSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidNotation(s.to_string());
        let (birth, survive) = s.trim().split_once('/').ok_or_else(invalid)?;

        let strip = |part: &str, prefix: char| -> Option<String> {
            let mut chars = part.trim().chars();
            let first = chars.next()?;
            if first.eq_ignore_ascii_case(&prefix) {
                Some(chars.collect())
            } else {
                None
            }
        };

        let birth = strip(birth, 'b').ok_or_else(invalid)?;
        let survive = strip(survive, 's').ok_or_else(invalid)?;
        RuleSet::parse(&birth, &survive)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = |table: &CountTable| -> String {
            (0..=NEIGHBORS)
                .filter(|&count| table[count])
                .map(|count| char::from(b'0' + count as u8))
                .collect()
        };
        write!(f, "B{}/S{}", digits(&self.birth), digits(&self.survive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conway() {
        let rules = RuleSet::parse("3", "23").unwrap();
        assert_eq!(rules, RuleSet::conway());
        assert!(rules.births_on(3));
        assert!(!rules.births_on(2));
        assert!(rules.survives_on(2));
        assert!(rules.survives_on(3));
        assert!(!rules.survives_on(4));
    }

    #[test]
    fn test_non_digits_ignored() {
        let table = parse_counts("a3, 6;x", RuleKind::Birth).unwrap();
        let on: Vec<usize> = (0..=8).filter(|&n| table[n]).collect();
        assert_eq!(on, vec![3, 6]);
    }

    #[test]
    fn test_duplicates_idempotent() {
        assert_eq!(
            parse_counts("3333", RuleKind::Birth).unwrap(),
            parse_counts("3", RuleKind::Birth).unwrap()
        );
    }

    #[test]
    fn test_empty_string_matches_nothing() {
        let table = parse_counts("", RuleKind::Survive).unwrap();
        assert!(table.iter().all(|&on| !on));
    }

    #[test]
    fn test_digit_nine_rejected() {
        let err = RuleSet::parse("3", "239").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NeighborCountOutOfRange {
                kind: RuleKind::Survive,
                digit: 9
            }
        ));

        let err = RuleSet::parse("9", "23").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NeighborCountOutOfRange {
                kind: RuleKind::Birth,
                digit: 9
            }
        ));
    }

    #[test]
    fn test_full_range_accepted() {
        let rules = RuleSet::parse("012345678", "").unwrap();
        assert!((0..=8).all(|n| rules.births_on(n)));
    }

    #[test]
    fn test_next_state() {
        let rules = RuleSet::conway();
        assert!(rules.next_state(false, 3));
        assert!(!rules.next_state(false, 2));
        assert!(rules.next_state(true, 2));
        assert!(!rules.next_state(true, 1));
        assert!(!rules.next_state(true, 8));
    }

    #[test]
    fn test_notation() {
        let highlife: RuleSet = "B36/S23".parse().unwrap();
        assert_eq!(highlife, RuleSet::parse("36", "23").unwrap());
        assert_eq!(highlife.to_string(), "B36/S23");

        let lower: RuleSet = " b3 / s23 ".parse().unwrap();
        assert_eq!(lower, RuleSet::conway());

        assert!(matches!(
            "B3S23".parse::<RuleSet>(),
            Err(ConfigError::InvalidNotation(_))
        ));
        assert!(matches!(
            "S23/B3".parse::<RuleSet>(),
            Err(ConfigError::InvalidNotation(_))
        ));
        assert!(matches!(
            "B9/S23".parse::<RuleSet>(),
            Err(ConfigError::NeighborCountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_display_empty_sets() {
        let rules = RuleSet::parse("", "").unwrap();
        assert_eq!(rules.to_string(), "B/S");
    }
}
