//! Step parsing
//!
//! Query resolutions arrive as human strings: "60s", "5m", "1h", "2d" or a
//! bare number of seconds.

use crate::fetch::error::{FetchError, FetchResult};
use regex::Regex;
use std::sync::OnceLock;

fn step_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*(\d+)\s*([A-Za-z]*)\s*$").expect("valid step regex"))
}

/// Parse a step string into whole seconds
///
/// Unknown unit suffixes fall back to treating the number as seconds.
pub fn parse_step(step: &str) -> FetchResult<i64> {
    let caps = step_pattern()
        .captures(step)
        .ok_or_else(|| FetchError::InvalidStep(step.to_string()))?;

    let amount: i64 = caps[1]
        .parse()
        .map_err(|_| FetchError::InvalidStep(step.to_string()))?;

    let multiplier = match &caps[2] {
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => 1,
    };

    let seconds = amount
        .checked_mul(multiplier)
        .ok_or_else(|| FetchError::InvalidStep(step.to_string()))?;

    if seconds <= 0 {
        return Err(FetchError::InvalidStep(step.to_string()));
    }

    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(parse_step("60s").unwrap(), 60);
        assert_eq!(parse_step("5m").unwrap(), 300);
        assert_eq!(parse_step("1h").unwrap(), 3600);
        assert_eq!(parse_step("2d").unwrap(), 172_800);
    }

    #[test]
    fn test_bare_integer() {
        assert_eq!(parse_step("15").unwrap(), 15);
        assert_eq!(parse_step(" 30 ").unwrap(), 30);
    }

    #[test]
    fn test_unknown_unit_falls_back_to_seconds() {
        assert_eq!(parse_step("7x").unwrap(), 7);
        assert_eq!(parse_step("3w").unwrap(), 3);
    }

    #[test]
    fn test_invalid_steps() {
        assert!(matches!(parse_step(""), Err(FetchError::InvalidStep(_))));
        assert!(matches!(parse_step("m"), Err(FetchError::InvalidStep(_))));
        assert!(matches!(parse_step("0s"), Err(FetchError::InvalidStep(_))));
        assert!(matches!(parse_step("1.5m"), Err(FetchError::InvalidStep(_))));
    }
}
