//! Conversion of raw report cells into finite numbers.
//!
//! Source reports compress large counts with a `w` suffix (×10,000, so
//! `"1.5w"` is 15,000) and decorate growth cells with `+`. Both are treated as
//! formatting only.

use crate::schema::CellValue;

/// Multiplier denoted by the myriad marker.
pub const MYRIAD: f64 = 10_000.0;

const MYRIAD_MARKER: char = 'w';

/// Normalizes one raw cell.
///
/// Numeric cells pass through untouched, including NaN and infinities; those are
/// caught later by [`crate::accessor::guard`]. Text is parsed with
/// [`parse_metric_text`]; empty cells are 0.
pub fn normalize_cell(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(text) => parse_metric_text(text),
        CellValue::Empty => 0.0,
    }
}

/// Parses report text into a finite number. Never fails: anything unparseable is 0.
pub fn parse_metric_text(text: &str) -> f64 {
    let cleaned: String = text.trim().chars().filter(|c| *c != '+').collect();

    let value = if cleaned
        .chars()
        .any(|c| c.eq_ignore_ascii_case(&MYRIAD_MARKER))
    {
        let remainder: String = cleaned
            .chars()
            .filter(|c| !c.eq_ignore_ascii_case(&MYRIAD_MARKER) && *c != '+')
            .collect();
        leading_float(&remainder).map(|v| v * MYRIAD)
    } else {
        leading_float(&cleaned)
    };

    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Parses the longest leading decimal literal (`-12.5e3abc` gives -12500).
fn leading_float(text: &str) -> Option<f64> {
    fast_float::parse_partial::<f64, _>(text.trim_start())
        .ok()
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_myriad_marker() {
        assert_eq!(parse_metric_text("1.5w"), 15_000.0);
        assert_eq!(parse_metric_text("1.5W"), 15_000.0);
        assert_eq!(parse_metric_text(" 10w+ "), 100_000.0);
        assert_eq!(parse_metric_text("+2.35w"), 23_500.0);
    }

    #[test]
    fn test_plus_annotation_is_stripped() {
        assert_eq!(parse_metric_text("+23"), 23.0);
        assert_eq!(parse_metric_text("300+"), 300.0);
        assert_eq!(parse_metric_text("+ 7"), 7.0);
    }

    #[test]
    fn test_unparseable_text_is_zero() {
        assert_eq!(parse_metric_text(""), 0.0);
        assert_eq!(parse_metric_text("   "), 0.0);
        assert_eq!(parse_metric_text("abc"), 0.0);
        assert_eq!(parse_metric_text("w"), 0.0);
        assert_eq!(parse_metric_text("-"), 0.0);
        assert_eq!(parse_metric_text("."), 0.0);
    }

    #[test]
    fn test_leading_literal_is_used() {
        assert_eq!(parse_metric_text("12abc"), 12.0);
        assert_eq!(parse_metric_text("-4.5"), -4.5);
        assert_eq!(parse_metric_text(".5"), 0.5);
        assert_eq!(parse_metric_text("1e3"), 1_000.0);
        assert_eq!(parse_metric_text("2e"), 2.0);
        assert_eq!(parse_metric_text("1."), 1.0);
        assert_eq!(parse_metric_text("-.5"), -0.5);
        assert_eq!(parse_metric_text("--3"), 0.0);
    }

    #[test]
    fn test_marker_position_and_exponent() {
        assert_eq!(parse_metric_text("1e3w"), 10_000_000.0);
        assert_eq!(parse_metric_text("w1.5"), 15_000.0);
    }

    #[test]
    fn test_out_of_range_text_is_zero() {
        assert_eq!(parse_metric_text("1e-400"), 0.0);
        assert_eq!(parse_metric_text(&"9".repeat(400)), 0.0);
    }

    #[test]
    fn test_text_never_yields_non_finite() {
        for input in ["inf", "Infinity", "NaN", "-inf", "1e400", "1e305w", "1e309+"] {
            let value = parse_metric_text(input);
            assert!(value.is_finite(), "{input} produced {value}");
        }
    }

    #[test]
    fn test_numeric_cells_pass_through() {
        assert_eq!(normalize_cell(&CellValue::Number(42.5)), 42.5);
        assert!(normalize_cell(&CellValue::Number(f64::NAN)).is_nan());
        assert_eq!(
            normalize_cell(&CellValue::Number(f64::INFINITY)),
            f64::INFINITY
        );
        assert_eq!(normalize_cell(&CellValue::Empty), 0.0);
        assert_eq!(normalize_cell(&CellValue::from("1.2w")), 12_000.0);
    }
}
