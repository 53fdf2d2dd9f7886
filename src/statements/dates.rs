//! Date header normalization
//!
//! Statement exports label their period columns in whatever notation the vendor
//! or locale prefers: `2024-12-31`, `2024/12/31`, `31/12/2024`, `2024年12月31日`,
//! `2024年第三季度`, `Dec 31, 2024 00:00:00`, Excel date cells... All of them are
//! reduced to a `NaiveDate` here. Anything that cannot be read as a date is kept
//! as a plain label and never aborts parsing.

use chrono::{DateTime, Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::Cell;

/// Patterns with a four-digit year, tried in order
const FULL_YEAR_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%Y.%m.%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Two-digit year patterns, only tried once every four-digit pattern failed.
/// Year-first wins, so `24/12/31` reads like `2024/12/31`.
const SHORT_YEAR_FORMATS: &[&str] = &["%y-%m-%d", "%y/%m/%d", "%d/%m/%y", "%d-%b-%y"];

static TIME_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:T|\s+)\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?\s*(?:am|pm)?\s*(?:z|utc|gmt|[+-]\d{2}:?\d{2})?\s*$",
    )
    .expect("time suffix pattern is valid")
});

static QUARTER_CJK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2,4})\s*年?\s*第?\s*([一二三四1-4])\s*季度?$")
        .expect("quarter pattern is valid")
});

static QUARTER_YEAR_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{2,4})\s*[-/ ]?\s*q([1-4])$").expect("quarter pattern is valid")
});

static QUARTER_YEAR_LAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^q([1-4])\s*[-/ ]?\s*(\d{2,4})$").expect("quarter pattern is valid")
});

static LOOSE_YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})\D{1,3}(\d{1,2})\D{1,3}(\d{1,2})").expect("loose date pattern is valid")
});

/// A column header after normalization
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnHeader {
    /// A reporting period end date
    Period(NaiveDate),
    /// Anything else (item-name columns, notes, unparseable headers), kept verbatim
    Label(String),
}

impl ColumnHeader {
    pub fn period(&self) -> Option<NaiveDate> {
        match self {
            ColumnHeader::Period(date) => Some(*date),
            ColumnHeader::Label(_) => None,
        }
    }
}

/// Normalize a header cell of unknown type
pub fn normalize_header(cell: &Cell) -> ColumnHeader {
    match cell {
        Cell::Date(date) => ColumnHeader::Period(*date),
        Cell::Number(n) => match date_from_number(*n) {
            Some(date) => ColumnHeader::Period(date),
            None => ColumnHeader::Label(cell.to_string()),
        },
        Cell::Text(text) => match normalize_date(text) {
            Some(date) => ColumnHeader::Period(date),
            None => ColumnHeader::Label(text.clone()),
        },
        Cell::Empty => ColumnHeader::Label(String::new()),
    }
}

/// Parse a textual date in any supported notation.
///
/// Quarter notations map to the first day of the quarter's last month
/// (Q1 → 03-01, Q2 → 06-01, Q3 → 09-01, Q4 → 12-01).
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let full: String = raw.nfkc().collect();
    let full = full.trim();
    let stripped = TIME_SUFFIX.replace(full, "");
    let text = stripped.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_quarter(text) {
        return Some(date);
    }

    if text.contains(['年', '月', '日']) {
        let slashed: String = text
            .replace('年', "/")
            .replace('月', "/")
            .replace('日', "")
            .split_whitespace()
            .collect();
        return parse_with(&slashed, &["%Y/%m/%d"], true)
            .or_else(|| parse_with(&slashed, &["%y/%m/%d"], false));
    }

    parse_with(text, FULL_YEAR_FORMATS, true)
        .or_else(|| parse_with(text, SHORT_YEAR_FORMATS, false))
        .or_else(|| parse_generic(full, text))
}

fn parse_with(text: &str, formats: &[&str], full_year: bool) -> Option<NaiveDate> {
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            // %Y happily reads "24" as year 24; leave those to the %y patterns
            .filter(|date| !full_year || date.year() >= 1000)
    })
}

fn parse_quarter(text: &str) -> Option<NaiveDate> {
    let (year, quarter) = if let Some(caps) = QUARTER_CJK.captures(text) {
        (caps[1].to_string(), quarter_ordinal(&caps[2])?)
    } else if let Some(caps) = QUARTER_YEAR_FIRST.captures(text) {
        (caps[1].to_string(), quarter_ordinal(&caps[2])?)
    } else if let Some(caps) = QUARTER_YEAR_LAST.captures(text) {
        (caps[2].to_string(), quarter_ordinal(&caps[1])?)
    } else {
        return None;
    };

    let year = expand_year(year.parse().ok()?, year.len());
    NaiveDate::from_ymd_opt(year, quarter * 3, 1)
}

fn quarter_ordinal(marker: &str) -> Option<u32> {
    match marker {
        "一" | "1" => Some(1),
        "二" | "2" => Some(2),
        "三" | "3" => Some(3),
        "四" | "4" => Some(4),
        _ => None,
    }
}

/// Two-digit years follow chrono's `%y` window: 00-68 → 2000s, 69-99 → 1900s
fn expand_year(year: i32, digits: usize) -> i32 {
    match digits {
        2 if year < 69 => 2000 + year,
        2 => 1900 + year,
        _ => year,
    }
}

/// `YYYYMMDD` integers, as some exports write period headers as plain numbers
fn date_from_number(n: f64) -> Option<NaiveDate> {
    if !n.is_finite() || n.fract() != 0.0 || !(10_000_101.0..=99_991_231.0).contains(&n) {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{}", n as i64), "%Y%m%d").ok()
}

/// Last resort: full timestamps (checked before the time suffix was cut), then any
/// `YYYY?M?D` run inside the stripped text
fn parse_generic(full: &str, stripped: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(full) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(full) {
        return Some(dt.date_naive());
    }
    let caps = LOOSE_YMD.captures(stripped)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_equivalent_notations_normalize_to_same_date() {
        let expected = Some(date(2024, 12, 31));
        for raw in [
            "2024-12-31",
            "2024/12/31",
            "2024年12月31日",
            "20241231",
            "2024.12.31",
            "31/12/2024",
            "12/31/2024",
            "31-Dec-2024",
            "Dec 31, 2024",
            "December 31, 2024",
            "24-12-31",
            "24/12/31",
            "24年12月31日",
            "２０２４年１２月３１日",
        ] {
            assert_eq!(normalize_date(raw), expected, "input: {}", raw);
        }
    }

    #[test]
    fn test_two_digit_slash_dates_read_year_first() {
        assert_eq!(normalize_date("24/12/31"), Some(date(2024, 12, 31)));
        assert_eq!(normalize_date("24/06/30"), Some(date(2024, 6, 30)));
        // no valid year-first reading, so day-first applies
        assert_eq!(normalize_date("31/12/99"), Some(date(1999, 12, 31)));
        assert_eq!(normalize_date("30-Jun-24"), Some(date(2024, 6, 30)));
    }

    #[test]
    fn test_time_of_day_suffix_is_trimmed() {
        let expected = Some(date(2024, 6, 30));
        assert_eq!(normalize_date("2024-06-30 00:00:00"), expected);
        assert_eq!(normalize_date("2024/06/30 12:30"), expected);
        assert_eq!(normalize_date("2024-06-30T00:00:00"), expected);
        assert_eq!(normalize_date("2024-06-30T08:15:00+08:00"), expected);
        assert_eq!(normalize_date("Jun 30, 2024 11:00 PM"), expected);
    }

    #[test]
    fn test_quarter_notation_maps_to_quarter_end_month() {
        assert_eq!(normalize_date("2024年第一季度"), Some(date(2024, 3, 1)));
        assert_eq!(normalize_date("2024年二季度"), Some(date(2024, 6, 1)));
        assert_eq!(normalize_date("2024年第3季度"), Some(date(2024, 9, 1)));
        assert_eq!(normalize_date("2024Q4"), Some(date(2024, 12, 1)));
        assert_eq!(normalize_date("2023 q2"), Some(date(2023, 6, 1)));
        assert_eq!(normalize_date("Q3 2022"), Some(date(2022, 9, 1)));
        assert_eq!(normalize_date("24Q1"), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_unparseable_text_is_a_failure_not_a_panic() {
        assert_eq!(normalize_date("项目"), None);
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("   "), None);
        assert_eq!(normalize_date("2024"), None);
        assert_eq!(normalize_date("2024-13-45"), None);
        assert_eq!(normalize_date("2024年第五季度"), None);
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(
            normalize_date("Tue, 31 Dec 2024 10:00:00 +0800"),
            Some(date(2024, 12, 31))
        );
        assert_eq!(normalize_date("FY 2024-12-31 restated"), Some(date(2024, 12, 31)));
    }

    #[test]
    fn test_normalize_header_cells() {
        assert_eq!(
            normalize_header(&Cell::Date(date(2023, 3, 31))),
            ColumnHeader::Period(date(2023, 3, 31))
        );
        assert_eq!(
            normalize_header(&Cell::Number(20230630.0)),
            ColumnHeader::Period(date(2023, 6, 30))
        );
        assert_eq!(
            normalize_header(&Cell::Number(2023.0)),
            ColumnHeader::Label("2023".to_string())
        );
        assert_eq!(
            normalize_header(&Cell::text("项目")),
            ColumnHeader::Label("项目".to_string())
        );
        assert_eq!(normalize_header(&Cell::Empty).period(), None);
    }
}
