//! Conversion between canonical storage encodings and display strings.
//!
//! Date, time and date-time values are stored as fixed-width digit strings
//! (`yyyymmdd`, `hhiiss`, `yyyymmddhhiiss`) so that they sort lexically.
//! What the user sees and types is governed by display templates built from
//! the tokens `yyyy`/`yy`, `mm` (or `MM`), `dd`, `hh`, `ii` and `ss` plus
//! literal separators, e.g. `dd.mm.yyyy` or `hh:ii`.
//!
//! Booleans are stored as `1`/`0` and displayed as `true`/`false`.
//!
//! Templates are validated when they are set; a bad template is a
//! configuration error. Values are validated at conversion time and fail
//! with a [`FormatError`].

use std::fmt;

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FormatConfig;
use crate::error::{EngineError, Result};

pub const CANONICAL_DATE: &str = "yyyymmdd";
pub const CANONICAL_TIME: &str = "hhiiss";
pub const CANONICAL_DATE_TIME: &str = "yyyymmddhhiiss";

const BOOL_TRUE: &str = "1";
const BOOL_FALSE: &str = "0";

/// Separators allowed between tokens, in addition to ASCII digits.
const SEPARATORS: &str = "./: -";

/// Semantic tag layered over a plain physical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Date,
    Time,
    DateTime,
    Boolean,
}

impl LogicalType {
    /// Tag as persisted in the metadata table.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Date => "DATE",
            LogicalType::Time => "TIME",
            LogicalType::DateTime => "DATETIME",
            LogicalType::Boolean => "BOOLEAN",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "DATE" => Some(LogicalType::Date),
            "TIME" => Some(LogicalType::Time),
            "DATETIME" => Some(LogicalType::DateTime),
            "BOOLEAN" => Some(LogicalType::Boolean),
            _ => None,
        }
    }

    pub fn is_temporal(&self) -> bool {
        !matches!(self, LogicalType::Boolean)
    }

    fn units(&self) -> &'static [Unit] {
        match self {
            LogicalType::Date => &[Unit::Year, Unit::Month, Unit::Day],
            LogicalType::Time => &[Unit::Hour, Unit::Minute, Unit::Second],
            LogicalType::DateTime => &ALL_UNITS,
            LogicalType::Boolean => &[],
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion direction for [`FormatEngine::format_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Display string to storage encoding.
    ToCanonical,
    /// Storage encoding to display string.
    ToDisplay,
}

/// Which form a string is in, see [`FormatEngine::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Canonical,
    Display,
    /// Matches both shapes, as with a separator-less display template.
    Both,
    Invalid,
}

/// Value-level conversion failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("'{input}' does not match format '{template}'")]
    Mismatch { input: String, template: String },

    #[error("'{0}' is not a valid calendar value")]
    OutOfRange(String),

    #[error("'{0}' is not a valid {1} value")]
    Invalid(String, LogicalType),

    #[error("unknown unit '{0}'")]
    InvalidUnit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

const ALL_UNITS: [Unit; 6] = [
    Unit::Year,
    Unit::Month,
    Unit::Day,
    Unit::Hour,
    Unit::Minute,
    Unit::Second,
];

impl Unit {
    fn name(&self) -> &'static str {
        match self {
            Unit::Year => "year (yyyy or yy)",
            Unit::Month => "month (mm)",
            Unit::Day => "day (dd)",
            Unit::Hour => "hour (hh)",
            Unit::Minute => "minutes (ii)",
            Unit::Second => "seconds (ss)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year4,
    Year2,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Literal(char),
}

// Longest token first so that `yyyy` wins over `yy`.
const TOKENS: [(&str, Token); 8] = [
    ("yyyy", Token::Year4),
    ("yy", Token::Year2),
    ("mm", Token::Month),
    ("MM", Token::Month),
    ("dd", Token::Day),
    ("hh", Token::Hour),
    ("ii", Token::Minute),
    ("ss", Token::Second),
];

impl Token {
    fn width(&self) -> usize {
        match self {
            Token::Year4 => 4,
            Token::Literal(_) => 1,
            _ => 2,
        }
    }

    fn unit(&self) -> Option<Unit> {
        match self {
            Token::Year4 | Token::Year2 => Some(Unit::Year),
            Token::Month => Some(Unit::Month),
            Token::Day => Some(Unit::Day),
            Token::Hour => Some(Unit::Hour),
            Token::Minute => Some(Unit::Minute),
            Token::Second => Some(Unit::Second),
            Token::Literal(_) => None,
        }
    }
}

fn tokenize(template: &str) -> std::result::Result<Vec<Token>, String> {
    if template.is_empty() {
        return Err("template is empty".to_string());
    }
    let mut tokens = Vec::new();
    let (mut lower_month, mut upper_month) = (false, false);
    let mut rest = template;
    while let Some(c) = rest.chars().next() {
        if let Some((text, token)) = TOKENS.iter().find(|(text, _)| rest.starts_with(text)) {
            match *text {
                "mm" => lower_month = true,
                "MM" => upper_month = true,
                _ => {}
            }
            tokens.push(*token);
            rest = &rest[text.len()..];
            continue;
        }
        if c.is_ascii_digit() || SEPARATORS.contains(c) {
            tokens.push(Token::Literal(c));
            rest = &rest[c.len_utf8()..];
            continue;
        }
        return Err(format!(
            "unsupported character '{}', separators must be digits or one of \"{}\"",
            c, SEPARATORS
        ));
    }
    if lower_month && upper_month {
        return Err("month is given as both 'mm' and 'MM'".to_string());
    }
    Ok(tokens)
}

fn pattern_for(tokens: &[Token]) -> String {
    let mut pattern = String::from("^");
    for token in tokens {
        match token {
            Token::Year4 => pattern.push_str(r"\d{4}"),
            Token::Literal(c) => pattern.push_str(&regex::escape(&c.to_string())),
            _ => pattern.push_str(r"\d{2}"),
        }
    }
    pattern.push('$');
    pattern
}

/// Regular expression matching every string rendered from `template`.
///
/// `dd.mm.yyyy` becomes `^\d{2}\.\d{2}\.\d{4}$`.
pub fn template_to_validation_pattern(template: &str) -> Result<String> {
    let tokens = tokenize(template).map_err(|reason| EngineError::InvalidTemplate {
        template: template.to_string(),
        reason,
    })?;
    Ok(pattern_for(&tokens))
}

/// Broken-down value read from or written to a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            year: 2000,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl Parts {
    fn from_chrono(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
        }
    }

    fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    fn time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
    }

    fn assign(&mut self, token: Token, n: u32) {
        match token {
            Token::Year4 => self.year = n as i32,
            // Two-digit years pivot at 69, as strptime does.
            Token::Year2 => self.year = if n < 69 { 2000 + n as i32 } else { 1900 + n as i32 },
            Token::Month => self.month = n,
            Token::Day => self.day = n,
            Token::Hour => self.hour = n,
            Token::Minute => self.minute = n,
            Token::Second => self.second = n,
            Token::Literal(_) => {}
        }
    }

    fn is_valid(&self, ty: LogicalType) -> bool {
        match ty {
            LogicalType::Date => self.date().is_some(),
            LogicalType::Time => self.time().is_some(),
            LogicalType::DateTime => self.date().is_some() && self.time().is_some(),
            LogicalType::Boolean => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Template {
    source: String,
    tokens: Vec<Token>,
    pattern: Regex,
}

impl Template {
    fn parse(source: &str, ty: LogicalType) -> Result<Self> {
        let invalid = |reason: String| EngineError::InvalidTemplate {
            template: source.to_string(),
            reason,
        };
        let tokens = tokenize(source).map_err(invalid)?;
        let required = ty.units();
        for unit in ALL_UNITS {
            let count = tokens.iter().filter(|t| t.unit() == Some(unit)).count();
            let needed = required.contains(&unit);
            if needed && count == 0 {
                return Err(invalid(format!("{} is missing", unit.name())));
            }
            if count > 1 {
                return Err(invalid(format!("{} appears more than once", unit.name())));
            }
            if !needed && count > 0 {
                return Err(invalid(format!(
                    "{} is not part of a {} value",
                    unit.name(),
                    ty
                )));
            }
        }
        let pattern = Regex::new(&pattern_for(&tokens)).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            tokens,
            pattern,
        })
    }

    fn read(&self, input: &str) -> std::result::Result<Parts, FormatError> {
        let mismatch = || FormatError::Mismatch {
            input: input.to_string(),
            template: self.source.clone(),
        };
        let bytes = input.as_bytes();
        let mut pos = 0;
        let mut parts = Parts::default();
        for token in &self.tokens {
            if let Token::Literal(c) = token {
                if bytes.get(pos).copied() != Some(*c as u8) {
                    return Err(mismatch());
                }
                pos += 1;
                continue;
            }
            let width = token.width();
            let digits = bytes.get(pos..pos + width).ok_or_else(mismatch)?;
            if !digits.iter().all(u8::is_ascii_digit) {
                return Err(mismatch());
            }
            let n = digits
                .iter()
                .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
            parts.assign(*token, n);
            pos += width;
        }
        if pos != bytes.len() {
            return Err(mismatch());
        }
        Ok(parts)
    }

    fn render(&self, parts: &Parts) -> String {
        let mut out = String::with_capacity(self.source.len());
        for token in &self.tokens {
            match token {
                Token::Year4 => out.push_str(&format!("{:04}", parts.year)),
                Token::Year2 => out.push_str(&format!("{:02}", parts.year.rem_euclid(100))),
                Token::Month => out.push_str(&format!("{:02}", parts.month)),
                Token::Day => out.push_str(&format!("{:02}", parts.day)),
                Token::Hour => out.push_str(&format!("{:02}", parts.hour)),
                Token::Minute => out.push_str(&format!("{:02}", parts.minute)),
                Token::Second => out.push_str(&format!("{:02}", parts.second)),
                Token::Literal(c) => out.push(*c),
            }
        }
        out
    }

    fn placeholder(&self) -> String {
        self.tokens
            .iter()
            .map(|t| match t {
                Token::Literal(c) => c.to_string(),
                other => " ".repeat(other.width()),
            })
            .collect()
    }
}

/// Boolean conversion between `1`/`0` and `true`/`false`.
///
/// Conversion to canonical form is lenient: anything that is not `1` or a
/// case-insensitive `true` becomes `0`.
pub fn format_bool(input: &str, direction: Direction) -> String {
    match direction {
        Direction::ToCanonical => {
            if input == BOOL_TRUE || input.eq_ignore_ascii_case("true") {
                BOOL_TRUE.to_string()
            } else {
                BOOL_FALSE.to_string()
            }
        }
        Direction::ToDisplay => {
            if input == BOOL_TRUE {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
    }
}

/// Active display templates plus the fixed canonical ones.
///
/// Built from a [`FormatConfig`] and shared by the tables of a database.
#[derive(Debug, Clone)]
pub struct FormatEngine {
    date: Template,
    time: Template,
    date_time: Template,
    canonical_date: Template,
    canonical_time: Template,
    canonical_date_time: Template,
}

impl FormatEngine {
    pub fn new(config: &FormatConfig) -> Result<Self> {
        Ok(Self {
            date: Template::parse(&config.date_format, LogicalType::Date)?,
            time: Template::parse(&config.time_format, LogicalType::Time)?,
            date_time: Template::parse(&config.date_time_format, LogicalType::DateTime)?,
            canonical_date: Template::parse(CANONICAL_DATE, LogicalType::Date)?,
            canonical_time: Template::parse(CANONICAL_TIME, LogicalType::Time)?,
            canonical_date_time: Template::parse(CANONICAL_DATE_TIME, LogicalType::DateTime)?,
        })
    }

    pub fn set_date_format(&mut self, template: &str) -> Result<()> {
        self.date = Template::parse(template, LogicalType::Date)?;
        Ok(())
    }

    pub fn set_time_format(&mut self, template: &str) -> Result<()> {
        self.time = Template::parse(template, LogicalType::Time)?;
        Ok(())
    }

    pub fn set_date_time_format(&mut self, template: &str) -> Result<()> {
        self.date_time = Template::parse(template, LogicalType::DateTime)?;
        Ok(())
    }

    /// Display templates currently in effect.
    pub fn config(&self) -> FormatConfig {
        FormatConfig {
            date_format: self.date.source.clone(),
            time_format: self.time.source.clone(),
            date_time_format: self.date_time.source.clone(),
        }
    }

    /// (canonical, display) templates; `None` for booleans.
    fn templates(&self, ty: LogicalType) -> Option<(&Template, &Template)> {
        match ty {
            LogicalType::Date => Some((&self.canonical_date, &self.date)),
            LogicalType::Time => Some((&self.canonical_time, &self.time)),
            LogicalType::DateTime => Some((&self.canonical_date_time, &self.date_time)),
            LogicalType::Boolean => None,
        }
    }

    /// Display template for `ty`, empty for booleans.
    pub fn display_template(&self, ty: LogicalType) -> &str {
        self.templates(ty).map_or("", |(_, display)| display.source.as_str())
    }

    /// Convert `input` in the direction given. Empty input stays empty.
    pub fn format_value(
        &self,
        input: &str,
        ty: LogicalType,
        direction: Direction,
    ) -> std::result::Result<String, FormatError> {
        let Some((canonical, display)) = self.templates(ty) else {
            return Ok(format_bool(input, direction));
        };
        if input.is_empty() {
            return Ok(String::new());
        }
        let (from, to) = match direction {
            Direction::ToCanonical => (display, canonical),
            Direction::ToDisplay => (canonical, display),
        };
        let parts = from.read(input)?;
        if !parts.is_valid(ty) {
            return Err(FormatError::OutOfRange(input.to_string()));
        }
        Ok(to.render(&parts))
    }

    /// Check that `input` is a valid value in the form `direction` produces.
    pub fn check_consistency(
        &self,
        input: &str,
        ty: LogicalType,
        direction: Direction,
    ) -> std::result::Result<(), FormatError> {
        if input.is_empty() {
            return Ok(());
        }
        let Some((canonical, display)) = self.templates(ty) else {
            let ok = match direction {
                Direction::ToCanonical => input == BOOL_TRUE || input == BOOL_FALSE,
                Direction::ToDisplay => input == "true" || input == "false",
            };
            return if ok {
                Ok(())
            } else {
                Err(FormatError::Invalid(input.to_string(), ty))
            };
        };
        let template = match direction {
            Direction::ToCanonical => canonical,
            Direction::ToDisplay => display,
        };
        if template.read(input)?.is_valid(ty) {
            Ok(())
        } else {
            Err(FormatError::OutOfRange(input.to_string()))
        }
    }

    /// Shape check only.
    pub fn classify(&self, input: &str, ty: LogicalType) -> Classification {
        let Some((canonical, display)) = self.templates(ty) else {
            return if input == BOOL_TRUE || input == BOOL_FALSE {
                Classification::Canonical
            } else if input.eq_ignore_ascii_case("true") || input.eq_ignore_ascii_case("false") {
                Classification::Display
            } else {
                Classification::Invalid
            };
        };
        match (
            canonical.pattern.is_match(input),
            display.pattern.is_match(input),
        ) {
            (true, true) => Classification::Both,
            (true, false) => Classification::Canonical,
            (false, true) => Classification::Display,
            (false, false) => Classification::Invalid,
        }
    }

    /// Bring user input into canonical form and validate it.
    ///
    /// Input that fits both shapes is kept when it is a valid canonical
    /// value and read as display form otherwise.
    pub fn to_canonical(
        &self,
        input: &str,
        ty: LogicalType,
    ) -> std::result::Result<String, FormatError> {
        if input.is_empty() {
            return Ok(String::new());
        }
        let canonical = match self.classify(input, ty) {
            Classification::Canonical => input.to_string(),
            Classification::Both
                if self
                    .check_consistency(input, ty, Direction::ToCanonical)
                    .is_ok() =>
            {
                input.to_string()
            }
            Classification::Display | Classification::Both => {
                self.format_value(input, ty, Direction::ToCanonical)?
            }
            Classification::Invalid => {
                return Err(FormatError::Mismatch {
                    input: input.to_string(),
                    template: self.display_template(ty).to_string(),
                })
            }
        };
        self.check_consistency(&canonical, ty, Direction::ToCanonical)?;
        Ok(canonical)
    }

    /// Display template with every token blanked out, for input masks.
    pub fn placeholder(&self, ty: LogicalType) -> String {
        self.templates(ty)
            .map(|(_, display)| display.placeholder())
            .unwrap_or_default()
    }

    pub fn today(&self) -> String {
        let now = Local::now().naive_local();
        self.date.render(&Parts::from_chrono(now.date(), now.time()))
    }

    pub fn now_time(&self) -> String {
        let now = Local::now().naive_local();
        self.time.render(&Parts::from_chrono(now.date(), now.time()))
    }

    pub fn now(&self) -> String {
        let now = Local::now().naive_local();
        self.date_time
            .render(&Parts::from_chrono(now.date(), now.time()))
    }

    fn read_date(&self, input: &str) -> std::result::Result<NaiveDate, FormatError> {
        self.date
            .read(input)?
            .date()
            .ok_or_else(|| FormatError::OutOfRange(input.to_string()))
    }

    fn read_time(&self, input: &str) -> std::result::Result<NaiveTime, FormatError> {
        self.time
            .read(input)?
            .time()
            .ok_or_else(|| FormatError::OutOfRange(input.to_string()))
    }

    /// Difference `end - start` of two display dates in days (`d`), weeks
    /// (`w`), 30-day months (`m`) or 365-day years (`y`).
    pub fn date_diff(
        &self,
        start: &str,
        end: &str,
        unit: &str,
    ) -> std::result::Result<i64, FormatError> {
        let divisor = match unit {
            "d" | "D" => 1,
            "w" | "W" => 7,
            "m" | "M" => 30,
            "y" | "Y" => 365,
            other => return Err(FormatError::InvalidUnit(other.to_string())),
        };
        let days = (self.read_date(end)? - self.read_date(start)?).num_days();
        Ok(days / divisor)
    }

    /// Difference `end - start` of two display times in hours (`h`),
    /// minutes (`m`) or seconds (`s`).
    pub fn time_diff(
        &self,
        start: &str,
        end: &str,
        unit: &str,
    ) -> std::result::Result<i64, FormatError> {
        let divisor = match unit {
            "h" | "H" => 3600,
            "m" | "M" => 60,
            "s" | "S" => 1,
            other => return Err(FormatError::InvalidUnit(other.to_string())),
        };
        let seconds = (self.read_time(end)? - self.read_time(start)?).num_seconds();
        Ok(seconds / divisor)
    }

    /// Shift a display date. Month arithmetic clamps to the end of month.
    pub fn date_add(
        &self,
        date: &str,
        years: i32,
        months: i32,
        days: i64,
    ) -> std::result::Result<String, FormatError> {
        let start = self.read_date(date)?;
        let shifted = years
            .checked_mul(12)
            .and_then(|y| y.checked_add(months))
            .and_then(|total| {
                if total >= 0 {
                    start.checked_add_months(Months::new(total.unsigned_abs()))
                } else {
                    start.checked_sub_months(Months::new(total.unsigned_abs()))
                }
            })
            .and_then(|d| d.checked_add_signed(Duration::try_days(days)?))
            .ok_or_else(|| FormatError::OutOfRange(date.to_string()))?;
        Ok(self
            .date
            .render(&Parts::from_chrono(shifted, NaiveTime::default())))
    }

    /// Shift a display time, wrapping around midnight.
    pub fn time_add(
        &self,
        time: &str,
        hours: i64,
        minutes: i64,
        seconds: i64,
    ) -> std::result::Result<String, FormatError> {
        let start = self.read_time(time)?;
        let delta = hours
            .checked_mul(3600)
            .zip(minutes.checked_mul(60))
            .and_then(|(h, m)| h.checked_add(m)?.checked_add(seconds))
            .and_then(Duration::try_seconds)
            .ok_or_else(|| FormatError::OutOfRange(time.to_string()))?;
        let (shifted, _) = start.overflowing_add_signed(delta);
        Ok(self
            .time
            .render(&Parts::from_chrono(NaiveDate::MIN, shifted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FormatEngine {
        FormatEngine::new(&FormatConfig::default()).unwrap()
    }

    #[test]
    fn test_validation_pattern() {
        let p = template_to_validation_pattern("dd.mm.yyyy").unwrap();
        assert_eq!(p, r"^\d{2}\.\d{2}\.\d{4}$");
        let re = Regex::new(&p).unwrap();
        assert!(re.is_match("01.02.2024"));
        assert!(!re.is_match("1.02.2024"));
    }

    #[test]
    fn test_date_to_display_and_back() {
        let f = engine();
        let shown = f
            .format_value("20240615", LogicalType::Date, Direction::ToDisplay)
            .unwrap();
        assert_eq!(shown, "15.06.2024");
        let stored = f
            .format_value(&shown, LogicalType::Date, Direction::ToCanonical)
            .unwrap();
        assert_eq!(stored, "20240615");
    }

    #[test]
    fn test_round_trip_all_temporal_types() {
        let f = engine();
        let cases = [
            (LogicalType::Date, "19991231"),
            (LogicalType::Time, "235959"),
            (LogicalType::DateTime, "20240229081500"),
        ];
        for (ty, canonical) in cases {
            let shown = f.format_value(canonical, ty, Direction::ToDisplay).unwrap();
            let back = f.format_value(&shown, ty, Direction::ToCanonical).unwrap();
            assert_eq!(back, canonical, "{:?}", ty);
        }
    }

    #[test]
    fn test_empty_input_passes_through() {
        let f = engine();
        assert_eq!(
            f.format_value("", LogicalType::DateTime, Direction::ToCanonical)
                .unwrap(),
            ""
        );
        assert!(f
            .check_consistency("", LogicalType::Date, Direction::ToCanonical)
            .is_ok());
    }

    #[test]
    fn test_malformed_value_is_format_error() {
        let f = engine();
        let err = f
            .format_value("2024-06-15", LogicalType::Date, Direction::ToCanonical)
            .unwrap_err();
        assert!(matches!(err, FormatError::Mismatch { .. }));
        let err = f
            .format_value("31.02.2024", LogicalType::Date, Direction::ToCanonical)
            .unwrap_err();
        assert_eq!(err, FormatError::OutOfRange("31.02.2024".into()));
    }

    #[test]
    fn test_two_digit_year_pivot() {
        let mut f = engine();
        f.set_date_format("dd/mm/yy").unwrap();
        let to_canonical = |s| {
            f.format_value(s, LogicalType::Date, Direction::ToCanonical)
                .unwrap()
        };
        assert_eq!(to_canonical("01/01/24"), "20240101");
        assert_eq!(to_canonical("01/01/70"), "19700101");
    }

    #[test]
    fn test_template_errors_raised_when_set() {
        let mut f = engine();
        for bad in ["", "dd.mm", "dd.mm.yyyy.yy", "dd.mm.MM.yyyy", "dd,mm,yyyy", "yyyy-mm-dd hh"] {
            let err = f.set_date_format(bad).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidTemplate { .. }),
                "{bad}: {err}"
            );
        }
        assert!(f.set_time_format("hh:ii").is_err());
        assert!(f.set_date_format("MM/dd/yyyy").is_ok());
        assert_eq!(f.config().date_format, "MM/dd/yyyy");
    }

    #[test]
    fn test_bool_conversion() {
        assert_eq!(format_bool("TRUE", Direction::ToCanonical), "1");
        assert_eq!(format_bool("1", Direction::ToCanonical), "1");
        assert_eq!(format_bool("0", Direction::ToCanonical), "0");
        assert_eq!(format_bool("yes", Direction::ToCanonical), "0");
        assert_eq!(format_bool("1", Direction::ToDisplay), "true");
        assert_eq!(format_bool("7", Direction::ToDisplay), "false");
    }

    #[test]
    fn test_classify() {
        let f = engine();
        assert_eq!(
            f.classify("20240101", LogicalType::Date),
            Classification::Canonical
        );
        assert_eq!(
            f.classify("01.01.2024", LogicalType::Date),
            Classification::Display
        );
        assert_eq!(f.classify("Jan 1", LogicalType::Date), Classification::Invalid);
        assert_eq!(f.classify("True", LogicalType::Boolean), Classification::Display);
        assert_eq!(f.classify("0", LogicalType::Boolean), Classification::Canonical);
    }

    #[test]
    fn test_separator_less_display_template() {
        let f = FormatEngine::new(&FormatConfig {
            date_format: "ddmmyyyy".into(),
            ..FormatConfig::default()
        })
        .unwrap();
        assert_eq!(f.classify("15062024", LogicalType::Date), Classification::Both);
        assert_eq!(f.to_canonical("15062024", LogicalType::Date).unwrap(), "20240615");
        // A valid canonical value wins over the display reading.
        assert_eq!(f.to_canonical("20240615", LogicalType::Date).unwrap(), "20240615");
        assert!(matches!(
            f.to_canonical("99999999", LogicalType::Date),
            Err(FormatError::OutOfRange(_))
        ));
        assert_eq!(f.to_canonical("", LogicalType::Date).unwrap(), "");
    }

    #[test]
    fn test_to_canonical_default_templates() {
        let f = engine();
        assert_eq!(f.to_canonical("15.06.2024", LogicalType::Date).unwrap(), "20240615");
        assert_eq!(f.to_canonical("20240615", LogicalType::Date).unwrap(), "20240615");
        assert!(matches!(
            f.to_canonical("June 15", LogicalType::Date),
            Err(FormatError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_placeholder() {
        let f = engine();
        assert_eq!(f.placeholder(LogicalType::Date), "  .  .    ");
        assert_eq!(f.placeholder(LogicalType::Boolean), "");
    }

    #[test]
    fn test_date_arithmetic() {
        let f = engine();
        assert_eq!(f.date_diff("01.01.2024", "31.01.2024", "d").unwrap(), 30);
        assert_eq!(f.date_diff("01.01.2024", "15.01.2024", "w").unwrap(), 2);
        assert!(matches!(
            f.date_diff("01.01.2024", "31.01.2024", "q"),
            Err(FormatError::InvalidUnit(_))
        ));
        assert_eq!(f.date_add("31.01.2024", 0, 1, 0).unwrap(), "29.02.2024");
        assert_eq!(f.date_add("01.03.2024", -1, 0, -1).unwrap(), "28.02.2023");
        assert_eq!(f.time_diff("10:00:00", "12:30:00", "m").unwrap(), 150);
        assert_eq!(f.time_add("23:30:00", 1, 0, 0).unwrap(), "00:30:00");
    }

    #[test]
    fn test_arithmetic_overflow_is_out_of_range() {
        let f = engine();
        assert!(matches!(
            f.date_add("01.01.2024", 0, 0, i64::MAX),
            Err(FormatError::OutOfRange(_))
        ));
        assert!(matches!(
            f.date_add("01.01.2024", i32::MAX, 0, 0),
            Err(FormatError::OutOfRange(_))
        ));
        assert!(matches!(
            f.time_add("10:00:00", i64::MAX / 1000, 0, 0),
            Err(FormatError::OutOfRange(_))
        ));
        assert_eq!(f.time_add("10:00:00", 0, 0, -36_000).unwrap(), "00:00:00");
    }
}
