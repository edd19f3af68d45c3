use crate::errors::HarnessError;
use chrono::NaiveDate;

/// Strict parsers for caller-supplied parameter values. Every failure names
/// the parameter so the caller can point at the offending field.
#[derive(Clone, Copy, Debug, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    /// Parses a base-10 integer. Leading `+`, blanks inside the number,
    /// decimals and overflow are all rejected; nothing is coerced to zero.
    pub fn ensure_integer(&self, raw: &str, name: &str) -> Result<i64, HarnessError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HarnessError::invalid_parameter(name, "must not be empty"));
        }
        let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HarnessError::invalid_parameter(name, "must be an integer"));
        }
        trimmed
            .parse::<i64>()
            .map_err(|_| HarnessError::invalid_parameter(name, "is out of range"))
    }

    pub fn ensure_positive_integer(&self, raw: &str, name: &str) -> Result<u64, HarnessError> {
        let value = self.ensure_integer(raw, name)?;
        if value <= 0 {
            return Err(HarnessError::invalid_parameter(name, "must be positive"));
        }
        Ok(value as u64)
    }

    pub fn ensure_date(&self, raw: &str, name: &str) -> Result<NaiveDate, HarnessError> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
            HarnessError::invalid_parameter(name, "must be a date in YYYY-MM-DD format")
        })
    }

    pub fn ensure_text(&self, raw: &str, name: &str) -> Result<String, HarnessError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HarnessError::invalid_parameter(name, "must not be empty"));
        }
        if trimmed.contains('\0') {
            return Err(HarnessError::invalid_parameter(
                name,
                "must not contain null bytes",
            ));
        }
        Ok(trimmed.to_string())
    }
}
