//! Request validation rules. Each check returns the cleaned-up value so
//! callers never persist untrimmed input.

use chrono::{DateTime, Duration, Utc};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2_000;
pub const MAX_MESSAGE_LEN: usize = 32_000;
pub const MAX_DRAFT_CONTENT_LEN: usize = 100_000;
pub const DEFAULT_SNOOZE_MINUTES: i64 = 15;
/// One week.
pub const MAX_SNOOZE_MINUTES: i64 = 10_080;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;

pub fn required_title(title: Option<&str>) -> Result<String> {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(ValidationError::new("Title is required"));
    }
    check_title_len(title)?;
    Ok(title.to_string())
}

/// For partial updates: absent stays absent, present must be a valid title.
pub fn optional_title(title: Option<&str>) -> Result<Option<String>> {
    match title {
        None => Ok(None),
        Some(t) => required_title(Some(t)).map(Some),
    }
}

fn check_title_len(title: &str) -> Result<()> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::new(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

pub fn message_content(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ValidationError::new("Message content is required"));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::new(format!(
            "Message content must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

pub fn draft_content(content: &str) -> Result<()> {
    if content.chars().count() > MAX_DRAFT_CONTENT_LEN {
        return Err(ValidationError::new(format!(
            "Content must be at most {MAX_DRAFT_CONTENT_LEN} characters"
        )));
    }
    Ok(())
}

/// Empty descriptions collapse to `None`.
pub fn description(description: Option<&str>) -> Result<Option<String>> {
    let Some(text) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::new(format!(
            "Description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(text.to_string()))
}

/// 9999-12-31T23:59:59.999Z. Stored timestamps must keep a four-digit year
/// for their text form to sort chronologically.
pub fn latest_due_date() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(253_402_300_799_999).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn future_due_date(due: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if due <= now {
        return Err(ValidationError::new("Due date must be in the future"));
    }
    check_due_ceiling(due)
}

/// The due date after snoozing `minutes`, if it stays in range.
pub fn snoozed_due_date(due: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>> {
    let snoozed = due
        .checked_add_signed(Duration::minutes(minutes))
        .ok_or_else(|| ValidationError::new("Snoozed due date is out of range"))?;
    check_due_ceiling(snoozed)
}

fn check_due_ceiling(due: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if due > latest_due_date() {
        return Err(ValidationError::new("Due date must be before the year 10000"));
    }
    Ok(due)
}

pub fn snooze_minutes(minutes: Option<i64>) -> Result<i64> {
    let minutes = minutes.unwrap_or(DEFAULT_SNOOZE_MINUTES);
    if !(1..=MAX_SNOOZE_MINUTES).contains(&minutes) {
        return Err(ValidationError::new(format!(
            "Snooze minutes must be between 1 and {MAX_SNOOZE_MINUTES}"
        )));
    }
    Ok(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_rules() {
        assert_eq!(required_title(Some("  Plan  ")).unwrap(), "Plan");
        let err = required_title(None).unwrap_err();
        assert!(err.0.contains("required"));
        assert!(required_title(Some("   ")).is_err());
        assert!(required_title(Some(&"x".repeat(MAX_TITLE_LEN + 1))).is_err());
        assert_eq!(optional_title(None).unwrap(), None);
        assert!(optional_title(Some("")).is_err());
    }

    #[test]
    fn due_date_must_be_future() {
        let now = Utc::now();
        assert!(future_due_date(now + Duration::minutes(1), now).is_ok());
        let err = future_due_date(now, now).unwrap_err();
        assert_eq!(err.0, "Due date must be in the future");
    }

    #[test]
    fn due_date_keeps_four_digit_year() {
        let now = Utc::now();
        let latest = latest_due_date();
        assert_eq!(latest.to_rfc3339(), "9999-12-31T23:59:59.999+00:00");
        assert!(future_due_date(latest, now).is_ok());
        assert!(future_due_date(latest + Duration::milliseconds(1), now).is_err());

        let late = latest - Duration::hours(1);
        assert!(snoozed_due_date(late, 30).is_ok());
        let err = snoozed_due_date(late, MAX_SNOOZE_MINUTES).unwrap_err();
        assert!(err.0.contains("10000"));
    }

    #[test]
    fn snooze_bounds() {
        assert_eq!(snooze_minutes(None).unwrap(), DEFAULT_SNOOZE_MINUTES);
        assert_eq!(snooze_minutes(Some(30)).unwrap(), 30);
        assert!(snooze_minutes(Some(0)).is_err());
        assert!(snooze_minutes(Some(MAX_SNOOZE_MINUTES + 1)).is_err());
    }

    #[test]
    fn description_collapses_blank() {
        assert_eq!(description(Some("  ")).unwrap(), None);
        assert_eq!(description(Some(" call ")).unwrap(), Some("call".into()));
    }
}
