use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// The real-world "now", as local wall-clock time plus the matching instant.
///
/// Passed into every operation that depends on "today" so results are a pure
/// function of state and the current minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub local: NaiveDateTime,
    pub utc: DateTime<Utc>,
}

impl WallClock {
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            local: now.naive_local(),
            utc: now.with_timezone(&Utc),
        }
    }

    /// Fixed clock that treats local time as UTC.
    pub fn at(local: NaiveDateTime) -> Self {
        Self {
            local,
            utc: local.and_utc(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.local.date()
    }

    pub fn today_key(&self) -> String {
        date_key(self.today())
    }
}

/// yyyy-mm-dd key used for plans, check-ins, and wellness dates.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Monday of the week containing `date`. Dates in the first partial week
/// of chrono's range map to themselves.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        .unwrap_or(date)
}

/// Week-notes key (Monday, yyyy-mm-dd) for `date`.
pub fn week_key(date: NaiveDate) -> String {
    date_key(week_start(date))
}

/// Normalize a loose "H:MM" / "HH:MM" / "HH:MM:SS" into "HH:MM".
pub fn normalize_time(value: &str) -> Option<String> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

/// Case-insensitive key for title comparisons.
pub fn normalize_title(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn titles_match(a: &str, b: &str) -> bool {
    normalize_title(a) == normalize_title(b)
}

/// Resolve a title against a list: exact (case-insensitive) match first,
/// then first substring containment. Returns the index of the first hit.
///
/// With several titles sharing a substring the first one wins, even when
/// the caller meant another.
pub fn resolve_title<T>(items: &[T], title: &str, title_of: impl Fn(&T) -> &str) -> Option<usize> {
    let wanted = normalize_title(title);
    if wanted.is_empty() {
        return None;
    }
    items
        .iter()
        .position(|item| normalize_title(title_of(item)) == wanted)
        .or_else(|| {
            items
                .iter()
                .position(|item| normalize_title(title_of(item)).contains(&wanted))
        })
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trimmed non-empty string, or None.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
