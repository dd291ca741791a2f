//! Turns the single search box input into a USAspending query.

use std::sync::LazyLock;

use chrono::{Months, NaiveDate};
use regex::Regex;
use serde_json::Value;

use crate::error::AppError;
use crate::usaspending::{DateRange, SearchQuery, UsaSpendingClient};

static AWARD_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]{10,}$").expect("Invalid regex pattern defined in code")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Looks like a PIID or generated award id; search all history.
    AwardId,
    /// Free text, limited to the trailing window.
    Keyword,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::AwardId => "award_id",
            SearchMode::Keyword => "keyword",
        }
    }
}

pub fn classify(input: &str) -> SearchMode {
    if AWARD_ID_RE.is_match(input.trim()) {
        SearchMode::AwardId
    } else {
        SearchMode::Keyword
    }
}

pub fn build_query(input: &str, window_years: u32, today: NaiveDate) -> SearchQuery {
    let term = input.trim();
    let mut query = SearchQuery::keyword(term);

    if classify(term) == SearchMode::Keyword {
        let start = today
            .checked_sub_months(Months::new(window_years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        query.date_range = Some(DateRange { start, end: today });
    }

    query
}

/// Runs one search for the raw input. Blank input never reaches USAspending.
#[tracing::instrument(name = "search", skip(client), fields(search.mode))]
pub async fn search(
    client: &UsaSpendingClient,
    input: &str,
    window_years: u32,
    today: NaiveDate,
) -> Result<Value, AppError> {
    if input.trim().is_empty() {
        return Err(AppError::Validation("keywords are required".to_string()));
    }

    let mode = classify(input);
    tracing::Span::current().record("search.mode", mode.as_str());

    let query = build_query(input, window_years, today);
    Ok(client.search_contracts(&query).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usaspending::SortOrder;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("W91QV123D0001"), SearchMode::AwardId);
        assert_eq!(classify("  36C10B22N1028  "), SearchMode::AwardId);
        assert_eq!(classify("ABC123"), SearchMode::Keyword);
        assert_eq!(classify("cloud migration"), SearchMode::Keyword);
        assert_eq!(classify("W91QV1-23D0001"), SearchMode::Keyword);
    }

    #[test]
    fn test_award_id_query_has_no_window() {
        let query = build_query("W91QV123D0001", 10, day(2026, 5, 1));
        assert_eq!(query.keywords, vec!["W91QV123D0001"]);
        assert_eq!(query.date_range, None);
        assert_eq!(query.limit, 100);
        assert_eq!(query.sort, "Award Amount");
        assert_eq!(query.order, SortOrder::Desc);

        let filters = serde_json::to_value(query.to_filters(day(2026, 5, 1))).unwrap();
        assert_eq!(filters["time_period"][0]["start_date"], "2007-10-01");
    }

    #[test]
    fn test_keyword_query_uses_trailing_window() {
        let query = build_query(" cybersecurity ", 10, day(2026, 5, 1));
        assert_eq!(query.keywords, vec!["cybersecurity"]);
        assert_eq!(
            query.date_range,
            Some(DateRange {
                start: day(2016, 5, 1),
                end: day(2026, 5, 1),
            })
        );
    }

    #[test]
    fn test_window_from_leap_day() {
        let query = build_query("logistics", 1, day(2024, 2, 29));
        assert_eq!(query.date_range.unwrap().start, day(2023, 2, 28));
    }
}
