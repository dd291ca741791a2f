use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Hard cap enforced by `spending_by_award`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Definitive contracts: BPA calls, purchase orders, delivery orders and
/// definitive contracts.
pub const CONTRACT_AWARD_TYPE_CODES: [&str; 4] = ["A", "B", "C", "D"];

/// Field projection requested on every search. Results only carry the
/// columns listed here; names the API does not know are ignored upstream.
pub const CONTRACT_FIELDS: &[&str] = &[
    "Award ID",
    "Recipient Name",
    "Recipient UEI",
    "recipient_id",
    "prime_award_recipient_id",
    "Description",
    "Award Amount",
    "Total Outlays",
    "Start Date",
    "End Date",
    "Base Obligation Date",
    "Last Modified Date",
    "Awarding Agency",
    "Awarding Agency Code",
    "Awarding Sub Agency",
    "Awarding Sub Agency Code",
    "Funding Agency",
    "Funding Sub Agency",
    "awarding_agency_id",
    "agency_slug",
    "Contract Award Type",
    "NAICS",
    "PSC",
    "Extent Competed",
    "Type of Set Aside",
    "Number of Offers Received",
    "Place of Performance State Code",
    "Place of Performance Country Code",
    "generated_internal_id",
    "internal_id",
    "def_codes",
];

pub const DEFAULT_SORT_FIELD: &str = "Award Amount";

/// First day of fiscal year 2008, the start of USAspending award history.
pub fn earliest_award_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2007, 10, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    pub date_range: Option<DateRange>,
    pub limit: u32,
    pub page: u32,
    pub sort: String,
    pub order: SortOrder,
    pub recipient: Option<String>,
    pub agencies: Vec<String>,
    pub naics_codes: Vec<String>,
    pub psc_codes: Vec<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            date_range: None,
            limit: MAX_PAGE_SIZE,
            page: 1,
            sort: DEFAULT_SORT_FIELD.to_string(),
            order: SortOrder::Desc,
            recipient: None,
            agencies: Vec::new(),
            naics_codes: Vec::new(),
            psc_codes: Vec::new(),
            min_amount: None,
            max_amount: None,
        }
    }
}

impl SearchQuery {
    pub fn keyword(term: impl Into<String>) -> Self {
        Self {
            keywords: vec![term.into()],
            ..Self::default()
        }
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn to_filters(&self, today: NaiveDate) -> SearchFilters {
        let period = self.date_range.unwrap_or(DateRange {
            start: earliest_award_date(),
            end: today,
        });

        let award_amounts = if self.min_amount.is_some() || self.max_amount.is_some() {
            vec![AmountBound {
                lower_bound: self.min_amount,
                upper_bound: self.max_amount,
            }]
        } else {
            Vec::new()
        };

        SearchFilters {
            award_type_codes: CONTRACT_AWARD_TYPE_CODES.to_vec(),
            time_period: vec![TimePeriod {
                start_date: period.start,
                end_date: period.end,
            }],
            keywords: non_blank(&self.keywords),
            recipient_search_text: self
                .recipient
                .iter()
                .filter(|r| !r.trim().is_empty())
                .map(|r| r.trim().to_string())
                .collect(),
            agencies: non_blank(&self.agencies)
                .into_iter()
                .map(AgencyFilter::awarding_toptier)
                .collect(),
            naics_codes: CodeFilter::require(non_blank(&self.naics_codes)),
            psc_codes: CodeFilter::require(non_blank(&self.psc_codes)),
            award_amounts,
        }
    }

    pub fn to_request_body(&self, today: NaiveDate) -> SearchRequestBody {
        SearchRequestBody {
            filters: self.to_filters(today),
            fields: CONTRACT_FIELDS.to_vec(),
            page: self.effective_page(),
            limit: self.effective_limit(),
            sort: self.sort.clone(),
            order: self.order,
            subawards: false,
        }
    }
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequestBody {
    pub filters: SearchFilters,
    pub fields: Vec<&'static str>,
    pub page: u32,
    pub limit: u32,
    pub sort: String,
    pub order: SortOrder,
    pub subawards: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchFilters {
    pub award_type_codes: Vec<&'static str>,
    pub time_period: Vec<TimePeriod>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipient_search_text: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agencies: Vec<AgencyFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naics_codes: Option<CodeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psc_codes: Option<CodeFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub award_amounts: Vec<AmountBound>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimePeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgencyFilter {
    #[serde(rename = "type")]
    pub agency_type: &'static str,
    pub tier: &'static str,
    pub name: String,
}

impl AgencyFilter {
    fn awarding_toptier(name: String) -> Self {
        Self {
            agency_type: "awarding",
            tier: "toptier",
            name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeFilter {
    pub require: Vec<String>,
}

impl CodeFilter {
    fn require(codes: Vec<String>) -> Option<Self> {
        if codes.is_empty() {
            None
        } else {
            Some(Self { require: codes })
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AmountBound {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_limit_is_clamped_to_api_cap() {
        let query = SearchQuery {
            limit: 500,
            ..SearchQuery::keyword("36C10B22N10280026")
        };
        let body = query.to_request_body(date(2026, 1, 15));
        assert_eq!(body.limit, 100);

        let query = SearchQuery {
            limit: 25,
            ..SearchQuery::default()
        };
        assert_eq!(query.effective_limit(), 25);
    }

    #[test]
    fn test_page_is_at_least_one() {
        let query = SearchQuery {
            page: 0,
            ..SearchQuery::default()
        };
        assert_eq!(query.to_request_body(date(2026, 1, 15)).page, 1);
    }

    #[test]
    fn test_minimal_filters_only_carry_required_keys() {
        let filters = SearchQuery::default().to_filters(date(2026, 1, 15));
        let value = serde_json::to_value(&filters).unwrap();

        assert_eq!(
            value,
            json!({
                "award_type_codes": ["A", "B", "C", "D"],
                "time_period": [{"start_date": "2007-10-01", "end_date": "2026-01-15"}],
            })
        );
    }

    #[test]
    fn test_explicit_date_range_is_used() {
        let query = SearchQuery {
            date_range: Some(DateRange {
                start: date(2016, 1, 15),
                end: date(2026, 1, 15),
            }),
            ..SearchQuery::keyword("acme")
        };
        let value = serde_json::to_value(query.to_filters(date(2026, 1, 15))).unwrap();
        assert_eq!(value["time_period"][0]["start_date"], "2016-01-15");
        assert_eq!(value["keywords"], json!(["acme"]));
    }

    #[test]
    fn test_optional_filters_present_when_supplied() {
        let query = SearchQuery {
            recipient: Some(" Acme Corp ".to_string()),
            agencies: vec!["Department of Defense".to_string()],
            naics_codes: vec!["541512".to_string()],
            psc_codes: vec!["D302".to_string()],
            min_amount: Some(1_000_000.0),
            ..SearchQuery::default()
        };
        let value = serde_json::to_value(query.to_filters(date(2026, 1, 15))).unwrap();

        assert_eq!(value["recipient_search_text"], json!(["Acme Corp"]));
        assert_eq!(
            value["agencies"],
            json!([{"type": "awarding", "tier": "toptier", "name": "Department of Defense"}])
        );
        assert_eq!(value["naics_codes"], json!({"require": ["541512"]}));
        assert_eq!(value["psc_codes"], json!({"require": ["D302"]}));
        assert_eq!(value["award_amounts"], json!([{"lower_bound": 1_000_000.0}]));
        assert!(value.get("keywords").is_none());
    }

    #[test]
    fn test_blank_values_are_omitted_not_empty() {
        let query = SearchQuery {
            keywords: vec!["  ".to_string()],
            recipient: Some(String::new()),
            agencies: vec![String::new()],
            ..SearchQuery::default()
        };
        let value = serde_json::to_value(query.to_filters(date(2026, 1, 15))).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(!object.contains_key("keywords"));
        assert!(!object.contains_key("recipient_search_text"));
        assert!(!object.contains_key("agencies"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = SearchQuery::keyword("acme").to_request_body(date(2026, 1, 15));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["sort"], "Award Amount");
        assert_eq!(value["order"], "desc");
        assert_eq!(value["subawards"], false);
        assert_eq!(value["fields"].as_array().unwrap().len(), CONTRACT_FIELDS.len());
        assert!(CONTRACT_FIELDS.contains(&"generated_internal_id"));
    }
}
