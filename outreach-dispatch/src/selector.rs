//! Recipient selection
//!
//! - [`RecipientQuery`] carries the visit-window filters
//! - [`RecipientSource`] abstracts over where candidate rows come from
//! - [`HttpRecipientSource`] queries the clinic backend over HTTP

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{error::FetchError, recipient::Recipient};

/// Filters narrowing which visits produce candidate recipients
///
/// Optional fields are omitted from the upstream query when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientQuery {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<String>,
    #[serde(default)]
    pub unique_phones_only: bool,
}

impl RecipientQuery {
    #[must_use]
    pub const fn new(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            date_from,
            date_to,
            doctor_id: None,
            service_id: None,
            specialist_id: None,
            unique_phones_only: false,
        }
    }
}

/// Where candidate recipients are fetched from
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn fetch(&self, query: &RecipientQuery) -> Result<Vec<Recipient>, FetchError>;
}

/// One row of the backend's candidate listing
#[derive(Debug, Deserialize)]
struct SourceRow {
    #[serde(deserialize_with = "id_from_string_or_number")]
    id: String,
    name: String,
    phone: String,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(number) => number.to_string(),
        Raw::Text(text) => text,
    })
}

/// Fetches candidates from the clinic backend's JSON listing endpoint
///
/// The filters travel as a JSON body. Rows without a usable phone are
/// dropped, and with `unique_phones_only` the first row per phone wins.
#[derive(Debug, Clone)]
pub struct HttpRecipientSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecipientSource {
    /// # Errors
    ///
    /// Returns a `FetchError` if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl RecipientSource for HttpRecipientSource {
    async fn fetch(&self, query: &RecipientQuery) -> Result<Vec<Recipient>, FetchError> {
        let response = self.client.post(&self.endpoint).json(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Endpoint {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let rows: Vec<SourceRow> = response.json().await?;
        let recipients = rows
            .into_iter()
            .filter(|row| !row.phone.trim().is_empty())
            .map(|row| Recipient::new(row.id, row.name, row.phone))
            .collect();

        if query.unique_phones_only {
            Ok(retain_first_phone_occurrence(recipients))
        } else {
            Ok(recipients)
        }
    }
}

/// Keep the earliest row per phone, preserving the incoming order
#[must_use]
pub fn retain_first_phone_occurrence(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = std::collections::HashSet::new();

    recipients
        .into_iter()
        .filter(|recipient| seen.insert(recipient.phone.trim().to_string()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn date(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    #[test]
    fn first_phone_occurrence_wins_and_order_is_preserved() {
        let deduped = retain_first_phone_occurrence(vec![
            Recipient::new("1", "Anna", "+371001"),
            Recipient::new("2", "Ilze", "+371002"),
            Recipient::new("3", "Anna (again)", "+371001"),
            Recipient::new("4", "Marta", "+371003"),
            Recipient::new("5", "Ilze (again)", " +371002 "),
        ]);

        let ids: Vec<_> = deduped.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
        assert_eq!(deduped[0].name, "Anna");
    }

    #[test]
    fn source_rows_accept_numeric_and_string_ids() {
        let rows: Vec<SourceRow> = serde_json::from_str(
            r#"[
                { "id": 42, "name": "Anna", "phone": "+371001" },
                { "id": "visit-43", "name": "Ilze", "phone": "+371002" }
            ]"#,
        )
        .unwrap();

        assert_eq!(rows[0].id, "42");
        assert_eq!(rows[1].id, "visit-43");
    }

    #[test]
    fn filter_body_omits_unset_fields() {
        let mut query = RecipientQuery::new(date("2026-09-01"), date("2026-09-30"));
        query.doctor_id = Some("d-9".to_string());

        let body = serde_json::to_value(&query).unwrap();
        assert_eq!(body["date_from"], "2026-09-01");
        assert_eq!(body["date_to"], "2026-09-30");
        assert_eq!(body["doctor_id"], "d-9");
        assert_eq!(body["unique_phones_only"], false);
        assert!(body.get("service_id").is_none());
        assert!(body.get("specialist_id").is_none());
    }

    #[test]
    fn query_round_trips_through_serde() {
        let mut query = RecipientQuery::new(date("2026-09-01"), date("2026-09-30"));
        query.unique_phones_only = true;

        let text = ron::to_string(&query).unwrap();
        let back: RecipientQuery = ron::from_str(&text).unwrap();
        assert_eq!(back, query);
    }
}
