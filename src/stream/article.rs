//! Article records and the wire-to-native transformer.
//!
//! One pure function per stream variant (§4.8). The wire form has ISO-8601
//! string timestamps and string-encoded floats; the transformer normalizes
//! these to native types, including per-company confidence.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::FinlightError;

/// Fields shared by both stream variants.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArticle {
    pub link: String,
    pub title: String,
    pub publish_date: DateTime<Utc>,
    pub source: String,
    pub language: String,
    pub summary: Option<String>,
    pub images: Option<Vec<String>>,
}

/// A company mention inside an enriched article, with its confidence
/// normalized to a native float. Unrecognized fields are preserved verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub confidence: Option<f64>,
    pub extra: serde_json::Map<String, Value>,
}

/// The enriched article record, carrying the additional fields the
/// enriched stream variant delivers.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedArticle {
    pub link: String,
    pub title: String,
    pub publish_date: DateTime<Utc>,
    pub source: String,
    pub language: String,
    pub summary: Option<String>,
    pub images: Option<Vec<String>>,
    pub sentiment: Option<String>,
    pub confidence: Option<f64>,
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub companies: Option<Vec<Company>>,
    pub categories: Option<Vec<String>>,
    pub countries: Option<Vec<String>>,
}

fn get_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, FinlightError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| FinlightError::ConnectRejected(format!("article missing `{field}`")))
}

fn opt_str(data: &Value, field: &str) -> Option<String> {
    data.get(field).and_then(Value::as_str).map(str::to_owned)
}

fn opt_str_vec(data: &Value, field: &str) -> Option<Vec<String>> {
    data.get(field).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    })
}

/// Parse an ISO-8601 string field, if present and already a string, into a
/// `DateTime<Utc>`. Matches §4.8: "if present and is a string, parse."
fn parse_date_field(data: &Value, field: &str) -> Result<Option<DateTime<Utc>>, FinlightError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| FinlightError::ConnectRejected(format!("invalid `{field}`: {e}"))),
        Some(_) => Ok(None),
    }
}

/// Parse a top-level string-encoded float field, if present and truthy.
fn parse_confidence(data: &Value) -> Option<f64> {
    match data.get("confidence") {
        Some(Value::String(s)) if !s.is_empty() => s.parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

fn parse_companies(data: &Value) -> Option<Vec<Company>> {
    let items = data.get("companies")?.as_array()?;
    Some(
        items
            .iter()
            .map(|item| {
                let confidence = match item.get("confidence") {
                    Some(Value::String(s)) if !s.is_empty() => s.parse::<f64>().ok(),
                    Some(Value::Number(n)) => n.as_f64(),
                    _ => None,
                };
                let mut extra = item.as_object().cloned().unwrap_or_default();
                extra.remove("confidence");
                Company { confidence, extra }
            })
            .collect(),
    )
}

/// Raw-variant transformer: date coercion only, no confidence or dedup fields.
pub fn transform_raw(data: &Value) -> Result<RawArticle, FinlightError> {
    Ok(RawArticle {
        link: get_str(data, "link")?.to_owned(),
        title: get_str(data, "title")?.to_owned(),
        publish_date: parse_date_field(data, "publishDate")?
            .ok_or_else(|| FinlightError::ConnectRejected("article missing publishDate".into()))?,
        source: get_str(data, "source")?.to_owned(),
        language: get_str(data, "language")?.to_owned(),
        summary: opt_str(data, "summary"),
        images: opt_str_vec(data, "images"),
    })
}

/// Enriched-variant transformer: date coercion, confidence coercion (top
/// level and per-company), all other fields preserved.
pub fn transform_enriched(data: &Value) -> Result<EnrichedArticle, FinlightError> {
    Ok(EnrichedArticle {
        link: get_str(data, "link")?.to_owned(),
        title: get_str(data, "title")?.to_owned(),
        publish_date: parse_date_field(data, "publishDate")?
            .ok_or_else(|| FinlightError::ConnectRejected("article missing publishDate".into()))?,
        source: get_str(data, "source")?.to_owned(),
        language: get_str(data, "language")?.to_owned(),
        summary: opt_str(data, "summary"),
        images: opt_str_vec(data, "images"),
        sentiment: opt_str(data, "sentiment"),
        confidence: parse_confidence(data),
        content: opt_str(data, "content"),
        created_at: parse_date_field(data, "createdAt")?,
        companies: parse_companies(data),
        categories: opt_str_vec(data, "categories"),
        countries: opt_str_vec(data, "countries"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        serde_json::json!({
            "link": "a",
            "title": "t",
            "publishDate": "2024-01-01T00:00:00Z",
            "source": "reuters",
            "language": "en",
            "confidence": "0.5",
            "createdAt": "2024-01-02T00:00:00Z",
            "companies": [
                {"name": "Acme", "confidence": "0.9"},
                {"name": "Globex", "confidence": 0.25},
            ],
        })
    }

    #[test]
    fn happy_path_scenario_from_spec() {
        let article = transform_enriched(&sample()).unwrap();
        assert_eq!(article.confidence, Some(0.5));
        assert_eq!(
            article.publish_date,
            DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn per_company_confidence_is_normalized() {
        let article = transform_enriched(&sample()).unwrap();
        let companies = article.companies.unwrap();
        assert_eq!(companies[0].confidence, Some(0.9));
        assert_eq!(companies[1].confidence, Some(0.25));
        assert_eq!(companies[0].extra.get("name").unwrap(), "Acme");
    }

    #[test]
    fn raw_transform_only_coerces_dates() {
        let raw = transform_raw(&sample()).unwrap();
        assert_eq!(raw.link, "a");
        assert_eq!(raw.source, "reuters");
    }

    #[test]
    fn missing_confidence_is_none() {
        let data = serde_json::json!({
            "link": "a", "title": "t", "publishDate": "2024-01-01T00:00:00Z",
            "source": "s", "language": "en",
        });
        let article = transform_enriched(&data).unwrap();
        assert_eq!(article.confidence, None);
    }

    #[test]
    fn empty_confidence_string_is_treated_as_falsy() {
        let data = serde_json::json!({
            "link": "a", "title": "t", "publishDate": "2024-01-01T00:00:00Z",
            "source": "s", "language": "en", "confidence": "",
        });
        let article = transform_enriched(&data).unwrap();
        assert_eq!(article.confidence, None);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let data = serde_json::json!({"title": "t"});
        assert!(transform_raw(&data).is_err());
    }
}
