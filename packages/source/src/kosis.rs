//! KOSIS parameterized statistics API client.
//!
//! One GET per (region, window). The API answers either with a JSON
//! array of records or with an object carrying an `err` marker when it
//! has nothing for the request; both arrive with HTTP 200.

use async_trait::async_trait;
use population_source_models::{RegionCode, RequestWindow};

use crate::SourceError;
use crate::retry::{self, RetryPolicy};
use crate::table::TableDefinition;

/// Key the API uses to mark an error object.
const ERROR_MARKER: &str = "err";

/// What a single (region, window) request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowPayload {
    /// Raw record entries, kept loosely typed so one malformed entry
    /// cannot poison its siblings.
    Records(Vec<serde_json::Value>),
    /// The API responded but has no data for this request.
    NoData {
        /// The error marker's code and message, or why the payload was
        /// considered empty.
        reason: String,
    },
}

/// Fetches one request window for one region.
#[async_trait]
pub trait PopulationApi: Send + Sync {
    /// Requests `window` for `region`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failures, non-retryable HTTP
    /// statuses, undecodable bodies, or a payload that is neither a record
    /// array nor an error object. "No data" answers are
    /// [`WindowPayload::NoData`], not errors.
    async fn fetch_window(
        &self,
        region: &RegionCode,
        window: RequestWindow,
    ) -> Result<WindowPayload, SourceError>;
}

/// HTTP client for the KOSIS `statisticsParameterData` endpoint.
pub struct KosisClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    org_id: String,
    table_id: String,
    item_ids: Vec<String>,
    retry: RetryPolicy,
}

impl KosisClient {
    /// Creates a client for `table`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        table: &TableDefinition,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: table.api_url.clone(),
            api_key: api_key.into(),
            org_id: table.org_id.clone(),
            table_id: table.table_id.clone(),
            item_ids: table.item_ids.clone(),
            retry: RetryPolicy::default(),
        }
    }

    /// Points the client at a different endpoint.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Query parameters for one request.
    ///
    /// Multi-valued parameters are space-terminated lists; form encoding
    /// turns the spaces into the `+` separators the API expects
    /// (`itmId=T2+T3+T4+`, `objL1=41250+`).
    fn query(&self, region: &RegionCode, window: RequestWindow) -> Vec<(&'static str, String)> {
        let items: String = self.item_ids.iter().map(|id| format!("{id} ")).collect();
        vec![
            ("method", "getList".to_string()),
            ("apiKey", self.api_key.clone()),
            ("itmId", items),
            ("objL1", format!("{region} ")),
            ("objL2", "ALL".to_string()),
            ("objL3", String::new()),
            ("format", "json".to_string()),
            ("jsonVD", "Y".to_string()),
            ("prdSe", "M".to_string()),
            ("startPrdDe", window.start.to_string()),
            ("endPrdDe", window.end.to_string()),
            ("orgId", self.org_id.clone()),
            ("tblId", self.table_id.clone()),
        ]
    }
}

#[async_trait]
impl PopulationApi for KosisClient {
    async fn fetch_window(
        &self,
        region: &RegionCode,
        window: RequestWindow,
    ) -> Result<WindowPayload, SourceError> {
        let params = self.query(region, window);
        log::debug!("[{}] requesting {region} {window}", self.table_id);

        let body = retry::send_json(&self.retry, || {
            self.client.get(&self.api_url).query(&params)
        })
        .await?;

        classify_payload(body)
    }
}

/// Splits a decoded response into records, "no data", or schema drift.
///
/// # Errors
///
/// Returns [`SourceError::Normalization`] if the payload is neither an
/// array nor an object carrying the error marker.
pub fn classify_payload(body: serde_json::Value) -> Result<WindowPayload, SourceError> {
    match body {
        serde_json::Value::Array(entries) if entries.is_empty() => Ok(WindowPayload::NoData {
            reason: "empty record list".to_string(),
        }),
        serde_json::Value::Array(entries) => Ok(WindowPayload::Records(entries)),
        serde_json::Value::Object(map) if map.contains_key(ERROR_MARKER) => {
            let code = map.get(ERROR_MARKER).map(value_text).unwrap_or_default();
            let reason = match map.get("errMsg").map(value_text) {
                Some(message) => format!("{code} {message}"),
                None => code,
            };
            Ok(WindowPayload::NoData { reason })
        }
        other => Err(SourceError::Normalization {
            message: format!(
                "unexpected response shape: expected record array or error object, got {}",
                json_kind(&other)
            ),
        }),
    }
}

fn value_text(value: &serde_json::Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), ToString::to_string)
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object without error marker",
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;
    use crate::table::population_table;

    fn window() -> RequestWindow {
        RequestWindow::from_january("200801".parse().unwrap(), 411).unwrap()
    }

    fn client(url: &str) -> KosisClient {
        let table = population_table().unwrap();
        KosisClient::new(reqwest::Client::new(), &table, "test-key")
            .with_api_url(format!("{url}/openapi/Param/statisticsParameterData.do"))
            .with_retry_policy(RetryPolicy::none())
    }

    #[test]
    fn classifies_record_arrays() {
        let payload = classify_payload(json!([{"PRD_DE": "200801"}])).unwrap();
        assert!(matches!(payload, WindowPayload::Records(ref r) if r.len() == 1));
    }

    #[test]
    fn classifies_error_objects_as_no_data() {
        let payload = classify_payload(json!({"err": "no data"})).unwrap();
        assert_eq!(
            payload,
            WindowPayload::NoData {
                reason: "no data".to_string()
            }
        );

        let payload =
            classify_payload(json!({"err": "30", "errMsg": "데이터가 존재하지 않습니다."})).unwrap();
        assert!(matches!(
            payload,
            WindowPayload::NoData { ref reason } if reason.starts_with("30 ")
        ));
    }

    #[test]
    fn classifies_empty_array_as_no_data() {
        assert!(matches!(
            classify_payload(json!([])).unwrap(),
            WindowPayload::NoData { .. }
        ));
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(matches!(
            classify_payload(json!({"result": []})),
            Err(SourceError::Normalization { .. })
        ));
        assert!(classify_payload(json!("oops")).is_err());
    }

    #[tokio::test]
    async fn sends_expected_query_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/openapi/Param/statisticsParameterData.do")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("method".into(), "getList".into()),
                Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
                Matcher::UrlEncoded("itmId".into(), "T2 T3 T4 ".into()),
                Matcher::UrlEncoded("objL1".into(), "41250 ".into()),
                Matcher::UrlEncoded("objL2".into(), "ALL".into()),
                Matcher::UrlEncoded("prdSe".into(), "M".into()),
                Matcher::UrlEncoded("startPrdDe".into(), "200801".into()),
                Matcher::UrlEncoded("endPrdDe".into(), "201212".into()),
                Matcher::UrlEncoded("orgId".into(), "101".into()),
                Matcher::UrlEncoded("tblId".into(), "DT_1B04006".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {"PRD_DE": "200801", "C1_NM": "동두천시", "C2_NM": "23세", "ITM_NM": "총인구수", "DT": "1000"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let payload = client(&server.url())
            .fetch_window(&RegionCode::new("41250"), window())
            .await
            .unwrap();

        assert!(matches!(payload, WindowPayload::Records(ref r) if r.len() == 1));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_object_is_no_data_not_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"err": "no data"}"#)
            .create_async()
            .await;

        let payload = client(&server.url())
            .fetch_window(&RegionCode::new("41250"), window())
            .await
            .unwrap();
        assert!(matches!(payload, WindowPayload::NoData { .. }));
    }

    #[tokio::test]
    async fn transport_failures_are_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let result = client(&server.url())
            .fetch_window(&RegionCode::new("41250"), window())
            .await;
        assert!(matches!(result, Err(SourceError::Status { .. })));
    }

    #[tokio::test]
    async fn malformed_bodies_are_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let result = client(&server.url())
            .fetch_window(&RegionCode::new("41250"), window())
            .await;
        assert!(matches!(result, Err(SourceError::Json(_))));
    }
}
