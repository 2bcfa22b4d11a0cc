//! Short-range forecast API client.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::clock::{current_issuance_base, provider_now};
use crate::error::WeatherError;
use crate::grid;
use crate::types::{Coordinate, ForecastCategory, ForecastItem, ForecastStamp, GridCell};

const FORECAST_API_BASE: &str = "https://apis.data.go.kr/1360000/VilageFcstInfoService_2.0";
const FORECAST_PATH: &str = "/getVilageFcst";

pub const DEFAULT_PAGE_SIZE: u32 = 1000;

const SUCCESS_CODE: &str = "00";
const NO_DATA_CODE: &str = "03";

/// Longest slice of an error body kept in a [`WeatherError::Provider`].
pub(crate) const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    response: ApiResponse,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    header: ApiHeader,
    #[serde(default)]
    body: Option<ApiBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiHeader {
    result_code: String,
    #[serde(default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBody {
    /// `{"item": [...]}`, or an empty string when there is nothing to return
    #[serde(default)]
    items: serde_json::Value,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiItems {
    #[serde(default)]
    item: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    base_date: String,
    base_time: String,
    category: String,
    fcst_date: String,
    fcst_time: String,
    fcst_value: serde_json::Value, // usually a string, occasionally a bare number
    nx: i32,
    ny: i32,
}

impl TryFrom<ApiItem> for ForecastItem {
    type Error = WeatherError;

    fn try_from(item: ApiItem) -> Result<Self, Self::Error> {
        let value = match item.fcst_value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(WeatherError::Decode(format!(
                    "unexpected fcstValue {}",
                    other
                )))
            }
        };

        let stamp = |date: &str, time: &str| {
            ForecastStamp::new(date, time).map_err(|e| WeatherError::Decode(e.to_string()))
        };

        Ok(ForecastItem {
            issued: stamp(&item.base_date, &item.base_time)?,
            category: ForecastCategory::from_code(&item.category),
            valid: stamp(&item.fcst_date, &item.fcst_time)?,
            value,
            cell: GridCell {
                x: item.nx,
                y: item.ny,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: Arc<Client>,
    service_key: Option<String>,
    base_url: String,
    page_size: u32,
}

impl ForecastClient {
    /// A missing key is accepted here and reported on the first fetch.
    pub fn new(service_key: Option<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            service_key,
            base_url: FORECAST_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn service_key(&self) -> Result<&str, WeatherError> {
        match self.service_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(WeatherError::Configuration(
                "forecast service key is not set".to_string(),
            )),
        }
    }

    /// Fetch the current issuance for the grid cell containing `coordinate`.
    pub async fn fetch_forecast(
        &self,
        coordinate: &Coordinate,
    ) -> Result<Vec<ForecastItem>, WeatherError> {
        self.fetch_forecast_at(coordinate, provider_now()).await
    }

    /// Same as [`Self::fetch_forecast`] with an explicit provider wall time.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast_at(
        &self,
        coordinate: &Coordinate,
        now: NaiveDateTime,
    ) -> Result<Vec<ForecastItem>, WeatherError> {
        let service_key = self.service_key()?;
        let cell = grid::project(coordinate);
        let base = current_issuance_base(now);

        tracing::debug!(
            "Requesting forecast for cell ({}, {}) issued {} {}",
            cell.x,
            cell.y,
            base.date,
            base.time
        );

        let params = [
            ("serviceKey", service_key.to_string()),
            ("pageNo", "1".to_string()),
            ("numOfRows", self.page_size.to_string()),
            ("dataType", "JSON".to_string()),
            ("base_date", base.date.clone()),
            ("base_time", base.time.clone()),
            ("nx", cell.x.to_string()),
            ("ny", cell.y.to_string()),
        ];

        let response = self
            .client
            .get(format!("{}{}", self.base_url, FORECAST_PATH))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!("Forecast API returned HTTP {}", status);
            return Err(WeatherError::Provider {
                code: status.as_u16().to_string(),
                message: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let items = classify_response(&body)?;
        tracing::debug!("Received {} forecast items", items.len());
        Ok(items)
    }
}

/// Classify a successful-transport response body.
///
/// An empty item list or a zero total count is [`WeatherError::NoData`]
/// even when the result code says success.
pub fn classify_response(body: &str) -> Result<Vec<ForecastItem>, WeatherError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        return Err(classify_xml_fault(trimmed));
    }

    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| WeatherError::Decode(format!("invalid forecast JSON: {}", e)))?;
    let ApiResponse { header, body } = envelope.response;

    if header.result_code != SUCCESS_CODE {
        return Err(classify_result(header.result_code, header.result_msg));
    }

    let body = body.ok_or_else(|| WeatherError::NoData("response has no body".to_string()))?;
    if body.total_count == Some(0) {
        return Err(WeatherError::NoData("totalCount is 0".to_string()));
    }

    let items: ApiItems = match body.items {
        items @ serde_json::Value::Object(_) => serde_json::from_value(items)
            .map_err(|e| WeatherError::Decode(format!("invalid forecast items: {}", e)))?,
        serde_json::Value::Null | serde_json::Value::String(_) => ApiItems::default(),
        other => {
            return Err(WeatherError::Decode(format!(
                "unexpected items value: {}",
                other
            )))
        }
    };

    if items.item.is_empty() {
        return Err(WeatherError::NoData("response contained no items".to_string()));
    }

    items.item.into_iter().map(ForecastItem::try_from).collect()
}

fn is_no_data(code: &str, message: &str) -> bool {
    let message = message.to_ascii_uppercase();
    code == NO_DATA_CODE || message.contains("NO_DATA") || message.contains("NODATA")
}

fn classify_result(code: String, message: String) -> WeatherError {
    if is_no_data(&code, &message) {
        tracing::info!("Forecast API reported no data ({}: {})", code, message);
        WeatherError::NoData(format!("{}: {}", code, message))
    } else {
        tracing::warn!("Forecast API error {}: {}", code, message);
        WeatherError::Provider { code, message }
    }
}

/// Gateway faults (bad key, quota) come back as an XML envelope.
fn classify_xml_fault(body: &str) -> WeatherError {
    let code = xml_tag(body, "returnReasonCode").or_else(|| xml_tag(body, "resultCode"));
    let message = xml_tag(body, "returnAuthMsg")
        .or_else(|| xml_tag(body, "errMsg"))
        .or_else(|| xml_tag(body, "resultMsg"))
        .unwrap_or_default();

    match code {
        Some(code) => classify_result(code.to_string(), message.to_string()),
        None => WeatherError::Decode(format!(
            "unexpected XML response: {}",
            truncate(body, MAX_ERROR_BODY)
        )),
    }
}

fn xml_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim())
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with(items: serde_json::Value, total: u64) -> String {
        serde_json::json!({
            "response": {
                "header": {"resultCode": "00", "resultMsg": "NORMAL_SERVICE"},
                "body": {
                    "dataType": "JSON",
                    "items": items,
                    "pageNo": 1,
                    "numOfRows": 1000,
                    "totalCount": total
                }
            }
        })
        .to_string()
    }

    fn api_item(category: &str, time: &str, value: &str) -> serde_json::Value {
        serde_json::json!({
            "baseDate": "20240115",
            "baseTime": "1100",
            "category": category,
            "fcstDate": "20240115",
            "fcstTime": time,
            "fcstValue": value,
            "nx": 60,
            "ny": 127
        })
    }

    #[test]
    fn test_classify_success() {
        let body = body_with(
            serde_json::json!({"item": [api_item("TMP", "1400", "21.3"), api_item("SKY", "1400", "1")]}),
            2,
        );

        let items = classify_response(&body).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].category, ForecastCategory::Temperature);
        assert_eq!(items[0].valid.as_str(), "202401151400");
        assert_eq!(items[0].issued.as_str(), "202401151100");
        assert_eq!(items[0].value, "21.3");
        assert_eq!(items[0].cell, GridCell { x: 60, y: 127 });
        assert_eq!(items[1].category, ForecastCategory::Other("SKY".to_string()));
    }

    #[test]
    fn test_numeric_value_accepted() {
        let mut item = api_item("TMP", "1400", "0");
        item["fcstValue"] = serde_json::json!(-2.5);
        let body = body_with(serde_json::json!({"item": [item]}), 1);

        let items = classify_response(&body).unwrap();
        assert_eq!(items[0].numeric_value(), -2.5);
    }

    #[test]
    fn test_zero_total_count_is_no_data() {
        let body = body_with(serde_json::json!({"item": [api_item("TMP", "1400", "1")]}), 0);
        assert!(matches!(classify_response(&body), Err(WeatherError::NoData(_))));
    }

    #[test]
    fn test_empty_items_is_no_data() {
        let body = body_with(serde_json::json!({"item": []}), 5);
        assert!(matches!(classify_response(&body), Err(WeatherError::NoData(_))));

        let body = body_with(serde_json::json!(""), 5);
        assert!(matches!(classify_response(&body), Err(WeatherError::NoData(_))));
    }

    #[test]
    fn test_missing_body_is_no_data() {
        let body = r#"{"response":{"header":{"resultCode":"00","resultMsg":"NORMAL_SERVICE"}}}"#;
        assert!(matches!(classify_response(body), Err(WeatherError::NoData(_))));
    }

    #[test]
    fn test_no_data_result_code() {
        let body = r#"{"response":{"header":{"resultCode":"03","resultMsg":"NO_DATA"}}}"#;
        assert!(matches!(classify_response(body), Err(WeatherError::NoData(_))));
    }

    #[test]
    fn test_no_data_message_pattern() {
        let body = r#"{"response":{"header":{"resultCode":"99","resultMsg":"No_Data for request"}}}"#;
        assert!(matches!(classify_response(body), Err(WeatherError::NoData(_))));
    }

    #[test]
    fn test_other_result_code_is_provider_error() {
        let body = r#"{"response":{"header":{"resultCode":"10","resultMsg":"INVALID_REQUEST_PARAMETER_ERROR"}}}"#;
        match classify_response(body) {
            Err(WeatherError::Provider { code, message }) => {
                assert_eq!(code, "10");
                assert_eq!(message, "INVALID_REQUEST_PARAMETER_ERROR");
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_xml_fault_is_provider_error() {
        let body = "<OpenAPI_ServiceResponse><cmmMsgHeader>\
            <errMsg>SERVICE ERROR</errMsg>\
            <returnAuthMsg>SERVICE_KEY_IS_NOT_REGISTERED_ERROR</returnAuthMsg>\
            <returnReasonCode>30</returnReasonCode>\
            </cmmMsgHeader></OpenAPI_ServiceResponse>";

        match classify_response(body) {
            Err(WeatherError::Provider { code, message }) => {
                assert_eq!(code, "30");
                assert_eq!(message, "SERVICE_KEY_IS_NOT_REGISTERED_ERROR");
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_xml_is_decode_error() {
        assert!(matches!(
            classify_response("<html>gateway</html>"),
            Err(WeatherError::Decode(_))
        ));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(classify_response("not json"), Err(WeatherError::Decode(_))));
        assert!(matches!(
            classify_response(r#"{"unexpected": true}"#),
            Err(WeatherError::Decode(_))
        ));
    }

    #[test]
    fn test_malformed_stamp_is_decode_error() {
        let body = body_with(serde_json::json!({"item": [api_item("TMP", "14", "1")]}), 1);
        assert!(matches!(classify_response(&body), Err(WeatherError::Decode(_))));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let client = ForecastClient::new(Some("   ".to_string()), Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.service_key(),
            Err(WeatherError::Configuration(_))
        ));

        let client = ForecastClient::new(None, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.service_key(),
            Err(WeatherError::Configuration(_))
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("날씨예보", 2), "날씨");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
