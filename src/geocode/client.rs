//! Forward-geocoding HTTP client (positionstack).
use super::{GeocodeHit, Geocoder};
use crate::config::GeocodeSettings;
use crate::error::GeocodeError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Deserialize)]
struct ForwardResponse {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    message: String,
}

/// Blocking client issuing one request per lookup, limited to the top result.
pub struct PositionstackClient {
    agent: ureq::Agent,
    endpoint: String,
    access_key: String,
    region: String,
    country_code: String,
}

impl PositionstackClient {
    pub fn new(agent: ureq::Agent, settings: &GeocodeSettings) -> Self {
        Self {
            agent,
            endpoint: settings.endpoint.clone(),
            access_key: settings.access_key.clone(),
            region: settings.region.clone(),
            country_code: settings.country_code.clone(),
        }
    }
}

impl Geocoder for PositionstackClient {
    fn forward(&mut self, query: &str) -> Result<GeocodeHit, GeocodeError> {
        let start = Instant::now();
        let result = self
            .agent
            .get(&self.endpoint)
            .query("access_key", &self.access_key)
            .query("query", query)
            .query("region", &self.region)
            .query("country", &self.country_code)
            .query("limit", "1")
            .call();
        let mut response = match result {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => return Err(GeocodeError::Status(code)),
            Err(err) => return Err(GeocodeError::Network(err.to_string())),
        };
        let body: ForwardResponse = response
            .body_mut()
            .read_json()
            .map_err(|err| GeocodeError::Malformed(err.to_string()))?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "geocode request complete"
        );
        parse_forward_response(body)
    }
}

fn parse_forward_response(body: ForwardResponse) -> Result<GeocodeHit, GeocodeError> {
    if let Some(error) = body.error {
        let code = match error.code {
            Value::String(code) => code,
            Value::Null => "unknown".to_string(),
            other => other.to_string(),
        };
        return Err(GeocodeError::Api {
            code,
            message: error.message,
        });
    }
    // No match comes back as `[]` or `[[]]` depending on the endpoint version.
    let top = match &body.data {
        Value::Array(items) => match items.first() {
            Some(Value::Object(top)) => top,
            Some(Value::Array(inner)) if inner.is_empty() => return Err(GeocodeError::NoMatch),
            None => return Err(GeocodeError::NoMatch),
            Some(other) => {
                return Err(GeocodeError::Malformed(format!("data[0] is {other}")));
            }
        },
        Value::Null => return Err(GeocodeError::NoMatch),
        other => return Err(GeocodeError::Malformed(format!("data is {other}"))),
    };
    let coordinate = |name: &str| {
        top.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| GeocodeError::Malformed(format!("data[0].{name} is not a number")))
    };
    Ok(GeocodeHit {
        latitude: coordinate("latitude")?,
        longitude: coordinate("longitude")?,
        label: top.get("label").and_then(Value::as_str).map(str::to_string),
        confidence: top.get("confidence").and_then(Value::as_f64),
    })
}
