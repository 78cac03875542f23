//! Record shapes flowing through the pipeline.
//!
//! Raw records stay schema-free so the enriched output carries every upstream
//! column. Minimal records are the typed unit persisted in the store.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const SUBURB_FIELD: &str = "Suburb";
pub const STREET_ADDRESS_FIELD: &str = "Site_streetaddress";
pub const STATE_FIELD: &str = "Site_state";
pub const POSTCODE_FIELD: &str = "Site_postcode";

/// Composite identity of a physical site across dataset snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub suburb: Option<String>,
    pub street_address: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
}

/// One upstream dataset row, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Text form of a field; `None` when absent or null.
    pub fn text(&self, field: &str) -> Option<String> {
        self.0.get(field).and_then(value_text)
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            suburb: self.text(SUBURB_FIELD),
            street_address: self.text(STREET_ADDRESS_FIELD),
            state: self.text(STATE_FIELD),
            postcode: self.text(POSTCODE_FIELD),
        }
    }

    /// Whether the record carries the fields needed to identify and geocode it.
    pub fn has_mandatory_fields(&self) -> bool {
        is_present(self.text(STREET_ADDRESS_FIELD).as_deref())
            && is_present(self.text(POSTCODE_FIELD).as_deref())
    }
}

/// Identity projection of a site plus its cached geocoding outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalRecord {
    #[serde(rename = "Suburb", default, deserialize_with = "lenient_text")]
    pub suburb: Option<String>,
    #[serde(
        rename = "Site_streetaddress",
        default,
        deserialize_with = "lenient_text"
    )]
    pub street_address: Option<String>,
    #[serde(rename = "Site_state", default, deserialize_with = "lenient_text")]
    pub state: Option<String>,
    #[serde(rename = "Site_postcode", default, deserialize_with = "lenient_text")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
}

impl MinimalRecord {
    pub fn from_key(key: IdentityKey) -> Self {
        Self {
            suburb: key.suburb,
            street_address: key.street_address,
            state: key.state,
            postcode: key.postcode,
            latitude: None,
            longitude: None,
            label: None,
            confidence: None,
            skip: false,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            suburb: self.suburb.clone(),
            street_address: self.street_address.clone(),
            state: self.state.clone(),
            postcode: self.postcode.clone(),
        }
    }

    /// Both coordinates are known.
    pub fn is_resolved(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Resolved or permanently skipped: never sent to the geocoder again.
    pub fn is_settled(&self) -> bool {
        self.is_resolved() || self.skip
    }
}

/// A raw record with coordinates copied from its resolved store entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnrichedRecord(Map<String, Value>);

impl EnrichedRecord {
    /// Returns `None` when the site has no coordinates yet.
    pub fn join(raw: &RawRecord, site: &MinimalRecord) -> Option<Self> {
        let (latitude, longitude) = (site.latitude?, site.longitude?);
        let mut fields = raw.fields().clone();
        fields.insert("latitude".to_string(), Value::from(latitude));
        fields.insert("longitude".to_string(), Value::from(longitude));
        if let Some(label) = &site.label {
            fields.insert("label".to_string(), Value::from(label.clone()));
        }
        if let Some(confidence) = site.confidence {
            fields.insert("confidence".to_string(), Value::from(confidence));
        }
        Some(Self(fields))
    }

    #[cfg(test)]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn is_present(text: Option<&str>) -> bool {
    text.is_some_and(|text| !text.trim().is_empty())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(&value))
}
