use crate::core::DatasetListing;
use crate::utils::error::{EtlError, Result};
use serde_json::Value;

pub const DETAIL_URL_PATH: &str = "links.latest_version.href";
pub const QMI_URL_PATH: &str = "qmi.href";

/// Walk a dotted path ("a.b.c") through nested JSON objects.
pub fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

pub fn json_path_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    json_path(value, path).and_then(Value::as_str)
}

/// Scalars other than strings are kept in their JSON rendering; null is absent.
pub fn scalar_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl DatasetListing {
    pub fn from_item(item: &Value) -> Self {
        Self {
            id: scalar_field(item, "id"),
            title: scalar_field(item, "title"),
            description: scalar_field(item, "description"),
            latest_version_href: json_path_str(item, DETAIL_URL_PATH).map(str::to_string),
            qmi_url: json_path_str(item, QMI_URL_PATH).map(str::to_string),
        }
    }

    /// The one field every later stage needs; its absence is a `MissingField`
    /// for this dataset only.
    pub fn detail_url(&self) -> Result<&str> {
        self.latest_version_href.as_deref().ok_or_else(|| {
            EtlError::missing_field(
                DETAIL_URL_PATH,
                format!("listing item {}", self.id.as_deref().unwrap_or("<no id>")),
            )
        })
    }

    /// Name used in log lines and warnings.
    pub fn label(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.id.clone())
            .or_else(|| self.latest_version_href.clone())
            .unwrap_or_else(|| "<unnamed dataset>".to_string())
    }
}
