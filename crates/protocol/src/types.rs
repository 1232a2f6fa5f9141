use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PORT, HTTPS_PORT};

/// Connection details for one named QCarta server.
///
/// Owned by the configuration store; the sync core only reads it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfile {
    pub host: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_port", deserialize_with = "lenient::port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ServerProfile {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            port,
        }
    }

    /// `https` on port 443, `http` otherwise.
    pub fn scheme(&self) -> &'static str {
        if self.port == HTTPS_PORT {
            "https"
        } else {
            "http"
        }
    }

    /// Base URL without a trailing slash.
    ///
    /// The port is only spelled out when it is not the scheme default and
    /// the host does not already carry one.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let default_port = matches!(self.port, 80 | HTTPS_PORT);
        if default_port || host.contains(':') {
            format!("{}://{}", self.scheme(), host)
        } else {
            format!("{}://{}:{}", self.scheme(), host, self.port)
        }
    }
}

impl fmt::Debug for ServerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerProfile")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// A file as recorded in the store manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileEntry {
    pub path: String,
    /// Modification time in whole seconds as stored by the server.
    #[serde(deserialize_with = "lenient::integer")]
    pub mtime: i64,
}

/// Store metadata returned by `/rest/store/{name}`.
///
/// Carries both the descriptor fields needed to upload (id, chunk limit)
/// and the manifest of registered files used for diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    /// Server request-body limit in bytes.
    #[serde(deserialize_with = "lenient::unsigned")]
    pub post_max_size: u64,
    #[serde(default)]
    pub files: Vec<RemoteFileEntry>,
    #[serde(rename = "Layers", default, deserialize_with = "lenient::name_list")]
    pub layers: Vec<String>,
    #[serde(rename = "Layouts", default, deserialize_with = "lenient::name_list")]
    pub layouts: Vec<String>,
}

/// Envelope of the store-info response.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreInfoResponse {
    pub store: StoreDescriptor,
}

/// One entry of `/rest/stores`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub name: String,
}

/// Envelope of the store-list response: `{stores: {store: [...]}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreListResponse {
    pub stores: StoreListInner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreListInner {
    #[serde(default)]
    pub store: Vec<StoreSummary>,
}

/// A named server-side entity selectable by id (access group, basemap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedId {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub name: String,
}

/// Payload of a successful access-group listing.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessGroupList {
    #[serde(default)]
    pub access_groups: Vec<NamedId>,
}

/// Payload of a successful basemap listing.
#[derive(Debug, Clone, Deserialize)]
pub struct BasemapList {
    #[serde(default)]
    pub basemaps: Vec<NamedId>,
}

/// Payload of a successful save call (store or layer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SavedId {
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub id: Option<String>,
}

/// Everything needed to publish a layer from a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPublish {
    pub store_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// QGIS layers to expose, in the store's declared order.
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub print_layout: String,
    #[serde(default)]
    pub basemap_id: Option<String>,
    pub access_group_ids: Vec<String>,
    #[serde(default)]
    pub flags: LayerFlags,
}

/// Optional layer features, each sent as `key=t` when enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerFlags {
    pub public: bool,
    pub cached: bool,
    pub proxyfied: bool,
    pub customized: bool,
    /// Separate MapProxy layers; requires `proxyfied`.
    pub exposed: bool,
    pub auto_thumbnail: bool,
    pub show_charts: bool,
    pub show_dt: bool,
    pub show_query: bool,
    pub show_fi_edit: bool,
}

impl LayerFlags {
    /// Form key/value pairs in the order the server form declares them.
    pub fn entries(&self) -> [(&'static str, bool); 10] {
        [
            ("public", self.public),
            ("cached", self.cached),
            ("proxyfied", self.proxyfied),
            ("customized", self.customized),
            ("exposed", self.exposed),
            ("auto_thumbnail", self.auto_thumbnail),
            ("show_charts", self.show_charts),
            ("show_dt", self.show_dt),
            ("show_query", self.show_query),
            ("show_fi_edit", self.show_fi_edit),
        ]
    }
}

impl LayerPublish {
    /// Checks the request before anything is sent.
    pub fn validate(&self) -> Result<(), crate::ProtocolError> {
        if self.name.trim().is_empty() {
            return Err(crate::ProtocolError::Invalid("layer name is required".into()));
        }
        if self.access_group_ids.is_empty() {
            return Err(crate::ProtocolError::Invalid(
                "at least one access group is required".into(),
            ));
        }
        if self.flags.exposed && !self.flags.proxyfied {
            return Err(crate::ProtocolError::Invalid(
                "separate layers require the MapProxy option".into(),
            ));
        }
        Ok(())
    }
}

/// Deserializers for PHP-generated JSON, where numbers may arrive as
/// strings and vice versa.
mod lenient {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    fn to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        to_i64(&value).ok_or_else(|| D::Error::custom(format!("expected integer, got {value}")))
    }

    pub fn unsigned<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let n = integer(deserializer)?;
        u64::try_from(n).map_err(|_| D::Error::custom(format!("expected non-negative, got {n}")))
    }

    pub fn port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let n = integer(deserializer)?;
        u16::try_from(n).map_err(|_| D::Error::custom(format!("invalid port {n}")))
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("expected id, got {other}"))),
        }
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(D::Error::custom(format!("expected id, got {other}"))),
        }
    }

    /// Comma-separated names (`"roads,rivers"`), or already a JSON array.
    pub fn name_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let names = match Value::deserialize(deserializer)? {
            Value::Null => Vec::new(),
            Value::String(s) => s.split(',').map(|n| n.trim().to_string()).collect(),
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
                .collect(),
            other => return Err(D::Error::custom(format!("expected name list, got {other}"))),
        };
        Ok(names.into_iter().filter(|n| !n.is_empty()).collect())
    }
}
