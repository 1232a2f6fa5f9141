//! `application/x-www-form-urlencoded` body builder.
//!
//! The admin endpoints are plain PHP form handlers. Lists are sent as
//! repeated `key[]` fields and binary chunk data is sent as a raw,
//! percent-encoded field value, which `serde_urlencoded` cannot express.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};

/// Content type of every body produced by [`FormBody`].
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Bytes left as-is; everything else is `%XX` encoded.
const FORM_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Value sent for an enabled boolean flag.
const FLAG_ON: &str = "t";

/// Incrementally built urlencoded form body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    encoded: String,
}

impl FormBody {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one `key=value` pair. The value may be arbitrary bytes.
    pub fn field(mut self, key: &str, value: impl AsRef<[u8]>) -> Self {
        self.push(key.as_bytes(), value.as_ref());
        self
    }

    /// Appends `key=value` for every value, in order.
    ///
    /// Callers pass the PHP array key (`source[]`, `group_id[]`, ...).
    pub fn fields<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        for value in values {
            self.push(key.as_bytes(), value.as_ref());
        }
        self
    }

    /// Appends `key=t` when `enabled`; disabled flags are omitted entirely.
    pub fn flag(self, key: &str, enabled: bool) -> Self {
        if enabled {
            self.field(key, FLAG_ON)
        } else {
            self
        }
    }

    /// Appends `key=value` only when `value` is present.
    pub fn optional(self, key: &str, value: Option<impl AsRef<[u8]>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Encoded body text.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Length of the encoded body in bytes.
    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    /// Returns `true` if no field was appended.
    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    fn push(&mut self, key: &[u8], value: &[u8]) {
        if !self.encoded.is_empty() {
            self.encoded.push('&');
        }
        self.encoded.extend(percent_encode(key, FORM_SET));
        self.encoded.push('=');
        self.encoded.extend(percent_encode(value, FORM_SET));
    }
}

impl From<FormBody> for String {
    fn from(body: FormBody) -> Self {
        body.encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body() {
        let body = FormBody::new();
        assert!(body.is_empty());
        assert_eq!(body.as_str(), "");
    }

    #[test]
    fn fields_joined_with_ampersand() {
        let body = FormBody::new()
            .field("submit", "1")
            .field("email", "ann@example.org")
            .field("pwd", "p&ss w=rd");
        assert_eq!(
            body.as_str(),
            "submit=1&email=ann%40example.org&pwd=p%26ss%20w%3Drd"
        );
    }

    #[test]
    fn repeated_array_keys() {
        let body = FormBody::new()
            .field("action", "save")
            .fields("source[]", ["a.qgs", "b.qgs"]);
        assert_eq!(
            body.as_str(),
            "action=save&source%5B%5D=a.qgs&source%5B%5D=b.qgs"
        );
    }

    #[test]
    fn empty_list_emits_nothing() {
        let body = FormBody::new()
            .field("action", "save")
            .fields("group_id[]", Vec::<String>::new());
        assert_eq!(body.as_str(), "action=save");
    }

    #[test]
    fn binary_values_are_percent_encoded() {
        let body = FormBody::new().field("bytes", [0x00u8, 0xff, b'A', b' ']);
        assert_eq!(body.as_str(), "bytes=%00%FFA%20");
    }

    #[test]
    fn flags_only_when_enabled() {
        let body = FormBody::new()
            .flag("public", true)
            .flag("cached", false)
            .flag("show_dt", true);
        assert_eq!(body.as_str(), "public=t&show_dt=t");
    }

    #[test]
    fn optional_field() {
        let body = FormBody::new()
            .optional("basemap_id", Some("4"))
            .optional("missing", None::<&str>);
        assert_eq!(body.as_str(), "basemap_id=4");
    }

    #[test]
    fn unreserved_characters_kept() {
        let body = FormBody::new().field("relative_path", "data/roads_v1.2-final~.shp");
        assert_eq!(body.as_str(), "relative_path=data%2Froads_v1.2-final~.shp");
    }
}
