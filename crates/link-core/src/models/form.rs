use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::form_urlencoded;

use super::error::OAuth2Error;

/// Decoded request parameters (query string and/or form body).
///
/// Serializable so an interrupted authorization request can be parked in the
/// session and replayed after login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormParams(BTreeMap<String, String>);

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `application/x-www-form-urlencoded` input, rejecting repeated keys.
    pub fn parse_no_dupes(input: &[u8]) -> Result<Self, OAuth2Error> {
        let mut map = BTreeMap::new();
        for (k, v) in form_urlencoded::parse(input) {
            let key = k.into_owned();
            if map.contains_key(&key) {
                return Err(OAuth2Error::invalid_request(
                    "Duplicate parameters are not allowed",
                ));
            }
            map.insert(key, v.into_owned());
        }
        Ok(Self(map))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get) but treats empty and whitespace-only values as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: FormParams) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_decodes_values() {
        let form =
            FormParams::parse_no_dupes(b"client_id=abc&redirect_uri=https%3A%2F%2Fa.b%2Fcb")
                .unwrap();
        assert_eq!(form.get("client_id"), Some("abc"));
        assert_eq!(form.get("redirect_uri"), Some("https://a.b/cb"));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = FormParams::parse_no_dupes(b"a=1&a=2").unwrap_err();
        assert_eq!(err.error, "invalid_request");
    }

    #[test]
    fn empty_values_are_absent_for_get_non_empty() {
        let form = FormParams::parse_no_dupes(b"token=&state=%20").unwrap();
        assert_eq!(form.get("token"), Some(""));
        assert_eq!(form.get_non_empty("token"), None);
        assert_eq!(form.get_non_empty("state"), None);
    }

    #[test]
    fn merge_overrides_existing_keys() {
        let mut base: FormParams = [("a", "1"), ("b", "2")].into_iter().collect();
        base.merge([("b", "3")].into_iter().collect());
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("3"));
    }

    #[test]
    fn survives_a_json_round_trip_through_the_session() {
        let form: FormParams = [("client_id", "c"), ("state", "xyz")].into_iter().collect();
        let json = serde_json::to_string(&form).unwrap();
        assert_eq!(json, r#"{"client_id":"c","state":"xyz"}"#);
        let back: FormParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, form);
    }
}
