//! Canonical request fingerprints.

use std::fmt;
use url::form_urlencoded;

use crate::transport::Params;

/// Separates the URL from the encoded parameters. Never valid inside a URL.
const SEPARATOR: char = '\n';

/// Canonical key for "the same request": the URL plus its parameter pairs
/// sorted by name, then value, and form-urlencoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(url: &str, params: &Params) -> Self {
        let mut pairs: Vec<(&str, &str)> = params.iter().collect();
        pairs.sort_unstable();

        let mut key = String::with_capacity(url.len() + 1);
        key.push_str(url.trim());
        if !pairs.is_empty() {
            key.push(SEPARATOR);
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            key.push_str(&encoded);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.replace(SEPARATOR, "?"))
    }
}
