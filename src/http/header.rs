use std::collections::HashMap;
use std::collections::hash_map;

/// Case-insensitive, multi-valued header map.
///
/// Every key is canonicalized before it touches the map, so `host`,
/// `HOST` and `Host` all address the same slot. Values within a slot keep
/// their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HashMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to the slot for `key`, creating the slot if needed.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.inner
            .entry(canonical_key(key))
            .or_default()
            .push(value.into());
    }

    /// Replaces the whole slot for `key` with a single value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(canonical_key(key), vec![value.into()]);
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .get(&canonical_key(key))
            .and_then(|values| values.first())
            .map(|v| v.as_str())
    }

    /// Returns every value stored under `key`, in insertion order.
    pub fn get_values(&self, key: &str) -> Option<&[String]> {
        self.inner.get(&canonical_key(key)).map(|v| v.as_slice())
    }

    pub fn delete(&mut self, key: &str) {
        self.inner.remove(&canonical_key(key));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(&canonical_key(key))
    }

    /// Number of distinct header slots.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<String>> {
        self.inner.iter()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = hash_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Normalizes a header name to its canonical form.
///
/// The key is trimmed, then the first letter and every letter following a
/// hyphen are upper-cased and the rest lower-cased (`content-type` becomes
/// `Content-Type`). Names containing bytes that are not valid in a header
/// field name are returned trimmed but otherwise untouched.
///
/// ```
/// # use ferrule::http::header::canonical_key;
/// assert_eq!(canonical_key("x-forwarded-FOR"), "X-Forwarded-For");
/// assert_eq!(canonical_key(" host "), "Host");
/// ```
pub fn canonical_key(key: &str) -> String {
    let key = key.trim();

    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
