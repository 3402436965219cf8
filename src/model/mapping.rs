use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;
use tracing::debug;

/// The ordered header row of a worksheet, with a lookup from header to column index.
///
/// Dashboard exports sometimes repeat a header. Later occurrences are renamed with a numeric
/// suffix (`Amount`, `Amount.1`, `Amount.2`) so every column stays addressable by name.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Mapping {
    headers: Vec<Header>,
    header_map: HashMap<Header, usize>,
}

impl Mapping {
    /// Create a new `Mapping` from a list of header strings.
    pub fn new<S, I>(headers: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let mut mapping = Mapping::default();
        for header in headers {
            mapping.push(header);
        }
        mapping
    }

    /// Appends `header`, renaming it if it collides with an existing header. Returns the header
    /// as stored.
    pub(crate) fn push(&mut self, header: impl Into<String>) -> &Header {
        let original: String = header.into();
        let mut candidate = Header::from(original.trim());
        let mut n = 0;
        while self.header_map.contains_key(&candidate) {
            n += 1;
            candidate = Header::from(format!("{}.{n}", original.trim()));
        }
        if n > 0 {
            debug!("Duplicate header '{original}' renamed to '{}'", candidate.as_ref());
        }
        let idx = self.headers.len();
        self.header_map.insert(candidate.clone(), idx);
        self.headers.push(candidate);
        &self.headers[idx]
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn contains(&self, header: &Header) -> bool {
        self.header_map.contains_key(header)
    }

    pub fn index(&self, header: &Header) -> Option<usize> {
        self.header_map.get(header).copied()
    }
}

impl Serialize for Mapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.headers.len()))?;
        for header in &self.headers {
            seq.serialize_element(header.as_ref())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items: Vec<String> = Vec::deserialize(deserializer)?;
        Ok(Mapping::new(items))
    }
}

/// Represents a header in a worksheet, for example, `Station Code`
#[derive(Default, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header(String);

impl Header {
    /// The header in the form used for rule matching, see [`normalize`].
    pub fn normalized(&self) -> String {
        normalize(&self.0)
    }
}

impl AsRef<str> for Header {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl<S: Into<String>> From<S> for Header {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl FromStr for Header {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

/// Lower-cases `s`, trims it and collapses every run of whitespace, `_`, `-` and `.` into a
/// single `_`. `"Station  Code"`, `"station_code"` and `"STATION-CODE"` all become
/// `"station_code"`.
pub fn normalize(s: impl AsRef<str>) -> String {
    let lower = s.as_ref().trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending_sep = false;
    for c in lower.chars() {
        if c.is_whitespace() || c == '_' || c == '-' || c == '.' {
            pending_sep = !out.is_empty();
        } else {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Station Code"), "station_code");
        assert_eq!(normalize("  STATION__code "), "station_code");
        assert_eq!(normalize("Station-Code."), "station_code");
        assert_eq!(normalize("Ageing (Days)"), "ageing_(days)");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_duplicate_headers_are_renamed() {
        let mapping = Mapping::new(vec!["Amount", "Station", "Amount", "Amount"]);
        let names: Vec<&str> = mapping.headers().iter().map(|h| h.as_ref()).collect();
        assert_eq!(names, vec!["Amount", "Station", "Amount.1", "Amount.2"]);
        assert_eq!(mapping.index(&Header::from("Amount.2")), Some(3));
    }

    #[test]
    fn test_headers_are_trimmed() {
        let mapping = Mapping::new(vec![" Station Code "]);
        assert!(mapping.contains(&Header::from("Station Code")));
    }

    #[test]
    fn test_mapping_serde() {
        let original_json = r##"["Station","Amount","Amount.1"]"##;
        let mapping: Mapping = serde_json::from_str(original_json).unwrap();
        let serialized = serde_json::to_string(&mapping).unwrap();
        assert_eq!(original_json, serialized);
    }
}
