//! The station roster: the authoritative list of stations a report covers.

use crate::Result;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// One row of the roster CSV file.
///
/// `"Station Code","City","Region","Hub Type","Managers","Emails"`
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
struct CsvStation {
    #[serde(rename = "Station Code")]
    code: String,
    #[serde(rename = "City", default)]
    city: String,
    #[serde(rename = "Region", default)]
    region: String,
    #[serde(rename = "Hub Type", default)]
    hub_type: String,
    #[serde(rename = "Managers", default)]
    managers: String,
    #[serde(rename = "Emails", default)]
    emails: String,
}

/// Static metadata for one station.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Station {
    code: String,
    city: String,
    region: String,
    hub_type: String,
    managers: Vec<String>,
    emails: Vec<String>,
}

impl Station {
    pub fn new(
        code: impl AsRef<str>,
        region: impl Into<String>,
        hub_type: impl Into<String>,
    ) -> Self {
        Self {
            code: normalize_code(code),
            region: region.into(),
            hub_type: hub_type.into(),
            ..Station::default()
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_managers<S: Into<String>>(mut self, managers: impl IntoIterator<Item = S>) -> Self {
        self.managers = managers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_emails<S: Into<String>>(mut self, emails: impl IntoIterator<Item = S>) -> Self {
        self.emails = emails.into_iter().map(Into::into).collect();
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn hub_type(&self) -> &str {
        &self.hub_type
    }

    pub fn managers(&self) -> &[String] {
        &self.managers
    }

    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    /// The value of a metadata field, used for sorting.
    pub fn field(&self, field: StationField) -> &str {
        match field {
            StationField::Code => &self.code,
            StationField::City => &self.city,
            StationField::Region => &self.region,
            StationField::HubType => &self.hub_type,
        }
    }
}

/// The metadata fields a summary can be grouped by.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationField {
    Code,
    City,
    Region,
    HubType,
}

serde_plain::derive_display_from_serialize!(StationField);
serde_plain::derive_fromstr_from_deserialize!(StationField);

/// The ordered, immutable set of stations. Iteration order is file order.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Roster {
    stations: Vec<Station>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Roster {
    /// Builds a roster, rejecting empty and duplicate station codes.
    pub fn new(stations: impl IntoIterator<Item = Station>) -> Result<Self> {
        let mut roster = Roster::default();
        for station in stations {
            if station.code.is_empty() {
                bail!(
                    "A roster entry has an empty station code (entry {})",
                    roster.stations.len() + 1
                );
            }
            if roster.index.contains_key(&station.code) {
                bail!("Station code '{}' appears more than once in the roster", station.code);
            }
            roster
                .index
                .insert(station.code.clone(), roster.stations.len());
            roster.stations.push(station);
        }
        Ok(roster)
    }

    /// Reads a roster from CSV data with a header row.
    pub fn from_csv(reader: impl Read) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut stations = Vec::new();
        for (ix, result) in rdr.deserialize().enumerate() {
            let record: CsvStation =
                result.with_context(|| format!("Unable to parse roster row {}", ix + 2))?;
            stations.push(Station {
                code: normalize_code(&record.code),
                city: record.city,
                region: record.region,
                hub_type: record.hub_type,
                managers: split_list(&record.managers),
                emails: split_list(&record.emails),
            });
        }
        Self::new(stations)
    }

    /// Reads a roster CSV file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Unable to open roster file {}", path.display()))?;
        Self::from_csv(file).with_context(|| format!("Invalid roster file {}", path.display()))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Looks up a station by a code as it appears in data. The code is normalized first.
    pub fn get(&self, code: &str) -> Option<&Station> {
        self.index
            .get(&normalize_code(code))
            .map(|&idx| &self.stations[idx])
    }

    /// The position of a station in the roster.
    pub fn position(&self, code: &str) -> Option<usize> {
        self.index.get(&normalize_code(code)).copied()
    }
}

/// Station codes compare trimmed and upper-cased.
pub fn normalize_code(code: impl AsRef<str>) -> String {
    code.as_ref().trim().to_uppercase()
}

fn split_list(s: &str) -> Vec<String> {
    s.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = "\
Station Code,City,Region,Hub Type,Managers,Emails
 blr1 ,Bengaluru,Karnataka,DSP,Asha; Ravi,blr1@example.com
MYS2,Mysuru,Karnataka,eDSP,,
";

    #[test]
    fn test_from_csv() {
        let roster = Roster::from_csv(ROSTER.as_bytes()).unwrap();
        assert_eq!(roster.len(), 2);
        let blr = &roster.stations()[0];
        assert_eq!(blr.code(), "BLR1");
        assert_eq!(blr.managers(), &["Asha".to_string(), "Ravi".to_string()]);
        assert_eq!(blr.emails(), &["blr1@example.com".to_string()]);
        assert!(roster.stations()[1].emails().is_empty());
        assert_eq!(roster.get(" mys2").map(|s| s.city()), Some("Mysuru"));
        assert_eq!(roster.position("MYS2"), Some(1));
    }

    #[test]
    fn test_duplicate_code() {
        let err = Roster::new(vec![
            Station::new("A1", "North", "DSP"),
            Station::new("a1 ", "South", "DSP"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_empty_code() {
        assert!(Roster::new(vec![Station::new("  ", "North", "DSP")]).is_err());
    }

    #[test]
    fn test_station_field() {
        let station = Station::new("A1", "North", "eDSP").with_city("Pune");
        assert_eq!(station.field(StationField::Region), "North");
        assert_eq!(station.field(StationField::HubType), "eDSP");
        assert_eq!(station.field(StationField::City), "Pune");
        assert_eq!("hub_type".parse::<StationField>().unwrap(), StationField::HubType);
    }
}
