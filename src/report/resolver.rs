//! Maps inconsistent worksheet headers onto semantic [`Role`]s.
//!
//! The rules are plain data so they can be overridden from `config.json`. A resolution pass walks
//! the roles in priority order. For each role it tries the role's matchers in order, and for each
//! matcher it scans the headers left to right, skipping headers an earlier role already claimed.
//! The first hit is claimed by the role.

use crate::model::{normalize, Header, Role, Table};
use crate::Result;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One header predicate. All of its conditions must hold. A matcher with neither `exact` nor
/// `all_of` never matches.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Matcher {
    /// The normalized header must equal this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exact: Option<String>,
    /// The normalized header must contain every one of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    all_of: Vec<String>,
    /// The normalized header must contain none of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    none_of: Vec<String>,
}

impl Matcher {
    pub fn exact(name: &str) -> Self {
        Self {
            exact: Some(name.to_string()),
            ..Matcher::default()
        }
    }

    pub fn contains<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Self {
        Self {
            all_of: parts.into_iter().map(Into::into).collect(),
            ..Matcher::default()
        }
    }

    pub fn excluding<S: Into<String>>(mut self, parts: impl IntoIterator<Item = S>) -> Self {
        self.none_of = parts.into_iter().map(Into::into).collect();
        self
    }

    /// `header` must already be normalized.
    fn matches(&self, header: &str) -> bool {
        if self.exact.is_none() && self.all_of.is_empty() {
            return false;
        }
        if let Some(exact) = &self.exact {
            if header != normalize(exact) {
                return false;
            }
        }
        self.all_of.iter().all(|p| header.contains(&normalize(p)))
            && !self.none_of.iter().any(|p| header.contains(&normalize(p)))
    }
}

/// The matchers for one role.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoleRules {
    role: Role,
    matchers: Vec<Matcher>,
}

impl RoleRules {
    pub fn new(role: Role, matchers: Vec<Matcher>) -> Self {
        Self { role, matchers }
    }
}

/// The full rule table, in claiming priority order.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnRules {
    roles: Vec<RoleRules>,
}

impl ColumnRules {
    pub fn new(roles: Vec<RoleRules>) -> Result<Self> {
        let rules = Self { roles };
        rules.validate()?;
        Ok(rules)
    }

    /// Each role may appear at most once.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for rules in &self.roles {
            if !seen.insert(rules.role) {
                bail!("Role '{}' appears more than once in the column rules", rules.role);
            }
        }
        Ok(())
    }

    /// The roles in claiming priority order.
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().map(|r| r.role)
    }

    /// Runs one resolution pass over `headers`.
    pub fn resolve_all(&self, headers: &[Header]) -> Resolution {
        let normalized: Vec<String> = headers.iter().map(Header::normalized).collect();
        let mut claimed = vec![false; headers.len()];
        let mut columns = BTreeMap::new();

        for rules in &self.roles {
            let hit = rules.matchers.iter().find_map(|matcher| {
                normalized
                    .iter()
                    .enumerate()
                    .find(|(idx, name)| !claimed[*idx] && matcher.matches(name))
                    .map(|(idx, _)| idx)
            });
            if let Some(idx) = hit {
                claimed[idx] = true;
                columns.insert(rules.role, headers[idx].clone());
            }
        }
        Resolution { columns }
    }
}

impl Default for ColumnRules {
    fn default() -> Self {
        use Role::*;
        let m = |parts: &[&str]| Matcher::contains(parts.iter().copied());
        Self {
            roles: vec![
                RoleRules::new(
                    StationCode,
                    vec![
                        Matcher::exact("station_code"),
                        m(&["station", "code"]),
                        m(&["hub", "code"]),
                        m(&["station"]),
                    ],
                ),
                RoleRules::new(
                    Station,
                    vec![
                        Matcher::exact("station"),
                        Matcher::exact("station_name"),
                        m(&["station"]),
                        m(&["hub"]).excluding(["type"]),
                        Matcher::exact("dsp"),
                    ],
                ),
                RoleRules::new(
                    TrackingId,
                    vec![
                        Matcher::exact("tracking_id"),
                        m(&["tracking"]),
                        m(&["awb"]),
                        m(&["shipment", "id"]),
                        Matcher::exact("tid"),
                    ],
                ),
                RoleRules::new(
                    AgeingBucket,
                    vec![m(&["ageing"]), m(&["aging"]), m(&["bucket"])],
                ),
                RoleRules::new(
                    Amount,
                    vec![
                        m(&["amount"]),
                        m(&["balance"]),
                        m(&["value"]),
                        m(&["cod"]).excluding(["code"]),
                        m(&["cash"]),
                    ],
                ),
                RoleRules::new(Date, vec![Matcher::exact("date"), m(&["date"])]),
                RoleRules::new(Status, vec![Matcher::exact("status"), m(&["status"])]),
                RoleRules::new(
                    EmployeeName,
                    vec![
                        m(&["employee"]),
                        m(&["agent"]),
                        m(&["rider"]),
                        Matcher::exact("fe_name"),
                        m(&["name"]).excluding(["station", "hub", "customer", "consignee"]),
                    ],
                ),
            ],
        }
    }
}

/// The outcome of one resolution pass: the column claimed by each role that matched.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Resolution {
    columns: BTreeMap<Role, Header>,
}

impl Resolution {
    pub fn get(&self, role: Role) -> Option<&Header> {
        self.columns.get(&role)
    }

    /// The roles of `wanted` that did not resolve.
    pub fn misses<'a>(&'a self, wanted: &'a [Role]) -> impl Iterator<Item = Role> + 'a {
        wanted
            .iter()
            .copied()
            .filter(|role| !self.columns.contains_key(role))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &Header)> {
        self.columns.iter().map(|(role, header)| (*role, header))
    }
}

/// Resolves a single role against `table`. Other roles still claim columns first according to
/// their priority, so a column taken by a more specific role is never returned here.
pub fn resolve(table: &Table, role: Role, rules: &ColumnRules) -> Option<Header> {
    rules.resolve_all(table.headers()).get(role).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<Header> {
        names.iter().map(|s| Header::from(*s)).collect()
    }

    fn table(names: &[&str]) -> Table {
        Table::parse(vec![names.to_vec()]).unwrap()
    }

    #[test]
    fn test_station_code_claims_before_station() {
        let t = table(&["Station_Code", "Balance_Due", "Employee_Name"]);
        let rules = ColumnRules::default();
        assert_eq!(
            resolve(&t, Role::StationCode, &rules),
            Some(Header::from("Station_Code"))
        );
        assert_eq!(
            resolve(&t, Role::Amount, &rules),
            Some(Header::from("Balance_Due"))
        );
        assert_eq!(resolve(&t, Role::Station, &rules), None);
        assert_eq!(
            resolve(&t, Role::EmployeeName, &rules),
            Some(Header::from("Employee_Name"))
        );
    }

    #[test]
    fn test_station_and_code_both_present() {
        let r = ColumnRules::default().resolve_all(&headers(&[
            "Station",
            "Station Code",
            "COD Amount",
        ]));
        assert_eq!(r.get(Role::StationCode), Some(&Header::from("Station Code")));
        assert_eq!(r.get(Role::Station), Some(&Header::from("Station")));
        assert_eq!(r.get(Role::Amount), Some(&Header::from("COD Amount")));
    }

    #[test]
    fn test_station_alone_falls_back_to_code_role() {
        let r = ColumnRules::default().resolve_all(&headers(&["Station Name", "Amount"]));
        assert_eq!(r.get(Role::StationCode), Some(&Header::from("Station Name")));
        assert_eq!(r.get(Role::Station), None);
    }

    #[test]
    fn test_first_column_wins_within_a_matcher() {
        let r =
            ColumnRules::default().resolve_all(&headers(&["Cash Collected", "Cash Deposited"]));
        assert_eq!(r.get(Role::Amount), Some(&Header::from("Cash Collected")));
    }

    #[test]
    fn test_matcher_order_beats_column_order() {
        let r = ColumnRules::default().resolve_all(&headers(&["Cash", "Amount"]));
        assert_eq!(r.get(Role::Amount), Some(&Header::from("Amount")));
    }

    #[test]
    fn test_cod_does_not_match_code() {
        let r = ColumnRules::default().resolve_all(&headers(&["Pin Code", "COD"]));
        assert_eq!(r.get(Role::Amount), Some(&Header::from("COD")));
    }

    #[test]
    fn test_tracking_and_ageing() {
        let r = ColumnRules::default().resolve_all(&headers(&[
            "AWB No",
            "Ageing Bucket",
            "Shipment Value",
            "Created Date",
            "Current Status",
        ]));
        assert_eq!(r.get(Role::TrackingId), Some(&Header::from("AWB No")));
        assert_eq!(r.get(Role::AgeingBucket), Some(&Header::from("Ageing Bucket")));
        assert_eq!(r.get(Role::Amount), Some(&Header::from("Shipment Value")));
        assert_eq!(r.get(Role::Date), Some(&Header::from("Created Date")));
        assert_eq!(r.get(Role::Status), Some(&Header::from("Current Status")));
    }

    #[test]
    fn test_misses() {
        let r = ColumnRules::default().resolve_all(&headers(&["Station", "Amount"]));
        let wanted = [Role::Station, Role::Amount, Role::TrackingId];
        let misses: Vec<Role> = r.misses(&wanted).collect();
        // "Station" is claimed by station_code's fallback matcher
        assert_eq!(misses, vec![Role::Station, Role::TrackingId]);
    }

    #[test]
    fn test_rules_from_json() {
        let json = r#"[
            {"role": "amount", "matchers": [{"all_of": ["due"]}]},
            {"role": "station", "matchers": [{"exact": "DSP Name"}]}
        ]"#;
        let rules: ColumnRules = serde_json::from_str(json).unwrap();
        rules.validate().unwrap();
        let r = rules.resolve_all(&headers(&["dsp name", "Total Due", "Amount"]));
        assert_eq!(r.get(Role::Amount), Some(&Header::from("Total Due")));
        assert_eq!(r.get(Role::Station), Some(&Header::from("dsp name")));
        assert_eq!(r.get(Role::StationCode), None);
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let result = ColumnRules::new(vec![
            RoleRules::new(Role::Amount, vec![Matcher::exact("amount")]),
            RoleRules::new(Role::Amount, vec![Matcher::exact("value")]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_matcher_never_matches() {
        let rules =
            ColumnRules::new(vec![RoleRules::new(Role::Amount, vec![Matcher::default()])]).unwrap();
        assert_eq!(rules.resolve_all(&headers(&["Amount"])).get(Role::Amount), None);
    }
}
