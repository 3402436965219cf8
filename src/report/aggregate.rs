//! Sums the money columns of the merged table per roster station and per category.

use crate::model::{Amount, Diagnostic, Diagnostics, Outcome, Role, Roster, Station};
use crate::report::merge::MergedTable;
use crate::Result;
use anyhow::bail;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// The largest magnitude a station's category sum may reach. Row and grand totals add up at most
/// a few categories per station over the roster, so they stay well inside `Decimal`'s range.
fn sum_limit() -> Decimal {
    Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0)
}

/// Assigns rows to a category by their provenance tag.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryRule {
    /// Case-insensitive substring of the provenance tag.
    pattern: String,
    category: String,
}

impl CategoryRule {
    pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            category: category.into(),
        }
    }
}

/// Ordered category rules. The first rule whose pattern occurs in a tag wins. The category
/// columns of the summary follow the order in which category names first appear here.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// The distinct category names in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !names.contains(&rule.category.as_str()) {
                names.push(&rule.category);
            }
        }
        names
    }

    /// The category of a provenance tag, if any.
    pub fn categorize(&self, tag: &str) -> Option<&str> {
        let tag = tag.to_lowercase();
        self.rules
            .iter()
            .find(|rule| tag.contains(&rule.pattern.to_lowercase()))
            .map(|rule| rule.category.as_str())
    }

    /// Rejects empty patterns, and exclusions that name a category no rule produces.
    pub fn validate(&self, exclusions: &[HubExclusion]) -> Result<()> {
        if let Some(rule) = self.rules.iter().find(|r| r.pattern.trim().is_empty()) {
            bail!("The category rule for '{}' has an empty pattern", rule.category);
        }
        let categories = self.categories();
        for exclusion in exclusions {
            if !categories.contains(&exclusion.category.as_str()) {
                bail!(
                    "The exclusion for hub type '{}' names unknown category '{}'",
                    exclusion.hub_type,
                    exclusion.category
                );
            }
        }
        Ok(())
    }
}

/// Forces one category to zero for stations of a hub type, because that hub type's cash is
/// already counted under a different category.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HubExclusion {
    hub_type: String,
    category: String,
}

impl HubExclusion {
    pub fn new(hub_type: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            hub_type: hub_type.into(),
            category: category.into(),
        }
    }

    /// A blank hub type never matches.
    fn applies_to(&self, station: &Station) -> bool {
        let hub_type = station.hub_type().trim();
        !hub_type.is_empty() && hub_type.eq_ignore_ascii_case(self.hub_type.trim())
    }
}

/// The amount of one category in an aggregate row.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CategoryAmount {
    category: String,
    amount: Decimal,
}

impl CategoryAmount {
    pub(crate) fn new(category: impl Into<String>, amount: Decimal) -> Self {
        Self {
            category: category.into(),
            amount,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

/// What an aggregate row describes.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowLabel {
    Station(Station),
    /// The grand total appended by the summary builder.
    Total,
}

/// The summed figures of one station, or the grand total.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AggregateRow {
    label: RowLabel,
    amounts: Vec<CategoryAmount>,
    total: Decimal,
}

impl AggregateRow {
    pub(crate) fn new(label: RowLabel, amounts: Vec<CategoryAmount>) -> Self {
        let total = amounts
            .iter()
            .fold(Decimal::ZERO, |acc, a| acc.saturating_add(a.amount));
        Self {
            label,
            amounts,
            total,
        }
    }

    pub fn label(&self) -> &RowLabel {
        &self.label
    }

    /// The station of this row, `None` for the total row.
    pub fn station(&self) -> Option<&Station> {
        match &self.label {
            RowLabel::Station(station) => Some(station),
            RowLabel::Total => None,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self.label, RowLabel::Total)
    }

    pub fn amounts(&self) -> &[CategoryAmount] {
        &self.amounts
    }

    /// The amount of `category`, zero if the row has no such category.
    pub fn amount(&self, category: &str) -> Decimal {
        self.amounts
            .iter()
            .find(|a| a.category == category)
            .map(|a| a.amount)
            .unwrap_or_default()
    }

    pub fn total(&self) -> Decimal {
        self.total
    }
}

/// Computes one row per roster station, in roster order.
///
/// A row belongs to a station when its resolved station cell, or its station code cell if the
/// station cell is blank, equals the station's code. Rows for stations outside the roster are
/// dropped. Amounts that do not parse count as zero. An amount that would take a sum past
/// `sum_limit` is skipped. Sums are rounded to two places after summing.
pub fn aggregate(
    merged: &MergedTable,
    roster: &Roster,
    rules: &CategoryRules,
    exclusions: &[HubExclusion],
) -> Outcome<Vec<AggregateRow>> {
    let mut diagnostics = Diagnostics::default();
    let categories = rules.categories();
    let mut sums = vec![vec![Decimal::ZERO; categories.len()]; roster.len()];
    let mut unknown: BTreeMap<String, usize> = BTreeMap::new();

    // Rows of these sources are skipped below; report each source once.
    for source in merged.sources() {
        if rules.categorize(source.tag()).is_none() {
            diagnostics.push(Diagnostic::UncategorizedSource {
                source: source.tag().to_string(),
            });
            continue;
        }
        let resolution = source.resolution();
        if resolution.get(Role::Station).is_none() && resolution.get(Role::StationCode).is_none() {
            diagnostics.push(Diagnostic::UnresolvedColumn {
                source: source.tag().to_string(),
                role: Role::StationCode,
            });
        } else if resolution.get(Role::Amount).is_none() {
            diagnostics.push(Diagnostic::MissingAmountColumn {
                source: source.tag().to_string(),
            });
        }
    }

    for row in merged.rows() {
        let Some(category) = rules.categorize(row.tag()) else {
            continue;
        };
        let Some(raw_amount) = row.role(Role::Amount) else {
            continue;
        };
        let station = station_value(row.role(Role::Station), row.role(Role::StationCode));
        if station.is_empty() {
            continue;
        }
        let Some(station_ix) = roster.position(station) else {
            *unknown.entry(station.to_string()).or_default() += 1;
            continue;
        };
        let amount = match Amount::from_str(raw_amount) {
            Ok(amount) => amount.value(),
            Err(_) => {
                diagnostics.push(Diagnostic::AmountCoercedToZero {
                    source: row.tag().to_string(),
                    row: row.index() + 1,
                    value: raw_amount.to_string(),
                });
                Decimal::ZERO
            }
        };
        let cat_ix = categories
            .iter()
            .position(|c| *c == category)
            .unwrap_or_default();
        let sum = &mut sums[station_ix][cat_ix];
        match sum.checked_add(amount).filter(|s| s.abs() <= sum_limit()) {
            Some(next) => *sum = next,
            None => diagnostics.push(Diagnostic::AmountOutOfRange {
                source: row.tag().to_string(),
                row: row.index() + 1,
                value: raw_amount.to_string(),
            }),
        }
    }

    for (station, rows) in &unknown {
        debug!("Dropped {rows} rows for station '{station}' which is not in the roster");
    }

    let rows = roster
        .stations()
        .iter()
        .zip(sums)
        .map(|(station, sums)| {
            let amounts = categories
                .iter()
                .zip(sums)
                .map(|(category, sum)| {
                    let excluded = exclusions
                        .iter()
                        .any(|e| e.category == *category && e.applies_to(station));
                    CategoryAmount {
                        category: category.to_string(),
                        amount: if excluded {
                            Decimal::ZERO
                        } else {
                            sum.round_dp(2)
                        },
                    }
                })
                .collect();
            AggregateRow::new(RowLabel::Station(station.clone()), amounts)
        })
        .collect();

    diagnostics.finish(rows)
}

/// The station cell if it is not blank, otherwise the station code cell.
fn station_value<'a>(station: Option<&'a str>, code: Option<&'a str>) -> &'a str {
    match station.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => code.map(str::trim).unwrap_or_default(),
    }
}
