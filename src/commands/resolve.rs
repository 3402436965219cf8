use crate::api::{self, Mode};
use crate::commands::sources::{read_optional, read_required};
use crate::commands::Out;
use crate::model::{Diagnostic, Diagnostics, Role};
use crate::report::merge;
use crate::{Config, Result};
use serde::Serialize;

/// The columns claimed by each role in one source worksheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SourceColumns {
    source: String,
    columns: Vec<(Role, String)>,
    /// Roles the report needs that matched no column.
    missing: Vec<Role>,
}

impl SourceColumns {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn columns(&self) -> &[(Role, String)] {
        &self.columns
    }

    /// The header claimed by `role`, if any.
    pub fn column(&self, role: Role) -> Option<&str> {
        self.columns
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, h)| h.as_str())
    }

    pub fn missing(&self) -> &[Role] {
        &self.missing
    }
}

/// Shows how the column rules resolve against every configured worksheet without computing
/// anything. Useful when a source changes its headers.
pub async fn resolve(config: Config, mode: Mode) -> Result<Out<Vec<SourceColumns>>> {
    let hv = config.high_value();
    let mut required = vec![Role::StationCode, Role::Amount];
    for role in [hv.key_role(), hv.value_role()] {
        if !required.contains(&role) {
            required.push(role);
        }
    }

    let mut diagnostics = Diagnostics::default();
    let mut sheet = api::sheet(&config.source_workbook(), mode);
    let mut tables = read_required(sheet.as_mut(), config.risk_worksheets()).await?;
    tables.extend(read_optional(sheet.as_mut(), hv.extra_worksheets(), &mut diagnostics).await);

    let (merged, found) = merge(tables, &config.columns(), &required).into_parts();
    diagnostics.extend(found);
    let (_, diagnostics) = diagnostics.finish(()).into_parts();

    let sources: Vec<SourceColumns> = merged
        .sources()
        .iter()
        .map(|source| SourceColumns {
            source: source.tag().to_string(),
            columns: source
                .resolution()
                .iter()
                .map(|(role, header)| (role, header.as_ref().to_string()))
                .collect(),
            missing: diagnostics
                .iter()
                .filter_map(|d| match d {
                    Diagnostic::UnresolvedColumn { source: s, role } if s == source.tag() => {
                        Some(*role)
                    }
                    _ => None,
                })
                .collect(),
        })
        .collect();

    let incomplete = sources.iter().filter(|s| !s.missing.is_empty()).count();
    let message = match incomplete {
        0 => format!("Resolved every needed column in {} worksheets", sources.len()),
        n => format!("{n} of {} worksheets are missing needed columns", sources.len()),
    };
    Ok(Out::new(message, sources))
}
