use serde::{Deserialize, Serialize};

/// The semantic meaning a worksheet column can be resolved to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A station identifier, usually a station or hub name column.
    Station,
    /// The station code column.
    StationCode,
    /// The money column that is summed or compared.
    Amount,
    Status,
    EmployeeName,
    Date,
    /// A shipment tracking number (AWB). The natural key of high-value records.
    TrackingId,
    AgeingBucket,
}

serde_plain::derive_display_from_serialize!(Role);
serde_plain::derive_fromstr_from_deserialize!(Role);

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Station,
        Role::StationCode,
        Role::Amount,
        Role::Status,
        Role::EmployeeName,
        Role::Date,
        Role::TrackingId,
        Role::AgeingBucket,
    ];
}
