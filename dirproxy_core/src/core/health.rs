use crate::core::connection_registry::ConnectionHandle;
use crate::core::error_record::ErrorRecord;
use crate::storage::profile::ProfileId;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Display};

pub const HEALTH_TOPIC: &str = "LDAP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Good,
    Warn,
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Good => f.write_str("GOOD"),
            HealthStatus::Warn => f.write_str("WARN"),
        }
    }
}

/// One line of health output for an external aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub topic: String,
    pub detail: String,
}

impl HealthRecord {
    fn new(status: HealthStatus, detail: String) -> Self {
        Self {
            status,
            topic: HEALTH_TOPIC.to_string(),
            detail,
        }
    }
}

/// Derives health from recorded failures and the connections that are up.
///
/// A profile counts as recovered once a connection opened after its last
/// failure is cached; otherwise it is reported failing since that failure.
pub(crate) fn directory_health(
    failures: &HashMap<ProfileId, ErrorRecord>,
    live: &[ConnectionHandle],
) -> Vec<HealthRecord> {
    if failures.is_empty() {
        return vec![HealthRecord::new(
            HealthStatus::Good,
            "no directory connection failures recorded".to_string(),
        )];
    }

    let mut entries: Vec<(&ProfileId, &ErrorRecord)> = failures.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries
        .into_iter()
        .map(|(id, record)| {
            let recovered = live
                .iter()
                .find(|h| h.profile_id() == id && !h.is_closed())
                .filter(|h| h.opened_at() >= record.occurred_at());
            match recovered {
                Some(handle) => HealthRecord::new(
                    HealthStatus::Good,
                    format!(
                        "directory profile {} recovered at {} (last failure {}: {})",
                        id,
                        handle.opened_at().to_rfc3339(),
                        record.occurred_at().to_rfc3339(),
                        record.message()
                    ),
                ),
                None => HealthRecord::new(
                    HealthStatus::Warn,
                    format!(
                        "directory profile {} failing since {}: {}",
                        id,
                        record.occurred_at().to_rfc3339(),
                        record.message()
                    ),
                ),
            }
        })
        .collect()
}
