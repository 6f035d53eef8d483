use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bits::BitPosition;

/// One time-series point: (timestamp, numeric value).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(ts: DateTime<Utc>, value: f64) -> Self {
        Self { ts, value }
    }
}

/// Store-assigned surrogate id of a fault episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub i64);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two monitored status words of an equipment unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Interlock conditions.
    Ic,
    /// Permissive conditions.
    Pc,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Ic => "IC",
            FieldKind::Pc => "PC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ic" => Some(FieldKind::Ic),
            "pc" => Some(FieldKind::Pc),
            _ => None,
        }
    }
}

/// Bit position -> human description for one field of one equipment type.
///
/// Unmapped positions and empty descriptions both mean "not monitored".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitMap(BTreeMap<u8, String>);

impl BitMap {
    pub fn from_pairs(pairs: &[(u8, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(bit, desc)| (*bit, desc.to_string()))
                .collect(),
        )
    }

    pub fn describe(&self, bit: BitPosition) -> Option<&str> {
        self.0
            .get(&bit.get())
            .map(String::as_str)
            .filter(|d| !d.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys that can never match a 32-bit field.
    pub fn out_of_range_keys(&self) -> Vec<u8> {
        self.0
            .keys()
            .copied()
            .filter(|k| *k > BitPosition::MAX)
            .collect()
    }
}

/// Identity of the episodes written for one (site, field, equipment) unit.
///
/// `site` is the display name stored in the `site` column, not the
/// time-series tag value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeKey {
    pub site: String,
    pub field_name: String,
    pub equipment: String,
}

impl EpisodeKey {
    pub fn new(
        site: impl Into<String>,
        field_name: impl Into<String>,
        equipment: impl Into<String>,
    ) -> Self {
        Self {
            site: site.into(),
            field_name: field_name.into(),
            equipment: equipment.into(),
        }
    }
}

/// Projection of an episode with a null end timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenEpisode {
    pub id: EpisodeId,
    pub bit: BitPosition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEpisode {
    pub key: EpisodeKey,
    pub bit: BitPosition,
    pub description: String,
    pub start: DateTime<Utc>,
}

/// Everything the engine needs to reconcile one monitored field.
#[derive(Clone, Copy, Debug)]
pub struct FieldUnit<'a> {
    /// Time-series tag value.
    pub site_code: &'a str,
    /// Value written to the store's `site` column.
    pub site_name: &'a str,
    pub equipment: &'a str,
    pub field_name: &'a str,
    pub kind: FieldKind,
    pub bits: &'a BitMap,
}

impl FieldUnit<'_> {
    pub fn episode_key(&self) -> EpisodeKey {
        EpisodeKey::new(self.site_name, self.field_name, self.equipment)
    }
}

/// Counters for one reconciliation cycle, summed upward per site and run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FieldOutcome {
    pub closed: usize,
    pub created: usize,
    /// Created episodes whose start came from a rising edge in history.
    pub backfilled: usize,
    /// Created episodes stamped with the processing time.
    pub fallback_now: usize,
    /// Active bits with no description; never logged as episodes.
    pub unmapped_active: usize,
    /// Store or gateway operations that failed inside the cycle.
    pub failed_ops: usize,
}

impl FieldOutcome {
    pub fn mutations(&self) -> usize {
        self.closed + self.created
    }
}

impl AddAssign for FieldOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.closed += rhs.closed;
        self.created += rhs.created;
        self.backfilled += rhs.backfilled;
        self.fallback_now += rhs.fallback_now;
        self.unmapped_active += rhs.unmapped_active;
        self.failed_ops += rhs.failed_ops;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_ignores_unmapped_and_empty_descriptions() {
        let m = BitMap::from_pairs(&[(0, "IC00 - DC contactor line open"), (3, "")]);
        assert_eq!(
            m.describe(BitPosition::new(0).unwrap()),
            Some("IC00 - DC contactor line open")
        );
        assert_eq!(m.describe(BitPosition::new(3).unwrap()), None);
        assert_eq!(m.describe(BitPosition::new(4).unwrap()), None);
    }

    #[test]
    fn field_kind_parse() {
        assert_eq!(FieldKind::parse("IC"), Some(FieldKind::Ic));
        assert_eq!(FieldKind::parse(" pc "), Some(FieldKind::Pc));
        assert_eq!(FieldKind::parse("xx"), None);
    }

    #[test]
    fn outcome_sums() {
        let mut a = FieldOutcome {
            closed: 1,
            created: 2,
            ..Default::default()
        };
        a += FieldOutcome {
            closed: 3,
            failed_ops: 1,
            ..Default::default()
        };
        assert_eq!(a.closed, 4);
        assert_eq!(a.created, 2);
        assert_eq!(a.failed_ops, 1);
        assert_eq!(a.mutations(), 6);
    }
}
