//! fw-catalog
//!
//! Static description of what is monitored: equipment units with their IC/PC
//! status fields and bit maps, and the site codes with their display names.
//!
//! The catalog is data. It is read once at startup, either from the built-in
//! tables or from a YAML file, and shared read-only by every site task.

mod builtin;

use std::collections::BTreeSet;
use std::fs;

use anyhow::{bail, Context, Result};
use fw_reconcile::{BitMap, FieldKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredField {
    /// Time-series field carrying the bitmask.
    pub field: String,
    #[serde(default)]
    pub bits: BitMap,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Value written to the fault log's `eqp` column.
    pub eqp_name: String,
    pub ic: MonitoredField,
    pub pc: MonitoredField,
}

impl Equipment {
    /// Monitored fields in processing order: IC first, then PC.
    pub fn fields(&self) -> [(FieldKind, &MonitoredField); 2] {
        [(FieldKind::Ic, &self.ic), (FieldKind::Pc, &self.pc)]
    }

    pub fn field(&self, kind: FieldKind) -> &MonitoredField {
        match kind {
            FieldKind::Ic => &self.ic,
            FieldKind::Pc => &self.pc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub equipment: Vec<Equipment>,
    pub sites: Vec<Site>,
}

impl Catalog {
    /// The six units and the site list deployed today.
    pub fn builtin() -> Self {
        Self {
            equipment: builtin::equipment(),
            sites: builtin::sites(),
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let cat: Catalog = serde_yaml::from_str(raw).context("invalid catalog yaml")?;
        cat.validate()?;
        Ok(cat)
    }

    pub fn load_yaml(path: &str) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed to read catalog: {path}"))?;
        Self::from_yaml_str(&raw).with_context(|| format!("catalog {path}"))
    }

    /// Reject catalogs that would silently misbehave at run time.
    pub fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        for eq in &self.equipment {
            if !ids.insert(eq.id.as_str()) {
                bail!("duplicate equipment id: {}", eq.id);
            }
            if eq.eqp_name.trim().is_empty() {
                bail!("equipment {} has an empty eqp_name", eq.id);
            }
            for (kind, f) in eq.fields() {
                if f.field.trim().is_empty() {
                    bail!("equipment {} has an empty {} field name", eq.id, kind.as_str());
                }
                let bad = f.bits.out_of_range_keys();
                if !bad.is_empty() {
                    bail!(
                        "equipment {} {} map has bit positions above 31: {:?}",
                        eq.id,
                        kind.as_str(),
                        bad
                    );
                }
            }
        }

        // Episodes are keyed on the display name, so names must be unique too.
        let mut codes = BTreeSet::new();
        let mut names = BTreeSet::new();
        for s in &self.sites {
            if !codes.insert(s.code.as_str()) {
                bail!("duplicate site code: {}", s.code);
            }
            if !names.insert(s.name.as_str()) {
                bail!("duplicate site name: {} (code {})", s.name, s.code);
            }
        }
        Ok(())
    }

    /// Display name for a site code; the code itself when unmapped.
    pub fn site_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.sites
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.name.as_str())
            .unwrap_or(code)
    }

    pub fn site_codes(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.code.clone()).collect()
    }

    pub fn equipment(&self, id: &str) -> Option<&Equipment> {
        self.equipment
            .iter()
            .find(|e| e.id.eq_ignore_ascii_case(id))
    }
}
