//! Scenario: a YAML catalog replaces the built-in tables.
//!
//! # Invariants under test
//!
//! 1. Equipment, fields, bit maps and sites load from YAML.
//! 2. Partial and empty bit maps are accepted (unmapped bits are ignored later).
//! 3. Duplicate ids, codes, site names and bit keys above 31 are rejected
//!    at load time.

use std::io::Write;

use fw_catalog::Catalog;
use fw_reconcile::BitPosition;

const CATALOG: &str = r#"
equipment:
  - id: DC1
    title: "Batterie DC1 (SEQ02)"
    eqp_name: "Variateur HC1"
    ic:
      field: "SEQ02.OLI.A.IC1"
      bits:
        0: "IC00 - DC contactor line open"
        2: "IC02 - DC Preload Fuse"
    pc:
      field: "SEQ02.OLI.A.PC1"
sites:
  - { code: "7571", name: "Orignolles" }
  - { code: "9999", name: "Lab" }
"#;

#[test]
fn yaml_catalog_loads_partial_maps() {
    let cat = Catalog::from_yaml_str(CATALOG).unwrap();
    assert_eq!(cat.equipment.len(), 1);

    let dc1 = cat.equipment("DC1").unwrap();
    assert_eq!(dc1.ic.bits.len(), 2);
    assert!(dc1.pc.bits.is_empty());
    assert_eq!(
        dc1.ic.bits.describe(BitPosition::new(2).unwrap()),
        Some("IC02 - DC Preload Fuse")
    );
    assert_eq!(dc1.ic.bits.describe(BitPosition::new(1).unwrap()), None);

    assert_eq!(cat.site_codes(), vec!["7571".to_string(), "9999".to_string()]);
    assert_eq!(cat.site_name("9999"), "Lab");
}

#[test]
fn yaml_catalog_loads_from_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(CATALOG.as_bytes()).unwrap();
    let cat = Catalog::load_yaml(f.path().to_str().unwrap()).unwrap();
    assert_eq!(cat.sites.len(), 2);
}

#[test]
fn duplicate_site_code_rejected() {
    let raw = r#"
equipment: []
sites:
  - { code: "7571", name: "A" }
  - { code: "7571", name: "B" }
"#;
    let err = Catalog::from_yaml_str(raw).unwrap_err();
    assert!(format!("{err:#}").contains("duplicate site code"));
}

#[test]
fn duplicate_site_name_rejected() {
    let raw = r#"
equipment: []
sites:
  - { code: "7571", name: "Orignolles" }
  - { code: "7571-B", name: "Orignolles" }
"#;
    let err = Catalog::from_yaml_str(raw).unwrap_err();
    assert!(format!("{err:#}").contains("duplicate site name: Orignolles"));
}

#[test]
fn bit_key_above_31_rejected() {
    let raw = r#"
equipment:
  - id: X
    eqp_name: X
    ic: { field: "A.IC1", bits: { 32: "too far" } }
    pc: { field: "A.PC1" }
sites: []
"#;
    let err = Catalog::from_yaml_str(raw).unwrap_err();
    assert!(format!("{err:#}").contains("above 31"));
}

#[test]
fn duplicate_equipment_id_rejected() {
    let raw = r#"
equipment:
  - { id: X, eqp_name: X, ic: { field: "A.IC1" }, pc: { field: "A.PC1" } }
  - { id: X, eqp_name: Y, ic: { field: "B.IC1" }, pc: { field: "B.PC1" } }
sites: []
"#;
    assert!(Catalog::from_yaml_str(raw).is_err());
}
