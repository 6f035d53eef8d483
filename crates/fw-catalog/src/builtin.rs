//! Built-in equipment and site tables.
//!
//! IC/PC bit maps are shared between equipment of the same family: both
//! battery inverters use the SEQ02/SEQ03 tables, all four charge points use
//! the PDC tables.

use fw_reconcile::BitMap;

use crate::{Equipment, MonitoredField, Site};

const BATTERY_IC: &[(u8, &str)] = &[
    (0, "IC00 - DC contactor line open"),
    (1, "IC01 - DC Preload contactor open"),
    (2, "IC02 - DC Preload Fuse"),
    (3, "IC03 - Battery bank connected"),
    (4, "IC04 - Inverter not energize"),
];

const BATTERY_PC: &[(u8, &str)] = &[
    (0, "PC00 - RIO no fault communication"),
    (1, "PC01 - Battery bank no fault communication"),
    (2, "PC02 - Preload fuses"),
    (3, "PC03 - Discordance DC line contactor"),
    (4, "PC04 - Discordance Preload contactor"),
    (5, "PC05 - No Time OUT"),
    (6, "PC06 - Inverter ready"),
    (7, "PC07 - Upstream PDC connected"),
    (8, "PC08 - MeasVDC > 670 VDC"),
    (9, "PC09 - Tilt sensor FLT"),
    (10, "PC10 - External Emergency stop"),
];

const CHARGE_POINT_IC: &[(u8, &str)] = &[
    (0, "IC00 : Main sequence running"),
    (1, "IC01 : Ev contactor not closed"),
    (2, "IC02 : No over temp Self"),
    (3, "IC03 : CB line close"),
    (6, "IC06 : OCPP Running"),
    (7, "IC07 : HMI communication"),
    (8, "IC08 : No Open OCPP TR"),
    (9, "IC09 : DCBM COM"),
    (10, "IC10 : PDC unvailable from CPO"),
    (11, "IC11 : Power limit JBOX = 0"),
];

const CHARGE_POINT_PC: &[(u8, &str)] = &[
    (0, "PC00 : RIO COm"),
    (1, "PC01 : CB line close"),
    (2, "PC02 : Inverter M1 Ready"),
    (3, "PC03 : UpstreamSequence no fault"),
    (4, "PC04 : Ev contactor no discordance"),
    (6, "PC06 : No over temp Self"),
    (7, "PC07 : No TO"),
    (8, "PC08 : Plug no Over Temp CCS"),
    (9, "PC09 : Over voltage"),
    (12, "PC12 : Communication EVI"),
    (13, "PC13 : EVI Emergency stop"),
    (14, "PC14 : Manu indispo"),
];

/// (id, title, eqp column value, sequence number, uses battery tables)
const EQUIPMENT: &[(&str, &str, &str, &str, bool)] = &[
    ("DC1", "Batterie DC1 (SEQ02)", "Variateur HC1", "SEQ02", true),
    ("DC2", "Batterie DC2 (SEQ03)", "Variateur HC2", "SEQ03", true),
    ("PDC1", "Point de charge 1 (SEQ12)", "PDC1", "SEQ12", false),
    ("PDC2", "Point de charge 2 (SEQ22)", "PDC2", "SEQ22", false),
    ("PDC3", "Point de charge 3 (SEQ13)", "PDC3", "SEQ13", false),
    ("PDC4", "Point de charge 4 (SEQ23)", "PDC4", "SEQ23", false),
];

const SITES: &[(&str, &str)] = &[
    ("7571", "Orignolles"),
    ("7796", "Meru"),
    ("7797", "Charleval"),
    ("7798", "Triel"),
    ("7800", "Saujon"),
    ("7803", "Cierzac"),
    ("7804", "Os Marsillon"),
    ("7809", "St Pere en retz"),
    ("7812", "Hagetmau"),
    ("7813", "Biscarosse"),
    ("7814", "Auriolles"),
    ("7818", "Verneuil"),
    ("7819", "Allaire"),
    ("7825", "Vezin"),
    ("7828", "Pontchateau"),
    ("7833", "Pontfaverger"),
    ("7951-001", "Baud"),
    ("7951-003", "Maurs"),
    ("7951-050", "Mezidon"),
    ("7951-051", "Derval"),
    ("7951-054", "Campagne"),
    ("7951-057", "Mailly le Chateau"),
    ("7951-062", "Winnezeele"),
    ("7951-063", "Diges"),
    ("7951-065", "Vernouillet"),
    ("7951-067", "Orbec"),
    ("7951-071", "St Renan"),
    ("7951-079", "Molompize"),
    ("7951-081", "Carquefou"),
    ("7951-083", "Vaupillon"),
    ("7951-085", "Pleumartin"),
    ("7951-086", "Caumont sur Aure"),
    ("7951-087", "Getigne"),
    ("7951-088", "Chinon"),
    ("7951-091", "La Roche sur Yon"),
    ("7951-093", "Aubigne sur Layon"),
    ("7951-094", "Bonvillet"),
    ("7951-096", "Rambervillers"),
    ("7951-099", "Blere"),
    ("7951-100", "Plouasne"),
    ("7951-108", "Champniers"),
    ("7951-112", "Nissan Lez Enserune"),
    ("7951-114", "Combourg"),
    ("7951-115", "Vimoutiers"),
    ("7951-118", "Beaumont de Lomagne"),
    ("7951-121", "Sueves"),
    ("7951-122", "Maen Roch"),
    ("7951-124", "St Leon sur L Isle"),
    ("7951-125", "Mirecourt"),
    ("7951-128", "La Voge les Bains"),
    ("7951-130", "Amanvillers"),
    ("7951-131", "Guerlesquin"),
    ("7951-134", "Guerande"),
    ("7951-135", "Riscle"),
    ("7951-139", "Avrille"),
    ("7951-142", "Domfront"),
    ("7951-149", "Couesmes"),
    ("8266-156", "Ste Catherine"),
    ("8266-160", "Andel"),
    ("8266-161", "Chazey Bons"),
    ("8266-163", "Lauzerte"),
    ("8266-165", "Trie la ville"),
    ("8266-166", "Hambach"),
    ("8266-167", "Beaugency"),
    ("8266-168", "Carcassonne"),
    ("8266-174", "Sable sur Sarthe"),
    ("8266-179", "Taden"),
    ("8266-184", "Rue"),
    ("8266-185", "Quevilloncourt"),
    ("8266-187", "St Victor de Morestel"),
    ("8266-191", "St Hilaire du Harcouet"),
    ("8266-196", "Hémonstoir"),
    ("8266-197", "Amily"),
    ("8266-199", "Henrichemont"),
    ("8266-203", "Couleuvre"),
    ("8266-208", "St Pierre le Moutier 2"),
    ("8266-209", "Bourbon L Archambaut"),
    ("8266-210", "Brou"),
    ("8266-211", "Neulise"),
    ("8266-214", "St Jean le vieux"),
    ("8266-217", "Periers"),
    ("8266-218", "Quievrecourt"),
    ("8266-221", "Chazelle sur Lyon"),
    ("8266-222", "Montverdun"),
    ("8266-223", "Dormans"),
    ("8266-227", "Glonville 2"),
    ("8266-230", "Montalieu Vercieu"),
    ("8266-234", "Nesle Normandeuse"),
    ("8266-240", "Noyal Pontivy"),
    ("8266-246", "Vitre 2"),
    ("8266-247", "St Amour"),
    ("8266-250", "Dourdan"),
    ("8266-254", "Roanne"),
    ("8266-259", "Plufur"),
    ("8266-266", "Boinville en Mantois"),
    ("8266-269", "Loche"),
    ("8266-272", "Bonnieres sur Seine"),
    ("8266-273", "Piffonds"),
    ("8266-274", "St Benin d Azy"),
    ("8558-276", "Niort St Florent"),
    ("8558-281", "Chauffailles"),
    ("8558-282", "St Vincent d Autejac"),
    ("8558-283", "Culhat"),
    ("8558-289", "Loireauxence"),
    ("8558-292", "Reuil"),
    ("8558-301", "Coteaux sur Loire"),
    ("8558-304", "Le Mans 2"),
    ("8558-311", "Chantrigne"),
    ("8558-313", "St Thelo"),
    ("8558-314", "St Pierre la cour"),
    ("8558-317", "Nievroz"),
    ("8558-318", "Val Revermont"),
    ("8558-320", "Mondoubleau"),
    ("8558-321", "Kernoues"),
    ("8558-322", "Yvetot Bocage"),
    ("8558-324", "Douchy Montcorbon"),
    ("8558-328", "Sully sur Loire B"),
    ("8558-330", "Vincey"),
    ("8558-336", "Ville en Vermois"),
    ("8558-337", "Virandeville"),
    ("8558-339", "Reims"),
    ("8558-340", "Reims B"),
];

pub(crate) fn equipment() -> Vec<Equipment> {
    EQUIPMENT
        .iter()
        .map(|(id, title, eqp_name, seq, battery)| {
            let (ic, pc) = if *battery {
                (BATTERY_IC, BATTERY_PC)
            } else {
                (CHARGE_POINT_IC, CHARGE_POINT_PC)
            };
            Equipment {
                id: id.to_string(),
                title: title.to_string(),
                eqp_name: eqp_name.to_string(),
                ic: MonitoredField {
                    field: format!("{seq}.OLI.A.IC1"),
                    bits: BitMap::from_pairs(ic),
                },
                pc: MonitoredField {
                    field: format!("{seq}.OLI.A.PC1"),
                    bits: BitMap::from_pairs(pc),
                },
            }
        })
        .collect()
}

pub(crate) fn sites() -> Vec<Site> {
    SITES
        .iter()
        .map(|(code, name)| Site {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect()
}
