use std::collections::HashMap;

use cdmload_core::{
    FasRow, FieldLookupRow, FootnoteRow, MemoryStore, NoteText, RawSheet, ReferenceData, ReferenceSource,
    StoreError, Value,
};
use cdmload_recon::parse::col;
use cdmload_recon::{process_table, CdmError};

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

struct FakeSource {
    fas: Vec<FasRow>,
    notes: Vec<FootnoteRow>,
    requested: Vec<String>,
}

impl ReferenceSource for FakeSource {
    fn fas_rows(&mut self, _table_code: &str, columns: &[String]) -> Result<Vec<FasRow>, StoreError> {
        self.requested = columns.to_vec();
        Ok(self
            .fas
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(k, _)| columns.contains(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .collect())
    }

    fn footnote_rows(&mut self, _table_code: &str) -> Result<Vec<FootnoteRow>, StoreError> {
        Ok(self.notes.clone())
    }

    fn field_lookup(&mut self) -> Result<Vec<FieldLookupRow>, StoreError> {
        Ok(Vec::new())
    }
}

fn fas(cells: &[(&str, &str)]) -> FasRow {
    cells.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn source() -> FakeSource {
    FakeSource {
        fas: vec![
            fas(&[("sex", "Both sexes"), ("value", "7,413.1"), ("remark", "ignored")]),
            fas(&[("sex", "Male"), ("sex_footnote", "(a)"), ("value", "3 400")]),
            fas(&[("sex", "Female"), ("value", "-")]),
            fas(&[("sex", "Unknown"), ("value", "1")]),
        ],
        notes: vec![FootnoteRow {
            note_no: 1,
            note: "(a)".into(),
            note_eng: "Provisional figures".into(),
            note_chi: "臨時數字".into(),
            note_type: 1,
        }],
        requested: Vec::new(),
    }
}

fn reference() -> ReferenceData {
    let mut themes = HashMap::new();
    themes.insert("001".to_string(), NoteText::new("Population", "人口"));
    ReferenceData {
        themes,
        ..Default::default()
    }
}

fn sheet() -> RawSheet {
    sheet_for("1", "性別", "人數")
}

/// Same layout under another table number, with its own Chinese wording for
/// the classification variable and the presentation.
fn sheet_for(table: &str, cv_tc: &str, sp_tc: &str) -> RawSheet {
    let header = [
        "Section",
        col::CDM_CODE,
        col::FAS_FIELD,
        col::FAS_DESC,
        col::FAS_DESC_TC,
        col::CC_CODE,
        col::CC_DESC,
        col::CC_DESC_TC,
        col::CC_GROUP,
        col::PARENT_CC_CODE,
        col::SP_CODE,
        col::SP_TYPE,
        col::UNIT,
        col::UNIT_DESC,
        col::UNIT_DESC_TC,
        col::DECIMAL,
        col::UNIT_MULT,
        col::FAS_SP_FIELD,
        col::SP_DESC,
        col::SP_DESC_TC,
    ];
    let cc = |code: &'static str, desc: &'static str, tc: &'static str, ccg: &'static str, parent: &'static str| {
        vec!["CV", "CV001", "sex", "Sex", cv_tc, code, desc, tc, ccg, parent]
    };
    let rows: Vec<Vec<&str>> = vec![
        vec!["Table", table, "Population by sex", "按性別劃分的人口"],
        vec!["Theme", "1"],
        header.to_vec(),
        cc("A", "Both sexes", "男女", "1", ""),
        cc("B", "Male", "男", "2", "A"),
        cc("C", "Female", "女", "2", "A"),
        vec![
            "SV", "SV001", "", "Persons", "人數", "", "", "", "", "", "SP001", "N", "no.", "Number", "數目", "0",
            "3", "value", "Number of persons", sp_tc,
        ],
        vec!["MDT", "", "value"],
    ];
    RawSheet::from_rows(
        "001",
        rows.into_iter()
            .map(|r| r.into_iter().map(str::to_string).collect())
            .collect(),
    )
}

// -------------------------------------------------------------------------
// Pipeline
// -------------------------------------------------------------------------

#[test]
fn loads_a_table_end_to_end() {
    let mut src = source();
    let mut store = MemoryStore::warehouse();
    let loaded = process_table(&sheet(), &reference(), &mut src, &mut store).unwrap();

    assert_eq!(loaded.table.code, "001");
    assert_eq!(loaded.table.title, "Table 001 : Population by sex");
    assert_eq!(src.requested, vec!["sex", "sex_footnote", "value", "value_footnote"]);

    let summary = &loaded.summary;
    assert_eq!(summary.fas_rows, 4);
    assert_eq!(summary.observations, 3);
    assert_eq!(summary.excluded_rows, 1);
    assert_eq!(summary.classification_variables, 1);
    assert_eq!(summary.classification_codes, 3);
    assert_eq!(summary.presentations, 1);
    assert_eq!(summary.statistical_variables, 1);
    assert_eq!(summary.facts, 3);

    // one fact per code, all in theme slot 1
    let facts = &loaded.table.mdt;
    let cc_ids: Vec<i64> = facts.iter().map(|f| f.cc_ids[&1]).collect();
    assert_eq!(cc_ids, vec![1, 2, 3]);
    assert_eq!(facts[0].obs_value, 7413.1);
    assert_eq!(facts[0].sd_value, 0);
    assert_eq!(facts[2].obs_value, 0.0);
    assert_eq!(facts[2].sd_value, 1);
    assert!(facts.iter().all(|f| f.mdt_id.is_some()));

    // the dash became suppression code 1
    let sd = store.rows("SD");
    assert_eq!(sd.len(), 1);
    assert_eq!(sd[0].get("sd_symbol"), Some(&Value::from("-")));

    // theme row holds the classification variable in slot 1
    assert_eq!(store.rows("THEME")[0].get("cv1_id"), Some(&Value::Int(1)));
    assert_eq!(loaded.theme.position_of(1), Some(1));

    // male carries its footnote onto the per-table row
    let male = store
        .rows("CC_TB")
        .iter()
        .find(|r| r.get("class_code_desc_en") == Some(&Value::from("Male")))
        .cloned()
        .unwrap();
    assert_eq!(male.get("fn1_en"), Some(&Value::from("Provisional figures")));

    // both children hang off "Both sexes"
    assert_eq!(store.rows("PAC").len(), 2);
    assert_eq!(store.rows("MDT").len(), 3);
}

#[test]
fn reloading_a_table_reuses_every_id() {
    let mut store = MemoryStore::warehouse();
    let first = process_table(&sheet(), &reference(), &mut source(), &mut store).unwrap();
    let second = process_table(&sheet(), &reference(), &mut source(), &mut store).unwrap();

    assert_eq!(first.table.id, second.table.id);
    let ids = |t: &cdmload_recon::LoadedTable| t.table.mdt.iter().map(|f| f.mdt_id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    for table in ["TB_INFO", "THEME", "CV", "CC", "CCG", "SP", "SV", "MDT", "SD", "PAC", "CC_TB"] {
        let expected = match table {
            "CC" | "CC_TB" | "MDT" => 3,
            "CCG" | "PAC" => 2,
            _ => 1,
        };
        assert_eq!(store.rows(table).len(), expected, "{table}");
    }
}

#[test]
fn tables_sharing_codes_in_a_theme_reuse_their_ids() {
    let mut store = MemoryStore::warehouse();
    let first = process_table(&sheet(), &reference(), &mut source(), &mut store).unwrap();
    let second = process_table(&sheet_for("2", "性别", "人口數"), &reference(), &mut source(), &mut store).unwrap();

    assert_ne!(first.table.id, second.table.id);
    let sp_id = |t: &cdmload_recon::LoadedTable| t.table.sp.get("SP001").unwrap().id();
    let cv_id = |t: &cdmload_recon::LoadedTable| t.table.cv.get("CV001").unwrap().id();
    assert_eq!(sp_id(&first), sp_id(&second));
    assert_eq!(cv_id(&first), cv_id(&second));
    assert_eq!(second.summary.facts, 3);

    for (table, expected) in [("TB_INFO", 2), ("SP", 1), ("SP_TB", 2), ("CV", 1), ("CV_TB", 2), ("SV", 1), ("CC", 3)] {
        assert_eq!(store.rows(table).len(), expected, "{table}");
    }
    // the first table's wording stays on the shared row
    assert_eq!(store.rows("SP")[0].get("def_stat_pres_desc_tc"), Some(&Value::from("人數")));
}

#[test]
fn unknown_theme_is_a_reference_error() {
    let mut store = MemoryStore::warehouse();
    let err = process_table(&sheet(), &ReferenceData::default(), &mut source(), &mut store).unwrap_err();
    assert!(matches!(err, CdmError::Reference(_)));
}

#[test]
fn sheet_without_sv_section_is_rejected() {
    let rows: Vec<Vec<String>> = vec![
        vec!["Table".into(), "2".into()],
        vec!["Theme".into(), "1".into()],
        vec!["Section".into(), col::CDM_CODE.into(), col::FAS_FIELD.into()],
        vec!["CV".into(), "CV001".into(), "sex".into()],
    ];
    let mut store = MemoryStore::warehouse();
    let err = process_table(
        &RawSheet::from_rows("002", rows),
        &reference(),
        &mut source(),
        &mut store,
    )
    .unwrap_err();
    assert!(matches!(err, CdmError::MissingSection(ref s) if s == "SV"));
}
