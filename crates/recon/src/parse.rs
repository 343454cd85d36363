//! Sheet → model: table identity, section split, period expansion and the
//! two hierarchy builds (classification variables/codes, statistical
//! presentations/variables).

use cdmload_core::{
    Extension, FootnoteBag, GroupNode, Mapping, Node, Presentation, RawSheet, Table, Translator,
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::{FieldCatalog, Section, UNDEFINED_FIELD};
use crate::error::CdmError;
use crate::frame::Frame;
use crate::template;

/// Column headers of the input sheet.
pub mod col {
    pub const CDM_CODE: &str = "Common Data Model Code";
    pub const FAS_FIELD: &str = "FAS field name";
    pub const FAS_DESC: &str = "FAS description";
    pub const FAS_DESC_TC: &str = "FAS description Chinese";
    pub const ALT: &str = "Alternate";
    pub const ALT_TC: &str = "Alternate Chi";

    pub const CC_CODE: &str = "CC Code";
    pub const CC_DESC: &str = "CC Description";
    pub const CC_DESC_TC: &str = "CC Description Chinese";
    pub const CC_GROUP: &str = "CC Group";
    pub const PARENT_CC_CODE: &str = "Parent CC Code";
    pub const CC_ALT: &str = "CC Alternate";
    pub const CC_ALT_TC: &str = "CC Alternate Chi";

    pub const SP_CODE: &str = "SP Code";
    pub const SP_TYPE: &str = "SP Type";
    pub const UNIT: &str = "Unit";
    pub const UNIT_DESC: &str = "Unit description";
    pub const UNIT_DESC_TC: &str = "Unit description Chinese";
    pub const DECIMAL: &str = "decimal";
    pub const UNIT_MULT: &str = "unit multipler";
    pub const SP_DESC: &str = "SP Desc";
    pub const SP_DESC_TC: &str = "SP Desc Chi";
    pub const SP_ALT: &str = "SP alt";
    pub const SP_ALT_TC: &str = "SP alt Chi";
    pub const NUMBER_FORMAT: &str = "NUMBERFORMAT";
    pub const SP_FOOTNOTE_FAS: &str = "SP Footnote FAS name";
    pub const FAS_SP_FIELD: &str = "FAS SP field name";
}

/// Classification variable whose `period` codes are year templates.
pub const PERIOD_CV: &str = "M3M";
pub const PERIOD_FIELD: &str = "period";
pub const YEAR_FIELD: &str = "year";

static ROMAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\()(ix|iv|v?i{0,3}|x?i{0,3})(\))$").unwrap());

/// Display-format key → number format string.
pub fn number_format(key: &str) -> Option<&'static str> {
    match key {
        "number" => Some("### ### ##0;-### ### ##0;-##0"),
        "number_dot" => Some("### ### ##0.0;-### ### ##0.0;-##0.0"),
        "number_sign" => Some("+0.0;-0.0;0.0"),
        "dollar" => Some("#,##0_ "),
        "dollar_dot" => Some("#,##0.0_ "),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Sheet split
// ---------------------------------------------------------------------------

/// A sheet split into table identity and named data sections.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub table: Table,
    /// Section name (first data column) → rows, in first-seen order.
    pub sections: Mapping<Frame>,
}

impl ParsedSheet {
    pub fn section(&self, name: &str) -> Option<&Frame> {
        self.sections.get(name)
    }
}

/// Left-pad with zeros to three characters.
pub fn zfill3(code: &str) -> String {
    format!("{code:0>3}")
}

/// Rows 0–1 carry the table identity, row 2 the field names, rows 3+ data.
pub fn parse_sheet(sheet: &RawSheet) -> Result<ParsedSheet, CdmError> {
    if sheet.height() < 3 {
        return Err(CdmError::EmptySheet { rows: sheet.height() });
    }

    // config block: only columns holding a value in row 0 or 1 count
    let config_cols: Vec<usize> = (0..sheet.width())
        .filter(|&c| sheet.cell(0, c).is_some() || sheet.cell(1, c).is_some())
        .collect();
    let config = |row: usize, pos: usize| config_cols.get(pos).and_then(|&c| sheet.cell(row, c));

    let code = config(0, 1).map(zfill3).ok_or_else(|| CdmError::MissingValue {
        section: "config".into(),
        column: "table code".into(),
        row: 1,
    })?;
    let theme_code = config(1, 1).map(zfill3).ok_or_else(|| CdmError::MissingValue {
        section: "config".into(),
        column: "theme code".into(),
        row: 2,
    })?;

    let mut table = Table::new(code.clone(), theme_code);
    table.title = format!("Table {code} : {}", config(0, 2).unwrap_or_default());
    table.title_tc = format!("表{code}：{}", config(0, 3).unwrap_or_default());

    let header: Vec<String> = (0..sheet.width())
        .map(|c| sheet.cell(2, c).unwrap_or_default().to_string())
        .collect();
    let mut data = Frame::new(header);
    for r in 3..sheet.height() {
        data.push(
            (0..sheet.width())
                .map(|c| sheet.cell(r, c).map(str::to_string))
                .collect(),
        );
    }
    let mut data = data.drop_empty_columns();
    data.fill_empty(col::FAS_FIELD, UNDEFINED_FIELD);

    let Some(section_col) = data.columns().first().cloned() else {
        return Err(CdmError::EmptySheet { rows: sheet.height() });
    };
    let mut sections = Mapping::new();
    for (name, frame) in data.group_by(&section_col) {
        sections.insert(name, frame.drop_empty_columns());
    }

    if let Some(cv) = sections.get_mut("CV") {
        let has_period_cv = cv
            .rows()
            .any(|row| row.get(col::CDM_CODE) == Some(PERIOD_CV));
        if has_period_cv {
            *cv = expand_period(cv)?;
        }
    }

    log::debug!(
        "sheet '{}': table {code}, sections {:?}",
        sheet.name,
        sections.keys().collect::<Vec<_>>()
    );
    Ok(ParsedSheet { table, sections })
}

// ---------------------------------------------------------------------------
// Period expansion
// ---------------------------------------------------------------------------

/// Expand `period` rows over every `year` found in the block: one code per
/// (template row × year), year-major, codes renumbered 1..n.
pub fn expand_period(cv: &Frame) -> Result<Frame, CdmError> {
    let years: Vec<String> = cv
        .rows()
        .filter(|row| row.get(col::FAS_FIELD) == Some(YEAR_FIELD))
        .filter_map(|row| row.get(col::CC_DESC).map(str::to_string))
        .collect();

    let mut blocks = Vec::new();
    for (fas, block) in cv.group_by(col::FAS_FIELD) {
        if fas != PERIOD_FIELD {
            blocks.push(block);
            continue;
        }
        if years.is_empty() {
            log::warn!("period rows present but no year rows to expand them with");
            blocks.push(block);
            continue;
        }
        let mut expanded = Frame::new(block.columns().to_vec());
        let mut n = 0usize;
        for year in &years {
            for row in block.rows() {
                let desc = row.require("CV", col::CC_DESC)?;
                let idx = expanded.len();
                expanded.push(row.to_vec());
                expanded.set(idx, col::CC_DESC, Some(template::render(desc, year)?));
                n += 1;
                expanded.set(idx, col::CC_CODE, Some(n.to_string()));
            }
        }
        blocks.push(expanded);
    }
    Ok(Frame::concat(blocks))
}

// ---------------------------------------------------------------------------
// Hierarchy builds
// ---------------------------------------------------------------------------

/// Whole number from cell text; integral floats (`"2.0"`) are accepted.
pub fn parse_int(column: &str, text: &str) -> Result<i64, CdmError> {
    let t = text.trim();
    t.parse::<i64>()
        .ok()
        .or_else(|| t.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .ok_or_else(|| CdmError::BadNumber {
            column: column.to_string(),
            value: text.to_string(),
        })
}

fn is_four_digit(code: &str) -> bool {
    code.len() == 4 && code.chars().all(|c| c.is_ascii_digit())
}

/// Descriptions that read the same in every locale.
fn is_locale_invariant(code: &str, desc: &str) -> bool {
    if is_four_digit(code) || ROMAN.is_match(desc) {
        return true;
    }
    let plain: String = desc.chars().filter(|c| *c != ',' && *c != ' ').collect();
    plain.parse::<f64>().is_ok()
}

/// Group-identity columns: the required ones plus whichever optional ones
/// survived column pruning.
fn identity_columns<'a>(
    frame: &Frame,
    section: &str,
    required: &[&'a str],
    optional: &[&'a str],
) -> Result<Vec<&'a str>, CdmError> {
    for column in required {
        if !frame.has_column(column) {
            return Err(CdmError::MissingColumn {
                section: section.to_string(),
                column: column.to_string(),
            });
        }
    }
    let mut cols = required.to_vec();
    cols.extend(optional.iter().filter(|c| frame.has_column(c)));
    Ok(cols)
}

fn key_value<'k>(cols: &[&str], key: &'k [Option<String>], name: &str) -> Option<&'k str> {
    cols.iter()
        .position(|c| *c == name)
        .and_then(|i| key[i].as_deref())
}

fn required_key(section: &str, cols: &[&str], key: &[Option<String>], name: &str) -> Result<String, CdmError> {
    key_value(cols, key, name)
        .map(str::to_string)
        .ok_or_else(|| CdmError::MissingValue {
            section: section.to_string(),
            column: name.to_string(),
            row: 0,
        })
}

/// Build classification variables and their codes from the CV section.
pub fn init_cv_cc(
    table: &mut Table,
    cv: &Frame,
    translator: &dyn Translator,
    catalog: &FieldCatalog,
) -> Result<(), CdmError> {
    for (cv_code, block) in cv.group_by(col::CDM_CODE) {
        let block = block.drop_empty_columns();
        let cols = identity_columns(
            &block,
            "CV",
            &[col::CDM_CODE, col::FAS_DESC],
            &[col::FAS_DESC_TC, col::ALT, col::ALT_TC],
        )?;

        for (key, cc_block) in block.group_by_many(&cols) {
            let desc = required_key("CV", &cols, &key, col::FAS_DESC)?;
            let desc_tc = key_value(&cols, &key, col::FAS_DESC_TC)
                .map(str::to_string)
                .unwrap_or_else(|| translator.translate(&desc, false));
            let (alt, alt_tc) = match key_value(&cols, &key, col::ALT) {
                Some(alt) => (
                    alt.to_string(),
                    key_value(&cols, &key, col::ALT_TC)
                        .map(str::to_string)
                        .unwrap_or_else(|| translator.translate(alt, false)),
                ),
                None => (String::new(), String::new()),
            };
            let mut group = GroupNode::new(Node::new(desc, desc_tc, alt, alt_tc));

            for (i, row) in cc_block.rows().enumerate() {
                let code = row.require("CV", col::CC_CODE)?;
                let fas = row.get(col::FAS_FIELD).unwrap_or(UNDEFINED_FIELD);
                let cc_desc = row.require("CV", col::CC_DESC)?;
                let ccg = row
                    .get(col::CC_GROUP)
                    .map(|v| parse_int(col::CC_GROUP, v))
                    .transpose()?
                    .unwrap_or(1);
                let parent = row.get(col::PARENT_CC_CODE).unwrap_or_default();
                let (cc_alt, cc_alt_tc) = match row.get(col::CC_ALT) {
                    Some(alt) => (
                        alt.to_string(),
                        row.get(col::CC_ALT_TC)
                            .map(str::to_string)
                            .unwrap_or_else(|| translator.translate(alt, false)),
                    ),
                    None => (String::new(), String::new()),
                };

                let seq = if is_four_digit(code) {
                    parse_int(col::CC_CODE, code)?
                } else {
                    i as i64 + 1
                };

                let cc_desc_tc = if let Some(tc) = row.get(col::CC_DESC_TC) {
                    tc.to_string()
                } else if is_locale_invariant(code, cc_desc)
                    || (fas == PERIOD_FIELD && cv_code == PERIOD_CV)
                {
                    cc_desc.to_string()
                } else {
                    translator.translate(cc_desc, false)
                };

                let footnote = catalog.footnote(Section::Cv, fas, cc_desc);
                let node = Node::new(cc_desc, cc_desc_tc, cc_alt, cc_alt_tc).with_ext(Extension {
                    fas: Some(fas.to_string()),
                    footnote: Some(footnote),
                    seq: Some(seq),
                    ccg: Some(ccg),
                    parent_cc_code: Some(parent.to_string()),
                    ..Default::default()
                });
                group.insert(code, node);
            }
            table.cv.insert(cv_code.clone(), group);
        }
    }
    Ok(())
}

/// Build statistical presentations and their variables from the SV section.
pub fn init_sp_sv(
    table: &mut Table,
    sv: &Frame,
    translator: &dyn Translator,
    catalog: &FieldCatalog,
) -> Result<(), CdmError> {
    for (sp_code, block) in sv.group_by(col::SP_CODE) {
        let block = block.drop_empty_columns();
        let cols = identity_columns(
            &block,
            "SV",
            &[col::SP_CODE, col::SP_TYPE, col::UNIT, col::UNIT_DESC, col::DECIMAL, col::UNIT_MULT],
            &[
                col::SP_DESC,
                col::SP_DESC_TC,
                col::SP_ALT,
                col::SP_ALT_TC,
                col::UNIT_DESC_TC,
                col::NUMBER_FORMAT,
                col::SP_FOOTNOTE_FAS,
            ],
        )?;

        for (key, sv_block) in block.group_by_many(&cols) {
            let value = |name: &str| key_value(&cols, &key, name);
            let (sp_desc, sp_desc_tc) = match value(col::SP_DESC) {
                Some(desc) => (
                    desc.to_string(),
                    value(col::SP_DESC_TC)
                        .map(str::to_string)
                        .unwrap_or_else(|| translator.translate(desc, false)),
                ),
                None => (String::new(), String::new()),
            };
            let unit_desc = required_key("SV", &cols, &key, col::UNIT_DESC)?;
            let presentation = Presentation {
                stat_type: required_key("SV", &cols, &key, col::SP_TYPE)?,
                unit: required_key("SV", &cols, &key, col::UNIT)?,
                unit_desc_tc: value(col::UNIT_DESC_TC)
                    .map(str::to_string)
                    .unwrap_or_else(|| translator.translate(&unit_desc, true)),
                unit_desc,
                decimals: parse_int(col::DECIMAL, &required_key("SV", &cols, &key, col::DECIMAL)?)?,
                unit_mult: parse_int(col::UNIT_MULT, &required_key("SV", &cols, &key, col::UNIT_MULT)?)?,
                separator: value(col::NUMBER_FORMAT)
                    .and_then(number_format)
                    .unwrap_or_default()
                    .to_string(),
            };
            let footnote = value(col::SP_FOOTNOTE_FAS)
                .map(|fas| catalog.footnote(Section::Sv, fas, &sp_desc))
                .unwrap_or_else(FootnoteBag::default);
            let node = Node::new(
                sp_desc,
                sp_desc_tc,
                value(col::SP_ALT).unwrap_or_default(),
                value(col::SP_ALT_TC).unwrap_or_default(),
            )
            .with_ext(Extension {
                footnote: Some(footnote),
                ..Default::default()
            });
            let mut group = GroupNode::new(node).with_presentation(presentation);

            for row in sv_block.rows() {
                let sv_code = row.require("SV", col::CDM_CODE)?;
                let fas = row.get(col::FAS_FIELD).unwrap_or(UNDEFINED_FIELD);
                let sp_field = row.require("SV", col::FAS_SP_FIELD)?;
                let desc = row.require("SV", col::FAS_DESC)?;
                let desc_tc = row
                    .get(col::FAS_DESC_TC)
                    .map(str::to_string)
                    .unwrap_or_else(|| translator.translate(desc, false));
                let (alt, alt_tc, verify) = match row.get(col::ALT) {
                    Some(alt) => (
                        alt,
                        row.get(col::ALT_TC)
                            .map(str::to_string)
                            .unwrap_or_else(|| translator.translate(alt, false)),
                        alt,
                    ),
                    None => ("", String::new(), desc),
                };
                let node = Node::new(desc, desc_tc, alt, alt_tc).with_ext(Extension {
                    fas: Some(fas.to_string()),
                    footnote: Some(catalog.footnote(Section::Sv, fas, verify)),
                    sp_field: Some(sp_field.to_string()),
                    ..Default::default()
                });
                group.insert(sv_code, node);
            }
            table.sp.insert(sp_code.clone(), group);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdmload_core::{AttrKey, NoteText, NOT_FOUND};

    struct Echo;

    impl Translator for Echo {
        fn translate(&self, text: &str, is_unit: bool) -> String {
            if text == "Unknown" {
                NOT_FOUND.to_string()
            } else if is_unit {
                format!("unit:{text}")
            } else {
                format!("tc:{text}")
            }
        }
    }

    fn sheet(rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_rows(
            "test",
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    const CV_HEADER: &[&str] = &[
        "Section",
        "Common Data Model Code",
        "FAS description",
        "FAS field name",
        "CC Code",
        "CC Description",
        "CC Group",
        "Parent CC Code",
    ];

    fn cv_sheet(rows: &[&[&str]]) -> RawSheet {
        let mut all: Vec<&[&str]> = vec![
            &["Table", "7", "Population by sex", "按性別劃分的人口", ""],
            &["Theme", "1", "", "", ""],
            CV_HEADER,
        ];
        all.extend_from_slice(rows);
        sheet(&all)
    }

    #[test]
    fn splits_identity_header_and_sections() {
        let parsed = parse_sheet(&cv_sheet(&[
            &["CV", "SEX", "Sex", "sex", "M", "Male", "", ""],
            &["SV", "", "", "", "", "", "", ""],
            &["CV", "SEX", "Sex", "sex", "F", "Female", "", ""],
        ]))
        .unwrap();
        assert_eq!(parsed.table.code, "007");
        assert_eq!(parsed.table.theme_code, "001");
        assert_eq!(parsed.table.title, "Table 007 : Population by sex");
        assert_eq!(parsed.table.title_tc, "表007：按性別劃分的人口");
        let keys: Vec<&str> = parsed.sections.keys().collect();
        assert_eq!(keys, vec!["CV", "SV"]);
        let cv = parsed.section("CV").unwrap();
        assert_eq!(cv.len(), 2);
        // CC Group / Parent CC Code hold nothing and are pruned
        assert!(!cv.has_column(col::CC_GROUP));
        let sv = parsed.section("SV").unwrap();
        assert_eq!(sv.rows().next().unwrap().get(col::FAS_FIELD), Some(UNDEFINED_FIELD));
    }

    #[test]
    fn short_sheet_is_rejected() {
        assert!(matches!(
            parse_sheet(&sheet(&[&["Table", "1"]])),
            Err(CdmError::EmptySheet { rows: 1 })
        ));
    }

    #[test]
    fn period_rows_expand_year_major() {
        let parsed = parse_sheet(&cv_sheet(&[
            &["CV", "M3M", "Period", "year", "Y1", "2019", "", ""],
            &["CV", "M3M", "Period", "year", "Y2", "2020", "", ""],
            &["CV", "M3M", "Period", "period", "P", "GDP in [YYYY-1]", "", ""],
            &["CV", "M3M", "Period", "period", "Q", "YYYY Q1", "", ""],
        ]))
        .unwrap();
        let cv = parsed.section("CV").unwrap();
        let got: Vec<(String, String)> = cv
            .rows()
            .filter(|r| r.get(col::FAS_FIELD) == Some(PERIOD_FIELD))
            .map(|r| {
                (
                    r.get(col::CC_CODE).unwrap().to_string(),
                    r.get(col::CC_DESC).unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            got,
            vec![
                ("1".to_string(), "GDP in 2018".to_string()),
                ("2".to_string(), "2019 Q1".to_string()),
                ("3".to_string(), "GDP in 2019".to_string()),
                ("4".to_string(), "2020 Q1".to_string()),
            ]
        );
        assert_eq!(cv.len(), 6);
    }

    #[test]
    fn period_expansion_over_two_years() {
        let parsed = parse_sheet(&cv_sheet(&[
            &["CV", "M3M", "Period", "year", "Y1", "2019", "", ""],
            &["CV", "M3M", "Period", "year", "Y2", "2020", "", ""],
            &["CV", "M3M", "Period", "period", "P", "GDP in [YYYY-1]", "", ""],
        ]))
        .unwrap();
        let mut table = parsed.table.clone();
        let catalog = FieldCatalog::from_sections(&parsed.sections);
        init_cv_cc(&mut table, parsed.section("CV").unwrap(), &Echo, &catalog).unwrap();
        let m3m = table.cv.get("M3M").unwrap();
        let one = m3m.get("1").unwrap();
        let two = m3m.get("2").unwrap();
        assert_eq!(one.desc, "GDP in 2018");
        assert_eq!(two.desc, "GDP in 2019");
        let codes: Vec<&str> = m3m.children.keys().collect();
        assert_eq!(codes, vec!["Y1", "Y2", "1", "2"]);
        // period codes under M3M keep their text in both locales
        assert_eq!(one.desc_tc, "GDP in 2018");
    }

    #[test]
    fn cv_sequences_and_localized_descriptions() {
        let parsed = parse_sheet(&cv_sheet(&[
            &["CV", "AGE", "Age", "age", "A1", "Aged 15+", "", ""],
            &["CV", "AGE", "Age", "age", "A2", "(iv)", "2", "A1"],
            &["CV", "AGE", "Age", "age", "A3", "1 000", "2", "A1"],
            &["CV", "AGE", "Age", "age", "A4", "Unknown", "", ""],
            &["CV", "YR", "Year", "year", "2019", "Twenty nineteen", "", ""],
            &["CV", "YR", "Year", "year", "2020", "Twenty twenty", "", ""],
        ]))
        .unwrap();
        let mut table = parsed.table.clone();
        let catalog = FieldCatalog::from_sections(&parsed.sections);
        init_cv_cc(&mut table, parsed.section("CV").unwrap(), &Echo, &catalog).unwrap();

        let age = table.cv.get("AGE").unwrap();
        assert_eq!(age.node.desc, "Age");
        assert_eq!(age.node.desc_tc, "tc:Age");
        let seqs: Vec<i64> = age.iter().map(|(_, n)| n.ext.seq.unwrap()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert_eq!(age.get("A1").unwrap().desc_tc, "tc:Aged 15+");
        assert_eq!(age.get("A2").unwrap().desc_tc, "(iv)");
        assert_eq!(age.get("A3").unwrap().desc_tc, "1 000");
        assert_eq!(age.get("A4").unwrap().desc_tc, NOT_FOUND);
        assert_eq!(age.get("A2").unwrap().ext.ccg, Some(2));
        assert_eq!(age.get("A2").unwrap().ext.parent_cc_code.as_deref(), Some("A1"));
        assert_eq!(age.get("A1").unwrap().ext.ccg, Some(1));
        assert_eq!(age.get("A1").unwrap().ext.parent_cc_code.as_deref(), Some(""));

        let yr = table.cv.get("YR").unwrap();
        let seqs: Vec<i64> = yr.iter().map(|(_, n)| n.ext.seq.unwrap()).collect();
        assert_eq!(seqs, vec![2019, 2020]);
        assert_eq!(yr.get("2019").unwrap().desc_tc, "Twenty nineteen");
    }

    #[test]
    fn explicit_localized_column_wins() {
        let mut header: Vec<&str> = CV_HEADER.to_vec();
        header.push("CC Description Chinese");
        let s = sheet(&[
            &["Table", "7", "t", "t"],
            &["Theme", "1"],
            &header,
            &["CV", "YR", "Year", "year", "2019", "2019", "", "", "二零一九"],
        ]);
        let parsed = parse_sheet(&s).unwrap();
        let mut table = parsed.table.clone();
        let catalog = FieldCatalog::from_sections(&parsed.sections);
        init_cv_cc(&mut table, parsed.section("CV").unwrap(), &Echo, &catalog).unwrap();
        assert_eq!(table.cv.child("YR", "2019").unwrap().desc_tc, "二零一九");
    }

    #[test]
    fn missing_cc_code_is_structural() {
        let parsed = parse_sheet(&cv_sheet(&[
            &["CV", "SEX", "Sex", "sex", "M", "Male", "", ""],
            &["CV", "SEX", "Sex", "sex", "", "Female", "", ""],
        ]))
        .unwrap();
        let mut table = parsed.table.clone();
        let catalog = FieldCatalog::from_sections(&parsed.sections);
        let err = init_cv_cc(&mut table, parsed.section("CV").unwrap(), &Echo, &catalog).unwrap_err();
        assert!(matches!(err, CdmError::MissingValue { ref column, .. } if column == col::CC_CODE));
    }

    #[test]
    fn bad_group_number_is_structural() {
        let parsed = parse_sheet(&cv_sheet(&[&["CV", "SEX", "Sex", "sex", "M", "Male", "two", ""]])).unwrap();
        let mut table = parsed.table.clone();
        let catalog = FieldCatalog::from_sections(&parsed.sections);
        let err = init_cv_cc(&mut table, parsed.section("CV").unwrap(), &Echo, &catalog).unwrap_err();
        assert!(matches!(err, CdmError::BadNumber { .. }));
    }

    const SV_HEADER: &[&str] = &[
        "Section",
        "SP Code",
        "SP Type",
        "Unit",
        "Unit description",
        "decimal",
        "unit multipler",
        "NUMBERFORMAT",
        "Common Data Model Code",
        "FAS field name",
        "FAS SP field name",
        "FAS description",
        "Alternate",
    ];

    fn sv_parsed() -> ParsedSheet {
        parse_sheet(&sheet(&[
            &["Table", "12", "t", "t"],
            &["Theme", "3"],
            SV_HEADER,
            &["SV", "P1", "C", "NO", "Number", "0", "1", "number", "S1", "sex", "value", "Persons", ""],
            &["SV", "P1", "C", "NO", "Number", "0", "1", "number", "S2", "sex", "value", "Households", "Domestic households"],
            &["SV", "P2", "R", "PC", "Percent", "1.0", "1", "", "S3", "", "rate", "Share", ""],
        ]))
        .unwrap()
    }

    #[test]
    fn presentations_and_variables() {
        let parsed = sv_parsed();
        let mut table = parsed.table.clone();
        let mut catalog = FieldCatalog::from_sections(&parsed.sections);
        assert!(catalog.attach_footnote(Section::Sv, "sex", "domestic households", 1, NoteText::new("a", "甲")));
        init_sp_sv(&mut table, parsed.section("SV").unwrap(), &Echo, &catalog).unwrap();

        let p1 = table.sp.get("P1").unwrap();
        let pres = p1.presentation.as_ref().unwrap();
        assert_eq!(pres.stat_type, "C");
        assert_eq!(pres.unit_desc_tc, "unit:Number");
        assert_eq!(pres.decimals, 0);
        assert_eq!(pres.separator, "### ### ##0;-### ### ##0;-##0");
        assert_eq!(p1.node.desc, "");
        assert_eq!(p1.children.len(), 2);

        let s2 = p1.get("S2").unwrap();
        assert_eq!(s2.alt_desc, "Domestic households");
        assert_eq!(s2.ext.sp_field.as_deref(), Some("value"));
        assert_eq!(s2.footnote().unwrap().len(), 1);
        assert!(p1.get("S1").unwrap().footnote().unwrap().is_empty());

        let p2 = table.sp.get("P2").unwrap();
        assert_eq!(p2.presentation.as_ref().unwrap().decimals, 1);
        assert_eq!(p2.presentation.as_ref().unwrap().separator, "");
        let s3 = p2.get("S3").unwrap();
        assert_eq!(s3.get_attr(AttrKey::Fas).unwrap().as_text(), Some(UNDEFINED_FIELD));
    }

    #[test]
    fn missing_presentation_column_is_structural() {
        let parsed = parse_sheet(&sheet(&[
            &["Table", "12", "t", "t"],
            &["Theme", "3"],
            &["Section", "SP Code", "SP Type", "Common Data Model Code"],
            &["SV", "P1", "C", "S1"],
        ]))
        .unwrap();
        let mut table = parsed.table.clone();
        let catalog = FieldCatalog::from_sections(&parsed.sections);
        let err = init_sp_sv(&mut table, parsed.section("SV").unwrap(), &Echo, &catalog).unwrap_err();
        assert!(matches!(err, CdmError::MissingColumn { ref column, .. } if column == col::UNIT));
    }

    #[test]
    fn zero_padding() {
        assert_eq!(zfill3("7"), "007");
        assert_eq!(zfill3("123"), "123");
        assert_eq!(zfill3("1234"), "1234");
    }
}
