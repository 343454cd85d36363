//! Per-table pipeline: parse, reconcile, assemble, and hand everything to the
//! storage collaborator with lookup-else-insert id resolution.

use cdmload_core::table::{slot_marker, MAX_CV_SLOTS};
use cdmload_core::{
    record, FactRecord, FootnoteBag, Locale, RawSheet, Record, ReferenceData, ReferenceSource, Storage,
    StoreError, Table, Theme, Value,
};
use serde::Serialize;

use crate::assemble::FactAssembler;
use crate::catalog::FieldCatalog;
use crate::error::CdmError;
use crate::footnote::FootnoteRegistry;
use crate::parse::{init_cv_cc, init_sp_sv, parse_sheet};
use crate::reconcile::Reconciler;
use crate::suppression::SuppressionRegistry;
use crate::translate::LookupTranslator;

/// Counts reported after a table is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub table_code: String,
    pub theme_code: String,
    pub fas_rows: usize,
    pub observations: usize,
    pub excluded_rows: usize,
    pub classification_variables: usize,
    pub classification_codes: usize,
    pub presentations: usize,
    pub statistical_variables: usize,
    pub facts: usize,
}

/// A fully processed table with every surrogate id assigned.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub table: Table,
    pub theme: Theme,
    pub summary: LoadSummary,
}

// ---------------------------------------------------------------------------
// Storage helpers
// ---------------------------------------------------------------------------

/// Insert; a uniqueness violation means the row is already there.
fn insert_row(store: &mut dyn Storage, table: &str, record: &Record) -> Result<bool, CdmError> {
    match store.insert(table, record) {
        Ok(()) => Ok(true),
        Err(StoreError::DuplicateKey { .. }) => {
            log::warn!("{table}: duplicate key, keeping the stored row");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Id of the row matching `filter`, inserting `insert` first when absent.
fn resolve_id(
    store: &mut dyn Storage,
    table: &str,
    id_column: &str,
    filter: &Record,
    insert: &Record,
) -> Result<i64, CdmError> {
    if let Some(id) = store.lookup(table, id_column, filter)?.filter(|id| *id != 0) {
        return Ok(id);
    }
    if insert_row(store, table, insert)? {
        return Ok(store.latest_id(table, id_column)?);
    }
    store
        .lookup(table, id_column, insert)?
        .ok_or_else(|| CdmError::Reference(format!("{table}: no {id_column} after duplicate insert")))
}

/// Insert a link row unless one matching `filter` exists.
fn ensure_link(store: &mut dyn Storage, table: &str, filter: &Record, insert: &Record) -> Result<(), CdmError> {
    if store.select(table, filter)?.is_empty() {
        insert_row(store, table, insert)?;
    }
    Ok(())
}

fn with_footnotes(mut record: Record, bag: Option<&FootnoteBag>) -> Record {
    if let Some(bag) = bag {
        for (column, text) in bag.columns() {
            record.insert(column, Value::Text(text));
        }
    }
    record
}

fn fact_record(fact: &FactRecord) -> Record {
    let mut r = record! {
        "theme_id" => fact.theme_id,
        "sv_id" => fact.sv_id,
        "sp_id" => fact.sp_id,
        "obs_value" => fact.obs_value,
        "sd_value" => fact.sd_value,
    };
    for (pos, cc_id) in &fact.cc_ids {
        r.insert(format!("cv{pos}_cc_id"), Value::Int(*cc_id));
    }
    r
}

/// Reload the theme's slot table from its stored row.
fn load_theme_slots(store: &mut dyn Storage, theme: &mut Theme) -> Result<(), CdmError> {
    let rows = store.select("THEME", &record! {"theme_id" => theme.id})?;
    let Some(row) = rows.first() else {
        return Ok(());
    };
    let slots: Vec<(i64, String)> = (1..=MAX_CV_SLOTS)
        .map(slot_marker)
        .filter_map(|marker| row.get(&marker).and_then(Value::as_int).map(|id| (id, marker)))
        .collect();
    theme.set_slots(slots);
    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Parse, reconcile and persist one sheet.
pub fn process_table(
    sheet: &RawSheet,
    reference: &ReferenceData,
    source: &mut dyn ReferenceSource,
    store: &mut dyn Storage,
) -> Result<LoadedTable, CdmError> {
    let parsed = parse_sheet(sheet)?;
    let mut table = parsed.table.clone();
    let code = table.code.clone();
    let mut theme = Theme::from_reference(&table.theme_code, reference)
        .ok_or_else(|| CdmError::Reference(format!("unknown theme '{}'", table.theme_code)))?;
    log::info!("table {code}: {} (theme {} {})", table.title, theme.code, theme.desc);

    let cv_frame = parsed
        .section("CV")
        .ok_or_else(|| CdmError::MissingSection("CV".into()))?;
    let sv_frame = parsed
        .section("SV")
        .ok_or_else(|| CdmError::MissingSection("SV".into()))?;

    let lookup = source.field_lookup()?;
    let translator = LookupTranslator::new(&code, &lookup, &reference.units);

    let mut catalog = FieldCatalog::from_sections(&parsed.sections);
    let mut suppression = SuppressionRegistry::load(store)?;
    let footnotes = FootnoteRegistry::build(source.footnote_rows(&code)?, reference.table_info_notes(&code));
    let header = footnotes.header_text();
    table.fn_en = header.fn_en;
    table.fn_tc = header.fn_tc;
    table.src_en = header.src_en;
    table.src_tc = header.src_tc;

    let columns: Vec<String> = catalog
        .tracked_columns()
        .into_iter()
        .flat_map(|(field, footnote)| [field, footnote])
        .collect();
    let fas_rows = source.fas_rows(&code, &columns)?;
    let reconciliation =
        Reconciler::new(&code, &mut catalog, &footnotes, &mut suppression, store).run(&fas_rows)?;

    // TB_INFO
    table.id = resolve_id(
        store,
        "TB_INFO",
        "tb_id",
        &record! {"tb_code" => &code},
        &record! {
            "tb_code" => &code,
            "tb_title_en" => &table.title,
            "tb_title_tc" => &table.title_tc,
            "tb_fn_en" => &table.fn_en,
            "tb_fn_tc" => &table.fn_tc,
            "tb_src_en" => &table.src_en,
            "tb_src_tc" => &table.src_tc,
        },
    )?;

    // THEME
    theme.id = resolve_id(
        store,
        "THEME",
        "theme_id",
        &record! {"theme" => &theme.code},
        &record! {
            "theme" => &theme.code,
            "theme_desc_en" => &theme.desc,
            "theme_desc_tc" => &theme.desc_tc,
        },
    )?;
    load_theme_slots(store, &mut theme)?;

    init_cv_cc(&mut table, cv_frame, &translator, &catalog)?;
    persist_classifications(store, &mut table, theme.id)?;
    assign_theme_slots(store, &table, &mut theme)?;

    init_sp_sv(&mut table, sv_frame, &translator, &catalog)?;
    persist_presentations(store, &mut table, theme.id)?;

    let mut facts = FactAssembler::new(&table, &theme, &catalog).assemble_all(&reconciliation.observations);
    for fact in &mut facts {
        let row = fact_record(fact);
        fact.mdt_id = Some(resolve_id(store, "MDT", "mdt_id", &row, &row)?);
    }
    table.mdt = facts;

    persist_composition(store, &table)?;

    let summary = LoadSummary {
        table_code: code.clone(),
        theme_code: theme.code.clone(),
        fas_rows: reconciliation.rows,
        observations: reconciliation.observations.len(),
        excluded_rows: reconciliation.excluded,
        classification_variables: table.cv.len(),
        classification_codes: table.cv.iter().map(|(_, g)| g.children.len()).sum(),
        presentations: table.sp.len(),
        statistical_variables: table.sp.iter().map(|(_, g)| g.children.len()).sum(),
        facts: table.mdt.len(),
    };
    log::info!(
        "table {code}: {} fact(s) from {} observation(s)",
        summary.facts,
        summary.observations
    );
    Ok(LoadedTable { table, theme, summary })
}

/// CV, CV_TB, then per code CCG, CC, CCG_CC, CC_TB, then PAC links.
fn persist_classifications(store: &mut dyn Storage, table: &mut Table, theme_id: i64) -> Result<(), CdmError> {
    let tb_id = table.id;
    let cv_codes: Vec<String> = table.cv.codes().map(str::to_string).collect();
    for cv_code in &cv_codes {
        let Some(group) = table.cv.get(cv_code).cloned() else {
            continue;
        };
        let cv_id = resolve_id(
            store,
            "CV",
            "cv_id",
            &record! {"class_var" => cv_code, "theme_id" => theme_id},
            &record! {
                "theme_id" => theme_id,
                "class_var" => cv_code,
                "def_class_desc_en" => &group.node.desc,
                "def_class_desc_tc" => &group.node.desc_tc,
            },
        )?;
        table.cv.update_group(cv_code, &[("id", cv_id.into())])?;
        ensure_link(
            store,
            "CV_TB",
            &record! {"tb_id" => tb_id, "cv_id" => cv_id},
            &record! {
                "cv_id" => cv_id,
                "tb_id" => tb_id,
                "class_desc_en" => group.node.tb_desc(Locale::En),
                "class_desc_tc" => group.node.tb_desc(Locale::Tc),
            },
        )?;

        for (cc_code, cc) in group.iter() {
            let ccg = cc.ext.ccg.unwrap_or(1);
            let ccg_row = record! {"cv_id" => cv_id, "class_code_group" => ccg};
            let ccg_id = resolve_id(store, "CCG", "ccg_id", &ccg_row, &ccg_row)?;
            table.cv.update_child(cv_code, cc_code, &[("ccg_id", ccg_id.into())])?;

            let cc_id = resolve_id(
                store,
                "CC",
                "cc_id",
                &record! {"cv_id" => cv_id, "class_code" => cc_code},
                &record! {
                    "cv_id" => cv_id,
                    "class_code" => cc_code,
                    "def_class_code_desc_en" => &cc.desc,
                    "def_class_code_desc_tc" => &cc.desc_tc,
                },
            )?;
            table.cv.update_child(cv_code, cc_code, &[("id", cc_id.into())])?;

            ensure_link(
                store,
                "CCG_CC",
                &record! {"ccg_id" => ccg_id, "cc_id" => cc_id},
                &record! {
                    "ccg_id" => ccg_id,
                    "cc_id" => cc_id,
                    "cv_id" => cv_id,
                    "class_code_seq" => cc.ext.seq.unwrap_or_default(),
                },
            )?;
            ensure_link(
                store,
                "CC_TB",
                &record! {"cc_id" => cc_id, "tb_id" => tb_id},
                &with_footnotes(
                    record! {
                        "cc_id" => cc_id,
                        "tb_id" => tb_id,
                        "class_code_desc_en" => cc.tb_desc(Locale::En),
                        "class_code_desc_tc" => cc.tb_desc(Locale::Tc),
                        "ccg_id" => ccg_id,
                    },
                    cc.footnote(),
                ),
            )?;
        }

        let Some(group) = table.cv.get(cv_code) else {
            continue;
        };
        for (cc_code, cc) in group.iter() {
            let Some(parent_code) = cc.ext.parent_cc_code.as_deref().filter(|p| !p.is_empty()) else {
                continue;
            };
            let Some(parent) = group.get(parent_code) else {
                log::warn!("{cv_code}: parent code '{parent_code}' of '{cc_code}' does not exist");
                continue;
            };
            let link = record! {
                "parent_ccg_id" => parent.ext.ccg_id.unwrap_or_default(),
                "parent_cc_id" => parent.id,
                "child_ccg_id" => cc.ext.ccg_id.unwrap_or_default(),
                "child_cc_id" => cc.id,
            };
            ensure_link(store, "PAC", &link, &link)?;
        }
    }
    Ok(())
}

/// Give every classification variable without one a theme slot.
fn assign_theme_slots(store: &mut dyn Storage, table: &Table, theme: &mut Theme) -> Result<(), CdmError> {
    let cv_ids: Vec<i64> = table.cv.all_ids(false).map(|(id, _)| id).collect();
    for cv_id in cv_ids {
        if theme.contains(cv_id) {
            continue;
        }
        let Some(marker) = theme.next_slot() else {
            log::warn!(
                "theme {}: all {MAX_CV_SLOTS} classification slots are taken; cv {cv_id} left unplaced",
                theme.code
            );
            continue;
        };
        store.update("THEME", &record! {marker.as_str() => cv_id}, &record! {"theme_id" => theme.id})?;
        load_theme_slots(store, theme)?;
    }
    Ok(())
}

/// SP, SP_TB, then per variable SV, SV_TB.
fn persist_presentations(store: &mut dyn Storage, table: &mut Table, theme_id: i64) -> Result<(), CdmError> {
    let tb_id = table.id;
    let sp_codes: Vec<String> = table.sp.codes().map(str::to_string).collect();
    for sp_code in &sp_codes {
        let Some(group) = table.sp.get(sp_code).cloned() else {
            continue;
        };
        let p = group.presentation.clone().unwrap_or_default();
        let sp_id = resolve_id(
            store,
            "SP",
            "sp_id",
            &record! {
                "theme_id" => theme_id,
                "stat_pres" => sp_code,
                "def_stat_pres_desc_en" => &group.node.desc,
            },
            &record! {
                "stat_pres" => sp_code,
                "theme_id" => theme_id,
                "def_stat_pres_desc_en" => &group.node.desc,
                "def_stat_pres_desc_tc" => &group.node.desc_tc,
                "def_stat_type" => &p.stat_type,
                "def_unit" => &p.unit,
                "def_unit_desc_en" => &p.unit_desc,
                "def_unit_desc_tc" => &p.unit_desc_tc,
                "def_decimals" => p.decimals,
                "def_unit_mult" => p.unit_mult,
                "def_separator_format" => &p.separator,
            },
        )?;
        table.sp.update_group(sp_code, &[("id", sp_id.into())])?;
        ensure_link(
            store,
            "SP_TB",
            &record! {"sp_id" => sp_id, "tb_id" => tb_id},
            &with_footnotes(
                record! {
                    "sp_id" => sp_id,
                    "tb_id" => tb_id,
                    "stat_pres_desc_en" => group.node.tb_desc(Locale::En),
                    "stat_pres_desc_tc" => group.node.tb_desc(Locale::Tc),
                    "stat_type" => &p.stat_type,
                    "unit" => &p.unit,
                    "unit_desc_en" => &p.unit_desc,
                    "unit_desc_tc" => &p.unit_desc_tc,
                    "decimals" => p.decimals,
                    "unit_mult" => p.unit_mult,
                    "separator_format" => &p.separator,
                },
                group.node.footnote(),
            ),
        )?;

        for (sv_code, sv) in group.iter() {
            let sv_id = resolve_id(
                store,
                "SV",
                "sv_id",
                &record! {"theme_id" => theme_id, "stat_var" => sv_code},
                &record! {
                    "theme_id" => theme_id,
                    "stat_var" => sv_code,
                    "def_stat_desc_en" => &sv.desc,
                    "def_stat_desc_tc" => &sv.desc_tc,
                },
            )?;
            table.sp.update_child(sp_code, sv_code, &[("id", sv_id.into())])?;
            ensure_link(
                store,
                "SV_TB",
                &record! {"sv_id" => sv_id, "tb_id" => tb_id},
                &with_footnotes(
                    record! {
                        "sv_id" => sv_id,
                        "tb_id" => tb_id,
                        "stat_desc_en" => sv.tb_desc(Locale::En),
                        "stat_desc_tc" => sv.tb_desc(Locale::Tc),
                    },
                    sv.footnote(),
                ),
            )?;
        }
    }
    Ok(())
}

/// TB_COMP: every (sp, sv) pair and every code-group id used by the table.
fn persist_composition(store: &mut dyn Storage, table: &Table) -> Result<(), CdmError> {
    for (sp_id, sv_id) in table.sp.all_ids(true) {
        let row = record! {"tb_id" => table.id, "sv_id" => sv_id.unwrap_or_default(), "sp_id" => sp_id};
        ensure_link(store, "TB_COMP", &row, &row)?;
    }
    for ccg_id in table.cv.all_group_numbers() {
        let row = record! {"tb_id" => table.id, "ccg_id" => ccg_id};
        ensure_link(store, "TB_COMP", &row, &row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdmload_core::MemoryStore;

    #[test]
    fn resolve_id_reuses_existing_rows() {
        let mut store = MemoryStore::warehouse();
        let row = record! {"tb_code" => "001"};
        let first = resolve_id(&mut store, "TB_INFO", "tb_id", &row, &row).unwrap();
        let again = resolve_id(&mut store, "TB_INFO", "tb_id", &row, &row).unwrap();
        assert_eq!(first, 1);
        assert_eq!(again, 1);
        assert_eq!(store.rows("TB_INFO").len(), 1);
    }

    #[test]
    fn resolve_id_after_duplicate_finds_the_stored_row() {
        let mut store = MemoryStore::warehouse();
        store.insert("CV", &record! {"theme_id" => 1i64, "class_var" => "A"}).unwrap();
        store.insert("CV", &record! {"theme_id" => 1i64, "class_var" => "B"}).unwrap();
        // filter misses on the description, insert clashes on the unique key
        let id = resolve_id(
            &mut store,
            "CV",
            "cv_id",
            &record! {"class_var" => "A", "def_class_desc_en" => "Sex"},
            &record! {"theme_id" => 1i64, "class_var" => "A"},
        )
        .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn presentations_match_on_their_unique_key_only() {
        let mut store = MemoryStore::warehouse();
        let mut first = Table::new("001", "001");
        let mut sp = cdmload_core::GroupNode::new(cdmload_core::Node::new("Number of persons", "人數", "", ""));
        sp.insert("S1", cdmload_core::Node::new("Persons", "人", "", ""));
        first.sp.insert("SP001", sp.clone());
        first.id = 1;
        persist_presentations(&mut store, &mut first, 1).unwrap();

        let mut second = Table::new("002", "001");
        sp.node.desc_tc = "人口數".into();
        second.sp.insert("SP001", sp);
        second.id = 2;
        persist_presentations(&mut store, &mut second, 1).unwrap();

        assert_eq!(store.rows("SP").len(), 1);
        assert_eq!(first.sp.get("SP001").unwrap().id(), second.sp.get("SP001").unwrap().id());
        assert_eq!(store.rows("SP_TB").len(), 2);
    }

    #[test]
    fn links_are_inserted_once() {
        let mut store = MemoryStore::warehouse();
        let link = record! {"cv_id" => 1i64, "tb_id" => 2i64};
        ensure_link(&mut store, "CV_TB", &link, &link).unwrap();
        ensure_link(&mut store, "CV_TB", &link, &link).unwrap();
        assert_eq!(store.rows("CV_TB").len(), 1);
    }

    #[test]
    fn theme_slots_fill_lowest_free_position() {
        let mut store = MemoryStore::warehouse();
        store
            .insert("THEME", &record! {"theme" => "001", "cv1_id" => 10i64, "cv3_id" => 30i64})
            .unwrap();
        let mut theme = Theme::new("001", "", "");
        theme.id = 1;
        load_theme_slots(&mut store, &mut theme).unwrap();
        assert_eq!(theme.position_of(30), Some(3));

        let mut table = Table::new("100", "001");
        let mut group = cdmload_core::GroupNode::new(cdmload_core::Node::default());
        group.node.id = 20;
        table.cv.insert("NEW", group);
        assign_theme_slots(&mut store, &table, &mut theme).unwrap();
        assert_eq!(theme.position_of(20), Some(2));
        assert_eq!(store.rows("THEME")[0].get("cv2_id"), Some(&Value::Int(20)));
    }
}
