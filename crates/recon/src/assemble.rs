//! Observation → fact records. Classification codes are resolved by
//! description; when one description matches several codes, the candidates
//! are admitted only under an already-resolved parent and the deepest code
//! per classification variable wins.

use std::collections::{BTreeMap, HashMap};

use cdmload_core::{AttrKey, AttrValue, DescMatch, FactRecord, Table, Theme};

use crate::catalog::{FieldCatalog, Section, UNDEFINED_FIELD};
use crate::reconcile::Observation;

/// A classification code matched by description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub code: String,
    /// Owning classification variable id.
    pub cv_id: i64,
    /// Classification code id.
    pub cc_id: i64,
    /// Group number (depth).
    pub ccg: i64,
    pub parent_cc_code: String,
}

impl Candidate {
    fn from_match(m: &DescMatch) -> Self {
        Self {
            code: m.code.clone(),
            cv_id: m.id,
            cc_id: m.child_id,
            ccg: m.attr_int(AttrKey::Ccg).unwrap_or(1),
            parent_cc_code: m.attr_text(AttrKey::ParentCcCode).unwrap_or_default().to_string(),
        }
    }
}

/// Resolve per-field candidate lists to the accepted set.
///
/// Single candidates are accepted outright. Fields with several candidates
/// go to a pool that is walked by ascending group number; a pooled candidate
/// is admitted when its parent code is already accepted. Finally only the
/// deepest entries of each classification variable are kept.
pub fn disambiguate(per_field: Vec<Vec<Candidate>>) -> Vec<Candidate> {
    let mut accepted: Vec<Candidate> = Vec::new();
    let mut pool: Vec<Candidate> = Vec::new();
    for candidates in per_field {
        if candidates.len() > 1 {
            pool.extend(candidates);
        } else {
            accepted.extend(candidates);
        }
    }

    pool.sort_by_key(|c| c.ccg);
    for candidate in pool {
        if accepted.iter().any(|a| a.code == candidate.parent_cc_code) {
            accepted.push(candidate);
        }
    }

    let mut deepest: HashMap<i64, i64> = HashMap::new();
    for c in &accepted {
        let depth = deepest.entry(c.cv_id).or_insert(c.ccg);
        *depth = (*depth).max(c.ccg);
    }
    accepted.retain(|c| deepest.get(&c.cv_id) == Some(&c.ccg));
    accepted
}

pub struct FactAssembler<'a> {
    table: &'a Table,
    theme: &'a Theme,
    catalog: &'a FieldCatalog,
}

impl<'a> FactAssembler<'a> {
    pub fn new(table: &'a Table, theme: &'a Theme, catalog: &'a FieldCatalog) -> Self {
        Self { table, theme, catalog }
    }

    /// Theme slot position → classification code id for one observation.
    pub fn resolve_codes(&self, obs: &Observation) -> BTreeMap<u32, i64> {
        let per_field: Vec<Vec<Candidate>> = obs
            .cv
            .iter()
            .map(|(field, desc)| {
                self.table
                    .cv
                    .find_by_description(
                        desc,
                        &[AttrKey::ParentCcCode, AttrKey::Ccg],
                        &[(AttrKey::Fas, AttrValue::from(field.as_str()))],
                    )
                    .map(|hits| hits.iter().map(Candidate::from_match).collect())
                    .unwrap_or_default()
            })
            .collect();

        let mut positions = BTreeMap::new();
        for c in disambiguate(per_field) {
            match self.theme.position_of(c.cv_id) {
                Some(pos) => {
                    positions.insert(pos, c.cc_id);
                }
                None => log::warn!(
                    "table {}: classification variable {} has no theme slot",
                    self.table.code,
                    c.cv_id
                ),
            }
        }
        positions
    }

    /// `(sp_id, sv_id)` pairs for a variable description under a measure field.
    fn presentation_pairs(&self, desc: &str, fas: &str, sp_field: &str) -> Vec<(i64, i64)> {
        self.table
            .sp
            .find_by_description(
                desc,
                &[],
                &[
                    (AttrKey::Fas, AttrValue::from(fas)),
                    (AttrKey::SpField, AttrValue::from(sp_field)),
                ],
            )
            .map(|hits| hits.iter().map(|m| (m.id, m.child_id)).collect())
            .unwrap_or_default()
    }

    /// Fact records for one observation: one per resolved (presentation,
    /// variable) pair of every measure.
    pub fn assemble(&self, obs: &Observation) -> Vec<FactRecord> {
        let cc_ids = self.resolve_codes(obs);
        if cc_ids.is_empty() {
            log::debug!("table {}: observation resolved no classification code", self.table.code);
            return Vec::new();
        }

        let mut facts = Vec::new();
        for (sp_field, measure) in &obs.mdt {
            let mut pairs = Vec::new();
            if obs.sv.is_empty() {
                let descs = self.catalog.descriptions(Section::Sv, UNDEFINED_FIELD);
                if descs.is_empty() {
                    log::warn!(
                        "table {}: no statistical variable for measure '{sp_field}'; check the SV FAS fields",
                        self.table.code
                    );
                }
                for desc in descs {
                    pairs.extend(self.presentation_pairs(&desc, UNDEFINED_FIELD, sp_field));
                }
            } else {
                for (sv_field, desc) in &obs.sv {
                    pairs.extend(self.presentation_pairs(desc, sv_field, sp_field));
                }
            }

            for (sp_id, sv_id) in pairs {
                facts.push(FactRecord {
                    theme_id: self.theme.id,
                    sv_id,
                    sp_id,
                    obs_value: measure.obs_value,
                    sd_value: measure.sd_value,
                    cc_ids: cc_ids.clone(),
                    mdt_id: None,
                });
            }
        }
        facts
    }

    pub fn assemble_all(&self, observations: &[Observation]) -> Vec<FactRecord> {
        observations.iter().flat_map(|obs| self.assemble(obs)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::parse::col;
    use crate::reconcile::Measure;
    use cdmload_core::{Extension, GroupNode, Mapping, Node};

    fn cand(code: &str, cv_id: i64, cc_id: i64, ccg: i64, parent: &str) -> Candidate {
        Candidate {
            code: code.into(),
            cv_id,
            cc_id,
            ccg,
            parent_cc_code: parent.into(),
        }
    }

    #[test]
    fn singles_are_accepted_and_pool_needs_a_parent() {
        let out = disambiguate(vec![
            vec![cand("HK", 1, 10, 1, "")],
            vec![cand("T1", 1, 11, 2, "HK"), cand("T2", 1, 12, 2, "KLN"), cand("T3", 2, 13, 1, "")],
        ]);
        let codes: Vec<&str> = out.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["T1"]);
    }

    #[test]
    fn pooled_children_chain_through_admitted_parents() {
        let out = disambiguate(vec![
            vec![cand("A", 1, 1, 1, "")],
            vec![cand("C", 1, 3, 3, "B"), cand("B", 1, 2, 2, "A"), cand("X", 1, 4, 2, "Z")],
        ]);
        let codes: Vec<&str> = out.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["C"]);
    }

    #[test]
    fn deepest_per_variable_and_ties_survive() {
        let out = disambiguate(vec![
            vec![cand("A", 1, 1, 1, "")],
            vec![cand("B", 1, 2, 2, "A")],
            vec![cand("M", 2, 5, 1, "")],
            vec![cand("F", 2, 6, 1, "")],
        ]);
        let codes: Vec<&str> = out.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["B", "M", "F"]);
    }

    #[test]
    fn resolved_set_is_a_fixed_point() {
        let once = disambiguate(vec![
            vec![cand("A", 1, 1, 1, "")],
            vec![cand("B", 1, 2, 2, "A"), cand("B", 1, 7, 2, "Q")],
            vec![cand("M", 2, 5, 1, "")],
        ]);
        let again = disambiguate(once.iter().cloned().map(|c| vec![c]).collect());
        assert_eq!(once, again);
    }

    fn code(desc: &str, fas: &str, id: i64, ccg: i64, parent: &str) -> Node {
        let mut n = Node::new(desc, "", "", "").with_ext(Extension {
            fas: Some(fas.into()),
            ccg: Some(ccg),
            parent_cc_code: Some(parent.into()),
            ..Default::default()
        });
        n.id = id;
        n
    }

    fn variable(desc: &str, fas: &str, sp_field: &str, id: i64) -> Node {
        let mut n = Node::new(desc, "", "", "").with_ext(Extension {
            fas: Some(fas.into()),
            sp_field: Some(sp_field.into()),
            ..Default::default()
        });
        n.id = id;
        n
    }

    fn fixture() -> (Table, Theme) {
        let mut table = Table::new("001", "001");
        let mut area = GroupNode::new(Node::new("Area", "", "", ""));
        area.node.id = 100;
        area.insert("HK", code("Hong Kong", "area", 1, 1, ""));
        area.insert("HKI", code("Hong Kong Island", "area", 2, 2, "HK"));
        area.insert("WC", code("Wan Chai", "district", 3, 3, "HKI"));
        area.insert("WC2", code("Wan Chai", "district", 4, 2, "KLN"));
        table.cv.insert("AREA", area);

        let mut sp = GroupNode::new(Node::default());
        sp.node.id = 500;
        sp.insert("POP", variable("Population", "stat", "value", 50));
        sp.insert("UND", variable("Persons", UNDEFINED_FIELD, "value", 51));
        table.sp.insert("P1", sp);

        let mut theme = Theme::new("001", "", "");
        theme.id = 9;
        theme.set_slots([(100, "cv3_id".to_string())]);
        (table, theme)
    }

    fn obs(cv: &[(&str, &str)], sv: &[(&str, &str)], value: f64) -> Observation {
        let mut o = Observation::default();
        for (k, v) in cv {
            o.cv.insert(k.to_string(), v.to_string());
        }
        for (k, v) in sv {
            o.sv.insert(k.to_string(), v.to_string());
        }
        o.mdt.insert("value".into(), Measure { obs_value: value, sd_value: 0 });
        o
    }

    fn catalog_with_undefined() -> FieldCatalog {
        let mut f = Frame::new(vec![col::FAS_FIELD.into(), col::FAS_DESC.into()]);
        f.push(vec![Some(UNDEFINED_FIELD.into()), Some("Persons".into())]);
        let mut sections = Mapping::new();
        sections.insert("SV", f);
        FieldCatalog::from_sections(&sections)
    }

    #[test]
    fn duplicate_descriptions_resolve_under_their_parent() {
        let (table, theme) = fixture();
        let catalog = FieldCatalog::default();
        let asm = FactAssembler::new(&table, &theme, &catalog);
        let facts = asm.assemble(&obs(
            &[("area", "hong kong island"), ("district", "Wan Chai")],
            &[("stat", "Population")],
            42.0,
        ));
        assert_eq!(facts.len(), 1);
        let f = &facts[0];
        assert_eq!(f.theme_id, 9);
        assert_eq!((f.sp_id, f.sv_id), (500, 50));
        assert_eq!(f.obs_value, 42.0);
        assert_eq!(f.cc_ids, BTreeMap::from([(3, 3)]));
    }

    #[test]
    fn missing_presentation_fields_fall_back_to_undefined_variables() {
        let (table, theme) = fixture();
        let catalog = catalog_with_undefined();
        let asm = FactAssembler::new(&table, &theme, &catalog);
        let facts = asm.assemble(&obs(&[("area", "Hong Kong")], &[], 1.0));
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].sv_id, 51);
        assert_eq!(facts[0].cc_ids, BTreeMap::from([(3, 1)]));
    }

    #[test]
    fn unresolved_codes_emit_nothing() {
        let (table, theme) = fixture();
        let catalog = FieldCatalog::default();
        let asm = FactAssembler::new(&table, &theme, &catalog);
        assert!(asm.assemble(&obs(&[("area", "Kowloon")], &[("stat", "Population")], 1.0)).is_empty());
        let unslotted = Theme::new("001", "", "");
        let asm = FactAssembler::new(&table, &unslotted, &catalog);
        assert!(asm.assemble(&obs(&[("area", "Hong Kong")], &[("stat", "Population")], 1.0)).is_empty());
    }
}
