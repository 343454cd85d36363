use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::cdm::CommonDataModel;
use crate::collab::ReferenceData;

/// Highest classification-variable slot a theme can hold (`cv1_id..cv20_id`).
pub const MAX_CV_SLOTS: u32 = 20;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Everything known about one statistical table. Built from a single sheet,
/// enriched by reconciliation and fact assembly, then handed to storage.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub code: String,
    pub theme_code: String,
    pub title: String,
    pub title_tc: String,
    pub fn_en: String,
    pub fn_tc: String,
    pub src_en: String,
    pub src_tc: String,
    pub id: i64,
    /// Classification variables → classification codes.
    pub cv: CommonDataModel,
    /// Statistical presentations → statistical variables.
    pub sp: CommonDataModel,
    /// Resolved fact records.
    pub mdt: Vec<FactRecord>,
}

impl Table {
    pub fn new(code: impl Into<String>, theme_code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            theme_code: theme_code.into(),
            title: String::new(),
            title_tc: String::new(),
            fn_en: String::new(),
            fn_tc: String::new(),
            src_en: String::new(),
            src_tc: String::new(),
            id: 0,
            cv: CommonDataModel::new("CV"),
            sp: CommonDataModel::new("SP"),
            mdt: Vec::new(),
        }
    }
}

/// One fact row: a measure value at a classification-code combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRecord {
    pub theme_id: i64,
    pub sv_id: i64,
    pub sp_id: i64,
    pub obs_value: f64,
    pub sd_value: i64,
    /// Theme slot position → classification-code id (`cv{n}_cc_id`).
    pub cc_ids: BTreeMap<u32, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mdt_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

/// A theme groups tables and fixes the slot position of each classification
/// variable (`cv{n}_id`).
#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    pub code: String,
    pub desc: String,
    pub desc_tc: String,
    pub id: i64,
    /// cv_id → slot marker (`cv3_id`).
    slots: IndexMap<i64, String>,
}

impl Theme {
    pub fn new(code: impl Into<String>, desc: impl Into<String>, desc_tc: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            desc: desc.into(),
            desc_tc: desc_tc.into(),
            id: 0,
            slots: IndexMap::new(),
        }
    }

    /// Theme with descriptions taken from the reference data.
    pub fn from_reference(code: &str, reference: &ReferenceData) -> Option<Self> {
        reference
            .themes
            .get(code)
            .map(|text| Self::new(code, text.en.clone(), text.tc.clone()))
    }

    pub fn contains(&self, cv_id: i64) -> bool {
        self.slots.contains_key(&cv_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Marker of the lowest free slot, `None` once all slots are taken.
    pub fn next_slot(&self) -> Option<String> {
        (1..=MAX_CV_SLOTS)
            .map(slot_marker)
            .find(|marker| !self.slots.values().any(|m| m == marker))
    }

    /// Replace the slot table (e.g. after reloading the theme row).
    pub fn set_slots(&mut self, slots: impl IntoIterator<Item = (i64, String)>) {
        self.slots = slots.into_iter().collect();
    }

    pub fn slots(&self) -> impl Iterator<Item = (i64, &str)> {
        self.slots.iter().map(|(id, marker)| (*id, marker.as_str()))
    }

    /// Slot number of a classification variable, parsed from its marker.
    pub fn position_of(&self, cv_id: i64) -> Option<u32> {
        let marker = self.slots.get(&cv_id)?;
        let digits: String = marker
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

/// `cv{n}_id`.
pub fn slot_marker(n: u32) -> String {
    format!("cv{n}_id")
}
