use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ModelError;
use crate::mapping::Mapping;

/// Maximum number of positional footnote slots on a node.
pub const FOOTNOTE_SLOTS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Tc,
}

// ---------------------------------------------------------------------------
// Footnotes
// ---------------------------------------------------------------------------

/// Bilingual note text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteText {
    pub en: String,
    pub tc: String,
}

impl NoteText {
    pub fn new(en: impl Into<String>, tc: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            tc: tc.into(),
        }
    }
}

/// Positional footnotes (slot 1..=5) attached to a description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FootnoteBag {
    slots: BTreeMap<u8, NoteText>,
}

impl FootnoteBag {
    /// Attach a note at `slot`. Returns false when the slot is out of range.
    pub fn attach(&mut self, slot: u8, note: NoteText) -> bool {
        if slot == 0 || slot > FOOTNOTE_SLOTS {
            return false;
        }
        self.slots.insert(slot, note);
        true
    }

    pub fn get(&self, slot: u8) -> Option<&NoteText> {
        self.slots.get(&slot)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Flatten into `fn{n}_en` / `fn{n}_tc` column pairs.
    pub fn columns(&self) -> Vec<(String, String)> {
        let mut cols = Vec::with_capacity(self.slots.len() * 2);
        for (slot, note) in &self.slots {
            cols.push((format!("fn{slot}_en"), note.en.clone()));
            cols.push((format!("fn{slot}_tc"), note.tc.clone()));
        }
        cols
    }
}

// ---------------------------------------------------------------------------
// Extension attributes
// ---------------------------------------------------------------------------

/// Known extension attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKey {
    /// Surrogate id (lives on the node itself, not in the extension record).
    Id,
    /// Source-table field name the node is matched against.
    Fas,
    Footnote,
    /// Classification-code sequence number.
    Seq,
    /// Classification-code group number (depth).
    Ccg,
    ParentCcCode,
    /// Surrogate id of the code group.
    CcgId,
    /// Owning measure field of a statistical variable.
    SpField,
}

impl AttrKey {
    /// Resolve a free-form key: spaces are stripped and case is folded.
    pub fn parse(key: &str) -> Result<Self, ModelError> {
        let norm: String = key.chars().filter(|c| *c != ' ').collect::<String>().to_lowercase();
        match norm.as_str() {
            "id" => Ok(Self::Id),
            "fas" => Ok(Self::Fas),
            "footnote" => Ok(Self::Footnote),
            "seq" => Ok(Self::Seq),
            "ccg" => Ok(Self::Ccg),
            "parent_cc_code" | "parentcccode" => Ok(Self::ParentCcCode),
            "ccg_id" | "ccgid" => Ok(Self::CcgId),
            "sp_field" | "spfield" | "mdt" => Ok(Self::SpField),
            _ => Err(ModelError::UnknownAttribute(key.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Fas => "fas",
            Self::Footnote => "footnote",
            Self::Seq => "seq",
            Self::Ccg => "ccg",
            Self::ParentCcCode => "parent_cc_code",
            Self::CcgId => "ccg_id",
            Self::SpField => "sp_field",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Text(String),
    Footnote(FootnoteBag),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Fixed set of optional extension attributes. Each key is write-once:
/// setting it again to a different value is refused.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extension {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footnote: Option<FootnoteBag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccg: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_cc_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccg_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_field: Option<String>,
}

impl Extension {
    pub fn get(&self, key: AttrKey) -> Option<AttrValue> {
        match key {
            AttrKey::Id => None,
            AttrKey::Fas => self.fas.clone().map(AttrValue::Text),
            AttrKey::Footnote => self.footnote.clone().map(AttrValue::Footnote),
            AttrKey::Seq => self.seq.map(AttrValue::Int),
            AttrKey::Ccg => self.ccg.map(AttrValue::Int),
            AttrKey::ParentCcCode => self.parent_cc_code.clone().map(AttrValue::Text),
            AttrKey::CcgId => self.ccg_id.map(AttrValue::Int),
            AttrKey::SpField => self.sp_field.clone().map(AttrValue::Text),
        }
    }

    pub fn set(&mut self, key: AttrKey, value: AttrValue) -> Result<(), ModelError> {
        match key {
            AttrKey::Id => Err(ModelError::UnknownAttribute("id".into())),
            AttrKey::Fas => write_once(&mut self.fas, key, text(key, value)?),
            AttrKey::Footnote => match value {
                AttrValue::Footnote(bag) => write_once(&mut self.footnote, key, bag),
                _ => Err(kind_error(key, "footnote")),
            },
            AttrKey::Seq => write_once(&mut self.seq, key, int(key, value)?),
            AttrKey::Ccg => write_once(&mut self.ccg, key, int(key, value)?),
            AttrKey::ParentCcCode => write_once(&mut self.parent_cc_code, key, text(key, value)?),
            AttrKey::CcgId => write_once(&mut self.ccg_id, key, int(key, value)?),
            AttrKey::SpField => write_once(&mut self.sp_field, key, text(key, value)?),
        }
    }
}

fn write_once<T: PartialEq>(slot: &mut Option<T>, key: AttrKey, value: T) -> Result<(), ModelError> {
    match slot {
        Some(existing) if *existing != value => Err(ModelError::AttributeReassigned(key.as_str().into())),
        _ => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn kind_error(key: AttrKey, expected: &'static str) -> ModelError {
    ModelError::AttributeKind {
        key: key.as_str().into(),
        expected,
    }
}

fn int(key: AttrKey, value: AttrValue) -> Result<i64, ModelError> {
    value.as_int().ok_or_else(|| kind_error(key, "integer"))
}

fn text(key: AttrKey, value: AttrValue) -> Result<String, ModelError> {
    match value {
        AttrValue::Text(s) => Ok(s),
        _ => Err(kind_error(key, "text")),
    }
}

// ---------------------------------------------------------------------------
// Node / GroupNode
// ---------------------------------------------------------------------------

/// A classification code or a statistical variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Node {
    /// Surrogate id, 0 until persisted.
    pub id: i64,
    pub desc: String,
    pub desc_tc: String,
    pub alt_desc: String,
    pub alt_desc_tc: String,
    #[serde(flatten)]
    pub ext: Extension,
}

impl Node {
    pub fn new(
        desc: impl Into<String>,
        desc_tc: impl Into<String>,
        alt_desc: impl Into<String>,
        alt_desc_tc: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            desc: desc.into(),
            desc_tc: desc_tc.into(),
            alt_desc: alt_desc.into(),
            alt_desc_tc: alt_desc_tc.into(),
            ext: Extension::default(),
        }
    }

    pub fn with_ext(mut self, ext: Extension) -> Self {
        self.ext = ext;
        self
    }

    /// Assign the surrogate id. Assigning the same id twice is a no-op.
    pub fn assign_id(&mut self, code: &str, id: i64) -> Result<(), ModelError> {
        if self.id != 0 && self.id != id {
            return Err(ModelError::IdReassigned {
                code: code.to_string(),
                current: self.id,
                new: id,
            });
        }
        self.id = id;
        Ok(())
    }

    pub fn get_attr(&self, key: AttrKey) -> Option<AttrValue> {
        match key {
            AttrKey::Id => Some(AttrValue::Int(self.id)),
            _ => self.ext.get(key),
        }
    }

    /// Keyed setter; the key is normalized by [`AttrKey::parse`].
    pub fn set_attr(&mut self, code: &str, key: &str, value: AttrValue) -> Result<(), ModelError> {
        match AttrKey::parse(key)? {
            AttrKey::Id => {
                let id = int(AttrKey::Id, value)?;
                self.assign_id(code, id)
            }
            other => self.ext.set(other, value),
        }
    }

    /// Case-insensitive match against the primary or alternate description.
    pub fn matches_description(&self, desc: &str) -> bool {
        let wanted = desc.to_lowercase();
        self.desc.to_lowercase() == wanted
            || (!self.alt_desc.is_empty() && self.alt_desc.to_lowercase() == wanted)
    }

    /// Description shown on per-table rows: the alternate wins when present.
    pub fn tb_desc(&self, locale: Locale) -> &str {
        let (alt, primary) = match locale {
            Locale::En => (&self.alt_desc, &self.desc),
            Locale::Tc => (&self.alt_desc_tc, &self.desc_tc),
        };
        if alt.is_empty() {
            primary
        } else {
            alt
        }
    }

    pub fn footnote(&self) -> Option<&FootnoteBag> {
        self.ext.footnote.as_ref()
    }
}

/// Display metadata carried by a statistical presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Presentation {
    pub stat_type: String,
    pub unit: String,
    pub unit_desc: String,
    pub unit_desc_tc: String,
    pub decimals: i64,
    pub unit_mult: i64,
    pub separator: String,
}

/// A classification variable or statistical presentation: a node payload
/// plus its ordered children.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Presentation>,
    pub children: Mapping<Node>,
}

impl GroupNode {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            presentation: None,
            children: Mapping::new(),
        }
    }

    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = Some(presentation);
        self
    }

    pub fn id(&self) -> i64 {
        self.node.id
    }

    pub fn insert(&mut self, code: impl Into<String>, child: Node) -> Option<Node> {
        self.children.insert(code, child)
    }

    pub fn get(&self, code: &str) -> Option<&Node> {
        self.children.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_key_normalizes_spaces_and_case() {
        assert_eq!(AttrKey::parse("CCG ID").unwrap(), AttrKey::CcgId);
        assert_eq!(AttrKey::parse(" Parent_CC_Code").unwrap(), AttrKey::ParentCcCode);
        assert_eq!(AttrKey::parse("Id").unwrap(), AttrKey::Id);
        assert!(matches!(AttrKey::parse("colour"), Err(ModelError::UnknownAttribute(_))));
    }

    #[test]
    fn id_is_assigned_once() {
        let mut node = Node::new("Male", "男", "", "");
        assert_eq!(node.id, 0);
        node.assign_id("M", 12).unwrap();
        node.assign_id("M", 12).unwrap();
        let err = node.assign_id("M", 13).unwrap_err();
        assert!(err.to_string().contains("already has id 12"));
    }

    #[test]
    fn extension_is_write_once() {
        let mut node = Node::new("Male", "男", "", "");
        node.set_attr("M", "ccg_id", 4i64.into()).unwrap();
        node.set_attr("M", "CCG_ID", 4i64.into()).unwrap();
        assert!(node.set_attr("M", "ccg_id", 5i64.into()).is_err());
        assert_eq!(node.get_attr(AttrKey::CcgId), Some(AttrValue::Int(4)));
    }

    #[test]
    fn attr_kind_is_checked() {
        let mut node = Node::default();
        let err = node.set_attr("X", "seq", "one".into()).unwrap_err();
        assert_eq!(
            err,
            ModelError::AttributeKind {
                key: "seq".into(),
                expected: "integer"
            }
        );
    }

    #[test]
    fn description_match_is_case_insensitive_and_uses_alternate() {
        let node = Node::new("Hong Kong Island", "香港島", "HK Island", "港島");
        assert!(node.matches_description("hong kong island"));
        assert!(node.matches_description("HK ISLAND"));
        assert!(!node.matches_description("Kowloon"));
        assert_eq!(node.tb_desc(Locale::En), "HK Island");
        assert_eq!(node.tb_desc(Locale::Tc), "港島");
    }

    #[test]
    fn empty_alternate_never_matches() {
        let node = Node::new("Total", "總計", "", "");
        assert!(!node.matches_description(""));
        assert_eq!(node.tb_desc(Locale::En), "Total");
    }

    #[test]
    fn footnote_slots_are_bounded() {
        let mut bag = FootnoteBag::default();
        assert!(bag.attach(1, NoteText::new("a", "甲")));
        assert!(bag.attach(5, NoteText::new("e", "戊")));
        assert!(!bag.attach(6, NoteText::new("f", "己")));
        assert!(!bag.attach(0, NoteText::new("z", "零")));
        assert_eq!(bag.len(), 2);
        assert_eq!(
            bag.columns(),
            vec![
                ("fn1_en".to_string(), "a".to_string()),
                ("fn1_tc".to_string(), "甲".to_string()),
                ("fn5_en".to_string(), "e".to_string()),
                ("fn5_tc".to_string(), "戊".to_string()),
            ]
        );
    }
}
