use std::fmt;

use serde::Serialize;

use crate::error::ModelError;
use crate::mapping::Mapping;
use crate::node::{AttrKey, AttrValue, GroupNode, Node};

/// One hit of [`CommonDataModel::find_by_description`].
#[derive(Debug, Clone, PartialEq)]
pub struct DescMatch {
    /// Child code (classification code / statistical variable code).
    pub code: String,
    /// Surrogate id of the owning group.
    pub id: i64,
    /// Surrogate id of the child.
    pub child_id: i64,
    /// Requested extra attributes, in request order.
    pub attrs: Vec<(AttrKey, Option<AttrValue>)>,
}

impl DescMatch {
    pub fn attr(&self, key: AttrKey) -> Option<&AttrValue> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn attr_int(&self, key: AttrKey) -> Option<i64> {
        self.attr(key).and_then(AttrValue::as_int)
    }

    pub fn attr_text(&self, key: AttrKey) -> Option<&str> {
        self.attr(key).and_then(AttrValue::as_text)
    }
}

/// Two-level model: groups (CV / SP) holding children (CC / SV).
#[derive(Debug, Clone, Serialize)]
pub struct CommonDataModel {
    pub name: String,
    groups: Mapping<GroupNode>,
}

impl CommonDataModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Mapping::new(),
        }
    }

    pub fn insert(&mut self, code: impl Into<String>, group: GroupNode) -> Option<GroupNode> {
        self.groups.insert(code, group)
    }

    pub fn get(&self, code: &str) -> Option<&GroupNode> {
        self.groups.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut GroupNode> {
        self.groups.get_mut(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.groups.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupNode)> {
        self.groups.iter()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.groups.keys()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn child(&self, group: &str, code: &str) -> Option<&Node> {
        self.groups.get(group).and_then(|g| g.get(code))
    }

    /// Group ids, or `(group id, child id)` pairs when `include_child` is set
    /// (the child slot is `None` in the first form).
    pub fn all_ids(&self, include_child: bool) -> Box<dyn Iterator<Item = (i64, Option<i64>)> + '_> {
        if include_child {
            Box::new(
                self.groups
                    .values()
                    .flat_map(|g| g.children.values().map(move |c| (g.id(), Some(c.id)))),
            )
        } else {
            Box::new(self.groups.values().map(|g| (g.id(), None)))
        }
    }

    /// Persisted code-group id of every child, in model order. Children whose
    /// group has not been persisted yet are skipped.
    pub fn all_group_numbers(&self) -> impl Iterator<Item = i64> + '_ {
        self.groups
            .values()
            .flat_map(|g| g.children.values())
            .filter_map(|c| c.ext.ccg_id)
    }

    /// Back-fill attributes on a group after persistence.
    pub fn update_group(&mut self, code: &str, attrs: &[(&str, AttrValue)]) -> Result<(), ModelError> {
        let name = self.name.clone();
        let group = self.groups.get_mut(code).ok_or_else(|| ModelError::UnknownGroup {
            model: name,
            code: code.to_string(),
        })?;
        for (key, value) in attrs {
            group.node.set_attr(code, key, value.clone())?;
        }
        Ok(())
    }

    /// Back-fill attributes on a child after persistence.
    pub fn update_child(
        &mut self,
        group_code: &str,
        child_code: &str,
        attrs: &[(&str, AttrValue)],
    ) -> Result<(), ModelError> {
        let name = self.name.clone();
        let group = self.groups.get_mut(group_code).ok_or_else(|| ModelError::UnknownGroup {
            model: name.clone(),
            code: group_code.to_string(),
        })?;
        let child = group
            .children
            .get_mut(child_code)
            .ok_or_else(|| ModelError::UnknownChild {
                model: name,
                group: group_code.to_string(),
                code: child_code.to_string(),
            })?;
        for (key, value) in attrs {
            child.set_attr(child_code, key, value.clone())?;
        }
        Ok(())
    }

    /// Every child whose primary or alternate description equals `desc`
    /// (case-insensitive) and whose extension attributes equal each `filter`
    /// entry. `None` when nothing matches.
    pub fn find_by_description(
        &self,
        desc: &str,
        return_attrs: &[AttrKey],
        filter: &[(AttrKey, AttrValue)],
    ) -> Option<Vec<DescMatch>> {
        let mut results = Vec::new();
        for group in self.groups.values() {
            for (code, child) in group.iter() {
                if !child.matches_description(desc) {
                    continue;
                }
                let passes = filter
                    .iter()
                    .all(|(key, value)| child.get_attr(*key).as_ref() == Some(value));
                if !passes {
                    continue;
                }
                results.push(DescMatch {
                    code: code.to_string(),
                    id: group.id(),
                    child_id: child.id,
                    attrs: return_attrs.iter().map(|k| (*k, child.get_attr(*k))).collect(),
                });
            }
        }

        if results.is_empty() {
            log::debug!("{}: no child described as '{desc}'", self.name);
            None
        } else {
            Some(results)
        }
    }
}

impl fmt::Display for CommonDataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.codes().collect();
        write!(f, "In {}, there is/are {}.", self.name, codes.join(", "))?;
        for (code, group) in self.iter() {
            let children: Vec<&str> = group.children.keys().collect();
            write!(f, "\n--In {code}, there is/are {}.", children.join(", "))?;
        }
        Ok(())
    }
}
