//! Small column-named table of optional cell text, enough to express the
//! sheet slicing the parser needs: column pruning, first-seen-order grouping
//! and per-row access by column name.

use crate::error::CdmError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with empty cells, extra cells dropped.
    pub fn push(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = FrameRow<'_>> {
        (0..self.rows.len()).map(move |idx| FrameRow { frame: self, idx })
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of `name`, appending an empty column when it does not exist.
    fn ensure_column(&mut self, name: &str) -> usize {
        match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.columns.len() - 1
            }
        }
    }

    pub fn set(&mut self, row: usize, column: &str, value: Option<String>) {
        let col = self.ensure_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            r[col] = value;
        }
    }

    /// Fill every empty cell of `column` (created when absent) with `value`.
    pub fn fill_empty(&mut self, column: &str, value: &str) {
        let col = self.ensure_column(column);
        for row in &mut self.rows {
            if row[col].is_none() {
                row[col] = Some(value.to_string());
            }
        }
    }

    /// Copy without the columns that hold no value in any row.
    pub fn drop_empty_columns(&self) -> Self {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&c| self.rows.iter().any(|r| r[c].is_some()))
            .collect();
        Self {
            columns: keep.iter().map(|&c| self.columns[c].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| keep.iter().map(|&c| r[c].clone()).collect())
                .collect(),
        }
    }

    /// Partition by one column, groups in first-seen order. Rows with an
    /// empty key cell are left out.
    pub fn group_by(&self, column: &str) -> Vec<(String, Frame)> {
        let Some(col) = self.column_index(column) else {
            return Vec::new();
        };
        let mut groups: Vec<(String, Frame)> = Vec::new();
        for row in &self.rows {
            let Some(key) = row[col].as_deref() else {
                continue;
            };
            match groups.iter_mut().find(|(k, _)| k == key) {
                Some((_, frame)) => frame.rows.push(row.clone()),
                None => {
                    let mut frame = Frame::new(self.columns.clone());
                    frame.rows.push(row.clone());
                    groups.push((key.to_string(), frame));
                }
            }
        }
        groups
    }

    /// Partition by several columns, groups in first-seen order. Empty cells
    /// take part in the key as `None`.
    pub fn group_by_many(&self, columns: &[&str]) -> Vec<(Vec<Option<String>>, Frame)> {
        let idx: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let mut groups: Vec<(Vec<Option<String>>, Frame)> = Vec::new();
        for row in &self.rows {
            let key: Vec<Option<String>> = idx
                .iter()
                .map(|i| i.and_then(|i| row[i].clone()))
                .collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, frame)) => frame.rows.push(row.clone()),
                None => {
                    let mut frame = Frame::new(self.columns.clone());
                    frame.rows.push(row.clone());
                    groups.push((key, frame));
                }
            }
        }
        groups
    }

    /// Stack frames; the column set is the union in first-seen order.
    pub fn concat(frames: Vec<Frame>) -> Frame {
        let mut out = Frame::default();
        for frame in frames {
            let map: Vec<usize> = frame.columns.iter().map(|c| out.ensure_column(c)).collect();
            for row in frame.rows {
                let mut new_row = vec![None; out.columns.len()];
                for (src, dst) in map.iter().enumerate() {
                    new_row[*dst] = row[src].clone();
                }
                out.rows.push(new_row);
            }
        }
        out
    }
}

/// Borrowed view of one frame row.
#[derive(Debug, Clone, Copy)]
pub struct FrameRow<'a> {
    frame: &'a Frame,
    idx: usize,
}

impl<'a> FrameRow<'a> {
    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn get(&self, column: &str) -> Option<&'a str> {
        let col = self.frame.column_index(column)?;
        self.frame.rows[self.idx][col].as_deref()
    }

    /// Cell that must be present; `section` only feeds the error message.
    pub fn require(&self, section: &str, column: &str) -> Result<&'a str, CdmError> {
        if !self.frame.has_column(column) {
            return Err(CdmError::MissingColumn {
                section: section.to_string(),
                column: column.to_string(),
            });
        }
        self.get(column).ok_or_else(|| CdmError::MissingValue {
            section: section.to_string(),
            column: column.to_string(),
            row: self.idx + 1,
        })
    }

    pub fn to_vec(&self) -> Vec<Option<String>> {
        self.frame.rows[self.idx].clone()
    }
}
