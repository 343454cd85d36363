/// A rectangular grid of cell text as loaded from a CSV or workbook sheet.
/// Empty strings stand for empty cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub name: String,
    rows: Vec<Vec<String>>,
    width: usize,
}

impl RawSheet {
    /// Build from ragged rows; short rows are padded so the grid is rectangular.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        Self {
            name: name.into(),
            rows,
            width,
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Non-empty cell text (surrounding whitespace trimmed).
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_ragged_rows() {
        let sheet = RawSheet::from_rows(
            "t",
            vec![
                vec!["a".into()],
                vec!["b".into(), "c".into(), " ".into()],
            ],
        );
        assert_eq!(sheet.width(), 3);
        assert_eq!(sheet.row(0).unwrap().len(), 3);
        assert_eq!(sheet.cell(0, 0), Some("a"));
        assert_eq!(sheet.cell(0, 2), None);
        assert_eq!(sheet.cell(1, 2), None);
        assert_eq!(sheet.cell(5, 0), None);
    }
}
