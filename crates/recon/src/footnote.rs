use cdmload_core::{FootnoteRow, Locale, Mapping, NoteText};
use serde::Serialize;

/// Note number reserved for source/provenance lines.
pub const SOURCE_NOTE_NO: i64 = 99;

/// Note types above this are not loaded.
pub const MAX_NOTE_TYPE: i64 = 3;

pub const NOTES_HEADER_EN: &str = "Notes: ";
pub const NOTES_HEADER_TC: &str = "註釋：";
pub const SOURCE_HEADER_EN: &str = "Source: ";
pub const SOURCE_HEADER_TC: &str = "資料來源：";

/// Table-level header text rendered from the info notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderText {
    pub fn_en: String,
    pub fn_tc: String,
    pub src_en: String,
    pub src_tc: String,
}

/// Canonical note symbol → bilingual text, for one table.
#[derive(Debug, Clone, Default)]
pub struct FootnoteRegistry {
    notes: Mapping<NoteText>,
    /// Unsymbolled notes plus the table-info notes, in load order.
    info: Vec<FootnoteRow>,
    triplet_removed: usize,
}

impl FootnoteRegistry {
    /// Build from the raw rows of one table.
    pub fn build(mut rows: Vec<FootnoteRow>, table_info_notes: &[String]) -> Self {
        rows.retain(|r| r.note_type <= MAX_NOTE_TYPE);
        rows.sort_by_key(|r| r.note_no);

        // 1. triplet artifact
        let typed: Vec<(usize, i64)> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.note_type != 0)
            .map(|(i, r)| (i, r.note_type))
            .collect();
        let removed = triplet_rows(&typed);
        let triplet_removed = removed.len();
        let (dropped, kept): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .enumerate()
            .partition(|(i, _)| removed.contains(i));
        if triplet_removed > 0 {
            log::info!("footnotes: triplet filter removed {triplet_removed} of {} typed row(s)", typed.len());
            // a symbol that only lived in removed rows is lost entirely
            for (_, row) in &dropped {
                if !row.note.is_empty() && !kept.iter().any(|(_, k)| k.note == row.note) {
                    log::warn!("footnotes: triplet filter dropped the only row for note '{}'", row.note);
                }
            }
        }
        let mut kept: Vec<FootnoteRow> = kept.into_iter().map(|(_, r)| r).collect();

        // 2. duplicate text pairs
        let mut seen: Vec<(String, String)> = Vec::new();
        kept.retain(|r| {
            let pair = (r.note_chi.clone(), r.note_eng.clone());
            if seen.contains(&pair) {
                false
            } else {
                seen.push(pair);
                true
            }
        });

        // 3. one entry per symbol: the highest note type, first occurrence
        let mut best: Mapping<&FootnoteRow> = Mapping::new();
        for row in kept.iter().filter(|r| !r.note.is_empty()) {
            match best.get(&row.note) {
                Some(current) if current.note_type >= row.note_type => {}
                _ => {
                    best.insert(row.note.clone(), row);
                }
            }
        }

        // 4. canonical keys; a later symbol that collapses onto an earlier key wins
        let mut notes = Mapping::new();
        for (symbol, row) in best.iter() {
            notes.insert(strip_parens(symbol), NoteText::new(row.note_eng.clone(), row.note_chi.clone()));
        }

        let mut info: Vec<FootnoteRow> = kept.iter().filter(|r| r.note.is_empty()).cloned().collect();
        info.extend(
            kept.iter()
                .filter(|r| !r.note.is_empty() && table_info_notes.contains(&r.note))
                .cloned(),
        );

        Self {
            notes,
            info,
            triplet_removed,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&NoteText> {
        self.notes.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.notes.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NoteText)> {
        self.notes.iter()
    }

    pub fn triplet_removed(&self) -> usize {
        self.triplet_removed
    }

    /// Render the info notes as `<symbol> <text>` lines after `header`:
    /// source lines (note number 99) when `source` is set, everything else
    /// otherwise. Empty when there is nothing to render.
    pub fn render(&self, header: &str, source: bool, locale: Locale) -> String {
        let lines: Vec<String> = self
            .info
            .iter()
            .filter(|r| (r.note_no == SOURCE_NOTE_NO) == source)
            .map(|r| {
                let raw = match locale {
                    Locale::En => &r.note_eng,
                    Locale::Tc => &r.note_chi,
                };
                let text = raw.replace('\n', "").replace("<br>", "\n");
                if r.note.is_empty() {
                    text
                } else {
                    format!("{} {text}", r.note)
                }
            })
            .collect();
        let body = lines.join("\n");
        if body.is_empty() {
            String::new()
        } else {
            format!("{header}{body}")
        }
    }

    pub fn header_text(&self) -> HeaderText {
        HeaderText {
            fn_en: self.render(NOTES_HEADER_EN, false, Locale::En),
            fn_tc: self.render(NOTES_HEADER_TC, false, Locale::Tc),
            src_en: self.render(SOURCE_HEADER_EN, true, Locale::En),
            src_tc: self.render(SOURCE_HEADER_TC, true, Locale::Tc),
        }
    }
}

/// Drop `(` and `)`.
pub fn strip_parens(text: &str) -> String {
    text.chars().filter(|c| *c != '(' && *c != ')').collect()
}

/// Row indices removed by the triplet rule. `typed` is the ordered
/// `(row index, note type)` sequence of rows with a nonzero type. A window of
/// three consecutive entries typed exactly `1, 2, 3` loses its last two rows
/// and the window restarts after it.
pub fn triplet_rows(typed: &[(usize, i64)]) -> Vec<usize> {
    let mut removed = Vec::new();
    let mut window: Vec<(usize, i64)> = Vec::with_capacity(3);
    for &entry in typed {
        window.push(entry);
        if window.len() == 3 {
            if window.iter().enumerate().all(|(i, (_, t))| *t == i as i64 + 1) {
                removed.extend(window[1..].iter().map(|(idx, _)| *idx));
                window.clear();
            } else {
                window.remove(0);
            }
        }
    }
    removed
}
