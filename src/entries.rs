// 🎓 Multi-Entry List Editor - education and career rows
//
// Rows are kept in insertion order, which is also display order.
// No uniqueness constraint, no minimum length.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// A repeatable sub-record edited field by field
pub trait EntryRecord: Default + Clone {
    /// UI field names, in display order
    const FIELDS: &'static [&'static str];

    fn get(&self, field: &str) -> Option<&str>;

    fn set(&mut self, field: &str, value: String) -> Result<(), ApiError>;

    /// True when every field is empty
    fn is_blank(&self) -> bool {
        Self::FIELDS
            .iter()
            .all(|f| self.get(f).map_or(true, str::is_empty))
    }
}

// ============================================================================
// EDUCATION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationRecord {
    pub institute: String,
    pub degree: String,
    pub field_of_study: String,
    pub start: String,
    pub end: String,
}

impl EntryRecord for EducationRecord {
    const FIELDS: &'static [&'static str] = &["institute", "degree", "fieldOfStudy", "start", "end"];

    fn get(&self, field: &str) -> Option<&str> {
        match field {
            "institute" => Some(&self.institute),
            "degree" => Some(&self.degree),
            "fieldOfStudy" => Some(&self.field_of_study),
            "start" => Some(&self.start),
            "end" => Some(&self.end),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: String) -> Result<(), ApiError> {
        let slot = match field {
            "institute" => &mut self.institute,
            "degree" => &mut self.degree,
            "fieldOfStudy" => &mut self.field_of_study,
            "start" => &mut self.start,
            "end" => &mut self.end,
            other => return Err(ApiError::Internal(format!("unknown education field '{}'", other))),
        };
        *slot = value;
        Ok(())
    }
}

// ============================================================================
// CAREER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerRecord {
    pub designation: String,
    pub company: String,
    pub start: String,
    pub end: String,
}

impl EntryRecord for CareerRecord {
    const FIELDS: &'static [&'static str] = &["designation", "company", "start", "end"];

    fn get(&self, field: &str) -> Option<&str> {
        match field {
            "designation" => Some(&self.designation),
            "company" => Some(&self.company),
            "start" => Some(&self.start),
            "end" => Some(&self.end),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: String) -> Result<(), ApiError> {
        let slot = match field {
            "designation" => &mut self.designation,
            "company" => &mut self.company,
            "start" => &mut self.start,
            "end" => &mut self.end,
            other => return Err(ApiError::Internal(format!("unknown career field '{}'", other))),
        };
        *slot = value;
        Ok(())
    }
}

// ============================================================================
// ENTRY LIST
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryList<T> {
    rows: Vec<T>,
}

impl<T: EntryRecord> EntryList<T> {
    /// Empty list
    pub fn new() -> Self {
        EntryList { rows: Vec::new() }
    }

    /// One blank row, which is what a freshly mounted form shows
    pub fn with_blank() -> Self {
        EntryList {
            rows: vec![T::default()],
        }
    }

    pub fn from_rows(rows: Vec<T>) -> Self {
        EntryList { rows }
    }

    /// Add one blank row at the tail
    pub fn append(&mut self) {
        self.rows.push(T::default());
    }

    /// Mutate one field of one row in place
    pub fn update_field(&mut self, index: usize, field: &str, value: impl Into<String>) -> Result<(), ApiError> {
        let len = self.rows.len();
        let row = self.rows.get_mut(index).ok_or_else(|| {
            ApiError::Internal(format!("entry index {} out of range (len {})", index, len))
        })?;
        row.set(field, value.into())
    }

    /// Delete a row; later rows shift down by one.
    ///
    /// Removing the last remaining row leaves the list empty.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index < self.rows.len() {
            Some(self.rows.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when there is nothing worth sending (no rows, or only blank rows)
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(EntryRecord::is_blank)
    }

    /// Values of one field across all rows, in order
    pub fn column(&self, field: &str) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(field).unwrap_or_default().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn education(institute: &str, degree: &str) -> EducationRecord {
        EducationRecord {
            institute: institute.to_string(),
            degree: degree.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_with_blank_starts_with_one_row() {
        let list: EntryList<EducationRecord> = EntryList::with_blank();
        assert_eq!(list.len(), 1);
        assert!(list.is_blank());
    }

    #[test]
    fn test_update_field_touches_only_target() {
        let mut list = EntryList::from_rows(vec![
            education("IIT", "BTech"),
            education("IIM", "MBA"),
            education("DU", "BA"),
        ]);
        let before = list.clone();

        list.update_field(1, "fieldOfStudy", "Finance").unwrap();

        assert_eq!(list.get(1).unwrap().field_of_study, "Finance");
        assert_eq!(list.get(1).unwrap().institute, "IIM");
        assert_eq!(list.get(1).unwrap().degree, "MBA");
        assert_eq!(list.get(0), before.get(0));
        assert_eq!(list.get(2), before.get(2));
    }

    #[test]
    fn test_update_field_out_of_range() {
        let mut list: EntryList<CareerRecord> = EntryList::with_blank();
        assert!(list.update_field(3, "company", "Acme").is_err());
        assert!(list.update_field(0, "salary", "lots").is_err());
    }

    #[test]
    fn test_append_then_remove_tail_restores_list() {
        let mut list = EntryList::from_rows(vec![education("IIT", "BTech")]);
        let before = list.clone();

        list.append();
        assert_eq!(list.len(), 2);
        list.remove(list.len() - 1);

        assert_eq!(list, before);
    }

    #[test]
    fn test_remove_shifts_later_rows() {
        let mut list = EntryList::from_rows(vec![
            education("A", "1"),
            education("B", "2"),
            education("C", "3"),
        ]);

        let removed = list.remove(0).unwrap();
        assert_eq!(removed.institute, "A");
        assert_eq!(list.column("institute"), vec!["B", "C"]);
    }

    #[test]
    fn test_remove_last_row_leaves_empty_list() {
        let mut list: EntryList<CareerRecord> = EntryList::with_blank();
        list.remove(0);
        assert!(list.is_empty());
        assert!(list.remove(0).is_none());
    }

    #[test]
    fn test_column_keeps_empty_cells() {
        let mut list: EntryList<CareerRecord> = EntryList::with_blank();
        list.update_field(0, "company", "Acme").unwrap();
        list.append();

        assert_eq!(list.column("company"), vec!["Acme", ""]);
        assert_eq!(list.column("designation"), vec!["", ""]);
    }
}
