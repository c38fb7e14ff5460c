// src/handlers/form.rs

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::{common::error::AppError, models::support::IncomingFile};

/// A multipart body drained into memory: text fields by name and file
/// parts in arrival order.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, IncomingFile)>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?.to_vec();
                    form.files.push((name, IncomingFile { file_name, bytes }));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// Trimmed text value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::bad_request(format!("The '{}' field is required.", name)))
    }

    /// First file sent under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<IncomingFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    /// Every file sent under `name` or `name[]`.
    pub fn take_files(&mut self, name: &str) -> Vec<IncomingFile> {
        let array_name = format!("{}[]", name);
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name || *field == array_name);
        self.files = rest;
        taken.into_iter().map(|(_, file)| file).collect()
    }
}

#[cfg(test)]
impl FormData {
    pub fn from_parts(fields: &[(&str, &str)], files: Vec<(&str, IncomingFile)>) -> Self {
        Self {
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            files: files.into_iter().map(|(k, f)| (k.to_string(), f)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> IncomingFile {
        IncomingFile { file_name: name.into(), bytes: vec![1, 2, 3] }
    }

    #[test]
    fn blank_text_is_absent() {
        let form = FormData::from_parts(&[("subject", "  "), ("priority", " high ")], vec![]);
        assert_eq!(form.text("subject"), None);
        assert_eq!(form.text("priority"), Some("high"));
        assert!(matches!(form.required_text("subject"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn files_are_taken_by_field_name() {
        let mut form = FormData::from_parts(
            &[],
            vec![("attachments[]", file("a.png")), ("file", file("data.csv")), ("attachments", file("b.pdf"))],
        );
        assert_eq!(form.take_file("file").map(|f| f.file_name), Some("data.csv".to_string()));
        assert!(form.take_file("file").is_none());

        let names: Vec<_> = form.take_files("attachments").into_iter().map(|f| f.file_name).collect();
        assert_eq!(names, vec!["a.png", "b.pdf"]);
        assert!(form.take_files("attachments").is_empty());
    }
}
