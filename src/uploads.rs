use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::extract::Multipart;

use crate::{
    error::{AppError, AppResult},
    rollback::RollbackLog,
    storage::random_id,
};

const IMAGE_SUBTYPES: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "svg+xml"];

/// An uploaded file written to the staging directory.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub field: String,
    pub path: PathBuf,
    pub original_name: String,
    pub content_type: String,
}

/// Text fields and staged files of one multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    pub files: Vec<StagedFile>,
}

pub fn is_image(content_type: &str) -> bool {
    content_type
        .strip_prefix("image/")
        .map(|subtype| IMAGE_SUBTYPES.contains(&subtype.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Drain a multipart body. Files are written under `upload_dir` with a random
/// 6-character prefix and registered on `rollback` so a failed request removes
/// them. Non-image files are rejected.
pub async fn stage_multipart(
    mut multipart: Multipart,
    upload_dir: &Path,
    rollback: &RollbackLog,
) -> AppResult<MultipartForm> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut form = MultipartForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::bad_request(format!("invalid field {name}: {e}")))?;
            form.fields.insert(name, value);
            continue;
        };

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !is_image(&content_type) {
            return Err(AppError::bad_request(format!(
                "invalid file format for {file_name}"
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("invalid file {file_name}: {e}")))?;

        let path = upload_dir.join(format!(
            "{}_{}",
            random_id(6),
            sanitize_file_name(&file_name)
        ));
        rollback.delete_staged_file(&path);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        form.files.push(StagedFile {
            field: name,
            path,
            original_name: file_name,
            content_type,
        });
    }

    Ok(form)
}

impl MultipartForm {
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> AppResult<&str> {
        self.text(key)
            .ok_or_else(|| AppError::Validation(vec![format!("{key}: is required")]))
    }

    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> AppResult<Option<T>> {
        match self.text(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::Validation(vec![format!("{key}: invalid value")])),
        }
    }

    /// The single file posted under `field`, if any. More than one is rejected.
    pub fn single_file(&self, field: &str) -> AppResult<Option<&StagedFile>> {
        let mut matching = self.files.iter().filter(|f| f.field == field);
        let first = matching.next();
        if matching.next().is_some() {
            return Err(AppError::bad_request(format!(
                "only one {field} file is allowed"
            )));
        }
        Ok(first)
    }

    pub fn files_for(&self, field: &str) -> Vec<&StagedFile> {
        self.files.iter().filter(|f| f.field == field).collect()
    }

    #[cfg(test)]
    pub fn with_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            files: Vec::new(),
        }
    }
}

/// Remove staged files once they have been copied into the asset store.
pub async fn remove_staged(files: &[StagedFile]) {
    for file in files {
        if let Err(err) = tokio::fs::remove_file(&file.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %file.path.display(), error = %err, "failed to remove staged upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_subtypes_are_accepted() {
        assert!(is_image("image/png"));
        assert!(is_image("image/JPEG"));
        assert!(is_image("image/svg+xml"));
        assert!(!is_image("image/tiff"));
        assert!(!is_image("application/pdf"));
        assert!(!is_image("text/plain"));
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[test]
    fn form_text_and_parse() {
        let form = MultipartForm::with_fields([("name", " Phones "), ("stock", "12"), ("blank", " ")]);
        assert_eq!(form.text("name"), Some("Phones"));
        assert_eq!(form.text("blank"), None);
        assert_eq!(form.parse::<i32>("stock").unwrap(), Some(12));
        assert!(form.parse::<i32>("name").is_err());
        assert!(matches!(form.require("missing"), Err(AppError::Validation(_))));
    }
}
