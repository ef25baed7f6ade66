use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::{AppError, AppResult};
use crate::media::Upload;

/// Text fields plus at most one file from a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Drain a multipart body, keeping text fields and the file sent as `file_field`.
/// A file input left empty by the browser arrives with an empty filename and is dropped.
pub async fn read_upload_form(mut multipart: Multipart, file_field: &str) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Upload failed: {}", e)))?;
            if !filename.is_empty() {
                form.file = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Malformed form data: {}", e)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
