use axum::extract::Multipart;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::images::Upload;

/// Name of the single file field accepted on upload forms.
pub const IMAGE_FIELD: &str = "image";

/// A decoded multipart form: text fields by name plus the optional
/// `image` file.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    pub image: Option<Upload>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Form::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) if name == IMAGE_FIELD => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen.
                    if !bytes.is_empty() || !file_name.is_empty() {
                        form.image = Some(Upload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                Some(file_name) => {
                    tracing::debug!("Ignoring unexpected file field {} ({})", name, file_name);
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}
