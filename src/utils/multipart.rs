// src/utils/multipart.rs

use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};

use crate::{error::AppError, services::uploads::IncomingFile};

/// A multipart body split into text fields and file parts.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, IncomingFile)>,
}

impl FormData {
    /// Drains the whole request body.
    /// File inputs submitted without a selected file are skipped.
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.push((
                        name,
                        IncomingFile {
                            file_name,
                            content_type,
                            data,
                        },
                    ));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Text field value, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Every file sent under `name`, in submission order.
    pub fn files_named(&self, name: &str) -> Vec<IncomingFile> {
        self.files
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, file)| file.clone())
            .collect()
    }
}

/// Reads a multipart request; a non-multipart body is a 400.
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        FormData::read(multipart).await
    }
}
