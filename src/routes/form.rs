//! Body extractor accepting either JSON or `multipart/form-data`.
//!
//! Multipart text parts are folded into a JSON object (a repeated name
//! becomes an array) and deserialized into `T`, so handlers see the same
//! typed form either way. Parts carrying a file name are kept as uploads,
//! keyed by field name.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::AppError;
use crate::media::Upload;

#[derive(Debug)]
pub struct FormData<T> {
    pub fields: T,
    pub files: HashMap<String, Upload>,
}

impl<T> FormData<T> {
    /// Take the upload sent under `name`, if any.
    pub fn file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

fn push_field(map: &mut Map<String, Value>, name: String, value: String) {
    match map.get_mut(&name) {
        None => {
            map.insert(name, Value::String(value));
        }
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Map<String, Value>, HashMap<String, Upload>), AppError> {
    let mut fields = Map::new();
    let mut files = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;

                // Browsers send an empty part when no file was picked.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }

                files.insert(
                    name,
                    Upload {
                        file_name: Some(file_name),
                        content_type,
                        bytes,
                    },
                );
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                push_field(&mut fields, name, text);
            }
        }
    }

    Ok((fields, files))
}

impl<T, S> FromRequest<S> for FormData<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(fields) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            return Ok(Self {
                fields,
                files: HashMap::new(),
            });
        }

        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        let (map, files) = read_multipart(multipart).await?;
        let fields = serde_json::from_value(Value::Object(map))
            .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e)))?;

        Ok(Self { fields, files })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    pub(crate) const BOUNDARY: &str = "X-FORM-BOUNDARY";

    /// Build a multipart body from text fields and `(field, file name, bytes)` files.
    pub(crate) fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        for (name, file_name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub(crate) fn multipart_content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn test_repeated_fields_become_arrays() {
        let mut map = Map::new();
        push_field(&mut map, "tags".to_string(), "a".to_string());
        push_field(&mut map, "tags".to_string(), "b".to_string());
        push_field(&mut map, "tags".to_string(), "c".to_string());
        push_field(&mut map, "name".to_string(), "x".to_string());

        assert_eq!(map["tags"], serde_json::json!(["a", "b", "c"]));
        assert_eq!(map["name"], serde_json::json!("x"));
    }

    #[tokio::test]
    async fn test_json_body() {
        let req = axum::http::Request::post("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"ada","tags":["x"]}"#))
            .unwrap();
        let form = FormData::<Sample>::from_request(req, &()).await.unwrap();
        assert_eq!(form.fields.name, "ada");
        assert_eq!(form.fields.tags, vec!["x"]);
        assert!(form.files.is_empty());
    }

    #[tokio::test]
    async fn test_multipart_body_with_file() {
        let body = multipart_body(
            &[("name", "ada"), ("tags", "x"), ("tags", "y")],
            &[("image", "a.png", &b"png-bytes"[..]), ("empty", "", &b""[..])],
        );
        let req = axum::http::Request::post("/")
            .header(CONTENT_TYPE, multipart_content_type())
            .body(Body::from(body))
            .unwrap();

        let mut form = FormData::<Sample>::from_request(req, &()).await.unwrap();
        assert_eq!(form.fields.name, "ada");
        assert_eq!(form.fields.tags, vec!["x", "y"]);

        let image = form.file("image").unwrap();
        assert_eq!(image.file_name.as_deref(), Some("a.png"));
        assert_eq!(&image.bytes[..], b"png-bytes");
        assert!(form.file("empty").is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let req = axum::http::Request::post("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let err = FormData::<Sample>::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
