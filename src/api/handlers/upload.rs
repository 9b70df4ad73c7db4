use crate::AppState;
use crate::api::error::AppError;
use crate::services::storage::StoredFile;
use crate::templates::UploadFormTemplate;
use askama::Template;
use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

pub const FILE_FIELD: &str = "file";
pub const STORED_FILENAME_HEADER: HeaderName = HeaderName::from_static("x-stored-filename");

/// Result of handling one upload POST
#[derive(Debug)]
pub enum UploadOutcome {
    NoFilePart,
    NoSelectedFile,
    Uploaded { filename: String, stored: StoredFile },
}

impl UploadOutcome {
    pub fn message(&self) -> String {
        match self {
            UploadOutcome::NoFilePart => "No file part".to_string(),
            UploadOutcome::NoSelectedFile => "No selected file".to_string(),
            UploadOutcome::Uploaded { filename, .. } => {
                format!("File uploaded successfully: {}", filename)
            }
        }
    }

    /// Client-error outcomes answer 200 unless `strict_status` is set.
    pub fn into_reply(self, strict_status: bool) -> Response {
        let status = match self {
            UploadOutcome::NoFilePart | UploadOutcome::NoSelectedFile if strict_status => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::OK,
        };
        let message = self.message();

        let mut response = (status, message).into_response();
        if let UploadOutcome::Uploaded { stored, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&stored.name) {
                response.headers_mut().insert(STORED_FILENAME_HEADER, value);
            }
        }
        response
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Upload form", content_type = "text/html", body = String)
    ),
    tag = "upload"
)]
pub async fn upload_form(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = UploadFormTemplate::from_config(&state.config)
        .render()
        .map_err(|e| AppError::Internal(format!("Failed to render upload form: {}", e)))?;
    Ok(Html(page))
}

#[utoipa::path(
    post,
    path = "/",
    request_body(content = String, description = "Multipart form with a `file` part", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "\"No file part\", \"No selected file\" or \"File uploaded successfully: <filename>\"", content_type = "text/plain", body = String),
        (status = 400, description = "Rejected filename, malformed multipart body, or a client error with strict status enabled"),
        (status = 409, description = "File exists and the collision policy is reject"),
        (status = 500, description = "Filesystem failure")
    ),
    tag = "upload"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let outcome = match multipart {
        Ok(multipart) => receive_upload(&state, multipart).await?,
        // Not a multipart body at all, so there is no file part to find
        Err(rejection) => {
            debug!("Upload without multipart body: {}", rejection.body_text());
            UploadOutcome::NoFilePart
        }
    };

    Ok(outcome.into_reply(state.config.strict_status))
}

async fn receive_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<UploadOutcome, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        // A `file` field without a filename parameter is a plain form value
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };

        if filename.is_empty() {
            return Ok(UploadOutcome::NoSelectedFile);
        }

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        let stored = state.storage.store(&filename, Box::new(reader)).await?;

        info!(
            "📁 Uploaded '{}' as {} ({} bytes)",
            filename,
            stored.path.display(),
            stored.size
        );

        return Ok(UploadOutcome::Uploaded { filename, stored });
    }

    Ok(UploadOutcome::NoFilePart)
}
