use std::io;

/// Error type shared by the request helpers.
///
/// The connection loop never surfaces these to clients directly; every fault
/// collapses to a status code plus a short text body. Handlers receive them
/// from the multipart and JSON helpers and pick the status themselves.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    /// The request carries no `multipart/*` content type, or the boundary
    /// parameter is missing.
    #[error("request body is not multipart")]
    NotMultipart,

    #[error("malformed multipart payload: {0}")]
    Multipart(String),

    #[error("file {0} not found in form data")]
    FileNotFound(String),

    #[error("failed to save file: {0}")]
    Save(#[source] io::Error),

    #[error("json parse failure: {0}")]
    Json(#[from] serde_json::Error),
}
