#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object at the document root, found {found}")]
    NotAnObject { found: &'static str },
}
