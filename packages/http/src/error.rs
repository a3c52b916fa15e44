use crate::scheduler::ContextId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Caller context {0} is not live")]
    UnknownContext(ContextId),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("Failed to start transport runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
