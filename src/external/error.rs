use thiserror::Error;

pub type ExternalResult<T> = std::result::Result<T, ExternalError>;

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("{service} answered {status}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("url error: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("{service} response is missing `{field}`")]
    MissingField {
        service: &'static str,
        field: &'static str,
    },
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ExternalError {
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::UnexpectedStatus {
            service,
            status,
            body,
        }
    }
}
