/// Status-coded failure from the resource store.
///
/// `404` and `409` are the two codes callers branch on, so they are exposed
/// through dedicated predicates rather than left to string matching.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{reason} ({code}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn api(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Api {
            code,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::api(404, "NotFound", format!("{} \"{}\" not found", kind, name))
    }

    pub fn already_exists(kind: &str, name: &str) -> Self {
        Self::api(
            409,
            "AlreadyExists",
            format!("{} \"{}\" already exists", kind, name),
        )
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            ClientError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.code() == Some(409)
    }
}

/// Narrowed tolerance adapters: only the named status code is absorbed.
pub trait ClientResultExt<T> {
    /// `404` becomes `Ok(None)`.
    fn or_not_found(self) -> ClientResult<Option<T>>;
    /// `409` becomes `Ok(None)`.
    fn or_conflict(self) -> ClientResult<Option<T>>;
}

impl<T> ClientResultExt<T> for ClientResult<T> {
    fn or_not_found(self) -> ClientResult<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn or_conflict(self) -> ClientResult<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_conflict() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
