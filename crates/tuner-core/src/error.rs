use thiserror::Error;

/// Terminal failure reasons for a directory fetch.
///
/// The UI only ever sees these through `FetchResult::Failure`; raw reqwest
/// or serde errors never cross the client boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never produced a usable response (connect error, timeout,
    /// aborted body read).
    #[error("transport error: {0}")]
    Transport(String),
    /// The body was valid enough to reach the decoder but does not match the
    /// station schema.  Malformed-JSON bodies take the fallback path instead
    /// and never surface here.
    #[error("malformed station payload: {0}")]
    Decode(String),
}
