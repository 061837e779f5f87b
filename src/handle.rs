use crate::error::DriverError;

/// Opaque string addressing a submitted application:
/// `backend "://" session "/" app_id`. All three segments are non-empty
/// and do not contain `/` (spec §6).
pub type AppHandle = String;

/// Concatenates `"{backend}://{session}/{app_id}"`.
pub fn make(backend: &str, session: &str, app_id: &str) -> AppHandle {
    format!("{backend}://{session}/{app_id}")
}

/// Parses a handle into `(backend, session, app_id)`, failing with
/// [`DriverError::MalformedAppHandle`] if the scheme is missing, either
/// segment is empty, or extra path components are present.
pub fn parse(handle: &str) -> Result<(String, String, String), DriverError> {
    let malformed = || DriverError::MalformedAppHandle(handle.to_string());

    let (backend, rest) = handle.split_once("://").ok_or_else(malformed)?;
    if backend.is_empty() {
        return Err(malformed());
    }

    let (session, app_id) = rest.split_once('/').ok_or_else(malformed)?;
    if session.is_empty() || app_id.is_empty() {
        return Err(malformed());
    }
    if app_id.contains('/') {
        return Err(malformed());
    }

    Ok((backend.to_string(), session.to_string(), app_id.to_string()))
}
