//! Status classification and body decoding shared by resource kinds.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ApiError, ApiRequest, ApiResponse, Transport};

const NOT_FOUND: u16 = 404;

/// Structured error bodies returned by the control planes. VPC-style APIs
/// return an `errors` array, Functions-style APIs a single `error` string.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Sends `request`, mapping 404 to [`ApiError::NotFound`] and any other
/// non-success status to [`ApiError::Status`].
pub(crate) async fn execute<T>(transport: &T, request: ApiRequest) -> Result<ApiResponse, ApiError>
where
    T: Transport + ?Sized,
{
    let method = request.method;
    let path = request.path.clone();
    let response = transport.send(request).await?;
    if response.is_success() {
        return Ok(response);
    }
    if response.status == NOT_FOUND {
        return Err(ApiError::NotFound { resource: path });
    }
    Err(ApiError::Status {
        method: method.as_str(),
        path,
        status: response.status,
        message: error_message(&response.body),
    })
}

/// Decodes a JSON success body.
pub(crate) fn decode<D: DeserializeOwned>(response: &ApiResponse, path: &str) -> Result<D, ApiError> {
    serde_json::from_slice(&response.body).map_err(|err| ApiError::Decode {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

fn error_message(body: &[u8]) -> String {
    let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) else {
        return String::from_utf8_lossy(body).into_owned();
    };
    let entries: Vec<String> = parsed
        .errors
        .into_iter()
        .map(|entry| match entry.code {
            Some(code) => format!("{code}: {}", entry.message),
            None => entry.message,
        })
        .collect();
    if !entries.is_empty() {
        return entries.join("; ");
    }
    parsed
        .error
        .or(parsed.description)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
