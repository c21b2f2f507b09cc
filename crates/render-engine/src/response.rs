//! Mapping job outcomes to wire responses.

use bytes::Bytes;
use pipmerge_common::error::PipmergeError;
use serde::Serialize;

use crate::delivery::Delivered;

pub const CONTENT_TYPE_MP4: &str = "video/mp4";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A transport-neutral response: status, content type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Bytes,
}

#[derive(Serialize)]
struct UploadedBody<'a> {
    success: bool,
    url: &'a str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl JobResponse {
    pub fn from_result(result: &Result<Delivered, PipmergeError>) -> Self {
        match result {
            Ok(delivered) => Self::success(delivered),
            Err(err) => Self::failure(err),
        }
    }

    pub fn success(delivered: &Delivered) -> Self {
        match delivered {
            Delivered::Inline(bytes) => Self {
                status: 200,
                content_type: CONTENT_TYPE_MP4,
                body: bytes.clone(),
            },
            Delivered::Uploaded { url } => Self::json(
                200,
                &UploadedBody {
                    success: true,
                    url,
                },
            ),
        }
    }

    pub fn failure(err: &PipmergeError) -> Self {
        Self::error(err.status_code(), &err.public_message())
    }

    /// Response for a disallowed request method.
    pub fn method_not_allowed() -> Self {
        Self::error(405, "Method not allowed")
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, &ErrorBody { error: message })
    }

    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        // Serialising these flat string structs cannot fail.
        let body = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: CONTENT_TYPE_JSON,
            body: Bytes::from(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipmerge_job_model::JobError;

    fn json(response: &JobResponse) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn test_inline_success_is_raw_video() {
        let response = JobResponse::from_result(&Ok(Delivered::Inline(Bytes::from_static(b"mp4"))));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "video/mp4");
        assert_eq!(response.body, Bytes::from_static(b"mp4"));
    }

    #[test]
    fn test_uploaded_success_is_json_locator() {
        let response = JobResponse::from_result(&Ok(Delivered::Uploaded {
            url: "https://cdn.test/abc.mp4".to_string(),
        }));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
        assert_eq!(
            json(&response),
            serde_json::json!({"success": true, "url": "https://cdn.test/abc.mp4"})
        );
    }

    #[test]
    fn test_failures_map_status_and_message() {
        let bad: PipmergeError = JobError::MissingField {
            field: "overlayUrl",
        }
        .into();
        let response = JobResponse::failure(&bad);
        assert_eq!(response.status, 400);
        assert!(json(&response)["error"].as_str().unwrap().contains("overlayUrl"));

        let download = PipmergeError::download("https://media.test/ov.mp4", "HTTP 404 Not Found");
        let response = JobResponse::failure(&download);
        assert_eq!(response.status, 500);
        assert!(!response.is_success());
        let message = json(&response)["error"].as_str().unwrap().to_string();
        assert!(message.contains("https://media.test/ov.mp4"));
        assert!(message.contains("404"));
    }

    #[test]
    fn test_method_not_allowed() {
        let response = JobResponse::method_not_allowed();
        assert_eq!(response.status, 405);
        assert_eq!(json(&response)["error"], "Method not allowed");
    }

    #[test]
    fn test_workspace_errors_do_not_leak_paths() {
        let err = PipmergeError::workspace("failed to create /tmp/pipmerge/job-1: denied");
        let response = JobResponse::failure(&err);
        let body = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(!body.contains("/tmp/pipmerge"));
        assert_eq!(response.status, 500);
    }
}
