//! Response classification.
//!
//! The booth server has no structured status: an upload counts only when the
//! raw body is exactly the success sentinel. Whitespace, casing or encoding
//! differences are failures.

use super::TransportResponse;
use crate::error::UploaderError;
use crate::upload_queue::types::{FailureReason, SUCCESS_SENTINEL};

/// Longest body excerpt kept in a failure reason
const MAX_BODY_EXCERPT: usize = 200;

/// Classify a server response. `Ok(())` means the upload was confirmed.
pub fn classify_response(response: &TransportResponse) -> Result<(), FailureReason> {
    if !(200..300).contains(&response.status) {
        return Err(FailureReason::BadStatus(response.status));
    }

    if is_success_body(&response.body) {
        Ok(())
    } else {
        Err(FailureReason::UnexpectedBody(body_excerpt(&response.body)))
    }
}

/// Byte-exact comparison against the sentinel
pub fn is_success_body(body: &[u8]) -> bool {
    body == SUCCESS_SENTINEL.as_bytes()
}

/// Fold a transport-level error into a failure reason
pub fn classify_error(error: &UploaderError) -> FailureReason {
    match error {
        UploaderError::UnexpectedStatus { status, .. } => FailureReason::BadStatus(*status),
        other => FailureReason::Transport(other.to_string()),
    }
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= MAX_BODY_EXCERPT {
        text.into_owned()
    } else {
        let mut excerpt: String = text.chars().take(MAX_BODY_EXCERPT).collect();
        excerpt.push('…');
        excerpt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_with(body: &str) -> TransportResponse {
        TransportResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_exact_sentinel_is_success() {
        assert_eq!(classify_response(&ok_with("OK, photo received.")), Ok(()));
    }

    #[test]
    fn test_near_misses_are_failures() {
        for body in [
            "OK, photo received",
            "ok, photo received.",
            "OK, photo received. ",
            " OK, photo received.",
            "OK, photo received.\n",
            "",
        ] {
            assert!(
                matches!(
                    classify_response(&ok_with(body)),
                    Err(FailureReason::UnexpectedBody(_))
                ),
                "body {:?} should not count as success",
                body
            );
        }
    }

    #[test]
    fn test_non_utf8_lookalike_is_failure() {
        // UTF-16LE encoding of the sentinel
        let body: Vec<u8> = SUCCESS_SENTINEL
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        assert!(!is_success_body(&body));
    }

    #[test]
    fn test_error_status_with_sentinel_is_failure() {
        let response = TransportResponse {
            status: 500,
            body: SUCCESS_SENTINEL.as_bytes().to_vec(),
        };
        assert_eq!(classify_response(&response), Err(FailureReason::BadStatus(500)));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        match classify_response(&ok_with(&body)) {
            Err(FailureReason::UnexpectedBody(excerpt)) => {
                assert_eq!(excerpt.chars().count(), MAX_BODY_EXCERPT + 1);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_error() {
        let err = UploaderError::UnexpectedStatus {
            status: 502,
            body: String::new(),
        };
        assert_eq!(classify_error(&err), FailureReason::BadStatus(502));

        let err = UploaderError::Upload("connection reset".to_string());
        assert!(matches!(classify_error(&err), FailureReason::Transport(msg) if msg.contains("connection reset")));
    }
}
