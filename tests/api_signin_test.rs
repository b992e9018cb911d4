//! Integration tests for the sign-in API endpoint

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::test_app;

    /// Tests the sign-in endpoint rejects requests without a JSON body
    #[tokio::test]
    #[serial]
    async fn it_rejects_missing_json_body() {
        let app = test_app().await;

        // No content-type header at all
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/signin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    /// Tests the sign-in endpoint rejects malformed JSON
    #[tokio::test]
    #[serial]
    async fn it_rejects_malformed_json() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/signin")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Tests an email override with no stored credentials fails in setup
    #[tokio::test]
    #[serial]
    async fn it_returns_422_for_unknown_mailbox() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/signin")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email": "ghost@example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["stage"], "setup");
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .contains("ghost@example.com")
        );
    }

    /// Tests the email override takes precedence over a mapped device
    #[tokio::test]
    #[serial]
    async fn it_prefers_email_override_over_device_mapping() {
        let app = test_app().await;

        // living-room-tv maps to a known mailbox, but the override points at
        // an unknown one, so the override must be what fails
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/signin")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"device": "living-room-tv", "email": "other@example.com"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .contains("other@example.com")
        );
    }
}
