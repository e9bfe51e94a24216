#[cfg(test)]
pub mod fixtures {
    use base64::Engine;
    use serde::Serialize;
    use serde_json::Map;
    use serde_json::json;
    use std::future::Future;
    use tokio::time::Duration;
    use tokio::time::timeout;

    fn b64url_no_pad(bytes: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn make_test_jwt(exp: Option<i64>) -> String {
        #[derive(Serialize)]
        struct Header {
            alg: &'static str,
            typ: &'static str,
        }
        let header = Header {
            alg: "none",
            typ: "JWT",
        };

        let mut payload = Map::new();
        payload.insert("sub".to_string(), json!("user-12345"));
        payload.insert("email".to_string(), json!("user@example.com"));
        payload.insert("email_verified".to_string(), json!(true));
        if let Some(exp) = exp {
            payload.insert("exp".to_string(), json!(exp));
        }

        let header_b64 = b64url_no_pad(&serde_json::to_vec(&header).unwrap());
        let payload_b64 = b64url_no_pad(&serde_json::to_vec(&payload).unwrap());
        let signature_b64 = b64url_no_pad(b"sig");
        format!("{header_b64}.{payload_b64}.{signature_b64}")
    }

    /// A token whose `exp` is `seconds` from the wall clock.
    pub fn jwt_expiring_in(seconds: i64) -> String {
        make_test_jwt(Some(chrono::Utc::now().timestamp() + seconds))
    }

    pub async fn await_with_timeout<F, T>(duration: Duration, future: F, context: &str) -> T
    where
        F: Future<Output = T>,
    {
        timeout(duration, future)
            .await
            .unwrap_or_else(|_| panic!("{context} timed out after {duration:?}"))
    }
}
