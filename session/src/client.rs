use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::error::SessionError;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Tokens returned by `/login` and `/refresh`. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// HTTP side of the session: the authentication and refresh endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    config: ClientConfig,
}

pub fn create_client(config: &ClientConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|err| SessionError::Http(err.to_string()))
}

impl AuthClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = create_client(&config)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let url = self.config.endpoint("/login");
        debug!("POST {url}");
        let response = self
            .http
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|err| SessionError::AuthFailed(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::AuthFailed(format!(
                "login returned {}",
                response.status()
            )));
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|err| SessionError::AuthFailed(err.to_string()))
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<TokenResponse> {
        let url = self.config.endpoint("/refresh");
        debug!("POST {url}");
        let mut request = self.http.post(url).json(&RefreshRequest { refresh_token });
        if let Some(access_token) = access_token {
            request = request.header(AUTHORIZATION, format!("Bearer {access_token}"));
        }
        let response = request
            .send()
            .await
            .map_err(|err| SessionError::RefreshFailed(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::RefreshFailed(format!(
                "refresh returned {}",
                response.status()
            )));
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|err| SessionError::RefreshFailed(err.to_string()))
    }
}
