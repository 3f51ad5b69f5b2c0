//! Three-legged token exchange against the provider.
//!
//! The client performs the provider-facing half of the authorization flow:
//! request-token issuance, authorize-URL construction, and the
//! verifier-to-access-token exchange. It never touches session state; the
//! caller stores what it returns.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use url::Url;

use ledgerlink_config::{AppConfig, AppType};

use crate::error::{AuthError, AuthResult};
use crate::scope::Scope;
use crate::session::{AccessTokenPair, RequestToken};
use crate::signing::{self, SignatureMethod, SigningContext};

/// Timeout applied to every provider call. A timeout surfaces as the
/// retryable `ProviderUnavailable`.
pub(crate) const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Extracts the structured `oauth_problem` / `oauth_problem_advice` fields
/// from a provider error body, if present.
pub(crate) fn oauth_problem(body: &str) -> Option<(String, String)> {
    let mut problem = None;
    let mut advice = String::new();
    for (k, v) in url::form_urlencoded::parse(body.as_bytes()) {
        match k.as_ref() {
            "oauth_problem" => problem = Some(v.into_owned()),
            "oauth_problem_advice" => advice = v.into_owned(),
            _ => {}
        }
    }
    problem.map(|p| (p, advice))
}

/// Parses an `oauth_token=...&oauth_token_secret=...` response body.
fn parse_token_response(body: &str) -> Option<(String, String)> {
    let mut token = None;
    let mut secret = None;
    for (k, v) in url::form_urlencoded::parse(body.as_bytes()) {
        match k.as_ref() {
            "oauth_token" => token = Some(v.into_owned()),
            "oauth_token_secret" => secret = Some(v.into_owned()),
            _ => {}
        }
    }
    Some((token?, secret?))
}

/// Signature method for the active application type.
pub(crate) fn signature_method(app_type: AppType) -> SignatureMethod {
    match app_type {
        AppType::Public => SignatureMethod::HmacSha1,
        AppType::Partner => SignatureMethod::RsaSha1,
    }
}

/// Provider-facing authorization client.
///
/// Cheap to share: holds the immutable configuration and a pooled HTTP
/// client. All per-session state stays with the caller.
#[derive(Debug, Clone)]
pub struct AuthorizationClient {
    config: Arc<AppConfig>,
    http: reqwest::Client,
}

impl AuthorizationClient {
    /// Creates a client from the loaded configuration.
    pub fn new(config: Arc<AppConfig>) -> AuthResult<Self> {
        let user_agent = config
            .credentials()
            .map(|c| c.user_agent.clone())
            .map_err(|e| AuthError::Internal {
                message: e.to_string(),
            })?;
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { config, http })
    }

    fn signing_context<'a>(
        &'a self,
        token: Option<&'a str>,
        token_secret: Option<&'a str>,
    ) -> AuthResult<SigningContext<'a>> {
        let creds = self.config.credentials().map_err(|e| AuthError::Internal {
            message: e.to_string(),
        })?;
        Ok(SigningContext {
            consumer_key: &creds.consumer_key,
            consumer_secret: &creds.consumer_secret,
            method: signature_method(self.config.app_type),
            private_key_pem: &creds.private_key,
            token,
            token_secret,
        })
    }

    /// First leg: obtains a temporary request token pair.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProviderUnavailable`] on transport failures, timeouts,
    /// 5xx responses or malformed bodies; a structured provider problem is
    /// carried through as-is.
    pub async fn request_token(&self) -> AuthResult<RequestToken> {
        let creds = self.config.credentials().map_err(|e| AuthError::Internal {
            message: e.to_string(),
        })?;
        let url = Url::parse(&self.config.endpoints.request_token_url).map_err(|e| {
            AuthError::Internal {
                message: format!("bad request_token_url: {e}"),
            }
        })?;
        let ctx = self.signing_context(None, None)?;
        let header = signing::authorization_header(
            "POST",
            &url,
            &[("oauth_callback", &creds.authorize_callback_url)],
            &ctx,
        )?;

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, header)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_exchange_failure(status, &body));
        }
        let (token, secret) =
            parse_token_response(&body).ok_or_else(|| AuthError::ProviderUnavailable {
                message: "malformed request token response".to_string(),
            })?;
        tracing::debug!(token = %token, "request token issued");
        Ok(RequestToken { token, secret })
    }

    /// Second leg: builds the user-facing authorize redirect URL.
    ///
    /// Pure function of its inputs; an empty scope requests full accounting
    /// access.
    pub fn build_authorize_url(&self, token: &str, scope: &Scope) -> AuthResult<Url> {
        let mut url =
            Url::parse(&self.config.endpoints.authorize_url).map_err(|e| AuthError::Internal {
                message: format!("bad authorize_url: {e}"),
            })?;
        url.query_pairs_mut().append_pair("oauth_token", token);
        if !scope.is_empty() {
            url.query_pairs_mut()
                .append_pair("scope", &scope.to_string());
        }
        Ok(url)
    }

    /// Third leg: exchanges an approved request token plus verifier for an
    /// access token pair.
    ///
    /// Callers must have matched the callback token against the session's
    /// pending request token before invoking this; a mismatch never reaches
    /// the provider.
    ///
    /// # Errors
    ///
    /// [`AuthError::VerificationFailed`] when the provider refuses the
    /// exchange, [`AuthError::ProviderUnavailable`] on transport failures.
    pub async fn exchange_verifier(
        &self,
        request: &RequestToken,
        verifier: &str,
    ) -> AuthResult<AccessTokenPair> {
        let url = Url::parse(&self.config.endpoints.access_token_url).map_err(|e| {
            AuthError::Internal {
                message: format!("bad access_token_url: {e}"),
            }
        })?;
        let ctx = self.signing_context(Some(&request.token), Some(&request.secret))?;
        let header =
            signing::authorization_header("POST", &url, &[("oauth_verifier", verifier)], &ctx)?;

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, header)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            if let Some((problem, advice)) = oauth_problem(&body) {
                return Err(AuthError::from_provider_problem(&problem, &advice));
            }
            if status.is_server_error() {
                return Err(AuthError::ProviderUnavailable {
                    message: format!("access token endpoint returned {status}"),
                });
            }
            return Err(AuthError::VerificationFailed {
                message: format!("access token endpoint returned {status}"),
            });
        }
        let (token, secret) =
            parse_token_response(&body).ok_or_else(|| AuthError::VerificationFailed {
                message: "malformed access token response".to_string(),
            })?;
        tracing::debug!("access token exchanged");
        Ok(AccessTokenPair { token, secret })
    }
}

/// Classifies a failed token-endpoint response.
fn classify_exchange_failure(status: StatusCode, body: &str) -> AuthError {
    if let Some((problem, advice)) = oauth_problem(body) {
        return AuthError::from_provider_problem(&problem, &advice);
    }
    AuthError::ProviderUnavailable {
        message: format!("token endpoint returned {status}"),
    }
}
