//! Authorized provider client handle.
//!
//! A [`ClientHandle`] is built per authorized request from the immutable
//! configuration plus that session's access-token pair, and dropped when
//! the request completes. Handles are never cached or shared across
//! sessions, so concurrent sessions with different tokens cannot observe
//! each other's credentials.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use url::Url;

use ledgerlink_config::AppConfig;

use crate::client::{PROVIDER_TIMEOUT, oauth_problem, signature_method};
use crate::error::{AuthError, AuthResult};
use crate::session::AccessTokenPair;
use crate::signing::{self, SigningContext};

/// Records per page returned by the provider.
const PAGE_SIZE: usize = 100;

/// Upper bound on accumulated pages for paged collections. Beyond this the
/// handle returns what it has instead of growing without bound.
const MAX_PAGES: usize = 10;

/// Authenticated facade for resource calls against the provider API.
pub struct ClientHandle {
    config: Arc<AppConfig>,
    access: AccessTokenPair,
    http: reqwest::Client,
}

impl ClientHandle {
    /// Builds a fresh handle for one request.
    pub fn new(config: Arc<AppConfig>, access: AccessTokenPair) -> AuthResult<Self> {
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
        Ok(Self {
            config,
            access,
            http,
        })
    }

    fn resource_url(&self, path: &str, query: &[(&str, &str)]) -> AuthResult<Url> {
        let base = format!(
            "{}/{}",
            self.config.endpoints.api_base_url.trim_end_matches('/'),
            path
        );
        let mut url = Url::parse(&base).map_err(|e| AuthError::Internal {
            message: format!("bad resource url '{path}': {e}"),
        })?;
        for (k, v) in query {
            url.query_pairs_mut().append_pair(k, v);
        }
        Ok(url)
    }

    fn signing_context(&self) -> AuthResult<SigningContext<'_>> {
        let creds = self.config.credentials().map_err(|e| AuthError::Internal {
            message: e.to_string(),
        })?;
        Ok(SigningContext {
            consumer_key: &creds.consumer_key,
            consumer_secret: &creds.consumer_secret,
            method: signature_method(self.config.app_type),
            private_key_pem: &creds.private_key,
            token: Some(&self.access.token),
            token_secret: Some(&self.access.secret),
        })
    }

    async fn execute(&self, http_method: &str, url: Url, body: Option<&Value>) -> AuthResult<reqwest::Response> {
        let ctx = self.signing_context()?;
        let header = signing::authorization_header(http_method, &url, &[], &ctx)?;
        let mut request = match http_method {
            "GET" => self.http.get(url.clone()),
            "PUT" => self.http.put(url.clone()),
            "POST" => self.http.post(url.clone()),
            other => {
                return Err(AuthError::Internal {
                    message: format!("unsupported method {other}"),
                });
            }
        };
        request = request.header(AUTHORIZATION, header);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Signed GET returning the provider's JSON body.
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> AuthResult<Value> {
        let url = self.resource_url(path, query)?;
        let response = self.execute("GET", url, None).await?;
        json_body(response, path).await
    }

    /// Fetches one unpaged collection, extracting the response array keyed
    /// by the resource name (e.g. `Organisations`). For nested endpoints
    /// such as `InvoiceReminders/Settings` the key is the first segment.
    pub async fn collection(&self, resource: &str) -> AuthResult<Vec<Value>> {
        let key = resource.split('/').next().unwrap_or(resource);
        let body = self.get_json(resource, &[]).await?;
        Ok(extract_items(&body, key))
    }

    /// Fetches a paged collection, accumulating up to [`MAX_PAGES`] pages.
    pub async fn collection_paged(&self, resource: &str) -> AuthResult<Vec<Value>> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let page_param = page.to_string();
            let body = self
                .get_json(resource, &[("page", page_param.as_str())])
                .await?;
            let page_items = extract_items(&body, resource);
            let done = page_items.len() < PAGE_SIZE;
            items.extend(page_items);
            if done {
                break;
            }
        }
        Ok(items)
    }

    /// Fetches a single invoice by number or identifier.
    pub async fn invoice(&self, invoice_id: &str) -> AuthResult<Value> {
        let body = self.get_json(&format!("Invoices/{invoice_id}"), &[]).await?;
        extract_items(&body, "Invoices")
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::ResourceNotFound {
                resource: format!("Invoices/{invoice_id}"),
            })
    }

    /// Lists attachments on an entity.
    pub async fn attachments(&self, entity_type: &str, entity_id: &str) -> AuthResult<Vec<Value>> {
        let body = self
            .get_json(&format!("{entity_type}/{entity_id}/Attachments"), &[])
            .await?;
        Ok(extract_items(&body, "Attachments"))
    }

    /// Downloads one attachment's raw content, returning the bytes and the
    /// provider-reported content type.
    pub async fn attachment_content(
        &self,
        entity_type: &str,
        entity_id: &str,
        file_name: &str,
    ) -> AuthResult<(Vec<u8>, Option<String>)> {
        let url = self.resource_url(
            &format!("{entity_type}/{entity_id}/Attachments/{file_name}"),
            &[],
        )?;
        let response = self.execute("GET", url, None).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body, file_name));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }

    /// Runs a named report with optional report parameters.
    pub async fn report(&self, name: &str, params: &[(&str, &str)]) -> AuthResult<Value> {
        let body = self.get_json(&format!("Reports/{name}"), params).await?;
        extract_items(&body, "Reports")
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::ResourceNotFound {
                resource: format!("Reports/{name}"),
            })
    }

    /// Creates a draft invoice from the given payload, returning the
    /// created entity.
    pub async fn create_invoice(&self, draft: &Value) -> AuthResult<Value> {
        let url = self.resource_url("Invoices", &[])?;
        let response = self.execute("PUT", url, Some(draft)).await?;
        let body = json_body(response, "Invoices").await?;
        extract_items(&body, "Invoices")
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::Internal {
                message: "provider returned no invoice entity".to_string(),
            })
    }
}

/// Extracts the array of entities under `key`, tolerating single-object
/// responses.
fn extract_items(body: &Value, key: &str) -> Vec<Value> {
    match body.get(key) {
        Some(Value::Array(items)) => items.clone(),
        Some(other) if !other.is_null() => vec![other.clone()],
        _ => Vec::new(),
    }
}

/// Classifies a failed resource response at the parse boundary.
fn classify_failure(status: StatusCode, body: &str, resource: &str) -> AuthError {
    if let Some((problem, advice)) = oauth_problem(body) {
        return AuthError::from_provider_problem(&problem, &advice);
    }
    if status == StatusCode::NOT_FOUND {
        return AuthError::ResourceNotFound {
            resource: resource.to_string(),
        };
    }
    if status.is_server_error() {
        return AuthError::ProviderUnavailable {
            message: format!("provider returned {status}"),
        };
    }
    AuthError::Provider {
        problem: format!("http_{}", status.as_u16()),
        message: body.chars().take(200).collect(),
    }
}

/// Status check plus JSON decode with boundary classification.
async fn json_body(response: reqwest::Response, resource: &str) -> AuthResult<Value> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(classify_failure(status, &body, resource));
    }
    serde_json::from_str(&body).map_err(|e| AuthError::ProviderUnavailable {
        message: format!("malformed provider response: {e}"),
    })
}
