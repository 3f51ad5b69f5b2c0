//! OAuth1 request signing (RFC 5849).
//!
//! Every provider call carries an `Authorization: OAuth ...` header whose
//! signature covers the HTTP method, the base URL, the query parameters and
//! the oauth parameters. The direct (public) flow signs with HMAC-SHA1; the
//! delegated (partner) flow signs with RSA-SHA1 using the configured
//! private key.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};
use url::Url;

use crate::error::{AuthError, AuthResult};

type HmacSha1 = Hmac<Sha1>;

/// Signature method attached to a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMethod {
    /// HMAC-SHA1 keyed with consumer secret and token secret.
    HmacSha1,
    /// RSA-SHA1 with the partner private key (PKCS#1 v1.5).
    RsaSha1,
}

impl SignatureMethod {
    fn label(self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::RsaSha1 => "RSA-SHA1",
        }
    }
}

/// Credential material needed to sign one request.
#[derive(Debug, Clone)]
pub struct SigningContext<'a> {
    /// OAuth consumer key.
    pub consumer_key: &'a str,
    /// OAuth consumer secret (HMAC key component).
    pub consumer_secret: &'a str,
    /// Signature method for the active application type.
    pub method: SignatureMethod,
    /// PEM private key for RSA-SHA1. May be empty for the direct flow.
    pub private_key_pem: &'a str,
    /// Token attached to the request (request token or access token).
    pub token: Option<&'a str>,
    /// Secret paired with `token`.
    pub token_secret: Option<&'a str>,
}

/// Percent-encodes a string per RFC 5849 §3.6.
///
/// Unreserved characters (ALPHA, DIGIT, `-`, `.`, `_`, `~`) pass through;
/// every other byte becomes an uppercase `%XX` triplet.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

/// Builds the signature base string per RFC 5849 §3.4.1.
///
/// `params` must contain the oauth parameters and every query parameter of
/// the request; `url` is reduced to scheme, authority and path.
#[must_use]
pub fn signature_base_string(http_method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        http_method.to_ascii_uppercase(),
        percent_encode(base_url.as_str()),
        percent_encode(&normalized)
    )
}

/// Computes the signature for a base string.
fn sign_base_string(base_string: &str, ctx: &SigningContext<'_>) -> AuthResult<String> {
    match ctx.method {
        SignatureMethod::HmacSha1 => {
            let key = format!(
                "{}&{}",
                percent_encode(ctx.consumer_secret),
                percent_encode(ctx.token_secret.unwrap_or(""))
            );
            let mut mac =
                HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| AuthError::Internal {
                    message: format!("HMAC key setup failed: {e}"),
                })?;
            mac.update(base_string.as_bytes());
            Ok(BASE64.encode(mac.finalize().into_bytes()))
        }
        SignatureMethod::RsaSha1 => {
            if ctx.private_key_pem.trim().is_empty() {
                return Err(AuthError::Internal {
                    message: "partner signing key is empty; configure private_key_path"
                        .to_string(),
                });
            }
            let key = RsaPrivateKey::from_pkcs1_pem(ctx.private_key_pem)
                .or_else(|_| RsaPrivateKey::from_pkcs8_pem(ctx.private_key_pem))
                .map_err(|e| AuthError::Internal {
                    message: format!("partner signing key unreadable: {e}"),
                })?;
            let digest = Sha1::digest(base_string.as_bytes());
            let signature = key
                .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
                .map_err(|e| AuthError::Internal {
                    message: format!("RSA signing failed: {e}"),
                })?;
            Ok(BASE64.encode(signature))
        }
    }
}

/// Produces the `Authorization: OAuth ...` header value for a request.
///
/// `extra_params` carries call-specific oauth parameters such as
/// `oauth_callback` or `oauth_verifier`.
pub fn authorization_header(
    http_method: &str,
    url: &Url,
    extra_params: &[(&str, &str)],
    ctx: &SigningContext<'_>,
) -> AuthResult<String> {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp().to_string();
    authorization_header_at(http_method, url, extra_params, ctx, &nonce, &timestamp)
}

/// [`authorization_header`] with caller-supplied nonce and timestamp.
pub fn authorization_header_at(
    http_method: &str,
    url: &Url,
    extra_params: &[(&str, &str)],
    ctx: &SigningContext<'_>,
    nonce: &str,
    timestamp: &str,
) -> AuthResult<String> {
    let mut oauth_params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".to_string(), ctx.consumer_key.to_string()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        (
            "oauth_signature_method".to_string(),
            ctx.method.label().to_string(),
        ),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];
    if let Some(token) = ctx.token {
        oauth_params.push(("oauth_token".to_string(), token.to_string()));
    }
    for (k, v) in extra_params {
        oauth_params.push(((*k).to_string(), (*v).to_string()));
    }

    let mut signed_params = oauth_params.clone();
    for (k, v) in url.query_pairs() {
        signed_params.push((k.into_owned(), v.into_owned()));
    }

    let base_string = signature_base_string(http_method, url, &signed_params);
    let signature = sign_base_string(&base_string, ctx)?;
    oauth_params.push(("oauth_signature".to_string(), signature));

    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Shared example from OAuth Core 1.0 §9 / RFC 5849.
    fn example_ctx() -> SigningContext<'static> {
        SigningContext {
            consumer_key: "dpf43f3p2l4k3l03",
            consumer_secret: "kd94hf93k423kf44",
            method: SignatureMethod::HmacSha1,
            private_key_pem: "",
            token: Some("nnch734d00sl2jdk"),
            token_secret: Some("pfkkdhi9sl3r4s00"),
        }
    }

    fn example_url() -> Url {
        Url::parse("http://photos.example.net/photos?file=vacation.jpg&size=original").unwrap()
    }

    #[test]
    fn percent_encoding_follows_rfc5849() {
        assert_eq!(percent_encode("Ljm Ross"), "Ljm%20Ross");
        assert_eq!(percent_encode("abcXYZ012-._~"), "abcXYZ012-._~");
        assert_eq!(percent_encode("a/b?c=d&e"), "a%2Fb%3Fc%3Dd%26e");
        assert_eq!(percent_encode("\u{00e9}"), "%C3%A9");
    }

    #[test]
    fn base_string_matches_spec_example() {
        let params = vec![
            ("oauth_consumer_key".to_string(), "dpf43f3p2l4k3l03".to_string()),
            ("oauth_token".to_string(), "nnch734d00sl2jdk".to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), "1191242096".to_string()),
            ("oauth_nonce".to_string(), "kllo9940pd9333jh".to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
            ("file".to_string(), "vacation.jpg".to_string()),
            ("size".to_string(), "original".to_string()),
        ];
        let base = signature_base_string("GET", &example_url(), &params);
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26\
             oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096%26\
             oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );
    }

    #[test]
    fn hmac_sha1_signature_matches_spec_example() {
        let header = authorization_header_at(
            "GET",
            &example_url(),
            &[],
            &example_ctx(),
            "kllo9940pd9333jh",
            "1191242096",
        )
        .unwrap();
        // Known signature from the OAuth Core 1.0 example.
        assert!(
            header.contains("oauth_signature=\"tR3%2BTy81lMeYAr%2FFid0kMTYa%2FWM%3D\""),
            "unexpected header: {header}"
        );
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
    }

    #[test]
    fn header_includes_extra_params_in_signature_set() {
        let url = Url::parse("https://provider.test/oauth/RequestToken").unwrap();
        let ctx = SigningContext {
            token: None,
            token_secret: None,
            ..example_ctx()
        };
        let header = authorization_header_at(
            "POST",
            &url,
            &[("oauth_callback", "http://localhost:3100/access")],
            &ctx,
            "nonce",
            "1",
        )
        .unwrap();
        assert!(header.contains("oauth_callback=\"http%3A%2F%2Flocalhost%3A3100%2Faccess\""));
        assert!(!header.contains("oauth_token="));
    }

    #[test]
    fn empty_partner_key_fails_at_sign_time() {
        let ctx = SigningContext {
            method: SignatureMethod::RsaSha1,
            ..example_ctx()
        };
        let err =
            authorization_header_at("GET", &example_url(), &[], &ctx, "n", "1").unwrap_err();
        assert!(matches!(err, AuthError::Internal { .. }));
    }
}
