// signature.rs
//
// HMAC-SHA256 verification for Square webhook deliveries. Square signs the
// publicly configured webhook URL concatenated with the raw request body
// (and, for version 2 signatures, the `x-square-sent-at` timestamp) and
// sends the base64 digest in a request header.

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-square-hmacsha256-signature";
pub const VERSION_HEADER: &str = "x-square-signature-version";
pub const SENT_AT_HEADER: &str = "x-square-sent-at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVersion {
    V1,
    V2,
}

impl SignatureVersion {
    /// Version `"2"` selects the v2 payload rule; anything else, including an
    /// absent header, falls back to v1.
    fn from_header(headers: &HeaderMap) -> Self {
        match headers.get(VERSION_HEADER).and_then(|v| v.to_str().ok()) {
            Some("2") => SignatureVersion::V2,
            _ => SignatureVersion::V1,
        }
    }
}

/// The canonicalized request identity the signature is computed over.
/// Returned on every verification outcome so failures can be diagnosed
/// without logging the secret or any computed digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContext {
    pub request_url: String,
    pub normalized_path: String,
    pub version: SignatureVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationCode {
    Ok,
    MissingSignature,
    MissingSecret,
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub valid: bool,
    pub code: VerificationCode,
    pub context: SignatureContext,
}

/// Rebuilds the URL Square signed. The fronting proxy may collapse the
/// sub-path to `/` before the request reaches the handler, but Square always
/// signs the originally configured webhook URL, so an empty or bare-root
/// path is replaced with the configured fallback path.
pub fn canonicalize(host: &str, protocol: &str, path: &str, fallback_path: &str) -> (String, String) {
    let normalized_path = if path.is_empty() || path == "/" {
        fallback_path.to_string()
    } else {
        path.to_string()
    };
    let request_url = format!("{}://{}{}", protocol, host, normalized_path);
    (request_url, normalized_path)
}

/// Computes the base64 HMAC-SHA256 signature for the given payload parts.
pub fn sign(
    secret: &str,
    version: SignatureVersion,
    sent_at: Option<&str>,
    request_url: &str,
    raw_body: &[u8],
) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    if version == SignatureVersion::V2 {
        if let Some(sent_at) = sent_at {
            mac.update(sent_at.as_bytes());
        }
    }
    mac.update(request_url.as_bytes());
    mac.update(raw_body);
    BASE64.encode(mac.finalize().into_bytes())
}

#[derive(Debug, Clone)]
pub struct SquareVerifier {
    secret: String,
    fallback_path: String,
}

impl SquareVerifier {
    pub fn new(secret: &str, fallback_path: &str) -> Self {
        Self {
            secret: secret.to_string(),
            fallback_path: fallback_path.to_string(),
        }
    }

    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }

    pub fn context(&self, host: &str, protocol: &str, path: &str) -> SignatureContext {
        let (request_url, normalized_path) =
            canonicalize(host, protocol, path, &self.fallback_path);
        SignatureContext {
            request_url,
            normalized_path,
            version: SignatureVersion::V1,
        }
    }

    /// Verifies an inbound delivery against the shared secret. `raw_body`
    /// must be the exact bytes received on the wire; re-serializing the
    /// parsed JSON would break the match on whitespace and key order.
    pub fn verify(
        &self,
        headers: &HeaderMap,
        raw_body: &[u8],
        host: &str,
        protocol: &str,
        path: &str,
    ) -> VerificationResult {
        let mut context = self.context(host, protocol, path);
        context.version = SignatureVersion::from_header(headers);

        let received = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
            Some(sig) => sig,
            None => {
                return VerificationResult {
                    valid: false,
                    code: VerificationCode::MissingSignature,
                    context,
                }
            }
        };

        if self.secret.is_empty() {
            return VerificationResult {
                valid: false,
                code: VerificationCode::MissingSecret,
                context,
            };
        }

        let sent_at = headers.get(SENT_AT_HEADER).and_then(|v| v.to_str().ok());
        if context.version == SignatureVersion::V2 && sent_at.is_none() {
            // A v2 delivery without its timestamp cannot have been signed
            // correctly; never degrade to the v1 payload rule.
            return VerificationResult {
                valid: false,
                code: VerificationCode::Mismatch,
                context,
            };
        }

        let expected = sign(
            &self.secret,
            context.version,
            sent_at,
            &context.request_url,
            raw_body,
        );

        let valid: bool = expected.as_bytes().ct_eq(received.as_bytes()).into();
        VerificationResult {
            valid,
            code: if valid {
                VerificationCode::Ok
            } else {
                VerificationCode::Mismatch
            },
            context,
        }
    }
}
