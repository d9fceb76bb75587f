//! Shared Key request signing for the blob service.
//!
//! The string-to-sign layout follows the blob service's Shared Key scheme
//! for service versions 2015-02-21 and later: a zero Content-Length is
//! signed as an empty line.

use crate::error::TrackerError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Standard headers that take a fixed position in the string-to-sign.
const SIGNED_STANDARD_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// Account name plus decoded access key.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// The parts of a request covered by the signature.
///
/// `headers` must use lowercase names.
#[derive(Debug)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a [(&'a str, &'a str)],
    pub headers: &'a BTreeMap<String, String>,
}

impl SharedKeyCredential {
    /// Creates a credential from an account name and a base64 access key.
    pub fn new(account: impl Into<String>, access_key: &str) -> Result<Self, TrackerError> {
        let key = STANDARD
            .decode(access_key.trim())
            .map_err(|e| TrackerError::Config(format!("AZURE_STORAGE_KEY is not valid base64: {}", e)))?;

        Ok(Self { account: account.into(), key })
    }

    /// Returns the storage account name.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Builds the string-to-sign for a request.
    pub fn string_to_sign(&self, request: &SignedRequest<'_>) -> String {
        let mut out = String::new();
        out.push_str(request.method);
        out.push('\n');

        for name in SIGNED_STANDARD_HEADERS {
            let value = request.headers.get(name).map(String::as_str).unwrap_or("");
            if name == "content-length" && value == "0" {
                out.push('\n');
                continue;
            }
            out.push_str(value);
            out.push('\n');
        }

        for (name, value) in request.headers.iter().filter(|(n, _)| n.starts_with("x-ms-")) {
            out.push_str(name);
            out.push(':');
            out.push_str(value.trim());
            out.push('\n');
        }

        out.push('/');
        out.push_str(&self.account);
        out.push_str(request.path);

        let mut params: Vec<(String, &str)> =
            request.query.iter().map(|(k, v)| (k.to_lowercase(), *v)).collect();
        params.sort();
        for (name, value) in params {
            out.push('\n');
            out.push_str(&name);
            out.push(':');
            out.push_str(value);
        }

        out
    }

    /// Returns the `Authorization` header value for a request.
    pub fn authorization(&self, request: &SignedRequest<'_>) -> Result<String, TrackerError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| TrackerError::Config(format!("invalid storage key: {}", e)))?;
        mac.update(self.string_to_sign(request).as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.account, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "c2VjcmV0LWtleS0xMjM0NQ==";
    const DATE: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

    fn base_headers() -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("x-ms-version".to_string(), "2021-08-06".to_string());
        headers.insert("x-ms-date".to_string(), DATE.to_string());
        headers
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = SharedKeyCredential::new("cards", "%%% not base64").unwrap_err();
        assert!(err.to_string().contains("not valid base64"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let credential = SharedKeyCredential::new("cards", TEST_KEY).unwrap();
        let debug = format!("{:?}", credential);
        assert!(debug.contains("cards"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(TEST_KEY));
    }

    #[test]
    fn test_string_to_sign_get() {
        let credential = SharedKeyCredential::new("cards", TEST_KEY).unwrap();
        let headers = base_headers();
        let request =
            SignedRequest { method: "GET", path: "/indexes/Iono.json", query: &[], headers: &headers };

        let expected = format!(
            "GET\n\n\n\n\n\n\n\n\n\n\n\nx-ms-date:{}\nx-ms-version:2021-08-06\n/cards/indexes/Iono.json",
            DATE
        );
        assert_eq!(credential.string_to_sign(&request), expected);
    }

    #[test]
    fn test_string_to_sign_create_container() {
        let credential = SharedKeyCredential::new("cards", TEST_KEY).unwrap();
        let mut headers = base_headers();
        headers.insert("content-length".to_string(), "0".to_string());
        let request = SignedRequest {
            method: "PUT",
            path: "/indexes",
            query: &[("restype", "container")],
            headers: &headers,
        };

        let signed = credential.string_to_sign(&request);
        assert!(signed.starts_with("PUT\n\n\n\n"));
        assert!(signed.ends_with("/cards/indexes\nrestype:container"));
    }

    #[test]
    fn test_string_to_sign_upload_positions() {
        let credential = SharedKeyCredential::new("cards", TEST_KEY).unwrap();
        let mut headers = base_headers();
        headers.insert("content-length".to_string(), "42".to_string());
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("if-match".to_string(), "\"0x8D\"".to_string());
        headers.insert("x-ms-blob-type".to_string(), "BlockBlob".to_string());
        let request =
            SignedRequest { method: "PUT", path: "/indexes/Iono.json", query: &[], headers: &headers };

        let signed = credential.string_to_sign(&request);
        let lines: Vec<&str> = signed.lines().collect();
        assert_eq!(lines[0], "PUT");
        assert_eq!(lines[3], "42");
        assert_eq!(lines[5], "application/json");
        assert_eq!(lines[8], "\"0x8D\"");
        assert_eq!(lines[9], "");
        // Canonical x-ms headers are sorted by name
        assert_eq!(lines[12], "x-ms-blob-type:BlockBlob");
        assert_eq!(lines[13], format!("x-ms-date:{}", DATE));
        assert_eq!(lines[14], "x-ms-version:2021-08-06");
        assert_eq!(lines[15], "/cards/indexes/Iono.json");
    }

    #[test]
    fn test_authorization_is_deterministic() {
        let credential = SharedKeyCredential::new("cards", TEST_KEY).unwrap();
        let headers = base_headers();
        let request =
            SignedRequest { method: "GET", path: "/indexes/Iono.json", query: &[], headers: &headers };

        let first = credential.authorization(&request).unwrap();
        let second = credential.authorization(&request).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("SharedKey cards:"));

        // HMAC-SHA256 is 32 bytes, 44 chars in padded base64
        let signature = first.trim_start_matches("SharedKey cards:");
        assert_eq!(signature.len(), 44);

        let other = SignedRequest { method: "PUT", ..request };
        assert_ne!(credential.authorization(&other).unwrap(), first);
    }
}
