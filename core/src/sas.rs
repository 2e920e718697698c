//! Shared Access Signature (SAS) tokens for Azure Service Bus / Event Hubs.
//!
//! A SAS token is a time-bounded HMAC-SHA256 credential for one resource URI.
//! The broker recomputes the signature from the fields embedded in the token,
//! so the canonical form of the URI has to match the broker's decoding byte
//! for byte.
//!
//! # Wire format
//!
//! ```text
//! SharedAccessSignature sig=<sig>&se=<expiry>&skn=<key name>&sr=<canonical uri>
//! ```
//!
//! - canonical uri = lowercase(query_escape(uri))
//! - string to sign = canonical uri + "\n" + expiry
//! - sig = query_escape(base64(hmac_sha256(key, string to sign)))
//!
//! `query_escape` keeps `A-Z a-z 0-9 - _ . ~`, turns a space into `+` and
//! percent-encodes every other byte with upper-case hex. Lower-casing happens
//! after escaping, so the hex digits of the resource end up lower-case while
//! the signature keeps upper-case escapes.
//!
//! # Example
//!
//! ```
//! use capture_order_core::sas::{SasSigner, compute_expiry};
//! use chrono::{TimeZone, Utc};
//!
//! let signer = SasSigner::new("fooSasUsername", "fooSasPassword")?;
//! let expiry = compute_expiry(Utc.timestamp_opt(0, 0).unwrap(), chrono::Duration::seconds(300));
//! let token = signer.sign("foo%3a%2f%2fbar%3abaz%2furi", &expiry);
//! assert!(token.starts_with("SharedAccessSignature sig="));
//! # Ok::<(), capture_order_core::sas::SasError>(())
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Token type expected by the claims-based-security node.
pub const SAS_TOKEN_TYPE: &str = "servicebus.windows.net:sastoken";

/// Errors creating a [`SasSigner`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SasError {
    /// The shared access key cannot key an HMAC
    #[error("invalid SAS key: {0}")]
    InvalidKey(String),
}

/// Builds SAS tokens from a shared access key.
#[derive(Clone)]
pub struct SasSigner {
    key_name: String,
    mac: HmacSha256,
}

impl SasSigner {
    /// Create a signer for a shared access key.
    ///
    /// # Errors
    ///
    /// Returns [`SasError::InvalidKey`] if the key is rejected by the HMAC.
    pub fn new(key_name: impl Into<String>, key: impl AsRef<[u8]>) -> Result<Self, SasError> {
        let mac = HmacSha256::new_from_slice(key.as_ref())
            .map_err(|e| SasError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key_name: key_name.into(),
            mac,
        })
    }

    /// Name of the shared access key.
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Sign `uri` with the given expiry (decimal Unix seconds).
    ///
    /// Deterministic: the same key, URI and expiry always give the same token.
    #[must_use]
    pub fn sign(&self, uri: &str, expiry: &str) -> String {
        let canonical = canonical_uri(uri);
        let signature = self.sign_string(&string_to_sign(&canonical, expiry));
        format!(
            "SharedAccessSignature sig={signature}&se={expiry}&skn={}&sr={canonical}",
            self.key_name
        )
    }

    /// Sign `uri` with an expiry `ttl` after `now`.
    #[must_use]
    pub fn token_for(&self, uri: &str, now: DateTime<Utc>, ttl: Duration) -> String {
        self.sign(uri, &compute_expiry(now, ttl))
    }

    fn sign_string(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let digest = STANDARD.encode(mac.finalize().into_bytes());
        query_escape(&digest)
    }
}

impl fmt::Debug for SasSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasSigner")
            .field("key_name", &self.key_name)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Expiry `interval` after `from`, rounded to the nearest second (halves up),
/// as decimal Unix seconds.
#[must_use]
pub fn compute_expiry(from: DateTime<Utc>, interval: Duration) -> String {
    let at = from + interval;
    let mut seconds = at.timestamp();
    if at.timestamp_subsec_nanos() >= 500_000_000 {
        seconds += 1;
    }
    seconds.to_string()
}

fn canonical_uri(uri: &str) -> String {
    query_escape(uri).to_lowercase()
}

fn string_to_sign(canonical_uri: &str, expiry: &str) -> String {
    format!("{canonical_uri}\n{expiry}")
}

// urlencoding leaves exactly `A-Za-z0-9-_.~` untouched and writes a space as
// `%20`. A literal `%` becomes `%25`, so any `%20` left in the output came from
// a space.
fn query_escape(input: &str) -> String {
    urlencoding::encode(input).replace("%20", "+")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const TEST_FOO_URI: &str = "foo://bar:baz/uri";
    const ENCODED_FOO_URI: &str = "foo%3a%2f%2fbar%3abaz%2furi";
    const EXPIRY_1970: &str = "300";

    fn signer() -> SasSigner {
        SasSigner::new("fooSasUsername", "fooSasPassword").unwrap()
    }

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    #[test]
    fn canonical_uri_is_lowercased_query_escape() {
        assert_eq!(canonical_uri(TEST_FOO_URI), ENCODED_FOO_URI);
    }

    #[test]
    fn query_escape_matches_form_encoding() {
        assert_eq!(query_escape("a b"), "a+b");
        assert_eq!(query_escape("a%20b"), "a%2520b");
        assert_eq!(query_escape("-_.~"), "-_.~");
        assert_eq!(query_escape("+/="), "%2B%2F%3D");
    }

    #[test]
    fn expiry_from_epoch() {
        assert_eq!(compute_expiry(epoch(), Duration::seconds(300)), EXPIRY_1970);
    }

    #[test]
    fn expiry_rounds_half_seconds_up() {
        assert_eq!(compute_expiry(epoch(), Duration::milliseconds(1_499)), "1");
        assert_eq!(compute_expiry(epoch(), Duration::milliseconds(1_500)), "2");
    }

    #[test]
    fn string_to_sign_joins_with_newline() {
        assert_eq!(string_to_sign("fooURI", "12345"), "fooURI\n12345");
    }

    #[test]
    fn foo_token() {
        assert_eq!(
            signer().sign(ENCODED_FOO_URI, EXPIRY_1970),
            "SharedAccessSignature sig=8Ew%2B0SNKAp0jAMHLQnYYRlbQBOvwNMu5nP6E3IUySqo%3D&se=300&skn=fooSasUsername&sr=foo%253a%252f%252fbar%253abaz%252furi"
        );
    }

    #[test]
    fn event_hub_amqp_token() {
        assert_eq!(
            signer().sign("amqp://<NAMESPACE>.servicebus.windows.net/<NAME>", EXPIRY_1970),
            "SharedAccessSignature sig=YG4QyqZJTZg4mfgKeWSk8w52nEIksrsjIl8%2BIy2kxrg%3D&se=300&skn=fooSasUsername&sr=amqp%3a%2f%2f%3cnamespace%3e.servicebus.windows.net%2f%3cname%3e"
        );
    }

    #[test]
    fn service_bus_https_token() {
        assert_eq!(
            signer().sign(
                "https://<NAMESPACE>.servicebus.windows.net:443/<NAME>/head?timeout=60",
                EXPIRY_1970
            ),
            "SharedAccessSignature sig=aBmX7BF9OinPcPOOfs9uqqPddqib76Slag27V8rxooo%3D&se=300&skn=fooSasUsername&sr=https%3a%2f%2f%3cnamespace%3e.servicebus.windows.net%3a443%2f%3cname%3e%2fhead%3ftimeout%3d60"
        );
    }

    #[test]
    fn token_for_uses_fresh_expiry() {
        let token = signer().token_for(TEST_FOO_URI, epoch(), Duration::seconds(300));
        assert_eq!(token, signer().sign(TEST_FOO_URI, EXPIRY_1970));
    }

    #[test]
    fn debug_redacts_key() {
        let signer = signer();
        assert_eq!(signer.key_name(), "fooSasUsername");
        assert!(!format!("{signer:?}").contains("fooSasPassword"));
    }

    #[test]
    fn keys_of_any_length_are_accepted() {
        let empty = SasSigner::new("name", "").unwrap();
        let long = SasSigner::new("name", vec![7u8; 1024]).unwrap();
        assert_ne!(
            empty.sign(TEST_FOO_URI, EXPIRY_1970),
            long.sign(TEST_FOO_URI, EXPIRY_1970)
        );
    }

    #[test]
    fn signing_twice_with_one_signer_is_stable() {
        let signer = signer();
        let first = signer.sign(TEST_FOO_URI, EXPIRY_1970);
        assert_eq!(signer.sign(TEST_FOO_URI, EXPIRY_1970), first);
    }

    proptest! {
        #[test]
        fn signing_is_deterministic(uri in ".{0,64}", expiry in 0u32..2_000_000_000) {
            let expiry = expiry.to_string();
            prop_assert_eq!(signer().sign(&uri, &expiry), signer().sign(&uri, &expiry));
        }

        #[test]
        fn changing_any_input_changes_the_token(uri in "[a-z:/]{1,32}", expiry in 0u32..2_000_000_000) {
            let expiry_str = expiry.to_string();
            let base = signer().sign(&uri, &expiry_str);

            let other_key = SasSigner::new("fooSasUsername", "otherPassword").unwrap();
            prop_assert_ne!(&base, &other_key.sign(&uri, &expiry_str));

            let other_name = SasSigner::new("otherName", "fooSasPassword").unwrap();
            prop_assert_ne!(&base, &other_name.sign(&uri, &expiry_str));

            prop_assert_ne!(&base, &signer().sign(&format!("{uri}x"), &expiry_str));
            prop_assert_ne!(&base, &signer().sign(&uri, &(u64::from(expiry) + 1).to_string()));
        }

        #[test]
        fn expiry_round_trips(now in 0i64..4_000_000_000, interval in 0i64..1_000_000) {
            let from = Utc.timestamp_opt(now, 0).unwrap();
            let parsed: i64 = compute_expiry(from, Duration::seconds(interval)).parse().unwrap();
            prop_assert_eq!(parsed, now + interval);
        }
    }
}
