//
// Copyright (c) 2025 murilo ijanc' <murilo@ijanc.org>
//
// Permission to use, copy, modify, and distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR DISCLAIMS ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
//

//! Bearer tokens for the AWS IAM authenticator of an EKS API server.
//!
//! A token is a SigV4 pre-signed STS `GetCallerIdentity` URL, URL-safe
//! base64 encoded without padding and prefixed with `k8s-aws-v1.`. The
//! authenticator dereferences the URL itself; we never call STS.

use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use aws_credential_types::provider::ProvideCredentials;
use aws_sigv4::http_request::{
    SignableBody, SignableRequest, SignatureLocation, SigningSettings,
};
use aws_smithy_runtime_api::client::identity::Identity;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{ClusterIdentity, Error, Result};

pub const TOKEN_PREFIX: &str = "k8s-aws-v1.";
pub const CLUSTER_ID_HEADER: &str = "x-k8s-aws-id";
pub const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(60);

/// A minted bearer token.
///
/// The value is enough to impersonate the signer until it expires, so it is
/// never printed by `Debug`.
#[derive(Clone)]
pub struct AuthToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn mint(&self, cluster: &ClusterIdentity) -> Result<AuthToken>;
}

/// Mints tokens with the credentials of an explicitly passed SDK config.
#[derive(Debug, Clone)]
pub struct SdkTokenMinter {
    sdk_config: SdkConfig,
    expires_in: Duration,
}

impl SdkTokenMinter {
    pub fn new(sdk_config: SdkConfig, expires_in: Duration) -> Self {
        Self { sdk_config, expires_in }
    }
}

#[async_trait]
impl TokenSource for SdkTokenMinter {
    async fn mint(&self, cluster: &ClusterIdentity) -> Result<AuthToken> {
        let credentials = self
            .sdk_config
            .credentials_provider()
            .ok_or_else(|| {
                Error::Credential(
                    "no credentials provider in sdk config".to_string(),
                )
            })?
            .provide_credentials()
            .await
            .map_err(|e| {
                Error::Credential(format!("failed to provide credentials: {e}"))
            })?;

        let token =
            presign(&credentials, cluster, self.expires_in, SystemTime::now())?;
        debug!(
            cluster = %cluster.name,
            region = %cluster.region,
            expires_at = %token.expires_at,
            "minted cluster token"
        );
        Ok(token)
    }
}

/// Builds a token signed at `time` and valid for `expires_in`.
pub fn presign(
    credentials: &Credentials,
    cluster: &ClusterIdentity,
    expires_in: Duration,
    time: SystemTime,
) -> Result<AuthToken> {
    let region = cluster.region.as_str();
    validate_region(region)?;

    let mut signing_settings = SigningSettings::default();
    signing_settings.expires_in = Some(expires_in);
    signing_settings.signature_location = SignatureLocation::QueryParams;

    let identity = Identity::from(credentials.clone());

    let signing_params = aws_sigv4::sign::v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name("sts")
        .time(time)
        .settings(signing_settings)
        .build()
        .map_err(|e| {
            Error::Signing(format!("unable to create signing params: {e}"))
        })?;

    let url = sts_url(region);
    let headers = [(CLUSTER_ID_HEADER, cluster.name.as_str())];
    let signable_request = SignableRequest::new(
        "GET",
        url.as_str(),
        headers.into_iter(),
        SignableBody::Bytes(&[]),
    )
    .map_err(|e| Error::Signing(e.to_string()))?;

    let (signing_instructions, _signature) = aws_sigv4::http_request::sign(
        signable_request,
        &aws_sigv4::http_request::SigningParams::V4(signing_params),
    )
    .map_err(|e| Error::Signing(e.to_string()))?
    .into_parts();

    let mut presigned = http::Request::builder()
        .uri(url)
        .body(())
        .map_err(|e| Error::Signing(e.to_string()))?;
    signing_instructions.apply_to_request_http1x(&mut presigned);
    let uri = presigned.uri().to_string();

    let lifetime = chrono::Duration::from_std(expires_in)
        .map_err(|e| Error::Signing(format!("invalid expiry: {e}")))?;

    Ok(AuthToken {
        value: format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(uri)),
        expires_at: DateTime::<Utc>::from(time) + lifetime,
    })
}

fn sts_url(region: &str) -> String {
    format!(
        "https://sts.{region}.amazonaws.com/?Action=GetCallerIdentity&Version=2011-06-15"
    )
}

fn validate_region(region: &str) -> Result<()> {
    let valid = !region.is_empty()
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');

    if valid {
        Ok(())
    } else {
        Err(Error::Signing(format!("malformed region identifier {region:?}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use aws_credential_types::provider::SharedCredentialsProvider;
    use chrono::NaiveDateTime;
    use url::Url;

    use super::*;

    fn credentials() -> Credentials {
        Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
            None,
            "kbridge-test",
        )
    }

    fn demo() -> ClusterIdentity {
        ClusterIdentity::new("demo", "eu-central-1")
    }

    fn decode(token: &str) -> Url {
        let encoded = token.strip_prefix(TOKEN_PREFIX).unwrap();
        let raw = URL_SAFE_NO_PAD.decode(encoded).unwrap();
        Url::parse(&String::from_utf8(raw).unwrap()).unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    /// Minimal stand-in for the authenticator: checks the validity window
    /// and recomputes the signature for the claimed cluster.
    fn verify(
        token: &str,
        credentials: &Credentials,
        cluster: &str,
        now: SystemTime,
    ) -> std::result::Result<(), String> {
        let url = decode(token);
        let params = query(&url);

        let signed_at = NaiveDateTime::parse_from_str(
            &params["X-Amz-Date"],
            "%Y%m%dT%H%M%SZ",
        )
        .map_err(|e| e.to_string())?
        .and_utc();
        let expires: u64 =
            params["X-Amz-Expires"].parse().map_err(|_| "bad expiry")?;

        let now = DateTime::<Utc>::from(now);
        if now > signed_at + chrono::Duration::seconds(expires as i64) {
            return Err("token expired".to_string());
        }

        let region = url
            .host_str()
            .and_then(|h| h.strip_prefix("sts."))
            .and_then(|h| h.strip_suffix(".amazonaws.com"))
            .ok_or("unexpected host")?;

        let expected = presign(
            credentials,
            &ClusterIdentity::new(cluster, region),
            Duration::from_secs(expires),
            signed_at.into(),
        )
        .map_err(|e| e.to_string())?;

        if expected.as_str() == token {
            Ok(())
        } else {
            Err("signature mismatch".to_string())
        }
    }

    #[test]
    fn token_is_prefixed_and_unpadded() {
        // cluster names of different lengths shift the base64 padding
        for name in ["a", "ab", "abc", "demo", "prod-cluster-01"] {
            let cluster = ClusterIdentity::new(name, "eu-central-1");
            let token = presign(
                &credentials(),
                &cluster,
                DEFAULT_EXPIRES_IN,
                SystemTime::now(),
            )
            .unwrap();

            assert!(token.as_str().starts_with(TOKEN_PREFIX));
            assert!(!token.as_str().contains('='), "padding left in {name}");
        }
    }

    #[test]
    fn decoded_url_is_presigned_get_caller_identity() {
        let token = presign(
            &credentials(),
            &demo(),
            DEFAULT_EXPIRES_IN,
            SystemTime::now(),
        )
        .unwrap();

        let url = decode(token.as_str());
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("sts.eu-central-1.amazonaws.com"));

        let params = query(&url);
        assert_eq!(params["Action"], "GetCallerIdentity");
        assert_eq!(params["Version"], "2011-06-15");
        assert_eq!(params["X-Amz-Algorithm"], "AWS4-HMAC-SHA256");
        assert_eq!(params["X-Amz-Expires"], "60");
        assert!(
            params["X-Amz-Credential"]
                .ends_with("/eu-central-1/sts/aws4_request")
        );
        assert!(params["X-Amz-Credential"].starts_with("AKIDEXAMPLE/"));

        let signed: Vec<&str> =
            params["X-Amz-SignedHeaders"].split(';').collect();
        assert!(signed.contains(&"host"));
        assert!(signed.contains(&CLUSTER_ID_HEADER));
        assert!(params.contains_key("X-Amz-Signature"));
    }

    #[test]
    fn session_token_is_carried_in_the_url() {
        let credentials = Credentials::new(
            "AKIDEXAMPLE",
            "secret",
            Some("session-token".to_string()),
            None,
            "kbridge-test",
        );
        let token =
            presign(&credentials, &demo(), DEFAULT_EXPIRES_IN, SystemTime::now())
                .unwrap();

        let params = query(&decode(token.as_str()));
        assert_eq!(params["X-Amz-Security-Token"], "session-token");
    }

    #[test]
    fn custom_expiry_is_signed_and_recorded() {
        let now = SystemTime::now();
        let token =
            presign(&credentials(), &demo(), Duration::from_secs(900), now)
                .unwrap();

        let params = query(&decode(token.as_str()));
        assert_eq!(params["X-Amz-Expires"], "900");
        assert_eq!(
            token.expires_at(),
            DateTime::<Utc>::from(now) + chrono::Duration::seconds(900)
        );
    }

    #[test]
    fn verifier_accepts_token_inside_window() {
        let minted_at = SystemTime::now();
        let token =
            presign(&credentials(), &demo(), DEFAULT_EXPIRES_IN, minted_at)
                .unwrap();

        let checked_at = minted_at + Duration::from_secs(30);
        assert_eq!(
            verify(token.as_str(), &credentials(), "demo", checked_at),
            Ok(())
        );
    }

    #[test]
    fn verifier_rejects_token_after_expiry() {
        let minted_at = SystemTime::now();
        let token =
            presign(&credentials(), &demo(), DEFAULT_EXPIRES_IN, minted_at)
                .unwrap();

        let checked_at = minted_at + Duration::from_secs(61);
        assert_eq!(
            verify(token.as_str(), &credentials(), "demo", checked_at),
            Err("token expired".to_string())
        );
    }

    #[test]
    fn verifier_rejects_token_for_another_cluster() {
        let minted_at = SystemTime::now();
        let token =
            presign(&credentials(), &demo(), DEFAULT_EXPIRES_IN, minted_at)
                .unwrap();

        assert_eq!(
            verify(token.as_str(), &credentials(), "other", minted_at),
            Err("signature mismatch".to_string())
        );
    }

    #[test]
    fn malformed_region_is_a_signing_error() {
        for region in ["", "EU-CENTRAL-1", "eu central 1", "eu/central"] {
            let cluster = ClusterIdentity::new("demo", region);
            let err = presign(
                &credentials(),
                &cluster,
                DEFAULT_EXPIRES_IN,
                SystemTime::now(),
            )
            .unwrap_err();
            assert!(matches!(err, Error::Signing(_)), "region {region:?}");
        }
    }

    #[test]
    fn debug_output_hides_token_value() {
        let token = presign(
            &credentials(),
            &demo(),
            DEFAULT_EXPIRES_IN,
            SystemTime::now(),
        )
        .unwrap();

        let printed = format!("{token:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains(TOKEN_PREFIX));
    }

    #[tokio::test]
    async fn minter_without_credentials_provider_fails() {
        let minter =
            SdkTokenMinter::new(SdkConfig::builder().build(), DEFAULT_EXPIRES_IN);

        let err = minter.mint(&demo()).await.unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }

    #[tokio::test]
    async fn minter_uses_sdk_credentials() {
        let sdk_config = SdkConfig::builder()
            .credentials_provider(SharedCredentialsProvider::new(credentials()))
            .build();
        let minter = SdkTokenMinter::new(sdk_config, DEFAULT_EXPIRES_IN);

        let token = minter.mint(&demo()).await.unwrap();
        assert_eq!(
            verify(token.as_str(), &credentials(), "demo", SystemTime::now()),
            Ok(())
        );
    }
}
