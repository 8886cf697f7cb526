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

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_eks as eks;
use aws_sdk_eks::error::DisplayErrorContext;
use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::debug;

use crate::{Error, Result};

/// Which cluster to authenticate against, and the region to sign for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub name: String,
    pub region: String,
}

impl ClusterIdentity {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self { name: name.into(), region: region.into() }
    }
}

/// Connection data for one invocation.
#[derive(Debug, Clone)]
pub struct ClusterMetadata {
    pub endpoint: http::Uri,
    /// CA bundle as returned by EKS once base64 decoded (PEM text).
    pub ca_certificate: Vec<u8>,
}

#[async_trait]
pub trait ClusterLookup: Send + Sync {
    async fn describe(
        &self,
        cluster: &ClusterIdentity,
    ) -> Result<ClusterMetadata>;
}

pub struct EksClusterLookup {
    client: eks::Client,
}

impl EksClusterLookup {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self { client: eks::Client::new(sdk_config) }
    }
}

#[async_trait]
impl ClusterLookup for EksClusterLookup {
    async fn describe(
        &self,
        cluster: &ClusterIdentity,
    ) -> Result<ClusterMetadata> {
        debug!(
            cluster = %cluster.name,
            region = %cluster.region,
            "describing cluster"
        );

        let resp = self
            .client
            .describe_cluster()
            .name(&cluster.name)
            .send()
            .await
            .map_err(|e| {
                let reason = DisplayErrorContext(&e).to_string();
                Error::lookup(&cluster.name, reason)
            })?;

        let info = resp.cluster().ok_or_else(|| {
            Error::lookup(&cluster.name, "unable to find cluster")
        })?;

        metadata_from(&cluster.name, info)
    }
}

pub(crate) fn metadata_from(
    name: &str,
    cluster: &eks::types::Cluster,
) -> Result<ClusterMetadata> {
    let b64_cert = cluster
        .certificate_authority()
        .ok_or_else(|| {
            Error::lookup(name, "unable to find certificate authority")
        })?
        .data()
        .ok_or_else(|| Error::lookup(name, "unable to find certificate data"))?;

    // EKS may wrap the encoded bundle across lines
    let compact: String =
        b64_cert.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let ca_certificate = STANDARD.decode(compact).map_err(|e| {
        Error::lookup(name, format!("invalid certificate data: {e}"))
    })?;

    let endpoint = cluster
        .endpoint()
        .ok_or_else(|| Error::lookup(name, "unable to find endpoint"))?
        .parse::<http::Uri>()
        .map_err(|e| Error::lookup(name, format!("invalid endpoint: {e}")))?;

    Ok(ClusterMetadata { endpoint, ca_certificate })
}
