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

//! Sequences one invocation:
//!
//! ```text
//! Start -> MetadataFetched -> Authenticated -> ServiceValidated -> Proxied -> Done
//! ```
//!
//! Any error moves the invocation to `Failed` and is returned as is. Nothing
//! is retried and nothing outlives the call to [`Bridge::run`]; the cluster
//! CA file is removed when the trust value drops at the end of it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use http::Method;
use kbridge_aws_eks::{ClusterIdentity, ClusterLookup, TokenSource};
use kbridge_kube::{Connector, ProxyRequest, trust};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::response::{BridgeResponse, Invocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    MetadataFetched,
    Authenticated,
    ServiceValidated,
    Proxied,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::MetadataFetched => "metadata-fetched",
            Stage::Authenticated => "authenticated",
            Stage::ServiceValidated => "service-validated",
            Stage::Proxied => "proxied",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// The service a request is forwarded to.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub namespace: String,
    pub service: String,
    pub port: u16,
    pub path: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

pub struct Bridge<L, T, C> {
    lookup: L,
    tokens: T,
    connector: C,
    ca_dir: Option<PathBuf>,
}

impl<L, T, C> Bridge<L, T, C>
where
    L: ClusterLookup,
    T: TokenSource,
    C: Connector,
{
    pub fn new(lookup: L, tokens: T, connector: C) -> Self {
        Self { lookup, tokens, connector, ca_dir: None }
    }

    pub fn with_ca_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.ca_dir = dir;
        self
    }

    pub async fn run(
        &self,
        cluster: &ClusterIdentity,
        target: &Target,
        invocation: Invocation,
    ) -> Result<BridgeResponse> {
        info!(
            invocation = %invocation.id,
            cluster = %cluster.name,
            region = %cluster.region,
            "invocation started"
        );

        let mut stage = Stage::Start;
        let result = self.drive(&mut stage, cluster, target, invocation).await;

        match &result {
            Ok(response) => {
                info!(status = response.response.status, "invocation done")
            }
            Err(err) => warn!(%stage, error = %err, "invocation failed"),
        }
        result
    }

    async fn drive(
        &self,
        stage: &mut Stage,
        cluster: &ClusterIdentity,
        target: &Target,
        invocation: Invocation,
    ) -> Result<BridgeResponse> {
        let metadata = self.lookup.describe(cluster).await?;
        advance(stage, Stage::MetadataFetched);

        let (token, trust) = tokio::try_join!(
            async { self.tokens.mint(cluster).await.map_err(BridgeError::from) },
            async {
                trust::resolve(
                    &metadata.endpoint,
                    &metadata.ca_certificate,
                    self.ca_dir.as_deref(),
                )
                .map_err(BridgeError::from)
            },
        )?;
        advance(stage, Stage::Authenticated);

        let api = self.connector.connect(&trust, token.as_str()).await?;
        let services = api.list_services(&target.namespace).await?;
        if !services.contains(&target.service) {
            return Err(BridgeError::ServiceNotFound {
                service: target.service.clone(),
                namespace: target.namespace.clone(),
            });
        }
        advance(stage, Stage::ServiceValidated);

        let request = ProxyRequest {
            namespace: target.namespace.clone(),
            service: target.service.clone(),
            port: target.port,
            path: target.path.clone(),
            method: target.method.clone(),
            headers: target.headers.clone(),
            body: serde_json::to_vec(&invocation.event)?,
            timeout: target.timeout,
        };
        let upstream = api.proxy(&request).await?;
        advance(stage, Stage::Proxied);

        let response = BridgeResponse::new(invocation, &upstream);
        advance(stage, Stage::Done);

        // end of the authenticated session
        drop(api);
        drop(trust);
        Ok(response)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "stage");
    *stage = next;
}
