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

//! Authenticated calls against the Kubernetes API server.
//!
//! One [`kube::Client`], carrying the bearer token and pinned to the cluster
//! CA, serves every call of an invocation.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::Service;
use kube::client::Body;
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::{Error, Result, TlsTrust};

const CONTEXT_NAME: &str = "kbridge";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A request forwarded through the service proxy sub-resource.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub namespace: String,
    pub service: String,
    pub port: u16,
    pub path: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl ProxyRequest {
    /// `/api/v1/namespaces/{ns}/services/{svc}:{port}/proxy/{path}`
    pub fn proxy_path(&self) -> String {
        format!(
            "/api/v1/namespaces/{}/services/{}:{}/proxy/{}",
            self.namespace,
            self.service,
            self.port,
            self.path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: Bytes,
}

#[async_trait]
pub trait ApiServer: Send + Sync {
    /// Names of the services in `namespace`.
    ///
    /// An empty namespace yields an empty set; a namespace that does not
    /// exist is [`Error::NamespaceNotFound`].
    async fn list_services(&self, namespace: &str) -> Result<BTreeSet<String>>;

    async fn proxy(&self, request: &ProxyRequest) -> Result<ProxyResponse>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens the authenticated session for one invocation.
    async fn connect(
        &self,
        trust: &TlsTrust,
        token: &str,
    ) -> Result<Box<dyn ApiServer>>;
}

/// Builds [`KubeApiServer`]s from a generated kubeconfig.
#[derive(Debug, Default, Clone)]
pub struct KubeConnector;

#[async_trait]
impl Connector for KubeConnector {
    async fn connect(
        &self,
        trust: &TlsTrust,
        token: &str,
    ) -> Result<Box<dyn ApiServer>> {
        Ok(Box::new(KubeApiServer::connect(trust, token).await?))
    }
}

#[derive(Clone)]
pub struct KubeApiServer {
    client: kube::Client,
}

impl KubeApiServer {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    pub async fn connect(trust: &TlsTrust, token: &str) -> Result<Self> {
        // kube and aws-sdk may pull in different rustls providers
        let _ = rustls::crypto::ring::default_provider().install_default();

        let config = client_config(trust, token).await?;
        debug!(endpoint = %trust.endpoint(), "connecting to api server");
        let client = kube::Client::try_from(config)?;
        Ok(Self::new(client))
    }

    async fn send(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> Result<(StatusCode, Bytes)> {
        let response = self.client.send(request.map(Body::from)).await?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to read response body: {e}"
                )))
            })?
            .to_bytes();
        Ok((status, body))
    }

    async fn get(&self, path: &str) -> Result<(StatusCode, Bytes)> {
        let request = http::Request::get(path)
            .header(ACCEPT, "application/json")
            .body(Vec::new())
            .map_err(|e| Error::invalid(e.to_string()))?;
        self.send(request).await
    }
}

#[async_trait]
impl ApiServer for KubeApiServer {
    async fn list_services(&self, namespace: &str) -> Result<BTreeSet<String>> {
        validate_name("namespace", namespace)?;

        let path = format!("/api/v1/namespaces/{namespace}/services");
        let (status, body) = self.get(&path).await?;
        if !status.is_success() {
            return Err(upstream(status, &body));
        }

        let list: ServiceList = serde_json::from_slice(&body)?;
        let services: BTreeSet<String> = list
            .items
            .into_iter()
            .filter_map(|service| service.metadata.name)
            .collect();

        if services.is_empty() {
            // listing a missing namespace is not an error upstream
            let path = format!("/api/v1/namespaces/{namespace}");
            let (status, body) = self.get(&path).await?;
            match status {
                StatusCode::NOT_FOUND => {
                    return Err(Error::NamespaceNotFound {
                        namespace: namespace.to_string(),
                    });
                }
                // denied to a role that may only list services
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    debug!(namespace, %status, "namespace lookup denied");
                }
                _ if !status.is_success() => {
                    return Err(upstream(status, &body));
                }
                _ => {}
            }
        }

        info!(namespace, count = services.len(), "listed services");
        Ok(services)
    }

    async fn proxy(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        validate_name("namespace", &request.namespace)?;
        validate_name("service", &request.service)?;

        let headers =
            merge_headers(&request.headers, !request.body.is_empty())?;
        let mut outgoing = http::Request::builder()
            .method(request.method.clone())
            .uri(request.proxy_path())
            .body(request.body.clone())
            .map_err(|e| Error::invalid(e.to_string()))?;
        *outgoing.headers_mut() = headers;

        info!(
            namespace = %request.namespace,
            service = %request.service,
            port = request.port,
            method = %request.method,
            path = %request.path,
            "proxying request"
        );

        let timeout = request.timeout;
        let (status, body) = tokio::time::timeout(timeout, self.send(outgoing))
            .await
            .map_err(|_| Error::ProxyTimeout { timeout })??;

        info!(status = status.as_u16(), "proxy response");
        if !status.is_success() {
            return Err(upstream(status, &body));
        }

        Ok(ProxyResponse { status: status.as_u16(), body })
    }
}

#[derive(Deserialize)]
struct ServiceList {
    #[serde(default)]
    items: Vec<Service>,
}

/// Default headers overlaid with the caller's.
///
/// Header names compare case-insensitively and a caller value replaces the
/// default for the same name. `Authorization` is reserved for the bearer
/// token and never taken from the caller.
pub fn merge_headers(
    caller: &BTreeMap<String, String>,
    has_body: bool,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    if has_body {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    for (name, value) in caller {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid(format!("header {name:?}: {e}")))?;
        if name == AUTHORIZATION {
            debug!("ignoring caller supplied authorization header");
            continue;
        }
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid(format!("header {name}: {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Client settings for one session. Only the connect phase has a fixed
/// bound; a proxied call is bounded by its own request timeout.
async fn client_config(trust: &TlsTrust, token: &str) -> Result<kube::Config> {
    let mut config = kube::Config::from_custom_kubeconfig(
        kubeconfig(trust, token)?,
        &KubeConfigOptions::default(),
    )
    .await?;
    config.accept_invalid_certs = false;
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = None;
    config.write_timeout = None;
    Ok(config)
}

fn kubeconfig(trust: &TlsTrust, token: &str) -> Result<Kubeconfig> {
    let kubeconfig = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": CONTEXT_NAME,
            "cluster": {
                "server": trust.endpoint().to_string(),
                "certificate-authority": trust.ca_path(),
            },
        }],
        "users": [{
            "name": CONTEXT_NAME,
            "user": { "token": token },
        }],
        "contexts": [{
            "name": CONTEXT_NAME,
            "context": { "cluster": CONTEXT_NAME, "user": CONTEXT_NAME },
        }],
        "current-context": CONTEXT_NAME,
    }))?;
    Ok(kubeconfig)
}

fn validate_name(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_lowercase()
                || b.is_ascii_digit()
                || b == b'-'
                || b == b'.'
        });
    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!("invalid {kind} name {value:?}")))
    }
}

fn upstream(status: StatusCode, body: &[u8]) -> Error {
    Error::Upstream {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).into_owned(),
    }
}
