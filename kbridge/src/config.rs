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

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use http::Method;
use kbridge_aws_eks::ClusterIdentity;
use serde::Deserialize;
use tracing::debug;

use crate::bridge::Target;
use crate::error::{BridgeError, Result};

const DEFAULT_REGION: &str = "eu-central-1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_METHOD: &str = "GET";
const DEFAULT_PATH: &str = "hello";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_EXPIRES_SECS: u64 = 60;
const MAX_TOKEN_EXPIRES_SECS: u64 = 900;

/// Process configuration, read from `config/kbridge` and the environment
/// (`CLUSTER_NAME`, `SERVICE_PORT`, ...).
#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    pub cluster_name: String,
    #[serde(default = "default_region")]
    pub cluster_region: String,
    pub service_namespace: String,
    pub service_name: String,
    #[serde(default = "default_port")]
    pub service_port: u16,
    #[serde(default = "default_method")]
    pub service_request_method: String,
    #[serde(default = "default_path")]
    pub service_request_path: String,
    /// Seconds.
    #[serde(default = "default_timeout")]
    pub service_request_timeout: u64,
    /// Seconds.
    #[serde(default = "default_token_expires")]
    pub token_expires_in: u64,
    /// Where the cluster CA is materialized; the system temp dir if unset.
    pub ca_dir: Option<PathBuf>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_token_expires() -> u64 {
    DEFAULT_TOKEN_EXPIRES_SECS
}

impl BridgeConfig {
    pub fn identity(&self) -> ClusterIdentity {
        ClusterIdentity::new(&self.cluster_name, &self.cluster_region)
    }

    pub fn token_expires_in(&self) -> Duration {
        Duration::from_secs(self.token_expires_in)
    }

    pub fn method(&self) -> Result<Method> {
        let method = self.service_request_method.to_ascii_uppercase();
        Method::from_bytes(method.as_bytes()).map_err(|_| {
            BridgeError::config(format!(
                "invalid request method {:?}",
                self.service_request_method
            ))
        })
    }

    pub fn target(&self) -> Result<Target> {
        Ok(Target {
            namespace: self.service_namespace.clone(),
            service: self.service_name.clone(),
            port: self.service_port,
            path: self.service_request_path.clone(),
            method: self.method()?,
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(self.service_request_timeout),
        })
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("cluster_name", &self.cluster_name),
            ("service_namespace", &self.service_namespace),
            ("service_name", &self.service_name),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::config(format!("{key} is empty")));
            }
        }
        if self.service_port == 0 {
            return Err(BridgeError::config("service_port must be non-zero"));
        }
        if self.service_request_timeout == 0 {
            return Err(BridgeError::config(
                "service_request_timeout must be non-zero",
            ));
        }
        if !(1..=MAX_TOKEN_EXPIRES_SECS).contains(&self.token_expires_in) {
            return Err(BridgeError::config(format!(
                "token_expires_in must be between 1 and {MAX_TOKEN_EXPIRES_SECS}"
            )));
        }
        self.method()?;
        Ok(())
    }
}

pub(crate) fn load() -> Result<BridgeConfig> {
    load_from(config::Environment::default())
}

fn load_from(environment: config::Environment) -> Result<BridgeConfig> {
    debug!("loading");
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/kbridge").required(false))
        .add_source(environment.try_parsing(true))
        .build()?;

    let cfg: BridgeConfig = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("CLUSTER_NAME", "demo"),
        ("SERVICE_NAMESPACE", "default"),
        ("SERVICE_NAME", "hello-svc"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = load_from(env(&REQUIRED)).unwrap();

        assert_eq!(cfg.identity(), ClusterIdentity::new("demo", "eu-central-1"));
        assert_eq!(cfg.token_expires_in(), Duration::from_secs(60));
        assert!(cfg.ca_dir.is_none());

        let target = cfg.target().unwrap();
        assert_eq!(target.namespace, "default");
        assert_eq!(target.service, "hello-svc");
        assert_eq!(target.port, 8080);
        assert_eq!(target.path, "hello");
        assert_eq!(target.method, Method::GET);
        assert_eq!(target.timeout, Duration::from_secs(30));
        assert!(target.headers.is_empty());
    }

    #[test]
    fn environment_overrides_defaults() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("CLUSTER_REGION", "us-east-1"),
            ("SERVICE_PORT", "9090"),
            ("SERVICE_REQUEST_METHOD", "post"),
            ("SERVICE_REQUEST_PATH", "api/v1/items"),
            ("SERVICE_REQUEST_TIMEOUT", "5"),
            ("TOKEN_EXPIRES_IN", "120"),
        ]);

        let cfg = load_from(env(&vars)).unwrap();
        assert_eq!(cfg.cluster_region, "us-east-1");

        let target = cfg.target().unwrap();
        assert_eq!(target.port, 9090);
        assert_eq!(target.method, Method::POST);
        assert_eq!(target.path, "api/v1/items");
        assert_eq!(target.timeout, Duration::from_secs(5));
        assert_eq!(cfg.token_expires_in(), Duration::from_secs(120));
    }

    #[test]
    fn missing_cluster_name_is_rejected() {
        let err = load_from(env(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            ("SERVICE_PORT", "not-a-port"),
            ("SERVICE_PORT", "0"),
            ("SERVICE_REQUEST_TIMEOUT", "0"),
            ("SERVICE_REQUEST_METHOD", "GE T"),
            ("TOKEN_EXPIRES_IN", "0"),
            ("TOKEN_EXPIRES_IN", "3600"),
            ("SERVICE_NAME", " "),
        ];

        for (key, value) in cases {
            let mut vars = REQUIRED.to_vec();
            vars.retain(|(k, _)| *k != key);
            vars.push((key, value));

            let err = load_from(env(&vars)).unwrap_err();
            assert!(matches!(err, BridgeError::Config(_)), "{key}={value}");
        }
    }
}
