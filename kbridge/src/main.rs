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

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use kbridge_aws_eks::{EksClusterLookup, SdkTokenMinter};
use kbridge_kube::KubeConnector;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::debug;

mod bridge;
mod config;
mod error;
mod response;

use bridge::{Bridge, Target};
use config::BridgeConfig;
use response::{BridgeResponse, Invocation};

#[derive(Debug, Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    about = "forward an event to a service inside an EKS cluster",
    version,
    author
)]
struct Args {
    /// Increase verbosity (use -v, -vv, ...).
    ///
    /// When no RUST_LOG is set, a single -v switches the log level to DEBUG.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// JSON event sent as the request body, `-` reads it from stdin.
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Extra request header, `NAME:VALUE`. Overrides the defaults.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Correlation id reported back in the response.
    #[arg(long, env = "KBRIDGE_INVOCATION_ID")]
    invocation_id: Option<String>,

    /// Identity of the caller reported back in the response.
    #[arg(
        long,
        env = "KBRIDGE_INVOCATION_SOURCE",
        default_value = env!("CARGO_PKG_NAME")
    )]
    source: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    kbridge_log::init(args.verbose);

    let config = config::load().context("failed to load configuration")?;
    let event = read_event(args.event.as_deref()).await?;
    let invocation = Invocation {
        id: args.invocation_id.clone().unwrap_or_else(local_invocation_id),
        source: args.source.clone(),
        event,
    };

    // dropping the invocation on a signal removes the CA file
    let response = tokio::select! {
        res = invoke(&config, &args.headers, invocation) => res?,
        signal = shutdown_signal() => {
            bail!("interrupted by {signal}");
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn invoke(
    config: &BridgeConfig,
    headers: &[(String, String)],
    invocation: Invocation,
) -> error::Result<BridgeResponse> {
    let cluster = config.identity();
    let mut target = config.target()?;
    add_caller_headers(&mut target, headers);

    let sdk_config = kbridge_aws_eks::load_sdk_config(&cluster.region).await;
    let bridge = Bridge::new(
        EksClusterLookup::new(&sdk_config),
        SdkTokenMinter::new(sdk_config.clone(), config.token_expires_in()),
        KubeConnector,
    )
    .with_ca_dir(config.ca_dir.clone());

    bridge.run(&cluster, &target, invocation).await
}

async fn read_event(path: Option<&Path>) -> Result<Value> {
    let raw = match path {
        None => return Ok(Value::Object(Default::default())),
        Some(p) if p == Path::new("-") => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        }
        Some(p) => tokio::fs::read(p)
            .await
            .with_context(|| format!("failed to read {}", p.display()))?,
    };
    debug!(bytes = raw.len(), "read event");

    serde_json::from_slice(&raw).context("event is not valid JSON")
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Later flags win over earlier ones, whatever the case of the name.
fn add_caller_headers(target: &mut Target, headers: &[(String, String)]) {
    for (name, value) in headers {
        target.headers.insert(name.to_ascii_lowercase(), value.clone());
    }
}

fn local_invocation_id() -> String {
    format!(
        "local-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        std::process::id()
    )
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut term) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return "SIGINT";
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers() {
        assert_eq!(
            parse_header("X-Test: 1").unwrap(),
            ("X-Test".to_string(), "1".to_string())
        );
        assert_eq!(
            parse_header("Accept:application/json").unwrap(),
            ("Accept".to_string(), "application/json".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn cli_collects_repeated_headers() {
        let args = Args::try_parse_from([
            "kbridge",
            "-vv",
            "-H",
            "X-Test: 1",
            "--header",
            "Accept: application/json",
            "--invocation-id",
            "req-1",
        ])
        .unwrap();

        assert_eq!(args.verbose, 2);
        assert_eq!(args.headers.len(), 2);
        assert_eq!(args.invocation_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn last_caller_header_wins_regardless_of_case() {
        let mut target = Target {
            namespace: "default".to_string(),
            service: "hello-svc".to_string(),
            port: 8080,
            path: "hello".to_string(),
            method: http::Method::GET,
            headers: Default::default(),
            timeout: std::time::Duration::from_secs(30),
        };
        let args = Args::try_parse_from([
            "kbridge", "-H", "accept:a", "-H", "Accept:b", "-H", "X-Id: 1",
        ])
        .unwrap();

        add_caller_headers(&mut target, &args.headers);

        assert_eq!(target.headers.len(), 2);
        assert_eq!(target.headers["accept"], "b");
        assert_eq!(target.headers["x-id"], "1");
    }

    #[tokio::test]
    async fn missing_event_is_an_empty_object() {
        assert_eq!(read_event(None).await.unwrap(), serde_json::json!({}));
    }

    #[tokio::test]
    async fn reads_event_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, br#"{"detail":{"id":7}}"#).unwrap();

        let event = read_event(Some(&path)).await.unwrap();
        assert_eq!(event["detail"]["id"], 7);
    }

    #[tokio::test]
    async fn rejects_invalid_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(read_event(Some(&path)).await.is_err());
    }

    #[test]
    fn local_ids_are_prefixed() {
        assert!(local_invocation_id().starts_with("local-"));
    }
}
