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

use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &["kbridge", "kbridge_aws_eks", "kbridge_kube"];

/// Installs the global subscriber.
///
/// Logs go to stderr, stdout is reserved for the bridge response.
pub fn init(verbose: u8) {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let stderr_layer =
        fmt::layer().without_time().with_writer(std::io::stderr);

    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(stderr_layer)
            .init();
        return;
    }

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(stderr_layer)
        .init();
}

fn filter(verbose: u8) -> EnvFilter {
    EnvFilter::new(directives(verbose))
}

fn directives(verbose: u8) -> String {
    let level = if verbose > 0 { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
