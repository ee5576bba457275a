//! # mirel - Link Graph Mirror
//!
//! Binary entry point wiring the CLI (clap) and the HTTP API (axum) to
//! the mirel-core mirror logic. Both surfaces work against the same
//! snapshot file, so `mirel serve` and one-shot commands can be mixed
//! freely:
//!
//! ```bash
//! mirel serve --host 0.0.0.0 --port 8080
//! mirel status
//! mirel load links.json
//! mirel query '{"type_id": 3}'
//! ```

use clap::Parser;
use mirel::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` picks the default
/// filter. `MIREL_LOG_FORMAT=json` switches to machine-parseable output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "mirel=debug,tower_http=debug"
    } else {
        "mirel=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let base = tracing_subscriber::registry().with(filter);
    if std::env::var("MIREL_LOG_FORMAT").is_ok_and(|v| v == "json") {
        base.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        base.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    // Parse first so --verbose can shape the default log filter.
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("command failed: {e}");
        std::process::exit(1);
    }
}

/// Print the mirel startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ███╗██╗██████╗ ███████╗██╗
  ████╗ ████║██║██╔══██╗██╔════╝██║
  ██╔████╔██║██║██████╔╝█████╗  ██║
  ██║╚██╔╝██║██║██╔══██╗██╔══╝  ██║
  ██║ ╚═╝ ██║██║██║  ██║███████╗███████╗
  ╚═╝     ╚═╝╚═╝╚═╝  ╚═╝╚══════╝╚══════╝

  Link Graph Mirror v{}

  Ordered • Retroactive • Queryable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
