//! One-shot resolution command.

use std::sync::Arc;

use console::style;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::resolver::Resolver;
use crate::scrapers::BrowserEngine;
use crate::server::start_engine;

/// Resolve a single landing page and print the result as JSON.
pub async fn cmd_resolve(mut config: Config, url: &str, no_browser: bool) -> anyhow::Result<()> {
    if no_browser {
        config.browser.enabled = false;
    }

    let engine = Arc::new(BrowserEngine::new(config.browser.clone()));
    start_engine(&engine).await;
    let resolver = Resolver::new(&config, engine.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    eprintln!("{} Resolving {}", style("→").cyan(), url);
    let outcome = resolver.resolve(url, &cancel).await;
    engine.shutdown().await;

    match outcome {
        Ok(result) => {
            eprintln!(
                "  {} {} of {} variant links found ({})",
                style("✓").green(),
                result.found_count(),
                result.download_links.len(),
                result.strategy
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("  {} {}", style("✗").red(), e);
            println!("{}", serde_json::to_string_pretty(&e.payload())?);
            Err(anyhow::anyhow!("resolution failed ({})", e.kind()))
        }
    }
}
