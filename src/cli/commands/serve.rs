//! Web server command.

use console::style;

use crate::config::Config;

/// Port used when neither `--bind` nor `PORT` gives one.
const DEFAULT_PORT: u16 = 10000;

/// Start the web server.
pub async fn cmd_serve(config: &Config, bind: Option<&str>) -> anyhow::Result<()> {
    let default_port = env_port()?;
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, default_port),
        None => ("0.0.0.0".to_string(), default_port),
    };

    println!(
        "{} Starting getlink server at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    if config.browser.enabled {
        println!("  Rendered fallback: {}", style("enabled").green());
    } else {
        println!("  Rendered fallback: {}", style("disabled").yellow());
    }
    println!("  Press Ctrl+C to stop");

    crate::server::serve(config, &host, port).await
}

fn env_port() -> anyhow::Result<u16> {
    match std::env::var("PORT") {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a port number, got '{}'", val)),
        _ => Ok(DEFAULT_PORT),
    }
}

/// Parse a bind address that can be:
/// - Just a port: "3030" -> 0.0.0.0:3030
/// - Just a host: "127.0.0.1" -> 127.0.0.1:default_port
/// - Host and port: "127.0.0.1:3030" -> 127.0.0.1:3030
fn parse_bind_address(bind: &str, default_port: u16) -> (String, u16) {
    if let Ok(port) = bind.parse::<u16>() {
        return ("0.0.0.0".to_string(), port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), port);
        }
    }

    (bind.to_string(), default_port)
}
