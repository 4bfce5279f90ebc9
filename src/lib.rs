//! getlink - resolve gated file-host landing pages into direct download links.
//!
//! A landing page hides its destination behind inline script. The resolver
//! finds that redirect, follows it to the file page, and probes the file's
//! variant pages for download links. Pages are fetched with browser-like
//! HTTP first and rendered in a real browser when that fails.

pub mod cli;
pub mod config;
pub mod resolver;
pub mod scrapers;
pub mod server;

pub use config::Config;
pub use resolver::{ResolutionResult, ResolveError, Resolver};
