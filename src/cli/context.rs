use std::path::PathBuf;
use std::sync::OnceLock;

use crate::adapters::crypt::gpg::GpgClient;
use crate::config::app_config::{AppConfig, AuditSection};

struct Context {
    store_dir: PathBuf,
    gpg_binary: Option<String>,
    gpg_homedir: Option<String>,
    audit: Option<AuditSection>,
    verbose: bool,
    quiet: bool,
}

static CONTEXT: OnceLock<Context> = OnceLock::new();

/// Resolve the global command context once, from CLI flags layered
/// over the config file. Flags win.
pub fn init(cli: &crate::cli::Cli, config: &AppConfig) {
    let store_dir = cli
        .store
        .clone()
        .or_else(|| config.store.path.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let _ = CONTEXT.set(Context {
        store_dir,
        gpg_binary: cli.gpg_binary.clone().or_else(|| config.gpg.binary.clone()),
        gpg_homedir: cli
            .gpg_homedir
            .clone()
            .or_else(|| config.gpg.homedir.clone()),
        audit: config.audit.clone(),
        verbose: cli.verbose,
        quiet: cli.quiet,
    });
}

fn context() -> Option<&'static Context> {
    CONTEXT.get()
}

/// The OCI layout directory commands operate on.
pub fn store_dir() -> PathBuf {
    context()
        .map(|c| c.store_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// A gpg client configured from the context.
pub fn gpg_client() -> GpgClient {
    match context() {
        Some(c) => GpgClient::with_options(c.gpg_binary.as_deref(), c.gpg_homedir.as_deref()),
        None => GpgClient::new(),
    }
}

pub fn audit_section() -> Option<AuditSection> {
    context().and_then(|c| c.audit.clone())
}

pub fn verbose() -> bool {
    context().is_some_and(|c| c.verbose)
}

pub fn quiet() -> bool {
    context().is_some_and(|c| c.quiet)
}

/// Store path helper for messages.
pub fn store_display() -> String {
    store_dir().display().to_string()
}
