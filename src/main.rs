mod adapters;
mod cli;
mod config;
mod core;

use std::path::Path;

use clap::Parser;

use cli::{Cli, Commands};
use config::app_config::AppConfig;

fn main() {
    let args = Cli::parse();

    let app_config = match AppConfig::load(args.config.as_deref().map(Path::new)) {
        Ok(config) => config,
        Err(e) => {
            cli::output::error(&format!("Error: {e}"));
            std::process::exit(1);
        }
    };
    cli::context::init(&args, &app_config);

    let result = match &args.command {
        Commands::Encrypt {
            image,
            new_name,
            recipients,
            selection,
            decryption,
        } => cli::commands::encrypt::execute(
            image,
            new_name.as_deref(),
            recipients,
            selection,
            decryption,
        ),
        Commands::Decrypt {
            image,
            new_name,
            selection,
            decryption,
        } => cli::commands::decrypt::execute(image, new_name.as_deref(), selection, decryption),
        Commands::Layers { image, selection } => cli::commands::layers::execute(image, selection),
        Commands::Stream => cli::commands::stream::execute(),
    };

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}
