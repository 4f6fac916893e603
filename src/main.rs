use clap::Parser;

use crate::{
    cli::{Cli, Command},
    config::Config,
    render::Bibtex2Html,
};

mod cli;
mod config;
mod pipeline;
mod render;
mod source;
mod tidy;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::load(&args.config)?;

    match args.command {
        Command::Fetch => source::fetch_all(&config),
        Command::Build => build(&config),
        Command::Run => {
            source::fetch_all(&config)?;
            build(&config)
        }
    }
}

fn build(config: &Config) -> anyhow::Result<()> {
    let renderer = Bibtex2Html::new(&config.renderer_dir, &config.style_file)?;
    pipeline::build(config, &renderer)?;
    tidy::clean_output(&config.output_dir)
}
