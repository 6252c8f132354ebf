mod cli;
mod vision;

use clap::Parser;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    vision::init_subscriber();
    let cli = cli::Cli::parse();
    cli::handle_command(cli)
}
