mod cli;
mod commands;
mod error;
mod frontend;
mod hardware;
mod logging;

use clap::Parser;

use crate::cli::{Cli, Command, RunArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        None => commands::run::handle(&RunArgs::default(), &cli.global).await,
        Some(Command::Run(ref args)) => commands::run::handle(args, &cli.global).await,

        Some(Command::Ping(ref args)) => {
            let _log_guard =
                logging::init(cli.global.verbose, cli.global.quiet, cli.global.log_file.as_deref());
            commands::ping::handle(args, &cli.global).await
        }

        Some(Command::Config(ref args)) => commands::config_cmd::handle(args, &cli.global),

        Some(Command::Completions(ref args)) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "talkgate", &mut std::io::stdout());
            Ok(())
        }
    }
}
