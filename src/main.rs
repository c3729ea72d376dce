use clap::Parser;
use notemirror::cli::{handle_get, handle_list, handle_retry, handle_serve, Cli, Commands};
use notemirror::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(&cli.database, args),
        Commands::Retry {
            id,
            limit,
            notion,
            json,
        } => handle_retry(&cli.database, id, limit, notion, json),
        Commands::List {
            status,
            limit,
            json,
        } => handle_list(&cli.database, status, limit, json),
        Commands::Get { id, json } => handle_get(&cli.database, id, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
