use clap::Parser;

#[tokio::main]
async fn main() {
    // A .env file feeds the env-backed flags, so it is read before parsing
    dotenvy::dotenv().ok();

    let cli = stratum::cli::Cli::parse();
    if let Err(e) = stratum::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
