use clap::Parser;

fn main() {
    let config = tileworld::AppConfig::parse();
    if let Err(err) = tileworld::run(&config) {
        tracing::error!(error = %err, "server exited with an error");
        eprintln!("tileworld: {err}");
        std::process::exit(1);
    }
}
