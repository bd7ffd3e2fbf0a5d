use clap::Parser;

mod args;
mod config;
mod run;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("ffmpeg_next", log::LevelFilter::Error)
        .init();
}

fn main() {
    let args = args::Args::parse();
    init_logging();

    if let Err(e) = run::run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(run::exit_code(&e));
    }
}
