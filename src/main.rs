use clap::Parser;
use env_logger::Env;

fn main() {
    let args = sicld::cli::Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let loader = match args.build_config().and_then(|config| sicld::Loader::new(&config)) {
        Ok(loader) => loader,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = sicld::run(&args, &loader) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
