use daemonizer::cli::Cli;

fn main() {
    daemonizer::logging::init();

    match Cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("✗ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
