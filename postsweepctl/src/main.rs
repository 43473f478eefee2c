use clap::Parser;

fn main() {
    let cli = postsweepctl::Cli::parse();
    if let Err(err) = postsweepctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
