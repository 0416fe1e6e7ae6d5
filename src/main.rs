use clap::Parser as ClapParser;

use swell::diag::SwellError;
use swell::driver::{RunOptions, run};

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input graph file path
    input: String,

    /// Comma-separated list of things to dump: before,states
    #[clap(long)]
    dump: Option<String>,
}

fn main() {
    let args = Args::parse();
    let opts = RunOptions { dump: args.dump };
    let output = std::fs::read_to_string(&args.input)
        .map_err(SwellError::Io)
        .and_then(|source| run(&source, &opts));
    match output {
        Ok(text) => print!("{text}"),
        Err(e) => println!("[ERROR] {e}"),
    }
}
