use log::error;
use smlreader::SmlReader;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::process;

fn print_usage(program: &str) {
    println!("Usage: {} [FILE]...", program);
    println!("  Reads FILE(s) and prints every meter reading found");
}

fn main() {
    let default_filter = env::var("SMLMON_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut reader = SmlReader::new();
    reader.register(&[], |entry| {
        println!("{}", entry);
    });

    for path in &args[1..] {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                error!("cannot open {}: {}", path, err);
                process::exit(1);
            }
        };
        if let Err(err) = reader.read(BufReader::new(file)) {
            error!("read failed on {}: {}", path, err);
            process::exit(1);
        }
    }
}
