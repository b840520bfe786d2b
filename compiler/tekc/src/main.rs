//! Tek compiler CLI.

use std::io::IsTerminal;

use tek_diagnostic::TerminalEmitter;
use tekc::cli::{parse_args, Command, USAGE};
use tekc::Compiler;

fn main() {
    tekc::tracing_setup::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (root, config) = match parse_args(&args) {
        Ok(Command::Compile { root, config }) => (root, config),
        Ok(Command::Help) => {
            println!("{USAGE}");
            return;
        }
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!();
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let color = config.color;
    let dump_tokens = config.dump_tokens;
    let compiler = match Compiler::new(root, config).and_then(Compiler::run) {
        Ok(compiler) => compiler,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let mut emitter = TerminalEmitter::stderr(color, std::io::stderr().is_terminal());
    compiler.report(&mut emitter);
    if compiler.has_errors() {
        std::process::exit(1);
    }
    if dump_tokens {
        if let Err(err) = compiler.dump_tokens(&mut std::io::stdout().lock()) {
            eprintln!("error: failed to write tokens: {err}");
            std::process::exit(2);
        }
    }
}
