//! Command-line parsing for `tekc`.

use std::path::PathBuf;

use tek_diagnostic::ColorMode;

use crate::config::CompilerConfig;

pub const USAGE: &str = "\
Usage: tekc <root.tek> [options]

Options:
  -j <n>, --workers=<n>  Worker threads (default: available cores)
  --color=<when>         Color errors: auto, always, never
  --dump-tokens          Print each file's tokens after a clean run
  -h, --help             Print this help";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Compile { root: PathBuf, config: CompilerConfig },
    Help,
}

/// Parses the arguments after the program name.
pub fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut root = None;
    let mut config = CompilerConfig::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "-h" || arg == "--help" {
            return Ok(Command::Help);
        } else if arg == "-j" || arg == "--workers" {
            i += 1;
            let value = args
                .get(i)
                .ok_or_else(|| format!("'{arg}' needs a worker count"))?;
            config = config.with_workers(parse_workers(value)?);
        } else if let Some(value) = arg.strip_prefix("--workers=") {
            config = config.with_workers(parse_workers(value)?);
        } else if let Some(value) = arg.strip_prefix("--color=") {
            let color = ColorMode::parse(value).ok_or_else(|| {
                format!("invalid color mode '{value}' (expected auto, always or never)")
            })?;
            config = config.with_color(color);
        } else if arg == "--dump-tokens" {
            config = config.with_dump_tokens(true);
        } else if arg.starts_with('-') {
            return Err(format!("unknown option '{arg}'"));
        } else if root.is_some() {
            return Err(format!("unexpected argument '{arg}'"));
        } else {
            root = Some(PathBuf::from(arg));
        }
        i += 1;
    }
    let root = root.ok_or_else(|| "missing root source file".to_string())?;
    Ok(Command::Compile { root, config })
}

fn parse_workers(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(workers) if workers > 0 => Ok(workers),
        _ => Err(format!("invalid worker count '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| (*arg).to_string()).collect()
    }

    fn compile(list: &[&str]) -> (PathBuf, CompilerConfig) {
        match parse_args(&args(list)) {
            Ok(Command::Compile { root, config }) => (root, config),
            other => panic!("expected a compile command, got {other:?}"),
        }
    }

    #[test]
    fn test_root_only() {
        let (root, config) = compile(&["main.tek"]);
        assert_eq!(root, PathBuf::from("main.tek"));
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_workers_both_spellings() {
        assert_eq!(compile(&["-j", "3", "main.tek"]).1.workers, 3);
        assert_eq!(compile(&["main.tek", "--workers=5"]).1.workers, 5);
    }

    #[test]
    fn test_color() {
        assert_eq!(compile(&["--color=never", "a.tek"]).1.color, ColorMode::Never);
        assert!(parse_args(&args(&["--color=sometimes", "a.tek"])).is_err());
    }

    #[test]
    fn test_dump_tokens() {
        assert!(!compile(&["a.tek"]).1.dump_tokens);
        assert!(compile(&["a.tek", "--dump-tokens"]).1.dump_tokens);
        assert!(parse_args(&args(&["--dump-tokens=yes", "a.tek"])).is_err());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_args(&args(&[])),
            Err("missing root source file".to_string())
        );
        assert!(parse_args(&args(&["a.tek", "b.tek"])).is_err());
        assert!(parse_args(&args(&["--fast", "a.tek"])).is_err());
        assert!(parse_args(&args(&["-j", "0", "a.tek"])).is_err());
        assert!(parse_args(&args(&["a.tek", "-j"])).is_err());
    }

    #[test]
    fn test_help() {
        assert_eq!(parse_args(&args(&["a.tek", "--help"])), Ok(Command::Help));
    }
}
