//! Command-line front-end for the Glass interpreter.

use std::{env, io::Write as _, path::PathBuf, process::ExitCode};

use glass::{Options, Runner};

const USAGE: &str = "\
Usage: glass [options] <file>

Run a Glass program, or transform its source.

Options:
  --minify       print a minified program to standard output and exit
  --convert      print a standards-compliant program (inheritance resolved,
                 includes flattened) to standard output and exit
  --width <n>    wrap --minify/--convert output to n columns (0 = no wrap)
  --pedantic     reject non-standard extensions at parse time
  --no-opt       skip the optimizer before interpretation
  --help         print this message and exit
";

#[derive(Debug, Default)]
struct Args {
    file: Option<PathBuf>,
    minify: bool,
    convert: bool,
    pedantic: bool,
    no_opt: bool,
    width: Option<usize>,
}

fn parse_args(raw: &[String]) -> Result<Option<Args>, String> {
    let mut args = Args::default();
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" => return Ok(None),
            "--minify" => args.minify = true,
            "--convert" => args.convert = true,
            "--pedantic" => args.pedantic = true,
            "--no-opt" => args.no_opt = true,
            "--width" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--width requires a value".to_owned())?;
                let width = value
                    .parse()
                    .map_err(|_| format!("invalid --width value {value:?}"))?;
                args.width = Some(width);
            }
            flag if flag.starts_with("--") => {
                return Err(format!("unknown option {flag:?}"));
            }
            file => {
                if args.file.replace(PathBuf::from(file)).is_some() {
                    return Err("more than one source file given".to_owned());
                }
            }
        }
    }

    if args.file.is_none() {
        return Err("no source file given".to_owned());
    }
    if args.minify && args.convert {
        return Err("--minify and --convert are mutually exclusive".to_owned());
    }
    if args.width.is_some() && !(args.minify || args.convert) {
        return Err("--width requires --minify or --convert".to_owned());
    }
    Ok(Some(args))
}

fn main() -> ExitCode {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("error: {message}");
            eprint!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let render = args.minify || args.convert;
    let options = Options {
        pedantic: args.pedantic,
        // Rendering needs the unoptimized opcode stream.
        optimize: !args.no_opt && !render,
    };

    let file = args.file.expect("validated above");
    let runner = match Runner::from_file(&file, &options) {
        Ok(runner) => runner,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if render {
        let width = args.width.unwrap_or(0);
        let source = if args.minify {
            runner.minified(width)
        } else {
            runner.converted(width)
        };
        let mut stdout = std::io::stdout().lock();
        if stdout
            .write_all(&source)
            .and_then(|()| stdout.write_all(b"\n"))
            .is_err()
        {
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    match runner.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
