//
// main.rs
// The Babel Compiler
//

//! `babelc` is the command-line driver for the Babel compiler.
//!
//! ## Basic usage:
//!
//! `babelc program.ba`
//!
//! Compiles `program.ba` and writes the emitted SSA IR module next to
//! the source as `program.ll` (override the path with `-o`). The
//! compiler exits with status `0` on success and a non-zero status
//! after any fatal diagnostic.
//!
//! Invoked without a source file, `babelc` starts an interactive
//! shell. Each line is tokenized and parsed, and either the concrete
//! parse tree or the syntax error is printed; the shell itself never
//! aborts on user errors. Exit with end-of-input (Ctrl-D).

#[macro_use]
extern crate clap;
extern crate babel;

use std::fs::File;
use std::io::prelude::*;
use std::io::{ stderr, stdin, stdout };
use std::path::{ Path, PathBuf };
use std::time::Instant;

use babel::codegen::Codegen;
use babel::error::{ Error, Result };
use babel::grammar::babel_grammar;
use babel::lexer;
use babel::lrtable::LRTable;
use babel::parser::Parser;
use babel::util::{ Diagnostic, DiagnosticKind, PACKAGE_INFO };


// Reporting elapsed time for each stage of the compiler pipeline
macro_rules! stopwatch {
    ($msg: expr, $code: expr) => ({
        eprint!("    {:.<40}", $msg);
        stderr().flush().expect("Could not flush stderr");
        let t0 = Instant::now();
        let val = $code;
        let t1 = Instant::now();
        let dt = t1 - t0;
        let secs = dt.as_secs() as f64 + f64::from(dt.subsec_nanos()) * 1e-9;
        let message = format!("{:6.1} ms", secs * 1e3);
        eprintln!("{}", Diagnostic::new(message, DiagnosticKind::Info));
        val
    })
}

#[derive(Debug)]
struct CmdArgs {
    source: Option<String>,
    output: Option<String>,
}

impl CmdArgs {
    fn new() -> Self {
        let args = clap_app!(babelc =>
            (name:    PACKAGE_INFO.name)
            (version: PACKAGE_INFO.version)
            (author:  PACKAGE_INFO.authors)
            (about:   PACKAGE_INFO.description)
            (@arg output: -o --output +takes_value "Output path for the emitted IR module")
            (@arg source: "Babel source file; omit to start the interactive shell")
        ).get_matches();

        CmdArgs {
            source: args.value_of("source").map(str::to_owned),
            output: args.value_of("output").map(str::to_owned),
        }
    }
}

fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut buf = String::new();
    let mut file = File::open(path)?;
    file.read_to_string(&mut buf)?;
    Ok(buf)
}

fn build_parser() -> Result<Parser> {
    let grammar = babel_grammar()?;
    let table = LRTable::new(grammar)?;
    Ok(Parser::new(table))
}

fn module_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_owned())
}

fn output_path(source: &str, output: Option<&str>) -> PathBuf {
    match output {
        Some(path) => PathBuf::from(path),
        None => Path::new(source).with_extension("ll"),
    }
}

fn compile(args: &CmdArgs, source_path: &str) -> Result<()> {
    let parser = stopwatch!("Building parse tables", build_parser()?);

    let source = stopwatch!("Reading source", read_file(source_path)?);

    let tokens = stopwatch!("Lexing", lexer::prepare(&source));

    let mut cg = Codegen::new(module_name(source_path));

    let parse = stopwatch!("Parsing", parser.parse(&tokens, &mut cg)?);
    let root = match parse.root {
        Some(root) => root,
        None => return babel::error::semantic_error("source produced no program"),
    };

    stopwatch!("Generating IR", cg.emit_root(&root)?);

    let path = output_path(source_path, args.output.as_ref().map(String::as_str));
    let mut file = File::create(&path)?;
    write!(file, "{}", cg.module)?;

    eprintln!();
    eprintln!(
        "    Wrote {}",
        Diagnostic::new(path.to_string_lossy(), DiagnosticKind::Highlight)
    );

    Ok(())
}

fn repl() -> Result<()> {
    let parser = build_parser()?;
    let mut line = String::new();

    loop {
        print!("babel> ");
        stdout().flush()?;

        line.clear();
        if stdin().read_line(&mut line)? == 0 {
            // End of input: leave the shell.
            println!();
            return Ok(());
        }

        if line.trim().is_empty() {
            continue;
        }

        let tokens = lexer::prepare(&line);
        let mut cg = Codegen::new("repl");

        match parser.parse(&tokens, &mut cg) {
            Ok(parse) => print!("{}", parse.tree),
            Err(error) => eprintln!("{}", Diagnostic::new(error, DiagnosticKind::Error)),
        }
    }
}

fn report_fatal(error: &Error, source: &str) -> ! {
    error
        .pretty_print(&mut stderr(), source)
        .unwrap_or_else(|io_error| eprintln!("{}: {}", error, io_error));
    std::process::exit(1);
}

fn main() {
    eprintln!();
    eprintln!("    The Babel Compiler, version {}", PACKAGE_INFO.version);
    eprintln!();

    let args = CmdArgs::new();

    match args.source {
        Some(ref source) => {
            compile(&args, source).unwrap_or_else(|error| report_fatal(&error, source));
            eprintln!();
            eprintln!(
                "    {}",
                Diagnostic::new("Compilation Successful", DiagnosticKind::Success)
            );
            eprintln!();
        },
        None => {
            repl().unwrap_or_else(|error| report_fatal(&error, "<repl>"));
        },
    }
}
