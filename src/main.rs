/*!
Narzędziownik is a command line tool for preparing and maintaining the layers of a municipal general plan (APP POG). It creates styled template layers in a GeoPackage project, and renumbers the designations of an existing layer. For details, run it with `--help`.
*/

#![warn(noop_method_call)]
#![warn(single_use_lifetimes)]
#![warn(unused_lifetimes)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unused_crate_dependencies)]
#![warn(meta_variable_misuse)]
#![warn(unused_macro_rules)]
#![warn(unused_qualifications)]
#![warn(unused_results)] // Most of these come from map inserts. Anything else deserves a look, and `_ = ` gets around it.
#![warn(variant_size_differences)]

use clap::Parser;

pub(crate) mod errors;
pub mod commands;
pub(crate) mod progress;
pub(crate) mod prompts;
pub(crate) mod typed_map;
pub(crate) mod algorithms;
pub(crate) mod attributes;
pub(crate) mod project;
pub(crate) mod gdal_fixes;
#[cfg(test)] mod test;

use errors::ProgramError;

use commands::Narzedziownik;
use commands::Task;
use progress::ConsoleProgressBar;

/**
Runs Narzędziownik with arbitrary arguments. The first item in the arguments will be ignored. All output will be printed to Stdout or Stderr.
*/
pub fn run<Arg, Args>(args: &mut Args) -> Result<(),ProgramError>
where
    Arg: Clone + Into<std::ffi::OsString>,
    Args: Iterator<Item = Arg>
{
    let mut progress = ConsoleProgressBar::new();
    let command = Narzedziownik::try_parse_from(args)?;
    command.run(&mut progress)?;
    Ok(())
}

fn main() -> std::process::ExitCode {
    let mut args = std::env::args();
    // returning a Result from main would print the error with Debug instead of Display
    match run(&mut args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(ProgramError::ArgumentError(err)) => {
            // clap knows whether this is help output or an actual mistake
            _ = err.print();
            if err.use_stderr() {
                std::process::ExitCode::FAILURE
            } else {
                std::process::ExitCode::SUCCESS
            }
        },
        Err(err) => {
            eprintln!("{err}");
            std::process::ExitCode::FAILURE
        }
    }
}
