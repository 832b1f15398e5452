//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::Context;
use clap::{crate_version, Arg, Command};
use towerc::{codegen::Format, error::Diagnostics, opt::Passes, source::Source, Options};
use tracing_subscriber::EnvFilter;

use std::{
    fs::{self, File},
    io::{self, Read, Write},
    process,
    str::FromStr,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("ParseTower level compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("INPUT")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .takes_value(true)
                .value_name("FORMAT")
                .default_value("json")
                .possible_values(["json", "trace"])
                .help("Output format"),
        )
        .arg(
            Arg::new("optimize")
                .short('O')
                .long("optimize")
                .takes_value(true)
                .value_name("LEVEL")
                .default_value("1")
                .possible_values(["0", "1"])
                .help("Optimization level"),
        )
        .arg(Arg::new("no-dedup").long("no-dedup").help("Keep duplicate definitions"))
        .arg(Arg::new("no-merge").long("no-merge").help("Do not merge redundant spawns"))
        .arg(Arg::new("no-fold").long("no-fold").help("Do not compute dps and totalDuration"))
        .arg(Arg::new("no-dce").long("no-dce").help("Keep unreferenced enemies and towers"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log each compiler stage"),
        )
        .get_matches();

    // Los registros van a stderr para no contaminar la salida
    let filter = if args.is_present("verbose") {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").context("Missing input file")?;
    let output = args.value_of("output").unwrap_or("-");

    let format = args.value_of("format").unwrap_or("json");
    let format = Format::from_str(format)
        .map_err(|()| anyhow::anyhow!("Unsupported output format: {}", format))?;

    let mut passes = match args.value_of("optimize") {
        Some("0") => Passes::empty(),
        _ => Passes::all(),
    };

    for (flag, pass) in [
        ("no-dedup", Passes::DEDUP),
        ("no-merge", Passes::MERGE),
        ("no-fold", Passes::FOLD),
        ("no-dce", Passes::DCE),
    ] {
        if args.is_present(flag) {
            passes.remove(pass);
        }
    }

    let source = match input {
        "-" => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;

            Source::new("<stdin>", text)
        }

        path => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read source file: {}", path))?;

            Source::new(path, text)
        }
    };

    let options = Options { format, passes };
    let artifact = match towerc::compile(&source, &options) {
        Ok(artifact) => artifact,
        Err(error) => {
            eprint!("{}", Diagnostics(&error));
            process::exit(1);
        }
    };

    match output {
        "-" => io::stdout()
            .write_all(artifact.as_bytes())
            .context("Failed to write to stdout")?,

        path => File::create(path)
            .and_then(|mut file| file.write_all(artifact.as_bytes()))
            .with_context(|| format!("Failed to write output file: {}", path))?,
    }

    Ok(())
}
