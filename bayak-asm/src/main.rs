use bayak_asm::AsmError;
use bayak_image::WriteImageExt;
use clap::Parser;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Assembles bayak textual bytecode assembly into a binary BYAK image.
#[derive(Parser, Debug)]
#[command(name = "bayak-asm", version, about)]
struct Cli {
    /// Assembly source file to assemble.
    input: PathBuf,

    /// Path to write the binary image to. Defaults to the input path with a
    /// `.byak` extension.
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum IOErrorContext {
    ReadInput,
    WriteOutput,
}

#[derive(Debug)]
enum Error {
    Asm(AsmError),
    Io(std::io::Error, IOErrorContext, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => write!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IOErrorContext::ReadInput => "Reading input",
                    IOErrorContext::WriteOutput => "Writing output",
                },
                path.display(),
                err
            ),
            Error::Asm(err) => write!(f, "Assembling failed: {}", err),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let input_path = cli.input.as_path();
    let input_file = File::open(input_path)
        .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, input_path.to_owned()))?;
    let mut text = String::new();
    BufReader::new(input_file)
        .read_to_string(&mut text)
        .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, input_path.to_owned()))?;

    let image = bayak_asm::assemble(&text).map_err(Error::Asm)?;

    let output_path: PathBuf = cli
        .output
        .clone()
        .unwrap_or_else(|| with_extension(input_path, "byak"));
    let mut output_file = File::create(&output_path)
        .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, output_path.clone()))?;
    output_file
        .write_image(&image)
        .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, output_path.clone()))?;
    Ok(())
}

fn with_extension(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext)
}
