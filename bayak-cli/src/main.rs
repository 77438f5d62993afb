use bayak::{LoaderError, VmError};
use bayak_asm::AsmError;
use bayak_gen::GenError;
use bayak_lex::LexError;
use bayak_par::ParseError;
use clap::Parser;
use std::fs::File;
use std::io::prelude::*;
use std::io::{stdout, BufReader};
use std::path::PathBuf;

/// Runs a bayak source file through the lex/parse/gen/asm/run pipeline.
#[derive(Parser, Debug)]
#[command(name = "bayak", version, about)]
struct Cli {
    /// Source file to run.
    source: PathBuf,

    /// Print the token stream and stop.
    #[arg(long)]
    tokens: bool,

    /// Print the parsed AST and stop.
    #[arg(long)]
    ast: bool,

    /// Print the generated assembly and stop.
    #[arg(long)]
    asm: bool,

    /// Assemble but do not execute; optionally write the binary image here.
    #[arg(long, value_name = "PATH")]
    emit: Option<PathBuf>,
}

#[derive(Debug)]
enum Error {
    Io(std::io::Error),
    Lex(LexError),
    Parse(ParseError),
    Gen(GenError),
    Asm(AsmError),
    Load(LoaderError),
    Vm(VmError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{}", err),
            Error::Lex(err) => write!(f, "Lex error: {}", err),
            Error::Parse(err) => write!(f, "Parse error: {}", err),
            Error::Gen(err) => write!(f, "Codegen error: {}", err),
            Error::Asm(err) => write!(f, "Assembler error: {}", err),
            Error::Load(err) => write!(f, "Load error: {}", err),
            Error::Vm(err) => write!(f, "Runtime error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
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
    let mut source = String::new();
    BufReader::new(File::open(&cli.source)?).read_to_string(&mut source)?;

    let tokens = bayak_lex::lex(&source).map_err(Error::Lex)?;
    if cli.tokens {
        for token in &tokens {
            println!("{:?}", token);
        }
        return Ok(());
    }

    let script = bayak_par::parse(tokens).map_err(Error::Parse)?;
    if cli.ast {
        println!("{:#?}", script);
        return Ok(());
    }

    let asm_text = bayak_gen::generate(&script).map_err(Error::Gen)?;
    if cli.asm {
        print!("{}", asm_text);
        return Ok(());
    }

    let image = bayak_asm::assemble(&asm_text).map_err(Error::Asm)?;
    if let Some(path) = &cli.emit {
        let mut file = File::create(path)?;
        bayak_image::write(&mut file, &image)?;
        return Ok(());
    }

    let program = bayak::loader::load(&image).map_err(Error::Load)?;
    let mut vm = bayak::Vm::new(&program, stdout());
    vm.run().map_err(Error::Vm)?;

    Ok(())
}
