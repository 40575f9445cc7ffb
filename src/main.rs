use clap::{Args, Parser, Subcommand, ValueEnum};
use exprcalc::{Calculator, Config, Graph, DEFAULT_MAX_DEPTH, DEFAULT_MAX_EVAL_DEPTH};
use miette::{IntoDiagnostic, Report, WrapErr};
use std::{fs, io::{self, BufRead, Write}};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (repeat for debug and trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// No log output at all.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Deepest nesting of parentheses, calls or factorials accepted.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Deepest expression tree evaluated.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_EVAL_DEPTH)]
    max_eval_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the token stream.
    Tokenize(Input),
    /// Print the expression tree, fully parenthesized.
    Parse(Input),
    /// Print the value of the expression.
    Eval(Input),
    /// Print the tree (or token stream) as a graph.
    Graph {
        #[command(flatten)]
        input: Input,
        /// Graph the tokens instead of the tree.
        #[arg(long)]
        tokens: bool,
        #[arg(long, value_enum, default_value_t = Format::Dot)]
        format: Format,
    },
    /// Evaluate expressions read line by line.
    Repl,
}

#[derive(Args, Debug)]
struct Input {
    /// The expression, e.g. "2+3*4".
    #[arg(required_unless_present = "file")]
    expression: Option<String>,

    /// Read the expression from a file instead.
    #[arg(long, conflicts_with = "expression")]
    file: Option<PathBuf>,
}

impl Input {
    fn read(self) -> miette::Result<String> {
        match (self.expression, self.file) {
            (_, Some(filename)) => {
                let contents = fs::read_to_string(&filename)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("reading '{}' failed", filename.display()))?;
                Ok(contents.trim_end().to_string())
            }
            (Some(expression), None) => Ok(expression),
            (None, None) => Err(miette::miette!("no expression given")),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Dot,
    Json,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::OFF,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

/// Attaches the source text so labels render against it.
fn report(err: exprcalc::Error, source: &str) -> Report {
    Report::new(err).with_source_code(source.to_string())
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let calculator = Calculator::new(Config {
        max_depth: cli.max_depth,
        max_eval_depth: cli.max_eval_depth,
    });
    tracing::info!(config = ?calculator.config(), "starting");

    match cli.command {
        Commands::Tokenize(input) => {
            let source = input.read()?;
            let tokens = calculator.tokenize(&source).map_err(|e| report(e, &source))?;
            for token in tokens {
                println!("{:<11} {:<4} @{}", token.kind.name(), token.slice, token.offset);
            }
        }
        Commands::Parse(input) => {
            let source = input.read()?;
            let root = calculator.parse(&source).map_err(|e| report(e, &source))?;
            println!("{root}");
        }
        Commands::Eval(input) => {
            let source = input.read()?;
            let value = calculator.calculate(&source).map_err(|e| report(e, &source))?;
            println!("{value}");
        }
        Commands::Graph { input, tokens, format } => {
            let source = input.read()?;
            let graph = if tokens {
                let tokens = calculator.tokenize(&source).map_err(|e| report(e, &source))?;
                Graph::from_tokens(&tokens)
            } else {
                let root = calculator.parse(&source).map_err(|e| report(e, &source))?;
                Graph::from_tree(&root)
            };
            match format {
                Format::Dot => print!("{}", graph.to_dot()),
                Format::Json => {
                    let json = serde_json::to_string_pretty(&graph).into_diagnostic()?;
                    println!("{json}");
                }
            }
        }
        Commands::Repl => repl(&calculator)?,
    }

    Ok(())
}

fn repl(calculator: &Calculator) -> miette::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("calc> ");
        io::stdout().flush().into_diagnostic()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.into_diagnostic().wrap_err("reading input failed")?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            break;
        }

        match calculator.calculate(input) {
            Ok(value) => println!("{value}"),
            Err(err) => eprintln!("{:?}", report(err, input)),
        }
    }

    Ok(())
}
