use clap::{Parser as ClapParser, Subcommand};
use std::io::{self, Read};
use std::rc::Rc;
use treepath::{Expression, SimpleNode};

#[derive(ClapParser)]
#[command(name = "treepath")]
#[command(about = "Evaluate path expressions against a JSON-described node tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression and evaluate it against a document
    Eval {
        /// The expression to evaluate
        expression: String,

        /// JSON document (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Resolve top-level relative paths under this tag
        #[arg(long)]
        root_tag: Option<String>,

        /// Print the result as a sequence, one item per line
        #[arg(short, long)]
        sequence: bool,

        /// Only compile the expression, don't evaluate
        #[arg(long)]
        syntax_only: bool,
    },

    /// Print the parsed form of an expression
    Dump {
        /// The expression to parse
        expression: String,
    },
}

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Parse(treepath::ParseError),
    Json(serde_json::Error),
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "I/O error: {}", e),
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON input: {}", e),
            CliError::NoInput => write!(f, "No input document (pass --input or pipe JSON)"),
        }
    }
}

impl std::error::Error for CliError {}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval {
            expression,
            input,
            root_tag,
            sequence,
            syntax_only,
        } => run_eval(expression, input, root_tag, sequence, syntax_only),
        Commands::Dump { expression } => match treepath::compile(&expression) {
            Ok(expr) => {
                println!("{:?}", expr);
                Ok(())
            }
            Err(e) => Err(CliError::Parse(e)),
        },
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn compile(expression: &str, root_tag: Option<&str>) -> Result<Expression, CliError> {
    match root_tag {
        Some(tag) => treepath::compile_with_root(expression, tag),
        None => treepath::compile(expression),
    }
    .map_err(CliError::Parse)
}

fn run_eval(
    expression: String,
    input: Option<String>,
    root_tag: Option<String>,
    sequence: bool,
    syntax_only: bool,
) -> Result<(), CliError> {
    let expr = compile(&expression, root_tag.as_deref())?;

    if syntax_only {
        println!("Syntax is valid");
        return Ok(());
    }

    let input = match input {
        Some(s) => s,
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            buffer
        }
        None => return Err(CliError::NoInput),
    };

    let doc: serde_json::Value = serde_json::from_str(&input).map_err(CliError::Json)?;
    let root = SimpleNode::from_json(&doc);

    // With a root tag the bound node is a synthetic document above it, so
    // the tag step of relative paths matches the parsed tree itself.
    let bound: Rc<SimpleNode> = if root_tag.is_some() {
        let document = SimpleNode::new("#document");
        document.append_child(root);
        document
    } else {
        root
    };
    expr.set_root(bound);

    if sequence {
        for item in expr.as_sequence().iter() {
            println!("{}", item.value());
        }
    } else {
        println!("{}", expr.as_string());
    }
    Ok(())
}
