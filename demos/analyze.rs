use std::collections::BTreeSet;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;

use gcl_rs::ast::{AExpr, BExpr, Guard, RelOp, Stmt};
use gcl_rs::compiler::compile;
use gcl_rs::equivalence::{check_equivalence, validate_execution, EquivalenceConfig};
use gcl_rs::interpreter::{Interpreter, InterpreterConfig};
use gcl_rs::memory::InterpreterMemory;
use gcl_rs::pg::Determinism;
use gcl_rs::security::{Classification, SecurityAnalysis, SecurityClass, SecurityLattice};
use gcl_rs::sign::{Sign, SignMemory, SignSet};
use gcl_rs::sign_analysis::SignAnalysis;

#[derive(Debug, Parser)]
#[command(author, version, about = "Compile and analyze sample GCL programs")]
struct Cli {
    /// Sample program.
    #[arg(short, long, value_enum, default_value = "countdown")]
    program: Sample,

    /// Initial memory, e.g. `n=3` or `A=[1,2,3]`. Missing names start at 0 (or empty).
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// Compile with non-deterministic choice.
    #[arg(long)]
    nondeterministic: bool,

    /// Maximum number of steps of a single run.
    #[arg(long, value_name = "INT", default_value = "1000")]
    max_steps: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Sample {
    /// do n > 0 -> n := n - 1 od
    Countdown,
    /// if x >= y -> z := x [] y >= x -> z := y fi
    Max,
    /// i := 0 ; s := 0 ; do i < n -> s := s + A[i] ; i := i + 1 od
    Sum,
    /// if h > 0 -> l := 1 [] h <= 0 -> l := 0 fi
    Leak,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the program graph
    Graph,
    /// Print the program graph in DOT format
    Dot,
    /// Run the program once and print the execution
    Run,
    /// Follow every branch and print all executions
    Explore,
    /// Run the sign analysis from the signs of the initial memory
    Signs,
    /// Run the security analysis; listed names are secret, the rest public
    Security {
        #[arg(value_name = "NAME")]
        secret: Vec<String>,
    },
    /// Compare the deterministic and non-deterministic graphs of the program
    Equiv,
}

fn sample(program: Sample) -> Stmt {
    let var = AExpr::var;
    let num = AExpr::num;
    match program {
        Sample::Countdown => Stmt::do_([Guard::new(
            BExpr::rel(var("n"), RelOp::Gt, num(0)),
            Stmt::assign("n", AExpr::sub(var("n"), num(1))),
        )]),
        Sample::Max => Stmt::if_([
            Guard::new(BExpr::rel(var("x"), RelOp::Ge, var("y")), Stmt::assign("z", var("x"))),
            Guard::new(BExpr::rel(var("y"), RelOp::Ge, var("x")), Stmt::assign("z", var("y"))),
        ]),
        Sample::Sum => Stmt::seq_all([
            Stmt::assign("i", num(0)),
            Stmt::assign("s", num(0)),
            Stmt::do_([Guard::new(
                BExpr::rel(var("i"), RelOp::Lt, var("n")),
                Stmt::seq(
                    Stmt::assign("s", AExpr::add(var("s"), AExpr::index("A", var("i")))),
                    Stmt::assign("i", AExpr::add(var("i"), num(1))),
                ),
            )]),
        ]),
        Sample::Leak => Stmt::if_([
            Guard::new(BExpr::rel(var("h"), RelOp::Gt, num(0)), Stmt::assign("l", num(1))),
            Guard::new(BExpr::rel(var("h"), RelOp::Le, num(0)), Stmt::assign("l", num(0))),
        ]),
    }
}

fn parse_memory(stmt: &Stmt, assignments: &[String]) -> Result<InterpreterMemory> {
    let mut memory = InterpreterMemory::zeroed(&stmt.targets());
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| eyre!("expected NAME=VALUE, got '{}'", assignment))?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            bail!("missing name in '{}'", assignment);
        }
        if let Some(items) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            let values = items
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<i64>())
                .collect::<Result<Vec<_>, _>>()?;
            memory = memory.with_array(name, values);
        } else {
            memory = memory.with_var(name, value.parse()?);
        }
    }
    Ok(memory)
}

fn signs_of(memory: &InterpreterMemory) -> SignMemory {
    let mut signs = SignMemory::new();
    for (var, &value) in &memory.variables {
        signs = signs.with_var(var.name(), Sign::of(value));
    }
    for (arr, values) in &memory.arrays {
        let set: SignSet = values.iter().copied().map(Sign::of).collect();
        signs = signs.with_array(arr.name(), set);
    }
    signs
}

fn main() -> Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    log::debug!("args = {:?}", args);

    let det = if args.nondeterministic {
        Determinism::NonDeterministic
    } else {
        Determinism::Deterministic
    };
    let stmt = sample(args.program);
    println!("program = {}", stmt);

    let pg = compile(&stmt, det)?;
    let memory = parse_memory(&stmt, &args.set)?;
    let interpreter = Interpreter::new(InterpreterConfig {
        max_steps: args.max_steps,
        ..InterpreterConfig::default()
    });

    match args.command {
        Commands::Graph => {
            print!("{}", pg);
        }
        Commands::Dot => {
            print!("{}", pg.to_dot()?);
        }
        Commands::Run => {
            let exec = interpreter.run(&pg, memory.clone(), det)?;
            println!("{}", serde_json::to_string_pretty(&exec)?);
            if let Some(fault) = &exec.fault {
                println!("last fault: {}", fault);
            }
            let verdict = validate_execution(&pg, memory, &exec)?;
            println!("replay: {:?}", verdict);
        }
        Commands::Explore => {
            let executions = interpreter.explore(&pg, memory)?;
            println!("{} executions", executions.len());
            for exec in &executions {
                println!("{} after {} steps: {:?}", exec.outcome(), exec.trace.len(), exec.memory);
            }
        }
        Commands::Signs => {
            let analysis = SignAnalysis::new(det, signs_of(&memory));
            println!("initial = {}", analysis.assignment);
            let result = analysis.analyze(&pg)?;
            for (node, facts) in &result.nodes {
                let facts: Vec<String> = facts.iter().map(|m| m.to_string()).collect();
                println!("{}: {}", node, facts.join(" | "));
            }
        }
        Commands::Security { secret } => {
            let secret: BTreeSet<String> = secret.into_iter().collect();
            let classification: Classification = stmt
                .targets()
                .iter()
                .map(|t| {
                    let class = if secret.contains(t.name()) { "secret" } else { "public" };
                    (t.name().to_string(), SecurityClass::new(class))
                })
                .collect();
            if let Some(unknown) = secret.iter().find(|s| !classification.contains_key(*s)) {
                bail!("'{}' does not occur in the program", unknown);
            }
            let lattice = SecurityLattice::new([(SecurityClass::new("public"), SecurityClass::new("secret"))]);
            let report = SecurityAnalysis::new(lattice, classification).run(&stmt)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("secure = {}", report.is_secure());
        }
        Commands::Equiv => {
            let reference = compile(&stmt, Determinism::Deterministic)?;
            let candidate = compile(&stmt, Determinism::NonDeterministic)?;
            let verdict = check_equivalence(&reference, &candidate, memory, &EquivalenceConfig::default())?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
    }

    Ok(())
}
