use clap::Parser;
use std::path::PathBuf;

use downward_model::{Res, errors::*, pddl::*};

/// A simple parser for PDDL.
///
/// The parser prints the parsed problem and the features it uses, reporting any error encountered.
#[derive(Debug, Parser)]
#[command(name = "pddl-parser", rename_all = "kebab-case")]
struct Args {
    /// If not set, will look for a `domain.pddl` file in the directory of the
    /// problem file or in the parent directory.
    #[arg(long, short)]
    domain: Option<PathBuf>,
    /// Path to the problem file to parse.
    problem: PathBuf,
    /// Print the problem as written back to PDDL instead of its internal representation.
    #[arg(long)]
    write: bool,
}

fn main() -> Res<()> {
    let opt = Args::parse();

    let problem_file = &opt.problem;
    if !problem_file.exists() {
        return Err(Message::error(format!(
            "Problem file {} does not exist",
            problem_file.display()
        )));
    }

    let problem_file = problem_file.canonicalize()?;
    let domain_file = match opt.domain {
        Some(name) => name,
        None => find_domain_of(&problem_file).title(
            "Unable to automatically find the domain file. Consider specifying the domain with the option -d/--domain",
        )?,
    };
    let domain_file = input::Input::from_file(&domain_file)?;
    let problem_file = input::Input::from_file(&problem_file)?;

    let problem = read_problem(domain_file, problem_file)?;

    if opt.write {
        let writer = PddlWriter::new(&problem);
        println!("{}", writer.domain()?);
        println!("{}", writer.problem()?);
    } else {
        println!("{problem}");
        println!("\nKind: {}", problem.kind());
    }

    Ok(())
}
