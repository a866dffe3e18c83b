use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use codeowners_audit::{
    git::{self, Git},
    prune,
    resolver::summarize,
    BuiltinOracle, Error, OwnershipRecord, Resolver, WalkFiles,
};

const EXIT_FAILURE: u8 = 1;
const EXIT_NO_RULES_FILE: u8 = 2;
const EXIT_NOT_WRITABLE: u8 = 4;

#[derive(Parser)]
#[command(version, about = "Report CODEOWNERS ownership and prune unused rules")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Repository root. Defaults to the enclosing git work tree, or the
    /// current directory with the builtin backend.
    #[arg(long, global = true, env = "CODEOWNERS_ROOT")]
    root: Option<PathBuf>,

    /// CODEOWNERS file to use instead of searching the usual locations.
    #[arg(short = 'f', long = "file", global = true, env = "CODEOWNERS_FILE")]
    codeowners_file: Option<PathBuf>,

    /// How files are listed and matched.
    #[arg(long, global = true, value_enum, default_value_t = Backend::Git)]
    backend: Backend,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the owner of every file.
    Report {
        /// Only list files that no rule matches.
        #[arg(long)]
        unowned: bool,

        /// Only list files owned by this owner string.
        #[arg(long)]
        owner: Option<String>,

        /// Print file counts per owner instead of individual files.
        #[arg(long)]
        summary: bool,
    },
    /// Remove rules that match no file, keeping a backup of the original.
    Prune {
        /// Report unused rules without changing anything.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// `git ls-files` and `git check-ignore`
    Git,
    /// Directory walk and the in-process matcher
    Builtin,
}

impl Cli {
    fn root_path(&self) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        match self.backend {
            Backend::Git => Ok(git::toplevel(Path::new("."))?),
            Backend::Builtin => Ok(PathBuf::from(".")),
        }
    }

    fn resolver(&self) -> Result<Resolver> {
        let root = self.root_path()?;
        let resolver = match self.backend {
            Backend::Git => {
                let git = Git::new(&root);
                Resolver::new(&root, git.clone(), git)
            }
            Backend::Builtin => Resolver::new(&root, WalkFiles::new(&root), BuiltinOracle::new()),
        };
        Ok(match &self.codeowners_file {
            Some(path) => resolver.with_rules_file(path),
            None => resolver,
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<Error>() {
            Some(Error::RulesFileNotFound { .. }) => {
                eprintln!("[ERROR] CODEOWNERS file does not exist.");
                ExitCode::from(EXIT_NO_RULES_FILE)
            }
            Some(Error::NotWritable { .. }) => {
                eprintln!("{}", err);
                ExitCode::from(EXIT_NOT_WRITABLE)
            }
            _ => {
                eprintln!("error: {:#}", err);
                ExitCode::from(EXIT_FAILURE)
            }
        },
    }
}

fn init_logger(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn run(cli: &Cli) -> Result<()> {
    let resolver = cli.resolver()?;
    match &cli.command {
        Command::Report {
            unowned,
            owner,
            summary,
        } => {
            let records = resolver
                .resolve()?
                .into_iter()
                .filter(|r| !*unowned || r.is_unowned())
                .filter(|r| owner.as_ref().map_or(true, |o| &r.owner == o))
                .collect::<Vec<_>>();
            if *summary {
                for (owner, count) in summarize(&records) {
                    println!("{:<40}  {}", owner, count);
                }
            } else {
                for record in &records {
                    println!("{}", format_record(record));
                }
            }
        }
        Command::Prune { dry_run } => run_prune(&resolver, *dry_run)?,
    }
    Ok(())
}

fn format_record(record: &OwnershipRecord) -> String {
    match (record.line, &record.pattern) {
        (Some(line), Some(pattern)) => format!(
            "{:<70}  {} (line {}: {})",
            record.file, record.owner, line, pattern
        ),
        _ => format!("{:<70}  {}", record.file, record.owner),
    }
}

fn run_prune(resolver: &Resolver, dry_run: bool) -> Result<()> {
    let plan = prune::plan(resolver)?;
    if plan.is_noop() {
        println!("All of the rules are used. Nothing to do here. :)");
        return Ok(());
    }

    println!("Found the following unused rules:\n");
    for rule in &plan.unused {
        println!("{}", rule.text);
    }
    if dry_run {
        return Ok(());
    }

    let backup = prune::apply(&plan)?;
    println!("\nBackup file created at {}", backup.display());
    println!("\nUpdated {}", plan.path.display());
    Ok(())
}
