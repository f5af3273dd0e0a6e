//! CLI command definitions and handlers

use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::*;
use devrunner_core::tools::tool_version;
use devrunner_core::{format, ConfigLayer, Paths, Settings, ToolChecker, WhichChecker};
use tracing::debug;

use crate::catalog::Ecosystem;
use crate::error::{exit_codes, RunError};
use crate::exec::{execute, Invocation, Outcome, ProcessBackend};
use crate::output;
use crate::probe::RunnerMatch;
use crate::resolve::{ResolveContext, SearchOptions};
use crate::scripts;
use crate::suggest;
use crate::update::{self, state, UpdateOutcome};

/// devrunner - Universal project command runner
///
/// "One command. Any toolchain."
#[derive(Parser, Debug)]
#[command(name = "devrunner")]
#[command(version)]
#[command(about = "Universal project command runner - detects the toolchain and runs your command with it")]
#[command(after_help = "\
EXAMPLES:
    devrunner test                 Run the project's test script/task
    devrunner build --release      Arguments are handed to the tool as-is
    devrunner test -- --coverage   Everything after -- is passed through verbatim
    devrunner --levels=4 dev       Search up to 4 parent directories
    devrunner --ignore=yarn dev    Treat yarn as absent
    devrunner --dry-run build      Show the command without running it
    devrunner why                  Explain which runner is used and why
    devrunner list                 List the project's scripts

SUPPORTED TOOLS:
    bun, pnpm, yarn, npm, uv, poetry, pdm, pipenv, pip, cargo, composer, go,
    bundler, gradle, maven, dotnet, mix, swift, zig, make

EXIT CODES:
    The command's own exit code, or: 1 error before running, 2 no runner
    found, 3 lockfile conflict, 127 tool not installed.")]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Option<Builtin>,

    /// Command to run (script, task or tool subcommand) and its arguments.
    ///
    /// Everything from the command on belongs to the tool, flags included.
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command_line: Vec<OsString>,

    /// Parent directories to search (0-10)
    #[arg(long, value_name = "N", global = true, allow_negative_numbers = true)]
    pub levels: Option<i64>,

    /// Tools or ecosystems to ignore (repeatable, comma-separated)
    #[arg(long, value_name = "TOOL", value_delimiter = ',', global = true)]
    pub ignore: Vec<String>,

    /// Show detection details and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show the command's own output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Check for a newer devrunner and install it before running
    #[arg(long)]
    pub update: bool,

    /// Run the update check in the foreground and exit (used by the
    /// detached background process)
    #[arg(long = "internal-update-check", hide = true)]
    pub internal_update_check: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    /// List scripts of the detected project
    List,

    /// Explain which runner would be used and why
    Why,

    /// Diagnose project setup: runners, installed tools, conflicts
    Doctor,

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Flags as the highest-precedence config layer
    pub fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            max_levels: self.levels,
            ignore_tools: (!self.ignore.is_empty()).then(|| self.ignore.clone()),
            verbose: self.verbose.then_some(true),
            quiet: self.quiet.then_some(true),
            ..Default::default()
        }
    }

    pub fn program_command(&self) -> Option<&OsStr> {
        self.command_line.first().map(OsString::as_os_str)
    }

    /// Arguments after the command. The first `--` only marks where
    /// devrunner stops reading; a later one is forwarded.
    fn tail(&self) -> Vec<OsString> {
        let mut escaped = false;
        self.command_line
            .iter()
            .skip(1)
            .filter(|arg| {
                if !escaped && arg.as_os_str() == "--" {
                    escaped = true;
                    return false;
                }
                true
            })
            .cloned()
            .collect()
    }
}

fn search_options(settings: &Settings) -> SearchOptions {
    SearchOptions {
        levels: settings.max_levels,
        ignore: settings.ignore_tools.clone(),
    }
}

/// Run the CLI and return the process exit code
pub fn run(cli: Cli) -> i32 {
    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            exit_codes::GENERIC_ERROR
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32> {
    let paths = Paths::new();

    if cli.internal_update_check {
        let outcome = update::check_now(&paths);
        debug!(?outcome, "background update check finished");
        return Ok(exit_codes::SUCCESS);
    }

    let cwd = env::current_dir().context("Failed to get current directory")?;

    let settings = Settings::load(&paths, &cwd, &cli.config_layer());
    debug!(?settings, "effective settings");

    // Consumed on every start, shown at most once
    if let Some(notice) = state::take_notification(&paths.update_state(), chrono::Utc::now()) {
        if !settings.quiet {
            output::update_notice(&notice);
        }
    }

    match &cli.subcommand {
        Some(Builtin::Completions { shell }) => return cmd_completions(*shell),
        Some(Builtin::List) => return Ok(cmd_list(&cwd, &settings)),
        Some(Builtin::Why) => return Ok(cmd_why(&cwd, &settings)),
        Some(Builtin::Doctor) => return Ok(cmd_doctor(&cwd, &settings, &paths)),
        None => {}
    }

    if cli.update {
        cmd_update(&paths, &settings);
    }

    let Some(command) = cli.program_command().map(OsStr::to_os_string) else {
        if !cli.update {
            // Nothing to run: show help
            Cli::command()
                .print_help()
                .context("Failed to print help")?;
            println!();
        }
        return Ok(exit_codes::SUCCESS);
    };

    let ran = cmd_run(&cli, command, &cwd, &settings);

    if wants_background_check(&ran, &settings) && !update::disabled_by_env() {
        update::spawn_background(&paths);
    }

    Ok(match ran {
        Ok(outcome) => outcome.exit_code(),
        Err(code) => code,
    })
}

/// Only once a child has actually run and its status is in hand
fn wants_background_check(ran: &Result<Outcome, i32>, settings: &Settings) -> bool {
    settings.auto_update && matches!(ran, Ok(Outcome::Exited { .. }))
}

/// Print an error with its hint (unless quiet) and return its exit code
fn report(err: &RunError, quiet: bool) -> i32 {
    if !quiet {
        output::error(&err.to_string());
        if let Some(hint) = err.hint() {
            output::hint(&hint);
        }
    }
    err.exit_code()
}

/// Resolve and run a command.
///
/// `Err` carries the exit code of a failure before anything was executed.
fn cmd_run(cli: &Cli, command: OsString, cwd: &Path, settings: &Settings) -> Result<Outcome, i32> {
    let quiet = settings.quiet;

    let command = match command.to_str() {
        Some(name) => OsString::from(settings.resolve_alias(name)),
        None => command,
    };

    let mut ctx = ResolveContext::new(Box::new(WhichChecker));
    let resolution = match ctx.resolve(cwd, &search_options(settings)) {
        Ok(resolution) => resolution,
        Err(e) => return Err(report(&e, quiet)),
    };

    if let Some(advisory) = &resolution.advisory {
        if !quiet {
            output::advisory(advisory);
        }
    }

    let command = if resolution.runner.ecosystem() == Ecosystem::Node {
        check_node_script(&command, &resolution.directory, quiet)?
    } else {
        command
    };

    let invocation = Invocation::build(
        &resolution.runner,
        &resolution.directory,
        &command,
        &cli.tail(),
    );

    if settings.verbose && !quiet {
        output::info(&format!(
            "using {} ({}) in {}",
            resolution.runner.name().bold(),
            resolution.runner.detected_file(),
            resolution.directory.display()
        ));
        output::info(&format!("running {}", invocation.display()));
    }

    let outcome = match execute(&mut ProcessBackend, &invocation, cli.dry_run) {
        Ok(outcome) => outcome,
        Err(e) => return Err(report(&e, quiet)),
    };

    match &outcome {
        Outcome::DryRun(rendered) => println!("{}", rendered),
        Outcome::Exited { elapsed, .. } => {
            if settings.show_timing && !quiet {
                eprintln!();
                output::success(&format!("Completed in {}", format::duration(*elapsed)));
            }
        }
    }

    Ok(outcome)
}

/// For `npm run`-style runners, fail early on an unknown script name.
///
/// Returns the script name as package.json spells it, or the exit code
/// when the run should stop.
fn check_node_script(command: &OsString, dir: &Path, quiet: bool) -> Result<OsString, i32> {
    let Some(name) = command.to_str() else {
        return Ok(command.clone());
    };
    let Some(list) = scripts::package_json(dir) else {
        return Ok(command.clone());
    };
    let names = list.names();

    if let Some(known) = suggest::find_known(name, &names) {
        return Ok(OsString::from(known));
    }

    if !quiet {
        output::error(&format!("Script \"{}\" not found in package.json", name));
        if names.is_empty() {
            output::hint("package.json defines no scripts");
        } else {
            output::hint(&format!("Available scripts: {}", names.join(", ")));
        }
        if let Some(closest) = suggest::closest(name, &names) {
            eprintln!("Did you mean: {} {}", "devrunner".cyan(), closest.green().bold());
        }
    }

    Err(exit_codes::GENERIC_ERROR)
}

/// `--update`: check and install inline, then continue
fn cmd_update(paths: &Paths, settings: &Settings) {
    if update::disabled_by_env() {
        if !settings.quiet {
            output::info(&format!("updates disabled by {}", update::NO_UPDATE_ENV));
        }
        return;
    }

    match update::check_now(paths) {
        UpdateOutcome::UpToDate { current } => {
            if !settings.quiet {
                output::success(&format!("devrunner {} is up to date", current));
            }
        }
        UpdateOutcome::Updated { from, to } => {
            // Already reported here; don't show it again on the next start
            let _ = state::take_notification(&paths.update_state(), chrono::Utc::now());
            if !settings.quiet {
                output::success(&format!("updated devrunner {} → {}", from, to.to_string().bold()));
            }
        }
        UpdateOutcome::Aborted(e) => {
            if settings.verbose && !settings.quiet {
                output::warn(&format!("update check failed: {}", e));
            }
        }
    }
}

fn cmd_completions(shell: Shell) -> Result<i32> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let mut stdout = io::stdout();
    clap_complete::generate(shell, &mut cmd, name, &mut stdout);
    stdout.flush().context("Failed to write completions")?;
    Ok(exit_codes::SUCCESS)
}

/// List scripts of the detected project
fn cmd_list(cwd: &Path, settings: &Settings) -> i32 {
    let mut ctx = ResolveContext::new(Box::new(WhichChecker));
    let located = match ctx.locate(cwd, &search_options(settings)) {
        Ok(located) => located,
        Err(e) => return report(&e, settings.quiet),
    };

    let runner = &located.candidates[0];
    println!(
        "Detected: {} ({})",
        runner.name().green(),
        runner.detected_file().dimmed()
    );
    println!();

    match scripts::for_ecosystem(runner.ecosystem(), &located.directory) {
        Some(list) if !list.scripts.is_empty() => {
            println!("{}", format!("Available scripts ({}):", list.source).bold());
            let width = list.scripts.iter().map(|s| s.name.len()).max().unwrap_or(0);
            for script in &list.scripts {
                println!(
                    "  {}  {}",
                    format!("{:width$}", script.name).cyan(),
                    script.command.dimmed()
                );
            }
        }
        _ => println!("{}", "No scripts found for this project type.".dimmed()),
    }

    exit_codes::SUCCESS
}

/// How a runner spells a command, for display
fn usage_preview(runner: &RunnerMatch, dir: &Path) -> String {
    let sample = Invocation::build(runner, dir, OsStr::new("COMMAND"), &[]);
    let mut preview = sample.display().to_string();
    if runner.definition.template.separator {
        preview.push_str(" [-- ARGS]");
    } else {
        preview.push_str(" [ARGS]");
    }
    preview
}

/// Explain the runner selection
fn cmd_why(cwd: &Path, settings: &Settings) -> i32 {
    let mut ctx = ResolveContext::new(Box::new(WhichChecker));
    let located = match ctx.locate(cwd, &search_options(settings)) {
        Ok(located) => located,
        Err(e) => return report(&e, settings.quiet),
    };

    println!("{}", "Runner selection".bold().underline());
    println!();

    let (chosen, code) = match ctx.choose(&located.candidates) {
        Ok((runner, advisory)) => {
            println!(
                "{} {} ({})",
                "Using:".bold(),
                runner.name().green().bold(),
                runner.ecosystem()
            );
            println!(
                "  {} found {} in {} (level {})",
                "→".dimmed(),
                runner.evidence.join(", ").cyan(),
                located.directory.display(),
                located.level
            );
            if let Some(lockfile) = &runner.lockfile {
                println!("  {} lockfile {}", "→".dimmed(), lockfile.cyan());
            }
            println!(
                "  {} priority {} (lower wins)",
                "→".dimmed(),
                runner.definition.priority
            );
            println!(
                "  {} runs {}",
                "→".dimmed(),
                usage_preview(&runner, &located.directory)
            );
            if let Some(advisory) = advisory {
                println!(
                    "  {} chosen over {}: the only installed tool",
                    "→".dimmed(),
                    advisory.superseded.join(", ").yellow()
                );
            }
            (Some(runner.name()), exit_codes::SUCCESS)
        }
        Err(e) => {
            println!("{} {}", "Cannot choose:".red().bold(), e);
            if let Some(hint) = e.hint() {
                println!("  {}", hint.dimmed());
            }
            (None, e.exit_code())
        }
    };

    let others: Vec<&RunnerMatch> = located
        .candidates
        .iter()
        .filter(|m| Some(m.name()) != chosen)
        .collect();

    if !others.is_empty() || !located.ignored.is_empty() {
        println!();
        println!("{}", "Other runners in this directory:".bold());
        for runner in others {
            println!(
                "  {} {} - {} {}",
                "•".dimmed(),
                runner.name(),
                runner.detected_file(),
                format!("(priority {})", runner.definition.priority).dimmed()
            );
        }
        for runner in &located.ignored {
            println!(
                "  {} {} - {} {}",
                "•".dimmed(),
                runner.name(),
                runner.detected_file(),
                "(ignored)".red()
            );
        }
    }

    code
}

/// Diagnose project setup
fn cmd_doctor(cwd: &Path, settings: &Settings, paths: &Paths) -> i32 {
    let checker = WhichChecker;
    let mut ctx = ResolveContext::new(Box::new(checker));

    println!("{}", "devrunner doctor".bold().underline());
    println!();

    println!("{}", "Configuration:".bold());
    for (label, path) in [
        ("global", paths.global_config()),
        ("local", Paths::local_config(cwd)),
    ] {
        let state = if path.is_file() {
            "found".green()
        } else {
            "absent".dimmed()
        };
        println!("  {} {} config {} ({})", "→".dimmed(), label, path.display(), state);
    }
    println!(
        "  {} search depth {}, auto-update {}",
        "→".dimmed(),
        settings.max_levels,
        if settings.auto_update && !update::disabled_by_env() {
            "on"
        } else {
            "off"
        }
    );
    if !settings.ignore_tools.is_empty() {
        println!(
            "  {} ignoring {}",
            "→".dimmed(),
            format::list(&settings.ignore_tools)
        );
    }
    println!();

    let located = match ctx.locate(cwd, &search_options(settings)) {
        Ok(located) => located,
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            if let Some(hint) = e.hint() {
                println!("  {}", hint.dimmed());
            }
            return e.exit_code();
        }
    };

    println!("{}", "Project:".bold());
    println!(
        "  {} root {} (level {})",
        "→".dimmed(),
        located.directory.display(),
        located.level
    );
    println!();

    println!("{}", "Detected runners:".bold());
    for runner in &located.candidates {
        let executable = runner.definition.executable();
        if checker.is_installed(executable) {
            let version = tool_version(executable).unwrap_or_else(|| "installed".to_string());
            println!(
                "  {} {} ({}) - {}",
                "✓".green(),
                runner.name(),
                runner.detected_file(),
                version.dimmed()
            );
        } else {
            println!(
                "  {} {} ({}) - {}",
                "✗".red(),
                runner.name(),
                runner.detected_file(),
                "not installed".red()
            );
        }
    }
    for runner in &located.ignored {
        println!(
            "  {} {} ({}) - {}",
            "-".dimmed(),
            runner.name(),
            runner.detected_file(),
            "ignored".dimmed()
        );
    }
    println!();

    println!("{}", "Conflict analysis:".bold());
    let mut by_ecosystem: BTreeMap<Ecosystem, Vec<RunnerMatch>> = BTreeMap::new();
    for runner in &located.candidates {
        by_ecosystem
            .entry(runner.ecosystem())
            .or_default()
            .push(runner.clone());
    }

    let mut conflicts = 0;
    for (ecosystem, group) in by_ecosystem.iter().filter(|(_, g)| g.len() > 1) {
        let files: Vec<String> = group.iter().map(|m| m.detected_file().to_string()).collect();
        match ctx.choose(group) {
            Ok((runner, None)) => println!(
                "  {} {}: {} wins ({})",
                "✓".green(),
                ecosystem,
                runner.name(),
                format::list(&files)
            ),
            Ok((runner, Some(_))) => {
                conflicts += 1;
                println!(
                    "  {} {}: multiple lockfiles ({}), using {} as the only installed tool",
                    "⚠".yellow(),
                    ecosystem,
                    format::list(&files).yellow(),
                    runner.name()
                );
            }
            Err(e) => {
                conflicts += 1;
                println!("  {} {}: {}", "✗".red(), ecosystem, e);
            }
        }
    }
    if conflicts == 0 {
        println!("  {} No lockfile conflicts detected", "✓".green());
    }
    println!();

    let sources = scripts::discover_all(&located.directory);
    if sources.is_empty() {
        println!("{}", "No script listing for this project type.".dimmed());
    }
    for list in sources {
        println!(
            "{} {} scripts available in {}",
            "✓".green(),
            list.scripts.len(),
            list.source
        );
    }

    exit_codes::SUCCESS
}
