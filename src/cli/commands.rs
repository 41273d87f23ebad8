//! Command dispatch: maps parsed arguments onto services

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::PathContextExt;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{Path as DocPath, ToTree};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::yaml::emit_document;
use crate::infrastructure::InfraError;

/// Run the parsed command line.
#[instrument(level = "debug", skip(cli))]
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        let mut cmd = Cli::command();
        cmd.print_help()
            .map_err(|e| InfraError::io("print help", e))?;
        return Ok(());
    };

    match command {
        Commands::Update {
            user,
            defaults,
            relocations,
            output,
            dry_run,
        } => cmd_update(
            &load_container(cli)?,
            user,
            defaults,
            relocations.as_deref(),
            output.as_deref(),
            *dry_run,
        ),
        Commands::Relocate {
            user,
            relocations,
            from,
            to,
            output,
        } => cmd_relocate(
            &load_container(cli)?,
            user,
            relocations.as_deref(),
            from,
            to,
            output.as_deref(),
        ),
        Commands::Tree { file } => cmd_tree(&load_container(cli)?, file),
        Commands::Versions => cmd_versions(&load_container(cli)?),
        Commands::Config { command } => cmd_config(&load_container(cli)?, command, cli),
        Commands::Completion { shell } => {
            cmd_completion(*shell);
            Ok(())
        }
    }
}

/// Layered settings for the project directory, wired into services.
fn load_container(cli: &Cli) -> CliResult<ServiceContainer> {
    let project_dir = resolve_project_dir(cli.project_dir.as_deref())?;
    let settings = Settings::load(Some(project_dir.as_path()))?;
    debug!("settings: {:?}", settings);
    Ok(ServiceContainer::new(settings))
}

fn resolve_project_dir(project_dir: Option<&Path>) -> CliResult<PathBuf> {
    match project_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("determine current directory", e).into()),
    }
}

/// Relocation file from the command line, else from settings.
fn relocations_path<'a>(
    container: &'a ServiceContainer,
    explicit: Option<&'a Path>,
) -> Option<&'a Path> {
    explicit.or(container.settings.relocations.as_deref())
}

fn cmd_update(
    container: &ServiceContainer,
    user: &Path,
    defaults: &Path,
    relocations: Option<&Path>,
    output_path: Option<&Path>,
    dry_run: bool,
) -> CliResult<()> {
    let relocations = relocations_path(container, relocations);
    if relocations.is_none() {
        output::warning("no relocation file given, only merging defaults");
    }

    let update = container
        .update_service
        .update_file(user, defaults, relocations, output_path, dry_run)?;
    let outcome = &update.outcome;

    if outcome.fallback {
        output::warning(&format!(
            "{} has no known version, treated as {}",
            user.display(),
            outcome.from
        ));
    }

    if dry_run {
        output::header(&format!(
            "Dry run: {} ({} -> {})",
            user.display(),
            outcome.from,
            outcome.to
        ));
        print_leaf_diff(&update.before, &update.after);
        output::info(&update.rendered);
        return Ok(());
    }

    if let Some(written) = &update.written {
        output::success(&format!(
            "{} updated {} -> {}",
            written.display(),
            outcome.from,
            outcome.to
        ));
    }
    output::detail(&format!(
        "{} moved, {} skipped, {} added, {} replaced, {} removed",
        outcome.relocation.moved,
        outcome.relocation.skipped,
        outcome.merge.added,
        outcome.merge.replaced,
        outcome.merge.removed
    ));
    Ok(())
}

fn print_leaf_diff(before: &[DocPath], after: &[DocPath]) {
    let old: HashSet<&DocPath> = before.iter().collect();
    let new: HashSet<&DocPath> = after.iter().collect();
    for path in before.iter().filter(|p| !new.contains(p)) {
        output::diff_remove(path);
    }
    for path in after.iter().filter(|p| !old.contains(p)) {
        output::diff_add(path);
    }
}

fn cmd_relocate(
    container: &ServiceContainer,
    user: &Path,
    relocations: Option<&Path>,
    from: &str,
    to: &str,
    output_path: Option<&Path>,
) -> CliResult<()> {
    let Some(relocations) = relocations_path(container, relocations) else {
        return Err(CliError::Usage(
            "relocate needs --relocations or `relocations` in config".into(),
        ));
    };
    if !container.fs.is_file(user) {
        return Err(CliError::InvalidArgs(format!(
            "document not found: {}",
            user.display()
        )));
    }

    let service = &container.update_service;
    let relocations = service.load_relocations(relocations)?;
    let mut document = service.load_document(user)?;
    let report = service.relocate_document(&mut document, &relocations, from, to)?;
    let rendered = emit_document(&document).with_path_context("render document", user)?;

    match output_path {
        Some(path) => {
            service.write(path, &rendered)?;
            output::success(&format!(
                "{} relocated {} -> {} ({} moved, {} skipped)",
                path.display(),
                from,
                to,
                report.moved,
                report.skipped
            ));
        }
        None => output::info(&rendered),
    }
    Ok(())
}

fn cmd_tree(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    if !container.fs.is_file(file) {
        return Err(CliError::InvalidArgs(format!(
            "document not found: {}",
            file.display()
        )));
    }
    let document = container.update_service.load_document(file)?;
    output::info(&document.to_tree_string());
    Ok(())
}

fn cmd_versions(container: &ServiceContainer) -> CliResult<()> {
    let catalog = container.update_service.catalog()?;
    output::header(&format!(
        "{} versions at '{}'",
        catalog.len(),
        container.settings.versioning.route
    ));
    for id in catalog.ids() {
        output::detail(id);
    }
    Ok(())
}

fn cmd_config(container: &ServiceContainer, command: &ConfigCommands, cli: &Cli) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&container.settings.to_toml()?);
        }
        ConfigCommands::Template => {
            output::info(&Settings::template());
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::detail(&format!(
                    "global: {} ({})",
                    path.display(),
                    exists_label(&path)
                )),
                None => output::detail("global: (no config directory)"),
            }
            let project_dir = resolve_project_dir(cli.project_dir.as_deref())?;
            let local = local_config_path(&project_dir);
            output::detail(&format!(
                "local:  {} ({})",
                local.display(),
                exists_label(&local)
            ));
        }
    }
    Ok(())
}

fn cmd_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn exists_label(path: &Path) -> &'static str {
    if path.exists() {
        "exists"
    } else {
        "not found"
    }
}
