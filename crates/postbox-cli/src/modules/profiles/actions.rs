use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use postbox_core::fs::write_atomic;
use postbox_core::{ExportBundle, ProfileName};

use crate::cli_args::{ExportArgs, ImportArgs, ProfileArgs, ProfileCommand};
use crate::modules::system::CommandContext;

pub(crate) fn handle_profile_command(args: ProfileArgs, ctx: &CommandContext) -> anyhow::Result<()> {
    match args.command {
        ProfileCommand::List => list_profiles(ctx),
        ProfileCommand::Use(args) => {
            let name = ProfileName::parse(&args.name)?;
            ctx.credentials.registry().set_active(&name)?;
            println!("Active profile: {name}");
            Ok(())
        }
        ProfileCommand::Delete(args) => {
            let name = ProfileName::parse(&args.name)?;
            ctx.credentials.delete_profile(&name)?;
            println!("Deleted profile '{name}'");
            Ok(())
        }
        ProfileCommand::Export(args) => export_profile(args, ctx),
        ProfileCommand::Import(args) => import_profile(args, ctx),
    }
}

fn list_profiles(ctx: &CommandContext) -> anyhow::Result<()> {
    let registry = ctx.credentials.registry();
    let names = registry.list()?;
    if names.is_empty() {
        println!("No profiles yet; run `postbox login` to create one.");
        return Ok(());
    }
    let active = registry.active()?;
    for name in names {
        let marker = if name == active { "*" } else { " " };
        match registry.email(&name)? {
            Some(email) => println!("{marker} {name}\t{email}"),
            None => println!("{marker} {name}"),
        }
    }
    Ok(())
}

fn export_profile(args: ExportArgs, ctx: &CommandContext) -> anyhow::Result<()> {
    let bundle = ctx.credentials.export_profile(ctx.profile.as_ref())?;
    let mut payload = serde_json::to_vec_pretty(&bundle)?;
    payload.push(b'\n');
    match stdio_or_path(args.output) {
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&payload)?;
            stdout.flush()?;
        }
        Some(path) => {
            write_atomic(&path, &payload)?;
            eprintln!("Exported profile '{}' to {}", bundle.profile, path.display());
        }
    }
    Ok(())
}

fn import_profile(args: ImportArgs, ctx: &CommandContext) -> anyhow::Result<()> {
    let raw = match stdio_or_path(args.input) {
        None => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            raw
        }
        Some(path) => read_bundle_file(&path)?,
    };
    let bundle: ExportBundle = serde_json::from_str(&raw)
        .map_err(|err| anyhow::anyhow!("invalid export bundle: {err}"))?;
    bundle.ensure_supported()?;

    let target = match args.name.as_deref() {
        Some(name) => ProfileName::parse(name)?,
        None => ProfileName::parse(&bundle.profile)?,
    };
    if !args.force && ctx.credentials.registry().exists(&target)? {
        anyhow::bail!("profile '{target}' already exists; pass --force to overwrite it");
    }

    let profile = ctx.credentials.import_profile(&bundle, Some(&target))?;
    println!("Imported profile '{profile}'");
    Ok(())
}

fn stdio_or_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|path| path.as_os_str() != "-")
}

fn read_bundle_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("failed to read {}: {err}", path.display()))
}
