//! Case-level commands: status, listings, validation and write-back.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use sleuth_core::{EntityRole, EntityType, SleuthError};
use sleuth_sync::Session;

use super::Globals;
use crate::output;

#[derive(Args)]
pub struct EntitiesArgs {
    /// Only entities with this role (victime, suspect, temoin, enqueteur, autre)
    #[arg(long)]
    pub role: Option<String>,

    /// Only entities of this type (personne, lieu, objet, ...)
    #[arg(long = "type")]
    pub entity_type: Option<String>,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// File to validate instead of the case's current text
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct PushArgs {
    /// File holding the new canonical text
    pub file: PathBuf,
}

pub fn status(session: &Session, globals: &Globals) -> Result<()> {
    let store = session.store();
    let diverged = session.sync().is_diverged();

    if globals.json {
        let value = serde_json::json!({
            "case_id": store.case_id(),
            "state": session.sync().state().as_str(),
            "last_sync": store.last_sync(),
            "entities": store.entities().len(),
            "evidence": store.evidence().len(),
            "timeline": store.timeline().len(),
            "hypotheses": store.hypotheses().len(),
            "relations": store.relations().len(),
            "dangling_relations": store.dangling_relations().len(),
            "contexts": store.contexts(),
            "diverged": diverged,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    output::print_status(&store, session.sync().state(), diverged);
    if globals.offline {
        println!("{}", "Offline snapshot: changes are not saved.".dimmed());
    }
    Ok(())
}

pub fn entities(session: &Session, args: EntitiesArgs, globals: &Globals) -> Result<()> {
    let store = session.store();
    let role = args.role.as_deref().map(EntityRole::from_str);
    let entity_type = args.entity_type.as_deref().map(EntityType::from_str);

    let selected: Vec<_> = store
        .entities()
        .iter()
        .filter(|e| role.map_or(true, |r| e.role == r))
        .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
        .collect();

    if globals.json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
    } else {
        output::print_entities_table(&selected);
    }
    Ok(())
}

pub fn timeline(session: &Session, globals: &Globals) -> Result<()> {
    let store = session.store();
    if globals.json {
        println!("{}", serde_json::to_string_pretty(store.timeline())?);
    } else {
        output::print_timeline(store.timeline());
    }
    Ok(())
}

pub async fn validate(session: &Session, args: ValidateArgs, globals: &Globals) -> Result<()> {
    let text = match &args.file {
        Some(path) => Some(
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let report = session.sync().validate_canonical_text(text.as_deref()).await?;

    if globals.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_validation(&report);
    }

    report.into_result()?;
    Ok(())
}

pub async fn push(session: &Session, args: PushArgs, globals: &Globals) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    match session.sync().update_canonical_text(text).await {
        Ok(store) => {
            println!(
                "{} {} ({} entities, {} relations)",
                "✓".green(),
                "Canonical text updated".bold(),
                store.entities().len(),
                store.relations().len()
            );
            if globals.offline {
                println!("{}", "Offline snapshot: changes are not saved.".dimmed());
            }
            Ok(())
        }
        Err(err @ SleuthError::InconsistentWriteback { .. }) => {
            eprintln!("{}", "DIVERGED".red().bold());
            eprintln!(
                "{}",
                "The new text was parsed but could not be saved. The stored case is now out of date.".red()
            );
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
