//! Relation inference command.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use sleuth_graph::CandidateBoard;
use sleuth_sync::Session;

use super::Globals;
use crate::output;

#[derive(Args)]
pub struct InferArgs {
    /// Apply the candidate with this number (as listed, starting at 1)
    #[arg(long, conflicts_with = "dismiss")]
    pub apply: Option<usize>,

    /// Dismiss the candidate with this number and list the rest
    #[arg(long)]
    pub dismiss: Option<usize>,
}

fn to_index(number: usize) -> Result<usize> {
    if number == 0 {
        bail!("Candidates are numbered from 1");
    }
    Ok(number - 1)
}

pub async fn execute(session: &Session, args: InferArgs, globals: &Globals) -> Result<()> {
    let mut board = CandidateBoard::new();
    board.generate(session.store().graph_snapshot());

    if let Some(number) = args.apply {
        let relation = board.apply(to_index(number)?, session.sync()).await?;
        let store = session.store();
        let graph = store.graph_snapshot();
        println!(
            "{} {} {} {} {}",
            "✓".green(),
            graph.label_of(&relation.from_id).bold(),
            format!("-[{}]->", relation.label).yellow(),
            graph.label_of(&relation.to_id).bold(),
            format!("({})", relation.id).dimmed()
        );
        if globals.offline {
            println!("{}", "Offline snapshot: changes are not saved.".dimmed());
        }
        return Ok(());
    }

    if let Some(number) = args.dismiss {
        if board.dismiss(to_index(number)?).is_none() {
            bail!("No candidate numbered {} ({} listed)", number, board.len());
        }
    }

    if globals.json {
        println!("{}", serde_json::to_string_pretty(board.candidates())?);
    } else {
        output::print_candidates(session.store().graph_snapshot(), board.candidates());
    }
    Ok(())
}
