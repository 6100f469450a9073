//! Terminal output formatting.

use colored::{ColoredString, Colorize};

use sleuth_core::{Entity, EntityRole, GraphSnapshot, GraphStore, TimelineEvent};
use sleuth_graph::{path_edges, CandidateKind, CandidateRelation, Cone, FocusPartition};
use sleuth_sync::{SyncState, ValidationReport};

fn role_colored(role: EntityRole) -> ColoredString {
    match role {
        EntityRole::Victim => role.as_str().red(),
        EntityRole::Suspect => role.as_str().yellow(),
        EntityRole::Witness => role.as_str().cyan(),
        EntityRole::Investigator => role.as_str().blue(),
        EntityRole::Other => role.as_str().dimmed(),
    }
}

/// Print the status summary of a case.
pub fn print_status(store: &GraphStore, state: SyncState, diverged: bool) {
    println!("{} {}", "Case".bold(), store.case_id().cyan().bold());
    println!("{}", "─".repeat(40));

    let state_colored = match state {
        SyncState::Ready => state.as_str().green(),
        SyncState::Failed => state.as_str().red(),
        _ => state.as_str().yellow(),
    };
    println!("  State:       {}", state_colored);
    match store.last_sync() {
        Some(time) => println!("  Last sync:   {}", time.format("%Y-%m-%d %H:%M:%S UTC").to_string().green()),
        None => println!("  Last sync:   {}", "never".yellow()),
    }
    println!("  Entities:    {}", store.entities().len().to_string().cyan());
    println!("  Evidence:    {}", store.evidence().len().to_string().cyan());
    println!("  Timeline:    {}", store.timeline().len().to_string().cyan());
    println!("  Hypotheses:  {}", store.hypotheses().len().to_string().cyan());
    println!("  Relations:   {}", store.relations().len().to_string().cyan());

    let dangling = store.dangling_relations().len();
    if dangling > 0 {
        println!("  {} {} relation(s) point at unknown entities", "!".yellow().bold(), dangling);
    }
    if diverged {
        println!("  {}", "Stored canonical text is out of date (write-back failed)".red().bold());
    }
    println!("{}", "─".repeat(40));
}

/// Print entities as a table.
pub fn print_entities_table(entities: &[&Entity]) {
    if entities.is_empty() {
        println!("{}", "No entities found.".dimmed());
        return;
    }

    println!("{:<20} {:<28} {:<14} {:<10}", "ID", "Name", "Type", "Role");
    println!("{}", "─".repeat(75));

    for entity in entities {
        println!(
            "{:<20} {:<28} {:<14} {}",
            truncate(&entity.id, 18),
            truncate(&entity.name, 26),
            entity.entity_type.as_str(),
            role_colored(entity.role)
        );
    }
}

/// Print timeline events, oldest first.
pub fn print_timeline(events: &[TimelineEvent]) {
    if events.is_empty() {
        println!("{}", "Timeline is empty.".dimmed());
        return;
    }

    for event in events {
        let when = match event.timestamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string().normal(),
            None => "undated".dimmed(),
        };
        let check = if event.verified { "✓".green() } else { "?".yellow() };
        print!("  {} {:<16} {}", check, when, event.title.bold());
        if !event.location.is_empty() {
            print!(" {}", format!("@ {}", event.location).dimmed());
        }
        println!();
    }
}

/// Print an expansion cone.
pub fn print_cone(graph: &GraphSnapshot, cone: &Cone) {
    println!(
        "{} {} (depth={})",
        "Expansion cone of".bold(),
        graph.label_of(&cone.center).cyan(),
        cone.depth
    );
    println!("{}", "─".repeat(50));

    for id in cone.nodes.iter().filter(|id| **id != cone.center) {
        println!("  {} {} {}", "•".dimmed(), graph.label_of(id), format!("({})", id).dimmed());
    }
    println!(
        "\n{} nodes, {} edges.",
        cone.nodes.len().to_string().bold(),
        cone.edges.len().to_string().bold()
    );
}

/// Print discovered paths.
pub fn print_paths(graph: &GraphSnapshot, from: &str, to: &str, paths: &[Vec<String>]) {
    if paths.is_empty() {
        println!(
            "{} {} {} {}",
            "No path found between".dimmed(),
            graph.label_of(from),
            "and".dimmed(),
            graph.label_of(to)
        );
        return;
    }

    println!(
        "{} {} {} {}",
        format!("{} path(s) between", paths.len()).bold(),
        graph.label_of(from).cyan(),
        "and".bold(),
        graph.label_of(to).cyan()
    );
    let arrow = " → ".dimmed().to_string();
    for (i, path) in paths.iter().enumerate() {
        let labels: Vec<&str> = path.iter().map(|id| graph.label_of(id)).collect();
        println!("  {}. {}", i + 1, labels.join(arrow.as_str()));
        println!("     {}", path_edges(graph, path).join(", ").dimmed());
    }
}

/// Print a focus partition.
pub fn print_focus(graph: &GraphSnapshot, partition: &FocusPartition) {
    println!("{} {}", "Focus:".bold(), graph.label_of(&partition.selected).cyan().bold());
    println!("{}", "─".repeat(50));

    println!("{} ({}):", "Connected".bold(), partition.connected.len());
    for id in &partition.connected {
        println!("  {} {}", "•".green(), graph.label_of(id));
    }
    println!("{} ({}):", "Others".dimmed(), partition.others.len());
    for id in &partition.others {
        println!("  {} {}", "·".dimmed(), graph.label_of(id).dimmed());
    }
    println!(
        "\n{} incident edges, {} other edges.",
        partition.incident_edges.len().to_string().bold(),
        partition.other_edges.len()
    );
}

/// Print ranked inference candidates.
pub fn print_candidates(graph: &GraphSnapshot, candidates: &[CandidateRelation]) {
    if candidates.is_empty() {
        println!("{}", "No relation to suggest.".dimmed());
        return;
    }

    println!("{}", "Suggested relations".bold());
    println!("{}", "─".repeat(60));
    for (i, c) in candidates.iter().enumerate() {
        let kind = match c.kind {
            CandidateKind::Transitive => c.kind.as_str().magenta(),
            CandidateKind::Sibling => c.kind.as_str().blue(),
            CandidateKind::Orphan => c.kind.as_str().yellow(),
        };
        println!(
            "{:>3}. [{}] {} {} {}  {} {}",
            i + 1,
            kind,
            graph.label_of(&c.from_id).bold(),
            format!("-[{}]->", c.suggested_label).yellow(),
            graph.label_of(&c.to_id).bold(),
            format!("{:.0}%", c.confidence * 100.0).green(),
            c.reason.dimmed()
        );
    }
    println!("\nUse {} or {} to act on a suggestion.", "--apply N".cyan(), "--dismiss N".cyan());
}

/// Print a validation report.
pub fn print_validation(report: &ValidationReport) {
    if report.valid {
        println!("{} {}", "✓".green(), "Canonical text is well formed.".green());
        return;
    }
    println!("{} {} error(s):", "✗".red(), report.errors.len().to_string().red().bold());
    for error in &report.errors {
        println!("  {} {}", "-".red(), error);
    }
}

/// Truncate a string to at most `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
