use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use rand::RngCore;

use lm_outline::{Finding, Severity};
use lm_service::{
    AddRequest, CancelToken, CompactRequest, DeleteMode, DeleteRequest, FsLock, FsProjectDir,
    FsReservations, MoveRequest, OutlineService, RenamePair, RenameRequest, ServiceError,
    TypeRequest, find_project_root, init_project,
};

/// linemark — outline management for writing projects
#[derive(Parser)]
#[command(name = "linemark", version, about = "Manage a filename-encoded writing-project outline")]
struct Cli {
    /// Directory to start project discovery from
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .linemark/ project in the given directory
    Init,
    /// Add a node: a titled draft plus an empty notes file
    Add {
        /// Title for the new node
        title: String,
        /// Parent position (materialized path; omit for the root level)
        #[arg(long, default_value = "")]
        parent: String,
        /// Insert before this sibling (selector)
        #[arg(long, conflicts_with = "after")]
        before: Option<String>,
        /// Insert after this sibling (selector)
        #[arg(long)]
        after: Option<String>,
        /// Plan only; write nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove a node
    Rm {
        /// Node selector (mp:..., sid:..., or bare)
        selector: String,
        /// Also remove every descendant
        #[arg(long, conflicts_with = "promote")]
        recursive: bool,
        /// Reparent direct children to the removed node's parent
        #[arg(long)]
        promote: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Move a node (and its subtree) under a new parent
    Mv {
        /// Node to move
        source: String,
        /// New parent selector; omit to move to the root level
        dest: Option<String>,
        /// Place before this sibling (selector)
        #[arg(long, conflicts_with = "after")]
        before: Option<String>,
        /// Place after this sibling (selector)
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Renumber children to even tier spacing, recursively
    Compact {
        /// Node whose subtree to compact; omit for the whole outline
        selector: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Change a node's title (rewrites frontmatter and the draft slug)
    Rename {
        selector: String,
        title: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the outline and report findings
    Check,
    /// Fix repairable findings (missing notes, markers, drifted slugs)
    Repair,
    /// Print the outline as an indented tree
    List,
    /// List a node's document types
    Types { selector: String },
    /// Create an empty document of a new type on a node
    TypesAdd { selector: String, doc_type: String },
    /// Remove a node's document of the given type
    TypesRm { selector: String, doc_type: String },
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Byte source for identifier generation, backed by the OS RNG.
struct OsRandom;

impl Read for OsRandom {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        rand::rngs::OsRng.fill_bytes(buf);
        Ok(buf.len())
    }
}

fn service_at(root: &Path) -> OutlineService {
    OutlineService::new(
        Box::new(FsProjectDir::new(root)),
        Box::new(FsLock::new(root)),
        Box::new(OsRandom),
    )
    .with_reservations(Box::new(FsReservations::new(root)))
}

fn discover_root(start: &Path) -> PathBuf {
    match find_project_root(start) {
        Some(root) => root,
        None => {
            eprintln!(
                "No linemark project found from {} upward (missing .linemark/); run `linemark init` first.",
                start.display()
            );
            process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let cancel = CancelToken::new();

    if let Commands::Init = cli.command {
        cmd_init(&cli.dir);
        return;
    }

    let root = discover_root(&cli.dir);
    let mut svc = service_at(&root);

    let result = match cli.command {
        Commands::Init => unreachable!(),
        Commands::Add { title, parent, before, after, dry_run } => {
            cmd_add(&mut svc, &cancel, title, parent, before, after, !dry_run)
        }
        Commands::Rm { selector, recursive, promote, dry_run } => {
            cmd_rm(&mut svc, &cancel, selector, recursive, promote, !dry_run)
        }
        Commands::Mv { source, dest, before, after, dry_run } => {
            cmd_mv(&mut svc, &cancel, source, dest, before, after, !dry_run)
        }
        Commands::Compact { selector, dry_run } => cmd_compact(&mut svc, &cancel, selector, !dry_run),
        Commands::Rename { selector, title, dry_run } => {
            cmd_rename(&mut svc, &cancel, selector, title, !dry_run)
        }
        Commands::Check => cmd_check(&svc, &cancel),
        Commands::Repair => cmd_repair(&mut svc, &cancel),
        Commands::List => cmd_list(&svc, &cancel),
        Commands::Types { selector } => cmd_types(&svc, &cancel, selector),
        Commands::TypesAdd { selector, doc_type } => {
            cmd_types_add(&mut svc, &cancel, selector, doc_type)
        }
        Commands::TypesRm { selector, doc_type } => {
            cmd_types_rm(&mut svc, &cancel, selector, doc_type)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(dir: &Path) {
    match init_project(dir) {
        Ok(meta) => println!("Initialized linemark project at {}", meta.display()),
        Err(e) => {
            eprintln!("Error initializing project: {e}");
            process::exit(1);
        }
    }
}

fn cmd_add(
    svc: &mut OutlineService,
    cancel: &CancelToken,
    title: String,
    parent: String,
    before: Option<String>,
    after: Option<String>,
    apply: bool,
) -> Result<(), ServiceError> {
    let req = AddRequest { title, parent, before, after, apply };
    let out = svc.add(&req, cancel)?;
    if apply {
        println!("Added {} ({}) as {}", out.mp, out.sid, out.filename);
    } else {
        println!("Would add {} ({}) as {}", out.mp, out.sid, out.filename);
    }
    Ok(())
}

fn cmd_rm(
    svc: &mut OutlineService,
    cancel: &CancelToken,
    selector: String,
    recursive: bool,
    promote: bool,
    apply: bool,
) -> Result<(), ServiceError> {
    let mode = if recursive {
        DeleteMode::Recursive
    } else if promote {
        DeleteMode::Promote
    } else {
        DeleteMode::Default
    };
    let plan = svc.delete(&DeleteRequest { selector, mode, apply }, cancel)?;
    print_renames(&plan.renames, apply);
    for name in &plan.deletes {
        println!("{} {name}", if apply { "Deleted" } else { "Would delete" });
    }
    Ok(())
}

fn cmd_mv(
    svc: &mut OutlineService,
    cancel: &CancelToken,
    source: String,
    dest: Option<String>,
    before: Option<String>,
    after: Option<String>,
    apply: bool,
) -> Result<(), ServiceError> {
    let req = MoveRequest {
        source,
        target: dest.unwrap_or_default(),
        before,
        after,
        apply,
    };
    let plan = svc.move_node(&req, cancel)?;
    println!("{} {}", if apply { "Moved to" } else { "Would move to" }, plan.new_mp);
    print_renames(&plan.renames, apply);
    Ok(())
}

fn cmd_compact(
    svc: &mut OutlineService,
    cancel: &CancelToken,
    selector: Option<String>,
    apply: bool,
) -> Result<(), ServiceError> {
    let plan = svc.compact(&CompactRequest { selector, apply }, cancel)?;
    if plan.renames.is_empty() {
        println!("Nothing to compact.");
    } else {
        print_renames(&plan.renames, apply);
    }
    Ok(())
}

fn cmd_rename(
    svc: &mut OutlineService,
    cancel: &CancelToken,
    selector: String,
    title: String,
    apply: bool,
) -> Result<(), ServiceError> {
    let plan = svc.rename(&RenameRequest { selector, new_title: title, apply }, cancel)?;
    let old = plan.old_title.as_deref().unwrap_or("(untitled)");
    println!(
        "{} `{}` to `{}`",
        if apply { "Renamed" } else { "Would rename" },
        old,
        plan.new_title
    );
    print_renames(&plan.renames, apply);
    Ok(())
}

fn cmd_check(svc: &OutlineService, cancel: &CancelToken) -> Result<(), ServiceError> {
    let findings = svc.check(cancel)?;
    print!("{}", format_findings(&findings));
    if findings.iter().any(|f| f.severity == Severity::Error) {
        process::exit(1);
    }
    Ok(())
}

fn cmd_repair(svc: &mut OutlineService, cancel: &CancelToken) -> Result<(), ServiceError> {
    let outcome = svc.repair(cancel)?;
    if outcome.applied.is_empty() {
        println!("Nothing to repair.");
    } else {
        println!("Repaired {} finding(s):", outcome.applied.len());
        for f in &outcome.applied {
            println!("  {f}");
        }
    }
    if !outcome.unrepaired.is_empty() {
        println!("Unrepaired:");
        for f in &outcome.unrepaired {
            println!("  {f}");
        }
    }
    Ok(())
}

fn cmd_list(svc: &OutlineService, cancel: &CancelToken) -> Result<(), ServiceError> {
    let (outline, findings) = svc.load(cancel)?;
    if outline.is_empty() {
        println!("(empty outline)");
    }
    for node in outline.nodes() {
        let indent = "  ".repeat(node.mp.depth().saturating_sub(1));
        let label = node
            .title
            .clone()
            .unwrap_or_else(|| "(untitled)".into());
        println!("{indent}{} {} [{}]", node.mp, label, node.sid);
    }
    if !findings.is_empty() {
        println!("{} finding(s); run `linemark check` for details.", findings.len());
    }
    Ok(())
}

fn cmd_types(svc: &OutlineService, cancel: &CancelToken, selector: String) -> Result<(), ServiceError> {
    for t in svc.list_types(&selector, cancel)? {
        println!("{t}");
    }
    Ok(())
}

fn cmd_types_add(
    svc: &mut OutlineService,
    cancel: &CancelToken,
    selector: String,
    doc_type: String,
) -> Result<(), ServiceError> {
    let change = svc.add_type(&TypeRequest { selector, doc_type, apply: true }, cancel)?;
    println!("Created {}", change.filename);
    Ok(())
}

fn cmd_types_rm(
    svc: &mut OutlineService,
    cancel: &CancelToken,
    selector: String,
    doc_type: String,
) -> Result<(), ServiceError> {
    let change = svc.remove_type(&TypeRequest { selector, doc_type, apply: true }, cancel)?;
    println!("Deleted {}", change.filename);
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_renames(renames: &[RenamePair], applied: bool) {
    for r in renames {
        println!("{} {} -> {}", if applied { "Renamed" } else { "Would rename" }, r.from, r.to);
    }
}

/// Render findings the way humans read them: errors first, then warnings.
fn format_findings(findings: &[Finding]) -> String {
    let mut out = String::new();
    out.push_str("Outline Check Report\n");
    out.push_str("====================\n");
    let errors: Vec<&Finding> =
        findings.iter().filter(|f| f.severity == Severity::Error).collect();
    let warnings: Vec<&Finding> =
        findings.iter().filter(|f| f.severity == Severity::Warning).collect();
    out.push_str(&format!("Errors: {} | Warnings: {}\n", errors.len(), warnings.len()));

    if !errors.is_empty() {
        out.push_str("\nERRORS:\n");
        for f in errors {
            out.push_str(&format!("  {f}\n"));
        }
    }
    if !warnings.is_empty() {
        out.push_str("\nWARNINGS:\n");
        for f in warnings {
            out.push_str(&format!("  {f}\n"));
        }
    }
    if findings.is_empty() {
        out.push_str("\nNo findings.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lm_outline::FindingKind;

    #[test]
    fn format_findings_groups_by_severity() {
        let findings = vec![
            Finding {
                kind: FindingKind::DuplicateSid,
                severity: Severity::Error,
                message: "sid X appears twice".into(),
                path: None,
            },
            Finding {
                kind: FindingKind::SlugDrift,
                severity: Severity::Warning,
                message: "slug stale".into(),
                path: Some("100_X_draft_old.md".into()),
            },
        ];
        let out = format_findings(&findings);
        assert!(out.contains("Errors: 1 | Warnings: 1"));
        assert!(out.contains("ERRORS:"));
        assert!(out.contains("[duplicate_sid] sid X appears twice"));
        assert!(out.contains("WARNINGS:"));
        assert!(out.contains("[slug_drift] 100_X_draft_old.md: slug stale"));
    }

    #[test]
    fn format_findings_empty_report() {
        let out = format_findings(&[]);
        assert!(out.contains("No findings."));
    }
}
