//! Command bodies: gate the request, open the snapshot, run the engine,
//! report, then write the snapshot back.

use std::path::{Path, PathBuf};

use authorlink_recon::config::MAX_BATCH_LIMIT;
use authorlink_recon::gate::{authorize, StaticAuthorizer};
use authorlink_recon::model::{AuthorTrace, TraceAction, WriteResult};
use authorlink_recon::{
    drive, BatchCursor, CriterionKind, MatchCriterion, MemoryDirectory, MemoryStore, Progress,
    ReconConfig, ReconEngine, Snapshot, UpdateMode,
};

use crate::{CliError, StoreArgs};

type Engine = ReconEngine<MemoryStore, MemoryDirectory>;

fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    match path {
        Some(path) => ReconConfig::load(path).map_err(|e| {
            CliError::recon(e).with_hint(format!("check {}", path.display()))
        }),
        None => Ok(ReconConfig::default()),
    }
}

/// Config, gate, snapshot, in that order. Nothing is read from the snapshot
/// before the request passes the gate.
fn open(args: &StoreArgs) -> Result<Engine, CliError> {
    let config = load_config(args.config.as_deref())?;

    let authorizer = StaticAuthorizer::from_config(&config.auth, true);
    authorize(&authorizer, args.token.as_deref()).map_err(CliError::recon)?;

    let snapshot = Snapshot::load(&args.snapshot).map_err(|e| {
        CliError::snapshot(format!("cannot read {}: {e}", args.snapshot.display()))
    })?;
    let (store, directory) = snapshot.into_parts();
    Ok(ReconEngine::new(store, directory, config))
}

fn persist(engine: Engine, args: &StoreArgs) -> Result<(), CliError> {
    if args.dry_run {
        log::info!("dry run: {} left untouched", args.snapshot.display());
        return Ok(());
    }
    let (store, directory) = engine.into_parts();
    Snapshot::from_parts(store, directory)
        .save(&args.snapshot)
        .map_err(|e| CliError::snapshot(format!("cannot write {}: {e}", args.snapshot.display())))?;
    eprintln!("wrote {}", args.snapshot.display());
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::snapshot(format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}

fn check_limit(limit: Option<usize>) -> Result<usize, CliError> {
    match limit {
        // 0 lets the engine fall back to batch.limit
        None => Ok(0),
        Some(0) => Err(CliError::args("--limit must be at least 1")),
        Some(n) if n > MAX_BATCH_LIMIT => Err(CliError::args(format!(
            "--limit must be at most {MAX_BATCH_LIMIT}"
        ))),
        Some(n) => Ok(n),
    }
}

// ============================================================================
// count
// ============================================================================

pub fn cmd_count(args: StoreArgs) -> Result<(), CliError> {
    let engine = open(&args)?;
    let count = engine.get_count();
    if args.json {
        print_json(&serde_json::json!({ "count": count }))
    } else {
        println!("{count}");
        Ok(())
    }
}

// ============================================================================
// batch
// ============================================================================

pub fn cmd_batch(
    args: StoreArgs,
    offset: usize,
    limit: Option<usize>,
    force: bool,
    mode: UpdateMode,
) -> Result<(), CliError> {
    let limit = check_limit(limit)?;
    let mut engine = open(&args)?;

    let report = engine
        .run_batch(BatchCursor::new(offset, limit), force, mode)
        .map_err(CliError::recon)?;

    if args.json {
        print_json(&report)?;
    }
    eprintln!("{}", report.message);
    eprintln!(
        "page at offset {}: processed {} of {}, {} remaining",
        report.cursor.offset, report.processed, report.total, report.remaining
    );

    persist(engine, &args)
}

// ============================================================================
// run
// ============================================================================

pub fn cmd_run(
    args: StoreArgs,
    limit: Option<usize>,
    force: bool,
    mode: UpdateMode,
    max_pages: Option<usize>,
) -> Result<(), CliError> {
    let limit = check_limit(limit)?;
    if max_pages == Some(0) {
        return Err(CliError::args("--max-pages must be at least 1"));
    }
    let mut engine = open(&args)?;

    let mut pages = 0;
    let summary = drive(&mut engine, limit, force, mode, |report| {
        pages += 1;
        eprintln!(
            "  page {pages}: offset {}, processed {}, updated {}, remaining {}",
            report.cursor.offset, report.processed, report.updated, report.remaining
        );
        match max_pages {
            Some(max) if pages >= max => Progress::Cancel,
            _ => Progress::Continue,
        }
    })
    .map_err(CliError::recon)?;

    if args.json {
        print_json(&summary)?;
    }
    let t = &summary.tally;
    eprintln!(
        "{} page(s), {} authors: {} updated, {} skipped, {} errors{}",
        summary.pages,
        summary.total,
        t.updated,
        t.skipped,
        t.errors,
        if summary.cancelled {
            format!(" (stopped early, {} remaining)", summary.remaining)
        } else {
            String::new()
        },
    );

    persist(engine, &args)
}

// ============================================================================
// target
// ============================================================================

pub fn cmd_target(
    args: StoreArgs,
    kind: CriterionKind,
    value: String,
    force: bool,
    mode: UpdateMode,
    show_trace: bool,
) -> Result<(), CliError> {
    let mut engine = open(&args)?;
    let criterion = MatchCriterion::new(kind, value);

    let report = match engine.run_for_target(&criterion, force, mode) {
        Ok(report) => report,
        Err(err) => {
            if !err.trace().is_empty() {
                if args.json {
                    print_json(&serde_json::json!({
                        "error": err.to_string(),
                        "trace": err.trace(),
                    }))?;
                } else {
                    print_trace(err.trace());
                }
            }
            return Err(CliError::recon(err));
        }
    };

    if args.json {
        print_json(&report)?;
    } else if show_trace {
        print_trace(&report.trace);
    }
    eprintln!(
        "user {} ({}): {}",
        report.user.id, report.user.login, report.message
    );

    persist(engine, &args)
}

fn print_trace(trace: &[AuthorTrace]) {
    for t in trace {
        let action = match t.action {
            Some(TraceAction::Update) => "update",
            Some(TraceAction::ForceUpdate) => "force update",
            Some(TraceAction::SkipMappedElsewhere) => "skip (mapped elsewhere)",
            None => "-",
        };
        let result = match t.write_result {
            Some(WriteResult::Success) => "ok",
            Some(WriteResult::Failed) => "FAILED",
            None => "-",
        };
        eprintln!(
            "  #{:<6} {:<24} email={} ({}) match={} action={} write={}",
            t.author_id,
            t.name,
            t.email.as_deref().unwrap_or("-"),
            t.email_source.map(|s| s.label()).unwrap_or("none"),
            t.match_reason.map(|r| r.to_string()).unwrap_or_else(|| "no".into()),
            action,
            result,
        );
    }
}

// ============================================================================
// auto-map
// ============================================================================

pub fn cmd_auto_map(args: StoreArgs, authors: Vec<u64>) -> Result<(), CliError> {
    let mut engine = open(&args)?;
    let mapped = engine.auto_map_unlinked(&authors);

    if args.json {
        print_json(&serde_json::json!({
            "selected": authors.len(),
            "mapped": mapped,
        }))?;
    }
    eprintln!("Mapped {mapped} author(s) to users by email.");

    persist(engine, &args)
}

// ============================================================================
// validate-config
// ============================================================================

pub fn cmd_validate_config(path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&path))?;
    eprintln!(
        "valid: batch limit {}, link key '{}', ambiguity {:?}, bulk respects force: {}, token {}",
        config.batch.limit,
        config.meta_keys.link,
        config.policy.ambiguity,
        config.policy.bulk_respects_force,
        if config.auth.token.is_some() { "required" } else { "not required" },
    );
    Ok(())
}
