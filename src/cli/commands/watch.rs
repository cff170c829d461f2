//! Watch command implementation.
//!
//! Streams change batches as they arrive: one text line per event, or one
//! compact JSON object per line with `--json`.

use anyhow::Result;
use beans_lib::{ChangeEvent, ChangeKind};
use std::io::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::{CommandContext, WatchArgs};
use crate::format::WatchLine;

/// Execute the watch command.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or watching fails.
pub fn execute(args: &WatchArgs, ctx: &CommandContext) -> Result<()> {
    let store = Arc::new(ctx.open_store()?);
    let subscription = store.subscribe()?;
    store.watch()?;
    ctx.say(format!("Watching {}", store.root().display()));

    let deadline = args.timeout.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut batches = 0_u64;
    let mut stdout = std::io::stdout().lock();

    loop {
        if args.max_batches.is_some_and(|max| batches >= max) {
            break;
        }
        let wait = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                left
            }
            None => Duration::from_secs(3600),
        };
        let Some(batch) = subscription.recv_timeout(wait) else {
            continue;
        };

        batches += 1;
        for event in batch.iter() {
            if ctx.json {
                let line = WatchLine {
                    batch: batches,
                    event,
                };
                writeln!(stdout, "{}", serde_json::to_string(&line)?)?;
            } else {
                writeln!(stdout, "{}", format_event(event))?;
            }
        }
        stdout.flush()?;
    }

    let dropped = subscription.dropped();
    if dropped > 0 {
        tracing::warn!(dropped, "subscriber fell behind, batches were dropped");
    }
    store.close();
    Ok(())
}

fn format_event(event: &ChangeEvent) -> String {
    let verb = match event.kind {
        ChangeKind::Created => "created",
        ChangeKind::Updated => "updated",
        ChangeKind::Deleted => "deleted",
    };
    match &event.bean {
        Some(bean) => format!("{verb} {} {}", event.id, bean.title),
        None => format!("{verb} {}", event.id),
    }
}
