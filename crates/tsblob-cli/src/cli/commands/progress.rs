//! Progress reporting while the engine works.

use anyhow::{Context, Result};
use std::io::Write;
use std::time::{Duration, Instant};
use tsblob_core::{BlockOutcome, FileTransferContext};

const PROGRESS_INTERVAL_MS: u64 = 500;

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}

fn print_line(ctx: &FileTransferContext, label: &str, elapsed: Duration) {
    let done = ctx.bytes_done();
    let total = ctx.file().size;
    let pct = if total > 0 {
        done as f64 / total as f64 * 100.0
    } else {
        100.0
    };
    let rate = if elapsed.as_secs_f64() > 0.0 {
        done as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    eprint!(
        "\r  {} {:.1} / {:.1} MiB ({:.1}%)  {} / {} blocks  {:.2} MiB/s  ",
        label,
        mib(done),
        mib(total),
        pct,
        ctx.blocks_done(),
        ctx.block_count(),
        rate / 1_048_576.0
    );
    let _ = std::io::stderr().flush();
}

/// Wait for every block of `ctx`, printing progress to stderr meanwhile.
pub async fn wait_with_progress(ctx: &FileTransferContext, label: &str) -> Result<()> {
    let mut waiter = {
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || ctx.wait())
    };
    let mut ticker = tokio::time::interval(Duration::from_millis(PROGRESS_INTERVAL_MS));
    let start = Instant::now();
    loop {
        tokio::select! {
            res = &mut waiter => {
                res.context("transfer waiter failed")?;
                break;
            }
            _ = ticker.tick() => print_line(ctx, label, start.elapsed()),
        }
    }
    print_line(ctx, label, start.elapsed());
    eprintln!();
    Ok(())
}

/// Fail with a summary naming every failed block.
pub fn ensure_success(ctx: &FileTransferContext, what: &str) -> Result<()> {
    let failures = ctx.failures();
    if failures.is_empty() {
        return Ok(());
    }
    for (index, outcome) in &failures {
        if let BlockOutcome::Failed { kind, detail } = outcome {
            tracing::warn!(index, ?kind, %detail, "{what}: block failed");
            eprintln!("  block {index}: {detail}");
        }
    }
    anyhow::bail!(
        "{what} of {} failed: {} of {} blocks",
        ctx.file().path,
        failures.len(),
        ctx.block_count()
    )
}

/// One-line summary after a successful transfer.
pub fn report(ctx: &FileTransferContext, verb: &str) {
    match ctx.stats() {
        Some(stats) => println!(
            "{} {} ({} bytes, {} blocks) in {:.2}s, {:.2} MiB/s",
            verb,
            ctx.file().path,
            stats.bytes,
            ctx.block_count(),
            stats.duration.as_secs_f64(),
            stats.bytes_per_sec() / 1_048_576.0
        ),
        None => println!("{} {}", verb, ctx.file().path),
    }
}
