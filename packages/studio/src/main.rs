//! Storyboard studio composition root.
//!
//! Builds the task queue from the environment, submits a demo episode's
//! asset generation through it and reports the outcome. Ctrl-C cancels the
//! work that has not started yet.

use std::error::Error;

use task_actors::{JobCategory, JobRequest, QueueEvent, TaskError, TaskQueue, task_fn};
use task_core::QueueConfig;
use tokio::sync::broadcast::error::RecvError;

mod storyboard;

use storyboard::{AssetBoard, AssetKind, asset_request, demo_episode, shot_count_from};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let level = std::env::var("STUDIO_LOG")
        .ok()
        .and_then(|value| value.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = QueueConfig::from_env()?;
    let shot_count = shot_count_from(|key| std::env::var(key).ok())?;

    let (queue, handle) = TaskQueue::start(config).await?;
    let mut events = queue.events();

    // Listeners run on the manager actor, so this one only logs.
    let monitor = queue.subscribe(|event| {
        if event.is_terminal() {
            tracing::info!("{}", event.description());
        }
    });

    let board = AssetBoard::default();
    let shots = demo_episode(shot_count);

    queue.submit(JobRequest::new(
        JobCategory::TextGeneration,
        "Script for Episode 1",
        task_fn(move || async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok::<_, TaskError>(shot_count)
        }),
    ))?;
    for shot in &shots {
        queue.submit(asset_request(shot, AssetKind::StartFrame, &board))?;
        if shot.dialogue.is_some() {
            queue.submit(asset_request(shot, AssetKind::Audio, &board))?;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event)
                    if event.is_terminal()
                        || matches!(event, QueueEvent::PendingCancelled { .. }) =>
                {
                    let stats = queue.stats().await?;
                    tracing::info!(
                        "{:.0}% done, {} active, {} pending",
                        stats.progress_percent(),
                        stats.processing,
                        stats.pending
                    );
                    if !stats.is_working() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                let cancelled = queue.cancel_all().await?;
                tracing::warn!("Cancelled {} pending jobs, waiting for running ones", cancelled);
            }
        }
    }

    monitor.unsubscribe();

    let jobs = queue.jobs().await?;
    let stats = queue.stats().await?;
    if let Some(rate) = stats.success_rate() {
        tracing::info!("{} of {} jobs succeeded ({:.0}%)", stats.completed, stats.finished(), rate);
    }
    let summary = serde_json::json!({
        "stats": stats,
        "jobs": jobs,
        "assets": board.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    queue.shutdown();
    handle.await?;
    Ok(())
}
