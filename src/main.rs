use std::path::PathBuf;

use anyhow::{Context, Result};
use compose_timer::config::{default_config_path, AugmentConfig};
use compose_timer::scenario::Scenario;
use compose_timer::{logging, Augmenter, IntervalTicks, PageDocument, WidgetSnapshot};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{info, warn};

type LiveAugmenter = Augmenter<PageDocument, IntervalTicks>;

#[derive(Serialize)]
struct Report {
    live: Vec<WidgetSnapshot>,
    finished: Vec<WidgetSnapshot>,
}

fn main() -> Result<()> {
    logging::init();

    let scenario_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: compose-timer <scenario.yaml>")?;

    let config = AugmentConfig::load(default_config_path()).context("failed to load config")?;
    let scenario = Scenario::load(&scenario_path)
        .with_context(|| format!("failed to load scenario {}", scenario_path.display()))?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let report = rt.block_on(replay(scenario, config))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn replay(scenario: Scenario, config: AugmentConfig) -> Result<Report> {
    let document = PageDocument::parse(&scenario.page, &config).context("failed to load page")?;
    let ticks = IntervalTicks::new(Handle::current());
    let mut augmenter = Augmenter::new(document, ticks, &config)?;
    augmenter.start();

    info!(
        steps = scenario.steps.len(),
        duration_ms = scenario.duration_ms(),
        "replaying scenario"
    );

    let mut deadline = Instant::now();
    for (index, step) in scenario.steps.iter().enumerate() {
        deadline += Duration::from_millis(step.after_ms);
        drive_until(&mut augmenter, deadline).await;

        // A step that no longer matches the page is host drift, not a failure.
        if let Err(err) = step.action.apply(augmenter.document_mut()) {
            warn!(step = index, error = %err, "scenario step skipped");
        }
        augmenter.pump();
    }

    deadline += Duration::from_millis(scenario.linger_ms);
    drive_until(&mut augmenter, deadline).await;

    let live = augmenter.snapshots();
    augmenter.stop_all();
    Ok(Report {
        live,
        finished: augmenter.finished().to_vec(),
    })
}

/// Deliver clock ticks as they fire until `deadline` passes.
async fn drive_until(augmenter: &mut LiveAugmenter, deadline: Instant) {
    loop {
        tokio::select! {
            fired = augmenter.ticks_mut().next_fired() => match fired {
                Some(timer_id) => {
                    augmenter.dispatch_tick(timer_id);
                    augmenter.pump();
                }
                None => {
                    sleep_until(deadline).await;
                    return;
                }
            },
            _ = sleep_until(deadline) => return,
        }
    }
}
