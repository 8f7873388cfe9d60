use std::time::Duration;

use compose_timer::host::HostDocument;
use compose_timer::{AugmentConfig, Augmenter, IntervalTicks, PageDocument, TickSource};
use tokio::runtime::Handle;

const PAGE: &str = r#"
    <html><body>
        <div role="button" gh="cm">Compose</div>
        <div id="compose-host"></div>
    </body></html>
"#;

const DRAFT: &str = r#"
    <div role="dialog" id="draft">
        <div class="header"><span aria-label="New Message">New Message</span></div>
        <div role="button" data-tooltip="Send">Send</div>
    </div>
"#;

async fn run_until_elapsed(augmenter: &mut Augmenter<PageDocument, IntervalTicks>, seconds: u64) {
    let draft = augmenter.document().query("#draft").unwrap().unwrap();
    while augmenter.snapshot_for(&draft).unwrap().elapsed_seconds < seconds {
        let timer_id = augmenter.ticks_mut().next_fired().await.unwrap();
        augmenter.dispatch_tick(timer_id);
        augmenter.pump();
    }
}

#[tokio::test(start_paused = true)]
async fn interval_ticks_drive_a_compose_session() {
    let config = AugmentConfig::default();
    let document = PageDocument::parse(PAGE, &config).unwrap();
    let ticks = IntervalTicks::new(Handle::current());
    let mut augmenter = Augmenter::new(document, ticks, &config).unwrap();
    augmenter.start();

    let trigger = augmenter.document().find_trigger().unwrap();
    augmenter.document_mut().click(&trigger);
    augmenter.pump();

    let host = augmenter.document().query("#compose-host").unwrap().unwrap();
    augmenter.document_mut().insert_html(&host, DRAFT);
    augmenter.pump();
    assert_eq!(augmenter.ticks().active_count(), 1);

    let started = tokio::time::Instant::now();
    run_until_elapsed(&mut augmenter, 181).await;
    assert!(started.elapsed() >= Duration::from_secs(181));

    let taunt = augmenter
        .document()
        .query(".compose-timer__taunt")
        .unwrap()
        .expect("taunt after three minutes");
    assert_eq!(taunt.text_contents(), config.taunts[0]);

    let send = augmenter.document().query(r#"[data-tooltip="Send"]"#).unwrap().unwrap();
    augmenter.document_mut().click(&send);
    augmenter.pump();
    assert_eq!(augmenter.ticks().active_count(), 0);
    assert_eq!(augmenter.finished()[0].elapsed_seconds, 181);

    // Nothing fires for the cancelled interval.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(augmenter.pump(), 0);
    assert_eq!(augmenter.finished()[0].elapsed_seconds, 181);
}

#[tokio::test(start_paused = true)]
async fn faster_tick_interval_from_config() {
    let config = AugmentConfig::from_yaml("tick_interval_ms: 10\n").unwrap();
    let document = PageDocument::parse(PAGE, &config).unwrap();
    let ticks = IntervalTicks::new(Handle::current());
    let mut augmenter = Augmenter::new(document, ticks, &config).unwrap();
    augmenter.start();

    let trigger = augmenter.document().find_trigger().unwrap();
    augmenter.document_mut().click(&trigger);
    let host = augmenter.document().query("#compose-host").unwrap().unwrap();
    augmenter.document_mut().insert_html(&host, DRAFT);
    augmenter.pump();

    let started = tokio::time::Instant::now();
    run_until_elapsed(&mut augmenter, 30).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(
        augmenter
            .document()
            .query(".compose-timer__clock")
            .unwrap()
            .unwrap()
            .text_contents(),
        "0:30"
    );
}
