use compose_timer::host::{DomPatch, HostDocument, TerminalControl};
use compose_timer::widget::StopReason;
use compose_timer::{AugmentConfig, Augmenter, ManualTicks, PageDocument, TickSource, WidgetPhase};
use kuchiki::NodeRef;

const INBOX: &str = r#"
    <!DOCTYPE html>
    <html>
        <body>
            <div class="nav"><div role="button" gh="cm">Compose</div></div>
            <div id="compose-host"></div>
        </body>
    </html>
"#;

const INBOX_WITHOUT_TRIGGER: &str = r#"
    <!DOCTYPE html>
    <html>
        <body>
            <div class="nav" id="nav"></div>
            <div id="compose-host"></div>
        </body>
    </html>
"#;

fn compose_window(id: &str) -> String {
    format!(
        r#"<div role="dialog" id="{id}">
            <div class="header"><span aria-label="New Message">New Message</span></div>
            <div class="body" contenteditable="true"></div>
            <div role="button" data-tooltip="Send (Ctrl-Enter)">Send</div>
            <div role="button" aria-label="Discard draft">Discard</div>
            <div role="button" aria-label="Close">Close</div>
        </div>"#
    )
}

type TestAugmenter = Augmenter<PageDocument, ManualTicks>;

fn augmenter(html: &str) -> TestAugmenter {
    let config = AugmentConfig::default();
    let document = PageDocument::parse(html, &config).expect("parse page");
    let mut augmenter = Augmenter::new(document, ManualTicks::new(), &config).expect("augmenter");
    augmenter.start();
    augmenter
}

fn query(augmenter: &TestAugmenter, selector: &str) -> Option<NodeRef> {
    augmenter.document().query(selector).expect("valid selector")
}

fn click(augmenter: &mut TestAugmenter, selector: &str) {
    let node = query(augmenter, selector).expect("click target");
    augmenter.document_mut().click(&node);
    augmenter.pump();
}

fn open_compose(augmenter: &mut TestAugmenter, id: &str) -> NodeRef {
    let host = query(augmenter, "#compose-host").expect("compose host");
    augmenter
        .document_mut()
        .insert_html(&host, &compose_window(id));
    augmenter.pump();
    query(augmenter, &format!("#{id}")).expect("compose window")
}

fn tick(augmenter: &mut TestAugmenter, seconds: u64) {
    for _ in 0..seconds {
        augmenter.ticks_mut().fire_all();
        augmenter.pump();
    }
}

fn widget_removals(augmenter: &mut TestAugmenter) -> usize {
    augmenter
        .document_mut()
        .drain_patches()
        .into_iter()
        .filter(|patch| {
            matches!(patch, DomPatch::RemoveChild { child, .. } if child == "div.compose-timer")
        })
        .count()
}

#[test]
fn compose_session_counts_taunts_and_stops_on_send() {
    let mut augmenter = augmenter(INBOX);
    assert!(augmenter.is_trigger_bound());
    assert!(!augmenter.is_watching());

    click(&mut augmenter, r#"[gh="cm"]"#);
    assert!(augmenter.is_watching());

    let draft = open_compose(&mut augmenter, "draft");
    assert_eq!(augmenter.live_widgets(), 1);
    assert_eq!(
        query(&augmenter, ".compose-timer__clock").map(|n| n.text_contents()),
        Some("0:00".into())
    );

    tick(&mut augmenter, 179);
    let snapshot = augmenter.snapshot_for(&draft).expect("widget");
    assert_eq!(snapshot.display, "2:59");
    assert_eq!(snapshot.notification, None);
    assert!(query(&augmenter, ".compose-timer__taunt").is_none());

    tick(&mut augmenter, 1);
    let snapshot = augmenter.snapshot_for(&draft).expect("widget");
    assert_eq!(snapshot.display, "3:00");
    let first_taunt = AugmentConfig::default().taunts[0].clone();
    assert_eq!(snapshot.notification.as_deref(), Some(first_taunt.as_str()));
    let taunt = query(&augmenter, ".compose-timer__taunt").expect("taunt shown");
    assert_eq!(taunt.text_contents(), first_taunt);

    tick(&mut augmenter, 20);
    widget_removals(&mut augmenter);
    click(&mut augmenter, r#"#draft [data-tooltip*="Send"]"#);

    assert_eq!(augmenter.live_widgets(), 0);
    assert!(query(&augmenter, ".compose-timer").is_none());
    assert_eq!(widget_removals(&mut augmenter), 1);
    assert_eq!(augmenter.ticks().active_count(), 0);
    // Only the compose trigger keeps a listener.
    assert_eq!(augmenter.document().listener_count(), 1);

    let finished = augmenter.finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].elapsed_seconds, 200);
    assert_eq!(finished[0].phase, WidgetPhase::Stopped);
    assert_eq!(
        finished[0].stop_reason,
        Some(StopReason::Control(TerminalControl::Completion))
    );

    tick(&mut augmenter, 5);
    assert_eq!(augmenter.finished()[0].elapsed_seconds, 200);
}

#[test]
fn concurrent_windows_tick_independently() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);
    let first = open_compose(&mut augmenter, "first");
    tick(&mut augmenter, 10);

    click(&mut augmenter, r#"[gh="cm"]"#);
    let second = open_compose(&mut augmenter, "second");
    tick(&mut augmenter, 5);

    assert_eq!(augmenter.snapshot_for(&first).unwrap().elapsed_seconds, 15);
    assert_eq!(augmenter.snapshot_for(&second).unwrap().elapsed_seconds, 5);
    assert_eq!(augmenter.ticks().active_count(), 2);

    click(&mut augmenter, r#"#first [aria-label="Discard draft"]"#);
    tick(&mut augmenter, 3);

    assert!(augmenter.snapshot_for(&first).is_none());
    assert_eq!(augmenter.finished()[0].elapsed_seconds, 15);
    let second_snapshot = augmenter.snapshot_for(&second).unwrap();
    assert_eq!(second_snapshot.elapsed_seconds, 8);
    assert_eq!(second_snapshot.phase, WidgetPhase::Running);
    assert_eq!(augmenter.ticks().active_count(), 1);

    let clocks = augmenter
        .document()
        .query_all(".compose-timer__clock")
        .unwrap();
    assert_eq!(clocks.len(), 1);
    assert_eq!(clocks[0].text_contents(), "0:08");
}

#[test]
fn window_without_anchor_gets_fallback_widget() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);

    let host = query(&augmenter, "#compose-host").unwrap();
    augmenter.document_mut().insert_html(
        &host,
        r#"<div role="dialog" id="bare"><div role="button" data-tooltip="Send">Send</div></div>"#,
    );
    augmenter.pump();

    let bare = query(&augmenter, "#bare").unwrap();
    let widget = query(&augmenter, ".compose-timer").expect("fallback widget");
    assert_eq!(augmenter.document().parent_of(&widget), Some(bare.clone()));
    // Only the completion control exists on this surface.
    assert_eq!(augmenter.document().listener_count(), 2);

    tick(&mut augmenter, 3);
    click(&mut augmenter, r#"#bare [role="button"]"#);
    assert!(query(&augmenter, ".compose-timer").is_none());
    assert_eq!(augmenter.finished()[0].elapsed_seconds, 3);
}

#[test]
fn marked_surfaces_never_get_a_second_widget() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);
    let draft = open_compose(&mut augmenter, "draft");

    // Unrelated churn, extra trigger activations, and mutations inside the surface.
    for round in 0..5 {
        let host = query(&augmenter, "#compose-host").unwrap();
        augmenter
            .document_mut()
            .insert_html(&host, &format!("<p>noise {round}</p>"));
        let body = query(&augmenter, "#draft .body").unwrap();
        augmenter
            .document_mut()
            .insert_html(&body, "<span>typing</span>");
        click(&mut augmenter, r#"[gh="cm"]"#);
        tick(&mut augmenter, 1);
    }

    assert_eq!(augmenter.snapshots().len(), 1);
    assert_eq!(augmenter.document().query_all(".compose-timer").unwrap().len(), 1);
    assert!(augmenter.document().get_marker(&draft));
    assert_eq!(augmenter.ticks().started_count(), 1);
    // Root observer disconnected; the tracker keeps exactly one watch.
    assert_eq!(augmenter.document().observer_count(), 1);
}

#[test]
fn premarked_surface_is_left_alone() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);

    let host = query(&augmenter, "#compose-host").unwrap();
    augmenter.document_mut().insert_html(
        &host,
        r#"<div role="dialog" data-compose-timer-attached="true">
            <div role="button" data-tooltip="Send">Send</div>
        </div>"#,
    );
    augmenter.pump();

    assert_eq!(augmenter.live_widgets(), 0);
    assert!(query(&augmenter, ".compose-timer").is_none());
}

#[test]
fn dialogs_without_completion_control_are_ignored() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);

    let host = query(&augmenter, "#compose-host").unwrap();
    augmenter.document_mut().insert_html(
        &host,
        r#"<div role="dialog" id="settings"><div role="button" aria-label="Close">x</div></div>"#,
    );
    augmenter.pump();

    let settings = query(&augmenter, "#settings").unwrap();
    assert_eq!(augmenter.live_widgets(), 0);
    assert!(!augmenter.document().get_marker(&settings));
}

#[test]
fn nothing_attaches_before_the_trigger_is_activated() {
    let mut augmenter = augmenter(INBOX);
    open_compose(&mut augmenter, "draft");
    assert_eq!(augmenter.live_widgets(), 0);

    // The first activation picks up the window that is already open.
    click(&mut augmenter, r#"[gh="cm"]"#);
    assert_eq!(augmenter.live_widgets(), 1);
}

#[test]
fn trigger_that_appears_later_is_bound() {
    let mut augmenter = augmenter(INBOX_WITHOUT_TRIGGER);
    assert!(!augmenter.is_trigger_bound());
    assert_eq!(augmenter.document().observer_count(), 1);

    tick(&mut augmenter, 3);
    assert!(!augmenter.is_trigger_bound());

    let nav = query(&augmenter, "#nav").unwrap();
    augmenter
        .document_mut()
        .insert_html(&nav, r#"<div role="button" gh="cm">Compose</div>"#);
    augmenter.pump();

    assert!(augmenter.is_trigger_bound());
    assert_eq!(augmenter.document().observer_count(), 0);

    click(&mut augmenter, r#"[gh="cm"]"#);
    open_compose(&mut augmenter, "draft");
    assert_eq!(augmenter.live_widgets(), 1);
}

#[test]
fn removed_surface_stops_its_widget() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);
    let draft = open_compose(&mut augmenter, "draft");
    tick(&mut augmenter, 42);

    augmenter.document_mut().remove(&draft);
    augmenter.pump();

    assert_eq!(augmenter.live_widgets(), 0);
    assert_eq!(augmenter.ticks().active_count(), 0);
    assert_eq!(augmenter.document().listener_count(), 1);
    let finished = &augmenter.finished()[0];
    assert_eq!(finished.elapsed_seconds, 42);
    assert_eq!(finished.stop_reason, Some(StopReason::SurfaceRemoved));
}

#[test]
fn double_activation_tears_down_once() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);
    let draft = open_compose(&mut augmenter, "draft");
    tick(&mut augmenter, 7);
    widget_removals(&mut augmenter);

    let send = augmenter
        .document()
        .locate_control(&draft, TerminalControl::Completion)
        .unwrap();
    let close = augmenter
        .document()
        .locate_control(&draft, TerminalControl::Close)
        .unwrap();
    augmenter.document_mut().click(&send);
    augmenter.document_mut().click(&close);
    // The host then dismisses the window itself.
    augmenter.document_mut().remove(&draft);
    augmenter.pump();

    assert_eq!(widget_removals(&mut augmenter), 1);
    assert_eq!(augmenter.ticks().cancelled_count(), 1);
    assert_eq!(augmenter.document().listener_count(), 1);
    assert_eq!(augmenter.finished().len(), 1);
    assert_eq!(
        augmenter.finished()[0].stop_reason,
        Some(StopReason::Control(TerminalControl::Completion))
    );
}

#[test]
fn stop_all_releases_everything() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);
    open_compose(&mut augmenter, "a");
    click(&mut augmenter, r#"[gh="cm"]"#);
    open_compose(&mut augmenter, "b");

    assert_eq!(augmenter.stop_all(), 2);
    assert_eq!(augmenter.stop_all(), 0);
    assert_eq!(augmenter.live_widgets(), 0);
    assert_eq!(augmenter.ticks().active_count(), 0);
    assert_eq!(augmenter.document().listener_count(), 1);
    assert!(augmenter
        .finished()
        .iter()
        .all(|snapshot| snapshot.stop_reason == Some(StopReason::External)));
}

#[test]
fn hour_long_session_keeps_patch_log_bounded() {
    let mut augmenter = augmenter(INBOX);
    click(&mut augmenter, r#"[gh="cm"]"#);
    let draft = open_compose(&mut augmenter, "draft");

    tick(&mut augmenter, 3_600);

    let limit = AugmentConfig::default().patch_log_limit;
    assert_eq!(augmenter.snapshot_for(&draft).unwrap().display, "60:00");
    assert!(augmenter.document().patches().len() <= limit);
}
