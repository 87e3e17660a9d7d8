use super::*;
use crate::animator::AnimatorId;
use crate::layout::LayoutMode;
use crate::manifest::DocumentEntry;
use crate::narration::NarrationState;
use crate::runtime::ReaderRuntime;
use crate::test_support::{FakeSource, RecordingAnimatorFactory, ScriptedSpeech, SpeechCall};
use crate::text_cache::slice_from_char;
use crate::speech::UtteranceId;
use std::rc::Rc;
use std::time::Duration;

const PAGE_THREE: &str = "It was the best of times, it was the worst of times.";

struct Harness {
    runtime: ReaderRuntime,
    source: FakeSource,
    speech: ScriptedSpeech,
    animators: RecordingAnimatorFactory,
}

fn harness_with(source: FakeSource, speech: Option<ScriptedSpeech>, viewport: Viewport) -> Harness {
    let animators = RecordingAnimatorFactory::new();
    let engine = speech
        .clone()
        .map(|speech| Box::new(speech) as Box<dyn SpeechEngine>);
    let runtime = ReaderRuntime::new(
        ReaderConfig::default(),
        viewport,
        Rc::new(source.clone()),
        Box::new(animators.clone()),
        engine,
    );
    Harness {
        runtime,
        source,
        speech: speech.unwrap_or_else(ScriptedSpeech::new),
        animators,
    }
}

fn harness(source: FakeSource) -> Harness {
    harness_with(source, Some(ScriptedSpeech::new()), Viewport::new(500, 900))
}

fn book(pages: usize) -> FakeSource {
    FakeSource::new().with_document("book", pages)
}

async fn open(h: &mut Harness, handle: &str) {
    h.runtime
        .open(Document::new(handle, "", ""))
        .await
        .expect("document opens");
}

fn statuses(h: &Harness) -> Vec<PageStatus> {
    h.runtime.session().snapshot().pages
}

#[tokio::test(start_paused = true)]
async fn open_previews_leading_pages_then_upgrades_everything() {
    let mut h = harness(book(10));
    open(&mut h, "book").await;
    assert_eq!(h.runtime.session().current_page(), 1);
    assert_eq!(h.runtime.session().page_count(), 10);
    assert_eq!(
        h.runtime.session().document().map(|d| d.title.as_str()),
        Some("Title of book")
    );
    assert_eq!(h.animators.created(), 1);

    h.runtime.run_until_idle().await;

    let log = h.source.rasterize_log("book");
    assert_eq!(log[..3].to_vec(), vec![(1, 0.5), (2, 0.5), (3, 0.5)]);
    let mut upgrades: Vec<(usize, f32)> = log[3..6].to_vec();
    upgrades.sort_by_key(|(page, _)| *page);
    assert_eq!(upgrades, vec![(1, 1.5), (2, 1.5), (3, 1.5)]);
    assert_eq!(h.source.total_rasterize_calls(), 16);
    assert!(
        statuses(&h)
            .iter()
            .all(|status| *status == PageStatus::Ready { quality: Quality::High })
    );
}

#[tokio::test(start_paused = true)]
async fn preload_previews_are_shown_as_each_one_lands() {
    let mut h = harness(book(5).with_delay(Duration::from_millis(100)));
    open(&mut h, "book").await;

    // Page 1 lands at 100ms, page 2 not before 200ms.
    let idle = tokio::time::timeout(Duration::from_millis(150), h.runtime.run_until_idle()).await;
    assert!(idle.is_err(), "preload still running");
    assert_eq!(h.source.rasterize_calls("book", 1), 1);
    let renders = h.runtime.session().renders().expect("open");
    assert_eq!(renders.artifact(1).map(|a| a.quality), Some(Quality::Preview));
    assert!(renders.artifact(2).is_none());
    assert!(h.animators.surface_updates().iter().any(|surface| {
        surface.page == 1 && matches!(surface.content, SurfaceContent::Image(_))
    }));

    h.runtime.run_until_idle().await;
    assert!(
        statuses(&h)
            .iter()
            .all(|status| *status == PageStatus::Ready { quality: Quality::High })
    );
}

#[tokio::test(start_paused = true)]
async fn neighborhood_is_requested_before_background_work() {
    let mut h = harness(book(10));
    open(&mut h, "book").await;
    h.runtime.go_to_page(7);
    h.runtime.run_until_idle().await;

    assert_eq!(h.runtime.session().current_page(), 7);
    let log = h.source.rasterize_log("book");
    let first_high = log
        .iter()
        .position(|(_, scale)| *scale == 2.5)
        .expect("background pass ran");
    for page in [6, 7, 8] {
        let standard = log
            .iter()
            .position(|entry| *entry == (page, 1.5))
            .expect("neighborhood rendered at standard");
        assert!(standard < first_high, "page {page} waited for background");
    }
}

#[tokio::test(start_paused = true)]
async fn navigation_is_a_no_op_at_the_boundaries() {
    let mut h = harness(book(10));
    open(&mut h, "book").await;
    h.runtime.run_until_idle().await;

    h.runtime.go_to_page(10);
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 10);
    h.runtime.next();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 10);

    h.runtime.go_to_page(1);
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 1);
    h.runtime.previous();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 1);

    // Out-of-range targets are clamped.
    h.runtime.go_to_page(42);
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 10);
}

#[tokio::test(start_paused = true)]
async fn current_page_follows_the_animator_not_the_command() {
    let mut h = harness(book(5));
    open(&mut h, "book").await;
    h.runtime.go_to_page(4);
    assert_eq!(
        h.runtime.session().current_page(),
        1,
        "unchanged until the animator reports"
    );
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 4);
}

#[tokio::test(start_paused = true)]
async fn repeated_render_requests_fetch_once() {
    let mut h = harness(book(6));
    open(&mut h, "book").await;

    assert!(matches!(
        h.runtime.render(5, Quality::Standard),
        RenderRequest::Issued(_)
    ));
    assert_eq!(h.runtime.render(5, Quality::Standard), RenderRequest::Pending);
    assert_eq!(h.runtime.render(5, Quality::Preview), RenderRequest::Pending);
    h.runtime.run_until_idle().await;

    let standard_fetches = h
        .source
        .rasterize_log("book")
        .into_iter()
        .filter(|entry| *entry == (5, 1.5))
        .count();
    assert_eq!(standard_fetches, 1);

    let before = h.source.rasterize_calls("book", 5);
    assert!(matches!(
        h.runtime.render(5, Quality::Standard),
        RenderRequest::Resident(_)
    ));
    assert_eq!(h.source.rasterize_calls("book", 5), before);
}

#[tokio::test(start_paused = true)]
async fn failed_page_is_isolated_and_retryable() {
    let source = book(5).with_failing_page("book", 2);
    let mut h = harness(source);
    open(&mut h, "book").await;
    h.runtime.run_until_idle().await;

    let notices = h.runtime.take_notices();
    let failures: Vec<&Notice> = notices
        .iter()
        .filter(|notice| matches!(notice, Notice::PageRenderFailed { page: 2, .. }))
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(h.source.rasterize_calls("book", 2), 1, "no automatic retry");

    let pages = statuses(&h);
    assert!(matches!(pages[1], PageStatus::Failed { .. }));
    for (index, status) in pages.iter().enumerate().filter(|(i, _)| *i != 1) {
        assert_eq!(
            *status,
            PageStatus::Ready { quality: Quality::High },
            "page {}",
            index + 1
        );
    }
    assert!(h.animators.surface_updates().iter().any(|surface| {
        surface.page == 2 && matches!(surface.content, SurfaceContent::Failed { .. })
    }));

    h.source.heal_page("book", 2);
    h.runtime.retry_page(2);
    h.runtime.run_until_idle().await;
    assert_eq!(
        statuses(&h)[1],
        PageStatus::Ready {
            quality: Quality::Standard
        }
    );
}

#[tokio::test(start_paused = true)]
async fn unavailable_source_leaves_session_closed() {
    let mut h = harness(book(3));
    let err = h
        .runtime
        .open(Document::new("missing", "", ""))
        .await
        .expect_err("unknown handle");
    assert!(matches!(err, ReaderError::SourceUnavailable(_)));
    assert!(!h.runtime.session().is_open());
    assert_eq!(h.animators.created(), 0);
    assert_eq!(h.runtime.pending_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_document_is_unavailable() {
    let mut h = harness(FakeSource::new().with_document("empty", 0));
    let err = h
        .runtime
        .open(Document::new("empty", "", ""))
        .await
        .expect_err("no pages");
    assert!(matches!(err, ReaderError::SourceUnavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn close_and_reopen_discards_stale_results() {
    let source = FakeSource::new()
        .with_document("a", 5)
        .with_document("b", 3)
        .with_text("a", 1, "Old document text.")
        .with_delay(Duration::from_millis(100));
    let mut h = harness(source);
    open(&mut h, "a").await;

    // Let the first preview land so the preload is mid-flight.
    h.runtime.step().await;
    assert!(h.runtime.session().renders().expect("open").artifact(1).is_some());
    h.runtime.read_current_page();

    open(&mut h, "b").await;
    assert_eq!(h.runtime.session().generation(), 2);
    h.runtime.run_until_idle().await;

    assert_eq!(h.runtime.session().page_count(), 3);
    let renders = h.runtime.session().renders().expect("open");
    for page in 1..=3 {
        let artifact = renders.artifact(page).expect("rendered");
        assert!(artifact.image.starts_with(b"b#"), "page {page} leaked from a");
    }
    assert!(renders.artifact(4).is_none());
    assert_eq!(h.source.rasterize_calls("a", 3), 0, "cancelled before fetching");
    assert_eq!(h.source.extract_calls("a", 1), 0, "cancelled before extracting");
    assert!(h.runtime.session().texts().expect("open").get(1).is_none());
    assert!(h.speech.spoken().is_empty());
    assert_eq!(h.animators.live(), 1);
    assert_eq!(h.animators.max_live(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_cancels_narration_and_drops_everything() {
    let source = book(3).with_text("book", 1, "Some words here.");
    let mut h = harness(source);
    open(&mut h, "book").await;
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    let utterance = h.speech.last_utterance().expect("speaking");

    h.runtime.close();
    assert!(h.speech.calls().contains(&SpeechCall::Cancel(utterance)));
    assert!(!h.runtime.session().is_open());
    assert_eq!(h.animators.live(), 0);
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Idle);

    // Events from the cancelled utterance change nothing.
    h.speech.sink(utterance).ended();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Idle);
    assert_eq!(h.speech.spoken().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn narration_position_does_not_survive_reopen() {
    let source = FakeSource::new()
        .with_document("long", 9)
        .with_document("short", 2)
        .with_text("long", 7, "Seventh page.");
    let mut h = harness(source);
    open(&mut h, "long").await;
    h.runtime.start_narration(7, 0);
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().narration().page(), 7);

    open(&mut h, "short").await;
    h.runtime.run_until_idle().await;
    let snapshot = h.runtime.session().snapshot();
    assert_eq!(snapshot.page_count, 2);
    assert_eq!(snapshot.narration.page, 1);
    assert_eq!(snapshot.narration.offset, 0);
    assert_eq!(snapshot.narration.state, NarrationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn missing_engine_is_reported_once_per_document() {
    let source = FakeSource::new()
        .with_document("a", 2)
        .with_document("b", 2);
    let mut h = harness_with(source, None, Viewport::new(500, 900));
    for handle in ["a", "b"] {
        open(&mut h, handle).await;
        h.runtime.read_current_page();
        h.runtime.read_current_page();
    }
    h.runtime.run_until_idle().await;
    let unsupported = h
        .runtime
        .take_notices()
        .into_iter()
        .filter(|notice| *notice == Notice::SpeechUnsupported)
        .count();
    assert_eq!(unsupported, 2);
}

#[tokio::test(start_paused = true)]
async fn catalogue_entry_opens_with_its_metadata() {
    let mut h = harness(book(4));
    let entry = DocumentEntry {
        title: "Atlas".to_string(),
        author: "A. Cartographer".to_string(),
        handle: "book".to_string(),
    };
    h.runtime.open_entry(&entry).await.expect("entry opens");
    let document = h.runtime.session().document().expect("open");
    assert_eq!(document.title, "Atlas");
    assert_eq!(document.author, "A. Cartographer");
    assert_eq!(document.page_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn pause_and_restart_resume_speak_only_the_remainder() {
    let source = book(10).with_text("book", 3, PAGE_THREE);
    let mut h = harness_with(
        source,
        Some(ScriptedSpeech::without_resume()),
        Viewport::new(500, 900),
    );
    open(&mut h, "book").await;
    h.runtime.start_narration(3, 0);
    h.runtime.run_until_idle().await;
    assert_eq!(h.speech.spoken(), vec![PAGE_THREE.to_string()]);

    let sink = h.speech.current();
    for index in [0, 5, 12] {
        sink.boundary(index);
    }
    h.runtime.run_until_idle().await;
    h.runtime.pause_narration();
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Paused);
    assert_eq!(h.runtime.session().narration().offset(), 12);

    h.runtime.resume_narration();
    let spoken = h.speech.spoken();
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[1], slice_from_char(PAGE_THREE, 12));
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Speaking);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_in_place_keeps_the_utterance() {
    let source = book(10).with_text("book", 3, PAGE_THREE);
    let mut h = harness(source);
    open(&mut h, "book").await;
    h.runtime.start_narration(3, 0);
    h.runtime.run_until_idle().await;
    let utterance = h.speech.last_utterance().expect("speaking");
    h.speech.current().boundary(12);
    h.runtime.run_until_idle().await;

    h.runtime.pause_narration();
    h.runtime.resume_narration();
    let calls = h.speech.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[SpeechCall::Pause(utterance), SpeechCall::Resume(utterance)]
    );
    assert_eq!(h.speech.spoken().len(), 1);
    assert_eq!(h.runtime.session().narration().offset(), 12);
}

#[tokio::test(start_paused = true)]
async fn stop_resets_from_speaking_and_paused() {
    let source = book(4).with_text("book", 1, PAGE_THREE);
    for pause_first in [false, true] {
        let mut h = harness(source.clone());
        open(&mut h, "book").await;
        h.runtime.read_current_page();
        h.runtime.run_until_idle().await;
        h.speech.current().boundary(7);
        h.runtime.run_until_idle().await;
        if pause_first {
            h.runtime.pause_narration();
        }

        h.runtime.stop_narration();
        let narration = h.runtime.session().narration();
        assert_eq!(narration.state(), NarrationState::Idle);
        assert_eq!(narration.offset(), 0);
        assert!(matches!(h.speech.calls().last(), Some(SpeechCall::Cancel(_))));
    }
}

#[tokio::test(start_paused = true)]
async fn narration_turns_the_page_and_continues() {
    let source = book(2)
        .with_text("book", 1, "First page.")
        .with_text("book", 2, "Second page.");
    let mut h = harness(source);
    open(&mut h, "book").await;
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    assert_eq!(h.source.extract_calls("book", 2), 1, "next page prefetched");

    h.speech.current().ended();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 2);
    assert_eq!(
        h.speech.spoken(),
        vec!["First page.".to_string(), "Second page.".to_string()]
    );
    assert_eq!(h.source.extract_calls("book", 2), 1, "text extracted once");

    // Last page: finishing goes idle.
    h.speech.current().ended();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Idle);
    assert_eq!(h.runtime.session().current_page(), 2);
}

/// Finish page 1 of a two-page narration and process only the end event, so
/// the session sits inside the settle delay before page 2 starts.
async fn end_first_page_and_enter_settle_delay(h: &mut Harness) {
    open(h, "book").await;
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    h.speech.current().ended();
    h.runtime.step().await;
    assert!(h.runtime.session().narration().is_between_pages());
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Speaking);
}

fn two_page_book() -> FakeSource {
    book(3)
        .with_text("book", 1, "First page.")
        .with_text("book", 2, "Second page.")
}

#[tokio::test(start_paused = true)]
async fn pause_during_settle_delay_stops_auto_continue() {
    let mut h = harness(two_page_book());
    end_first_page_and_enter_settle_delay(&mut h).await;

    h.runtime.pause_narration();
    h.runtime.run_until_idle().await;
    let narration = h.runtime.session().narration();
    assert_eq!(narration.state(), NarrationState::Paused);
    assert_eq!((narration.page(), narration.offset()), (2, 0));
    assert_eq!(h.runtime.session().current_page(), 2);
    assert_eq!(h.speech.spoken(), vec!["First page.".to_string()]);

    h.runtime.resume_narration();
    assert_eq!(
        h.speech.spoken(),
        vec!["First page.".to_string(), "Second page.".to_string()]
    );
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Speaking);
}

#[tokio::test(start_paused = true)]
async fn stop_during_settle_delay_stops_auto_continue() {
    let mut h = harness(two_page_book());
    end_first_page_and_enter_settle_delay(&mut h).await;

    h.runtime.stop_narration();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Idle);
    assert_eq!(h.runtime.session().current_page(), 2);
    assert_eq!(h.speech.spoken(), vec!["First page.".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn manual_flip_retargets_active_narration() {
    let source = book(4)
        .with_text("book", 1, "First page.")
        .with_text("book", 2, "Second page.");
    let mut h = harness(source);
    open(&mut h, "book").await;
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    let first = h.speech.last_utterance().expect("speaking");

    h.runtime.next();
    h.runtime.run_until_idle().await;
    assert!(h.speech.calls().contains(&SpeechCall::Cancel(first)));
    assert_eq!(h.speech.spoken().last().map(String::as_str), Some("Second page."));
    assert_eq!(h.runtime.session().narration().page(), 2);

    // The superseded utterance ending must not turn the page.
    h.speech.sink(first).ended();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 2);
}

#[tokio::test(start_paused = true)]
async fn page_without_text_reports_nothing_to_read() {
    let mut h = harness(book(2));
    open(&mut h, "book").await;
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    assert!(
        h.runtime
            .take_notices()
            .contains(&Notice::NothingToRead { page: 1 })
    );
    assert!(h.speech.spoken().is_empty());
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn missing_engine_is_reported_once() {
    let source = book(2).with_text("book", 1, "Words.");
    let mut h = harness_with(source, None, Viewport::new(500, 900));
    open(&mut h, "book").await;
    h.runtime.read_current_page();
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    let unsupported = h
        .runtime
        .take_notices()
        .into_iter()
        .filter(|notice| *notice == Notice::SpeechUnsupported)
        .count();
    assert_eq!(unsupported, 1);
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn rejected_speak_request_returns_to_idle() {
    let source = book(2).with_text("book", 1, "Words.");
    let mut h = harness(source);
    open(&mut h, "book").await;
    h.speech.reject_next();
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    assert!(
        h.runtime
            .take_notices()
            .iter()
            .any(|notice| matches!(notice, Notice::SpeechFailed { .. }))
    );
    assert_eq!(h.runtime.session().narration().state(), NarrationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn speech_option_change_restarts_from_offset() {
    let source = book(2).with_text("book", 1, PAGE_THREE);
    let mut h = harness(source);
    open(&mut h, "book").await;
    h.runtime.read_current_page();
    h.runtime.run_until_idle().await;
    h.speech.current().boundary(11);
    h.runtime.run_until_idle().await;

    h.runtime.set_speech_options(Some("en-GB".to_string()), 50.0, 1.2);
    let calls = h.speech.calls();
    match calls.last() {
        Some(SpeechCall::Speak { text, options, .. }) => {
            assert_eq!(text, slice_from_char(PAGE_THREE, 11));
            assert_eq!(options.voice.as_deref(), Some("en-GB"));
            assert!((options.rate - 10.0).abs() < f32::EPSILON, "rate clamped");
        }
        other => panic!("expected a new speak request, got {other:?}"),
    }
    assert!(calls.contains(&SpeechCall::Cancel(UtteranceId(1))));
}

#[tokio::test(start_paused = true)]
async fn crossing_the_breakpoint_recreates_the_animator_once() {
    let mut h = harness_with(book(10), None, Viewport::new(1024, 800));
    open(&mut h, "book").await;
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().layout().layout().mode, LayoutMode::Double);
    assert_eq!(h.animators.created(), 1);

    for width in [1000, 900, 800, 700, 600, 500] {
        h.runtime.viewport_changed(Viewport::new(width, 800));
    }
    h.runtime.run_until_idle().await;

    assert_eq!(h.animators.created(), 2);
    assert_eq!(h.animators.max_live(), 1);
    assert_eq!(h.runtime.session().layout().recreations(), 1);
    let spec = h.animators.specs().pop().expect("recreated");
    assert_eq!(spec.mode, LayoutMode::Single);
    assert_eq!((spec.width, spec.height), (468, 660));
    assert_eq!(spec.pages.len(), 10);
    assert!(
        spec.pages
            .iter()
            .all(|surface| matches!(surface.content, SurfaceContent::Image(_))),
        "recreated animator starts with resident artifacts"
    );

    // The destroyed animator's id is no longer accepted.
    let _ = h.runtime.sender().send(Message::PageChanged {
        animator: AnimatorId(1),
        index: 5,
    });
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 1);
}

#[tokio::test(start_paused = true)]
async fn recreated_animator_keeps_current_page() {
    let mut h = harness_with(book(10), None, Viewport::new(500, 800));
    open(&mut h, "book").await;
    h.runtime.go_to_page(6);
    h.runtime.run_until_idle().await;

    h.runtime.viewport_changed(Viewport::new(1280, 800));
    h.runtime.run_until_idle().await;
    let spec = h.animators.specs().pop().expect("recreated");
    assert_eq!(spec.mode, LayoutMode::Double);
    assert_eq!(spec.start_index, 5);

    h.runtime.next();
    h.runtime.run_until_idle().await;
    assert_eq!(h.runtime.session().current_page(), 7);
}

#[tokio::test(start_paused = true)]
async fn snapshot_reflects_session_and_serializes() {
    let mut h = harness(book(3));
    open(&mut h, "book").await;
    h.runtime.run_until_idle().await;

    let snapshot = h.runtime.session().snapshot();
    assert_eq!(snapshot.current_page, 1);
    assert_eq!(snapshot.page_count, 3);
    assert_eq!(snapshot.layout.mode, LayoutMode::Single);
    assert_eq!(snapshot.narration.state, NarrationState::Idle);

    let json = serde_json::to_value(&snapshot).expect("serializes");
    assert_eq!(json["document"]["handle"], "book");
    assert_eq!(json["layout"]["mode"], "single");
    assert_eq!(json["pages"][0]["state"], "ready");
    assert_eq!(json["pages"][0]["quality"], "high");
}
