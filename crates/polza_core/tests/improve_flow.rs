use polza_core::db::open_db_in_memory;
use polza_core::editor::surface::{Pos, Transaction};
use polza_core::improve::{Key, KeyPress};
use polza_core::{
    trigger_channel, DocumentStore, EditingSurface, EditorSession, ImproveOrchestrator,
    ImproveOutcome, ImproveState, ImproveTarget, MemorySurface, Notifier, RewriteError, Rewriter,
    Selection, SqliteKeyValueStore, ANCHOR_TOKEN,
};
use std::cell::{Cell, RefCell};
use tokio::sync::Notify;

/// Returns a fixed reply and records every request.
struct ScriptedRewriter {
    reply: String,
    seen: RefCell<Vec<(String, String, String)>>,
}

impl ScriptedRewriter {
    fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl Rewriter for ScriptedRewriter {
    async fn improve(&self, text: &str, model: &str, api_key: &str) -> Result<String, RewriteError> {
        self.seen
            .borrow_mut()
            .push((text.to_string(), model.to_string(), api_key.to_string()));
        Ok(self.reply.clone())
    }
}

struct FailingRewriter;

impl Rewriter for FailingRewriter {
    async fn improve(&self, _: &str, _: &str, _: &str) -> Result<String, RewriteError> {
        Err(RewriteError::Api {
            status: 503,
            message: "Model overloaded".to_string(),
        })
    }
}

/// Holds every call until released.
#[derive(Default)]
struct GatedRewriter {
    calls: Cell<usize>,
    started: Notify,
    release: Notify,
}

impl Rewriter for GatedRewriter {
    async fn improve(&self, text: &str, _: &str, _: &str) -> Result<String, RewriteError> {
        self.calls.set(self.calls.get() + 1);
        self.started.notify_one();
        self.release.notified().await;
        Ok(format!("{text}!"))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

fn surface(markup: &str) -> RefCell<MemorySurface> {
    RefCell::new(MemorySurface::from_markup(markup))
}

#[tokio::test]
async fn selection_takes_priority_over_anchor() {
    let markup = format!("<p>one two three</p><p>{ANCHOR_TOKEN}tail</p>");
    let surface = surface(&markup);
    surface.borrow_mut().set_selection(Selection::range(4, 7));
    let rewriter = ScriptedRewriter::replying("TWO");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "test/model", "sk-test");

    let outcome = orchestrator.improve(&surface).await.unwrap();

    assert_eq!(
        outcome,
        ImproveOutcome::Applied(ImproveTarget::Selection { from: 4, to: 7 })
    );
    assert_eq!(
        rewriter.seen.borrow()[0],
        ("two".to_string(), "test/model".to_string(), "sk-test".to_string())
    );
    assert_eq!(
        surface.borrow().markup(),
        format!("<p>one TWO three</p><p>{ANCHOR_TOKEN}tail</p>")
    );
}

#[tokio::test]
async fn anchor_mode_rewrites_the_tail_and_moves_the_anchor() {
    let surface = surface(&format!("<p>before</p><p>{ANCHOR_TOKEN}T</p>"));
    let rewriter = ScriptedRewriter::replying("Better");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");

    let outcome = orchestrator.improve(&surface).await.unwrap();

    assert_eq!(
        outcome,
        ImproveOutcome::Applied(ImproveTarget::Anchor { position: 7 })
    );
    assert_eq!(rewriter.seen.borrow()[0].0, "T");
    let text = surface.borrow().document().plain_text();
    assert!(text.starts_with("before\n"));
    assert!(text.ends_with(&format!("Better\n\n{ANCHOR_TOKEN}")));
    assert_eq!(text.matches(ANCHOR_TOKEN).count(), 1);
}

#[tokio::test]
async fn anchor_mode_can_repeat_from_the_new_end() {
    let surface = surface(&format!("<p>{ANCHOR_TOKEN}draft</p>"));
    let rewriter = ScriptedRewriter::replying("Draft.");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");
    orchestrator.improve(&surface).await.unwrap();

    let size = surface.borrow().document().size();
    surface
        .borrow_mut()
        .apply(Transaction::new().insert_text(Pos::At(size), "more"));
    orchestrator.improve(&surface).await.unwrap();

    let seen = rewriter.seen.borrow();
    assert_eq!(seen[0].0, "draft");
    assert_eq!(seen[1].0, "more");
}

#[tokio::test]
async fn whole_document_mode_without_selection_or_anchor() {
    let surface = surface("<p>first</p><p>second</p>");
    let rewriter = ScriptedRewriter::replying("Rewritten");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");

    let outcome = orchestrator.improve(&surface).await.unwrap();

    assert_eq!(outcome, ImproveOutcome::Applied(ImproveTarget::Whole));
    assert_eq!(rewriter.seen.borrow()[0].0, "first\nsecond");
    assert_eq!(surface.borrow().markup(), "<p>Rewritten</p>");
}

#[tokio::test]
async fn whole_document_mode_does_not_inherit_a_leading_heading() {
    let surface = surface("<h1>Title</h1><p>body</p>");
    let rewriter = ScriptedRewriter::replying("Rewritten");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");

    orchestrator.improve(&surface).await.unwrap();

    assert_eq!(rewriter.seen.borrow()[0].0, "Title\nbody");
    assert_eq!(surface.borrow().markup(), "<p>Rewritten</p>");
}

#[tokio::test]
async fn selection_improve_keeps_formatting_outside_the_range() {
    const FORMATTED: &str = "<p>one <strong>bold</strong> two</p><ul><li><p>item</p></li></ul>";
    let conn = open_db_in_memory().unwrap();
    let mut store = DocumentStore::load(SqliteKeyValueStore::new(&conn));
    let id = store.active_document().id.clone();
    store.update_content(&id, FORMATTED);

    let mut session = EditorSession::open(store, MemorySurface::new());
    session
        .surface()
        .borrow_mut()
        .set_selection(Selection::range(9, 12));
    let rewriter = ScriptedRewriter::replying("TWO");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");
    orchestrator.improve(session.surface()).await.unwrap();
    session.sync();

    assert_eq!(rewriter.seen.borrow()[0].0, "two");
    let expected = "<p>one <strong>bold</strong> TWO</p><ul><li><p>item</p></li></ul>";
    assert_eq!(session.store().active_document().content, expected);
    let reloaded = DocumentStore::load(SqliteKeyValueStore::new(&conn));
    assert_eq!(reloaded.active_document().content, expected);
}

#[tokio::test]
async fn one_undo_reverts_the_improvement() {
    let surface = surface("<p>one two three</p>");
    let rewriter = ScriptedRewriter::replying("a\nb");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");
    orchestrator.improve(&surface).await.unwrap();
    assert_eq!(surface.borrow().markup(), "<p>a</p><p>b</p>");

    assert!(surface.borrow_mut().undo());
    assert_eq!(surface.borrow().markup(), "<p>one two three</p>");
    assert!(!surface.borrow().can_undo());
}

#[tokio::test]
async fn blank_targets_are_skipped_without_a_request() {
    let rewriter = ScriptedRewriter::replying("x");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");

    let blank = surface("<p>   </p><p></p>");
    assert_eq!(
        orchestrator.improve(&blank).await.unwrap(),
        ImproveOutcome::SkippedEmpty
    );
    let nothing_after_anchor = surface(&format!("<p>text{ANCHOR_TOKEN}</p>"));
    assert_eq!(
        orchestrator.improve(&nothing_after_anchor).await.unwrap(),
        ImproveOutcome::SkippedEmpty
    );

    assert_eq!(rewriter.calls(), 0);
    assert_eq!(orchestrator.state(), ImproveState::Idle);
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let rewriter = ScriptedRewriter::replying("x");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "  ");
    let surface = surface("<p>text</p>");

    let err = orchestrator.improve(&surface).await.unwrap_err();

    assert!(matches!(err, RewriteError::Auth));
    assert_eq!(rewriter.calls(), 0);
    assert_eq!(surface.borrow().markup(), "<p>text</p>");
}

#[tokio::test]
async fn failures_notify_and_leave_the_document_untouched() {
    let orchestrator = ImproveOrchestrator::new(FailingRewriter, "m", "k");
    let surface = surface("<p>keep me</p>");
    let notifier = RecordingNotifier::default();
    let (handle, rx) = trigger_channel();
    assert!(handle.action());
    drop(handle);

    orchestrator.run(&surface, rx, &notifier).await;

    assert_eq!(
        notifier.messages.borrow().as_slice(),
        ["Error improving text: Model overloaded".to_string()]
    );
    assert_eq!(orchestrator.state(), ImproveState::Idle);
    assert_eq!(surface.borrow().markup(), "<p>keep me</p>");
    assert!(surface.borrow_mut().take_events().is_empty());
}

#[tokio::test]
async fn missing_api_key_is_reported_through_the_notifier() {
    let rewriter = ScriptedRewriter::replying("x");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "");
    let surface = surface("<p>text</p>");
    let notifier = RecordingNotifier::default();
    let (handle, rx) = trigger_channel();
    handle.signal();
    drop(handle);

    orchestrator.run(&surface, rx, &notifier).await;

    assert_eq!(
        notifier.messages.borrow().as_slice(),
        ["Error improving text: API key is required".to_string()]
    );
    assert_eq!(rewriter.calls(), 0);
}

#[tokio::test]
async fn concurrent_improve_calls_are_rejected_while_pending() {
    let rewriter = GatedRewriter::default();
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");
    let surface = surface("<p>draft</p>");

    let (first, second, ()) = tokio::join!(
        orchestrator.improve(&surface),
        orchestrator.improve(&surface),
        async {
            rewriter.started.notified().await;
            assert_eq!(orchestrator.state(), ImproveState::Pending);
            rewriter.release.notify_one();
        }
    );

    assert_eq!(first.unwrap(), ImproveOutcome::Applied(ImproveTarget::Whole));
    assert_eq!(second.unwrap(), ImproveOutcome::SkippedBusy);
    assert_eq!(rewriter.calls.get(), 1);
    assert_eq!(orchestrator.state(), ImproveState::Idle);
    assert_eq!(surface.borrow().markup(), "<p>draft!</p>");
}

#[tokio::test]
async fn triggers_during_a_pending_call_are_dropped() {
    let rewriter = GatedRewriter::default();
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");
    let surface = surface("<p>draft</p>");
    let notifier = RecordingNotifier::default();
    let (handle, rx) = trigger_channel();
    assert!(handle.action());
    assert!(handle.key_pressed(KeyPress::with_alt(Key::Enter)));
    assert!(handle.signal());
    drop(handle);

    tokio::join!(orchestrator.run(&surface, rx, &notifier), async {
        rewriter.started.notified().await;
        rewriter.release.notify_one();
    });

    assert_eq!(rewriter.calls.get(), 1);
    assert!(notifier.messages.borrow().is_empty());
    assert_eq!(surface.borrow().markup(), "<p>draft!</p>");
    assert_eq!(orchestrator.state(), ImproveState::Idle);
}

#[tokio::test]
async fn a_new_call_is_accepted_after_the_previous_one_finishes() {
    let rewriter = ScriptedRewriter::replying("done");
    let orchestrator = ImproveOrchestrator::new(&rewriter, "m", "k");
    let surface = surface("<p>a</p>");

    orchestrator.improve(&surface).await.unwrap();
    orchestrator.improve(&surface).await.unwrap();

    assert_eq!(rewriter.calls(), 2);
}
