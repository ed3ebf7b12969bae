//! Correlation and routing of control messages

mod common;

use std::path::Path;
use std::sync::Arc;

use common::FakePtyBackend;
use kodegen_claude_director::{
    ActivityState, ControlMessage, CorrelationId, CreateSessionRequest, DropReason, EventRouter,
    RouteOutcome, SessionEvent, SessionRegistry,
};
use serde_json::json;

fn setup() -> (Arc<FakePtyBackend>, Arc<SessionRegistry>, EventRouter) {
    common::init_logging();
    let backend = FakePtyBackend::new();
    let registry = Arc::new(SessionRegistry::new(common::test_options(), backend.clone()));
    let router = EventRouter::new(Arc::clone(&registry));
    (backend, registry, router)
}

fn hook(event: &str, session_id: Option<&str>, cwd: Option<&Path>) -> ControlMessage {
    let mut payload = json!({ "hook_event_name": event });
    if let Some(id) = session_id {
        payload["session_id"] = json!(id);
    }
    if let Some(cwd) = cwd {
        payload["cwd"] = json!(cwd.to_string_lossy());
    }
    ControlMessage::parse(&payload.to_string()).unwrap()
}

#[tokio::test]
async fn first_contact_binds_by_working_directory() {
    let (_backend, registry, router) = setup();
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = registry.create(CreateSessionRequest::new(dir_a.path())).await.unwrap();
    let b = registry.create(CreateSessionRequest::new(dir_b.path())).await.unwrap();

    let outcome = router.route(&hook("SessionStart", Some("abc"), Some(dir_a.path())));

    assert_eq!(
        outcome,
        RouteOutcome::Delivered {
            session_id: a.id(),
            transition: Some((ActivityState::Starting, ActivityState::Idle)),
            correlated: true,
        }
    );
    assert_eq!(a.activity_state(), ActivityState::Idle);
    assert_eq!(a.correlation_id(), Some(CorrelationId::new("abc")));
    assert_eq!(b.activity_state(), ActivityState::Starting);
    assert!(b.correlation_id().is_none());
    assert_eq!(
        registry.find_by_correlation(&CorrelationId::new("abc")).map(|s| s.id()),
        Some(a.id())
    );
}

#[tokio::test]
async fn bound_id_routes_without_cwd() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    router.route(&hook("SessionStart", Some("abc"), Some(dir.path())));
    router.route(&hook("UserPromptSubmit", Some("abc"), None));
    assert_eq!(session.activity_state(), ActivityState::Working);

    let outcome = router.route(&hook("Stop", Some("abc"), None));
    assert_eq!(outcome.session_id(), Some(session.id()));
    assert_eq!(session.activity_state(), ActivityState::WaitingForInput);
}

#[tokio::test]
async fn permission_prompts_are_distinguished() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();
    router.route(&hook("SessionStart", Some("abc"), Some(dir.path())));

    let prompt = ControlMessage::parse(
        &json!({
            "hook_event_name": "Notification",
            "session_id": "abc",
            "notification_type": "permission_prompt",
        })
        .to_string(),
    )
    .unwrap();
    router.route(&prompt);
    assert_eq!(session.activity_state(), ActivityState::WaitingForPermission);
    assert!(session.activity_state().needs_attention());

    router.route(&hook("PostToolUse", Some("abc"), None));
    assert_eq!(session.activity_state(), ActivityState::Working);
    assert!(!session.activity_state().needs_attention());

    router.route(&hook("PermissionRequest", Some("abc"), None));
    assert_eq!(session.activity_state(), ActivityState::WaitingForPermission);
}

#[tokio::test]
async fn shared_directory_is_ambiguous() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let first = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();
    let second = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    let outcome = router.route(&hook("SessionStart", Some("abc"), Some(dir.path())));

    assert_eq!(outcome, RouteOutcome::Dropped(DropReason::Ambiguous(2)));
    for session in [&first, &second] {
        assert_eq!(session.activity_state(), ActivityState::Starting);
        assert!(session.correlation_id().is_none());
    }
    assert!(registry.find_by_correlation(&CorrelationId::new("abc")).is_none());
}

#[tokio::test]
async fn session_end_is_absorbing() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    router.route(&hook("SessionStart", Some("abc"), Some(dir.path())));
    router.route(&hook("Stop", Some("abc"), None));
    assert_eq!(session.activity_state(), ActivityState::WaitingForInput);

    router.route(&hook("SessionEnd", Some("abc"), None));
    assert_eq!(session.activity_state(), ActivityState::Exited);

    let outcome = router.route(&hook("PreToolUse", Some("abc"), None));
    assert_eq!(
        outcome,
        RouteOutcome::Delivered {
            session_id: session.id(),
            transition: None,
            correlated: false,
        }
    );
    assert_eq!(session.activity_state(), ActivityState::Exited);
}

#[tokio::test]
async fn unknown_id_without_cwd_is_dropped() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    let outcome = router.route(&hook("Stop", Some("never-seen"), None));
    assert_eq!(outcome, RouteOutcome::Dropped(DropReason::UnknownCorrelation));
    assert_eq!(session.activity_state(), ActivityState::Starting);
}

#[tokio::test]
async fn message_without_identity_is_dropped() {
    let (_backend, _registry, router) = setup();
    let outcome = router.route(&hook("Stop", None, None));
    assert_eq!(outcome, RouteOutcome::Dropped(DropReason::MissingIdentity));
}

#[tokio::test]
async fn unknown_directory_is_dropped() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    let outcome = router.route(&hook("SessionStart", Some("abc"), Some(elsewhere.path())));
    assert_eq!(outcome, RouteOutcome::Dropped(DropReason::NoCandidate));
}

#[tokio::test]
async fn missing_session_id_transitions_without_binding() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    let outcome = router.route(&hook("SessionStart", None, Some(dir.path())));

    assert_eq!(
        outcome,
        RouteOutcome::Delivered {
            session_id: session.id(),
            transition: Some((ActivityState::Starting, ActivityState::Idle)),
            correlated: false,
        }
    );
    assert!(session.correlation_id().is_none());
}

#[tokio::test]
async fn session_reached_by_cwd_only_can_still_be_correlated() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    router.route(&hook("SessionStart", None, Some(dir.path())));
    assert_eq!(session.activity_state(), ActivityState::Idle);

    let outcome = router.route(&hook("UserPromptSubmit", Some("real-id"), Some(dir.path())));

    assert_eq!(
        outcome,
        RouteOutcome::Delivered {
            session_id: session.id(),
            transition: Some((ActivityState::Idle, ActivityState::Working)),
            correlated: true,
        }
    );
    assert_eq!(session.correlation_id(), Some(CorrelationId::new("real-id")));

    // Bound now: the id alone reaches it
    let outcome = router.route(&hook("Stop", Some("real-id"), None));
    assert_eq!(outcome.session_id(), Some(session.id()));
    assert_eq!(session.activity_state(), ActivityState::WaitingForInput);
}

#[tokio::test]
async fn exited_session_reached_by_cwd_only_is_not_a_candidate() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    router.route(&hook("SessionStart", None, Some(dir.path())));
    router.route(&hook("SessionEnd", None, Some(dir.path())));
    let outcome = router.route(&hook("Stop", Some("late"), Some(dir.path())));

    assert_eq!(outcome, RouteOutcome::Dropped(DropReason::NoCandidate));
}

#[tokio::test]
async fn correlated_session_is_not_a_candidate_again() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();

    router.route(&hook("SessionStart", Some("first"), Some(dir.path())));
    let outcome = router.route(&hook("SessionStart", Some("second"), Some(dir.path())));

    assert_eq!(outcome, RouteOutcome::Dropped(DropReason::NoCandidate));
    assert_eq!(session.correlation_id(), Some(CorrelationId::new("first")));
}

#[tokio::test]
async fn unknown_events_change_nothing() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();
    router.route(&hook("SessionStart", Some("abc"), Some(dir.path())));

    let outcome = router.route(&hook("SomethingNew", Some("abc"), None));
    assert_eq!(
        outcome,
        RouteOutcome::Delivered {
            session_id: session.id(),
            transition: None,
            correlated: false,
        }
    );
    assert_eq!(session.activity_state(), ActivityState::Idle);
}

#[tokio::test]
async fn correlation_precedes_state_change_event() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();
    let mut events = registry.events().subscribe();

    router.route(&hook("SessionStart", Some("abc"), Some(dir.path())));

    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Correlated {
            session_id: session.id(),
            correlation_id: CorrelationId::new("abc"),
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::ActivityStateChanged {
            session_id: session.id(),
            old: ActivityState::Starting,
            new: ActivityState::Idle,
        }
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn concurrent_first_contacts_bind_once() {
    let (_backend, registry, router) = setup();
    let dir = tempfile::tempdir().unwrap();
    let session = registry.create(CreateSessionRequest::new(dir.path())).await.unwrap();
    let path = dir.path().to_path_buf();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let router = router.clone();
            let path = path.clone();
            std::thread::spawn(move || {
                router.route(&hook("SessionStart", Some(&format!("id-{i}")), Some(&path)))
            })
        })
        .collect();
    let correlated = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|outcome| matches!(outcome, RouteOutcome::Delivered { correlated: true, .. }))
        .count();

    assert_eq!(correlated, 1);
    assert!(session.correlation_id().is_some());
}
