//! Tests for `App` startup and settings sequencing.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use crate::app::App;
use crate::config::{SETTINGS_KEY, Settings};
use crate::control::SubmitOutcome;
use crate::endpoints;
use crate::error::Error;
use crate::history::HISTORY_KEY;
use crate::host::Notice;
use crate::session::SessionEvent;
use crate::test_support::{FakeHost, FakeHttp, SERVER, Shown};

fn operator_settings() -> Settings {
    Settings {
        server_url: SERVER.into(),
        username: "gate-a".into(),
        password: "secret".into(),
        ..Default::default()
    }
}

fn seeded(http: FakeHttp, settings: &Settings) -> FakeHost {
    let fakes = FakeHost::new(http);
    fakes
        .store
        .insert(SETTINGS_KEY, &serde_json::to_string(settings).unwrap());
    fakes
}

/// Run startup to the end: settings, login, checkpoints.
async fn started(fakes: &FakeHost) -> App {
    let mut app = App::new(fakes.host());
    let mut events = app.subscribe();
    app.start().await.unwrap().wait().await.unwrap();
    app.drain_session_events(&mut events).await.unwrap();
    app
}

#[tokio::test]
async fn start_without_settings_opens_settings() {
    let fakes = FakeHost::new(FakeHttp::happy());
    let mut app = App::new(fakes.host());

    let err = app.start().await.unwrap_err();

    assert!(matches!(err, Error::SettingsMissing));
    assert_eq!(fakes.presenter.notices(), vec![Notice::SettingsRequired]);
    assert!(fakes.presenter.contains(&Shown::OpenSettings));
    assert!(fakes.http.calls().is_empty());
}

#[tokio::test]
async fn startup_runs_settings_login_checkpoints_in_order() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());

    let app = started(&fakes).await;

    assert!(app.session().is_logged_in());
    assert_eq!(app.checkpoints().len(), 1);
    assert_eq!(app.checkpoints()[0].label(), "Main gate@Gala");
    assert_eq!(fakes.presenter.notices(), vec![Notice::SignedIn]);

    let urls: Vec<_> = fakes.http.calls().into_iter().map(|c| c.url).collect();
    assert!(urls[0].ends_with(endpoints::LOGIN_CSRF));
    assert!(urls[1].ends_with(endpoints::LOGIN));
    assert!(urls[2].ends_with(endpoints::CHECKPOINTS));

    let shown = fakes.presenter.shown();
    assert_eq!(shown.first(), Some(&Shown::KeepScreenOn(true)));
    assert_eq!(shown.last(), Some(&Shown::Checkpoints(app.checkpoints().to_vec())));
    assert_eq!(fakes.presenter.loading(), Some(false));
    assert_eq!(fakes.audio.volume(), Some(50));
}

#[tokio::test]
async fn refused_login_opens_settings() {
    let http = FakeHttp::happy();
    http.always(endpoints::LOGIN, Ok("<input id=\"signin_username\">".into()));
    let fakes = seeded(http, &operator_settings());
    let mut app = App::new(fakes.host());
    let mut events = app.subscribe();

    assert!(app.start().await.unwrap().wait().await.is_err());
    app.drain_session_events(&mut events).await.unwrap();

    assert_eq!(fakes.presenter.notices(), vec![Notice::AuthenticationFailed]);
    assert!(fakes.presenter.contains(&Shown::OpenSettings));
    assert_eq!(fakes.presenter.loading(), Some(false));
    assert!(fakes.http.calls_to(endpoints::CHECKPOINTS).is_empty());
}

#[tokio::test]
async fn empty_checkpoint_list_requests_exit() {
    let http = FakeHttp::happy();
    http.always(endpoints::CHECKPOINTS, Ok("[]".into()));
    let fakes = seeded(http, &operator_settings());
    let mut app = App::new(fakes.host());
    let mut events = app.subscribe();
    app.start().await.unwrap().wait().await.unwrap();

    let err = app.drain_session_events(&mut events).await.unwrap_err();

    assert!(matches!(err, Error::NoCheckpoints));
    assert!(fakes.presenter.notices().contains(&Notice::NoCheckpoints));
    assert!(fakes.presenter.contains(&Shown::Exit));
}

#[tokio::test]
async fn history_is_restored_at_startup() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    fakes.store.insert(
        HISTORY_KEY,
        r#"[{"success": true, "code": 0, "timestamp": "01/05/2024 10:00:00"}]"#,
    );

    let app = started(&fakes).await;

    assert_eq!(app.workflow().history().entries().len(), 1);
    assert_eq!(fakes.presenter.last_history().unwrap().len(), 1);
}

#[tokio::test]
async fn unreadable_history_survives_new_results() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let saved = r#"[
        {"success": true, "code": 0, "timestamp": "30/04/2024 09:00:00"},
        {"success": true, "code": 0, "timestamp": "2024-05-01 11:00:00"}
    ]"#;
    fakes.store.insert(HISTORY_KEY, saved);
    let mut app = started(&fakes).await;
    assert!(app.select_checkpoint("12"));

    let outcome = app.submit_ticket("T1").await.unwrap();

    assert!(matches!(outcome, SubmitOutcome::Controlled(_)));
    assert_eq!(fakes.presenter.results().len(), 1);
    assert_eq!(fakes.store.raw(HISTORY_KEY).as_deref(), Some(saved));
}

#[tokio::test]
async fn scans_use_selected_checkpoint() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let mut app = started(&fakes).await;

    assert!(matches!(
        app.submit_ticket("T1").await,
        Err(Error::MissingCheckpoint)
    ));
    assert!(!app.select_checkpoint("99"));
    assert!(app.select_checkpoint("12"));
    assert_eq!(app.selected_checkpoint().unwrap().name, "Main gate");

    let outcome = app.submit_ticket("T2").await.unwrap();

    assert!(matches!(outcome, SubmitOutcome::Controlled(_)));
    let post = &fakes.http.calls_to(endpoints::CONTROL)[0];
    assert_eq!(post.field("control[checkpoint_id]"), Some("12"));
}

// =============================================================================
// Settings changes
// =============================================================================

#[tokio::test]
async fn turning_history_off_clears_it() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let mut app = started(&fakes).await;
    app.select_checkpoint("12");
    app.submit_ticket("T1").await.unwrap();
    assert!(fakes.store.contains(HISTORY_KEY));

    let off = Settings {
        history_enabled: false,
        ..operator_settings()
    };
    app.save_settings(off).await.unwrap().wait().await.unwrap();

    assert!(!fakes.store.contains(HISTORY_KEY));
    assert!(app.workflow().history().entries().is_empty());
    assert!(fakes.presenter.contains(&Shown::History(Vec::new())));
}

#[tokio::test]
async fn turning_history_on_keeps_nothing_from_before() {
    let off = Settings {
        history_enabled: false,
        ..operator_settings()
    };
    let fakes = seeded(FakeHttp::happy(), &off);
    let mut app = started(&fakes).await;
    app.select_checkpoint("12");
    app.submit_ticket("T1").await.unwrap();

    app.save_settings(operator_settings()).await.unwrap();

    assert!(!fakes.store.contains(HISTORY_KEY));
    assert!(app.workflow().history().entries().is_empty());
}

#[tokio::test]
async fn credential_change_logs_in_again() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let mut app = started(&fakes).await;

    let other_user = Settings {
        username: "gate-b".into(),
        ..operator_settings()
    };
    app.save_settings(other_user).await.unwrap().wait().await.unwrap();

    let logins = fakes.http.calls_to(endpoints::LOGIN);
    assert_eq!(logins.len(), 2);
    assert_eq!(logins[1].field("signin[username]"), Some("gate-b"));
}

#[tokio::test(start_paused = true)]
async fn credential_change_during_login_uses_new_credentials() {
    let http = FakeHttp::happy();
    http.delay(endpoints::LOGIN, Duration::from_millis(50));
    let fakes = seeded(http, &operator_settings());
    let mut app = App::new(fakes.host());
    let mut events = app.subscribe();

    let first = app.start().await.unwrap();
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_millis(10)).await;
    let other_user = Settings {
        username: "gate-b".into(),
        ..operator_settings()
    };
    let second = app.save_settings(other_user).await.unwrap();
    first.wait().await.unwrap();
    second.wait().await.unwrap();
    app.drain_session_events(&mut events).await.unwrap();

    let logins = fakes.http.calls_to(endpoints::LOGIN);
    assert_eq!(logins.len(), 2);
    assert_eq!(logins[1].field("signin[username]"), Some("gate-b"));
    assert!(app.session().is_logged_in());
    assert_eq!(fakes.presenter.notices(), vec![Notice::SignedIn]);
}

#[tokio::test]
async fn volume_change_keeps_session() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let mut app = started(&fakes).await;

    let louder = Settings {
        volume: 80,
        ..operator_settings()
    };
    app.save_settings(louder).await.unwrap().wait().await.unwrap();

    assert_eq!(fakes.http.calls_to(endpoints::LOGIN).len(), 1);
    assert_eq!(fakes.audio.volume(), Some(80));
    assert_eq!(app.settings().volume, 80);
}

#[tokio::test]
async fn failed_save_applies_nothing() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let mut app = started(&fakes).await;
    fakes.store.fail_writes(true);

    let other_user = Settings {
        username: "gate-b".into(),
        ..operator_settings()
    };
    assert!(app.save_settings(other_user).await.is_err());

    assert_eq!(app.settings().username, "gate-a");
    assert!(app.session().is_logged_in());
}

#[tokio::test]
async fn invalid_settings_are_not_saved() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let mut app = started(&fakes).await;

    let bad = Settings {
        server_url: "tickets.test".into(),
        ..operator_settings()
    };
    assert!(matches!(
        app.save_settings(bad).await,
        Err(Error::Config(_))
    ));
    assert_eq!(app.settings().server_url, SERVER);
}

#[tokio::test]
async fn start_publishes_established_event() {
    let fakes = seeded(FakeHttp::happy(), &operator_settings());
    let mut app = App::new(fakes.host());
    let mut events = app.subscribe();

    app.start().await.unwrap().wait().await.unwrap();

    assert_eq!(events.recv().await.unwrap(), SessionEvent::Established);
}
