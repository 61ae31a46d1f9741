#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use evectl_core::config::SETTINGS_KEY;
use evectl_core::endpoints;
use evectl_core::test_support::{FakeHttp, MemoryStore, RecordingAudio, SERVER};
use evectl_core::{App, Host, Settings};

use super::*;

struct Device {
    http: Arc<FakeHttp>,
    presenter: Arc<TerminalPresenter<Vec<u8>>>,
    scan: ScanLoop<Vec<u8>>,
}

fn device(http: FakeHttp, settings: Option<Settings>, checkpoint: Option<&str>) -> Device {
    let http = Arc::new(http);
    let store = Arc::new(MemoryStore::default());
    if let Some(settings) = settings {
        store.insert(SETTINGS_KEY, &serde_json::to_string(&settings).unwrap());
    }
    let presenter = Arc::new(TerminalPresenter::new(Vec::new()));
    let app = App::new(Host {
        http: http.clone(),
        store,
        audio: Arc::new(RecordingAudio::default()),
        presenter: presenter.clone(),
    });
    let scan = ScanLoop::new(app, Arc::clone(&presenter), checkpoint.map(str::to_string));
    Device {
        http,
        presenter,
        scan,
    }
}

fn operator_settings() -> Settings {
    Settings {
        server_url: SERVER.into(),
        username: "gate-a".into(),
        password: "secret".into(),
        ..Default::default()
    }
}

#[test]
fn parses_tickets_and_commands() {
    assert_eq!(parse_line("  T-42 \r"), Input::Ticket("T-42".into()));
    assert_eq!(parse_line(""), Input::Empty);
    assert_eq!(parse_line(":c 12"), Input::Select("12".into()));
    assert_eq!(parse_line(":checkpoint 12"), Input::Select("12".into()));
    assert_eq!(parse_line(":checkpoints"), Input::ListCheckpoints);
    assert_eq!(parse_line(":history"), Input::History);
    assert_eq!(parse_line(":q"), Input::Quit);
    assert_eq!(parse_line(":checkpoint"), Input::Unknown(":checkpoint".into()));
}

#[tokio::test]
async fn single_checkpoint_is_selected_and_repeats_suppressed() {
    let mut d = device(FakeHttp::happy(), Some(operator_settings()), None);

    d.scan.run(&b"T1\nT1\n:quit\nT2\n"[..]).await.unwrap();

    let posts = d.http.calls_to(endpoints::CONTROL);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].field("control[ticket_id]"), Some("T1"));
    assert_eq!(posts[0].field("control[checkpoint_id]"), Some("12"));
    let out = d.presenter.output();
    assert!(out.contains("* Signed in"));
    assert!(out.contains("VALID [0] 01/05/2024 10:00:00"));
}

#[tokio::test]
async fn missing_settings_is_an_error() {
    let mut d = device(FakeHttp::happy(), None, None);

    let err = d.scan.run(&b"T1\n"[..]).await.unwrap_err();

    assert!(err.to_string().contains("evectl settings set"));
    assert!(d.http.calls().is_empty());
}

#[tokio::test]
async fn refused_login_stops_before_scanning() {
    let http = FakeHttp::happy();
    http.always(endpoints::LOGIN, Ok("<input id=\"signin_username\">".into()));
    let mut d = device(http, Some(operator_settings()), None);

    assert!(d.scan.run(&b"T1\n"[..]).await.is_err());

    assert!(d.http.calls_to(endpoints::CONTROL).is_empty());
    assert!(d.presenter.take_settings_request());
}

#[tokio::test]
async fn empty_checkpoint_list_ends_the_run() {
    let http = FakeHttp::happy();
    http.always(endpoints::CHECKPOINTS, Ok("[]".into()));
    let mut d = device(http, Some(operator_settings()), None);

    assert!(d.scan.run(&b"T1\n"[..]).await.is_err());
    assert!(d.presenter.exit_requested());
    assert!(d.http.calls_to(endpoints::CONTROL).is_empty());
}

#[tokio::test]
async fn unknown_preferred_checkpoint_falls_back_to_only_one() {
    let mut d = device(FakeHttp::happy(), Some(operator_settings()), Some("99"));

    d.scan.run(&b""[..]).await.unwrap();

    assert_eq!(d.scan.app().selected_checkpoint().unwrap().id, "12");
}

#[tokio::test]
async fn operator_selects_among_several_checkpoints() {
    let http = FakeHttp::happy();
    http.always(
        endpoints::CHECKPOINTS,
        Ok(r#"[{"id": 1, "name": "North"}, {"id": 2, "name": "South"}]"#.into()),
    );
    let mut d = device(http, Some(operator_settings()), None);

    d.scan.run(&b"T1\n:c 2\nT2\n:history\n"[..]).await.unwrap();

    let posts = d.http.calls_to(endpoints::CONTROL);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].field("control[ticket_id]"), Some("T2"));
    let out = d.presenter.output();
    assert!(out.contains("Please select a checkpoint"));
    assert!(out.contains("Checkpoint: South@"));
    assert!(out.contains("== 01/05/2024 =="));
}

#[tokio::test]
async fn public_mode_refuses_admin_commands() {
    let settings = Settings {
        public_mode: true,
        ..operator_settings()
    };
    let mut d = device(FakeHttp::happy(), Some(settings), None);

    d.scan.run(&b":history\n:c 12\n"[..]).await.unwrap();

    let out = d.presenter.output();
    assert_eq!(out.matches("Not available in public mode").count(), 2);
    assert!(!out.contains("Checkpoints:"));
}
