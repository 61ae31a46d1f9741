//! In-memory fakes of the host capabilities.
//!
//! Used by this crate's tests and, behind the `test-utils` feature, by hosts
//! testing their own wiring.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::Host;
use crate::checkpoints::Checkpoint;
use crate::control::ControlResult;
use crate::endpoints;
use crate::error::{HttpError, StorageError};
use crate::history::DayGroup;
use crate::host::{AudioError, AudioFeedback, HttpClient, KeyValueStore, Notice, Presenter};

pub const SERVER: &str = "https://tickets.test";
pub const CHECKPOINT_LIST: &str = r#"[{"id": 12, "name": "Main gate", "Event": {"Translation": {"fr": {"name": "Gala"}}}}]"#;

// =============================================================================
// Key-value store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().unwrap().contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    /// Make every `set` and `remove` fail from now on.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::new(key, "store is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.check_writable(key)?;
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable(key)?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

// =============================================================================
// HTTP
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl Call {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted server. Responses are matched on the route suffix of the URL;
/// the last queued response of a route is repeated forever.
#[derive(Debug, Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<&'static str, VecDeque<Result<String, HttpError>>>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    calls: Mutex<Vec<Call>>,
    cookie_clears: AtomicUsize,
}

impl FakeHttp {
    /// A server accepting the login and every control with `success: true`.
    pub fn happy() -> Self {
        let http = Self::default();
        http.respond(endpoints::LOGIN_CSRF, Ok("login-token".into()));
        http.respond(endpoints::LOGIN, Ok("<html>Welcome</html>".into()));
        http.respond(endpoints::CONTROL_CSRF, Ok("control-token".into()));
        http.respond(endpoints::CHECKPOINTS, Ok(CHECKPOINT_LIST.into()));
        http.respond(
            endpoints::CONTROL,
            Ok(r#"{"success": true, "code": 0, "timestamp": "01/05/2024 10:00:00"}"#.into()),
        );
        http
    }

    /// Queue `response` for `route`.
    pub fn respond(&self, route: &'static str, response: Result<String, HttpError>) {
        self.routes
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back(response);
    }

    /// Replace whatever is queued for `route` with `response`.
    pub fn always(&self, route: &'static str, response: Result<String, HttpError>) {
        self.routes
            .lock()
            .unwrap()
            .insert(route, VecDeque::from([response]));
    }

    /// Hold every answer on `route` back for `by` (tokio time).
    pub fn delay(&self, route: &'static str, by: Duration) {
        self.delays.lock().unwrap().insert(route, by);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, route: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.url.ends_with(route))
            .collect()
    }

    pub fn cookie_clears(&self) -> usize {
        self.cookie_clears.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        method: Method,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<String, HttpError> {
        self.calls.lock().unwrap().push(Call {
            method,
            url: url.to_string(),
            fields: fields.to_vec(),
        });
        let delay = {
            let delays = self.delays.lock().unwrap();
            route_for(delays.keys().copied(), url).map(|route| delays[&route])
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut routes = self.routes.lock().unwrap();
        let Some(route) = route_for(routes.keys().copied(), url) else {
            return Err(HttpError::Status(404));
        };
        let queue = routes.get_mut(route).unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(Err(HttpError::Status(404)))
        }
    }
}

/// Longest matching suffix first: "/getControlCSRF" must not match "/control".
fn route_for(routes: impl Iterator<Item = &'static str>, url: &str) -> Option<&'static str> {
    routes
        .filter(|route| url.ends_with(route))
        .max_by_key(|route| route.len())
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str) -> Result<String, HttpError> {
        self.answer(Method::Get, url, &[]).await
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<String, HttpError> {
        self.answer(Method::Post, url, fields).await
    }

    fn clear_cookies(&self) {
        self.cookie_clears.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Audio
// =============================================================================

#[derive(Debug, Default)]
pub struct RecordingAudio {
    played: Mutex<Vec<bool>>,
    volume: Mutex<Option<u8>>,
}

impl RecordingAudio {
    pub fn played(&self) -> Vec<bool> {
        self.played.lock().unwrap().clone()
    }

    pub fn volume(&self) -> Option<u8> {
        *self.volume.lock().unwrap()
    }
}

impl AudioFeedback for RecordingAudio {
    fn play(&self, success: bool) -> Result<(), AudioError> {
        self.played.lock().unwrap().push(success);
        Ok(())
    }

    fn set_volume(&self, volume: u8) -> Result<(), AudioError> {
        *self.volume.lock().unwrap() = Some(volume);
        Ok(())
    }
}

// =============================================================================
// Presenter
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Loading(bool),
    Notice(Notice),
    ClearResult,
    Result(ControlResult),
    History(Vec<DayGroup>),
    Checkpoints(Vec<Checkpoint>),
    KeepScreenOn(bool),
    PublicMode(bool),
    OpenSettings,
    Exit,
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<Shown>>,
}

impl RecordingPresenter {
    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn results(&self) -> Vec<ControlResult> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Result(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Groups of the most recent history redraw.
    pub fn last_history(&self) -> Option<Vec<DayGroup>> {
        self.shown().into_iter().rev().find_map(|s| match s {
            Shown::History(groups) => Some(groups),
            _ => None,
        })
    }

    /// Last loading state requested.
    pub fn loading(&self) -> Option<bool> {
        self.shown().into_iter().rev().find_map(|s| match s {
            Shown::Loading(active) => Some(active),
            _ => None,
        })
    }

    pub fn contains(&self, shown: &Shown) -> bool {
        self.shown.lock().unwrap().contains(shown)
    }

    fn push(&self, shown: Shown) {
        self.shown.lock().unwrap().push(shown);
    }
}

impl Presenter for RecordingPresenter {
    fn set_loading(&self, active: bool) {
        self.push(Shown::Loading(active));
    }

    fn notify(&self, notice: Notice) {
        self.push(Shown::Notice(notice));
    }

    fn clear_result(&self) {
        self.push(Shown::ClearResult);
    }

    fn show_result(&self, result: &ControlResult) {
        self.push(Shown::Result(result.clone()));
    }

    fn render_history(&self, groups: &[DayGroup]) {
        self.push(Shown::History(groups.to_vec()));
    }

    fn show_checkpoints(&self, checkpoints: &[Checkpoint]) {
        self.push(Shown::Checkpoints(checkpoints.to_vec()));
    }

    fn keep_screen_on(&self, enabled: bool) {
        self.push(Shown::KeepScreenOn(enabled));
    }

    fn set_public_mode(&self, enabled: bool) {
        self.push(Shown::PublicMode(enabled));
    }

    fn open_settings(&self) {
        self.push(Shown::OpenSettings);
    }

    fn request_exit(&self) {
        self.push(Shown::Exit);
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// Concrete fakes plus the [`Host`] built from them.
pub struct FakeHost {
    pub http: Arc<FakeHttp>,
    pub store: Arc<MemoryStore>,
    pub audio: Arc<RecordingAudio>,
    pub presenter: Arc<RecordingPresenter>,
}

impl FakeHost {
    pub fn new(http: FakeHttp) -> Self {
        Self {
            http: Arc::new(http),
            store: Arc::new(MemoryStore::default()),
            audio: Arc::new(RecordingAudio::default()),
            presenter: Arc::new(RecordingPresenter::default()),
        }
    }

    pub fn host(&self) -> Host {
        Host {
            http: self.http.clone(),
            store: self.store.clone(),
            audio: self.audio.clone(),
            presenter: self.presenter.clone(),
        }
    }
}
