#![allow(dead_code)]

use std::collections::VecDeque;

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};

use nearby_shared::capabilities::{
    LocationOperation, LocationOutput, LocationPermission, Position, TimerOperation, TimerOutput,
};
use nearby_shared::{App, AppConfig, CruxApp, Effect, Event, Geocoordinate, Model, SessionId};
use nearby_shared::{MapSnapshot, ViewModel};

pub const ENDPOINT: &str = "https://api.example.com/places";
pub const CAFE_BODY: &str =
    r#"[{"name":"Cafe","address":"1 Main St","location":{"lat":1.0,"lng":2.0}}]"#;

pub fn coord(lat: f64, lng: f64) -> Geocoordinate {
    Geocoordinate::new(lat, lng).unwrap()
}

pub fn pos(lat: f64, lng: f64) -> Position {
    Position::new(coord(lat, lng))
}

pub fn reply(status: u16, body: &str) -> HttpResult {
    HttpResult::Ok(
        HttpResponse::status(status)
            .body(body.as_bytes().to_vec())
            .build(),
    )
}

/// Config without debounce and without auto-tracking, so each test opts in to
/// exactly the chains it exercises.
pub fn config() -> AppConfig {
    let mut config = AppConfig::new(ENDPOINT);
    config.search.apply_debounce_ms = 0;
    config.map.track_on_activate = false;
    config.tracking.min_distance_m = 0.0;
    config
}

/// Plays the device side of every effect: location services, the permission
/// dialog, the HTTP stack and timers.
pub struct Shell {
    app: AppTester<App, Effect>,
    pub model: Model,
    pub service_enabled: bool,
    pub permission: LocationPermission,
    pub dialog_answer: LocationPermission,
    /// Keeps the permission dialog open until `answer_permission`.
    pub slow_dialog: bool,
    pub position: Position,
    /// Answers for GETs in order; an empty queue answers `[]`.
    pub responses: VecDeque<HttpResult>,
    pub permission_requests: usize,
    pub requests: Vec<String>,
    dialog: Option<Request<LocationOperation>>,
    watches: Vec<(SessionId, Request<LocationOperation>)>,
    timers: Vec<(u64, Request<TimerOperation>)>,
}

impl Shell {
    pub fn new(config: AppConfig) -> Self {
        Self {
            app: AppTester::default(),
            model: Model::new(config),
            service_enabled: true,
            permission: LocationPermission::WhileInUse,
            dialog_answer: LocationPermission::WhileInUse,
            slow_dialog: false,
            position: pos(10.0, 20.0),
            responses: VecDeque::new(),
            permission_requests: 0,
            requests: Vec::new(),
            dialog: None,
            watches: Vec::new(),
            timers: Vec::new(),
        }
    }

    pub fn respond(&mut self, status: u16, body: &str) {
        self.responses.push_back(reply(status, body));
    }

    pub fn view(&self) -> ViewModel {
        App.view(&self.model)
    }

    pub fn snapshot(&self) -> MapSnapshot {
        self.model.snapshot()
    }

    pub fn send(&mut self, event: Event) {
        let update = self.app.update(event, &mut self.model);
        self.drain(update);
    }

    fn drain(&mut self, update: Update<Effect, Event>) {
        let mut effects: VecDeque<Effect> = update.effects.into();
        let mut events: VecDeque<Event> = update.events.into();
        while !effects.is_empty() || !events.is_empty() {
            if let Some(event) = events.pop_front() {
                let update = self.app.update(event, &mut self.model);
                effects.extend(update.effects);
                events.extend(update.events);
            } else if let Some(effect) = effects.pop_front() {
                if let Some(update) = self.handle(effect) {
                    effects.extend(update.effects);
                    events.extend(update.events);
                }
            }
        }
    }

    fn handle(&mut self, effect: Effect) -> Option<Update<Effect, Event>> {
        match effect {
            Effect::Render(_) => None,
            Effect::Http(mut request) => {
                self.requests.push(request.operation.url.clone());
                let answer = self.responses.pop_front().unwrap_or_else(|| reply(200, "[]"));
                Some(self.app.resolve(&mut request, answer).unwrap())
            }
            Effect::Timer(mut request) => match request.operation.clone() {
                TimerOperation::Start { id, .. } => {
                    self.timers.push((id.0, request));
                    None
                }
                TimerOperation::Cancel { id } => {
                    let index = self.timers.iter().position(|(armed, _)| *armed == id.0)?;
                    let (_, mut armed) = self.timers.remove(index);
                    let output = TimerOutput::Cancelled { id };
                    Some(self.app.resolve(&mut armed, output).unwrap())
                }
            },
            Effect::Location(mut request) => {
                let output = match request.operation.clone() {
                    LocationOperation::ServiceEnabled => {
                        LocationOutput::ServiceEnabled(self.service_enabled)
                    }
                    LocationOperation::CheckPermission => {
                        LocationOutput::Permission(self.permission)
                    }
                    LocationOperation::RequestPermission => {
                        self.permission_requests += 1;
                        if self.slow_dialog {
                            self.dialog = Some(request);
                            return None;
                        }
                        self.permission = self.dialog_answer;
                        LocationOutput::Permission(self.dialog_answer)
                    }
                    LocationOperation::CurrentPosition { .. } => {
                        LocationOutput::Position(self.position)
                    }
                    LocationOperation::Watch { session, .. } => {
                        self.watches.push((session, request));
                        return None;
                    }
                    LocationOperation::StopWatching { session } => {
                        self.watches.retain(|(open, _)| *open != session);
                        return None;
                    }
                };
                Some(self.app.resolve(&mut request, output).unwrap())
            }
        }
    }

    pub fn answer_permission(&mut self) {
        let mut dialog = self.dialog.take().expect("no permission dialog open");
        self.permission = self.dialog_answer;
        let output = LocationOutput::Permission(self.dialog_answer);
        let update = self.app.resolve(&mut dialog, output).unwrap();
        self.drain(update);
    }

    pub fn fire_timers(&mut self) {
        for (id, mut request) in std::mem::take(&mut self.timers) {
            let output = TimerOutput::Elapsed {
                id: nearby_shared::capabilities::TimerId(id),
            };
            let update = self.app.resolve(&mut request, output).unwrap();
            self.drain(update);
        }
    }

    pub fn open_watches(&self) -> Vec<SessionId> {
        self.watches.iter().map(|(session, _)| *session).collect()
    }

    /// Streams one fix on the watch for `session`, the way the platform
    /// would. Returns false if that watch is closed.
    pub fn push_fix(&mut self, session: SessionId, position: Position) -> bool {
        let Some(index) = self.watches.iter().position(|(open, _)| *open == session) else {
            return false;
        };
        let output = LocationOutput::Position(position);
        let update = self.app.resolve(&mut self.watches[index].1, output).unwrap();
        self.drain(update);
        true
    }

    /// Streams to the newest watch.
    pub fn push_live_fix(&mut self, position: Position) -> bool {
        match self.open_watches().last() {
            Some(session) => self.push_fix(*session, position),
            None => false,
        }
    }
}

/// Every HTTP request the shell saw, as a `crux_http` operation. Only used to
/// check the request id header.
pub fn http_requests(effects: &[Effect]) -> Vec<HttpRequest> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect()
}
