use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capabilities::location::{
    AccessWaiter, LocationAccess, LocationAccuracy, LocationError, Position,
};
use crate::capabilities::search::{read_response, FetchError, FetchResult, SearchEndpoint};
use crate::capabilities::timer::TimerId;
use crate::capabilities::Capabilities;
use crate::config::{MarkerKey, SearchConfig};
use crate::error::AppError;
use crate::event::Event;
use crate::geo::Geocoordinate;
use crate::map_state::{MapMarker, MapStateStore, MarkerKind};
use crate::model::{FilterState, SearchQuery, SearchResultItem};
use crate::{REQUEST_ID_HEADER, RESULT_MARKER_Z_INDEX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPhase {
    Idle,
    Locating { request: RequestId },
    Fetching { request: RequestId },
}

#[derive(Debug)]
struct PendingApply {
    ticket: TimerId,
    value: f64,
}

/// Drives "find me, then fetch what's around me".
///
/// Owns the loading/error status and the filter. Only one locate or fetch is
/// current at a time. Starting another makes the old one stale, and a
/// completion whose request id is no longer current is dropped.
#[derive(Debug)]
pub struct SearchController {
    config: SearchConfig,
    endpoint: Option<SearchEndpoint>,
    accuracy: LocationAccuracy,
    phase: SearchPhase,
    next_request: u64,
    next_timer: u64,
    deadline: Option<TimerId>,
    filter: FilterState,
    error: Option<AppError>,
    last_known_position: Option<Position>,
    pending_apply: Option<PendingApply>,
    has_loaded: bool,
}

impl SearchController {
    /// `endpoint` is `None` until a valid configuration arrives; fetches fail
    /// with [`FetchError::NotConfigured`] meanwhile.
    #[must_use]
    pub fn new(
        config: SearchConfig,
        endpoint: Option<SearchEndpoint>,
        accuracy: LocationAccuracy,
    ) -> Self {
        let filter = FilterState::new(config.default_filter);
        Self {
            config,
            endpoint,
            accuracy,
            phase: SearchPhase::Idle,
            next_request: 0,
            next_timer: 0,
            deadline: None,
            filter,
            error: None,
            last_known_position: None,
            pending_apply: None,
            has_loaded: false,
        }
    }

    /// Swaps in a new configuration and resets everything but the id
    /// counters, so completions of earlier work stay stale.
    pub fn reconfigure(
        &mut self,
        config: SearchConfig,
        endpoint: Option<SearchEndpoint>,
        accuracy: LocationAccuracy,
    ) {
        let (next_request, next_timer) = (self.next_request, self.next_timer);
        *self = Self::new(config, endpoint, accuracy);
        self.next_request = next_request;
        self.next_timer = next_timer;
    }

    #[must_use]
    pub const fn phase(&self) -> SearchPhase {
        self.phase
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase != SearchPhase::Idle
    }

    #[must_use]
    pub const fn filter(&self) -> FilterState {
        self.filter
    }

    #[must_use]
    pub const fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(AppError::user_facing_message)
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// True once any fetch has been applied to the map.
    #[must_use]
    pub const fn has_loaded(&self) -> bool {
        self.has_loaded
    }

    #[must_use]
    pub const fn last_known_position(&self) -> Option<Position> {
        self.last_known_position
    }

    /// Lets a live fix stand in for the one-shot read on the next apply.
    pub fn note_position(&mut self, position: Position) {
        self.last_known_position = Some(position);
    }

    fn next_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn next_timer(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId(self.next_timer)
    }

    fn cancel_deadline(&mut self, caps: &Capabilities) {
        if let Some(id) = self.deadline.take() {
            caps.timer.cancel(id);
        }
    }

    /// Full orchestration: access check through the shared gate, one-shot
    /// position read, then a fetch with the committed filter.
    pub fn activate(&mut self, access: &mut LocationAccess, caps: &Capabilities) -> RequestId {
        self.cancel_deadline(caps);
        let request = self.next_request();
        self.phase = SearchPhase::Locating { request };
        info!(request = %request, "locating");

        if let Err(e) = access.acquire(AccessWaiter::Locate(request), &caps.location) {
            self.fail_locate(request, e);
        }
        request
    }

    fn fail_locate(&mut self, request: RequestId, e: LocationError) {
        warn!(request = %request, error = %e, "location unavailable");
        self.phase = SearchPhase::Idle;
        self.error = Some(e.into());
    }

    /// Continues a locate once the gate has answered.
    pub fn on_access_resolved(
        &mut self,
        request: RequestId,
        result: Result<(), LocationError>,
        caps: &Capabilities,
    ) -> bool {
        if self.phase != (SearchPhase::Locating { request }) {
            debug!(request = %request, "dropping stale access result");
            return false;
        }
        match result {
            Ok(()) => caps.location.current_position(self.accuracy, move |result| {
                Event::LocationResolved { request, result }
            }),
            Err(e) => self.fail_locate(request, e),
        }
        true
    }

    pub fn on_location_resolved(
        &mut self,
        request: RequestId,
        result: Result<Position, LocationError>,
        caps: &Capabilities,
    ) -> bool {
        if self.phase != (SearchPhase::Locating { request }) {
            debug!(request = %request, "dropping stale location");
            return false;
        }

        match result {
            Ok(position) => {
                self.last_known_position = Some(position);
                self.begin_fetch(position.coordinate, caps);
            }
            Err(e) => self.fail_locate(request, e),
        }
        true
    }

    pub fn begin_fetch(&mut self, location: Geocoordinate, caps: &Capabilities) -> RequestId {
        self.cancel_deadline(caps);
        let request = self.next_request();
        let query = SearchQuery {
            location,
            min_value: self.filter.committed(),
        };

        let Some(endpoint) = &self.endpoint else {
            error!(request = %request, "no search endpoint configured");
            self.phase = SearchPhase::Idle;
            self.error = Some(FetchError::NotConfigured.into());
            return request;
        };

        let url = endpoint.query_url(&query);
        info!(
            request = %request,
            host = endpoint.host(),
            lat = location.lat(),
            lng = location.lng(),
            min_value = query.min_value,
            "fetching results"
        );
        caps.http
            .get(url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .send(move |response| Event::FetchCompleted {
                request,
                result: read_response(response),
            });

        if let Some(limit) = self.config.fetch_timeout() {
            let id = self.next_timer();
            caps.timer.notify_after(id, limit, move || {
                Event::FetchDeadlineElapsed { request }
            });
            self.deadline = Some(id);
        }

        self.phase = SearchPhase::Fetching { request };
        request
    }

    /// Applies a fetch outcome. Failures leave the result layer as it was.
    pub fn on_fetch_completed(
        &mut self,
        request: RequestId,
        result: FetchResult,
        store: &mut MapStateStore,
        caps: &Capabilities,
    ) -> bool {
        if self.phase != (SearchPhase::Fetching { request }) {
            debug!(request = %request, "dropping superseded fetch result");
            return false;
        }
        self.phase = SearchPhase::Idle;
        self.cancel_deadline(caps);

        match result {
            Ok(items) => {
                let count = items.len();
                store.replace_results(result_markers(items, self.config.marker_key));
                self.error = None;
                self.has_loaded = true;
                info!(
                    request = %request,
                    count,
                    markers = store.result_count(),
                    "results applied"
                );
            }
            Err(e) => {
                error!(request = %request, error = %e, "fetch failed");
                self.error = Some(e.into());
            }
        }
        true
    }

    /// Gives up on a fetch that outlived the configured timeout. A response
    /// arriving afterwards is stale and dropped.
    pub fn on_fetch_deadline(&mut self, request: RequestId) -> bool {
        if self.phase != (SearchPhase::Fetching { request }) {
            return false;
        }
        self.deadline = None;
        self.phase = SearchPhase::Idle;
        let e = FetchError::TimedOut {
            after_ms: self.config.fetch_timeout_ms.unwrap_or_default(),
        };
        error!(request = %request, error = %e, "fetch failed");
        self.error = Some(e.into());
        true
    }

    /// Moves only the pending value.
    pub fn slider_changed(&mut self, value: f64) {
        self.filter.set_pending(value);
    }

    /// Debounced apply. A newer apply re-arms the timer; a zero debounce
    /// commits right away.
    pub fn apply_filter(&mut self, value: f64, access: &mut LocationAccess, caps: &Capabilities) {
        if !self.filter.set_pending(value) {
            warn!("ignoring NaN filter value");
            return;
        }
        if let Some(previous) = self.pending_apply.take() {
            caps.timer.cancel(previous.ticket);
        }

        let delay = self.config.apply_debounce();
        if delay.is_zero() {
            self.commit(value, access, caps);
            return;
        }

        let ticket = self.next_timer();
        caps.timer.notify_after(ticket, delay, move || {
            Event::FilterDebounceElapsed { ticket }
        });
        self.pending_apply = Some(PendingApply { ticket, value });
    }

    pub fn on_debounce_elapsed(
        &mut self,
        ticket: TimerId,
        access: &mut LocationAccess,
        caps: &Capabilities,
    ) -> bool {
        match self.pending_apply.take() {
            Some(pending) if pending.ticket == ticket => {
                self.commit(pending.value, access, caps);
                true
            }
            other => {
                self.pending_apply = other;
                false
            }
        }
    }

    fn commit(&mut self, value: f64, access: &mut LocationAccess, caps: &Capabilities) {
        self.filter.commit(value);
        info!(min_value = self.filter.committed(), "filter applied");

        match (self.last_known_position, self.phase) {
            (Some(position), _) => {
                self.begin_fetch(position.coordinate, caps);
            }
            // The fetch that follows the running locate picks up the new value.
            (None, SearchPhase::Locating { .. }) => {}
            (None, _) => {
                self.activate(access, caps);
            }
        }
    }

    /// User-initiated retry. No-op while a request is running.
    pub fn retry(&mut self, access: &mut LocationAccess, caps: &Capabilities) -> bool {
        if self.is_loading() {
            return false;
        }
        match self.last_known_position {
            Some(position) => self.begin_fetch(position.coordinate, caps),
            None => self.activate(access, caps),
        };
        true
    }

    pub fn cancel(&mut self, access: &mut LocationAccess, caps: &Capabilities) {
        if let SearchPhase::Locating { request } = self.phase {
            access.forget(AccessWaiter::Locate(request));
        }
        self.cancel_deadline(caps);
        if let Some(pending) = self.pending_apply.take() {
            caps.timer.cancel(pending.ticket);
        }
        self.phase = SearchPhase::Idle;
    }
}

/// One RESULT marker per item. With label keying, items sharing a label
/// collapse and the store keeps the last one.
fn result_markers(items: Vec<SearchResultItem>, key: MarkerKey) -> Vec<MapMarker> {
    items
        .into_iter()
        .map(|item| MapMarker {
            id: match key {
                MarkerKey::Label => item.label.clone(),
                MarkerKey::ItemId => item.id,
            },
            kind: MarkerKind::SearchResult,
            location: item.location,
            z_order: RESULT_MARKER_Z_INDEX,
            title: item.label,
            subtitle: item.detail,
            icon: None,
        })
        .collect()
}
