//! Live position tracking.
//!
//! A session is one watch on the shell's position stream. Every fix comes
//! back tagged with its [`SessionId`]. At most one session is active; opening
//! a new one stops the old watch first, and fixes still queued from the old
//! one are discarded when the core applies them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::capabilities::location::{
    AccessWaiter, LocationAccess, LocationError, LocationSettings, Position, WatchUpdate,
};
use crate::capabilities::Capabilities;
use crate::config::TrackingConfig;
use crate::error::AppError;
use crate::event::Event;
use crate::geo::Geocoordinate;
use crate::map_state::{CircleStyle, IconRef, MapCircle, MapMarker, MapStateStore, MarkerKind};
use crate::{SELF_CIRCLE_ID, SELF_MARKER_ID, SELF_MARKER_TITLE, SELF_MARKER_Z_INDEX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// An open watch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingSession {
    id: SessionId,
    settings: LocationSettings,
}

impl TrackingSession {
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub const fn settings(&self) -> LocationSettings {
        self.settings
    }
}

#[derive(Debug)]
pub struct PositionTracker {
    radius_m: f64,
    next_id: u64,
    pending: Option<(SessionId, TrackingConfig)>,
    active: Option<TrackingSession>,
    last_position: Option<Position>,
    last_error: Option<AppError>,
}

impl PositionTracker {
    #[must_use]
    pub const fn new(radius_m: f64) -> Self {
        Self {
            radius_m,
            next_id: 0,
            pending: None,
            active: None,
            last_position: None,
            last_error: None,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub const fn is_starting(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(TrackingSession::id)
    }

    #[must_use]
    pub const fn session(&self) -> Option<&TrackingSession> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Takes effect from the next fix.
    pub fn set_radius(&mut self, radius_m: f64) {
        self.radius_m = radius_m;
    }

    /// Asks the shared gate for access on behalf of a new session. The
    /// session opens when the gate answers; until then any current session
    /// keeps running.
    pub fn start(
        &mut self,
        config: TrackingConfig,
        access: &mut LocationAccess,
        caps: &Capabilities,
    ) -> SessionId {
        if let Some((superseded, _)) = self.pending.take() {
            access.forget(AccessWaiter::Track(superseded));
        }
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.pending = Some((id, config));
        debug!(session = %id, "tracking requested");

        if let Err(error) = access.acquire(AccessWaiter::Track(id), &caps.location) {
            self.on_access_resolved(id, Err(error), caps);
        }
        id
    }

    /// Opens the session once access is granted. Returns the opened session,
    /// or `None` if access was refused (the refusal is kept as the tracking
    /// error) or the start has since been superseded or stopped.
    pub fn on_access_resolved(
        &mut self,
        session: SessionId,
        result: Result<(), LocationError>,
        caps: &Capabilities,
    ) -> Option<SessionId> {
        let config = match self.pending.take() {
            Some((id, config)) if id == session => config,
            other => {
                self.pending = other;
                debug!(session = %session, "ignoring stale tracking start");
                return None;
            }
        };

        if let Err(error) = result {
            warn!(session = %session, %error, "tracking not started");
            self.last_error = Some(error.into());
            return None;
        }

        self.open(session, config, caps);
        Some(session)
    }

    fn open(&mut self, id: SessionId, config: TrackingConfig, caps: &Capabilities) {
        // Stop first so the shell never streams for two sessions at once.
        if let Some(old) = self.active.take() {
            info!(old = %old.id, new = %id, "replacing tracking session");
            caps.location.stop_watching(old.id);
        }

        let settings = config.settings();
        caps.location.watch(id, settings, move |update| match update {
            WatchUpdate::Fix(position) => Event::PositionUpdated {
                session: id,
                position,
            },
            WatchUpdate::Failed(error) => Event::PositionStreamFailed { session: id, error },
            WatchUpdate::Ended => Event::PositionStreamEnded { session: id },
        });

        self.last_error = None;
        self.active = Some(TrackingSession { id, settings });
        info!(
            session = %id,
            accuracy = ?settings.accuracy,
            min_distance_m = settings.min_distance_m,
            "tracking session started"
        );
    }

    /// Idempotent.
    pub fn stop(&mut self, access: &mut LocationAccess, caps: &Capabilities) {
        if let Some((id, _)) = self.pending.take() {
            access.forget(AccessWaiter::Track(id));
        }
        if let Some(session) = self.active.take() {
            caps.location.stop_watching(session.id);
            info!(session = %session.id, "tracking session stopped");
        }
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.session_id() == Some(session)
    }

    /// Applies one fix. Returns false if the fix came from a superseded
    /// session.
    pub fn apply_position(
        &mut self,
        session: SessionId,
        position: Position,
        store: &mut MapStateStore,
    ) -> bool {
        if !self.is_current(session) {
            debug!(session = %session, "dropping fix from stale session");
            return false;
        }
        self.last_position = Some(position);
        self.last_error = None;
        store.upsert_self(
            self_marker(position),
            self_circle(position.coordinate, self.radius_m),
        );
        true
    }

    /// The session stays open; the next fix clears the error.
    pub fn on_stream_failed(&mut self, session: SessionId, error: LocationError) -> bool {
        if !self.is_current(session) {
            return false;
        }
        warn!(session = %session, %error, "position stream error");
        self.last_error = Some(error.into());
        true
    }

    pub fn on_stream_ended(&mut self, session: SessionId) -> bool {
        if !self.is_current(session) {
            return false;
        }
        info!(session = %session, "position stream ended");
        self.active = None;
        true
    }
}

#[must_use]
pub fn self_marker(position: Position) -> MapMarker {
    let subtitle = position
        .accuracy_m
        .map(|m| format!("±{m:.0} m"))
        .unwrap_or_default();
    MapMarker {
        id: SELF_MARKER_ID.to_string(),
        kind: MarkerKind::SelfLocation,
        location: position.coordinate,
        z_order: SELF_MARKER_Z_INDEX,
        title: SELF_MARKER_TITLE.to_string(),
        subtitle,
        icon: Some(IconRef::self_dot()),
    }
}

#[must_use]
pub fn self_circle(center: Geocoordinate, radius_m: f64) -> MapCircle {
    MapCircle {
        id: SELF_CIRCLE_ID.to_string(),
        center,
        radius_m,
        style: CircleStyle::default(),
    }
}
