use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::controller::RequestId;
use crate::error::{AppError, ErrorKind};
use crate::event::Event;
use crate::geo::Geocoordinate;
use crate::tracker::SessionId;

/// OS-level location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationPermission {
    #[default]
    Unknown,
    Denied,
    DeniedForever,
    WhileInUse,
    Always,
}

impl LocationPermission {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::WhileInUse | Self::Always)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationAccuracy {
    Lowest,
    Low,
    Medium,
    #[default]
    High,
    Best,
    BestForNavigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSettings {
    pub accuracy: LocationAccuracy,
    pub min_distance_m: f64,
}

/// One fix from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coordinate: Geocoordinate,
    pub accuracy_m: Option<f64>,
}

impl Position {
    #[must_use]
    pub const fn new(coordinate: Geocoordinate) -> Self {
        Self {
            coordinate,
            accuracy_m: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location permission permanently denied")]
    PermissionDeniedForever,
    #[error("location services are disabled")]
    ServiceDisabled,
    #[error("platform location error: {0}")]
    Platform(String),
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        let kind = match &e {
            LocationError::PermissionDenied => ErrorKind::PermissionDenied,
            LocationError::PermissionDeniedForever => ErrorKind::PermissionDeniedForever,
            LocationError::ServiceDisabled => ErrorKind::LocationServiceDisabled,
            LocationError::Platform(_) => ErrorKind::Location,
        };
        AppError::new(kind, e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LocationOperation {
    ServiceEnabled,
    CheckPermission,
    RequestPermission,
    CurrentPosition {
        accuracy: LocationAccuracy,
    },
    /// Answered many times: one `Position` or `Failed` per fix, then
    /// `StreamEnded`.
    Watch {
        session: SessionId,
        settings: LocationSettings,
    },
    StopWatching {
        session: SessionId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LocationOutput {
    ServiceEnabled(bool),
    Permission(LocationPermission),
    Position(Position),
    StreamEnded,
    Failed(LocationError),
}

impl Operation for LocationOperation {
    type Output = LocationOutput;
}

/// What a watch posts back for each item the shell streams.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchUpdate {
    Fix(Position),
    Failed(LocationError),
    Ended,
}

fn unexpected(output: &LocationOutput) -> LocationError {
    LocationError::Platform(format!("unexpected reply from shell: {output:?}"))
}

/// The platform geolocation API.
#[derive(Capability)]
pub struct Location<Ev> {
    context: CapabilityContext<LocationOperation, Ev>,
}

impl<Ev> Location<Ev> {
    pub fn new(context: CapabilityContext<LocationOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Location<Ev>
where
    Ev: Send + 'static,
{
    /// Runs the platform handshake: service enabled, then check permission,
    /// then request it if it is denied but not for good, then classify.
    pub fn ensure_access<F>(&self, make_event: F)
    where
        F: FnOnce(Result<(), LocationError>) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = async {
                match context
                    .request_from_shell(LocationOperation::ServiceEnabled)
                    .await
                {
                    LocationOutput::ServiceEnabled(true) => {}
                    LocationOutput::ServiceEnabled(false) => {
                        warn!("location services disabled");
                        return Err(LocationError::ServiceDisabled);
                    }
                    LocationOutput::Failed(error) => return Err(error),
                    other => return Err(unexpected(&other)),
                }

                let mut permission = match context
                    .request_from_shell(LocationOperation::CheckPermission)
                    .await
                {
                    LocationOutput::Permission(permission) => permission,
                    LocationOutput::Failed(error) => return Err(error),
                    other => return Err(unexpected(&other)),
                };

                if !permission.is_granted() && permission != LocationPermission::DeniedForever {
                    debug!(?permission, "requesting location permission");
                    permission = match context
                        .request_from_shell(LocationOperation::RequestPermission)
                        .await
                    {
                        LocationOutput::Permission(permission) => permission,
                        LocationOutput::Failed(error) => return Err(error),
                        other => return Err(unexpected(&other)),
                    };
                }

                match permission {
                    LocationPermission::WhileInUse | LocationPermission::Always => Ok(()),
                    LocationPermission::DeniedForever => {
                        warn!("location permission denied forever");
                        Err(LocationError::PermissionDeniedForever)
                    }
                    LocationPermission::Denied | LocationPermission::Unknown => {
                        warn!(?permission, "location permission denied");
                        Err(LocationError::PermissionDenied)
                    }
                }
            }
            .await;
            context.update_app(make_event(result));
        });
    }

    /// One-shot read. Assumes access was granted.
    pub fn current_position<F>(&self, accuracy: LocationAccuracy, make_event: F)
    where
        F: FnOnce(Result<Position, LocationError>) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = match context
                .request_from_shell(LocationOperation::CurrentPosition { accuracy })
                .await
            {
                LocationOutput::Position(position) => Ok(position),
                LocationOutput::Failed(error) => Err(error),
                other => Err(unexpected(&other)),
            };
            context.update_app(make_event(result));
        });
    }

    /// Subscribes to the position stream. Fixes closer than
    /// `settings.min_distance_m` to the last one let through are dropped here
    /// even if the platform ignores the distance filter.
    pub fn watch<F>(&self, session: SessionId, settings: LocationSettings, make_event: F)
    where
        F: Fn(WatchUpdate) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let mut filter = DistanceFilter::new(settings.min_distance_m);
            let mut stream =
                context.stream_from_shell(LocationOperation::Watch { session, settings });

            while let Some(output) = stream.next().await {
                let update = match output {
                    LocationOutput::Position(position) => {
                        if !filter.admit(position) {
                            continue;
                        }
                        WatchUpdate::Fix(position)
                    }
                    LocationOutput::Failed(error) => WatchUpdate::Failed(error),
                    LocationOutput::StreamEnded => {
                        context.update_app(make_event(WatchUpdate::Ended));
                        break;
                    }
                    other => WatchUpdate::Failed(unexpected(&other)),
                };
                context.update_app(make_event(update));
            }
            debug!(session = %session, "position watch finished");
        });
    }

    pub fn stop_watching(&self, session: SessionId) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context
                .notify_shell(LocationOperation::StopWatching { session })
                .await;
        });
    }
}

/// Drops fixes closer than `min_distance_m` to the last fix let through.
/// With a zero distance duplicates pass too.
#[derive(Debug, Clone)]
pub struct DistanceFilter {
    min_distance_m: f64,
    last: Option<Geocoordinate>,
}

impl DistanceFilter {
    #[must_use]
    pub const fn new(min_distance_m: f64) -> Self {
        Self {
            min_distance_m,
            last: None,
        }
    }

    pub fn admit(&mut self, position: Position) -> bool {
        if let Some(prev) = self.last {
            if prev.distance_to(position.coordinate) < self.min_distance_m {
                return false;
            }
        }
        self.last = Some(position.coordinate);
        true
    }
}

/// Who is waiting on the permission handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWaiter {
    Locate(RequestId),
    Track(SessionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTicket {
    /// No handshake was running; the caller must start one.
    Start,
    /// A handshake is already running; its result covers this waiter too.
    Joined,
    Refused(LocationError),
}

/// Permission gate shared by the tracker and the search controller.
///
/// At most one handshake runs at a time, so the user sees at most one
/// dialog however many readers ask at once. A permanent denial is
/// remembered and answers every later request without prompting.
#[derive(Debug, Default)]
pub struct LocationAccess {
    waiters: Vec<AccessWaiter>,
    resolving: bool,
    denied_forever: bool,
}

impl LocationAccess {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_resolving(&self) -> bool {
        self.resolving
    }

    #[must_use]
    pub const fn is_denied_forever(&self) -> bool {
        self.denied_forever
    }

    pub fn join(&mut self, waiter: AccessWaiter) -> AccessTicket {
        if self.denied_forever {
            debug!(?waiter, "permission previously denied forever, not prompting");
            return AccessTicket::Refused(LocationError::PermissionDeniedForever);
        }
        self.waiters.push(waiter);
        if self.resolving {
            debug!(?waiter, "joining running permission handshake");
            return AccessTicket::Joined;
        }
        self.resolving = true;
        AccessTicket::Start
    }

    /// Joins the gate and starts the handshake when needed. An `Err` means
    /// the waiter was refused outright and will not be answered later.
    pub fn acquire(
        &mut self,
        waiter: AccessWaiter,
        location: &Location<Event>,
    ) -> Result<(), LocationError> {
        match self.join(waiter) {
            AccessTicket::Start => {
                location.ensure_access(|result| Event::LocationAccessResolved { result });
                Ok(())
            }
            AccessTicket::Joined => Ok(()),
            AccessTicket::Refused(error) => Err(error),
        }
    }

    /// Ends the running handshake and hands back everyone waiting on it.
    pub fn resolve(&mut self, result: &Result<(), LocationError>) -> Vec<AccessWaiter> {
        self.resolving = false;
        if result == &Err(LocationError::PermissionDeniedForever) {
            self.denied_forever = true;
        }
        std::mem::take(&mut self.waiters)
    }

    /// Forgets waiters without touching a running handshake.
    pub fn forget(&mut self, waiter: AccessWaiter) {
        self.waiters.retain(|w| *w != waiter);
    }
}
