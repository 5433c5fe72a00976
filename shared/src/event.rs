use serde::{Deserialize, Serialize};

use crate::capabilities::location::{LocationError, Position};
use crate::capabilities::search::FetchResult;
use crate::capabilities::timer::TimerId;
use crate::config::{AppConfig, TrackingConfig};
use crate::controller::RequestId;
use crate::tracker::SessionId;

/// Everything the core reacts to, in queue order.
///
/// The shell only ever sends the user-facing variants. The rest are posted by
/// capabilities and carry the session or request id that produced them so
/// stale ones can be told apart from current ones.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Event {
    Configure(Box<AppConfig>),
    Activate,
    /// `None` uses the configured tracking settings.
    StartTracking(Option<TrackingConfig>),
    StopTracking,
    SliderChanged {
        value: f64,
    },
    ApplyFilter {
        value: f64,
    },
    Recenter,
    DismissError,
    Teardown,

    #[serde(skip)]
    LocationAccessResolved {
        result: Result<(), LocationError>,
    },
    #[serde(skip)]
    PositionUpdated {
        session: SessionId,
        position: Position,
    },
    #[serde(skip)]
    PositionStreamFailed {
        session: SessionId,
        error: LocationError,
    },
    #[serde(skip)]
    PositionStreamEnded {
        session: SessionId,
    },
    #[serde(skip)]
    LocationResolved {
        request: RequestId,
        result: Result<Position, LocationError>,
    },
    #[serde(skip)]
    FetchCompleted {
        request: RequestId,
        result: FetchResult,
    },
    #[serde(skip)]
    FetchDeadlineElapsed {
        request: RequestId,
    },
    #[serde(skip)]
    FilterDebounceElapsed {
        ticket: TimerId,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::Activate => "activate",
            Self::StartTracking(_) => "start_tracking",
            Self::StopTracking => "stop_tracking",
            Self::SliderChanged { .. } => "slider_changed",
            Self::ApplyFilter { .. } => "apply_filter",
            Self::Recenter => "recenter",
            Self::DismissError => "dismiss_error",
            Self::Teardown => "teardown",
            Self::LocationAccessResolved { .. } => "location_access_resolved",
            Self::PositionUpdated { .. } => "position_updated",
            Self::PositionStreamFailed { .. } => "position_stream_failed",
            Self::PositionStreamEnded { .. } => "position_stream_ended",
            Self::LocationResolved { .. } => "location_resolved",
            Self::FetchCompleted { .. } => "fetch_completed",
            Self::FetchDeadlineElapsed { .. } => "fetch_deadline_elapsed",
            Self::FilterDebounceElapsed { .. } => "filter_debounce_elapsed",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::Activate
                | Self::StartTracking(_)
                | Self::StopTracking
                | Self::SliderChanged { .. }
                | Self::ApplyFilter { .. }
                | Self::Recenter
                | Self::DismissError
                | Self::Teardown
        )
    }
}
