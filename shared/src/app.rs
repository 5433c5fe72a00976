//! The core as a Crux app.
//!
//! User actions and capability completions arrive as [`Event`]s and are
//! applied one at a time by [`App::update`], so the map store is only ever
//! mutated from here. The shell renders whatever [`App::view`] derives.

use tracing::{debug, info, info_span, warn};

use crate::capabilities::location::{AccessWaiter, LocationAccess};
use crate::capabilities::search::SearchEndpoint;
use crate::capabilities::Capabilities;
use crate::config::AppConfig;
use crate::controller::SearchController;
use crate::error::{AppError, ConfigError};
use crate::event::Event;
use crate::geo::Geocoordinate;
use crate::map_state::{MapSnapshot, MapStateStore};
use crate::tracker::PositionTracker;
use crate::view::{CameraView, FilterView, ScreenState, StatusView, ViewModel};

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    target: Option<Geocoordinate>,
    zoom: f64,
    revision: u64,
}

impl Camera {
    fn new(zoom: f64) -> Self {
        Self {
            target: None,
            zoom,
            revision: 0,
        }
    }

    #[must_use]
    pub const fn target(&self) -> Option<Geocoordinate> {
        self.target
    }

    pub fn center_on(&mut self, target: Geocoordinate) {
        self.target = Some(target);
        self.revision += 1;
    }

    #[must_use]
    pub fn view(&self) -> CameraView {
        CameraView {
            target: self.target,
            zoom: self.zoom,
            revision: self.revision,
        }
    }
}

fn endpoint_for(config: &AppConfig) -> Result<SearchEndpoint, ConfigError> {
    config.validate()?;
    SearchEndpoint::from_config(&config.search)
}

#[derive(Debug)]
pub struct Model {
    pub config: AppConfig,
    pub store: MapStateStore,
    /// Permission gate shared by the tracker and the controller.
    pub access: LocationAccess,
    pub tracker: PositionTracker,
    pub controller: SearchController,
    pub camera: Camera,
    pub config_error: Option<AppError>,
    pub torn_down: bool,
}

impl Model {
    /// An invalid `config` leaves the model unable to fetch and shows the
    /// error screen.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        match endpoint_for(&config) {
            Ok(endpoint) => Self::build(config, Some(endpoint), None),
            Err(e) => {
                warn!(error = %e, "invalid configuration");
                Self::build(config, None, Some(e.into()))
            }
        }
    }

    fn build(
        config: AppConfig,
        endpoint: Option<SearchEndpoint>,
        config_error: Option<AppError>,
    ) -> Self {
        Self {
            store: MapStateStore::new(),
            access: LocationAccess::new(),
            tracker: PositionTracker::new(config.map.self_radius_m),
            controller: SearchController::new(
                config.search.clone(),
                endpoint,
                config.tracking.accuracy,
            ),
            camera: Camera::new(config.map.zoom()),
            config,
            config_error,
            torn_down: false,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MapSnapshot {
        self.store.snapshot()
    }

    /// Swaps in a new configuration. Running work is stopped; the map layers
    /// and id counters carry over so late completions stay recognisably stale.
    fn reconfigure(&mut self, config: AppConfig, caps: &Capabilities) {
        let endpoint = match endpoint_for(&config) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(error = %e, "rejected configuration");
                self.config_error = Some(e.into());
                return;
            }
        };

        self.tracker.stop(&mut self.access, caps);
        self.controller.cancel(&mut self.access, caps);
        self.controller.reconfigure(
            config.search.clone(),
            Some(endpoint),
            config.tracking.accuracy,
        );
        self.tracker.set_radius(config.map.self_radius_m);
        self.camera.zoom = config.map.zoom();
        self.config_error = None;
        info!(host = config.search.endpoint.as_str(), "configured");
        self.config = config;
    }

    fn wants_tracking_restart(&self) -> bool {
        !self.tracker.is_active() && !self.tracker.is_starting()
    }
}

/// Waits for the shell to send [`Event::Configure`] before it can fetch.
impl Default for Model {
    fn default() -> Self {
        Self::build(AppConfig::default(), None, None)
    }
}

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let _span = info_span!("event", name = event.name()).entered();

        if model.torn_down {
            debug!("core torn down, ignoring event");
            return;
        }
        debug!(user = event.is_user_initiated(), "processing event");

        match event {
            Event::Configure(config) => model.reconfigure(*config, caps),
            Event::Activate => {
                model.controller.activate(&mut model.access, caps);
                if model.config.map.track_on_activate && model.wants_tracking_restart() {
                    let tracking = model.config.tracking;
                    model.tracker.start(tracking, &mut model.access, caps);
                }
            }
            Event::StartTracking(config) => {
                let tracking = config.unwrap_or(model.config.tracking);
                model.tracker.start(tracking, &mut model.access, caps);
            }
            Event::StopTracking => model.tracker.stop(&mut model.access, caps),
            Event::SliderChanged { value } => model.controller.slider_changed(value),
            Event::ApplyFilter { value } => {
                model.controller.apply_filter(value, &mut model.access, caps);
            }
            Event::Recenter => {
                let target = model
                    .tracker
                    .last_position()
                    .or_else(|| model.controller.last_known_position());
                if let Some(position) = target {
                    model.camera.center_on(position.coordinate);
                }
                if model.controller.error().is_some() {
                    model.controller.retry(&mut model.access, caps);
                }
                if model.tracker.last_error().is_some() && model.wants_tracking_restart() {
                    let tracking = model.config.tracking;
                    model.tracker.start(tracking, &mut model.access, caps);
                }
            }
            Event::DismissError => {
                model.controller.clear_error();
                model.tracker.clear_error();
            }
            Event::Teardown => {
                model.tracker.stop(&mut model.access, caps);
                model.controller.cancel(&mut model.access, caps);
                model.torn_down = true;
                info!("core torn down");
            }

            Event::LocationAccessResolved { result } => {
                for waiter in model.access.resolve(&result) {
                    match waiter {
                        AccessWaiter::Locate(request) => {
                            model
                                .controller
                                .on_access_resolved(request, result.clone(), caps);
                        }
                        AccessWaiter::Track(session) => {
                            if let Some(opened) =
                                model.tracker.on_access_resolved(session, result.clone(), caps)
                            {
                                debug!(session = %opened, "tracking opened after access check");
                            }
                        }
                    }
                }
            }
            Event::PositionUpdated { session, position } => {
                if model
                    .tracker
                    .apply_position(session, position, &mut model.store)
                {
                    model.controller.note_position(position);
                    if model.camera.target().is_none() {
                        model.camera.center_on(position.coordinate);
                    }
                }
            }
            Event::PositionStreamFailed { session, error } => {
                model.tracker.on_stream_failed(session, error);
            }
            Event::PositionStreamEnded { session } => {
                model.tracker.on_stream_ended(session);
            }
            Event::LocationResolved { request, result } => {
                let located = result.as_ref().ok().map(|p| p.coordinate);
                if model.controller.on_location_resolved(request, result, caps) {
                    if let Some(at) = located {
                        if model.camera.target().is_none() {
                            model.camera.center_on(at);
                        }
                    }
                }
            }
            Event::FetchCompleted { request, result } => {
                model
                    .controller
                    .on_fetch_completed(request, result, &mut model.store, caps);
            }
            Event::FetchDeadlineElapsed { request } => {
                model.controller.on_fetch_deadline(request);
            }
            Event::FilterDebounceElapsed { ticket } => {
                model
                    .controller
                    .on_debounce_elapsed(ticket, &mut model.access, caps);
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let controller = &model.controller;
        let tracker = &model.tracker;

        let screen = if let Some(error) = &model.config_error {
            ScreenState::Error {
                message: error.user_facing_message(),
                is_retryable: false,
            }
        } else if controller.has_loaded() {
            let snapshot = model.store.snapshot();
            ScreenState::Map {
                markers: snapshot.markers,
                circles: snapshot.circles,
                camera: model.camera.view(),
            }
        } else if let Some(error) = controller.error() {
            ScreenState::Error {
                message: error.user_facing_message(),
                is_retryable: error.is_retryable(),
            }
        } else {
            ScreenState::Loading
        };

        let error = model
            .config_error
            .as_ref()
            .or_else(|| controller.error())
            .or_else(|| tracker.last_error());
        let filter = controller.filter();

        ViewModel {
            screen,
            status: StatusView {
                is_loading: controller.is_loading(),
                error_message: error.map(AppError::user_facing_message),
                error_code: error.map(|e| e.code().to_string()),
            },
            filter: FilterView::new(filter.pending(), filter.committed()),
            tracking_active: tracker.is_active(),
        }
    }
}
