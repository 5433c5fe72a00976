pub mod http;
pub mod location;
pub mod search;
pub mod timer;

pub use self::http::{HttpError, ValidatedUrl};
pub use self::location::{
    AccessTicket, AccessWaiter, DistanceFilter, LocationAccess, LocationAccuracy, LocationError,
    LocationOperation, LocationOutput, LocationPermission, LocationSettings, Position,
    WatchUpdate,
};
pub use self::search::{read_response, FetchError, FetchResult, SearchEndpoint};
pub use self::location::Location;
pub use self::timer::{Timer, TimerId, TimerOperation, TimerOutput};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

/// Everything the core asks of the shell. Each field becomes one `Effect`
/// variant.
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub location: Location<Event>,
    pub timer: Timer<Event>,
}
