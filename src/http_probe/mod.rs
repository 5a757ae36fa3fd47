pub mod error;
pub mod probe;
pub mod request;
pub mod trace;
pub mod transport;

use std::fmt::Write;
use std::time::Duration;

/// Sent on every probe request; callers cannot override it.
pub const USER_AGENT: &str = "MobileSafari/604.1 CFNetwork/978.0.7 Darwin/18.5.0";

/// Upper bound for a whole probe cycle, body read included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirect hops followed before the probe gives up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

pub mod prelude {
    pub use super::error::{ProbeError, ProbeFailure};
    pub use super::probe::probe;
    pub use super::request::ProbeRequest;
    pub use super::trace::{ProbeTrace, TraceEvent};
    pub use super::transport::ProbeTransport;
}

/// Renders an error with its whole `source()` chain.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}
