//! Identity API defaults

use std::time::Duration;

/// Identity API used when no endpoint is configured
pub const DEFAULT_ENDPOINT: &str = "https://api.travis-ci.org";

/// Media type sent in the `Accept` header of the user lookup
pub const DEFAULT_ACCEPT: &str = "application/vnd.travis-ci.2+json";

/// Upper bound for a single user lookup. The identity API is called inline
/// with the browser request, so a hung endpoint must not hold it forever.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status used when a failure carries no recognizable 40x code
pub const DEFAULT_FAILURE_STATUS: u16 = 403;
