// ============================================================================
// Configuration Constants
// ============================================================================

// Default port values
pub(crate) const DEFAULT_PORT: u16 = 8080;

// Scheduler intervals (in milliseconds)
pub(crate) const DEFAULT_FOLLOW_SCORES_INTERVAL_MS: u64 = 60 * 60 * 1000;
pub(crate) const DEFAULT_AUTO_FOLLOW_INDEX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

// Follow health scores
pub(crate) const DEFAULT_FOLLOW_SCORE_MIN: i64 = 0;
pub(crate) const DEFAULT_FOLLOW_SCORE_MAX: i64 = 10000;
pub(crate) const DEFAULT_FOLLOW_SCORE_FLOOR: i64 = 0;
pub(crate) const DEFAULT_FOLLOW_SCORE_PENALTY: i64 = -10;
pub(crate) const DEFAULT_FOLLOW_SCORE_BONUS: i64 = 10;

// Discovery index
pub(crate) const DEFAULT_AUTO_FOLLOW_INDEX_URL: &str =
    "https://instances.joinpeertube.org/api/v1/instances/hosts";

/// Maximum number of hosts requested from the discovery index per tick
pub const AUTO_FOLLOW_INDEX_PAGE_SIZE: usize = 1000;

/// Number of hosts checked against the follow table per query
pub const AUTO_FOLLOW_BATCH_SIZE: usize = 20;

// HTTP signatures
/// Clock skew applied when none is configured (matches the usual draft
/// signature library default of five minutes)
pub const DEFAULT_HTTP_SIGNATURE_CLOCK_SKEW_SECS: u64 = 300;

// Federation identity
pub(crate) const DEFAULT_SERVER_ACTOR_NAME: &str = "peertube";

// Job queue
pub(crate) const DEFAULT_JOB_STREAM_PREFIX: &str = "jobs:";
pub(crate) const DEFAULT_JOB_STREAM_MAX_LEN: usize = 10000;
