use std::time::Duration;

/// Application name
pub const APP_NAME: &str = "rasman";

/// API base URL used when nothing is configured
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Directory category id meaning "no category"
pub const UNCATEGORIZED_ID: i64 = 0;

/// Display name of the reserved category
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";

/// Timeout for plain reads (lists, counts, version)
pub const READ_TIMEOUT: Duration = Duration::from_millis(3_500);

/// Timeout for account writes and instant messages
pub const ACCOUNT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for chat room and directory calls
pub const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-stat timeout on the dashboard
pub const DASHBOARD_STAT_TIMEOUT: Duration = Duration::from_secs(4);

/// Grace period before the dashboard forces lingering stats into error
pub const DASHBOARD_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Timeout of the single best-effort dashboard retry
pub const DASHBOARD_RETRY_TIMEOUT: Duration = Duration::from_secs(3);

/// Session list auto-refresh interval
pub const SESSION_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Placeholder for version fields the server did not report
pub const UNKNOWN: &str = "Unknown";
