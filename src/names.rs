pub const API_PREFIX: &str = "/api/v1";
pub const HEALTH_URL: &str = "/health";

pub const DEVICE_ID_HEADER: &str = "x-device-id";

// Pagination
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_LOG_PAGE_SIZE: i64 = 20;

// Random practice
pub const DEFAULT_RANDOM_COUNT: i64 = 10;
pub const MAX_RANDOM_COUNT: i64 = 50;

/// Users who answered within this many days count as active.
pub const ACTIVE_USER_DAYS: i64 = 7;

// Operation log vocabulary
pub const ACTION_LOGIN: &str = "LOGIN";
pub const ACTION_CREATE: &str = "CREATE";
pub const ACTION_UPDATE: &str = "UPDATE";
pub const ACTION_DELETE: &str = "DELETE";
pub const ACTION_IMPORT: &str = "IMPORT";
pub const ACTION_EXPORT: &str = "EXPORT";

pub const RESOURCE_ADMIN: &str = "ADMIN";
pub const RESOURCE_USER: &str = "USER";
pub const RESOURCE_CATEGORY: &str = "CATEGORY";
pub const RESOURCE_QUESTION: &str = "QUESTION";
pub const RESOURCE_SETTINGS: &str = "SETTINGS";
