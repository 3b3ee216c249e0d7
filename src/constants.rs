/// Expected schema version for the session store
/// Both backends must use this version for compatibility
pub const EXPECTED_DB_VERSION: &str = "1";

/// Maximum accepted upload size in bytes (500 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Extension assumed for uploads that carry no usable file name or content type
pub const DEFAULT_VIDEO_EXTENSION: &str = "webm";

/// Delay between attempts to take the advisory write lock (flat-file backend)
pub const LOCK_RETRY_DELAY_MS: u64 = 20;

/// Attempts before a contended advisory write lock gives up with LockTimeout
pub const LOCK_RETRY_ATTEMPTS: u32 = 50;
