/// Application name
pub const APP_NAME: &str = "Dialtone";

/// Calling code assumed for local numbers when the host app supplies none (Bahrain)
pub const DEFAULT_COUNTRY_CODE: &str = "973";

/// Minimum digit count for a string to be considered a phone number
pub const MIN_PHONE_DIGITS: usize = 7;

/// Digit counts accepted as a bare local number
pub const LOCAL_NUMBER_DIGITS: std::ops::RangeInclusive<usize> = 7..=8;

/// International dialing prefix stripped before calling-code matching
pub const INTERNATIONAL_PREFIX: &str = "00";

/// Maximum values per directory query (fan-out limit of the backing store)
pub const DEFAULT_DIRECTORY_BATCH_SIZE: usize = 10;

/// Age after which a contact snapshot is re-synced, in seconds (5 minutes)
pub const DEFAULT_STALENESS_SECS: u64 = 300;
