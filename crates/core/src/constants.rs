/// Canonical production host of the trial service
pub const CANONICAL_HOST: &str = "ugphone.com";

/// Hosts the acquisition workflow may run against
pub const ALLOWED_HOSTS: [&str; 2] = [CANONICAL_HOST, "www.ugphone.com"];

/// Default API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://www.ugphone.com/api/apiv1";

/// Session store key holding the composite `{access_token, login_id}` record
pub const SESSION_RECORD_KEY: &str = "UGPHONE-MQTT";

/// Session keys carried by an exported session bundle, in export order
pub const SESSION_BUNDLE_KEYS: [&str; 8] = [
    "ugPhoneLang",
    "ugBrowserId",
    "UGPHONE-ID",
    "UGrightSlideTips",
    "hadAgreePolicy",
    "_gcl_ls",
    "UGPHONE-Token",
    SESSION_RECORD_KEY,
];

/// Payment response code that marks a purchase as completed
pub const PAYMENT_SUCCESS_CODE: i64 = 200;
