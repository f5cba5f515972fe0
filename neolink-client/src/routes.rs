//! Fixed NeoSync routes, relative to the configured base URL.

pub const PING: &str = "api/ping";

pub const REGISTER: &str = "api/v1/device/register/";
pub const RESULTS: &str = "api/v1/device/results/";
pub const METRICS_SEND: &str = "api/v1/device/metrics/send";
pub const LOGS_UPLOAD: &str = "api/v1/device/logs/upload";
pub const FIRMWARE_CHECK_FOR_UPDATE: &str = "api/v1/device/firmware/check-for-update";

pub const VENDOR_KEY_HEADER: &str = "Vendor-Key";
pub const SITE_CODE_HEADER: &str = "Site-Code";
