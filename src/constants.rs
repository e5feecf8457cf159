// -
// Identity defaults

/// Namespace used when the caller supplies none
pub const DEFAULT_NAMESPACE: &str = "public";

/// Group used by callers that do not partition their configuration
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Fingerprint of absent content. Never a valid MD5 hex digest.
pub const NULL_FINGERPRINT: &str = "";

/// Separator between the components of an encoded server group key
pub(crate) const GROUP_KEY_SEPARATOR: char = '+';

// -
// Content types

pub const CONTENT_TYPE_TEXT: &str = "text";
pub const CONTENT_TYPE_PROPERTIES: &str = "properties";
pub const CONTENT_TYPE_YAML: &str = "yaml";
pub const CONTENT_TYPE_YML: &str = "yml";
pub const CONTENT_TYPE_JSON: &str = "json";
pub const CONTENT_TYPE_TOML: &str = "toml";

// -
// Local store layout

pub(crate) const FAILOVER_DIR: &str = "failover";
pub(crate) const SNAPSHOT_DIR: &str = "snapshot";

/// Timestamp stored while no local override is active
pub const LOCAL_OVERRIDE_DISABLED: i64 = -1;
