/// Every job is addressed by a UUID, whether derived or randomly generated.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
