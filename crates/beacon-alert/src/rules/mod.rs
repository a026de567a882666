pub mod dead_app;
pub mod digest;
pub mod event_push;
pub mod new_value;
pub mod threshold;
pub mod volume_anomaly;

pub use dead_app::DeadAppEvaluator;
pub use digest::DigestEvaluator;
pub use event_push::EventPushEvaluator;
pub use new_value::NewValueEvaluator;
pub use threshold::ThresholdEvaluator;
pub use volume_anomaly::{detect_anomaly, Anomaly, Direction, VolumeAnomalyEvaluator};

/// Lookback for the five-minute event rules.
pub const RECENT_WINDOW_MINUTES: i64 = 5;

/// Dedup window for once-a-day alerts.
pub const DAILY_DEDUP_MINUTES: u32 = 1440;
