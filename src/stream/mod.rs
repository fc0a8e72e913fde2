//! Stream combinators used by the telemetry consumers.

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
