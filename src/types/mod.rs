//! Small value types shared by the configuration and the stream layers.

mod update_rate;

pub use update_rate::UpdateRate;
