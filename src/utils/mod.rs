// Utils compartidos

pub mod clock;
pub mod constants;
pub mod dates;
pub mod process_status;
pub mod scheduler;
pub mod storage;
pub mod table;

pub use clock::{system_clock, Clock, ManualClock, SharedClock};
pub use constants::*;
pub use scheduler::{Spawner, TimerHandle, Timers};
