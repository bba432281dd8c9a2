pub mod logging;
pub mod poll;

pub use logging::init_logging;
pub use poll::{Liveness, PollTask};
