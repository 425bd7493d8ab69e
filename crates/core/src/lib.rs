pub mod normalize;
pub mod transaction;
pub mod window;

pub use normalize::{normalize, title_case};
pub use transaction::{Direction, Transaction};
pub use window::DayWindow;
