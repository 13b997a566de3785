mod handle;
mod launcher;
mod registry;
mod ticker;
mod view;
mod worker;

// Public API of the live workout runtime.
pub use crate::error::SessionError;
pub use handle::WorkoutSessionHandle;
pub use launcher::WorkoutService;
pub use ticker::SessionTicker;
pub use view::{Confirmation, SetCompletion, WorkoutNotice, WorkoutView};
