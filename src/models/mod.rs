pub mod enums;
pub mod event;
pub mod exception;
pub mod patient;
pub mod pricing;
pub mod schedule;

pub use enums::*;
pub use event::*;
pub use exception::*;
pub use patient::*;
pub use pricing::*;
pub use schedule::*;
