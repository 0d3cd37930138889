pub mod handlers;
pub mod session;
pub mod sms;

pub use session::{Session, SessionRegistry};
pub use sms::SmsCodes;
