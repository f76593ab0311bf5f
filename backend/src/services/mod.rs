//! Business logic services
//!
//! Services encapsulate business logic and coordinate between
//! repositories, the token service and the mailer.

pub mod dashboard;
pub mod source;
pub mod user;

pub use dashboard::DashboardService;
pub use source::SourceService;
pub use user::UserService;
