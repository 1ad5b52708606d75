pub mod dashboard;
pub mod reset;
pub mod source;
pub mod user;

pub use dashboard::DashboardRepository;
pub use reset::ResetRepository;
pub use source::SourceRepository;
pub use user::UserRepository;
