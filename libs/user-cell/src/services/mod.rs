pub mod password;
pub mod store;
pub mod user;

pub use user::UserService;
