pub mod arrival;
pub mod publisher;
pub mod session;
pub mod subscriber;
