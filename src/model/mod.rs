pub mod biometric;
pub mod notification;
pub mod role;
pub mod session;
pub mod shift;
