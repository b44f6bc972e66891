pub mod identity;
pub mod notifier;
pub mod otp;
