pub mod chat;
pub mod check;
pub mod gateway;
pub mod onboard;
pub mod status;
pub mod sweep;
