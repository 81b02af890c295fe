pub mod courier;
pub mod dispatch;
pub mod earning;
pub mod notification;
pub mod order;
pub mod restaurant;
