pub mod health;
pub mod invitations;
pub mod widget;

pub use health::health;
pub use invitations::accept_invite;
pub use widget::get_widget_config;
