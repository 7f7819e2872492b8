mod notifications;
pub use notifications::{NotificationItem, NotificationsAck};

mod progress;
pub use progress::ModuleCompletionResponse;
