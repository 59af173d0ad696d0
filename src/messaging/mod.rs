// Messaging - Inbound engine events and outbound notifications

pub mod channels;
pub mod event;
pub mod notification;

pub use channels::{
    AudioEventConsumer, AudioEventProducer, NotificationConsumer, NotificationProducer,
    RendererEventConsumer, RendererEventProducer, create_audio_event_channel,
    create_notification_channel, create_renderer_event_channel,
};
pub use event::{AudioEvent, LoadToken, LoadTracker, RendererEvent};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
