// Communication channels lock-free

use crate::messaging::event::{AudioEvent, RendererEvent};
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type AudioEventProducer = ringbuf::HeapProd<AudioEvent>;
pub type AudioEventConsumer = ringbuf::HeapCons<AudioEvent>;

pub fn create_audio_event_channel(capacity: usize) -> (AudioEventProducer, AudioEventConsumer) {
    let rb = HeapRb::<AudioEvent>::new(capacity);
    rb.split()
}

pub type RendererEventProducer = ringbuf::HeapProd<RendererEvent>;
pub type RendererEventConsumer = ringbuf::HeapCons<RendererEvent>;

pub fn create_renderer_event_channel(
    capacity: usize,
) -> (RendererEventProducer, RendererEventConsumer) {
    let rb = HeapRb::<RendererEvent>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_audio_channel_order() {
        let (mut tx, mut rx) = create_audio_event_channel(4);
        tx.try_push(AudioEvent::TimeUpdate { seconds: 1.0 }).unwrap();
        tx.try_push(AudioEvent::Ended).unwrap();

        assert_eq!(rx.try_pop(), Some(AudioEvent::TimeUpdate { seconds: 1.0 }));
        assert_eq!(rx.try_pop(), Some(AudioEvent::Ended));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_channel_full() {
        let (mut tx, _rx) = create_audio_event_channel(1);
        assert!(tx.try_push(AudioEvent::Ended).is_ok());
        assert!(tx.try_push(AudioEvent::Ended).is_err());
    }
}
