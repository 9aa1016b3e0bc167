//=========================================================================
// Notice Queue
//=========================================================================
//
// Queue of bus notifications the state machine reacts to.
//
// Listeners only enqueue; the state machine drains the queue at the tick
// boundary, so no run state is ever changed from inside a dispatch.
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{unbounded, Receiver, Sender};

//=== Internal Dependencies ===============================================

use crate::core::event_bus::{EventPayload, Listener};
use crate::core::loader::ResourceId;

//=== Notice ==============================================================

/// A bus notification relevant to run-state decisions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notice {
    ContentReady(ResourceId),
    LoadFailed { resource: ResourceId, reason: String },
}

impl Notice {
    pub(crate) fn content_ready(payload: &EventPayload) -> Option<Self> {
        match payload {
            EventPayload::Resource(resource) => Some(Self::ContentReady(resource.clone())),
            _ => None,
        }
    }

    pub(crate) fn load_failed(payload: &EventPayload) -> Option<Self> {
        match payload {
            EventPayload::Failure { resource, reason } => Some(Self::LoadFailed {
                resource: resource.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

//=== NoticeQueue =========================================================

/// Multi-producer queue drained once per tick.
pub(crate) struct NoticeQueue {
    sender: Sender<Notice>,
    receiver: Receiver<Notice>,
}

impl NoticeQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Builds a listener that converts payloads with `convert` and
    /// enqueues the result. Payloads that do not convert are reported as
    /// listener failures.
    pub(crate) fn forwarder(&self, convert: fn(&EventPayload) -> Option<Notice>) -> Listener {
        let sender = self.sender.clone();
        Listener::new(move |payload| {
            let notice = convert(payload)
                .ok_or_else(|| format!("unexpected payload {:?}", payload))?;
            sender.send(notice)?;
            Ok(())
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Takes every queued notice, oldest first.
    pub(crate) fn take(&self) -> Vec<Notice> {
        self.receiver.try_iter().collect()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::{EventBus, EventKind};

    #[test]
    fn new_queue_is_empty() {
        let queue = NoticeQueue::new();
        assert!(queue.is_empty());
        assert!(queue.take().is_empty());
    }

    #[test]
    fn take_drains_in_fifo_order() {
        let queue = NoticeQueue::new();
        let listener = queue.forwarder(Notice::content_ready);
        let bus = EventBus::new();
        bus.subscribe(EventKind::ContentReady, &listener);
        bus.publish(EventKind::ContentReady, &EventPayload::Resource(ResourceId::new("A")));
        bus.publish(EventKind::ContentReady, &EventPayload::Resource(ResourceId::new("B")));
        assert!(!queue.is_empty());

        assert_eq!(
            queue.take(),
            vec![
                Notice::ContentReady(ResourceId::new("A")),
                Notice::ContentReady(ResourceId::new("B")),
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn forwarder_enqueues_converted_payloads() {
        let bus = EventBus::new();
        let queue = NoticeQueue::new();
        bus.subscribe(EventKind::ContentReady, &queue.forwarder(Notice::content_ready));
        bus.subscribe(EventKind::LoadFailed, &queue.forwarder(Notice::load_failed));

        bus.publish(
            EventKind::ContentReady,
            &EventPayload::Resource(ResourceId::new("GameScene")),
        );
        bus.publish(
            EventKind::LoadFailed,
            &EventPayload::Failure {
                resource: ResourceId::new("MainMenu"),
                reason: "disk".into(),
            },
        );

        assert_eq!(
            queue.take(),
            vec![
                Notice::ContentReady(ResourceId::new("GameScene")),
                Notice::LoadFailed {
                    resource: ResourceId::new("MainMenu"),
                    reason: "disk".into(),
                },
            ]
        );
    }

    #[test]
    fn forwarder_rejects_mismatched_payload() {
        let queue = NoticeQueue::new();
        let listener = queue.forwarder(Notice::content_ready);

        let bus = EventBus::new();
        bus.subscribe(EventKind::ContentReady, &listener);
        bus.publish(EventKind::ContentReady, &EventPayload::None);

        assert!(queue.is_empty());
    }
}
