//! 状态同步通道
//!
//! 控制器向任意数量的观察者广播 [`PlayerEvent`]。发布从不阻塞：每个订阅者拥有独立的
//! 有界队列，队列满时丢弃该订阅者的本次事件，断开的订阅者在下次发布时移除。
//! 晚到的观察者通过 [`SyncChannel::request_snapshot`] 拉取当前快照。

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::command::{PlayerEvent, Snapshot};
use crate::sleep_timer::SleepTimerStatus;

/// 每个订阅者的默认队列容量
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// 订阅编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 观察者持有的订阅
pub struct Subscription {
    id: SubscriptionId,
    rx: Receiver<PlayerEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn receiver(&self) -> &Receiver<PlayerEvent> {
        &self.rx
    }

    pub fn try_recv(&self) -> Option<PlayerEvent> {
        self.rx.try_recv().ok()
    }

    /// 等待下一个事件；超时返回 `None`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PlayerEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// 取出所有已到达的事件
    pub fn drain(&self) -> Vec<PlayerEvent> {
        self.rx.try_iter().collect()
    }
}

struct Subscriber {
    id: SubscriptionId,
    tx: Sender<PlayerEvent>,
}

#[derive(Default)]
struct Inner {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    latest: Snapshot,
    sleep_timer: SleepTimerStatus,
}

/// 一对多事件通道，克隆体共享同一订阅表
#[derive(Clone)]
pub struct SyncChannel {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

impl SyncChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(self.capacity);
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscribers.push(Subscriber { id, tx });
        debug!("sync: subscriber {:?} attached", id);
        Subscription { id, rx }
    }

    /// 取消订阅，返回该订阅此前是否存在
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        before != inner.subscribers.len()
    }

    /// 发布事件，返回成功投递的订阅者数量
    pub fn publish(&self, event: PlayerEvent) -> usize {
        let mut inner = self.inner.lock();

        match &event {
            PlayerEvent::StateChanged(snapshot) => inner.latest = snapshot.clone(),
            PlayerEvent::SleepTimer(status) => inner.sleep_timer = *status,
            PlayerEvent::Error(_) => {}
        }

        let mut delivered = 0;
        inner
            .subscribers
            .retain(|sub| match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!("sync: subscriber {:?} queue full, event dropped", sub.id);
                    true
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("sync: subscriber {:?} detached", sub.id);
                    false
                }
            });
        delivered
    }

    /// 最近一次发布的播放快照
    pub fn request_snapshot(&self) -> Snapshot {
        self.inner.lock().latest.clone()
    }

    /// 最近一次发布的睡眠定时器状态
    pub fn sleep_timer_status(&self) -> SleepTimerStatus {
        self.inner.lock().sleep_timer
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for SyncChannel {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_catalog::SoundKey;

    fn state(playing: bool, key: &str) -> PlayerEvent {
        PlayerEvent::StateChanged(Snapshot {
            playing,
            active_sound: Some(SoundKey::from(key)),
        })
    }

    #[test]
    fn test_fan_out_in_order() {
        let channel = SyncChannel::default();
        let a = channel.subscribe();
        let b = channel.subscribe();

        channel.publish(state(true, "ocean"));
        channel.publish(state(false, "ocean"));
        channel.publish(state(true, "rain"));

        let expected = vec![state(true, "ocean"), state(false, "ocean"), state(true, "rain")];
        assert_eq!(a.drain(), expected);
        assert_eq!(b.drain(), expected);
    }

    #[test]
    fn test_late_subscriber_pulls_latest() {
        let channel = SyncChannel::default();
        channel.publish(state(true, "ocean"));
        channel.publish(state(false, "ocean"));
        channel.publish(state(true, "brown"));

        let late = channel.subscribe();
        assert!(late.try_recv().is_none());
        assert_eq!(
            channel.request_snapshot(),
            Snapshot {
                playing: true,
                active_sound: Some(SoundKey::from("brown")),
            }
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let channel = SyncChannel::default();
        let sub = channel.subscribe();
        assert!(channel.unsubscribe(sub.id()));
        assert!(!channel.unsubscribe(sub.id()));

        assert_eq!(channel.publish(state(true, "rain")), 0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_full_queue_does_not_block() {
        let channel = SyncChannel::new(2);
        let slow = channel.subscribe();
        let fast = channel.subscribe();

        for _ in 0..5 {
            channel.publish(state(true, "ocean"));
            fast.drain();
        }

        assert_eq!(slow.drain().len(), 2);
        assert_eq!(channel.subscriber_count(), 2);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let channel = SyncChannel::default();
        let keep = channel.subscribe();
        drop(channel.subscribe());

        assert_eq!(channel.publish(state(false, "rain")), 1);
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(keep.drain().len(), 1);
    }

    #[test]
    fn test_sleep_timer_status_cached() {
        let channel = SyncChannel::default();
        let status = SleepTimerStatus {
            armed: true,
            remaining_seconds: 42,
        };
        channel.publish(PlayerEvent::SleepTimer(status));
        assert_eq!(channel.sleep_timer_status(), status);
        // 睡眠事件不影响播放快照
        assert_eq!(channel.request_snapshot(), Snapshot::default());
    }
}
