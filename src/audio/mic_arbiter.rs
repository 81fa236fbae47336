//! Mic arbiter: non-reentrant ownership of the physical microphone.
//!
//! Exactly one of `listen()` or the wake-word listener may hold the mic
//! at a time. `listen()` always wins: if the listener is mid-recording
//! when a blocking `listen()` arrives, it must yield before `listen()`
//! proceeds (spec.md §4.4/§4.5). There is no guaranteed wake coverage
//! while a `listen()` holds the mic — an explicit Non-goal.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Owner {
    Free = 0,
    WakeWord = 1,
    Listen = 2,
}

fn owner_from_u8(v: u8) -> Owner {
    match v {
        1 => Owner::WakeWord,
        2 => Owner::Listen,
        _ => Owner::Free,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenAcquire {
    Acquired,
    Busy,
}

/// Shared mic ownership token.
pub struct MicArbiter {
    owner: AtomicU8,
    yield_requested: AtomicBool,
    released: Notify,
}

impl MicArbiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            owner: AtomicU8::new(Owner::Free as u8),
            yield_requested: AtomicBool::new(false),
            released: Notify::new(),
        })
    }

    /// Wake-word listener claims the mic when it is free. Fails if
    /// `listen()` currently holds it.
    pub fn try_acquire_wake_word(&self) -> bool {
        self.owner
            .compare_exchange(
                Owner::Free as u8,
                Owner::WakeWord as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `listen()` takes priority over the wake-word listener, but two
    /// blocking `listen()` calls in the same process can't run at once.
    pub async fn acquire_for_listen(&self, yield_bound: std::time::Duration) -> ListenAcquire {
        if self
            .owner
            .compare_exchange(
                Owner::Free as u8,
                Owner::Listen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            return ListenAcquire::Acquired;
        }

        if owner_from_u8(self.owner.load(Ordering::Acquire)) == Owner::Listen {
            return ListenAcquire::Busy;
        }

        // Owner is the wake-word listener: ask it to yield, bounded.
        self.yield_requested.store(true, Ordering::Release);
        let _ = tokio::time::timeout(yield_bound, self.released.notified()).await;

        if self
            .owner
            .compare_exchange(
                Owner::Free as u8,
                Owner::Listen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.yield_requested.store(false, Ordering::Release);
        } else {
            // The listener didn't yield in time — there is no guaranteed
            // wake coverage while a listen() is in flight, so take over.
            self.owner.store(Owner::Listen as u8, Ordering::Release);
            self.yield_requested.store(false, Ordering::Release);
        }
        ListenAcquire::Acquired
    }

    pub fn release(&self) {
        self.owner.store(Owner::Free as u8, Ordering::Release);
        self.released.notify_waiters();
    }

    pub fn is_wake_word_owner(&self) -> bool {
        owner_from_u8(self.owner.load(Ordering::Acquire)) == Owner::WakeWord
    }

    pub fn is_free(&self) -> bool {
        owner_from_u8(self.owner.load(Ordering::Acquire)) == Owner::Free
    }

    /// The wake-word listener polls this during recording to notice a
    /// pending `listen()` and yield cooperatively.
    pub fn yield_requested(&self) -> bool {
        self.yield_requested.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_word_can_claim_free_mic() {
        let arbiter = MicArbiter::new();
        assert!(arbiter.try_acquire_wake_word());
        assert!(arbiter.is_wake_word_owner());
    }

    #[test]
    fn wake_word_cannot_claim_held_mic() {
        let arbiter = MicArbiter::new();
        assert!(arbiter.try_acquire_wake_word());
        assert!(!arbiter.try_acquire_wake_word());
    }

    #[tokio::test]
    async fn listen_acquires_free_mic_immediately() {
        let arbiter = MicArbiter::new();
        arbiter.acquire_for_listen().await;
        assert!(!arbiter.is_free());
    }

    #[tokio::test]
    async fn listen_waits_then_proceeds_after_release() {
        let arbiter = MicArbiter::new();
        assert!(arbiter.try_acquire_wake_word());
        let arbiter2 = Arc::clone(&arbiter);
        let handle = tokio::spawn(async move {
            arbiter2.acquire_for_listen().await;
        });
        tokio::task::yield_now().await;
        assert!(arbiter.yield_requested());
        arbiter.release();
        handle.await.unwrap();
        assert!(arbiter.yield_requested() == false || !arbiter.is_free());
    }
}
