use std::{future::Future, time::Duration};

use tokio::{task::JoinHandle, time::Instant};

use crate::state::poll::PollId;

/// Identifies one arming of the deadline timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug)]
struct ArmedTimer {
    token: TimerToken,
    poll_id: PollId,
    handle: JoinHandle<()>,
}

/// Single-shot deadline timer for the live poll. At most one timer is armed at a time.
#[derive(Debug, Default)]
pub struct DeadlineScheduler {
    next_token: u64,
    armed: Option<ArmedTimer>,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `poll_id` firing `on_fire` after `after`, cancelling any previous one.
    pub fn arm<F, Fut>(&mut self, poll_id: PollId, after: Duration, on_fire: F) -> TimerToken
    where
        F: FnOnce(PollId, TimerToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.armed.take() {
            previous.handle.abort();
        }

        self.next_token += 1;
        let token = TimerToken(self.next_token);
        let deadline = Instant::now() + after;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire(poll_id, token).await;
        });

        self.armed = Some(ArmedTimer {
            token,
            poll_id,
            handle,
        });
        token
    }

    /// Cancel the timer armed with `token`. Safe on fired or already cancelled tokens.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        match self.armed.take() {
            Some(armed) if armed.token == token => {
                armed.handle.abort();
                true
            }
            other => {
                self.armed = other;
                false
            }
        }
    }

    /// Cancel whatever timer is armed.
    pub fn cancel_armed(&mut self) -> bool {
        match self.armed_token() {
            Some(token) => self.cancel(token),
            None => false,
        }
    }

    /// Disarm `token` from inside its own firing task, without aborting it.
    pub fn release(&mut self, token: TimerToken) -> bool {
        match self.armed.take() {
            Some(armed) if armed.token == token => true,
            other => {
                self.armed = other;
                false
            }
        }
    }

    /// Whether `token` is the live timer armed for `poll_id`.
    pub fn is_armed(&self, poll_id: PollId, token: TimerToken) -> bool {
        self.armed
            .as_ref()
            .is_some_and(|armed| armed.token == token && armed.poll_id == poll_id)
    }

    pub fn armed_token(&self) -> Option<TimerToken> {
        self.armed.as_ref().map(|armed| armed.token)
    }
}

impl Drop for DeadlineScheduler {
    fn drop(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.handle.abort();
        }
    }
}
