//! Background resync task.
//!
//! Ticks the presence engine on a fixed schedule. Each tick re-announces
//! local presence and expires members that have gone silent.

use std::sync::Arc;

use chat_core::{Event, ResyncSchedule};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::session::Shared;
use crate::transport::{Transport, TransportError};

/// Spawn the resync task for a session.
///
/// Returns a handle that can be used to abort the task. A zero interval
/// disables resync.
pub(crate) fn spawn_resync_task<T>(
    shared: Arc<Shared<T>>,
    schedule: ResyncSchedule,
) -> JoinHandle<()>
where
    T: Transport + 'static,
{
    tokio::spawn(async move {
        if schedule.interval().is_zero() {
            tracing::info!("Resync disabled");
            return;
        }

        tracing::info!(
            "Resync started (interval: {:?}, first in {:?})",
            schedule.interval(),
            schedule.first_delay()
        );

        let start = Instant::now() + schedule.first_delay();
        let mut timer = interval_at(start, schedule.interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            tracing::debug!("Resync tick");

            match shared.dispatch(Event::ResyncTick).await {
                Ok(()) => {}
                Err(TransportError::Closed) => {
                    tracing::debug!("Transport closed, resync stopping");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Resync announce failed: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionOptions;
    use crate::session::ChatSession;
    use crate::transport::MockTransport;
    use chat_types::MemberName;
    use std::time::Duration;

    fn options(interval: Duration) -> SessionOptions {
        SessionOptions {
            resync: ResyncSchedule::fixed(interval),
            leave_grace: Duration::ZERO,
            member_ttl_ticks: 3,
            loopback: true,
        }
    }

    fn announcements(transport: &MockTransport) -> usize {
        transport
            .sent_lines()
            .iter()
            .filter(|line| *line == "SYSTEM: CONNECTED: me")
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn resync_reannounces_each_interval() {
        let transport = MockTransport::new();
        let (session, _events) = ChatSession::start(
            MemberName::new("me").unwrap(),
            transport.clone(),
            options(Duration::from_secs(5)),
        );

        session.join().await.unwrap();
        assert_eq!(announcements(&transport), 1);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(announcements(&transport), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(announcements(&transport), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_stops_after_leave() {
        let transport = MockTransport::new();
        let (session, _events) = ChatSession::start(
            MemberName::new("me").unwrap(),
            transport.clone(),
            options(Duration::from_secs(1)),
        );

        session.join().await.unwrap();
        session.leave().await.unwrap();
        let sent = transport.sent_messages().len();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.sent_messages().len(), sent);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_disables_resync() {
        let transport = MockTransport::new();
        let (session, _events) = ChatSession::start(
            MemberName::new("me").unwrap(),
            transport.clone(),
            options(Duration::ZERO),
        );

        session.join().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(announcements(&transport), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_survives_send_failure() {
        let transport = MockTransport::new();
        let (session, _events) = ChatSession::start(
            MemberName::new("me").unwrap(),
            transport.clone(),
            options(Duration::from_secs(1)),
        );

        session.join().await.unwrap();
        transport.fail_next_send("buffer full");

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        // First tick failed, second got through
        assert_eq!(announcements(&transport), 2);
    }
}
