use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{ChallengeStatus, MonthlyGoals};

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    MonthlyGoalsUpdated { year: i32 },
    ChallengeStatusChanged { id: Uuid, status: ChallengeStatus },
    WeeklyRecordUpserted { employee_id: Uuid, week_ending: NaiveDate },
}

/// Process-wide publish/subscribe channel. Every subscriber re-derives its own
/// view when an event arrives.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: DashboardEvent) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "dashboard event published"),
            // no subscribers is fine
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(?event, "dashboard event dropped, no subscribers")
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Postgres channel carrying goal updates between processes.
pub const NOTIFY_CHANNEL: &str = "sales_ops_events";

const GOALS_PREFIX: &str = "monthly_goals:";

pub fn goals_notification(year: i32) -> String {
    format!("{GOALS_PREFIX}{year}")
}

pub fn parse_notification(payload: &str) -> Option<DashboardEvent> {
    let year = payload.strip_prefix(GOALS_PREFIX)?.trim().parse().ok()?;
    Some(DashboardEvent::MonthlyGoalsUpdated { year })
}

/// Forwards `NOTIFY` payloads from other processes onto the local bus.
pub async fn spawn_relay(
    pool: &PgPool,
    bus: EventBus,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTIFY_CHANNEL).await?;

    Ok(tokio::spawn(async move {
        loop {
            match listener.recv().await {
                Ok(notification) => match parse_notification(notification.payload()) {
                    Some(event) => bus.publish(event),
                    None => tracing::warn!(payload = notification.payload(), "ignoring unknown notification"),
                },
                Err(err) => {
                    tracing::error!(error = %err, "notification listener stopped");
                    break;
                }
            }
        }
    }))
}

#[derive(Clone, Default)]
pub struct GoalCache {
    entries: Arc<Mutex<HashMap<i32, MonthlyGoals>>>,
}

impl GoalCache {
    pub fn get(&self, year: i32) -> Option<MonthlyGoals> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&year).cloned())
    }

    pub fn insert(&self, goals: MonthlyGoals) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(goals.year, goals);
        }
    }

    /// Returns true when a cached entry was dropped.
    pub fn apply(&self, event: &DashboardEvent) -> bool {
        let DashboardEvent::MonthlyGoalsUpdated { year } = event else {
            return false;
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.remove(year).is_some(),
            Err(_) => false,
        }
    }

    /// Drains `receiver` until the bus closes, invalidating entries as goal
    /// updates arrive.
    pub fn spawn_invalidator(
        &self,
        mut receiver: broadcast::Receiver<DashboardEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if cache.apply(&event) {
                            tracing::info!(?event, "monthly goal cache invalidated");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "goal cache lagged, clearing all entries");
                        if let Ok(mut entries) = cache.entries.lock() {
                            entries.clear();
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::default();
        bus.publish(DashboardEvent::MonthlyGoalsUpdated { year: 2026 });
    }

    #[test]
    fn goal_update_invalidates_only_that_year() {
        let cache = GoalCache::default();
        cache.insert(MonthlyGoals::with_default(2025, 10.0));
        cache.insert(MonthlyGoals::with_default(2026, 10.0));

        assert!(cache.apply(&DashboardEvent::MonthlyGoalsUpdated { year: 2026 }));
        assert!(cache.get(2026).is_none());
        assert!(cache.get(2025).is_some());
        assert!(!cache.apply(&DashboardEvent::ChallengeStatusChanged {
            id: Uuid::new_v4(),
            status: ChallengeStatus::Expired,
        }));
    }

    #[test]
    fn goal_notifications_parse_back_to_events() {
        assert_eq!(
            parse_notification(&goals_notification(2027)),
            Some(DashboardEvent::MonthlyGoalsUpdated { year: 2027 })
        );
        assert_eq!(parse_notification("monthly_goals:soon"), None);
        assert_eq!(parse_notification("weights:2027"), None);
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.publish(DashboardEvent::MonthlyGoalsUpdated { year: 2026 });

        assert_eq!(
            first.recv().await.unwrap(),
            DashboardEvent::MonthlyGoalsUpdated { year: 2026 }
        );
        assert_eq!(
            second.recv().await.unwrap(),
            DashboardEvent::MonthlyGoalsUpdated { year: 2026 }
        );
    }

    #[tokio::test]
    async fn invalidator_task_drops_cached_year() {
        let bus = EventBus::new(8);
        let cache = GoalCache::default();
        cache.insert(MonthlyGoals::with_default(2026, 10.0));
        let handle = cache.spawn_invalidator(bus.subscribe());

        bus.publish(DashboardEvent::MonthlyGoalsUpdated { year: 2026 });
        drop(bus);
        handle.await.unwrap();

        assert!(cache.get(2026).is_none());
    }
}
