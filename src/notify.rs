//! Activity feed and desktop notification fan-out.

use crate::messaging::{EventBus, HudEvent};
use crate::team::{Color, TeamId, RED, WHITE, YELLOW};

/// Publishes feed lines on the bus and mirrors them to the log.
#[derive(Clone, Default)]
pub struct Notifier {
    bus: EventBus,
}

impl Notifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Feed line attributed to `team`, in the team's color.
    pub fn feed(&self, team: TeamId, color: Color, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("[{}] {}", team.title(), message);
        self.publish(team, color, message);
    }

    pub fn system(&self, message: impl Into<String>) {
        self.feed(TeamId::Game, WHITE, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.publish(TeamId::Game, YELLOW, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.publish(TeamId::Game, RED, message);
    }

    pub fn desktop(&self, title: impl Into<String>, body: impl Into<String>) {
        let (title, body) = (title.into(), body.into());
        tracing::debug!("Desktop notification: {} - {}", title, body);
        self.bus.publish(HudEvent::Desktop { title, body });
    }

    fn publish(&self, team: TeamId, color: Color, message: String) {
        self.bus.publish(HudEvent::Feed {
            team,
            color,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::PURPLE;

    #[test]
    fn test_feed_and_warn_reach_subscribers() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let notifier = Notifier::new(bus);

        notifier.feed(TeamId::Purple, PURPLE, "+12");
        notifier.warn("Potential score miss");

        assert_eq!(
            rx.try_recv().unwrap(),
            HudEvent::Feed {
                team: TeamId::Purple,
                color: PURPLE,
                message: "+12".into()
            }
        );
        match rx.try_recv().unwrap() {
            HudEvent::Feed { color, .. } => assert_eq!(color, YELLOW),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_desktop() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        Notifier::new(bus).desktop("Match Starting", "Good luck");
        assert!(matches!(rx.try_recv().unwrap(), HudEvent::Desktop { .. }));
    }
}
