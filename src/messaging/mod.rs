/// Messaging module for broadcasting runtime events
///
/// Detection loops never talk to a presentation layer directly. The
/// scoreboard and the notifier publish [`HudEvent`]s on the [`EventBus`];
/// anything interested (an overlay, a stream server, a logger) subscribes.
///
/// ```text
/// ┌────────────┐   publish   ┌─────────────┐   HudEvent   ┌─────────────┐
/// │ Scoreboard │ ──────────> │  Event Bus  │ ───────────> │ Subscribers │
/// │  Notifier  │             │             │              │             │
/// └────────────┘             └─────────────┘              └─────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let bus = EventBus::new();
/// let (rx, _id) = bus.subscribe();
///
/// while let Ok(event) = rx.recv() {
///     match event {
///         HudEvent::Score { team, delta } => { /* update overlay */ },
///         _ => {}
///     }
/// }
/// ```

pub mod bus;
pub mod events;

pub use bus::{EventBus, SubscriberId};
pub use events::HudEvent;
