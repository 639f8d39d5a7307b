use tracing::{debug, info, warn};

use crate::{
    ChatSender, Config, ConnectionRecord, Delivery, Directory, GeoLocator, StateStore,
    decision::{Decision, decide},
    environment::Environment,
    error::{DeliveryError, DirectoryError},
    message::Composer,
    resolve_contact,
};

/// One client connection reported by the VPN server.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    pub identity: String,
    pub address: String,
    /// Epoch seconds.
    pub timestamp: i64,
    pub environment: Environment,
}

/// The external systems a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub store: &'a dyn StateStore,
    pub directory: &'a dyn Directory,
    /// `None` when geolocation is off or its database could not be opened.
    pub geo: Option<&'a dyn GeoLocator>,
    pub chat: &'a dyn ChatSender,
}

impl core::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators")
            .field("geo", &self.geo.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Same address inside the re-notification window.
    Suppressed,
    Delivered { recipient: String, delivery: Delivery },
    /// The composed message was empty, so nothing was sent.
    EmptyMessage,
    NoRecipient(DirectoryError),
    DeliveryFailed(DeliveryError),
}

/// Process one connection event end to end.
///
/// Never fails: every collaborator error is logged and the run carries on
/// with whatever is left, so the VPN server is never held up.
pub async fn handle_connection(
    config: &Config,
    deps: Collaborators<'_>,
    event: &ConnectionEvent,
) -> Outcome {
    let previous = deps.store.load(&event.identity).await.unwrap_or_else(|e| {
        warn!(error = %e, "Couldn't read previous connection state");
        None
    });
    let current = ConnectionRecord {
        address: event.address.clone(),
        time: event.timestamp,
    };
    let decision = decide(previous.as_ref(), &current, config.renotify_time);

    // Refreshed on both paths, so the window slides with every connection.
    if let Err(e) = deps.store.save(&event.identity, &current).await {
        warn!(error = %e, "Couldn't save connection state");
    }

    if decision == Decision::Suppress {
        info!(
            window_secs = config.renotify_time,
            "Login message suppressed, same address seen within the re-notification window"
        );
        return Outcome::Suppressed;
    }

    let geo = deps.geo.and_then(|locator| {
        locator
            .lookup(&event.address)
            .inspect_err(|e| warn!(error = %e, "Geolocation lookup failed"))
            .ok()
    });
    debug!(geo = ?geo, env = %event.environment, "Composing message");

    let message =
        Composer::from_config(config).compose(event.environment, &event.address, geo.as_ref());
    if message.trim().is_empty() {
        warn!("Composed message is empty, not sending");
        return Outcome::EmptyMessage;
    }

    let recipient = match resolve_contact(deps.directory, &event.identity).await {
        Ok(recipient) => recipient,
        Err(e) => {
            warn!(error = %e, "Couldn't determine chat recipient");
            return Outcome::NoRecipient(e);
        }
    };

    match deps.chat.send(&recipient, &message).await {
        Ok(delivery) => {
            info!(
                recipient = %recipient,
                channel = %delivery.channel,
                ts = %delivery.timestamp,
                "Message sent"
            );
            Outcome::Delivered {
                recipient,
                delivery,
            }
        }
        Err(e) => {
            warn!(recipient = %recipient, error = %e, "Message delivery failed");
            Outcome::DeliveryFailed(e)
        }
    }
}
