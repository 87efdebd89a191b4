//! The per-participant event loop.
//!
//! A participant processes incoming bus traffic one envelope at a time, to
//! completion, before looking at the next one. [`drive`] is that loop: it
//! pulls an envelope, decodes it into an action and awaits `Store::send`
//! before pulling again.

use crate::StoreError;
use crate::store::Store;
use futures::StreamExt;
use queue_relay_core::message_bus::{Envelope, MessageStream};
use queue_relay_core::reducer::Reducer;

/// Feed a bus subscription into a store until either side goes away.
///
/// `decode` turns an envelope into an action, or `None` for traffic this
/// participant does not care about (it is expected to log anything odd).
///
/// Returns when the stream ends or the store shuts down.
///
/// # Errors
///
/// Returns any [`StoreError`] other than `ShutdownInProgress` raised by `send`.
pub async fn drive<S, A, E, R, F>(
    store: Store<S, A, E, R>,
    mut stream: MessageStream,
    decode: F,
) -> Result<(), StoreError>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
    F: Fn(&Envelope) -> Option<A> + Send,
{
    loop {
        let envelope = tokio::select! {
            () = store.closed() => {
                tracing::debug!("Store closed, driver stopping");
                return Ok(());
            },
            next = stream.next() => match next {
                Some(envelope) => envelope,
                None => {
                    tracing::debug!("Subscription ended, driver stopping");
                    return Ok(());
                },
            },
        };

        let Some(action) = decode(&envelope) else {
            tracing::trace!(message_type = %envelope.message_type, "Envelope ignored");
            continue;
        };

        match store.send(action).await {
            Ok(_) => {},
            Err(StoreError::ShutdownInProgress) => return Ok(()),
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BroadcastBus;
    use queue_relay_core::effect::Effect;
    use queue_relay_core::message_bus::{MessageBus, ParticipantId};
    use queue_relay_core::{SmallVec, smallvec};
    use std::time::Duration;

    struct Collect;

    impl Reducer for Collect {
        type State = Vec<String>;
        type Action = String;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            state.push(action);
            smallvec![Effect::None]
        }
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_drive_applies_in_delivery_order_and_skips_ignored() {
        let bus = BroadcastBus::default();
        let me = ParticipantId::new();
        let store = Store::new(Vec::new(), Collect, ());
        let stream = bus.subscribe(me).unwrap();

        let task = tokio::spawn(drive(store.clone(), stream, |envelope: &Envelope| {
            (envelope.message_type != "NOISE").then(|| envelope.message_type.clone())
        }));

        let peer = ParticipantId::new();
        for tag in ["ONE", "NOISE", "TWO"] {
            bus.publish(Envelope::new(peer, tag.to_string(), vec![])).unwrap();
        }

        let mut changes = store.subscribe_changes();
        tokio::time::timeout(Duration::from_secs(1), changes.wait_for(|v| *v >= 2))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.state(Clone::clone).await, vec!["ONE", "TWO"]);

        store.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(task.await.unwrap().is_ok());
    }
}
