//! Declarative macros for ergonomic effect construction

/// Create an `Effect::Publish` for an already-encoded envelope
///
/// # Example
///
/// ```rust,ignore
/// use queue_relay_core::publish;
///
/// publish! {
///     bus: env.bus,
///     envelope: envelope
/// }
/// ```
#[macro_export]
macro_rules! publish {
    (
        bus: $bus:expr,
        envelope: $envelope:expr
    ) => {
        $crate::effect::Effect::Publish {
            bus: ::std::sync::Arc::clone(&$bus),
            envelope: $envelope,
        }
    };
}

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use queue_relay_core::async_effect;
///
/// async_effect! {
///     announcer.announce(announcement).await.ok();
///     None
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use queue_relay_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(2),
///     action: AgentAction::PollTick
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
