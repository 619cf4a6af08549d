//! A control signal is either a timer tick (triggered by a configured
//! interval) or a batch of messages. A [`ControlReceiver`] is the interface
//! through which a worker loop (HeavyLoader, FineSampler, Engine) receives
//! whichever comes first.

use std::{
    fmt::{Display, Formatter},
    time::{Duration, Instant},
};

use futures::{
    future::{select, Either},
    pin_mut,
};

/// A signal that can be received by a worker loop.
#[derive(Debug)]
#[non_exhaustive]
pub enum ControlSignal<Msg: 'static + Send> {
    /// Signal variant triggered by a timer.
    Tick {
        /// Timestamp of the tick.
        instant: Instant,
    },
    /// Signal variant triggered by the reception of a batch of messages.
    Messages {
        /// Messages received.
        messages: Vec<Msg>,
    },
    /// Signal variant received when the channel feeding this receiver has
    /// closed.
    Stop,
}

impl<Msg> ControlSignal<Msg>
where
    Msg: 'static + Send,
{
    /// Returns the name of this signal.
    pub fn name(&self) -> &'static str {
        match self {
            ControlSignal::Tick { .. } => "Tick",
            ControlSignal::Messages { .. } => "Messages",
            ControlSignal::Stop => "Stop",
        }
    }
}

impl<Msg> Display for ControlSignal<Msg>
where
    Msg: 'static + Send,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A receiver that races an optional interval timer against a message
/// channel, always preferring whichever fires, and returning `Stop` once the
/// channel closes.
pub enum ControlReceiver<Msg>
where
    Msg: 'static + Send,
{
    /// A receiver with no timer: every call to [`ControlReceiver::recv`]
    /// waits for the next batch of messages.
    Plain {
        /// The underlying message channel.
        receiver: flume::Receiver<Vec<Msg>>,
    },
    /// A receiver with an interval timer racing the message channel.
    Timed {
        /// The underlying message channel.
        receiver: flume::Receiver<Vec<Msg>>,
        /// The interval of the timer.
        interval: tokio::time::Interval,
    },
}

impl<Msg> ControlReceiver<Msg>
where
    Msg: 'static + Send,
{
    /// Creates a receiver with no timer.
    pub fn new(receiver: flume::Receiver<Vec<Msg>>) -> Self {
        ControlReceiver::Plain { receiver }
    }

    /// Creates a receiver that also yields a [`ControlSignal::Tick`] every
    /// `period`.
    pub fn with_interval(receiver: flume::Receiver<Vec<Msg>>, period: Duration) -> Self {
        ControlReceiver::Timed {
            receiver,
            interval: tokio::time::interval(period),
        }
    }

    /// Returns the next signal for this worker loop to act on.
    pub async fn recv(&mut self) -> ControlSignal<Msg> {
        match self {
            ControlReceiver::Plain { receiver } => match receiver.recv_async().await {
                Ok(messages) => ControlSignal::Messages { messages },
                Err(err) => {
                    tracing::warn!("control channel closed: {}", err);
                    ControlSignal::Stop
                }
            },
            ControlReceiver::Timed { receiver, interval } => {
                let interval_fut = interval.tick();
                let receiver_fut = receiver.recv_async();

                pin_mut!(interval_fut, receiver_fut);

                match select(interval_fut, receiver_fut).await {
                    Either::Left((instant, _)) => ControlSignal::Tick {
                        instant: instant.into_std(),
                    },
                    Either::Right((messages, _)) => match messages {
                        Ok(messages) => ControlSignal::Messages { messages },
                        Err(err) => {
                            tracing::warn!("control channel closed: {}", err);
                            ControlSignal::Stop
                        }
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn messages_are_preferred_over_a_pending_tick() {
        let (sender, receiver) = flume::bounded(10);
        let mut signals = ControlReceiver::with_interval(receiver, Duration::from_secs(1));

        sender.send_async(vec!["a".to_string()]).await.unwrap();
        sender.send_async(vec!["b".to_string()]).await.unwrap();

        match signals.recv().await {
            ControlSignal::Messages { messages } => assert_eq!(messages, vec!["a".to_string()]),
            other => panic!("expected Messages, got {other}"),
        }
        match signals.recv().await {
            ControlSignal::Messages { messages } => assert_eq!(messages, vec!["b".to_string()]),
            other => panic!("expected Messages, got {other}"),
        }
        match signals.recv().await {
            ControlSignal::Tick { .. } => {}
            other => panic!("expected Tick once messages are drained, got {other}"),
        }
    }

    #[tokio::test]
    async fn closing_the_channel_yields_stop() {
        let (sender, receiver) = flume::bounded::<Vec<String>>(10);
        let mut signals = ControlReceiver::new(receiver);
        drop(sender);

        match signals.recv().await {
            ControlSignal::Stop => {}
            other => panic!("expected Stop, got {other}"),
        }
    }
}
