use crate::core::LocalRef;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;

/// Control messages understood by every actor, regardless of its message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorSignal {
  /// Stop the actor once every message queued ahead of this signal has been
  /// processed.
  Term,
}

/// What actually travels through an actor's mailbox.
pub enum LocalActorMsg<S> {
  Msg(S),
  Signal(ActorSignal),
}

pub(crate) fn local_actor_msg_convert<S: From<I>, I>(
  msg: LocalActorMsg<I>,
) -> LocalActorMsg<S> {
  match msg {
    LocalActorMsg::Msg(m) => LocalActorMsg::Msg(S::from(m)),
    LocalActorMsg::Signal(s) => LocalActorMsg::Signal(s),
  }
}

/// A single-threaded unit of state. All mutation of the actor happens inside
/// [`recv`](Actor::recv), one message at a time, in mailbox order.
#[async_trait]
pub trait Actor<S: Send + 'static>: Send + 'static {
  async fn pre_start(&mut self, _: &ActorContext<S>) {}
  async fn recv(&mut self, ctx: &ActorContext<S>, msg: S);
  async fn post_stop(&mut self, _: &ActorContext<S>) {}
}

pub struct ActorContext<S> {
  pub(crate) tx: UnboundedSender<LocalActorMsg<S>>,
  pub name: String,
}
impl<S: Send + 'static> ActorContext<S> {
  /// A [`LocalRef`] to this actor accepting any type convertible into its
  /// message type.
  pub fn local_interface<T: Send + 'static>(&self) -> LocalRef<T>
  where
    S: From<T>,
  {
    let sender = self.tx.clone();
    LocalRef {
      func: Arc::new(move |x: LocalActorMsg<T>| {
        sender.send(local_actor_msg_convert(x)).is_ok()
      }),
    }
  }

  /// Delivers `msg` to this actor's own mailbox after `delay`. If the actor
  /// has stopped by then, the message is silently discarded.
  pub fn schedule_local_msg<T: Send + 'static>(&self, delay: Duration, msg: T)
  where
    S: From<T>,
  {
    let target = self.local_interface::<T>();
    tokio::spawn(async move {
      sleep(delay).await;
      target.send(msg);
    });
  }
}
