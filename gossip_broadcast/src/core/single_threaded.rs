use crate::core::{
  Actor, ActorContext, ActorSignal, LocalActorMsg, LocalRef, NodeError,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;

/// A running actor: its mailbox handle and the task draining the mailbox.
pub struct ActorHandle<S> {
  local: LocalRef<S>,
  task: JoinHandle<()>,
}
impl<S: Send + 'static> ActorHandle<S> {
  pub fn local(&self) -> &LocalRef<S> {
    &self.local
  }

  /// Sends [`ActorSignal::Term`] and waits for the actor to finish the
  /// messages queued before it.
  pub async fn stop(self) -> Result<(), NodeError> {
    self.local.signal(ActorSignal::Term);
    self.task.await?;
    Ok(())
  }
}

/// Spawns `actor` on the current tokio runtime with an unbounded mailbox.
pub fn spawn<S, A>(actor: A, name: String) -> ActorHandle<S>
where
  S: Send + 'static,
  A: Actor<S>,
{
  let (tx, rx) = unbounded_channel::<LocalActorMsg<S>>();
  let ctx = ActorContext { tx: tx, name: name };
  let local = ctx.local_interface::<S>();
  let task = tokio::spawn(run_single(actor, ctx, rx));
  ActorHandle {
    local: local,
    task: task,
  }
}

pub(crate) async fn run_single<S, A>(
  mut actor: A,
  ctx: ActorContext<S>,
  mut rx: UnboundedReceiver<LocalActorMsg<S>>,
) where
  S: Send + 'static,
  A: Actor<S>,
{
  actor.pre_start(&ctx).await;
  // The context holds a sender, so the channel only ends on Term.
  while let Some(msg) = rx.recv().await {
    match msg {
      LocalActorMsg::Msg(m) => actor.recv(&ctx, m).await,
      LocalActorMsg::Signal(ActorSignal::Term) => break,
    }
  }
  actor.post_stop(&ctx).await;
}

#[cfg(test)]
use async_trait::async_trait;

#[cfg(test)]
struct Summer {
  total: i64,
  report: LocalRef<i64>,
}
#[cfg(test)]
#[async_trait]
impl Actor<i64> for Summer {
  async fn recv(&mut self, _: &ActorContext<i64>, msg: i64) {
    self.total += msg;
  }

  async fn post_stop(&mut self, _: &ActorContext<i64>) {
    self.report.send(self.total);
  }
}

#[tokio::test]
async fn test_term_drains_queued_messages() {
  let (tx, mut rx) = unbounded_channel();
  let report = LocalRef::new(move |x| tx.send(x).is_ok());
  let handle = spawn(Summer { total: 0, report: report }, "summer".to_string());
  for x in 1..=10 {
    assert!(handle.local().send(x));
  }
  handle.stop().await.unwrap();
  assert_eq!(rx.recv().await, Some(55));
}
