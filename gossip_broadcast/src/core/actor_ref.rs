use crate::core::{local_actor_msg_convert, ActorSignal, LocalActorMsg};
use std::sync::Arc;

/// A cheap, cloneable handle for delivering messages inside this process.
///
/// `send` never blocks. It returns `false` when the receiving end is gone,
/// which is the only delivery signal a sender ever gets.
pub struct LocalRef<T> {
  pub(crate) func: Arc<dyn Fn(LocalActorMsg<T>) -> bool + Send + Sync>,
}
impl<T> Clone for LocalRef<T> {
  fn clone(&self) -> Self {
    LocalRef {
      func: self.func.clone(),
    }
  }
}
impl<T: Send + 'static> LocalRef<T> {
  /// Wraps a plain sink that is not an actor. Signals sent to it are refused.
  pub fn new<F>(sink: F) -> LocalRef<T>
  where
    F: Fn(T) -> bool + Send + Sync + 'static,
  {
    LocalRef {
      func: Arc::new(move |x: LocalActorMsg<T>| match x {
        LocalActorMsg::Msg(m) => sink(m),
        LocalActorMsg::Signal(_) => false,
      }),
    }
  }

  pub fn send(&self, item: T) -> bool {
    (&self.func)(LocalActorMsg::Msg(item))
  }

  pub fn signal(&self, sig: ActorSignal) -> bool {
    (&self.func)(LocalActorMsg::Signal(sig))
  }

  pub fn transform<I: Send + 'static>(&self) -> LocalRef<I>
  where
    T: From<I>,
  {
    let func = self.func.clone();
    LocalRef {
      func: Arc::new(move |x: LocalActorMsg<I>| {
        func(local_actor_msg_convert(x))
      }),
    }
  }

  pub fn void() -> LocalRef<T> {
    LocalRef {
      func: Arc::new(|_| false),
    }
  }
}

#[cfg(test)]
use std::sync::Mutex;

#[test]
fn test_local_ref_sink_and_transform() {
  let seen = Arc::new(Mutex::new(Vec::<i64>::new()));
  let sink = seen.clone();
  let r = LocalRef::<i64>::new(move |x| {
    sink.lock().unwrap().push(x);
    true
  });
  assert!(r.send(3));
  assert!(r.transform::<i32>().send(4));
  assert!(!r.signal(ActorSignal::Term));
  assert_eq!(*seen.lock().unwrap(), vec![3, 4]);
  assert!(!LocalRef::<i64>::void().send(5));
}
