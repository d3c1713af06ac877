//! Plumbing shared by everything else: a small actor runtime, the message
//! envelope and its JSON codec, stdio transport and error types.
//!
//! ### Actors
//! An actor is any type implementing [`Actor`]. [`spawn`] starts it on the
//! current tokio runtime with an unbounded mailbox and returns an
//! [`ActorHandle`]. Messages are processed one at a time, in the order they
//! were queued, so an actor's state never needs a lock. Producers talk to an
//! actor through a [`LocalRef`], which can be cloned freely and
//! [`transform`](LocalRef::transform)ed to accept any type convertible into the
//! actor's message type. Actors schedule messages to themselves with
//! [`ActorContext::schedule_local_msg`].
//!
//! ```ignore
//! let handle = spawn(MyActor::default(), "my-actor".to_string());
//! handle.local().send(MyMsg::Hello);
//! handle.stop().await?;
//! ```
//!
//! ### Wire format
//! One JSON object per line:
//! `{"src": .., "dest": .., "body": {"type": .., "msg_id": .., ..}}`. See
//! [`Payload`] for the body types and [`codec`] for decoding rules.

mod actor;
mod actor_ref;
pub mod codec;
mod error;
mod message;
pub mod responders;
mod single_threaded;
pub mod stdio;

#[rustfmt::skip]
pub(crate) use {
  actor::local_actor_msg_convert,
};

#[rustfmt::skip]
pub use {
  actor::Actor,
  actor::ActorContext,
  actor::ActorSignal,
  actor::LocalActorMsg,
  actor_ref::LocalRef,
  error::CodecError,
  error::ConfigError,
  error::DispatchError,
  error::NodeError,
  message::Body,
  message::Envelope,
  message::NodeId,
  message::Payload,
  message::Value,
  single_threaded::spawn,
  single_threaded::ActorHandle,
};
