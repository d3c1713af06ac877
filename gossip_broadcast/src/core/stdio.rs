use crate::core::{codec, Envelope, LocalRef};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Spawns the task that owns the protocol output stream. Every envelope sent
/// to the returned [`LocalRef`] becomes one JSON line.
///
/// The task finishes, handing the writer back, once every clone of the
/// [`LocalRef`] has been dropped. A write failure ends it early; later sends
/// then return `false`.
pub fn spawn_writer<W>(
  mut out: W,
) -> (LocalRef<Envelope>, JoinHandle<std::io::Result<W>>)
where
  W: AsyncWrite + Unpin + Send + 'static,
{
  let (tx, mut rx) = unbounded_channel::<Envelope>();
  let task = tokio::spawn(async move {
    while let Some(envelope) = rx.recv().await {
      let mut line = match codec::encode(&envelope) {
        Ok(line) => line,
        Err(e) => {
          error!(
            error = %e,
            dest = %envelope.dest,
            "could not encode envelope"
          );
          continue;
        }
      };
      line.push('\n');
      out.write_all(line.as_bytes()).await?;
      out.flush().await?;
    }
    Ok(out)
  });
  (LocalRef::new(move |envelope| tx.send(envelope).is_ok()), task)
}

/// Reads envelopes line by line until end of input, forwarding each to
/// `inbox` in arrival order. Unreadable lines are logged and skipped.
///
/// Returns the number of envelopes forwarded.
pub async fn read_envelopes<R>(
  input: R,
  inbox: &LocalRef<Envelope>,
) -> std::io::Result<usize>
where
  R: AsyncBufRead + Unpin,
{
  let mut lines = input.split(b'\n');
  let mut forwarded = 0;
  while let Some(raw) = lines.next_segment().await? {
    let line = match String::from_utf8(raw) {
      Ok(line) => line,
      Err(e) => {
        let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
        warn!(error = %e.utf8_error(), input = %lossy, "skipping input line");
        continue;
      }
    };
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
      continue;
    }
    match codec::decode(line) {
      Ok(envelope) => {
        if !inbox.send(envelope) {
          warn!("inbox closed, no longer reading input");
          break;
        }
        forwarded += 1;
      }
      Err(e) => warn!(error = %e, input = %line, "skipping input line"),
    }
  }
  Ok(forwarded)
}

#[cfg(test)]
use crate::core::{Body, Payload};
#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use tokio::io::BufReader;

#[tokio::test]
async fn test_writer_emits_one_line_per_envelope() {
  let out = tokio_test::io::Builder::new()
    .write(b"{\"src\":\"n1\",\"dest\":\"c1\",\"body\":{\"in_reply_to\":1,\"type\":\"topology_ok\"}}\n")
    .build();
  let (outbox, task) = spawn_writer(out);
  assert!(outbox.send(Envelope {
    src: "n1".into(),
    dest: "c1".into(),
    body: Body {
      msg_id: None,
      in_reply_to: Some(1),
      payload: Payload::TopologyOk,
    },
  }));
  drop(outbox);
  task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reader_reassembles_split_lines_and_skips_garbage() {
  let input = tokio_test::io::Builder::new()
    .read(b"{\"src\":\"c1\",\"dest\":\"n1\",\"bo")
    .read(b"dy\":{\"type\":\"read\",\"msg_id\":1}}\n\nnot json\n")
    .read(b"{\"src\":\"c1\",\"dest\":\"n1\",\"body\":{\"type\":\"zap\"}}\n")
    .build();
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  let inbox = LocalRef::new(move |env: Envelope| {
    sink.lock().unwrap().push(env.body.payload);
    true
  });
  let forwarded = read_envelopes(BufReader::new(input), &inbox).await.unwrap();
  assert_eq!(forwarded, 2);
  assert_eq!(
    *seen.lock().unwrap(),
    vec![Payload::Read, Payload::Unrecognized("zap".to_string())]
  );
}

#[tokio::test]
async fn test_reader_skips_lines_that_are_not_utf8() {
  let input = tokio_test::io::Builder::new()
    .read(b"\xff\xfe\n")
    .read(b"{\"src\":\"c1\",\"dest\":\"n1\",\"body\":{\"type\":\"read\",\"msg_id\":2}}\r\n")
    .build();
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  let inbox = LocalRef::new(move |env: Envelope| {
    sink.lock().unwrap().push(env.body.msg_id);
    true
  });
  let forwarded = read_envelopes(BufReader::new(input), &inbox).await.unwrap();
  assert_eq!(forwarded, 1);
  assert_eq!(*seen.lock().unwrap(), vec![Some(2)]);
}
