use crate::core::{NodeId, Payload};

// Stateless or nearly so: neither of these coordinates with other nodes.

pub fn echo(echo: serde_json::Value) -> Payload {
  Payload::EchoOk { echo: echo }
}

/// Hands out `<node>-<n>` identifiers. The node prefix makes them unique
/// across the cluster without any coordination.
#[derive(Default)]
pub struct IdGenerator {
  last: u64,
}
impl IdGenerator {
  pub fn next(&mut self, node: &NodeId) -> Payload {
    self.last += 1;
    Payload::GenerateOk {
      id: format!("{}-{}", node, self.last),
    }
  }
}

#[test]
fn test_generated_ids_are_sequential_per_node() {
  let mut ids = IdGenerator::default();
  let node = NodeId::from("n2");
  assert_eq!(
    ids.next(&node),
    Payload::GenerateOk {
      id: "n2-1".to_string()
    }
  );
  assert_eq!(
    ids.next(&node),
    Payload::GenerateOk {
      id: "n2-2".to_string()
    }
  );
}
