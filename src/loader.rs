//! Parses a `CLUSTER NODES` text reply into nodes and slot assignments.
//!
//! Record format (space-separated fields):
//! `name addr flags primary_id ping_sent ping_recv epoch link_state [slot-spec…]`

use crate::error::{ClusterError, Result};
use crate::node::NodeId;
use crate::request::Request;
use crate::topology::TopologyInner;
use crate::transport::Transport;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotSpec {
    Range(u16, u16),
    Single(u16),
    MigratingOut(u16, String),
    ImportingIn(u16, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeRecord {
    name: String,
    host: String,
    port: u16,
    is_myself: bool,
    is_replica: bool,
    primary_id: Option<String>,
    slot_specs: Vec<SlotSpec>,
}

/// Parse one `addr` field (`host:port[@bus_port]`), discarding the bus port.
fn parse_addr(addr: &str) -> Option<(String, u16)> {
    let addr = addr.split('@').next().unwrap_or(addr);
    let (host, port) = addr.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some((host.to_string(), port))
}

/// Parse a single slot-spec token (`a-b`, bare integer, `[slot->-dst]`, `[slot-<-src]`).
fn parse_slot_spec(tok: &str) -> Option<SlotSpec> {
    if let Some(inner) = tok.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Some((slot_str, dst)) = inner.split_once("->-") {
            let slot: u16 = slot_str.parse().ok()?;
            return Some(SlotSpec::MigratingOut(slot, dst.to_string()));
        }
        if let Some((slot_str, src)) = inner.split_once("-<-") {
            let slot: u16 = slot_str.parse().ok()?;
            return Some(SlotSpec::ImportingIn(slot, src.to_string()));
        }
        return None;
    }
    if let Some((a, b)) = tok.split_once('-') {
        let a: u16 = a.parse().ok()?;
        let b: u16 = b.parse().ok()?;
        return Some(SlotSpec::Range(a, b));
    }
    let slot: u16 = tok.parse().ok()?;
    Some(SlotSpec::Single(slot))
}

fn parse_record(line: &str) -> Result<NodeRecord> {
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() < 8 {
        return Err(ClusterError::configuration(format!(
            "CLUSTER NODES record has too few fields: {line:?}"
        )));
    }
    let name = fields[0].to_string();
    let (host, port) = parse_addr(fields[1])
        .ok_or_else(|| ClusterError::configuration(format!("bad addr field: {}", fields[1])))?;
    let flags: Vec<&str> = fields[2].split(',').collect();
    let is_myself = flags.contains(&"myself");
    let primary_field = fields[3];
    let primary_id = if primary_field == "-" {
        None
    } else {
        Some(primary_field.to_string())
    };
    let is_replica = flags.contains(&"slave") || flags.contains(&"replica") || primary_id.is_some();

    let mut slot_specs = Vec::new();
    if is_myself {
        for tok in &fields[8..] {
            match parse_slot_spec(tok) {
                Some(spec) => slot_specs.push(spec),
                None => {
                    warn!(token = %tok, "stopping slot-spec parse on malformed token");
                    break;
                }
            }
        }
    }

    Ok(NodeRecord {
        name,
        host,
        port,
        is_myself,
        is_replica,
        primary_id,
        slot_specs,
    })
}

fn parse_records(text: &str) -> Result<Vec<NodeRecord>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_record)
        .collect()
}

fn apply_record<Req: Request>(
    topology: &mut TopologyInner<Req>,
    node_id: NodeId,
    record: &NodeRecord,
) -> Result<()> {
    let node = topology
        .nodes
        .get_mut(node_id)
        .ok_or_else(|| ClusterError::configuration("node vanished during load"))?;
    if node.ip.is_empty() {
        node.ip = record.host.clone();
        node.port = record.port;
    }
    node.name = record.name.clone();
    node.is_replica = record.is_replica;
    node.primary_id = record.primary_id.clone();

    for spec in &record.slot_specs {
        match spec {
            SlotSpec::Range(a, b) => {
                let (lo, hi) = if a <= b { (*a, *b) } else { (*b, *a) };
                for slot in lo..=hi {
                    node.slots.push(slot);
                    if !node.is_replica {
                        topology.slot_table.insert(slot, node_id);
                    }
                }
            }
            SlotSpec::Single(s) => {
                node.slots.push(*s);
                if !node.is_replica {
                    topology.slot_table.insert(*s, node_id);
                }
            }
            SlotSpec::MigratingOut(s, dst) => node.migrating.push((*s, dst.clone())),
            SlotSpec::ImportingIn(s, src) => node.importing.push((*s, src.clone())),
        }
    }
    Ok(())
}

/// Apply an already-fetched `CLUSTER NODES` text blob to `topology`.
///
/// Split out from [`load`] so the network round-trip never happens while
/// holding the topology's lock: callers fetch the text first, then apply it
/// synchronously.
pub fn apply_nodes_text<Req: Request>(
    topology: &mut TopologyInner<Req>,
    node_id: NodeId,
    text: &str,
    mut friends_sink: Option<&mut Vec<NodeId>>,
) -> Result<()> {
    let records = parse_records(text)?;

    for record in &records {
        if record.is_myself {
            apply_record(topology, node_id, record)?;
        } else if let Some(sink) = friends_sink.as_deref_mut() {
            let friend_id = topology.nodes.create_node(record.host.clone(), record.port);
            if let Some(node) = topology.nodes.get_mut(friend_id) {
                node.name = record.name.clone();
                node.is_replica = record.is_replica;
                node.primary_id = record.primary_id.clone();
            }
            sink.push(friend_id);
        }
    }
    Ok(())
}

/// Load one node's `CLUSTER NODES` reply into `topology`. When `friends_sink`
/// is provided, every peer record (not `myself`) becomes a fresh,
/// connection-less node appended to the topology and its id pushed onto the
/// sink; when absent, peer records are ignored.
pub async fn load<Req: Request>(
    transport: &mut Transport,
    topology: &mut TopologyInner<Req>,
    node_id: NodeId,
    friends_sink: Option<&mut Vec<NodeId>>,
) -> Result<()> {
    let text = transport.cluster_nodes().await?;
    apply_nodes_text(topology, node_id, &text, friends_sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_addr_with_bus_port() {
        assert_eq!(
            parse_addr("127.0.0.1:30004@31004"),
            Some(("127.0.0.1".to_string(), 30004))
        );
    }

    #[test]
    fn parse_addr_without_bus_port() {
        assert_eq!(
            parse_addr("127.0.0.1:30004"),
            Some(("127.0.0.1".to_string(), 30004))
        );
    }

    #[test]
    fn parse_slot_spec_single() {
        assert_eq!(parse_slot_spec("1234"), Some(SlotSpec::Single(1234)));
    }

    #[test]
    fn parse_slot_spec_range() {
        assert_eq!(parse_slot_spec("0-5460"), Some(SlotSpec::Range(0, 5460)));
    }

    #[test]
    fn parse_slot_spec_migrating() {
        assert_eq!(
            parse_slot_spec("[3999->-e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca]"),
            Some(SlotSpec::MigratingOut(
                3999,
                "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca".to_string()
            ))
        );
    }

    #[test]
    fn parse_slot_spec_importing() {
        assert_eq!(
            parse_slot_spec("[3999-<-e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca]"),
            Some(SlotSpec::ImportingIn(
                3999,
                "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca".to_string()
            ))
        );
    }

    #[test]
    fn parse_slot_spec_malformed() {
        assert_eq!(parse_slot_spec("not-a-slot-oops"), None);
    }

    #[test]
    fn parse_record_myself_with_slots() {
        let line = "07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30004@31004 myself,master - 0 0 1 connected 0-5460";
        let rec = parse_record(line).unwrap();
        assert!(rec.is_myself);
        assert!(!rec.is_replica);
        assert_eq!(rec.host, "127.0.0.1");
        assert_eq!(rec.port, 30004);
        assert_eq!(rec.slot_specs, vec![SlotSpec::Range(0, 5460)]);
    }

    #[test]
    fn parse_record_replica() {
        let line = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30005@31005 slave 07c37dfeb235213a872192d90877d0cd55635b91 0 0 1 connected";
        let rec = parse_record(line).unwrap();
        assert!(!rec.is_myself);
        assert!(rec.is_replica);
        assert_eq!(
            rec.primary_id,
            Some("07c37dfeb235213a872192d90877d0cd55635b91".to_string())
        );
    }

    #[test]
    fn parse_record_too_few_fields_errors() {
        assert!(parse_record("only two fields").is_err());
    }

    #[test]
    fn parse_records_multiple_lines() {
        let text = "\
a1 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-5460\n\
a2 127.0.0.1:7001@17001 master - 0 0 2 connected 5461-10922\n";
        let recs = parse_records(text).unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs[0].is_myself);
        assert!(!recs[1].is_myself);
    }

    #[test]
    fn parse_records_tolerates_malformed_slot_spec_tail() {
        let line =
            "a1 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-100 garbage 200-300";
        let rec = parse_record(line).unwrap();
        // Stops at the malformed token, doesn't error the whole record.
        assert_eq!(rec.slot_specs, vec![SlotSpec::Range(0, 100)]);
    }

    #[test]
    fn apply_nodes_text_populates_myself_and_friends() {
        use crate::request::tests::MockRequest;
        use crate::topology::TopologyInner;

        let text = "\
a1 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-5460\n\
a2 127.0.0.1:7001@17001 master - 0 0 2 connected 5461-10922\n";

        let handle = TopologyInner::<MockRequest>::new(0);
        let mut t = handle.lock();
        let seed_id = t.nodes.create_node("127.0.0.1", 7000);
        let mut friends = Vec::new();
        apply_nodes_text(&mut t, seed_id, text, Some(&mut friends)).unwrap();

        assert_eq!(friends.len(), 1);
        assert_eq!(t.get_node_by_slot(0), Some(seed_id));
        assert_eq!(t.get_node_by_slot(5460), Some(seed_id));
        let friend = t.nodes.get(friends[0]).unwrap();
        assert_eq!(friend.addr(), "127.0.0.1:7001");
    }
}
