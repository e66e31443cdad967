//! Durable sidecar state.
//!
//! The snapshot is a plain textual file rewritten atomically after every
//! mutating protocol event: connection records first, then live items with
//! their elapsed auction time, one field per line. An absent file means a
//! clean start; a file that exists but does not parse aborts startup.

use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::error::{Result, ServerError};
use crate::registry::ServerState;

/// One persisted connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConnection {
    pub ip: IpAddr,
    pub port: u16,
    pub name: String,
}

/// One persisted live auction.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotItem {
    pub id: u32,
    pub description: String,
    pub minimum: f32,
    pub current_highest: f32,
    pub seller: String,
    pub highest_bidder: String,
    pub elapsed: Duration,
}

/// Full persisted state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub connections: Vec<SnapshotConnection>,
    pub items: Vec<SnapshotItem>,
}

impl Snapshot {
    /// Captures the current tables. Stream attachment is deliberately not
    /// recorded; clients re-attach when they reconnect.
    pub fn capture(state: &ServerState) -> Self {
        let connections = state
            .connections
            .values()
            .map(|conn| SnapshotConnection {
                ip: conn.addr().ip(),
                port: conn.addr().port(),
                name: conn.name().to_string(),
            })
            .collect();
        let items = state
            .items
            .values()
            .map(|item| SnapshotItem {
                id: item.id,
                description: item.description.clone(),
                minimum: item.minimum,
                current_highest: item.current_highest,
                seller: item.seller.clone(),
                highest_bidder: item.highest_bidder.clone(),
                elapsed: item.elapsed(),
            })
            .collect();
        Self { connections, items }
    }

    /// Atomically rewrites the sidecar file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut text = String::new();
        let _ = writeln!(text, "{}", self.connections.len());
        for conn in &self.connections {
            let _ = writeln!(text, "{}", conn.ip);
            let _ = writeln!(text, "{}", conn.port);
            let _ = writeln!(text, "{}", conn.name);
        }
        let _ = writeln!(text, "{}", self.items.len());
        for item in &self.items {
            let _ = writeln!(text, "{}", item.id);
            let _ = writeln!(text, "{}", item.description);
            let _ = writeln!(text, "{}", item.minimum);
            let _ = writeln!(text, "{}", item.current_highest);
            let _ = writeln!(text, "{}", item.seller);
            let _ = writeln!(text, "{}", item.highest_bidder);
            let elapsed_ns = u64::try_from(item.elapsed.as_nanos()).unwrap_or(u64::MAX);
            let _ = writeln!(text, "{elapsed_ns}");
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(text.as_bytes())?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Loads the sidecar file. Absent file: clean start. Unparseable file:
    /// `SnapshotCorrupt`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        parse(&text).map(Some)
    }
}

fn parse(text: &str) -> Result<Snapshot> {
    let mut reader = LineReader::new(text);

    let n_connections: usize = reader.parsed("connection count")?;
    let mut connections = Vec::with_capacity(n_connections);
    for _ in 0..n_connections {
        let ip: IpAddr = reader.parsed("connection ip")?;
        let port: u16 = reader.parsed("connection port")?;
        let name = reader.next("connection name")?.to_string();
        connections.push(SnapshotConnection { ip, port, name });
    }

    let n_items: usize = reader.parsed("item count")?;
    let mut items = Vec::with_capacity(n_items);
    for _ in 0..n_items {
        let id: u32 = reader.parsed("item id")?;
        let description = reader.next("item description")?.to_string();
        let minimum: f32 = reader.parsed("item minimum")?;
        let current_highest: f32 = reader.parsed("item current highest")?;
        let seller = reader.next("item seller")?.to_string();
        let highest_bidder = reader.next("item highest bidder")?.to_string();
        let elapsed_ns: u64 = reader.parsed("item elapsed time")?;
        items.push(SnapshotItem {
            id,
            description,
            minimum,
            current_highest,
            seller,
            highest_bidder,
            elapsed: Duration::from_nanos(elapsed_ns),
        });
    }

    Ok(Snapshot { connections, items })
}

struct LineReader<'a> {
    lines: std::str::Lines<'a>,
    line: usize,
}

impl<'a> LineReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            line: 0,
        }
    }

    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.line += 1;
        self.lines
            .next()
            .map(|line| line.trim_end_matches('\r'))
            .ok_or_else(|| {
                ServerError::snapshot_corrupt(self.line, format!("missing {what}"))
            })
    }

    fn parsed<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let line = self.line + 1;
        let text = self.next(what)?;
        text.parse().map_err(|_| {
            ServerError::snapshot_corrupt(line, format!("invalid {what}: {text:?}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::item::Item;

    fn sample_state() -> ServerState {
        let mut state = ServerState::default();
        let addr = "127.0.0.1:4000".parse().unwrap();
        state
            .connections
            .insert("127.0.0.1:4000".into(), Connection::new("alice".into(), addr));
        let mut item = Item::new(
            3,
            "Coffee Mug".into(),
            5.0,
            "127.0.0.1:4000".into(),
            Duration::from_secs(5),
        );
        item.current_highest = 6.5;
        item.highest_bidder = "127.0.0.1:5000".into();
        item.backdate(Duration::from_secs(2));
        state.items.insert(3, item);
        state
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.dat");

        let snapshot = Snapshot::capture(&sample_state());
        snapshot.save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap().expect("file present");

        assert_eq!(loaded.connections.len(), 1);
        assert_eq!(loaded.connections[0].name, "alice");
        assert_eq!(loaded.connections[0].port, 4000);

        assert_eq!(loaded.items.len(), 1);
        let item = &loaded.items[0];
        assert_eq!(item.id, 3);
        assert_eq!(item.description, "Coffee Mug");
        assert_eq!(item.minimum, 5.0);
        assert_eq!(item.current_highest, 6.5);
        assert_eq!(item.highest_bidder, "127.0.0.1:5000");
        assert!(item.elapsed >= Duration::from_secs(2));
        assert!(item.elapsed < Duration::from_secs(3));
    }

    #[test]
    fn empty_bidder_survives_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.dat");

        let mut state = sample_state();
        let item = state.items.get_mut(&3).unwrap();
        item.current_highest = item.minimum;
        item.highest_bidder.clear();

        Snapshot::capture(&state).save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert!(loaded.items[0].highest_bidder.is_empty());
        assert_eq!(loaded.items[0].current_highest, loaded.items[0].minimum);
    }

    #[test]
    fn absent_file_is_a_clean_start() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Snapshot::load(&dir.path().join("nope.dat")).unwrap().is_none());
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.dat");
        std::fs::write(&path, "1\n127.0.0.1\n").unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(ServerError::SnapshotCorrupt { .. })
        ));
    }

    #[test]
    fn garbage_count_is_corrupt_with_line_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.dat");
        std::fs::write(&path, "many\n").unwrap();
        match Snapshot::load(&path) {
            Err(ServerError::SnapshotCorrupt { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_price_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.dat");
        std::fs::write(&path, "0\n1\n3\nMug\nfive\n5\nseller\n\n0\n").unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(ServerError::SnapshotCorrupt { .. })
        ));
    }

    #[test]
    fn description_with_spaces_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.dat");
        Snapshot::capture(&sample_state()).save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded.items[0].description, "Coffee Mug");
    }
}
