//! A scripted Bolt server on the far end of an in-memory duplex stream.

#![allow(dead_code)]

use std::collections::HashMap;

use tokio::io::DuplexStream;
use zeta4g_bolt::bolt::chunk::{ChunkReader, ChunkWriter};
use zeta4g_bolt::bolt::packstream::{
    encode, PackStreamDecoder, PackStreamValue, SliceSource, StructTable,
};
use zeta4g_bolt::bolt::{BoltResponse, RecordMessage, ServerFailure, SuccessMessage};
use zeta4g_bolt::{BoltError, BufferSettings, Connection, ConnectionConfig, ProtocolVersion};

/// Install a subscriber once so `RUST_LOG=debug` shows the message flow.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Request {
    pub tag: u8,
    pub fields: Vec<PackStreamValue>,
}

impl Request {
    /// Field `index` as a map.
    pub fn map(&self, index: usize) -> &HashMap<String, PackStreamValue> {
        self.fields[index].as_map().expect("map field")
    }

    /// Field `index` as a string.
    pub fn text(&self, index: usize) -> &str {
        self.fields[index].as_str().expect("string field")
    }
}

pub struct FakeServer {
    stream: DuplexStream,
    reader: ChunkReader,
    writer: ChunkWriter,
}

impl FakeServer {
    /// Read the next request.
    pub async fn recv(&mut self) -> Request {
        self.try_recv().await.expect("request")
    }

    /// Read every request until the client hangs up.
    pub async fn recv_all(&mut self) -> Vec<Request> {
        let mut requests = Vec::new();
        loop {
            match self.try_recv().await {
                Ok(request) => requests.push(request),
                Err(BoltError::ConnectionClosed) => return requests,
                Err(e) => panic!("reading requests failed: {}", e),
            }
        }
    }

    async fn try_recv(&mut self) -> Result<Request, BoltError> {
        let structs = StructTable::empty();
        self.reader
            .read_message(&mut self.stream, |payload| {
                let mut decoder = PackStreamDecoder::new(SliceSource::new(payload), &structs);
                let (count, tag) = decoder.read_struct_header()?;
                let fields = (0..count)
                    .map(|_| decoder.decode())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Request { tag, fields })
            })
            .await
    }

    /// Send `responses` in one flush.
    pub async fn reply(&mut self, responses: Vec<BoltResponse>) {
        for response in responses {
            let bytes = encode(&PackStreamValue::Structure(response.to_structure())).unwrap();
            self.writer.write_message(&bytes).unwrap();
        }
        self.writer.send(&mut self.stream).await.expect("reply");
    }

    /// Whether the client has closed its end.
    pub async fn is_closed(&mut self) -> bool {
        use tokio::io::AsyncReadExt;
        let mut buf = [0u8; 1];
        matches!(self.stream.read(&mut buf).await, Ok(0))
    }
}

/// A client connection already at `version`, and the server facing it.
pub fn pair(version: ProtocolVersion) -> (Connection<DuplexStream>, FakeServer) {
    pair_with(version, ConnectionConfig::default())
}

pub fn pair_with(
    version: ProtocolVersion,
    config: ConnectionConfig,
) -> (Connection<DuplexStream>, FakeServer) {
    init_tracing();
    let (client, server) = tokio::io::duplex(64 * 1024);
    let settings = BufferSettings::default();
    let server = FakeServer {
        stream: server,
        reader: ChunkReader::new(&settings, None),
        writer: ChunkWriter::new(&settings),
    };
    (Connection::new(client, version, config), server)
}

pub fn success(entries: Vec<(&str, PackStreamValue)>) -> BoltResponse {
    let metadata = entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    BoltResponse::Success(SuccessMessage::with_metadata(metadata))
}

pub fn record(values: Vec<PackStreamValue>) -> BoltResponse {
    BoltResponse::Record(RecordMessage::new(values))
}

pub fn failure(code: &str, message: &str) -> BoltResponse {
    BoltResponse::Failure(ServerFailure::new(code, message))
}

pub fn strings(values: &[&str]) -> PackStreamValue {
    PackStreamValue::from(values.iter().map(|s| s.to_string()).collect::<Vec<_>>())
}

/// A routing table in the shape servers return.
pub fn routing_table(db: Option<&str>) -> HashMap<String, PackStreamValue> {
    let server = |role: &str, address: &str| {
        let mut entry = HashMap::new();
        entry.insert("role".to_string(), PackStreamValue::from(role));
        entry.insert("addresses".to_string(), strings(&[address]));
        PackStreamValue::Map(entry)
    };
    let mut table = HashMap::new();
    table.insert("ttl".to_string(), PackStreamValue::Integer(300));
    table.insert(
        "servers".to_string(),
        PackStreamValue::List(vec![
            server("ROUTE", "core1:7687"),
            server("WRITE", "core1:7687"),
            server("READ", "replica1:7687"),
        ]),
    );
    if let Some(db) = db {
        table.insert("db".to_string(), PackStreamValue::from(db));
    }
    table
}
