//! Routing table retrieval shared by every version.
//!
//! Before 4.3 the table comes from a procedure call whose single record is
//! turned into a map; from 4.3 on the ROUTE message answers with it directly.
//! Either way a failure leaves the connection in an unknown state, so it is
//! closed before the error reaches the caller.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::bolt::connection::Connection;
use crate::bolt::error::{BoltError, BoltResult};
use crate::bolt::message::{BoltRequest, PullMessage, RouteMessage, RunMessage};
use crate::bolt::packstream::PackStreamValue;
use crate::bolt::pipeline::{CollectedRecords, RecordCollector, RouteHandler};

/// The configured routing context as a PackStream map.
pub(crate) fn context_value<S>(conn: &Connection<S>) -> PackStreamValue
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    PackStreamValue::from(conn.config().routing_context.clone().unwrap_or_default())
}

/// Run a routing procedure, pull everything and zip the only record with
/// its field names.
pub(crate) async fn run_procedure<S>(
    conn: &mut Connection<S>,
    run: RunMessage,
) -> BoltResult<HashMap<String, PackStreamValue>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let collected = Arc::new(Mutex::new(CollectedRecords::default()));
    conn.enqueue(BoltRequest::Run(run), RecordCollector::new(collected.clone()))?;
    conn.enqueue(
        BoltRequest::Pull(PullMessage::all()),
        RecordCollector::new(collected.clone()),
    )?;
    conn.sync().await?;

    let collected = collected.lock();
    collected.single_as_map().ok_or_else(|| {
        BoltError::protocol(format!(
            "Routing procedure returned {} records, expected exactly one",
            collected.records.len()
        ))
    })
}

/// Send ROUTE and return the `rt` map of its response.
pub(crate) async fn route<S>(
    conn: &mut Connection<S>,
    message: RouteMessage,
) -> BoltResult<HashMap<String, PackStreamValue>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let table = Arc::new(Mutex::new(None));
    conn.enqueue(BoltRequest::Route(message), RouteHandler::new(table.clone()))?;
    conn.sync().await?;

    let table = table.lock().take();
    table.ok_or_else(|| BoltError::protocol("ROUTE response carried no routing table"))
}

/// Close `conn` if `outcome` is an error, then pass it through.
pub(crate) async fn close_on_error<S, T>(
    conn: &mut Connection<S>,
    outcome: BoltResult<T>,
) -> BoltResult<T>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if let Err(e) = &outcome {
        warn!("Failed to fetch routing table, closing connection: {}", e);
        if let Err(close) = conn.close().await {
            debug!("Close after routing failure failed: {}", close);
        }
    }
    outcome
}
