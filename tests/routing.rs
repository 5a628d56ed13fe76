mod common;

use std::collections::HashMap;

use common::{failure, pair, pair_with, record, routing_table, strings, success};
use zeta4g_bolt::bolt::message::{tag, RoutingTable, ServerRole};
use zeta4g_bolt::bolt::BoltResponse;
use zeta4g_bolt::{BoltError, BoltProtocol, ConnectionConfig, PackStreamValue, ProtocolVersion};

fn config() -> ConnectionConfig {
    let mut routing = HashMap::new();
    routing.insert("address".to_string(), "core1:7687".to_string());
    ConnectionConfig::builder().with_routing_context(routing).build()
}

/// Answer a RUN + PULL pair with the table as a single record.
fn procedure_answer(table: &HashMap<String, PackStreamValue>) -> Vec<BoltResponse> {
    vec![
        success(vec![("fields", strings(&["ttl", "servers"]))]),
        record(vec![table["ttl"].clone(), table["servers"].clone()]),
        success(vec![]),
    ]
}

#[tokio::test]
async fn test_4_2_calls_procedure_in_system_database() {
    let (mut conn, mut server) = pair_with(ProtocolVersion::V4_2, config());
    let protocol = BoltProtocol::for_connection(&conn).unwrap();

    let script = tokio::spawn(async move {
        let run = server.recv().await;
        let pull = server.recv().await;
        server.reply(procedure_answer(&routing_table(None))).await;
        (run, pull)
    });

    let bookmarks = vec!["bm:1".to_string()];
    let table = protocol
        .get_routing_table(&mut conn, Some("movies"), None, &bookmarks)
        .await
        .unwrap();

    let (run, pull) = script.await.unwrap();
    assert_eq!(run.tag, tag::RUN);
    assert_eq!(run.text(0), "CALL dbms.routing.getRoutingTable($context, $database)");
    let params = run.map(1);
    assert_eq!(params.get("database"), Some(&PackStreamValue::from("movies")));
    assert_eq!(
        params
            .get("context")
            .and_then(|v| v.as_map())
            .and_then(|m| m.get("address"))
            .and_then(|v| v.as_str()),
        Some("core1:7687")
    );
    let extra = run.map(2);
    assert_eq!(extra.get("db").and_then(|v| v.as_str()), Some("system"));
    assert_eq!(extra.get("mode").and_then(|v| v.as_str()), Some("r"));
    assert_eq!(extra.get("bookmarks").and_then(|v| v.as_string_list()), Some(bookmarks));
    assert_eq!(pull.tag, tag::PULL);
    assert_eq!(pull.map(0).get("n"), Some(&PackStreamValue::Integer(-1)));

    assert_eq!(table.get("db"), Some(&PackStreamValue::from("movies")));
    let parsed = RoutingTable::from_map(&table).unwrap();
    assert_eq!(parsed.ttl, 300);
    assert_eq!(parsed.db.as_deref(), Some("movies"));
    assert_eq!(parsed.servers(ServerRole::Read).to_vec(), vec!["replica1:7687".to_string()]);
    assert!(conn.is_open());
}

#[tokio::test]
async fn test_4_1_blank_database_is_null() {
    let (mut conn, mut server) = pair(ProtocolVersion::V4_1);
    let protocol = BoltProtocol::for_connection(&conn).unwrap();

    let script = tokio::spawn(async move {
        let run = server.recv().await;
        server.recv().await;
        server.reply(procedure_answer(&routing_table(None))).await;
        run
    });

    let table = protocol
        .get_routing_table(&mut conn, Some("   "), None, &[])
        .await
        .unwrap();

    let run = script.await.unwrap();
    assert!(run.map(1)["database"].is_null());
    assert!(table["db"].is_null());
}

#[tokio::test]
async fn test_3_0_calls_cluster_procedure() {
    let (mut conn, mut server) = pair(ProtocolVersion::V3_0);
    let protocol = BoltProtocol::for_connection(&conn).unwrap();

    let script = tokio::spawn(async move {
        let run = server.recv().await;
        let pull = server.recv().await;
        server.reply(procedure_answer(&routing_table(None))).await;
        (run, pull)
    });

    let table = protocol.get_routing_table(&mut conn, None, None, &[]).await.unwrap();

    let (run, pull) = script.await.unwrap();
    assert_eq!(run.text(0), "CALL dbms.cluster.routing.getRoutingTable($context)");
    assert!(!run.map(1).contains_key("database"));
    assert!(!run.map(2).contains_key("db"));
    assert_eq!(pull.tag, tag::PULL);
    assert!(pull.fields.is_empty());
    assert!(table["db"].is_null());
    assert_eq!(table["ttl"], PackStreamValue::Integer(300));
}

#[tokio::test]
async fn test_4_3_sends_route_and_fills_db() {
    let (mut conn, mut server) = pair_with(ProtocolVersion::V4_3, config());
    let protocol = BoltProtocol::for_connection(&conn).unwrap();

    let script = tokio::spawn(async move {
        let route = server.recv().await;
        let rt = PackStreamValue::Map(routing_table(None));
        server.reply(vec![success(vec![("rt", rt)])]).await;
        (route, server.recv_all().await)
    });

    let table = protocol
        .get_routing_table(&mut conn, Some("movies"), None, &[])
        .await
        .unwrap();
    drop(conn);

    let (route, rest) = script.await.unwrap();
    assert_eq!(route.tag, tag::ROUTE);
    assert!(rest.is_empty(), "no procedure call after ROUTE: {:?}", rest);
    assert_eq!(route.fields.len(), 3);
    assert_eq!(route.map(0).get("address").and_then(|v| v.as_str()), Some("core1:7687"));
    assert_eq!(route.text(2), "movies");
    assert_eq!(table["db"], PackStreamValue::from("movies"));
}

#[tokio::test]
async fn test_4_4_sends_route_with_extra_map() {
    let (mut conn, mut server) = pair(ProtocolVersion::V4_4);
    let protocol = BoltProtocol::for_connection(&conn).unwrap();

    let script = tokio::spawn(async move {
        let route = server.recv().await;
        let rt = PackStreamValue::Map(routing_table(Some("home")));
        server.reply(vec![success(vec![("rt", rt)])]).await;
        (route, server.recv_all().await)
    });

    let table = protocol
        .get_routing_table(&mut conn, None, Some("alice"), &[])
        .await
        .unwrap();
    drop(conn);

    let (route, rest) = script.await.unwrap();
    assert_eq!(route.tag, tag::ROUTE);
    assert!(rest.is_empty(), "no procedure call after ROUTE: {:?}", rest);
    let extra = route.map(2);
    assert!(!extra.contains_key("db"));
    assert_eq!(extra.get("imp_user").and_then(|v| v.as_str()), Some("alice"));
    assert_eq!(table, routing_table(Some("home")));
}

#[tokio::test]
async fn test_impersonation_rejected_on_4_2() {
    let (mut conn, _server) = pair(ProtocolVersion::V4_2);
    let protocol = BoltProtocol::for_connection(&conn).unwrap();
    let err = protocol
        .get_routing_table(&mut conn, None, Some("alice"), &[])
        .await
        .unwrap_err();
    assert!(err.is_client_error());
    assert!(conn.is_open());
}

#[tokio::test]
async fn test_route_failure_closes_connection() {
    let (mut conn, mut server) = pair(ProtocolVersion::V5_0);
    let protocol = BoltProtocol::for_connection(&conn).unwrap();

    let script = tokio::spawn(async move {
        server.recv().await;
        server
            .reply(vec![failure("Neo.ClientError.Database.DatabaseNotFound", "no such db")])
            .await;
        server
    });

    let err = protocol
        .get_routing_table(&mut conn, Some("missing"), None, &[])
        .await
        .unwrap_err();
    assert_eq!(
        err.server_failure().map(|f| f.code.as_str()),
        Some("Neo.ClientError.Database.DatabaseNotFound")
    );
    assert!(!conn.is_open());

    let mut server = script.await.unwrap();
    assert!(server.is_closed().await);
}

#[tokio::test]
async fn test_procedure_without_single_record_closes_connection() {
    let (mut conn, mut server) = pair(ProtocolVersion::V4_0);
    let protocol = BoltProtocol::for_connection(&conn).unwrap();

    let script = tokio::spawn(async move {
        server.recv().await;
        server.recv().await;
        server
            .reply(vec![
                success(vec![("fields", strings(&["ttl", "servers"]))]),
                success(vec![]),
            ])
            .await;
    });

    let err = protocol.get_routing_table(&mut conn, None, None, &[]).await.unwrap_err();
    script.await.unwrap();
    assert!(matches!(err, BoltError::Protocol(_)));
    assert!(!conn.is_open());
}
