//! Directory Module Tests
//!
//! ## Test Scopes
//! - **Registry**: Prefix assignment, concurrent registration, routing policy.
//! - **Server**: REGISTER/OPEN/CLOSE over sockets and LIST fan-out with a dead shard.

#[cfg(test)]
mod tests {
    use crate::config::{DirectoryConfig, ShardConfig};
    use crate::directory::handlers::dispatch;
    use crate::directory::registry::{ShardRegistry, prefix_suffix};
    use crate::directory::server::DirectoryServer;
    use crate::error::DfsError;
    use crate::protocol::{AccessMode, Command, Connection};
    use crate::shard::server::ShardServer;
    use std::collections::HashSet;
    use std::sync::Arc;

    // ============================================================
    // PREFIX ASSIGNMENT
    // ============================================================

    #[test]
    fn test_same_base_gets_distinct_prefixes() {
        let registry = ShardRegistry::new();

        let s1 = registry.register("127.0.0.1", 9001, "./");
        let s2 = registry.register("127.0.0.1", 9002, "./");

        assert_eq!(s1.assigned_prefix, "./A");
        assert_eq!(s2.assigned_prefix, "./B");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_bases_are_independent() {
        let registry = ShardRegistry::new();
        registry.register("h", 1, "./");
        let other = registry.register("h", 2, "/srv/");
        assert_eq!(other.assigned_prefix, "/srv/A");
    }

    #[test]
    fn test_prefix_suffix_continues_past_z() {
        assert_eq!(prefix_suffix(0), "A");
        assert_eq!(prefix_suffix(25), "Z");
        assert_eq!(prefix_suffix(26), "AA");
        assert_eq!(prefix_suffix(27), "AB");
        assert_eq!(prefix_suffix(52), "BA");

        let registry = ShardRegistry::new();
        for port in 1..=27u16 {
            registry.register("h", port, "./");
        }
        let prefixes: Vec<String> = registry
            .registrations()
            .into_iter()
            .map(|r| r.assigned_prefix)
            .collect();
        assert!(prefixes.contains(&"./Z".to_string()));
        assert!(prefixes.contains(&"./AA".to_string()));
    }

    #[test]
    fn test_concurrent_registration_never_shares_a_prefix() {
        let registry = Arc::new(ShardRegistry::new());
        let handles: Vec<_> = (0..32u16)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register("h", 1000 + i, "./").assigned_prefix)
            })
            .collect();

        let prefixes: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(prefixes.len(), 32);
        assert_eq!(registry.len(), 32);
    }

    // ============================================================
    // ROUTING
    // ============================================================

    #[test]
    fn test_route_matches_prefix() {
        let registry = ShardRegistry::new();
        registry.register("h", 9001, "./");
        registry.register("h", 9002, "./");

        assert_eq!(registry.route("./Anotes.txt").unwrap().port, 9001);
        assert_eq!(registry.route("./B/x.txt").unwrap().port, 9002);
    }

    #[test]
    fn test_route_prefers_longest_prefix() {
        let registry = ShardRegistry::new();
        registry.register("h", 9001, "./"); // ./A
        registry.register("h", 9002, "./A"); // ./AA

        for _ in 0..20 {
            assert_eq!(registry.route("./AA/deep.txt").unwrap().port, 9002);
            assert_eq!(registry.route("./Ab.txt").unwrap().port, 9001);
        }
    }

    #[test]
    fn test_route_without_match_is_routing_error() {
        let registry = ShardRegistry::new();
        registry.register("h", 9001, "./");

        let err = registry.route("x.txt").unwrap_err();
        assert_eq!(
            err,
            DfsError::Routing {
                path: "x.txt".to_string()
            }
        );
        assert_eq!(err.reply_line(), "[ERROR] No matching server for x.txt");
    }

    // ============================================================
    // DISPATCH
    // ============================================================

    #[tokio::test]
    async fn test_dispatch_open_replies_with_port() {
        let registry = ShardRegistry::new();
        registry.register("h", 9001, "./");

        let reply = dispatch(
            &registry,
            Command::Open {
                path: "./A/file".to_string(),
                mode: AccessMode::Read,
            },
        )
        .await;
        assert_eq!(reply, vec!["OK 9001"]);

        let reply = dispatch(
            &registry,
            Command::Close {
                path: "./A/file".to_string(),
            },
        )
        .await;
        assert_eq!(reply, vec!["OK"]);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_shard_commands() {
        let registry = ShardRegistry::new();
        let reply = dispatch(
            &registry,
            Command::KeepAlive {
                path: "x".to_string(),
            },
        )
        .await;
        assert!(reply[0].starts_with("[ERROR]"));
    }

    // ============================================================
    // SERVER
    // ============================================================

    async fn start_directory() -> (String, Arc<ShardRegistry>) {
        let server = DirectoryServer::bind(DirectoryConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
        })
        .await
        .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let registry = server.registry();
        tokio::spawn(server.run());
        (addr, registry)
    }

    #[tokio::test]
    async fn test_register_over_socket() {
        let (addr, registry) = start_directory().await;
        let mut conn = Connection::connect(&addr).await.unwrap();

        conn.send_lines(vec!["REGISTER 127.0.0.1 notaport ./".to_string()])
            .await
            .unwrap();
        assert_eq!(conn.expect_line().await.unwrap(), "[ERROR] invalid port");

        let ok = conn
            .call(&Command::Register {
                host: "127.0.0.1".to_string(),
                port: 9100,
                base_prefix: "./".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(ok, "");
        assert_eq!(registry.route("./A1").unwrap().port, 9100);

        let err = conn
            .call(&Command::Open {
                path: "elsewhere.txt".to_string(),
                mode: AccessMode::Read,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DfsError::Routing { .. }));
    }

    #[tokio::test]
    async fn test_list_fans_out_and_tolerates_dead_shard() {
        let (addr, registry) = start_directory().await;

        let shard = ShardServer::bind(ShardConfig {
            directory: addr.clone(),
            ..ShardConfig::default()
        })
        .await
        .unwrap();
        shard.register().await.unwrap();
        let store = shard.store();
        tokio::spawn(shard.run());

        store
            .update("./A/report.txt", 0, "numbers".to_string())
            .unwrap();

        // A registration nobody answers on.
        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);
        registry.register("127.0.0.1", dead_port, "./");

        let mut conn = Connection::connect(&addr).await.unwrap();
        let listing = conn.fetch_listing().await.unwrap();

        assert_eq!(listing.len(), 3, "{:?}", listing);
        assert!(listing[0].starts_with("# shard ./A @ 127.0.0.1:"));
        assert!(listing[1].starts_with("./A/report.txt\t"));
        assert!(listing[1].ends_with("UNLOCKED"));
        assert!(listing[2].starts_with("[ERROR] listing from ./B @ "));
    }
}
