//! Protocol Tests
//!
//! Covers command parsing, mode normalization, content escaping, the line
//! codec and the framed connection helpers over a loopback socket.

#[cfg(test)]
mod tests {
    use crate::error::DfsError;
    use crate::protocol::codec::{Frame, LineCodec};
    use crate::protocol::{
        AccessMode, Command, Connection, escape_content, parse_status, unescape_content,
    };
    use bytes::BytesMut;
    use tokio::net::TcpListener;
    use tokio_util::codec::Decoder;

    // ============================================================
    // MODE TOKENS
    // ============================================================

    #[test]
    fn test_mode_synonyms_are_case_insensitive() {
        for token in ["r", "R", "read", "Read_Only", "READ-ONLY"] {
            assert_eq!(AccessMode::from_token(token), AccessMode::Read, "{}", token);
        }
        for token in ["w", "WRITE", "write_only", "Write-Only"] {
            assert_eq!(AccessMode::from_token(token), AccessMode::Write, "{}", token);
        }
        for token in ["rw", "RW", "readwrite", "", "anything"] {
            assert_eq!(
                AccessMode::from_token(token),
                AccessMode::ReadWrite,
                "{}",
                token
            );
        }
    }

    #[test]
    fn test_mode_permissions() {
        assert!(AccessMode::Read.can_read());
        assert!(!AccessMode::Read.can_write());
        assert!(!AccessMode::Write.can_read());
        assert!(AccessMode::Write.can_write());
        assert!(AccessMode::ReadWrite.can_read() && AccessMode::ReadWrite.can_write());
    }

    // ============================================================
    // COMMAND PARSING
    // ============================================================

    #[test]
    fn test_parse_register() {
        let cmd = Command::parse("REGISTER 127.0.0.1 9001 ./", None).unwrap();
        assert_eq!(
            cmd,
            Command::Register {
                host: "127.0.0.1".to_string(),
                port: 9001,
                base_prefix: "./".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_register_invalid_port() {
        for header in ["REGISTER h abc ./", "REGISTER h 0 ./", "REGISTER h 70000 ./"] {
            let err = Command::parse(header, None).unwrap_err();
            assert_eq!(err.reply_line(), "[ERROR] invalid port");
        }
    }

    #[test]
    fn test_parse_short_commands_report_usage() {
        for header in ["REGISTER h 1", "OPEN x.txt", "UPDATE x.txt", "CLOSE", "KEEP_ALIVE"] {
            match Command::parse(header, Some("body")) {
                Err(DfsError::Protocol(msg)) => assert!(msg.starts_with("usage:"), "{}", msg),
                other => panic!("expected usage error for {:?}, got {:?}", header, other),
            }
        }
    }

    #[test]
    fn test_parse_unknown_command() {
        let err = Command::parse("DELETE x.txt", None).unwrap_err();
        assert_eq!(err.reply_line(), "[ERROR] Unknown command DELETE");
    }

    #[test]
    fn test_parse_update_requires_numeric_version() {
        assert!(Command::parse("UPDATE x.txt one", Some("data")).is_err());

        let cmd = Command::parse("UPDATE x.txt 3", Some("data")).unwrap();
        assert_eq!(
            cmd,
            Command::Update {
                path: "x.txt".to_string(),
                version: 3,
                content: "data".to_string(),
            }
        );
    }

    #[test]
    fn test_update_encodes_body_line() {
        let cmd = Command::Update {
            path: "a".to_string(),
            version: 2,
            content: "line1\nline2".to_string(),
        };
        assert_eq!(cmd.to_lines(), vec!["UPDATE a 2", "line1\\nline2"]);
        assert!(Command::has_body("UPDATE a 2"));
        assert!(!Command::has_body("OPEN a RW"));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("OK").unwrap(), "");
        assert_eq!(parse_status("OK 12").unwrap(), "12");
        assert_eq!(
            parse_status("CONFLICT 4").unwrap_err(),
            DfsError::VersionConflict { current: 4 }
        );
        assert_eq!(parse_status("[ERROR] Locked").unwrap_err(), DfsError::LockConflict);
    }

    // ============================================================
    // CONTENT ESCAPING
    // ============================================================

    #[test]
    fn test_escape_handles_newlines_and_backslashes() {
        let content = "first\nsecond\\third\r\n";
        let escaped = escape_content(content);
        assert!(!escaped.contains('\n'));
        assert!(!escaped.contains('\r'));
        assert_eq!(unescape_content(&escaped), content);
    }

    #[test]
    fn test_unescape_keeps_unknown_sequences() {
        assert_eq!(unescape_content("a\\tb\\"), "a\\tb\\");
    }

    // ============================================================
    // LINE CODEC
    // ============================================================

    #[test]
    fn test_codec_recovers_after_oversized_line() {
        let mut codec = LineCodec::new(8);
        let mut buf = BytesMut::from("way too long for the limit\nshort\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Oversized));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Line("short".to_string()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_codec_accepts_line_at_the_limit() {
        let mut codec = LineCodec::new(8);
        let mut buf = BytesMut::from("12345678\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Line("12345678".to_string()))
        );
    }

    // ============================================================
    // CONNECTION
    // ============================================================

    #[tokio::test]
    async fn test_read_request_pairs_update_with_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream).unwrap();
            let first = conn.read_request().await.unwrap();
            let second = conn.read_request().await.unwrap();
            let end = conn.read_request().await.unwrap();
            (first, second, end)
        });

        let mut client = Connection::connect(addr).await.unwrap();
        client
            .send_lines(vec![
                "".to_string(),
                "UPDATE notes.txt 0".to_string(),
                "hello\\nworld".to_string(),
                "LIST".to_string(),
            ])
            .await
            .unwrap();
        drop(client);

        let (first, second, end) = server.await.unwrap();
        assert_eq!(
            first,
            Some((
                "UPDATE notes.txt 0".to_string(),
                Some("hello\nworld".to_string())
            ))
        );
        assert_eq!(second, Some(("LIST".to_string(), None)));
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_call_decodes_error_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream).unwrap();
            let _ = conn.read_request().await.unwrap();
            conn.send_lines(vec!["[ERROR] Locked".to_string()])
                .await
                .unwrap();
        });

        let mut client = Connection::connect(addr).await.unwrap();
        let result = client
            .call(&Command::Open {
                path: "x.txt".to_string(),
                mode: AccessMode::Write,
            })
            .await;
        assert_eq!(result.unwrap_err(), DfsError::LockConflict);
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = Connection::connect_with_retry(&addr, 2).await;
        assert!(matches!(result, Err(DfsError::Connection(_))));
    }
}
