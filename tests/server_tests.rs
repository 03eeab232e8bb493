mod common;

#[cfg(test)]
mod tests {
    use crate::common::test_utils::TestDir;
    use axum::{
        Router,
        body::{self, Body},
        http::{Request, StatusCode},
    };
    use bloom_blacklist::api::create_router;
    use bloom_blacklist::server::{MAX_LINE_LEN, serve};
    use bloom_blacklist::{AppState, ServerConfigBuilder};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{TcpListener, TcpStream},
    };
    use tower::util::ServiceExt;

    fn setup_state(dir: &TestDir) -> Arc<AppState> {
        let config = ServerConfigBuilder::default()
            .data_dir(dir.path().to_string_lossy().to_string())
            .array_size(256)
            .hash_repeats(vec![1, 2])
            .build()
            .unwrap();
        let engine = config.open_engine().expect("Failed to open engine");
        Arc::new(AppState { engine })
    }

    fn setup_test_app(dir: &TestDir) -> Router {
        create_router(setup_state(dir))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body_bytes = body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = TestDir::new("http_health");
        let app = setup_test_app(&dir);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_add_check_delete() {
        let dir = TestDir::new("http_flow");
        let app = setup_test_app(&dir);
        let url = "www.example.com/some/path";

        let add_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/blacklist")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "url": url }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(add_response.status(), StatusCode::CREATED);

        let check_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/blacklist/{url}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(check_response.status(), StatusCode::OK);
        let body = json_body(check_response).await;
        assert_eq!(body["filter_hit"], true);
        assert_eq!(body["exact_hit"], true);
        assert_eq!(body["blacklisted"], true);

        let delete_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/blacklist/{url}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(delete_response.status(), StatusCode::NO_CONTENT);

        let second_delete = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/blacklist/{url}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second_delete.status(), StatusCode::NOT_FOUND);

        let after_delete = app
            .oneshot(
                Request::builder()
                    .uri(format!("/blacklist/{url}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(after_delete).await;
        assert_eq!(body["filter_hit"], true);
        assert_eq!(body["exact_hit"], false);
        assert_eq!(body["blacklisted"], false);
    }

    #[tokio::test]
    async fn test_malformed_url_rejected() {
        let dir = TestDir::new("http_malformed");
        let app = setup_test_app(&dir);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/blacklist")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "url": "nodots" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let stats = app
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(stats.status(), StatusCode::OK);
        let body = json_body(stats).await;
        assert_eq!(body["blacklisted"], 0);
        assert_eq!(body["bits_set"], 0);
        assert_eq!(body["array_size"], 256);
    }

    async fn read_reply(
        lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    ) -> String {
        let status = lines.next_line().await.unwrap().expect("missing status");
        if !status.starts_with("200") {
            return status;
        }
        let blank = lines.next_line().await.unwrap().expect("missing separator");
        let body = lines.next_line().await.unwrap().expect("missing body");
        format!("{status}\n{blank}\n{body}")
    }

    #[tokio::test]
    async fn test_line_server_round_trip() {
        let dir = TestDir::new("tcp_flow");
        let state = setup_state(&dir);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let exchanges = [
            ("POST www.example.com0", "201 Created"),
            ("GET www.example.com0", "200 Ok\n\ntrue true"),
            ("DELETE www.example.com0", "204 No Content"),
            ("DELETE www.example.com0", "404 Not Found"),
            ("GET   www.example.com0  ", "200 Ok\n\ntrue false"),
            ("HEAD www.example.com0", "400 Bad Request"),
        ];
        for (request, expected) in exchanges {
            writer
                .write_all(format!("{request}\n").as_bytes())
                .await
                .unwrap();
            assert_eq!(read_reply(&mut lines).await, expected, "{request}");
        }
    }

    #[tokio::test]
    async fn test_line_server_rejects_bad_lines_and_keeps_connection() {
        let dir = TestDir::new("tcp_bad_lines");
        let state = setup_state(&dir);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::clone(&state)));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"POST www.\xff\xfe.com\n").await.unwrap();
        assert_eq!(read_reply(&mut lines).await, "400 Bad Request");

        let overlong = format!("POST www.{}.com\n", "a".repeat(MAX_LINE_LEN as usize));
        writer.write_all(overlong.as_bytes()).await.unwrap();
        assert_eq!(read_reply(&mut lines).await, "400 Bad Request");

        writer.write_all(b"POST www.after.com\r\n").await.unwrap();
        assert_eq!(read_reply(&mut lines).await, "201 Created");
        assert_eq!(
            state.engine.blacklisted().unwrap(),
            vec!["www.after.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_line_server_shares_state_between_connections() {
        let dir = TestDir::new("tcp_shared");
        let state = setup_state(&dir);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::clone(&state)));

        {
            let mut first = TcpStream::connect(addr).await.unwrap();
            first.write_all(b"POST www.shared.com\n").await.unwrap();
            let (reader, _writer) = first.split();
            let mut lines = BufReader::new(reader).lines();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "201 Created");
        }

        let second = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = second.into_split();
        let mut lines = BufReader::new(reader).lines();
        writer.write_all(b"GET www.shared.com\n").await.unwrap();
        assert_eq!(read_reply(&mut lines).await, "200 Ok\n\ntrue true");
        assert_eq!(state.engine.stats().unwrap().blacklisted, 1);
    }
}
