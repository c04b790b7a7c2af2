//! Integration tests for the JSON encoded client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use horizon_lattice_graphql::{
    BoxError, Client, Context, GraphQLClientError, GraphQLResponse, HttpTransport, Request,
    transport_fn,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default, Deserialize)]
struct GraphResponse {
    #[serde(default)]
    data: HashMap<String, Value>,
    #[serde(default)]
    errors: Vec<Value>,
}

fn ctx() -> Context {
    Context::background().with_timeout(Duration::from_secs(1))
}

fn json_client(server: &MockServer) -> Client {
    Client::new(format!("{}/graphql", server.uri()))
        .build()
        .expect("Failed to build client")
}

#[tokio::test]
async fn test_do_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(body_string("{\"query\":\"query {}\",\"variables\":null}\n"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "data": {
                    "something": "yes"
                }
            }"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let mut gr = GraphResponse::default();
    client
        .run(&ctx(), Request::new("query {}"), &mut gr)
        .await
        .expect("Request failed");

    assert_eq!(gr.data["something"], "yes");
    assert!(gr.errors.is_empty());
}

#[tokio::test]
async fn test_do_json_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string("{\"query\":\"query {}\",\"variables\":null}\n"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let mut gr = GraphResponse::default();
    let err = client
        .run(&ctx(), Request::new("query {}"), &mut gr)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "graphql: server returned a non-200 status code: 500"
    );
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_do_json_bad_request_err() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string("{\"query\":\"query {}\",\"variables\":null}\n"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{
                "errors": [{
                    "message": "miscellaneous message as to why the the request was bad"
                }]
            }"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let mut gr = GraphResponse::default();
    client
        .run(&ctx(), Request::new("query {}"), &mut gr)
        .await
        .expect("400 with GraphQL errors should succeed");

    assert_eq!(
        gr.errors[0]["message"],
        "miscellaneous message as to why the the request was bad"
    );
}

#[tokio::test]
async fn test_bad_request_without_errors_leaves_destination() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"errors":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let mut gr = GraphResponse::default();
    gr.data.insert("untouched".into(), Value::Bool(true));

    let err = client
        .run(&ctx(), Request::new("query {}"), &mut gr)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(gr.data["untouched"], true);
}

#[tokio::test]
async fn test_invalid_success_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let mut gr = GraphResponse::default();
    let err = client
        .run(&ctx(), Request::new("query {}"), &mut gr)
        .await
        .unwrap_err();

    assert!(matches!(err, GraphQLClientError::Decode(_)));
    assert!(gr.data.is_empty());
}

#[tokio::test]
async fn test_query_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string(
            "{\"query\":\"query {}\",\"variables\":{\"username\":\"matryer\"}}\n",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{"value":"some data"}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);

    let request = Request::new("query {}").var("username", "matryer");
    assert_eq!(request.vars()["username"], "matryer");

    let mut gr = GraphResponse::default();
    client
        .run(&ctx(), request, &mut gr)
        .await
        .expect("Request failed");

    assert_eq!(gr.data["value"], "some data");
}

#[tokio::test]
async fn test_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Custom-Header", "123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{"value":"some data"}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let request = Request::new("query {}").header("X-Custom-Header", "123");

    let mut gr = GraphResponse::default();
    client
        .run(&ctx(), request, &mut gr)
        .await
        .expect("Request failed");

    assert_eq!(gr.data["value"], "some data");
}

#[tokio::test]
async fn test_caller_accept_header_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("accept", "application/graphql-response+json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let request = Request::new("query {}").header("Accept", "application/graphql-response+json");

    let response: GraphQLResponse = client.execute(&ctx(), request).await.unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_execute_typed_response() {
    #[derive(Debug, Deserialize)]
    struct Data {
        viewer: Viewer,
    }

    #[derive(Debug, Deserialize)]
    struct Viewer {
        login: String,
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"viewer": {"login": "matryer"}},
            "errors": [{"message": "partial", "path": ["viewer", "avatar"]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let response: GraphQLResponse<Data> = client
        .execute(&ctx(), Request::new("{ viewer { login avatar } }"))
        .await
        .unwrap();

    assert_eq!(response.data().unwrap().viewer.login, "matryer");
    assert_eq!(response.error_message().as_deref(), Some("partial"));
}

#[tokio::test]
async fn test_deferred_request_error_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
        .expect(0)
        .mount(&server)
        .await;

    let client = json_client(&server);
    let request = Request::new("query {}").header("bad header", "value");

    let mut gr = GraphResponse::default();
    let err = client.run(&ctx(), request, &mut gr).await.unwrap_err();
    assert!(matches!(err, GraphQLClientError::Encode(_)));
}

#[tokio::test]
async fn test_with_client() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = {
        let calls = calls.clone();
        transport_fn(move |request: reqwest::Request| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.method(), &reqwest::Method::POST);
            async {
                let response = http::Response::builder()
                    .status(200)
                    .body(r#"{"data":{"key":"value"}}"#)
                    .unwrap();
                Ok(reqwest::Response::from(response))
            }
        })
    };

    let client = Client::new("http://localhost/graphql")
        .http_client(transport)
        .use_multipart_form()
        .build()
        .unwrap();

    let mut gr = GraphResponse::default();
    client
        .run(&Context::background(), Request::new(""), &mut gr)
        .await
        .expect("Request failed");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(gr.data["key"], "value");
}

#[tokio::test]
async fn test_custom_transport_impl() {
    struct Unreachable {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl HttpTransport for Unreachable {
        async fn execute(&self, _request: reqwest::Request) -> Result<reqwest::Response, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("network unreachable".into())
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let client = Client::new("http://localhost/graphql")
        .http_client(Unreachable {
            calls: calls.clone(),
        })
        .build()
        .unwrap();

    let mut gr = GraphResponse::default();
    let err = client
        .run(&Context::background(), Request::new("query {}"), &mut gr)
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.to_string(), "graphql: request failed: network unreachable");
    assert!(matches!(err, GraphQLClientError::Transport { .. }));
}

#[tokio::test]
async fn test_cancel_aborts_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"data":{"late":"yes"}}"#)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = json_client(&server);
    let (ctx, cancel) = Context::background().with_cancel();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let mut gr = GraphResponse::default();
    let err = client
        .run(&ctx, Request::new("query {}"), &mut gr)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert!(gr.data.is_empty());
}

#[tokio::test]
async fn test_deadline_aborts_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"data":{}}"#)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = json_client(&server);
    let ctx = Context::background().with_timeout(Duration::from_millis(100));

    let mut gr = GraphResponse::default();
    let err = client
        .run(&ctx, Request::new("query {}"), &mut gr)
        .await
        .unwrap_err();

    assert!(matches!(err, GraphQLClientError::DeadlineExceeded));
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind and release a port so nothing is listening on it.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let client = Client::new(format!("http://{addr}/graphql")).build().unwrap();
    let mut gr = GraphResponse::default();
    let err = client
        .run(&ctx(), Request::new("query {}"), &mut gr)
        .await
        .unwrap_err();

    assert!(matches!(err, GraphQLClientError::Transport { .. }));
}

#[tokio::test]
async fn test_logger_receives_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{"value":"x"}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let client = {
        let lines = lines.clone();
        Client::new(format!("{}/graphql", server.uri()))
            .logger(move |line| lines.lock().push(line.to_string()))
            .build()
            .unwrap()
    };

    let request = Request::new("query {}").var("username", "matryer");
    let _: GraphQLResponse = client.execute(&ctx(), request).await.unwrap();

    let lines = lines.lock();
    assert_eq!(
        *lines,
        [
            r#">> variables: {"username":"matryer"}"#,
            ">> query: query {}",
            r#"<< {"data":{"value":"x"}}"#,
        ]
    );
}
