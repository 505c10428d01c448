//! Client tests against a scripted in-process server.

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use crouton_config::{DEFAULT_MAX_FRAME_BYTES, SocketEndpoint};
use crouton_protocol::{
    FramedStream, InstanceId, InstanceKey, Request, Response, STOP_ITERATION, Value,
};
use rstest::rstest;

use crate::{Client, ClientError, Returned};

/// Serves one connection, answering each request with `respond` and
/// recording what it received.
struct FakeServer {
    endpoint: SocketEndpoint,
    handle: JoinHandle<Vec<Request>>,
}

impl FakeServer {
    fn start<F>(mut respond: F) -> Self
    where
        F: FnMut(&Request) -> Option<Response> + Send + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut framed = FramedStream::new(stream, DEFAULT_MAX_FRAME_BYTES);
            let mut received = Vec::new();
            while let Ok(Some(frame)) = framed.receive() {
                let request = Request::from_value(frame).expect("request");
                let reply = respond(&request);
                received.push(request);
                match reply {
                    Some(response) => framed.send(&response).expect("send"),
                    None => break,
                }
            }
            received
        });
        Self {
            endpoint: SocketEndpoint::tcp("127.0.0.1", port),
            handle,
        }
    }

    fn requests(self) -> Vec<Request> {
        self.handle.join().expect("fake server panicked")
    }
}

fn reference(raw: u64) -> Response {
    Response::Reference(InstanceId::new(raw))
}

fn actions(requests: &[Request]) -> Vec<(&str, Option<&str>)> {
    requests
        .iter()
        .map(|request| (request.action.as_str(), request.method.as_deref()))
        .collect()
}

#[rstest]
fn dropping_a_proxy_closes_its_hold() {
    let server = FakeServer::start(|request| {
        Some(match request.action.as_str() {
            "open" => reference(7),
            "execute" => Response::Value(Value::from(1)),
            _ => Response::null(),
        })
    });
    let client = Client::connect(&server.endpoint).expect("connect");
    let proxy = client
        .factory("Counter", Vec::new(), BTreeMap::new())
        .expect("factory");
    assert_eq!(proxy.id(), InstanceId::new(7));
    let returned = proxy
        .invoke("increment", Vec::new(), BTreeMap::new())
        .expect("increment");
    assert_eq!(returned.into_value().expect("value"), Value::from(1));
    drop(proxy);
    drop(client);

    let requests = server.requests();
    assert_eq!(
        actions(&requests),
        vec![("open", None), ("execute", Some("increment")), ("close", None)]
    );
    assert_eq!(
        requests[2].instance,
        Some(InstanceKey::from(InstanceId::new(7)))
    );
}

#[rstest]
fn remote_errors_surface_with_their_message() {
    let server = FakeServer::start(|request| {
        Some(match request.action.as_str() {
            "open" => Response::error("unknown type 'Nope'"),
            _ => Response::null(),
        })
    });
    let client = Client::connect(&server.endpoint).expect("connect");
    let error = client
        .factory("Nope", Vec::new(), BTreeMap::new())
        .expect_err("unknown type");
    assert_eq!(error.remote_message(), Some("unknown type 'Nope'"));
    assert!(!error.is_connection_lost());
    drop(client);
    server.requests();
}

#[rstest]
fn iteration_stops_at_stop_iteration() {
    let mut remaining = vec![Value::from("b"), Value::from("a")];
    let server = FakeServer::start(move |request| {
        Some(match (request.action.as_str(), request.method.as_deref()) {
            ("open", _) => reference(1),
            ("execute", Some("__iter__")) => reference(2),
            ("execute", Some("__next__")) => remaining
                .pop()
                .map_or_else(|| Response::error(STOP_ITERATION), Response::Value),
            _ => Response::null(),
        })
    });
    let client = Client::connect(&server.endpoint).expect("connect");
    let list = client
        .factory("list", Vec::new(), BTreeMap::new())
        .expect("factory");
    let items: Vec<Value> = list
        .iter()
        .expect("iter")
        .map(|item| item.and_then(Returned::into_value).expect("item"))
        .collect();
    assert_eq!(items, vec![Value::from("a"), Value::from("b")]);
    drop(list);
    drop(client);

    let closes: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|request| request.action == "close")
        .filter_map(|request| request.instance)
        .collect();
    assert_eq!(
        closes,
        vec![
            InstanceKey::from(InstanceId::new(2)),
            InstanceKey::from(InstanceId::new(1))
        ]
    );
}

#[rstest]
fn closed_clients_stop_sending() {
    let server = FakeServer::start(|_| Some(reference(3)));
    let client = Client::connect(&server.endpoint).expect("connect");
    let proxy = client.open_named("shared").expect("open named");
    client.close();
    assert!(client.is_closed());

    let error = proxy.len().expect_err("closed connection");
    assert!(matches!(error, ClientError::Closed { .. }));
    drop(proxy);

    assert_eq!(actions(&server.requests()), vec![("open", None)]);
}

#[rstest]
fn server_hangup_marks_the_connection_closed() {
    let server = FakeServer::start(|request| match request.action.as_str() {
        "open" => Some(reference(5)),
        _ => None,
    });
    let client = Client::connect(&server.endpoint).expect("connect");
    let proxy = client
        .factory("dict", Vec::new(), BTreeMap::new())
        .expect("factory");
    let error = proxy.repr().expect_err("server hung up");
    assert!(error.is_connection_lost(), "{error}");
    assert!(client.is_closed());
    drop(proxy);
    server.requests();
}

#[rstest]
fn typed_helpers_reject_mismatched_values() {
    let server = FakeServer::start(|request| {
        Some(match request.action.as_str() {
            "open" => reference(9),
            "execute" => Response::Value(Value::from("not a length")),
            _ => Response::null(),
        })
    });
    let client = Client::connect(&server.endpoint).expect("connect");
    let proxy = client
        .factory("list", Vec::new(), BTreeMap::new())
        .expect("factory");
    let error = proxy.len().expect_err("string is not a length");
    assert!(matches!(
        error,
        ClientError::UnexpectedValue { expected: "a length", .. }
    ));
    drop(proxy);
    drop(client);
    server.requests();
}
