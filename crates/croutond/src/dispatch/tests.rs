//! Dispatch tests over a real TCP connection.

use std::collections::BTreeMap;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crouton_protocol::{
    FramedStream, InstanceId, InstanceKey, Request, Response, STOP_ITERATION, Value,
};
use rstest::{fixture, rstest};

use super::DispatchConnectionHandler;
use crate::namespace::Namespace;
use crate::object::builtins::{Counter, builtin_types};
use crate::object::{Arguments, ExecError, Outcome, RemoteObject, factory, share};
use crate::transport::{ConnectionHandler, ConnectionStream};

const MAX_FRAME: usize = 1024 * 1024;

struct Explosive;

impl RemoteObject for Explosive {
    fn type_name(&self) -> &str {
        "Explosive"
    }

    fn invoke(&mut self, method: &str, _args: Arguments) -> Result<Outcome, ExecError> {
        match method {
            "detonate" => panic!("kaboom"),
            "fail" => Err(ExecError::failed("deliberate failure")),
            other => Err(ExecError::no_method(self.type_name(), other)),
        }
    }
}

fn seeded_namespace() -> Arc<Namespace> {
    let namespace = Arc::new(Namespace::new());
    for (name, make) in builtin_types() {
        namespace.register_type(name, make).expect("register builtin");
    }
    namespace
        .register_type(
            "Explosive",
            factory(|_args: Arguments| -> Result<Explosive, ExecError> { Ok(Explosive) }),
        )
        .expect("register explosive");
    namespace
        .register_instance("shared-counter", share(Counter::default()))
        .expect("register named instance");
    namespace
}

/// One client connection served by a dispatch handler on another thread.
struct HandlerTestHarness {
    namespace: Arc<Namespace>,
    client: FramedStream<TcpStream>,
    server_handle: JoinHandle<()>,
}

impl HandlerTestHarness {
    fn connect(namespace: Arc<Namespace>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handler = DispatchConnectionHandler::new(Arc::clone(&namespace), MAX_FRAME);
        let server_handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            handler.handle(ConnectionStream::Tcp(stream));
        });
        let client = TcpStream::connect(addr).expect("connect");
        Self {
            namespace,
            client: FramedStream::new(client, MAX_FRAME),
            server_handle,
        }
    }

    fn request(&mut self, request: &Request) -> Response {
        self.client.send(request).expect("send request");
        let frame = self
            .client
            .receive()
            .expect("receive response")
            .expect("response before end of stream");
        Response::from_value(frame).expect("response shape")
    }

    fn open(&mut self, provider: &str, args: Vec<Value>) -> InstanceId {
        match self.request(&Request::open(provider, args, BTreeMap::new())) {
            Response::Reference(id) => id,
            other => panic!("expected a reference, got {other:?}"),
        }
    }

    fn execute(&mut self, id: impl Into<InstanceKey>, method: &str, args: Vec<Value>) -> Response {
        self.request(&Request::execute(id, method, args, BTreeMap::new()))
    }

    /// Closes the client side and waits for the server's cleanup to finish.
    fn disconnect(self) -> Arc<Namespace> {
        drop(self.client);
        self.server_handle.join().expect("server join");
        self.namespace
    }
}

#[fixture]
fn harness() -> HandlerTestHarness {
    HandlerTestHarness::connect(seeded_namespace())
}

fn error_message(response: Response) -> String {
    match response {
        Response::Error(message) => message,
        other => panic!("expected an error, got {other:?}"),
    }
}

#[rstest]
fn counter_scenario_ends_in_not_found(mut harness: HandlerTestHarness) {
    let id = harness.open("Counter", Vec::new());
    for expected in 1..=3 {
        assert_eq!(
            harness.execute(id, "increment", Vec::new()),
            Response::Value(Value::from(expected))
        );
    }
    assert_eq!(harness.request(&Request::close(id)), Response::null());
    let message = error_message(harness.execute(id, "increment", Vec::new()));
    assert!(message.contains("not found"), "{message}");
    let namespace = harness.disconnect();
    assert_eq!(namespace.lock().expect("lock").instance_count(), 1);
}

#[rstest]
fn plain_results_are_values_and_objects_are_references(mut harness: HandlerTestHarness) {
    let id = harness.open("list", vec![Value::Array(vec![Value::from(1), Value::from(2)])]);
    assert_eq!(
        harness.execute(id, "__len__", Vec::new()),
        Response::Value(Value::from(2))
    );
    assert_eq!(
        harness.execute(id, "__repr__", Vec::new()),
        Response::Value(Value::from("[1, 2]"))
    );
    assert_eq!(
        harness.execute(id, "__bool__", Vec::new()),
        Response::Value(Value::Boolean(true))
    );
    let Response::Reference(copy) = harness.execute(id, "copy", Vec::new()) else {
        panic!("copy returns a reference");
    };
    assert_ne!(copy, id);
    harness.disconnect();
}

#[rstest]
fn iteration_reports_stop_iteration(mut harness: HandlerTestHarness) {
    let id = harness.open("list", vec![Value::Array(vec![Value::from("only")])]);
    let Response::Reference(iterator) = harness.execute(id, "__iter__", Vec::new()) else {
        panic!("iter returns a reference");
    };
    assert_eq!(
        harness.execute(iterator, "__next__", Vec::new()),
        Response::Value(Value::from("only"))
    );
    assert_eq!(
        harness.execute(iterator, "__next__", Vec::new()),
        Response::Error(STOP_ITERATION.to_owned())
    );
    assert_eq!(
        harness.execute(iterator, "__iter__", Vec::new()),
        Response::Reference(iterator)
    );
    harness.disconnect();
}

#[rstest]
#[case(Request::open("Nope", Vec::new(), BTreeMap::new()), "unknown type 'Nope'")]
#[case(Request::close(InstanceId::new(999)), "not found")]
#[case(Request::open_existing("missing-name"), "not found")]
#[case(
    Request::execute(InstanceId::new(999), "__len__", Vec::new(), BTreeMap::new()),
    "not found"
)]
fn request_errors_keep_the_connection_open(
    mut harness: HandlerTestHarness,
    #[case] request: Request,
    #[case] expected: &str,
) {
    let message = error_message(harness.request(&request));
    assert!(message.contains(expected), "{message}");
    let id = harness.open("Counter", Vec::new());
    assert_eq!(
        harness.execute(id, "increment", Vec::new()),
        Response::Value(Value::from(1))
    );
    harness.disconnect();
}

#[rstest]
fn unknown_actions_are_rejected(mut harness: HandlerTestHarness) {
    let mut request = Request::close(InstanceId::new(1));
    request.action = "destroy".to_owned();
    assert_eq!(
        error_message(harness.request(&request)),
        "invalid request action 'destroy'"
    );
    harness.disconnect();
}

#[rstest]
fn non_request_frames_get_an_error_response(mut harness: HandlerTestHarness) {
    harness.client.send(&Value::from(42)).expect("send scalar");
    let frame = harness.client.receive().expect("receive").expect("frame");
    let message = error_message(Response::from_value(frame).expect("response"));
    assert!(message.starts_with("invalid request"), "{message}");
    harness.disconnect();
}

#[rstest]
fn method_failures_and_panics_become_errors(mut harness: HandlerTestHarness) {
    let id = harness.open("Explosive", Vec::new());
    assert_eq!(
        error_message(harness.execute(id, "fail", Vec::new())),
        "deliberate failure"
    );
    let message = error_message(harness.execute(id, "detonate", Vec::new()));
    assert!(message.contains("kaboom"), "{message}");
    let message = error_message(harness.execute(id, "fail", Vec::new()));
    assert_eq!(message, "deliberate failure");
    harness.disconnect();
}

#[rstest]
fn named_instances_are_shared_and_survive_disconnect(mut harness: HandlerTestHarness) {
    let Response::Reference(id) = harness.request(&Request::open_existing("shared-counter")) else {
        panic!("open by name returns a reference");
    };
    assert_eq!(
        harness.execute("shared-counter", "increment", Vec::new()),
        Response::Value(Value::from(1))
    );
    let namespace = harness.disconnect();
    let guard = namespace.lock().expect("lock");
    assert!(guard.contains(&InstanceKey::Id(id)));
    assert_eq!(guard.ref_count(id), 1);
}

#[rstest]
fn disconnect_releases_everything_the_connection_held(mut harness: HandlerTestHarness) {
    let first = harness.open("Counter", Vec::new());
    let second = harness.open("dict", Vec::new());
    harness.request(&Request::open_existing(first));
    let namespace = harness.disconnect();
    let guard = namespace.lock().expect("lock");
    assert!(!guard.contains(&InstanceKey::Id(first)));
    assert!(!guard.contains(&InstanceKey::Id(second)));
    assert_eq!(guard.instance_count(), 1);
}

#[rstest]
fn truncated_frames_end_the_connection_and_release_holds(mut harness: HandlerTestHarness) {
    let id = harness.open("Counter", Vec::new());
    // A fixmap header promising one entry, then nothing.
    harness.client.get_ref().write_all(&[0x81]).expect("write partial frame");
    harness
        .client
        .get_ref()
        .shutdown(std::net::Shutdown::Write)
        .expect("half close");
    let namespace = harness.disconnect();
    assert!(!namespace.lock().expect("lock").contains(&InstanceKey::Id(id)));
}

#[test]
fn references_held_by_two_connections_outlive_one_of_them() {
    let namespace = seeded_namespace();
    let mut first = HandlerTestHarness::connect(Arc::clone(&namespace));
    let mut second = HandlerTestHarness::connect(Arc::clone(&namespace));

    let id = first.open("Counter", Vec::new());
    assert_eq!(
        second.request(&Request::open_existing(id)),
        Response::Reference(id)
    );
    first.disconnect();
    assert_eq!(
        second.execute(id, "increment", Vec::new()),
        Response::Value(Value::from(1))
    );
    second.disconnect();
    assert!(!namespace.lock().expect("lock").contains(&InstanceKey::Id(id)));
}
