//! End-to-end tests for by-value and by-reference results.

#![expect(
    clippy::expect_used,
    reason = "test code uses expect for clarity and assertions"
)]

use std::collections::BTreeMap;

use crouton_client::Value;
use crouton_e2e::TestServer;
use croutond::object::factory;
use croutond::{Arguments, ExecError, Outcome, RemoteObject, Server};
use rstest::{fixture, rstest};

/// A type registered by the embedding application rather than built in.
struct Greeter {
    name: String,
    greetings: i64,
}

impl Greeter {
    fn from_arguments(mut args: Arguments) -> Result<Self, ExecError> {
        let name = args
            .take_kwarg("name")
            .and_then(|value| value.as_str().map(str::to_owned))
            .ok_or_else(|| ExecError::arguments("Greeter() needs a 'name' keyword"))?;
        args.expect_none("Greeter")?;
        Ok(Self { name, greetings: 0 })
    }
}

impl RemoteObject for Greeter {
    fn type_name(&self) -> &str {
        "Greeter"
    }

    fn invoke(&mut self, method: &str, args: Arguments) -> Result<Outcome, ExecError> {
        args.expect_none(method)?;
        match method {
            "greet" => {
                self.greetings += 1;
                Ok(Outcome::from(format!("hello, {}", self.name)))
            }
            "chain" => Ok(Outcome::This),
            other => Err(ExecError::no_method(self.type_name(), other)),
        }
    }

    fn call(&mut self, args: Arguments) -> Result<Outcome, ExecError> {
        let [other] = args.into_exact("Greeter()")?;
        let other = other
            .as_str()
            .ok_or_else(|| ExecError::arguments("Greeter() expects a name"))?;
        Ok(Outcome::from(format!("{} greets {other}", self.name)))
    }

    fn get_attr(&mut self, name: &str) -> Result<Outcome, ExecError> {
        match name {
            "greetings" => Ok(Outcome::from(self.greetings)),
            other => Err(ExecError::attribute(self.type_name(), other)),
        }
    }
}

#[fixture]
fn server() -> TestServer {
    TestServer::start().expect("start server")
}

#[rstest]
fn plain_results_arrive_by_value(server: TestServer) {
    let client = server.connect().expect("connect");
    let dict = client
        .factory("dict", Vec::new(), BTreeMap::new())
        .expect("create dict");
    dict.set_item("key", "value").expect("set item");
    dict.set_item(1, Value::F64(1.1)).expect("set item");

    let keys = dict
        .invoke("keys", Vec::new(), BTreeMap::new())
        .expect("keys");
    assert!(!keys.is_proxy());
    assert_eq!(
        keys.into_value().expect("value"),
        Value::Array(vec![Value::from("key"), Value::from(1)])
    );
    assert_eq!(
        dict.get_item(1).expect("item").as_value(),
        Some(&Value::F64(1.1))
    );
}

#[rstest]
fn new_objects_arrive_by_reference(server: TestServer) {
    let client = server.connect().expect("connect");
    let dict = client
        .factory("dict", Vec::new(), BTreeMap::new())
        .expect("create dict");
    dict.set_item("key", "value").expect("set item");

    let copy = dict
        .invoke("copy", Vec::new(), BTreeMap::new())
        .expect("copy")
        .into_proxy()
        .expect("proxy");
    assert_ne!(copy.id(), dict.id());
    copy.set_item("other", 2).expect("set on copy");
    assert_eq!(copy.len().expect("len"), 2);
    assert_eq!(dict.len().expect("len"), 1);

    let iterator = dict.iter().expect("iter");
    assert_ne!(iterator.proxy().id(), dict.id());
}

#[rstest]
fn nested_records_share_one_instance(server: TestServer) {
    let client = server.connect().expect("connect");
    let mut kwargs = BTreeMap::new();
    kwargs.insert("kwarg1".to_owned(), Value::from("a keyword arg"));
    let record = client
        .factory("Record", vec![Value::from("first arg")], kwargs)
        .expect("create record");
    assert_eq!(
        record.repr().expect("repr"),
        "Record(arg1='first arg', kwarg1='a keyword arg')"
    );

    let child = record
        .invoke("nest", vec![Value::from("child")], BTreeMap::new())
        .expect("nest")
        .into_proxy()
        .expect("proxy");
    child.set_attr("depth", 1).expect("set attr");
    let seen = record
        .get_attr("child")
        .expect("get attr")
        .into_proxy()
        .expect("proxy");
    assert_eq!(
        seen.get_attr("depth").expect("depth").as_value(),
        Some(&Value::from(1))
    );
    assert_eq!(record.dir().expect("dir"), ["arg1", "child", "kwarg1"]);

    record.del_attr("arg1").expect("delete");
    let error = record.get_attr("arg1").expect_err("deleted");
    assert!(error.remote_message().is_some(), "{error}");
}

#[rstest]
fn context_managers_return_their_target(server: TestServer) {
    let client = server.connect().expect("connect");
    let record = client
        .factory("Record", Vec::new(), BTreeMap::new())
        .expect("create record");

    let entered = record.enter().expect("enter").into_proxy().expect("proxy");
    assert_eq!(entered.id(), record.id());
    assert_eq!(server.ref_count(record.id()).expect("namespace"), 2);
    assert!(!entered.exit().expect("exit"));
    drop(entered);
    assert_eq!(server.ref_count(record.id()).expect("namespace"), 1);
}

#[rstest]
fn registered_types_are_served() {
    let server = Server::with_builtins().expect("builtins");
    server
        .register_type("Greeter", factory(Greeter::from_arguments))
        .expect("register");
    let server = TestServer::start_with(server).expect("start server");
    let client = server.connect().expect("connect");

    let mut kwargs = BTreeMap::new();
    kwargs.insert("name".to_owned(), Value::from("ada"));
    let greeter = client
        .factory("Greeter", Vec::new(), kwargs)
        .expect("create greeter");
    let greeting = greeter
        .invoke("greet", Vec::new(), BTreeMap::new())
        .expect("greet");
    assert_eq!(greeting.as_value(), Some(&Value::from("hello, ada")));
    assert_eq!(
        greeter
            .call(vec![Value::from("bob")], BTreeMap::new())
            .expect("call")
            .as_value(),
        Some(&Value::from("ada greets bob"))
    );
    let chained = greeter
        .invoke("chain", Vec::new(), BTreeMap::new())
        .expect("chain")
        .into_proxy()
        .expect("proxy");
    assert_eq!(chained.id(), greeter.id());
    assert_eq!(
        chained.get_attr("greetings").expect("attr").as_value(),
        Some(&Value::from(1))
    );

    let error = client
        .factory("Greeter", Vec::new(), BTreeMap::new())
        .expect_err("missing keyword");
    assert!(
        error
            .remote_message()
            .is_some_and(|message| message.contains("'name' keyword")),
        "{error}"
    );
}
