//! BDD test world: a running server plus named client connections speaking
//! the wire protocol directly.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use crouton_config::{DEFAULT_MAX_FRAME_BYTES, SocketEndpoint};
use crouton_protocol::{FramedStream, InstanceId, InstanceKey, Request, Response, Value};

use crate::server::{RunningServer, Server};

const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub type StepResult = Result<(), String>;

/// Scenario world shared across BDD steps.
#[derive(Default)]
pub struct RefcountWorld {
    server: Option<RunningServer>,
    clients: HashMap<String, FramedStream<TcpStream>>,
    instance: Option<InstanceId>,
}

impl RefcountWorld {
    /// Starts a server with the built-in types on an ephemeral port.
    pub fn start_server(&mut self) -> StepResult {
        let server = Server::with_builtins().map_err(|error| error.to_string())?;
        let running = server
            .start(&SocketEndpoint::tcp("127.0.0.1", 0))
            .map_err(|error| error.to_string())?;
        self.server = Some(running);
        Ok(())
    }

    pub fn connect(&mut self, name: &str) -> StepResult {
        let addr = self
            .server()?
            .local_addr()
            .ok_or("server has no TCP address")?;
        let stream = TcpStream::connect(addr).map_err(|error| error.to_string())?;
        self.clients.insert(
            name.to_owned(),
            FramedStream::new(stream, DEFAULT_MAX_FRAME_BYTES),
        );
        Ok(())
    }

    pub fn disconnect(&mut self, name: &str) -> StepResult {
        self.clients
            .remove(name)
            .map(drop)
            .ok_or_else(|| format!("no client named '{name}'"))
    }

    pub fn request(&mut self, name: &str, request: &Request) -> Result<Response, String> {
        let client = self
            .clients
            .get_mut(name)
            .ok_or_else(|| format!("no client named '{name}'"))?;
        client.send(request).map_err(|error| error.to_string())?;
        let frame = client
            .receive()
            .map_err(|error| error.to_string())?
            .ok_or("server closed the connection")?;
        Response::from_value(frame).map_err(|error| error.to_string())
    }

    pub fn open(&mut self, name: &str, provider: &str) -> StepResult {
        let request = Request::open(provider, Vec::new(), BTreeMap::new());
        match self.request(name, &request)? {
            Response::Reference(id) => {
                self.instance = Some(id);
                Ok(())
            }
            other => Err(format!("expected a reference, got {other:?}")),
        }
    }

    pub fn open_same(&mut self, name: &str) -> StepResult {
        let id = self.instance()?;
        match self.request(name, &Request::open_existing(id))? {
            Response::Reference(acquired) if acquired == id => Ok(()),
            other => Err(format!("expected reference {id}, got {other:?}")),
        }
    }

    pub fn close(&mut self, name: &str) -> StepResult {
        let id = self.instance()?;
        match self.request(name, &Request::close(id))? {
            Response::Value(Value::Nil) => Ok(()),
            other => Err(format!("expected null, got {other:?}")),
        }
    }

    pub fn increment(&mut self, name: &str) -> Result<Response, String> {
        let id = self.instance()?;
        self.request(
            name,
            &Request::execute(id, "increment", Vec::new(), BTreeMap::new()),
        )
    }

    pub fn instance(&self) -> Result<InstanceId, String> {
        self.instance.ok_or_else(|| "no instance was opened".to_owned())
    }

    /// Polls until the instance's total hold count equals `expected`.
    ///
    /// Disconnect cleanup runs on the server's connection thread, so it is
    /// observed with a deadline rather than immediately.
    pub fn wait_for_holds(&self, expected: u64) -> StepResult {
        let id = self.instance()?;
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let holds = self
                .server()?
                .namespace()
                .lock()
                .map_err(|error| error.to_string())?
                .ref_count(id);
            if holds == expected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(format!("instance {id} has {holds} holds, expected {expected}"));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn instance_exists(&self) -> Result<bool, String> {
        let id = self.instance()?;
        let guard = self
            .server()?
            .namespace()
            .lock()
            .map_err(|error| error.to_string())?;
        Ok(guard.contains(&InstanceKey::Id(id)))
    }

    fn server(&self) -> Result<&RunningServer, String> {
        self.server
            .as_ref()
            .ok_or_else(|| "server is not running".to_owned())
    }
}

impl Drop for RefcountWorld {
    fn drop(&mut self) {
        self.clients.clear();
        if let Some(server) = self.server.take() {
            server.shutdown();
            let _ = server.join();
        }
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<RefcountWorld> {
    RefCell::new(RefcountWorld::default())
}
