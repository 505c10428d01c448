//! The per-connection request loop.

use std::io::{Read, Write};

use crouton_protocol::{
    Action, CodecError, FramedStream, InstanceId, InstanceKey, Request, Response, Value,
};
use tracing::debug;

use crate::namespace::Namespace;
use crate::object::{self, Arguments, Outcome, SharedObject};

use super::DISPATCH_TARGET;
use super::acquisitions::AcquisitionSet;
use super::errors::DispatchError;

/// Serves one connection: receive, dispatch, reply, strictly in order.
pub(crate) struct ConnectionWorker<'a, S> {
    namespace: &'a Namespace,
    stream: FramedStream<S>,
    acquisitions: AcquisitionSet<'a>,
}

impl<'a, S> ConnectionWorker<'a, S>
where
    S: Read + Write,
{
    pub(crate) fn new(namespace: &'a Namespace, stream: S, max_frame_bytes: usize) -> Self {
        let owner = namespace.new_owner();
        Self {
            namespace,
            stream: FramedStream::new(stream, max_frame_bytes),
            acquisitions: AcquisitionSet::new(namespace, owner),
        }
    }

    pub(crate) fn acquisitions(&self) -> &AcquisitionSet<'a> {
        &self.acquisitions
    }

    /// Runs until the peer closes the stream between requests.
    ///
    /// Request-level failures become `error` responses. Only a transport
    /// failure ends the loop early.
    pub(crate) fn run(&mut self) -> Result<(), CodecError> {
        while let Some(frame) = self.stream.receive()? {
            let response = self.respond(frame);
            self.stream.send(&response)?;
        }
        Ok(())
    }

    /// Splits the worker into its stream and its acquisitions for shutdown.
    pub(crate) fn into_parts(self) -> (S, AcquisitionSet<'a>) {
        (self.stream.into_inner(), self.acquisitions)
    }

    fn respond(&mut self, frame: Value) -> Response {
        let result = Request::from_value(frame)
            .map_err(DispatchError::from)
            .and_then(|request| self.dispatch(request));
        match result {
            Ok(response) => response,
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    owner = %self.acquisitions.owner(),
                    kind = error.kind(),
                    %error,
                    "request failed"
                );
                Response::error(error)
            }
        }
    }

    fn dispatch(&mut self, request: Request) -> Result<Response, DispatchError> {
        let action = request.action()?;
        debug!(
            target: DISPATCH_TARGET,
            owner = %self.acquisitions.owner(),
            action = action.as_str(),
            provider = request.provider.as_deref(),
            instance = ?request.instance,
            method = request.method.as_deref(),
            "dispatching request"
        );
        match action {
            Action::Open => self.open(request),
            Action::Close => self.close(request),
            Action::Execute => self.execute(request),
        }
    }

    fn open(&mut self, request: Request) -> Result<Response, DispatchError> {
        let owner = self.acquisitions.owner();
        let Request {
            provider,
            instance,
            args,
            kwargs,
            ..
        } = request;
        let id = match (provider, instance) {
            (Some(provider), None) => {
                let mut guard = self.namespace.lock()?;
                let factory = guard.factory(&provider)?;
                let created = object::construct(&factory, Arguments::new(args, kwargs))?;
                let id = guard.mint_id();
                guard.add(created, id, owner, None)?;
                id
            }
            (None, Some(key)) => {
                let mut guard = self.namespace.lock()?;
                let id = guard.resolve(&key)?;
                guard.acquire(id, owner)?;
                id
            }
            (Some(_), Some(_)) => {
                return Err(DispatchError::invalid_request(
                    "open takes either a provider or an instance, not both",
                ));
            }
            (None, None) => {
                return Err(DispatchError::invalid_request(
                    "open requires a provider or an instance",
                ));
            }
        };
        self.acquisitions.record(id);
        Ok(Response::Reference(id))
    }

    fn close(&mut self, request: Request) -> Result<Response, DispatchError> {
        let key = target(request.instance)?;
        let mut guard = self.namespace.lock()?;
        let id = guard.resolve(&key)?;
        if guard.release(id, self.acquisitions.owner())? {
            self.acquisitions.forget(id);
        }
        Ok(Response::null())
    }

    fn execute(&mut self, request: Request) -> Result<Response, DispatchError> {
        let Request {
            instance,
            method,
            args,
            kwargs,
            ..
        } = request;
        let key = target(instance)?;
        let method = method
            .ok_or_else(|| DispatchError::invalid_request("execute requires a method"))?;
        let (id, shared) = self.namespace.lock()?.lookup(&key)?;
        let outcome = object::invoke(&shared, &method, Arguments::new(args, kwargs))?;
        match outcome {
            Outcome::Value(value) => Ok(Response::Value(value)),
            Outcome::Object(created) => self.adopt(created),
            Outcome::This => self.reacquire(id),
        }
    }

    fn adopt(&mut self, created: SharedObject) -> Result<Response, DispatchError> {
        let id = {
            let mut guard = self.namespace.lock()?;
            let id = guard.mint_id();
            guard.add(created, id, self.acquisitions.owner(), None)?;
            id
        };
        self.acquisitions.record(id);
        Ok(Response::Reference(id))
    }

    fn reacquire(&mut self, id: InstanceId) -> Result<Response, DispatchError> {
        self.namespace
            .lock()?
            .acquire(id, self.acquisitions.owner())?;
        self.acquisitions.record(id);
        Ok(Response::Reference(id))
    }
}

fn target(instance: Option<InstanceKey>) -> Result<InstanceKey, DispatchError> {
    instance.ok_or_else(|| DispatchError::invalid_request("request requires an instance"))
}
