//! Shared test scaffolding: a scripted in-memory transport.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use usnmp::{Error, Transport};

/// One scripted reaction to a send.
pub enum Script {
    /// Return these bytes as the reply.
    Data(Bytes),
    /// Compute the reply from the request datagram.
    Reply(Box<dyn Fn(&[u8]) -> Bytes + Send + Sync>),
    /// Drop the request: the receive runs into its deadline.
    Drop,
}

struct Inner {
    peer: SocketAddr,
    script: VecDeque<Script>,
    pending: VecDeque<Script>,
    requests: Vec<Bytes>,
}

/// In-memory transport driven by a script, recording every request.
#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                peer: "192.0.2.1:161".parse().unwrap(),
                script: VecDeque::new(),
                pending: VecDeque::new(),
                requests: Vec::new(),
            })),
        }
    }

    pub fn push(&self, step: Script) {
        self.inner.lock().unwrap().script.push_back(step);
    }

    pub fn push_data(&self, data: impl Into<Bytes>) {
        self.push(Script::Data(data.into()));
    }

    pub fn push_reply(&self, f: impl Fn(&[u8]) -> Bytes + Send + Sync + 'static) {
        self.push(Script::Reply(Box::new(f)));
    }

    pub fn push_drop(&self) {
        self.push(Script::Drop);
    }

    pub fn requests(&self) -> Vec<Bytes> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn send_count(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, data: &[u8]) -> usnmp::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(Bytes::copy_from_slice(data));
        let step = inner.script.pop_front().unwrap_or(Script::Drop);
        inner.pending.push_back(step);
        Ok(())
    }

    async fn recv_matching(&self, request_id: i32, deadline: Instant) -> usnmp::Result<Bytes> {
        let (step, peer) = {
            let mut inner = self.inner.lock().unwrap();
            let peer = inner.peer;
            (inner.pending.pop_front(), peer)
        };

        match step {
            Some(Script::Data(data)) => Ok(data),
            Some(Script::Reply(f)) => {
                let request = {
                    let inner = self.inner.lock().unwrap();
                    inner.requests.last().cloned().unwrap_or_default()
                };
                Ok(f(&request))
            }
            Some(Script::Drop) | None => {
                tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
                Err(Error::Timeout {
                    target: Some(peer),
                    elapsed: std::time::Duration::ZERO,
                    request_id,
                    retries: 0,
                })
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.lock().unwrap().peer
    }
}
