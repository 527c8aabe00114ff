//! Subtree walk: repeated GETNEXT (v1) or GETBULK (v2c/v3).
//!
//! The walk accumulates OID -> value until the agent leaves the root
//! subtree, returns an exception value, or answers with an error
//! status. Two guards protect against misbehaving agents: OIDs must
//! strictly increase (otherwise the walk would loop forever), and an
//! OID that reappears must keep its value type.

use std::collections::BTreeMap;
use std::mem::discriminant;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::Client;

/// Outcome of feeding one varbind into the walk.
#[derive(Debug)]
enum Step {
    /// Varbind accepted, continue from its OID.
    Keep,
    /// Walk is complete (subtree left or exception value).
    Done,
}

struct WalkState {
    root: Oid,
    current: Oid,
    last: Option<Oid>,
    results: BTreeMap<Oid, Value>,
}

impl WalkState {
    fn new(root: &Oid) -> Self {
        Self {
            root: root.clone(),
            current: root.clone(),
            last: None,
            results: BTreeMap::new(),
        }
    }

    fn accept(&mut self, vb: VarBind) -> Result<Step> {
        if vb.value.is_exception() {
            return Ok(Step::Done);
        }

        if !vb.oid.starts_with(&self.root) {
            return Ok(Step::Done);
        }

        if let Some(last) = &self.last {
            if &vb.oid <= last {
                return Err(Error::NonIncreasingOid {
                    previous: last.clone(),
                    current: vb.oid,
                });
            }
        }

        if let Some(existing) = self.results.get(&vb.oid) {
            if discriminant(existing) != discriminant(&vb.value) {
                return Err(Error::ValueTypeChanged { oid: vb.oid });
            }
        }

        self.last = Some(vb.oid.clone());
        self.current = vb.oid.clone();
        self.results.insert(vb.oid, vb.value);
        Ok(Step::Keep)
    }
}

/// Walk the subtree under `root`.
pub(super) async fn walk<T: Transport>(
    client: &Client<T>,
    root: &Oid,
) -> Result<BTreeMap<Oid, Value>> {
    let mut state = WalkState::new(root);
    let use_bulk = client.version() != Version::V1;
    let max_repetitions = client.config().max_repetitions;
    let non_repeaters = client.config().non_repeaters;

    loop {
        let oids = [state.current.clone()];

        let varbinds = if use_bulk {
            match client
                .bulk_request(&oids, non_repeaters, max_repetitions)
                .await
            {
                Ok(pdu) => pdu.varbinds,
                // An error-status reply ends the walk with what was gathered
                Err(Error::Snmp { status, .. }) => {
                    tracing::debug!(target: "usnmp::walk", %status, collected = state.results.len(), "walk stopped by error status");
                    return Ok(state.results);
                }
                Err(e) => return Err(e),
            }
        } else {
            let mut pdu = crate::pdu::Pdu::get_next_request(0, &oids);
            pdu.ensure_request_id();
            match client.request(pdu).await {
                Ok(pdu) => pdu.varbinds,
                Err(Error::Snmp { status, .. }) => {
                    tracing::debug!(target: "usnmp::walk", %status, collected = state.results.len(), "walk stopped by error status");
                    return Ok(state.results);
                }
                Err(e) => return Err(e),
            }
        };

        if varbinds.is_empty() {
            return Ok(state.results);
        }

        for vb in varbinds {
            match state.accept(vb)? {
                Step::Keep => {}
                Step::Done => return Ok(state.results),
            }
        }
    }
}
