//! Content insertion from templates, generators and file drops.
//!
//! Producers never touch the node collection. They get a callback when the
//! request is made and complete it whenever their work finishes; the client
//! drains finished requests into the store on its own schedule.

use crate::nodes::{NodeId, ValidationError};
use crate::store::{NodeDraft, NodeStore};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq)]
enum Completion {
    Drafts(Vec<NodeDraft>),
    Failed(String),
}

/// What happened to one finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertionOutcome {
    pub request: RequestId,
    pub source: String,
    pub created: Vec<NodeId>,
    pub rejected: Vec<ValidationError>,
    /// Producer-reported failure.
    pub error: Option<String>,
}

type Inbox = Rc<RefCell<Vec<(RequestId, String, Completion)>>>;

/// Collects finished insertion requests until the client drains them.
#[derive(Debug, Clone, Default)]
pub struct InsertionQueue {
    inbox: Inbox,
    next_id: Rc<Cell<RequestId>>,
    pending: Rc<Cell<usize>>,
}

impl InsertionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a request. The callback may be completed at any later time.
    pub fn request(&self, source: impl Into<String>) -> InsertionCallback {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.pending.set(self.pending.get() + 1);
        let source = source.into();
        debug!("Insertion request #{id} from {source}");
        InsertionCallback {
            id,
            source,
            inbox: self.inbox.clone(),
            pending: self.pending.clone(),
        }
    }

    /// Requests not yet completed.
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Completed requests waiting to be drained.
    pub fn ready(&self) -> usize {
        self.inbox.borrow().len()
    }

    /// Create every draft from completed requests, in completion order.
    /// Invalid drafts are rejected individually.
    pub fn drain_into(&self, store: &mut NodeStore) -> Vec<InsertionOutcome> {
        let finished: Vec<_> = self.inbox.borrow_mut().drain(..).collect();
        finished
            .into_iter()
            .map(|(request, source, completion)| {
                let mut outcome = InsertionOutcome {
                    request,
                    source,
                    created: Vec::new(),
                    rejected: Vec::new(),
                    error: None,
                };
                match completion {
                    Completion::Drafts(drafts) => {
                        for draft in drafts {
                            match store.create(draft) {
                                Ok(id) => outcome.created.push(id),
                                Err(e) => outcome.rejected.push(e),
                            }
                        }
                    }
                    Completion::Failed(reason) => {
                        warn!("Insertion #{request} from {} failed: {reason}", outcome.source);
                        outcome.error = Some(reason);
                    }
                }
                outcome
            })
            .collect()
    }
}

/// Handle given to a content producer. Consumed on completion.
#[derive(Debug)]
pub struct InsertionCallback {
    id: RequestId,
    source: String,
    inbox: Inbox,
    pending: Rc<Cell<usize>>,
}

impl InsertionCallback {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn complete(self, drafts: Vec<NodeDraft>) {
        self.finish(Completion::Drafts(drafts));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.finish(Completion::Failed(reason.into()));
    }

    fn finish(self, completion: Completion) {
        self.pending.set(self.pending.get().saturating_sub(1));
        self.inbox.borrow_mut().push((self.id, self.source, completion));
    }
}
