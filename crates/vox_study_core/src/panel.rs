//! crates/vox_study_core/src/panel.rs
//!
//! The request/response state machine shared by every study panel
//! (explanation, ask, flashcards, quiz, cheatsheet).
//!
//! Idle -> Loading -> {Loaded, Failed}, and back to Loading on an identifier
//! change or an explicit regenerate. Responses are matched against the ticket
//! issued when the request started, so a late answer for a page the user has
//! already left is never shown for the page they are on now.

use crate::ports::{ErrorKind, PortError, PortResult};
use crate::store::PanelKey;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Handed out by [`Panel::begin`] and returned with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    seq: u64,
    key: PanelKey,
}

impl RequestTicket {
    pub fn key(&self) -> &PanelKey {
        &self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// A newer request was started on the same panel.
    Superseded,
    /// The document, page or model changed while the request was in flight.
    KeyChanged,
    /// The session the request belonged to was torn down.
    Cancelled,
}

/// What happened to a response handed to [`Panel::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Failed(PortError),
    Discarded(DiscardReason),
}

#[derive(Debug)]
pub struct Panel<T> {
    status: PanelStatus,
    content: Option<(PanelKey, T)>,
    last_error: Option<PortError>,
    in_flight: Option<RequestTicket>,
    next_seq: u64,
}

impl<T> Default for Panel<T> {
    fn default() -> Self {
        Self {
            status: PanelStatus::Idle,
            content: None,
            last_error: None,
            in_flight: None,
            next_seq: 0,
        }
    }
}

impl<T> Panel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PanelStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == PanelStatus::Loading
    }

    pub fn last_error(&self) -> Option<&PortError> {
        self.last_error.as_ref()
    }

    /// Starts a request for `key`. Any request still in flight is superseded.
    pub fn begin(&mut self, key: PanelKey) -> RequestTicket {
        self.next_seq += 1;
        let ticket = RequestTicket { seq: self.next_seq, key };
        self.in_flight = Some(ticket.clone());
        self.status = PanelStatus::Loading;
        ticket
    }

    /// Whether a fetch is needed to show content for `key`: nothing loaded for
    /// it yet and no request for it in flight.
    pub fn needs_load(&self, key: &PanelKey) -> bool {
        let loaded = self.content.as_ref().is_some_and(|(k, _)| k == key);
        let pending = self.in_flight.as_ref().is_some_and(|t| &t.key == key);
        !loaded && !pending
    }

    /// Applies a response if it is still wanted.
    ///
    /// `current` is the key the store reports now. On failure the previous
    /// content is kept and the error is returned for the caller to surface.
    pub fn resolve(&mut self, ticket: RequestTicket, result: PortResult<T>, current: Option<&PanelKey>) -> Resolution {
        match &self.in_flight {
            Some(active) if active.seq == ticket.seq => {}
            _ => {
                debug!(seq = ticket.seq, "Discarding superseded panel response.");
                return Resolution::Discarded(DiscardReason::Superseded);
            }
        }
        self.in_flight = None;

        if let Err(e) = &result {
            if e.kind == ErrorKind::Cancelled {
                self.settle();
                return Resolution::Discarded(DiscardReason::Cancelled);
            }
        }

        if current != Some(&ticket.key) {
            debug!(seq = ticket.seq, "Discarding panel response for a stale key.");
            self.settle();
            return Resolution::Discarded(DiscardReason::KeyChanged);
        }

        match result {
            Ok(value) => {
                self.content = Some((ticket.key, value));
                self.last_error = None;
                self.status = PanelStatus::Loaded;
                Resolution::Applied
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                self.status = PanelStatus::Failed;
                Resolution::Failed(e)
            }
        }
    }

    /// Leaves the loading state after a discarded response.
    fn settle(&mut self) {
        self.status = if self.content.is_some() {
            PanelStatus::Loaded
        } else {
            PanelStatus::Idle
        };
    }

    /// Content fetched for exactly `key`.
    pub fn content_for(&self, key: &PanelKey) -> Option<&T> {
        match &self.content {
            Some((k, value)) if k == key => Some(value),
            _ => None,
        }
    }

    pub fn content_for_mut(&mut self, key: &PanelKey) -> Option<&mut T> {
        match &mut self.content {
            Some((k, value)) if k == key => Some(value),
            _ => None,
        }
    }

    /// Forgets content and any pending request, e.g. when the document closes.
    pub fn reset(&mut self) {
        self.status = PanelStatus::Idle;
        self.content = None;
        self.last_error = None;
        self.in_flight = None;
    }
}
