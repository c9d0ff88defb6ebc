//! # MessageBus: labeled, optionally correlated messaging over a transport.
//!
//! ```text
//!  request("ping", data, on_response)              peer bus
//!     ├─► routes[reply#id] += responder              │
//!     └─► transport ── {ping, data, callbackNum=id} ─► routes["ping"] (in order)
//!                                                      │ handler returns Some(v)
//!  routes[reply#id] (in order) ◄── {id, v, null} ◄─────┘ auto-reply
//! ```
//!
//! ## Rules
//! - Callback ids are strictly increasing per bus and only consumed by `request`
//! - Every handler of a label (topic listener, reply listener, or responder) runs in
//!   registration order
//! - Responders are one-shot: removed when their reply arrives or on [`MessageBus::cancel`]
//! - A tracked responder whose tracker went stale is dropped unfired (`ResponseStale` event)
//! - A reply nobody waits for is dropped (`ResponseUnbound` event)
//! - No acknowledgement, retry, or timeout

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use serde_json::Value;

use super::envelope::{CallbackId, Envelope, Label};
use super::transport::Transport;
use crate::error::BusError;
use crate::events::{self, Event, EventBus, EventKind};
use crate::generation::{Tracker, is_done};

type Listener = Rc<RefCell<dyn FnMut(&Value, Option<CallbackId>) -> Option<Value>>>;
type Responder = Box<dyn FnOnce(Value)>;

/// One registered handler of a label.
#[derive(Clone)]
enum Route {
    Listen(Listener),
    /// One-shot responder of the pending request with this id.
    Respond(CallbackId),
}

struct Pending {
    respond: Responder,
    tracker: Option<Tracker>,
}

/// What a responder route did with a reply.
enum Answer {
    Delivered,
    Stale,
    Gone,
}

struct Inner {
    transport: Box<dyn Transport>,
    last_callback: Cell<u64>,
    pending: RefCell<HashMap<CallbackId, Pending>>,
    routes: RefCell<HashMap<Label, Vec<Route>>>,
    events: Option<EventBus>,
}

/// Labeled message bus bound to one transport. Clones share the same state.
#[derive(Clone)]
pub struct MessageBus {
    inner: Rc<Inner>,
}

impl MessageBus {
    /// Creates a bus and installs its inbound dispatcher on `transport`.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::build(Box::new(transport), None)
    }

    /// Same as [`new`](Self::new), publishing messaging events to `events`.
    pub fn with_events(transport: impl Transport + 'static, events: EventBus) -> Self {
        Self::build(Box::new(transport), Some(events))
    }

    fn build(transport: Box<dyn Transport>, events: Option<EventBus>) -> Self {
        let inner = Rc::new(Inner {
            transport,
            last_callback: Cell::new(0),
            pending: RefCell::new(HashMap::new()),
            routes: RefCell::new(HashMap::new()),
            events,
        });
        // Weak: the transport is owned by the bus, so a strong ref here would be a cycle.
        let weak: Weak<Inner> = Rc::downgrade(&inner);
        inner.transport.register_inbound(Box::new(move |msg| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(msg);
            }
        }));
        Self { inner }
    }

    /// Fire-and-forget: emits `{label, data, callbackNum: null}`.
    ///
    /// A [`CallbackId`] label sends a reply by hand.
    pub fn send(&self, label: impl Into<Label>, data: Value) -> Result<(), BusError> {
        self.inner.send(label.into(), data)
    }

    /// Request: emits `{label, data, callbackNum: id}` and calls `on_response` once with the reply.
    ///
    /// Returns the id assigned to this request. If the transport refuses the message the
    /// responder is discarded and the id is not reused.
    pub fn request(
        &self,
        label: impl Into<Label>,
        data: Value,
        on_response: impl FnOnce(Value) + 'static,
    ) -> Result<CallbackId, BusError> {
        self.inner
            .request(label.into(), data, None, Box::new(on_response))
    }

    /// Same as [`request`](Self::request), but the reply is discarded silently once
    /// `tracker` is done: `on_response` is dropped unfired and `ResponseStale` is published.
    pub fn request_tracked(
        &self,
        label: impl Into<Label>,
        data: Value,
        tracker: &Tracker,
        on_response: impl FnOnce(Value) + 'static,
    ) -> Result<CallbackId, BusError> {
        self.inner.request(
            label.into(),
            data,
            Some(tracker.clone()),
            Box::new(on_response),
        )
    }

    /// Local shortcut: calls `handler` directly, bypassing the transport.
    ///
    /// No callback id is consumed and nothing is published; the handler's result is
    /// returned to the caller instead of being routed as a reply.
    pub fn send_local<F>(&self, handler: F, data: Value) -> Option<Value>
    where
        F: FnOnce(Value) -> Option<Value>,
    {
        handler(data)
    }

    /// Registers a persistent handler for `label` (a topic, or the id of a pending request).
    ///
    /// When an inbound request carries a callback id and the handler returns a non-null
    /// value, that value is sent back automatically.
    pub fn listen(
        &self,
        label: impl Into<Label>,
        handler: impl FnMut(&Value, Option<CallbackId>) -> Option<Value> + 'static,
    ) {
        let handler: Listener = Rc::new(RefCell::new(handler));
        self.inner.route(label.into(), Route::Listen(handler));
    }

    /// Abandons a pending request; a later reply is reported as unbound.
    ///
    /// Returns `false` if the request was not pending (answered, cancelled, or unknown).
    pub fn cancel(&self, id: CallbackId) -> bool {
        self.inner.forget(id).is_some()
    }

    /// Number of requests still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Last callback id handed out (0 before the first request).
    pub fn last_callback(&self) -> u64 {
        self.inner.last_callback.get()
    }
}

/// Topic labels must be non-empty; reply labels are always valid.
fn check_label(label: &Label) -> Result<(), BusError> {
    match label {
        Label::Topic(t) if t.is_empty() => Err(BusError::EmptyLabel),
        _ => Ok(()),
    }
}

impl Inner {
    fn send(&self, label: Label, data: Value) -> Result<(), BusError> {
        check_label(&label)?;
        self.transport
            .send_outbound(Envelope::new(label.clone(), data, None))?;
        self.emit(EventKind::MessageSent, &label, None, None);
        Ok(())
    }

    fn request(
        &self,
        label: Label,
        data: Value,
        tracker: Option<Tracker>,
        respond: Responder,
    ) -> Result<CallbackId, BusError> {
        check_label(&label)?;

        let id = CallbackId(self.last_callback.get() + 1);
        self.last_callback.set(id.0);
        self.pending
            .borrow_mut()
            .insert(id, Pending { respond, tracker });
        self.route(Label::Reply(id), Route::Respond(id));

        let sent = self
            .transport
            .send_outbound(Envelope::new(label.clone(), data, Some(id)));
        if let Err(err) = sent {
            self.forget(id);
            return Err(err.into());
        }
        self.emit(EventKind::MessageSent, &label, Some(id), None);
        Ok(id)
    }

    fn route(&self, label: Label, route: Route) {
        self.routes
            .borrow_mut()
            .entry(label)
            .or_default()
            .push(route);
    }

    /// Removes a pending request together with its responder route.
    fn forget(&self, id: CallbackId) -> Option<Pending> {
        let pending = self.pending.borrow_mut().remove(&id)?;
        let mut routes = self.routes.borrow_mut();
        let label = Label::Reply(id);
        if let Some(list) = routes.get_mut(&label) {
            list.retain(|r| !matches!(r, Route::Respond(other) if *other == id));
            if list.is_empty() {
                routes.remove(&label);
            }
        }
        Some(pending)
    }

    /// Runs every route of the message's label in registration order.
    fn dispatch(&self, msg: Envelope) {
        let Envelope {
            label,
            data,
            callback_num,
        } = msg;

        // Snapshot: handlers may register more handlers or send while we iterate.
        let routes: Vec<Route> = self
            .routes
            .borrow()
            .get(&label)
            .cloned()
            .unwrap_or_default();

        let mut ran = 0usize;
        let mut stale = false;
        for route in routes {
            match route {
                Route::Listen(handler) => {
                    if self.listen_once(&handler, &label, &data, callback_num) {
                        ran += 1;
                    }
                }
                Route::Respond(id) => match self.answer(id, &label, &data) {
                    Answer::Delivered => ran += 1,
                    Answer::Stale => stale = true,
                    Answer::Gone => {}
                },
            }
        }

        if let Label::Reply(id) = label {
            if ran == 0 && !stale {
                self.emit(EventKind::ResponseUnbound, &label, Some(id), None);
            }
        }

        let count: Arc<str> = Arc::from(ran.to_string());
        self.emit(EventKind::MessageReceived, &label, callback_num, Some(count));
    }

    /// Runs one persistent handler and auto-replies with its result.
    ///
    /// Returns `false` if the handler was skipped because it is already running.
    fn listen_once(
        &self,
        handler: &Listener,
        label: &Label,
        data: &Value,
        callback_num: Option<CallbackId>,
    ) -> bool {
        let Ok(mut f) = handler.try_borrow_mut() else {
            self.emit(EventKind::HandlerBusy, label, callback_num, None);
            return false;
        };
        let response = (*f)(data, callback_num);
        drop(f);

        if let (Some(response), Some(id)) = (response, callback_num) {
            if !response.is_null() {
                let reply = Label::Reply(id);
                if let Err(err) = self.send(reply.clone(), response) {
                    self.emit(
                        EventKind::ReplyLost,
                        &reply,
                        Some(id),
                        Some(Arc::from(err.as_label())),
                    );
                }
            }
        }
        true
    }

    /// Fires (or discards, when stale) the one-shot responder of request `id`.
    fn answer(&self, id: CallbackId, label: &Label, data: &Value) -> Answer {
        // Gone: cancelled, or consumed by a handler earlier in this dispatch.
        let Some(Pending { respond, tracker }) = self.forget(id) else {
            return Answer::Gone;
        };
        if is_done(tracker.as_ref()) {
            drop(respond);
            events::emit(self.events.as_ref(), || {
                let mut ev = Event::new(EventKind::ResponseStale)
                    .with_label(label.to_string())
                    .with_callback(id.0);
                if let Some(t) = &tracker {
                    ev = ev.with_channel(t.title()).with_generation(t.start());
                }
                ev
            });
            return Answer::Stale;
        }
        respond(data.clone());
        self.emit(EventKind::ResponseDelivered, label, Some(id), None);
        Answer::Delivered
    }

    fn emit(
        &self,
        kind: EventKind,
        label: &Label,
        callback: Option<CallbackId>,
        reason: Option<Arc<str>>,
    ) {
        events::emit(self.events.as_ref(), || {
            let mut ev = Event::new(kind).with_label(label.to_string());
            if let Some(id) = callback.or(label.as_reply()) {
                ev = ev.with_callback(id.0);
            }
            if let Some(reason) = reason {
                ev = ev.with_reason(reason);
            }
            ev
        });
    }
}
