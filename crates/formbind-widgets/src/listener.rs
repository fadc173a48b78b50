#![forbid(unsafe_code)]

//! Listener adapter: read-only rendering from host state.
//!
//! A [`Listener`] subscribes to every change of one source (`of`) or of the
//! whole form, and passes each snapshot to its child via
//! [`Node::receive`]. Right after subscribing it renders once from the
//! host's current state, so a listener mounted after the host already holds
//! data paints that data on its first render.
//!
//! Updates that arrive while the child is rendering (the child mounted an
//! updater, say) are coalesced: the render in progress finishes, then the
//! child renders once more with the latest state.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use formbind_runtime::{StateSnapshot, SubscriptionScope, events};

use crate::node::{MountScope, NestingError, Node, NodeKind, check_nesting, enforce_nesting};

struct ListenerShared {
    child: RefCell<Box<dyn Node>>,
    pending: RefCell<Option<StateSnapshot>>,
    renders: Cell<usize>,
    last: RefCell<Option<StateSnapshot>>,
}

impl ListenerShared {
    fn deliver(&self, snapshot: StateSnapshot) {
        *self.pending.borrow_mut() = Some(snapshot);
        // Busy means a render is in progress; it drains `pending` when done.
        let Ok(mut child) = self.child.try_borrow_mut() else {
            return;
        };
        loop {
            let next = self.pending.borrow_mut().take();
            let Some(next) = next else {
                break;
            };
            self.renders.set(self.renders.get() + 1);
            child.receive(&next);
            *self.last.borrow_mut() = Some(next);
        }
    }
}

/// Renders its child from the state of one source or of the whole form.
pub struct Listener {
    of: Option<String>,
    shared: Rc<ListenerShared>,
    subscriptions: SubscriptionScope,
    mounted: bool,
}

impl Listener {
    /// # Panics
    ///
    /// In debug builds, when `child` is an adapter or a fragment.
    pub fn new(child: impl Node + 'static) -> Self {
        enforce_nesting(NodeKind::Listener, child.kind());
        Self::build(Box::new(child))
    }

    /// # Errors
    ///
    /// [`NestingError`] when `child` is an adapter or a fragment.
    pub fn try_new(child: impl Node + 'static) -> Result<Self, NestingError> {
        check_nesting(NodeKind::Listener, child.kind())?;
        Ok(Self::build(Box::new(child)))
    }

    fn build(child: Box<dyn Node>) -> Self {
        Self {
            of: None,
            shared: Rc::new(ListenerShared {
                child: RefCell::new(child),
                pending: RefCell::new(None),
                renders: Cell::new(0),
                last: RefCell::new(None),
            }),
            subscriptions: SubscriptionScope::new(),
            mounted: false,
        }
    }

    /// Listen to one source instead of the whole form.
    #[must_use]
    pub fn of(mut self, name: impl Into<String>) -> Self {
        self.of = Some(name.into());
        self
    }

    /// Number of times the child received state.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.shared.renders.get()
    }

    /// The state most recently rendered.
    #[must_use]
    pub fn last_state(&self) -> Option<StateSnapshot> {
        self.shared.last.borrow().clone()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}

impl Node for Listener {
    fn kind(&self) -> NodeKind {
        NodeKind::Listener
    }

    fn mount(&mut self, scope: &MountScope) {
        if self.mounted {
            return;
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "listener_mount",
            of = self.of.as_deref().unwrap_or("*")
        )
        .entered();

        self.mounted = true;
        self.shared.child.borrow_mut().mount(scope);

        let Some(host) = scope.host() else {
            #[cfg(feature = "tracing")]
            tracing::warn!("listener mounted outside a form");
            return;
        };

        let weak: Weak<ListenerShared> = Rc::downgrade(&self.shared);
        self.subscriptions.listen(
            &host,
            events::ANY,
            move |snapshot| {
                if let Some(shared) = weak.upgrade() {
                    shared.deliver(snapshot.clone());
                }
            },
            self.of.as_deref(),
        );

        let current = match &self.of {
            Some(name) => host.source_state(name).map(|state| StateSnapshot::Source {
                name: name.clone(),
                state,
            }),
            None => Some(StateSnapshot::Host(host.snapshot())),
        };
        if let Some(current) = current {
            self.shared.deliver(current);
        }
    }

    fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.shared.child.borrow_mut().unmount();
        self.subscriptions.clear();
        self.shared.pending.borrow_mut().take();
    }

    fn refresh(&mut self) {
        if let Ok(mut child) = self.shared.child.try_borrow_mut() {
            child.refresh();
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("of", &self.of)
            .field("mounted", &self.mounted)
            .field("renders", &self.render_count())
            .finish()
    }
}
