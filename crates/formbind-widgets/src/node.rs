#![forbid(unsafe_code)]

//! Headless component tree.
//!
//! A [`Node`] is mounted with a [`MountScope`], receives listener state while
//! mounted, and is unmounted exactly once per mount span. Containers forward
//! each call to their children in order; unmounting goes in reverse order.
//!
//! # Nesting
//!
//! [`Updater`](crate::Updater) and [`Listener`](crate::Listener) each own a
//! subscription span tied to their own mount span. Neither may take another
//! adapter, or a [`Fragment`], as its direct child; wrap it in an
//! [`Element`] instead. See [`check_nesting`].

use std::fmt;

use formbind_runtime::{Host, StateSnapshot};

use crate::actions::FieldActions;
use crate::context::FormContext;

/// Structural role of a node, used by the nesting check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Fragment,
    Updater,
    Listener,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Element => "Element",
            Self::Fragment => "Fragment",
            Self::Updater => "Updater",
            Self::Listener => "Listener",
        })
    }
}

/// A mountable component.
pub trait Node {
    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    /// Start a mount span.
    fn mount(&mut self, scope: &MountScope);

    /// End the mount span. Releases everything obtained in `mount`.
    fn unmount(&mut self);

    /// Re-render from current local state.
    fn refresh(&mut self) {}

    /// Listener state from the nearest enclosing [`Listener`](crate::Listener).
    fn receive(&mut self, _state: &StateSnapshot) {}
}

impl<N: Node + ?Sized> Node for Box<N> {
    fn kind(&self) -> NodeKind {
        (**self).kind()
    }

    fn mount(&mut self, scope: &MountScope) {
        (**self).mount(scope);
    }

    fn unmount(&mut self) {
        (**self).unmount();
    }

    fn refresh(&mut self) {
        (**self).refresh();
    }

    fn receive(&mut self, state: &StateSnapshot) {
        (**self).receive(state);
    }
}

/// What a node receives from its ancestors at mount time.
#[derive(Debug, Clone, Default)]
pub struct MountScope {
    context: Option<FormContext>,
    actions: Option<FieldActions>,
}

impl MountScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_context(mut self, context: FormContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: FieldActions) -> Self {
        self.actions = Some(actions);
        self
    }

    /// The form context: the one passed down, else the innermost provided
    /// one.
    #[must_use]
    pub fn context(&self) -> Option<FormContext> {
        self.context.clone().or_else(FormContext::current)
    }

    #[must_use]
    pub fn host(&self) -> Option<Host> {
        self.context().and_then(|context| context.host())
    }

    /// Source actions of the nearest enclosing [`Updater`](crate::Updater).
    #[must_use]
    pub fn actions(&self) -> Option<&FieldActions> {
        self.actions.as_ref()
    }
}

// ─── Nesting ─────────────────────────────────────────────────────────────────

/// An adapter was given another adapter or a fragment as its direct child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestingError {
    pub parent: NodeKind,
    pub child: NodeKind,
}

impl fmt::Display for NestingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cannot be the direct child of {}; wrap it in an Element",
            self.child, self.parent
        )
    }
}

impl std::error::Error for NestingError {}

/// Check that `child` may be the direct child of an adapter of kind `parent`.
///
/// # Errors
///
/// [`NestingError`] when `child` is an `Updater`, a `Listener`, or a
/// `Fragment`.
pub fn check_nesting(parent: NodeKind, child: NodeKind) -> Result<(), NestingError> {
    match child {
        NodeKind::Updater | NodeKind::Listener | NodeKind::Fragment => {
            Err(NestingError { parent, child })
        }
        NodeKind::Element => Ok(()),
    }
}

/// Enforce the nesting rule for infallible constructors: panic in debug
/// builds, tolerate in release builds.
pub(crate) fn enforce_nesting(parent: NodeKind, child: NodeKind) {
    if let Err(err) = check_nesting(parent, child) {
        if cfg!(debug_assertions) {
            panic!("{err}");
        }
        #[cfg(feature = "tracing")]
        tracing::warn!(%err, "nesting violation tolerated");
    }
}

// ─── Element ─────────────────────────────────────────────────────────────────

/// Container for any number of children.
///
/// Children pushed or removed while the element is mounted are mounted or
/// unmounted on the spot, so an element doubles as a repeater.
#[derive(Default)]
pub struct Element {
    children: Vec<Box<dyn Node>>,
    scope: Option<MountScope>,
}

impl Element {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.push(child);
        self
    }

    /// Append a child; mounts it if the element is mounted. Returns its index.
    pub fn push(&mut self, child: impl Node + 'static) -> usize {
        let mut child: Box<dyn Node> = Box::new(child);
        if let Some(scope) = &self.scope {
            child.mount(scope);
        }
        self.children.push(child);
        self.children.len() - 1
    }

    /// Remove the child at `index`; unmounts it if the element is mounted.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Node>> {
        if index >= self.children.len() {
            return None;
        }
        let mut child = self.children.remove(index);
        if self.scope.is_some() {
            child.unmount();
        }
        Some(child)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.scope.is_some()
    }
}

impl Node for Element {
    fn mount(&mut self, scope: &MountScope) {
        if self.scope.is_some() {
            return;
        }
        self.scope = Some(scope.clone());
        for child in &mut self.children {
            child.mount(scope);
        }
    }

    fn unmount(&mut self) {
        if self.scope.take().is_none() {
            return;
        }
        for child in self.children.iter_mut().rev() {
            child.unmount();
        }
    }

    fn refresh(&mut self) {
        for child in &mut self.children {
            child.refresh();
        }
    }

    fn receive(&mut self, state: &StateSnapshot) {
        for child in &mut self.children {
            child.receive(state);
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("children", &self.children.len())
            .field("mounted", &self.scope.is_some())
            .finish()
    }
}

// ─── Fragment ────────────────────────────────────────────────────────────────

/// Grouping without a container of its own.
#[derive(Default)]
pub struct Fragment {
    inner: Element,
}

impl Fragment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.inner.push(child);
        self
    }
}

impl Node for Fragment {
    fn kind(&self) -> NodeKind {
        NodeKind::Fragment
    }

    fn mount(&mut self, scope: &MountScope) {
        self.inner.mount(scope);
    }

    fn unmount(&mut self) {
        self.inner.unmount();
    }

    fn refresh(&mut self) {
        self.inner.refresh();
    }

    fn receive(&mut self, state: &StateSnapshot) {
        self.inner.receive(state);
    }
}

// ─── When ────────────────────────────────────────────────────────────────────

/// Mounts its child while a predicate over received listener state holds.
///
/// The child is mounted on the first received state that satisfies the
/// predicate and unmounted on the first one that does not.
pub struct When {
    predicate: Box<dyn Fn(&StateSnapshot) -> bool>,
    child: Box<dyn Node>,
    scope: Option<MountScope>,
    showing: bool,
}

impl When {
    pub fn new(
        predicate: impl Fn(&StateSnapshot) -> bool + 'static,
        child: impl Node + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            child: Box::new(child),
            scope: None,
            showing: false,
        }
    }

    #[must_use]
    pub fn is_showing(&self) -> bool {
        self.showing
    }
}

impl Node for When {
    fn mount(&mut self, scope: &MountScope) {
        if self.scope.is_none() {
            self.scope = Some(scope.clone());
        }
    }

    fn unmount(&mut self) {
        if self.scope.take().is_some() && self.showing {
            self.showing = false;
            self.child.unmount();
        }
    }

    fn refresh(&mut self) {
        if self.showing {
            self.child.refresh();
        }
    }

    fn receive(&mut self, state: &StateSnapshot) {
        let Some(scope) = &self.scope else {
            return;
        };
        let show = (self.predicate)(state);
        if show && !self.showing {
            self.showing = true;
            self.child.mount(scope);
        } else if !show && self.showing {
            self.showing = false;
            self.child.unmount();
            return;
        }
        if self.showing {
            self.child.receive(state);
        }
    }
}

// ─── Render ──────────────────────────────────────────────────────────────────

/// Leaf that renders received listener state through a closure.
pub struct Render {
    render: Box<dyn FnMut(&StateSnapshot)>,
}

impl Render {
    pub fn new(render: impl FnMut(&StateSnapshot) + 'static) -> Self {
        Self {
            render: Box::new(render),
        }
    }
}

impl Node for Render {
    fn mount(&mut self, _scope: &MountScope) {}

    fn unmount(&mut self) {}

    fn receive(&mut self, state: &StateSnapshot) {
        (self.render)(state);
    }
}
