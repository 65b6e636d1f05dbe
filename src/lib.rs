//! # Component Core
//!
//! Instantiation engine for declarative UI components: option merging,
//! constructor option resolution, the instance init sequence and the
//! template-compiling mount adapter.
//!
//! ## Invariants
//!
//! 1. **Merge Determinism**: `merge_options(parent, child)` is a pure function of
//!    its inputs and the configured strategies. Hooks run ancestors first, and a
//!    handler reached twice through a diamond runs once.
//!
//! 2. **Resolver Caching**: resolving a class whose super chain is unchanged
//!    returns the identical options object. A changed super chain re-merges
//!    once and keeps late edits made directly on the class.
//!
//! 3. **Init Order**: every instance passes through the same phases in the same
//!    order: identity, options, proxy, self reference, lifecycle, events, render
//!    context, `beforeCreate`, injections, state, provide, `created`.
//!
//! 4. **Fast Path**: children created while rendering link to their class's
//!    options and never call the merge engine.
//!
//! 5. **User Code Never Aborts Init**: errors from hooks, `data()`, computed
//!    getters and watchers are reported and the sequence continues. Only
//!    malformed options and resolver failures surface as [`Error`].
//!
//! 6. **Document Roots Are Never Replaced**: mounting onto `<html>` or `<body>`
//!    is refused with a warning.

pub mod class;
pub mod compiler;
pub mod config;
pub mod debug;
pub mod dom;
pub mod error;
pub mod events;
pub mod init;
pub mod inject;
pub mod instance;
pub mod lifecycle;
pub mod merge;
pub mod mount;
pub mod options;
pub mod patch;
pub mod perf;
pub mod render;
pub mod runtime;
pub mod state;
pub mod vnode;

#[cfg(test)]
mod lifecycle_tests;

pub use class::{resolve_constructor_options, ComponentClass, MAX_INHERITANCE_DEPTH};
pub use compiler::{CompileConfig, CompiledTemplate, HtmlCompiler, TemplateCompiler};
pub use config::Config;
pub use dom::{Document, DomQuery, Handle};
pub use error::{CompileError, Error, HookError, Result};
pub use init::{InstantiationKind, InternalComponentOptions};
pub use instance::{ComponentInstance, InitPhase, InstanceOptions, InstanceRef};
pub use merge::{merge_invocations, merge_options};
pub use options::{
    ComponentOptions, ComponentRef, DataOption, DirectiveDef, LifecycleHook, MountTarget,
    PropOptions, PropType, Record, Registry, TemplateOption, WatchHandler,
};
pub use patch::{Mounter, PatchMounter};
pub use render::{RenderContext, RenderFn};
pub use runtime::Runtime;
pub use vnode::VNode;
