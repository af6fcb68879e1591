//! An atom holding immutable application state, and a dispatcher that routes
//! named actions to pure state-transition handlers.
//!
//! ```
//! use fluxcell::Dispatcher;
//!
//! let d = Dispatcher::<i32, i32>::from_state(0);
//! d.register("add", |value, state| state + value);
//! let _s = d.subscribe(|e| println!("{} {} -> {}", e.namespace, e.value, e.state));
//!
//! d.dispatch("add", 5).unwrap();
//! assert_eq!(*d.state(), 5);
//! assert!(d.dispatch("sub", 1).is_err());
//! ```
mod atom;
mod config;
mod connect;
mod dispatcher;
mod listeners;
mod subscription;

pub use atom::*;
pub use config::*;
pub use connect::*;
pub use dispatcher::*;
pub use subscription::*;
