// SPDX-License-Identifier: Apache-2.0
//! Client-side implementation of the graph streaming protocol: the
//! connection state machine, the outbound backpressure queue, the inbound
//! nudge debouncer, the rate limiter, and a `tokio-tungstenite` transport
//! tying them together (`spec.md` §4.6, §4.7).

pub mod debounce;
pub mod queue;
pub mod rate_limit;
pub mod session;
pub mod state;
pub mod transport;

pub use session::{ClientEvent, ClientSession};
pub use state::{ConnectionState, ConnectionStateMachine};
pub use transport::{run, ClientCommand, ClientNotification};
