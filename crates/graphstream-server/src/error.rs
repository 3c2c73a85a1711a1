// SPDX-License-Identifier: Apache-2.0
//! Error kinds a session can hit without ending the connection, per
//! `spec.md` §7. Only [`SessionError::TransportClosed`] is terminal.

use graphstream_proto::ProtoError;

/// Something that went wrong while serving one session. Every variant but
/// [`SessionError::TransportClosed`] is recovered locally: the offending
/// input is dropped, counted, and logged, and the session stays open.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A binary frame failed to decode.
    #[error(transparent)]
    MalformedFrame(#[from] ProtoError),
    /// A control message's JSON didn't parse.
    #[error("malformed control message: {0}")]
    MalformedControl(#[from] serde_json::Error),
    /// A `settings_update` failed validation; the previous value stays in
    /// effect.
    #[error(transparent)]
    ValidationFailed(#[from] graphstream_config::settings::SettingsError),
    /// The session's outbound queue could not accept a frame.
    #[error("outbound queue saturated")]
    QueueSaturated,
    /// The transport closed or errored. Terminal for the session.
    #[error("transport closed: {0}")]
    TransportClosed(String),
}
