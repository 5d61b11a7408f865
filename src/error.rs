use std::io;

/// Errors that can terminate a session worker.
///
/// None of these are retried; each maps to one of the termination paths
/// described for the session state machine. Most are silent on the wire —
/// only [`SessionError::ConnectTargetUnavailable`] has a corresponding wire
/// reply (`fail\n`), written by the caller before the error propagates.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("prologue read failed: {0}")]
    Prologue(#[source] io::Error),

    #[error("prologue field `{0}` was empty")]
    EmptyField(&'static str),

    #[error("obsolete LEAVE command")]
    ObsoleteCommand,

    #[error("unrecognized command `{0}`")]
    UnknownCommand(String),

    #[error("service {addr}/{uuid} is missing or already claimed")]
    ConnectTargetUnavailable { addr: String, uuid: String },

    #[error("LISTEN refused: {addr}/{uuid} already registered")]
    ListenRefused { addr: String, uuid: String },

    #[error("LINK target connId={0} missing")]
    LinkTargetMissing(u64),

    #[error(transparent)]
    Io(#[from] io::Error),
}
