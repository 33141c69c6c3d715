//! Administrative commands disguised as query text.
//!
//! Text starting with `pc:` is intercepted locally and never submitted as-is:
//!
//! - `pc:get_query_id <sql>` submits `<sql>` and returns its execution ID without waiting
//! - `pc:get_query_id_status <id>` returns the state of an execution
//! - `pc:stop_query_id <id>` stops an execution
//! - `pc:get_driver_version` returns the driver version

use crate::error::QueryError;

/// Marker that introduces a pseudo command.
pub const PREFIX: &str = "pc:";

pub const GET_QUERY_ID: &str = "get_query_id";
pub const GET_QUERY_ID_STATUS: &str = "get_query_id_status";
pub const STOP_QUERY_ID: &str = "stop_query_id";
pub const GET_DRIVER_VERSION: &str = "get_driver_version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoCommand {
    GetQueryId,
    GetQueryIdStatus,
    StopQueryId,
    GetDriverVersion,
}

impl PseudoCommand {
    /// Split query text into an optional command and the remaining query.
    ///
    /// Text without the `pc:` marker is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::UnknownPseudoCommand` for a marked text naming no
    /// known command, or naming an argument-taking command without argument.
    pub fn parse(text: &str) -> Result<(Option<Self>, &str), QueryError> {
        let Some(rest) = text.strip_prefix(PREFIX) else {
            return Ok((None, text));
        };
        let rest = rest.trim_matches(' ');

        for (name, command) in [
            (GET_QUERY_ID_STATUS, Self::GetQueryIdStatus),
            (GET_QUERY_ID, Self::GetQueryId),
            (STOP_QUERY_ID, Self::StopQueryId),
        ] {
            if let Some(argument) = rest
                .strip_prefix(name)
                .and_then(|tail| tail.strip_prefix(' '))
            {
                return Ok((Some(command), argument.trim_matches(' ')));
            }
        }

        if rest.starts_with(GET_DRIVER_VERSION) {
            return Ok((Some(Self::GetDriverVersion), ""));
        }

        Err(QueryError::UnknownPseudoCommand(rest.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetQueryId => GET_QUERY_ID,
            Self::GetQueryIdStatus => GET_QUERY_ID_STATUS,
            Self::StopQueryId => STOP_QUERY_ID,
            Self::GetDriverVersion => GET_DRIVER_VERSION,
        }
    }
}

impl std::fmt::Display for PseudoCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", PREFIX, self.as_str())
    }
}
