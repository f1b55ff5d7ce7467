//! Fixed mapping from a fault to the HTTP status and headers it produces.

use crate::error::FlowError;

/// Status and extra response headers for one fault kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultStatus {
    pub status: u16,
    pub headers: &'static [(&'static str, &'static str)],
}

const fn status(status: u16) -> FaultStatus {
    FaultStatus {
        status,
        headers: &[],
    }
}

const UNAUTHORIZED: FaultStatus = FaultStatus {
    status: 401,
    headers: &[("WWW-Authenticate", "Basic realm=\"Compysition Server\"")],
};

/// Looks up the status for a fault. No fault maps to 200, unmapped faults to 500.
pub fn fault_status(fault: Option<&FlowError>) -> FaultStatus {
    let Some(fault) = fault else {
        return status(200);
    };
    match fault {
        FlowError::ResourceNotModified(_) => status(304),
        FlowError::MalformedEventData(_)
        | FlowError::InvalidEventDataModification(_)
        | FlowError::InvalidEventModification(_) => status(400),
        FlowError::UnauthorizedEvent(_) => UNAUTHORIZED,
        FlowError::ForbiddenEvent(_) => status(403),
        FlowError::ResourceNotFound(_) => status(404),
        FlowError::EventCommandNotAllowed(_) => status(405),
        FlowError::ActorTimeout(_) => status(408),
        FlowError::ResourceConflict(_) => status(409),
        FlowError::ResourceGone(_) => status(410),
        FlowError::UnprocessableEventData(_) => status(422),
        FlowError::EventRateExceeded(_) => status(429),
        FlowError::ServiceUnavailable(_) => status(503),
        _ => status(500),
    }
}
