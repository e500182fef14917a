/// Route tables
///
/// The router is split by the access level a caller needs, so the security
/// posture is visible from the assembly in `create_router` alone: the session
/// gate is layered onto exactly one table, and a protected endpoint cannot
/// drift into the public table unnoticed.

/// Routes accessible without a session (login boundary and health probe).
pub mod public;

/// Routes behind the session middleware. Every handler here can assume a
/// logged-in user.
pub mod authenticated;

/// Management routes nested under `/admin`. The admin check itself happens in
/// the service layer, so a logged-in non-admin gets a 403 instead of the
/// login redirect.
pub mod admin;
