//! Built-in context labels

/// Root document of the running module
pub const ROOT: &str = "root";
/// Theme document
pub const THEME: &str = "theme";
/// System information document (exceptions, timings)
pub const SYS: &str = "sys";
/// Environment document
pub const ENV: &str = "env";
/// Request parameters document
pub const PARAMS: &str = "params";
/// Scratch document discarded at the end of the request
pub const TEMP: &str = "temp";
/// Return values of a module call
pub const RETURN: &str = "return";
/// Error document
pub const ERROR: &str = "error";
/// Session document
pub const SESSION: &str = "session";
/// User document
pub const USER: &str = "user";

/// Default context of unqualified path queries
pub const ATTACH: &str = "attach";
/// Node targeted by the current action
pub const ACTION: &str = "action";

/// Labels reserved for document roots
pub const DOCUMENT_LABELS: [&str; 10] = [
    ROOT, THEME, SYS, ENV, PARAMS, TEMP, RETURN, ERROR, SESSION, USER,
];

/// Whether `label` is one of the built-in document labels
pub fn is_builtin_document_label(label: &str) -> bool {
    DOCUMENT_LABELS.contains(&label)
}
