//! Stream stats commands.

pub const NOT_IMPLEMENTED_REPLY: &str = "Not implemented yet!";

/// `mmr`: placeholder until rating lookups exist.
pub fn mmr() -> Vec<String> {
    vec![NOT_IMPLEMENTED_REPLY.to_string()]
}
