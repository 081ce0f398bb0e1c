//! Scan listings returned by `LIST` and `UIDL`.

/// One line of a `LIST` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListEntry {
    /// Message number, 1-based.
    pub id: u32,
    /// Exact size in octets.
    pub octets: u64,
}

/// One line of a `UIDL` response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UidEntry {
    /// Message number, 1-based.
    pub id: u32,
    /// Server-assigned unique id, stable across sessions.
    pub uid: String,
}
