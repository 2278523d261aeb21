use std::fmt;

/// Platform-assigned thread identifier (a Discord channel snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl ThreadId {
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn mention(self) -> String {
        format!("<#{}>", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
