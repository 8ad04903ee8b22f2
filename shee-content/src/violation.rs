use std::fmt;

/// The violation categories warnings are written for. Doubles as the tag on
/// warning template pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViolationType {
    Spam,
    Badword,
    Link,
}

impl ViolationType {
    pub const ALL: [ViolationType; 3] =
        [ViolationType::Spam, ViolationType::Badword, ViolationType::Link];

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationType::Spam => "spam",
            ViolationType::Badword => "badword",
            ViolationType::Link => "link",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
