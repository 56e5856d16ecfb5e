use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 1-based question number, assigned by layout order.
pub type QuestionNumber = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

// Defines a new type that wraps a String for use as an ID.
macro_rules! idtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn from(s: String) -> Self {
                Self(s)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

idtype!(SubjectName);

/// A single answer option, `A` for index 0, `B` for index 1, and so on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionLetter(char);

impl OptionLetter {
    pub fn from_index(index: usize) -> Self {
        let offset = u8::try_from(index).unwrap_or(u8::MAX).min(25);
        Self(char::from(b'A' + offset))
    }

    pub fn index(&self) -> usize {
        (self.0 as u8 - b'A') as usize
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    /// Case-insensitive comparison against a key token such as `"b"` or `" C"`.
    pub fn matches(&self, token: &str) -> bool {
        let mut chars = token.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.eq_ignore_ascii_case(&self.0),
            _ => false,
        }
    }
}

impl Display for OptionLetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
