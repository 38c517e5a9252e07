//! Authorization of produce and consume calls.
//!
//! Every call is checked as `(subject, object, action)` before the log is
//! touched. The object is always [`OBJECT_WILDCARD`]: a server exposes a
//! single log.
//!
//! ## Policy Format
//!
//! [`AclAuthorizer`] reads one rule per line:
//!
//! ```text
//! # subject, object, action
//! p, root, *, *
//! p, alice, *, produce
//! p, *, *, consume
//! ```
//!
//! `*` in any field matches everything. Blank lines and `#` comments are
//! ignored. Anything not allowed by a rule is denied.

use crate::error::{ServerError, ServerResult};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// The object every call is checked against.
pub const OBJECT_WILDCARD: &str = "*";

/// What a caller wants to do with the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Append records.
    Produce,
    /// Read records.
    Consume,
}

impl Action {
    /// Returns the policy name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Produce => "produce",
            Action::Consume => "consume",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "produce" => Ok(Action::Produce),
            "consume" => Ok(Action::Consume),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// Access control capability consulted before every call.
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(())` if `subject` may perform `action` on `object`.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` otherwise.
    fn authorize(&self, subject: &str, object: &str, action: Action) -> ServerResult<()>;
}

/// Authorizer that permits every call. For development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _subject: &str, _object: &str, _action: Action) -> ServerResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    subject: String,
    object: String,
    action: String,
}

impl Rule {
    fn matches(&self, subject: &str, object: &str, action: Action) -> bool {
        field_matches(&self.subject, subject)
            && field_matches(&self.object, object)
            && field_matches(&self.action, action.as_str())
    }
}

fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == OBJECT_WILDCARD || pattern == value
}

/// Authorizer backed by an allow list of policy rules.
#[derive(Debug, Clone, Default)]
pub struct AclAuthorizer {
    rules: Vec<Rule>,
}

impl AclAuthorizer {
    /// Creates an authorizer that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule allowing `subject` to perform `action` on `object`.
    pub fn allow(
        mut self,
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.rules.push(Rule {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        });
        self
    }

    /// Parses policy text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` for a line that is not `p, subject, object,
    /// action` or that names an unknown action.
    pub fn from_policy(text: &str) -> ServerResult<Self> {
        let mut acl = Self::new();

        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [kind, subject, object, action] = fields[..] else {
                return Err(invalid_policy(i, "expected `p, subject, object, action`"));
            };
            if kind != "p" {
                return Err(invalid_policy(i, format!("unknown rule type `{kind}`")));
            }
            if [subject, object, action].iter().any(|f| f.is_empty()) {
                return Err(invalid_policy(i, "empty field"));
            }
            if action != OBJECT_WILDCARD {
                action
                    .parse::<Action>()
                    .map_err(|message| invalid_policy(i, message))?;
            }

            acl = acl.allow(subject, object, action);
        }

        Ok(acl)
    }

    /// Reads and parses a policy file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, or `InvalidPolicy`.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_policy(&text)
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn invalid_policy(index: usize, message: impl Into<String>) -> ServerError {
    ServerError::InvalidPolicy {
        line: index + 1,
        message: message.into(),
    }
}

impl Authorizer for AclAuthorizer {
    fn authorize(&self, subject: &str, object: &str, action: Action) -> ServerResult<()> {
        if self.rules.iter().any(|r| r.matches(subject, object, action)) {
            Ok(())
        } else {
            Err(ServerError::PermissionDenied {
                subject: subject.to_string(),
                action,
            })
        }
    }
}
