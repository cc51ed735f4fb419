//! Field validation for request bodies and query strings.
//!
//! Handlers run every check and then call [`Validator::finish`], so a client sees all of its
//! mistakes in one response rather than one per round trip.

use uuid::Uuid;

use crate::config::PasswordConfig;
use crate::errors::{Error, FieldError, Result};

/// Loose email check: one `@`, a non-empty local part and a dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// Exactly ten ASCII digits
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy)]
enum Location {
    Body,
    Query,
}

/// Collects [`FieldError`]s for one request.
#[derive(Debug)]
pub struct Validator {
    location: Location,
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn body() -> Self {
        Self {
            location: Location::Body,
            errors: Vec::new(),
        }
    }

    pub fn query() -> Self {
        Self {
            location: Location::Query,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, path: &str, msg: impl Into<String>) {
        self.errors.push(match self.location {
            Location::Body => FieldError::body(path, msg),
            Location::Query => FieldError::query(path, msg),
        });
    }

    /// Record `msg` against `path` unless `ok` holds.
    pub fn check(&mut self, ok: bool, path: &str, msg: impl Into<String>) -> &mut Self {
        if !ok {
            self.push(path, msg);
        }
        self
    }

    pub fn email(&mut self, path: &str, value: &str) -> &mut Self {
        self.check(is_valid_email(value.trim()), path, "Invalid Email")
    }

    pub fn min_chars(&mut self, path: &str, value: &str, min: usize, msg: &str) -> &mut Self {
        self.check(value.trim().chars().count() >= min, path, msg)
    }

    pub fn password(&mut self, path: &str, value: &str, rules: &PasswordConfig) -> &mut Self {
        let len = value.chars().count();
        self.check(
            len >= rules.min_length,
            path,
            format!("Password must be at least {} characters long", rules.min_length),
        );
        self.check(
            len <= rules.max_length,
            path,
            format!("Password must be at most {} characters long", rules.max_length),
        )
    }

    pub fn phone(&mut self, path: &str, value: &str) -> &mut Self {
        self.check(is_valid_phone(value.trim()), path, "Phone number must be exactly 10 digits")
    }

    /// Parse an id, recording an error if it is missing or malformed.
    pub fn id(&mut self, path: &str, value: Option<&str>) -> Option<Uuid> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => {
                self.push(path, format!("{path} is required"));
                None
            }
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    self.push(path, format!("Invalid {path}"));
                    None
                }
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                errors: std::mem::take(&mut self.errors),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rules() {
        assert!(is_valid_email("rider@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.co.in"));
        assert!(!is_valid_email("rider@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("rider@@example.com"));
        assert!(!is_valid_email("ri der@example.com"));
        assert!(!is_valid_email("rider@example..com"));
    }

    #[test]
    fn test_phone_rules() {
        assert!(is_valid_phone("9876543210"));
        assert!(!is_valid_phone("987654321"));
        assert!(!is_valid_phone("98765432101"));
        assert!(!is_valid_phone("98765x3210"));
    }

    #[test]
    fn test_collects_every_failure() {
        let rules = PasswordConfig::default();
        let mut v = Validator::body();
        v.email("email", "nope")
            .password("password", "short", &rules)
            .min_chars("fullname.firstname", "A", 2, "First name must be at least 2 characters long");

        match v.finish() {
            Err(Error::Validation { errors }) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(paths, ["email", "password", "fullname.firstname"]);
                assert!(errors.iter().all(|e| e.location == "body"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_id_parsing() {
        let mut v = Validator::query();
        let id = Uuid::new_v4();
        assert_eq!(v.id("rideId", Some(&id.to_string())), Some(id));
        assert!(v.is_empty());

        assert_eq!(v.id("rideId", Some("abc")), None);
        assert_eq!(v.id("rideId", None), None);
        match v.finish() {
            Err(Error::Validation { errors }) => {
                assert_eq!(errors[0].msg, "Invalid rideId");
                assert_eq!(errors[1].msg, "rideId is required");
                assert_eq!(errors[0].location, "query");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
