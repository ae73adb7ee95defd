//! The validator capability consumed by typed handlers.
//!
//! A [`Validator`] inspects a decoded value and either accepts it or reports an ordered list of
//! per-field [`Violations`]. Validators are optional: typed handlers without one skip the step.

use std::fmt;

/// One rule violation: the offending field and a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    field: String,
    message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Ordered collection of [`Violation`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations {
    inner: Vec<Violation>,
}

impl Violations {
    pub fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.inner.push(Violation::new(field, message));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.inner.iter()
    }

    /// `Ok(())` when nothing was pushed, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl FromIterator<Violation> for Violations {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.inner.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

pub trait Validator<T>: Send + Sync {
    fn validate(&self, value: &T) -> Result<(), Violations>;
}

/// A validator that wraps a closure.
pub struct FnValidator<F>(F);

impl<T, F> Validator<T> for FnValidator<F>
where
    F: Fn(&T) -> Result<(), Violations> + Send + Sync,
{
    fn validate(&self, value: &T) -> Result<(), Violations> {
        (self.0)(value)
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator")
    }
}

/// Creates a validator from a closure.
///
/// # Example
/// ```
/// use micro_dispatch::validate::{validator_fn, Violations};
///
/// struct NewPet {
///     name: String,
/// }
///
/// let validator = validator_fn(|pet: &NewPet| {
///     let mut violations = Violations::new();
///     if pet.name.is_empty() {
///         violations.push("name", "must not be empty");
///     }
///     violations.into_result()
/// });
/// # let _ = validator;
/// ```
pub fn validator_fn<T, F>(f: F) -> FnValidator<F>
where
    F: Fn(&T) -> Result<(), Violations> + Send + Sync,
{
    FnValidator(f)
}

#[cfg(feature = "validator")]
pub use rules::RuleValidator;

#[cfg(feature = "validator")]
mod rules {
    use super::{Validator, Violations};
    use validator::{ValidationErrors, ValidationErrorsKind};

    /// Runs the rules declared with `#[derive(validator::Validate)]`.
    ///
    /// Fields are reported in name order, one entry per failed rule; a rule without a message
    /// reports its code. Errors of `#[validate(nested)]` fields are reported under their full path.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RuleValidator;

    impl<T: validator::Validate> Validator<T> for RuleValidator {
        fn validate(&self, value: &T) -> Result<(), Violations> {
            let Err(errors) = value.validate() else {
                return Ok(());
            };

            let mut violations = Violations::new();
            collect("", &errors, &mut violations);
            if violations.is_empty() {
                violations.push("__all__", "value is invalid");
            }
            Err(violations)
        }
    }

    /// Flattens nested struct and list errors into `outer.inner` and `items[0].name` field paths.
    fn collect(prefix: &str, errors: &ValidationErrors, violations: &mut Violations) {
        let mut entries = errors.errors().iter().collect::<Vec<_>>();
        entries.sort_by_key(|(field, _)| **field);

        for (field, kind) in entries {
            let path = if prefix.is_empty() { (*field).to_string() } else { format!("{prefix}.{field}") };
            match kind {
                ValidationErrorsKind::Field(errors) => {
                    for error in errors {
                        let message = error.message.as_ref().map_or_else(|| error.code.to_string(), ToString::to_string);
                        violations.push(path.clone(), message);
                    }
                }
                ValidationErrorsKind::Struct(nested) => collect(&path, nested, violations),
                ValidationErrorsKind::List(items) => {
                    for (index, nested) in items {
                        collect(&format!("{path}[{index}]"), nested, violations);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{validator_fn, Validator, Violations};

    struct Signup {
        name: String,
        age: u8,
    }

    fn signup_validator() -> impl Validator<Signup> {
        validator_fn(|signup: &Signup| {
            let mut violations = Violations::new();
            if signup.name.trim().is_empty() {
                violations.push("name", "must not be blank");
            }
            if signup.age < 18 {
                violations.push("age", "must be at least 18");
            }
            violations.into_result()
        })
    }

    #[test]
    fn closure_validator_accepts() {
        let validator = signup_validator();
        assert!(validator.validate(&Signup { name: "zava".into(), age: 30 }).is_ok());
    }

    #[test]
    fn closure_validator_reports_in_order() {
        let validator = signup_validator();
        let violations = validator.validate(&Signup { name: " ".into(), age: 3 }).unwrap_err();

        let fields = violations.iter().map(|v| v.field()).collect::<Vec<_>>();
        assert_eq!(fields, ["name", "age"]);
        assert_eq!(violations.to_string(), "name: must not be blank, age: must be at least 18");
    }

    #[cfg(feature = "validator")]
    mod rules {
        use crate::validate::{RuleValidator, Validator};
        use validator::Validate;

        #[derive(Validate)]
        struct NewPet {
            #[validate(length(min = 1, message = "must not be empty"))]
            name: String,
            #[validate(email)]
            owner_email: String,
        }

        #[test]
        fn derive_rules_are_reported() {
            let pet = NewPet { name: String::new(), owner_email: "not-an-email".into() };
            let violations = RuleValidator.validate(&pet).unwrap_err();

            assert_eq!(violations.len(), 2);
            let first = violations.iter().next().unwrap();
            assert_eq!(first.field(), "name");
            assert_eq!(first.message(), "must not be empty");
            let second = violations.iter().nth(1).unwrap();
            assert_eq!(second.field(), "owner_email");
            assert_eq!(second.message(), "email");
        }

        #[derive(Validate)]
        struct Owner {
            #[validate(length(min = 1, message = "must not be empty"))]
            name: String,
        }

        #[derive(Validate)]
        struct Adoption {
            #[validate(nested)]
            owner: Owner,
            #[validate(nested)]
            pets: Vec<NewPet>,
        }

        #[test]
        fn nested_struct_errors_are_reported() {
            let adoption = Adoption {
                owner: Owner { name: String::new() },
                pets: vec![NewPet { name: "kitty".into(), owner_email: "zava@example.com".into() }],
            };
            let violations = RuleValidator.validate(&adoption).unwrap_err();

            assert_eq!(violations.len(), 1);
            let first = violations.iter().next().unwrap();
            assert_eq!(first.field(), "owner.name");
            assert_eq!(first.message(), "must not be empty");
        }

        #[test]
        fn nested_list_errors_are_indexed() {
            let adoption = Adoption {
                owner: Owner { name: "zava".into() },
                pets: vec![
                    NewPet { name: "kitty".into(), owner_email: "zava@example.com".into() },
                    NewPet { name: String::new(), owner_email: "zava@example.com".into() },
                ],
            };
            let violations = RuleValidator.validate(&adoption).unwrap_err();

            let fields = violations.iter().map(|v| v.field()).collect::<Vec<_>>();
            assert_eq!(fields, ["pets[1].name"]);
        }

        #[test]
        fn derive_rules_accept_valid() {
            let pet = NewPet { name: "kitty".into(), owner_email: "zava@example.com".into() };
            assert!(RuleValidator.validate(&pet).is_ok());
        }
    }
}
