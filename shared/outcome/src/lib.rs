//! Railway-style success-or-error carrier (`Outcome<T, E>`) and a composable
//! validation chain built on top of it. Every fallible operation in the
//! security core returns an `Outcome` instead of panicking or relying on
//! exceptions for control flow.

use std::fmt;

/// A sum over `Success(value)` | `Failure(error)`.
///
/// `Outcome` is deliberately a distinct type from `std::result::Result` even
/// though it is isomorphic to it: call sites in this workspace want the
/// monadic vocabulary (`map`, `flat_map`, `map_err`, `or_else`, `fold`) to
/// read as the railway pattern described by the design, and `?` still works
/// via `From<Outcome<T, E>> for Result<T, E>` and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Success(T),
    Failure(E),
}

impl<T, E> Outcome<T, E> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    pub fn failure(error: E) -> Self {
        Outcome::Failure(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Transform the success value, leaving a failure untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Monadic bind: chain a fallible step that itself returns an `Outcome`.
    pub fn flat_map<U>(self, f: impl FnOnce(T) -> Outcome<U, E>) -> Outcome<U, E> {
        match self {
            Outcome::Success(v) => f(v),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Transform the failure value, leaving a success untouched.
    pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> Outcome<T, F> {
        match self {
            Outcome::Success(v) => Outcome::Success(v),
            Outcome::Failure(e) => Outcome::Failure(f(e)),
        }
    }

    /// Recover from a failure by producing another `Outcome`.
    pub fn or_else(self, f: impl FnOnce(E) -> Outcome<T, E>) -> Outcome<T, E> {
        match self {
            Outcome::Success(v) => Outcome::Success(v),
            Outcome::Failure(e) => f(e),
        }
    }

    /// Collapse both branches into a single value.
    pub fn fold<U>(self, on_success: impl FnOnce(T) -> U, on_failure: impl FnOnce(E) -> U) -> U {
        match self {
            Outcome::Success(v) => on_success(v),
            Outcome::Failure(e) => on_failure(e),
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Outcome::Success(v) => v,
            Outcome::Failure(_) => default,
        }
    }

    pub fn unwrap_or_else(self, f: impl FnOnce(E) -> T) -> T {
        match self {
            Outcome::Success(v) => v,
            Outcome::Failure(e) => f(e),
        }
    }

    pub fn as_ref(&self) -> Outcome<&T, &E> {
        match self {
            Outcome::Success(v) => Outcome::Success(v),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Success(v) => Some(v),
            Outcome::Failure(_) => None,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(r: Result<T, E>) -> Self {
        match r {
            Ok(v) => Outcome::Success(v),
            Err(e) => Outcome::Failure(e),
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Result<T, E> {
    fn from(o: Outcome<T, E>) -> Self {
        match o {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure(e) => Err(e),
        }
    }
}

/// A single named validation rule: a predicate over `&T` plus the failure it
/// contributes when violated.
pub struct Rule<'a, T, E> {
    name: &'static str,
    check: Box<dyn Fn(&T) -> bool + 'a>,
    on_violation: Box<dyn Fn(&'static str) -> E + 'a>,
}

impl<'a, T, E> Rule<'a, T, E> {
    pub fn new(
        name: &'static str,
        check: impl Fn(&T) -> bool + 'a,
        on_violation: impl Fn(&'static str) -> E + 'a,
    ) -> Self {
        Self {
            name,
            check: Box::new(check),
            on_violation: Box::new(on_violation),
        }
    }
}

/// Composable chain of predicates evaluated in order; the chain short-circuits
/// on the first violated rule and reports it as the failure (C2).
pub struct ValidationChain<'a, T, E> {
    rules: Vec<Rule<'a, T, E>>,
}

impl<'a, T, E> Default for ValidationChain<'a, T, E> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<'a, T, E> ValidationChain<'a, T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(
        mut self,
        name: &'static str,
        check: impl Fn(&T) -> bool + 'a,
        on_violation: impl Fn(&'static str) -> E + 'a,
    ) -> Self {
        self.rules.push(Rule::new(name, check, on_violation));
        self
    }

    /// Run every rule in insertion order; return the input on success or the
    /// first violated rule's error.
    pub fn validate(&self, value: T) -> Outcome<T, E> {
        for rule in &self.rules {
            if !(rule.check)(&value) {
                return Outcome::Failure((rule.on_violation)(rule.name));
            }
        }
        Outcome::Success(value)
    }
}

impl<T, E: fmt::Display> fmt::Display for Outcome<T, E>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(v) => write!(f, "Success({:?})", v),
            Outcome::Failure(e) => write!(f, "Failure({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Err1 {
        TooShort(&'static str),
    }

    #[test]
    fn map_transforms_success_only() {
        let ok: Outcome<i32, Err1> = Outcome::success(2);
        assert_eq!(ok.map(|v| v * 2), Outcome::Success(4));

        let err: Outcome<i32, Err1> = Outcome::failure(Err1::TooShort("x"));
        assert_eq!(err.map(|v| v * 2), Outcome::Failure(Err1::TooShort("x")));
    }

    #[test]
    fn flat_map_short_circuits_on_failure() {
        let chain = |v: i32| -> Outcome<i32, Err1> {
            if v > 0 {
                Outcome::success(v + 1)
            } else {
                Outcome::failure(Err1::TooShort("positive"))
            }
        };
        assert_eq!(Outcome::success(1).flat_map(chain), Outcome::Success(2));
        assert_eq!(
            Outcome::<i32, Err1>::failure(Err1::TooShort("seed")).flat_map(chain),
            Outcome::Failure(Err1::TooShort("seed"))
        );
    }

    #[test]
    fn validation_chain_reports_first_violation() {
        let chain: ValidationChain<&str, Err1> = ValidationChain::new()
            .rule("min_len", |s: &&str| s.len() >= 8, |n| Err1::TooShort(n))
            .rule("has_digit", |s: &&str| s.chars().any(|c| c.is_ascii_digit()), |n| {
                Err1::TooShort(n)
            });

        assert_eq!(chain.validate("short"), Outcome::Failure(Err1::TooShort("min_len")));
        assert_eq!(
            chain.validate("longenough"),
            Outcome::Failure(Err1::TooShort("has_digit"))
        );
        assert_eq!(chain.validate("longenough1"), Outcome::Success("longenough1"));
    }

    #[test]
    fn result_round_trip() {
        let ok: Result<i32, Err1> = Ok(5);
        let outcome: Outcome<i32, Err1> = ok.into();
        let back: Result<i32, Err1> = outcome.into();
        assert_eq!(back, Ok(5));
    }
}
