//! Error Accumulator: threads the location path through the walk and owns
//! the errors recorded on the way.
//!
//! Path segments and depth are released by a drop guard, so they are popped
//! on success, on failure and on unwind alike.

use crate::error::{
    Checked, ConfigError, ErrorContext, ErrorKind, Location, Offending, Segment, ValidationError,
};

use super::{ErrorMode, MatchOptions};

/// Why a step stopped. `Invalid` means the errors are already recorded in
/// the accumulator; `Config` aborts the whole call.
#[derive(Debug)]
pub(crate) enum Halt {
    Invalid,
    Config(ConfigError),
}

impl From<ConfigError> for Halt {
    fn from(e: ConfigError) -> Self {
        Halt::Config(e)
    }
}

pub(crate) type Step<T> = Result<T, Halt>;

pub struct Accumulator<'o> {
    options: &'o MatchOptions,
    path: Vec<Segment>,
    depth: usize,
    errors: Vec<ValidationError>,
    /// Catch-all readings taken so far; see [`Accumulator::note_general`].
    general: usize,
}

/// Pops what `with_segment` / `nested` pushed, when dropped.
struct Frame<'a, 'o> {
    acc: &'a mut Accumulator<'o>,
    pushed: bool,
}

impl Drop for Frame<'_, '_> {
    fn drop(&mut self) {
        if self.pushed {
            self.acc.path.pop();
        }
        self.acc.depth -= 1;
    }
}

impl<'o> Accumulator<'o> {
    pub fn new(options: &'o MatchOptions) -> Self {
        Self { options, path: Vec::new(), depth: 0, errors: Vec::new(), general: 0 }
    }

    pub fn options(&self) -> &MatchOptions {
        self.options
    }

    pub fn location(&self) -> Location {
        Location::from(self.path.clone())
    }

    pub fn collect_all(&self) -> bool {
        self.options.error_mode == ErrorMode::CollectAll
    }

    /// Run `f` with `segment` appended to the path.
    pub fn with_segment<R>(&mut self, segment: Segment, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(segment);
        self.depth += 1;
        let frame = Frame { acc: self, pushed: true };
        f(&mut *frame.acc)
    }

    /// One recursive step that consumes no path; still counts toward the depth guard.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Step<T>) -> Step<T> {
        if self.depth >= self.options.max_depth {
            let depth_limit = self.options.max_depth;
            return self.fail(ErrorKind::DecodeError, ErrorContext::DepthLimit { depth_limit });
        }
        self.depth += 1;
        let frame = Frame { acc: self, pushed: false };
        f(&mut *frame.acc)
    }

    pub(crate) fn fail<T>(&mut self, kind: ErrorKind, context: ErrorContext) -> Step<T> {
        let error = ValidationError::new(self.location(), kind, context);
        tracing::trace!(%error, "match failed");
        self.errors.push(error);
        Err(Halt::Invalid)
    }

    pub(crate) fn fail_value<T>(&mut self, kind: ErrorKind, value: Offending) -> Step<T> {
        self.fail(kind, ErrorContext::Value { value })
    }

    /// The value was taken by a catch-all reading: a float arm holding an
    /// integer, a string arm holding what could be a literal. Unions prefer
    /// the variant that needed the fewest of these.
    pub(crate) fn note_general(&mut self) {
        self.general += 1;
    }

    /// Try every candidate and keep the success with the fewest catch-all
    /// readings; declaration order breaks ties. Failed attempts leave no
    /// errors behind. `None` when nothing matched.
    pub(crate) fn most_specific<I, T>(
        &mut self,
        candidates: impl IntoIterator<Item = I>,
        mut attempt: impl FnMut(&mut Self, I) -> Step<T>,
    ) -> Step<Option<T>> {
        let base = self.general;
        let mut best: Option<(usize, T)> = None;
        for candidate in candidates {
            let mark = self.checkpoint();
            let outcome = attempt(self, candidate);
            let cost = self.general - base;
            self.general = base;
            match outcome {
                Ok(found) => {
                    if best.as_ref().is_none_or(|(lowest, _)| cost < *lowest) {
                        best = Some((cost, found));
                    }
                    if cost == 0 {
                        break;
                    }
                }
                Err(Halt::Invalid) => self.rollback(mark),
                Err(config) => return Err(config),
            }
        }
        Ok(best.map(|(cost, found)| {
            self.general = base + cost;
            found
        }))
    }

    pub(crate) fn checkpoint(&self) -> usize {
        self.errors.len()
    }

    /// Forget errors recorded since `mark` (a union variant that did not match).
    pub(crate) fn rollback(&mut self, mark: usize) {
        self.errors.truncate(mark);
    }

    /// Finish a call: first error only, or every recorded error, per the options.
    pub(crate) fn one_or_many<T>(mut self, result: Step<T>) -> Result<Checked<T>, ConfigError> {
        match result {
            Ok(value) => Ok(Ok(value)),
            Err(Halt::Config(e)) => Err(e),
            Err(Halt::Invalid) => {
                if self.errors.is_empty() {
                    self.errors.push(ValidationError::new(
                        Location::root(),
                        ErrorKind::NoMatch,
                        ErrorContext::Undefined,
                    ));
                }
                if !self.collect_all() {
                    self.errors.truncate(1);
                }
                Ok(Err(self.errors))
            }
        }
    }
}
