//! Injected system boundary shared by every pipeline stage.

use crate::filesystem::Filesystem;
use crate::runner::CommandRunner;

/// The pair of collaborators the engine mutates the world through.
/// Composer, inference, diff, actions, and the executor all borrow one
/// of these, which is what makes the whole pipeline testable against an
/// in-memory filesystem and a recording command runner.
pub struct Host<'a> {
    pub runner: &'a dyn CommandRunner,
    pub fs: &'a dyn Filesystem,
}

impl<'a> Host<'a> {
    pub fn new(runner: &'a dyn CommandRunner, fs: &'a dyn Filesystem) -> Self {
        Self { runner, fs }
    }
}
