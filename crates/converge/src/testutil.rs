//! Shared test doubles: a recording command runner with programmable
//! responses, keyed by `user:command` like the real interface.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::runner::CommandRunner;

#[derive(Default)]
pub struct MockRunner {
    commands: RefCell<Vec<(String, String)>>,
    responses: RefCell<HashMap<String, Vec<u8>>>,
    errors: RefCell<HashMap<String, String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user: &str, command: &str) -> String {
        format!("{user}:{command}")
    }

    /// Configure the output returned for a `user:command` pair.
    pub fn respond(&self, user: &str, command: &str, output: &[u8]) {
        self.responses
            .borrow_mut()
            .insert(Self::key(user, command), output.to_vec());
    }

    /// Configure a failure for a `user:command` pair.
    pub fn fail(&self, user: &str, command: &str, message: &str) {
        self.errors
            .borrow_mut()
            .insert(Self::key(user, command), message.to_string());
    }

    /// Every command issued so far, in order, regardless of user.
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn commands_for_user(&self, user: &str) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn ran(&self, command: &str) -> bool {
        self.commands.borrow().iter().any(|(_, c)| c == command)
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, user: &str, command: &str) -> Result<Vec<u8>> {
        self.commands
            .borrow_mut()
            .push((user.to_string(), command.to_string()));

        let key = Self::key(user, command);
        if let Some(message) = self.errors.borrow().get(&key) {
            return Err(Error::Command {
                command: command.to_string(),
                message: message.clone(),
            });
        }
        Ok(self.responses.borrow().get(&key).cloned().unwrap_or_default())
    }
}
