//! Test doubles shared by the integration suite: a recording command
//! runner with programmable per-command responses and failures.

use std::cell::RefCell;
use std::collections::HashMap;

use converge::{CommandRunner, Error};

#[derive(Default)]
pub struct StubRunner {
    commands: RefCell<Vec<(String, String)>>,
    responses: RefCell<HashMap<String, Vec<u8>>>,
    errors: RefCell<HashMap<String, String>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user: &str, command: &str) -> String {
        format!("{user}:{command}")
    }

    pub fn respond(&self, user: &str, command: &str, output: &[u8]) {
        self.responses
            .borrow_mut()
            .insert(Self::key(user, command), output.to_vec());
    }

    pub fn fail(&self, user: &str, command: &str, message: &str) {
        self.errors
            .borrow_mut()
            .insert(Self::key(user, command), message.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn ran(&self, command: &str) -> bool {
        self.commands.borrow().iter().any(|(_, c)| c == command)
    }
}

impl CommandRunner for StubRunner {
    fn run(&self, user: &str, command: &str) -> converge::Result<Vec<u8>> {
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
