use std::io;

use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum CallError {
    #[error("no handler available to place calls ({0})")]
    HandlerMissing(String),
    #[error("not permitted to place calls ({0})")]
    PermissionDenied(String),
    #[error("call could not be started: {0}")]
    Failed(String),
}

/// Platform capability that places an outgoing call.
pub trait CallPlacer {
    fn place_call(&self, number: &str) -> Result<(), CallError>;
}

impl<P: CallPlacer + ?Sized> CallPlacer for Box<P> {
    fn place_call(&self, number: &str) -> Result<(), CallError> {
        (**self).place_call(number)
    }
}

/// Place a call and absorb any failure. No retry.
pub fn trigger_call<P: CallPlacer + ?Sized>(placer: &P, number: &str) {
    match placer.place_call(number) {
        Ok(()) => info!("Calling {}", number),
        Err(e @ CallError::PermissionDenied(_)) => warn!("Call to {} refused: {}", number, e),
        Err(e) => error!("Call to {} failed: {}", number, e),
    }
}

/// Runs `program args.. tel:<number>`, e.g. `am start -a android.intent.action.CALL -d tel:...`.
/// The child is spawned and left to run; its exit status is not observed.
pub struct CommandCallPlacer {
    program: String,
    args: Vec<String>,
}

impl CommandCallPlacer {
    /// `None` when `command` is empty.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl CallPlacer for CommandCallPlacer {
    fn place_call(&self, number: &str) -> Result<(), CallError> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(tel_uri(number))
            .spawn()
            .map(drop)
            .map_err(|e| classify_spawn_error(&self.program, e))
    }
}

/// Logs the number instead of dialling it.
pub struct LogCallPlacer;

impl CallPlacer for LogCallPlacer {
    fn place_call(&self, number: &str) -> Result<(), CallError> {
        info!("Dry run: would dial {}", tel_uri(number));
        Ok(())
    }
}

fn tel_uri(number: &str) -> String {
    format!("tel:{number}")
}

fn classify_spawn_error(program: &str, err: io::Error) -> CallError {
    let detail = format!("{program}: {err}");
    match err.kind() {
        io::ErrorKind::NotFound => CallError::HandlerMissing(detail),
        io::ErrorKind::PermissionDenied => CallError::PermissionDenied(detail),
        _ => CallError::Failed(detail),
    }
}
