pub(crate) mod bootstrap;
pub(crate) mod console_commands;
pub(crate) mod loop_runner;
pub(crate) mod renderer;
pub(crate) mod session;
