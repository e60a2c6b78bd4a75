mod actions;
pub(crate) mod args;
pub(crate) mod registry;

pub(crate) use actions::handle_profile_command;
pub(crate) use registry::ProfileRegistry;
