pub(crate) mod auth;
pub(crate) mod profiles;
pub(crate) mod system;
