pub(crate) mod add;
pub(crate) mod common;
pub(crate) mod import;
pub(crate) mod init;
pub(crate) mod show;
pub(crate) mod sync;
pub(crate) mod verify;
pub(crate) mod version;
