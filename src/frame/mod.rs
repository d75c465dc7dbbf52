pub(crate) mod audio;
#[allow(clippy::module_inception)]
pub(crate) mod frame;
