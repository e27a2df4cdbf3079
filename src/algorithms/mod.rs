pub(crate) mod templates;
pub(crate) mod renumbering;
