pub(crate) mod batch;
pub(crate) mod generate;
pub(crate) mod helpers;
pub(crate) mod inspect;
