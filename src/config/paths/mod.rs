//! Platform paths for configuration.

pub mod xdg_root;
