//! Configuration access port trait.

/// Raw access to sectioned key/value configuration. Typed parsing and
/// validation live in the domain so every adapter rejects bad values the
/// same way.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
