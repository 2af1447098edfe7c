use std::fmt;
use std::sync::Arc;

/// A URL prefix that is either fixed at construction or computed on demand.
#[derive(Clone)]
pub enum Prefix {
    Fixed(String),
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Prefix {
    pub fn fixed(value: impl Into<String>) -> Self {
        Prefix::Fixed(value.into())
    }

    pub fn computed<F>(resolve: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Prefix::Computed(Arc::new(resolve))
    }

    pub fn resolve(&self) -> String {
        match self {
            Prefix::Fixed(value) => value.clone(),
            Prefix::Computed(resolve) => resolve(),
        }
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Prefix::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Prefix {
    fn from(value: &str) -> Self {
        Prefix::fixed(value)
    }
}

impl From<String> for Prefix {
    fn from(value: String) -> Self {
        Prefix::Fixed(value)
    }
}

#[derive(Debug, Clone)]
pub struct PrefixResolvers {
    pub app: Prefix,
    pub content: Prefix,
}

impl PrefixResolvers {
    pub fn new(app: impl Into<Prefix>, content: impl Into<Prefix>) -> Self {
        Self {
            app: app.into(),
            content: content.into(),
        }
    }

    /// Resolves `(app, content)`.
    pub fn resolve(&self) -> (String, String) {
        (self.app.resolve(), self.content.resolve())
    }
}
