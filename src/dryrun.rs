use std::fmt;

/// A non-executing rendering of what would be submitted. Its `Display`
/// delegates to the formatter supplied at construction so each backend
/// controls human rendering of its own request shape.
pub struct AppDryRunInfo<T> {
    pub request: T,
    formatter: Box<dyn Fn(&T) -> String + Send + Sync>,
}

impl<T> AppDryRunInfo<T> {
    pub fn new(request: T, formatter: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            request,
            formatter: Box::new(formatter),
        }
    }
}

impl<T> fmt::Display for AppDryRunInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", (self.formatter)(&self.request))
    }
}

impl<T: fmt::Debug> fmt::Debug for AppDryRunInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppDryRunInfo")
            .field("request", &self.request)
            .finish()
    }
}
