// Request-scoped context and correlation id extraction

use std::future::Future;
use uuid::Uuid;

/// Field name under which a correlation id is attached.
pub const TRACE_ID_FIELD: &str = "traceId";

tokio::task_local! {
    static CURRENT_CONTEXT: RequestContext;
}

/// Anything that can carry a correlation identifier for the current request.
///
/// Returning `None` or a blank string both mean "no id".
pub trait TraceContext {
    fn trace_id(&self) -> Option<&str>;
}

/// Minimal request-scoped context carrying an optional trace id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    trace_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        RequestContext {
            trace_id: Some(trace_id.into()),
        }
    }

    /// A context with a fresh random trace id.
    pub fn generate() -> Self {
        Self::with_trace_id(Uuid::new_v4().to_string())
    }

    /// The context made ambient by [`RequestContext::scope`] or
    /// [`RequestContext::sync_scope`], if any.
    pub fn current() -> Option<RequestContext> {
        CURRENT_CONTEXT.try_with(Clone::clone).ok()
    }

    /// Run `fut` with this context as the ambient request context.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT_CONTEXT.scope(self, fut).await
    }

    /// Synchronous counterpart of [`RequestContext::scope`].
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CURRENT_CONTEXT.sync_scope(self, f)
    }
}

impl TraceContext for RequestContext {
    fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }
}

impl<T: TraceContext + ?Sized> TraceContext for &T {
    fn trace_id(&self) -> Option<&str> {
        (**self).trace_id()
    }
}

impl<T: TraceContext> TraceContext for Option<T> {
    fn trace_id(&self) -> Option<&str> {
        self.as_ref().and_then(TraceContext::trace_id)
    }
}

/// Non-blank correlation id carried by `ctx`.
pub fn extract_trace_id<C: TraceContext + ?Sized>(ctx: &C) -> Option<&str> {
    ctx.trace_id().filter(|id| !id.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ignores_missing_and_blank() {
        assert_eq!(extract_trace_id(&RequestContext::new()), None);
        assert_eq!(extract_trace_id(&RequestContext::with_trace_id("")), None);
        assert_eq!(extract_trace_id(&RequestContext::with_trace_id("  ")), None);
        assert_eq!(extract_trace_id(&None::<RequestContext>), None);
    }

    #[test]
    fn test_extract_returns_id() {
        let ctx = RequestContext::with_trace_id("abc-123");
        assert_eq!(extract_trace_id(&ctx), Some("abc-123"));
        assert_eq!(extract_trace_id(&Some(ctx)), Some("abc-123"));
    }

    #[test]
    fn test_generate_produces_uuid() {
        let ctx = RequestContext::generate();
        let id = ctx.trace_id().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_current_outside_scope_is_none() {
        assert_eq!(RequestContext::current(), None);
    }

    #[test]
    fn test_sync_scope_sets_current() {
        let seen = RequestContext::with_trace_id("t-1").sync_scope(RequestContext::current);
        assert_eq!(seen, Some(RequestContext::with_trace_id("t-1")));
    }

    #[tokio::test]
    async fn test_async_scope_sets_current() {
        let seen = RequestContext::with_trace_id("t-2")
            .scope(async { RequestContext::current() })
            .await;
        assert_eq!(seen, Some(RequestContext::with_trace_id("t-2")));
    }
}
