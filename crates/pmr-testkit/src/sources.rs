use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pmr_runtime::SourceBinding;
use pmr_schemas::PostMetric;
use pmr_sources::{MetricSource, SessionContext, SourceError, SourceKind};

/// Shared count of `fetch` calls, readable after the source moved into a pass.
#[derive(Clone, Debug, Default)]
pub struct FetchCounter(Arc<AtomicUsize>);

impl FetchCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Answers every fetch with the same scripted result.
pub struct ScriptedSource {
    name: &'static str,
    kind: SourceKind,
    response: Result<Vec<PostMetric>, SourceError>,
    calls: FetchCounter,
}

impl ScriptedSource {
    pub fn ok(name: &'static str, metrics: Vec<PostMetric>) -> Self {
        Self {
            name,
            kind: SourceKind::Scrape,
            response: Ok(metrics),
            calls: FetchCounter::default(),
        }
    }

    pub fn failing(name: &'static str, err: SourceError) -> Self {
        Self {
            name,
            kind: SourceKind::Scrape,
            response: Err(err),
            calls: FetchCounter::default(),
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn counter(&self) -> FetchCounter {
        self.calls.clone()
    }

    pub fn into_binding(self) -> SourceBinding {
        SourceBinding::anonymous(Box::new(self))
    }
}

#[async_trait::async_trait]
impl MetricSource for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _ctx: &SessionContext) -> Result<Vec<PostMetric>, SourceError> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}
